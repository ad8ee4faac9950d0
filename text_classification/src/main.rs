use text_classification::BagOfEmbeddings;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    text_classification::main(BagOfEmbeddings::default(), "bag_of_embeddings")
}
