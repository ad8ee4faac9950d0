pub mod activations;
pub mod init;
pub mod layers;
pub mod loss;
mod model;
mod sequential;
mod text_classifier;

pub use model::Model;
pub use sequential::Sequential;
pub use text_classifier::{Outputs, TextClassifier};
