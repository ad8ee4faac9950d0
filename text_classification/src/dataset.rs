use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use trainer::ReadOptions;

use crate::{Result, TextClassificationErr};

/// Which part of the data to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn file_name(&self) -> &'static str {
        match self {
            Split::Train => "train.csv",
            Split::Test => "test.csv",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
            Split::Test => f.write_str("test"),
        }
    }
}

/// A labeled sequence of vocabulary ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub label: usize,
    pub tokens: Vec<u32>,
}

/// The samples of one split. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TextClassificationDataset {
    split: Split,
    samples: Arc<[Sample]>,
}

impl TextClassificationDataset {
    /// Reads `{data_dir}/{split}.csv`, one `label,token token ...` sample per line.
    pub fn open(data_dir: &Path, split: Split) -> Result<Self> {
        let path = data_dir.join(split.file_name());
        let file = File::open(&path)?;
        let samples = parse_samples(BufReader::new(file), &path)?;

        info!(samples = samples.len(); "loaded the {split} split from {}", path.display());
        Ok(Self::from_samples(split, samples))
    }

    pub fn from_samples(split: Split, samples: Vec<Sample>) -> Self {
        Self {
            split,
            samples: samples.into(),
        }
    }

    pub fn split(&self) -> Split {
        self.split
    }

    /// The amount of samples.
    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// Starts reading batches as `options` says.
    pub fn read(&self, options: ReadOptions) -> BatchReader {
        BatchReader::new(self.samples.clone(), options)
    }
}

/// Parses `label,token token ...` lines. Blank lines are skipped.
pub fn parse_samples<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Sample>> {
    let parse_err = |line: usize, column: usize, detail: String| TextClassificationErr::Parse {
        path: PathBuf::from(path),
        line,
        column,
        detail,
    };

    let mut samples = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let (label, tokens) = line
            .split_once(',')
            .ok_or_else(|| parse_err(i + 1, 1, "expected `label,tokens`".to_string()))?;

        let label = label
            .trim()
            .parse()
            .map_err(|e| parse_err(i + 1, 1, format!("invalid label {label:?}: {e}")))?;

        let tokens = tokens
            .split_whitespace()
            .map(|token| {
                token
                    .parse()
                    .map_err(|e| parse_err(i + 1, 2, format!("invalid token {token:?}: {e}")))
            })
            .collect::<Result<_>>()?;

        samples.push(Sample { label, tokens });
    }

    Ok(samples)
}

/// A batch of samples, split into inputs and labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub tokens: Vec<Vec<u32>>,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Yields the batches of a shard, epoch after epoch.
///
/// Each epoch visits every sample of the shard once, reshuffled when shuffling is on. The
/// last batch of an epoch may be smaller.
#[derive(Debug)]
pub struct BatchReader {
    samples: Arc<[Sample]>,
    options: ReadOptions,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    rng: StdRng,
}

impl BatchReader {
    fn new(samples: Arc<[Sample]>, options: ReadOptions) -> Self {
        let shard: Range<usize> = options.shard.range(samples.len());
        debug!(
            shard = options.shard.index(),
            start = shard.start,
            end = shard.end;
            "reading shard"
        );

        let mut reader = Self {
            samples,
            options,
            order: shard.collect(),
            cursor: 0,
            epoch: 0,
            rng: StdRng::seed_from_u64(options.seed),
        };
        reader.shuffle();
        reader
    }

    /// The amount of epochs fully read so far.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    fn shuffle(&mut self) {
        if self.options.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    /// Returns the next batch, or `None` once every epoch has been read.
    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.order.is_empty() {
            return None;
        }

        if self.cursor == self.order.len() {
            self.epoch += 1;
            if self
                .options
                .num_epochs
                .is_some_and(|epochs| self.epoch >= epochs.get())
            {
                return None;
            }

            self.cursor = 0;
            self.shuffle();
        }

        let end = (self.cursor + self.options.batch_size.get()).min(self.order.len());
        let mut batch = Batch::default();

        for &i in &self.order[self.cursor..end] {
            let sample = &self.samples[i];
            batch.tokens.push(sample.tokens.clone());
            batch.labels.push(sample.label);
        }

        self.cursor = end;
        Some(batch)
    }
}

impl Iterator for BatchReader {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use trainer::ShardSpec;

    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn dataset(n: usize) -> TextClassificationDataset {
        let samples = (0..n)
            .map(|i| Sample {
                label: i,
                tokens: vec![i as u32],
            })
            .collect();
        TextClassificationDataset::from_samples(Split::Train, samples)
    }

    #[test]
    fn parses_labels_and_tokens() {
        let raw = "1,4 5 6\n\n0,\n2,7\n";
        let samples = parse_samples(raw.as_bytes(), Path::new("mem")).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(
            samples[0],
            Sample {
                label: 1,
                tokens: vec![4, 5, 6]
            }
        );
        assert!(samples[1].tokens.is_empty());
    }

    #[test]
    fn bad_tokens_name_their_line() {
        let raw = "1,4 5\n0,4 x\n";
        let err = parse_samples(raw.as_bytes(), Path::new("mem")).unwrap_err();
        assert!(matches!(
            err,
            TextClassificationErr::Parse {
                line: 2,
                column: 2,
                ..
            }
        ));
    }

    #[test]
    fn single_pass_reads_everything_in_order() {
        let labels: Vec<usize> = dataset(5)
            .read(ReadOptions::single_pass(nz(2)))
            .flat_map(|batch| batch.labels)
            .collect();

        assert_eq!(labels, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn epochs_are_reshuffled_permutations() {
        let options = ReadOptions {
            batch_size: nz(3),
            num_epochs: Some(nz(2)),
            shuffle: true,
            shard: ShardSpec::whole(),
            seed: 7,
        };
        let mut reader = dataset(6).read(options);

        let mut first: Vec<usize> = reader.by_ref().take(2).flat_map(|b| b.labels).collect();
        let mut second: Vec<usize> = reader.by_ref().flat_map(|b| b.labels).collect();
        first.sort();
        second.sort();

        assert_eq!(first, [0, 1, 2, 3, 4, 5]);
        assert_eq!(second, [0, 1, 2, 3, 4, 5]);
        assert_eq!(reader.epoch(), 2);
    }

    #[test]
    fn shards_are_disjoint() {
        let read = |index| {
            let options = ReadOptions {
                shard: ShardSpec::new(index, nz(2)).unwrap(),
                ..ReadOptions::single_pass(nz(10))
            };
            dataset(5)
                .read(options)
                .flat_map(|b| b.labels)
                .collect::<Vec<_>>()
        };

        assert_eq!(read(0), [0, 1, 2]);
        assert_eq!(read(1), [3, 4]);
    }

    #[test]
    fn same_seed_same_order() {
        let options = ReadOptions {
            shuffle: true,
            ..ReadOptions::single_pass(nz(8)).with_seed(3)
        };
        let a: Vec<_> = dataset(8).read(options).collect();
        let b: Vec<_> = dataset(8).read(options).collect();
        assert_eq!(a, b);
    }
}
