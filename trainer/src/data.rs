use std::{
    num::{NonZeroUsize, NonZeroU64},
    ops::Range,
};

use crate::{Result, TrainerErr, task_spec::TaskSpec};

/// Splits `total` samples among `num_shards` and returns the range for `shard`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1 (balanced partition).
pub fn shard_range(total: usize, shard: usize, num_shards: NonZeroUsize) -> Range<usize> {
    let num_shards = num_shards.get();
    let shard = shard.min(num_shards - 1);

    let base = total / num_shards;
    let rem = total % num_shards;

    let start = shard * base + shard.min(rem);
    let extra = usize::from(shard < rem);

    start..start + base + extra
}

/// The slice of a dataset one task reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    index: usize,
    num_shards: NonZeroUsize,
}

impl ShardSpec {
    /// Creates a new `ShardSpec`.
    ///
    /// # Returns
    /// The shard, or an error if `index` isn't below `num_shards`.
    pub fn new(index: usize, num_shards: NonZeroUsize) -> Result<Self> {
        if index >= num_shards.get() {
            return Err(TrainerErr::InvalidTaskSpec(format!(
                "shard {index} out of range for {num_shards} shard(s)"
            )));
        }

        Ok(Self { index, num_shards })
    }

    /// The whole dataset.
    pub fn whole() -> Self {
        Self {
            index: 0,
            num_shards: NonZeroUsize::MIN,
        }
    }

    /// The shard of a replica task: one shard per master or worker.
    pub fn for_task(task_spec: &TaskSpec) -> Self {
        let index = task_spec.worker_index().unwrap_or(0);
        let num_shards = NonZeroUsize::new(task_spec.num_workers()).unwrap_or(NonZeroUsize::MIN);

        Self::new(index, num_shards).unwrap_or_else(|_| Self::whole())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_shards(&self) -> NonZeroUsize {
        self.num_shards
    }

    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        shard_range(total, self.index, self.num_shards)
    }
}

/// How a dataset should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub batch_size: NonZeroUsize,
    /// `None` reads forever.
    pub num_epochs: Option<NonZeroUsize>,
    pub shuffle: bool,
    pub shard: ShardSpec,
    pub seed: u64,
}

impl ReadOptions {
    /// A single ordered pass over the whole dataset.
    pub fn single_pass(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            num_epochs: Some(NonZeroUsize::MIN),
            shuffle: false,
            shard: ShardSpec::whole(),
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The amount of batches one epoch of `total` samples yields for this shard, the last
    /// partial one included.
    pub fn batches_per_epoch(&self, total: usize) -> Option<NonZeroU64> {
        let len = self.shard.range(total).len();
        NonZeroU64::new(len.div_ceil(self.batch_size.get()) as u64)
    }
}
