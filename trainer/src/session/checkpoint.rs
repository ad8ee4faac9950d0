use std::{
    fs,
    io::ErrorKind,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The index file naming the most recent checkpoint of a log directory.
pub const CHECKPOINT_INDEX: &str = "checkpoint";

/// A snapshot of the graph's trainable state at a global step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub global_step: u64,
    pub state: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct CheckpointIndex {
    latest: String,
    /// Every checkpoint still on disk, oldest first.
    #[serde(default)]
    all: Vec<String>,
}

/// The file name of the checkpoint taken at `global_step`.
pub fn checkpoint_file(global_step: u64) -> String {
    format!("model.ckpt-{global_step}.json")
}

/// Writes `contents` next to `path` and renames it into place.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_index(dir: &Path) -> Result<Option<CheckpointIndex>> {
    let raw = match fs::read(dir.join(CHECKPOINT_INDEX)) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_slice(&raw)?))
}

/// Writes `checkpoint` into `dir`, points the index at it and deletes the checkpoints
/// beyond the most recent `max_to_keep`.
///
/// # Arguments
/// * `dir` - The log directory.
/// * `checkpoint` - The snapshot to write.
/// * `max_to_keep` - How many checkpoints to keep, `None` keeps them all.
///
/// # Returns
/// The path of the written checkpoint.
pub fn save(
    dir: &Path,
    checkpoint: &Checkpoint,
    max_to_keep: Option<NonZeroUsize>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let name = checkpoint_file(checkpoint.global_step);
    let path = dir.join(&name);
    write_atomic(&path, &serde_json::to_vec(checkpoint)?)?;

    let mut all = read_index(dir)?.map(|index| index.all).unwrap_or_default();
    all.retain(|kept| *kept != name);
    all.push(name.clone());

    let excess = max_to_keep.map_or(0, |max| all.len().saturating_sub(max.get()));
    let stale: Vec<_> = all.drain(..excess).collect();

    let index = CheckpointIndex { latest: name, all };
    write_atomic(&dir.join(CHECKPOINT_INDEX), &serde_json::to_vec(&index)?)?;

    // Only once the index no longer names them.
    for file in stale {
        match fs::remove_file(dir.join(&file)) {
            Ok(()) => debug!("removed old checkpoint {file}"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(path)
}

/// Reads the checkpoint named by `dir`'s index.
///
/// # Returns
/// `None` if the directory has no index yet.
pub fn latest(dir: &Path) -> Result<Option<Checkpoint>> {
    let Some(index) = read_index(dir)? else {
        return Ok(None);
    };

    let checkpoint = serde_json::from_slice(&fs::read(dir.join(index.latest))?)?;
    Ok(Some(checkpoint))
}
