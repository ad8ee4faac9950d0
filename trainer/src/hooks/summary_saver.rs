use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use serde::Serialize;

use super::{Hook, RunContext, RunValues};
use crate::Result;

/// The file summaries are appended to, inside the log directory.
pub const SUMMARIES_FILE: &str = "summaries.jsonl";

#[derive(Serialize)]
struct SummaryLine<'a> {
    step: u64,
    #[serde(flatten)]
    scalars: &'a BTreeMap<String, f32>,
}

/// Appends the scalars of every few runs to `{log_dir}/summaries.jsonl`, one JSON object per
/// line.
#[derive(Debug)]
pub struct SummarySaverHook {
    path: PathBuf,
    every_steps: NonZeroU64,
    last_written: Option<u64>,
}

impl SummarySaverHook {
    pub fn new(log_dir: &Path, every_steps: NonZeroU64) -> Self {
        Self {
            path: log_dir.join(SUMMARIES_FILE),
            every_steps,
            last_written: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn due(&self, global_step: u64) -> bool {
        match self.last_written {
            None => true,
            Some(last) => global_step >= last.saturating_add(self.every_steps.get()),
        }
    }

    fn write(&mut self, values: &RunValues) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        let line = SummaryLine {
            step: values.global_step,
            scalars: &values.scalars,
        };
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        self.last_written = Some(values.global_step);
        Ok(())
    }
}

impl Hook for SummarySaverHook {
    fn after_run(&mut self, _ctx: &mut RunContext, values: &RunValues) -> Result<()> {
        if values.scalars.is_empty() || !self.due(values.global_step) {
            return Ok(());
        }

        self.write(values)
    }
}
