use super::{ClusterCoordinator, Placement};
use crate::Result;

/// A process alone: no server and no devices to pin anything on.
#[derive(Debug, Default)]
pub struct SingleProcess {
    placement: Placement,
}

impl SingleProcess {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClusterCoordinator for SingleProcess {
    fn placement(&self) -> &Placement {
        &self.placement
    }

    fn join(&mut self) -> Result<()> {
        Ok(())
    }
}
