pub mod arch;
pub mod error;
pub mod metrics;
pub mod numerics;
pub mod optimization;

pub use error::{MlErr, Result};
pub use numerics::check_numerics;
