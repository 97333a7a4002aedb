pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::{Config, PipelineSettings, RunMode};
pub use error::PipelineError;
pub use time::NormalizationError;
pub use types::*;
