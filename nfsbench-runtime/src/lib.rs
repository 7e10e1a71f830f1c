pub mod runtime;

mod error;

pub use crate::error::RuntimeError;
pub use crate::runtime::{default_suite, load_config, BenchCli, BenchRuntime};
