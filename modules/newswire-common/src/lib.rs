pub mod config;
pub mod error;
pub mod types;
pub mod util;

pub use config::{ClusterConfig, Config};
pub use error::NewswireError;
pub use types::*;
pub use util::*;
