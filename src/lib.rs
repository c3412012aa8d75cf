pub mod analyze;
pub mod bypass;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod http_client;
pub mod output;
pub mod utils;

// re-export modules used in tests
pub use crate::bypass::*;
pub use crate::config::Config;
pub use crate::error::{BypassError, Result};
