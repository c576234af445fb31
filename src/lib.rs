pub mod bridge;
pub mod config;
pub mod error;

pub use error::{AppError, Result};
