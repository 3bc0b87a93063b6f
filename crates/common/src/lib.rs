//! Shared types for the dashboard API client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
