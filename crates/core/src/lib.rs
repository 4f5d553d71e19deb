//! JobQuest Core - Shared data models, level table, types, and errors

pub mod errors;
pub mod levels;
pub mod models;
pub mod types;

pub use errors::{Error, Result};
pub use levels::*;
pub use models::*;
pub use types::*;
