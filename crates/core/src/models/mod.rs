//! Data models for engagement entities

mod account;
mod assessment;
mod badge;
mod points;
mod streak;

pub use account::*;
pub use assessment::*;
pub use badge::*;
pub use points::*;
pub use streak::*;
