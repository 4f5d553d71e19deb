//! SQLite database management

mod accounts;
mod activity;
mod badges;
mod connection;
mod settings;
mod streaks;

pub use accounts::*;
pub use activity::*;
pub use badges::*;
pub use connection::Database;
pub use settings::*;
pub use streaks::*;
