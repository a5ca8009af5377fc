//! services/client/src/terminal/mod.rs
//!
//! The interactive terminal front end over the core controller.

pub mod command;
pub mod render;
pub mod session;

pub use command::{Command, CommandError};
pub use session::{Flow, Session};
