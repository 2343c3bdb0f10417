pub mod cli;
pub mod commands;
pub mod error;
pub mod settings;

pub use toolshare_core::{bus, message, notify, preferences, store, utils};
