pub mod bot;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod history;
pub mod session;
pub mod types;

pub use bot::run;
