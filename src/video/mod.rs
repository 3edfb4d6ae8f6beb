mod check;
pub mod cli;
pub mod commands;
mod config;
mod dialog;
mod document;
mod error;
mod segments;
mod slides;
mod speakers;
mod support;
mod timeline;
mod visuals;

pub use cli::VideoCommands;
pub use commands::handle_video_command;
