//! TUI module for the messenger
//!
//! Terminal user interface using Ratatui: conversation list, open thread,
//! compose box and a new-message picker, all fed live by the store.

mod app;
mod compose;
mod help;
mod messages;
mod picker;
mod sidebar;
mod ui;

pub use app::run;
