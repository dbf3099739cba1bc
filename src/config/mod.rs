//! Configuration management
//!
//! Handles loading connection profiles and user settings.

pub mod connections;
pub mod settings;

pub use connections::{ConnectionProfile, SslMode, find_connection};
pub use settings::{Settings, load_settings};
