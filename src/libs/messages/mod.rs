//! Centralized message management for gridcache.
//!
//! All user communication flows through the [`Message`] enum and the
//! `msg_*` macros, which keeps wording in one place and routes output to
//! `tracing` or the console depending on debug mode.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridcache::libs::messages::Message;
//! use gridcache::{msg_info, msg_success};
//!
//! msg_success!(Message::ConfigSaved);
//! msg_info!(Message::RecordsCached(42, "64e1a9".to_string()));
//! ```

pub mod display;
pub mod macros;
pub mod types;

// Re-export the main Message type for convenient access
pub use types::Message;
