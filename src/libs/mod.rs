//! Core library modules for gridcache.
//!
//! Domain logic and cross-cutting helpers: the field catalog, schema
//! synthesis, value codec, query building and filter translation, plus the
//! configuration, storage-path and messaging infrastructure they rely on.

pub mod codec;
pub mod config;
pub mod data_storage;
pub mod fields;
pub mod filter;
pub mod fuzzy;
pub mod messages;
pub mod query;
pub mod schema;
pub mod timestamp;
pub mod validator;
