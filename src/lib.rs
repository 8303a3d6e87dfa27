//! Feedly annotation sync and article export.
//!
//! - `annotations`: resumable sync of highlights and comments into notes
//! - `export`: unread and saved articles bundled into an EPUB
//! - `feedly`: the REST gateway and its wire records
//! - `checkpoint`, `store`: persisted sync progress and the notes vault

pub mod annotations;
pub mod checkpoint;
pub mod config;
pub mod epub;
pub mod error;
pub mod export;
pub mod feedly;
pub mod markdown;
pub mod model;
pub mod store;

pub use error::{Error, Result};
