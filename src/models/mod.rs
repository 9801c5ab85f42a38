//! Data models for the upload intake service.
//!
//! Uploads are ephemeral: nothing here is persisted besides the raw bytes
//! the storage layer writes to disk.

pub mod upload;
