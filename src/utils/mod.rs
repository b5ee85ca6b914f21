//! Shared utilities and error types

pub mod error;

pub use error::{AccelError, FetchError, Result, StorageError};
