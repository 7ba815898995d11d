//! Secrets capability
//!
//! Encrypted values and files are decoded by an external secrets subsystem.
//! The engine only needs the three operations on [`SecretsManager`];
//! [`PlainSecretsManager`] is the default used when no secrets manager was
//! supplied, and treats everything as stored in the clear.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Decodes secret values and files
pub trait SecretsManager: Send + Sync {
    /// Decode the secret stored under `key`
    fn decode(&self, key: &str) -> Result<String>;

    /// Decoded content of the (possibly encrypted) file at `path`
    fn decoded_file_content(&self, path: &Path) -> Result<Vec<u8>>;

    /// Path of a decoded copy of the file at `path`
    fn decoded_file_path(&self, path: &Path) -> Result<PathBuf>;
}

/// Pass-through secrets manager: values and files are not encrypted
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSecretsManager;

impl SecretsManager for PlainSecretsManager {
    fn decode(&self, key: &str) -> Result<String> {
        Ok(key.to_string())
    }

    fn decoded_file_content(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path)
            .map_err(|e| Error::Secrets(format!("cannot read '{}': {}", path.display(), e)))
    }

    fn decoded_file_path(&self, path: &Path) -> Result<PathBuf> {
        if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::Secrets(format!("'{}' does not exist", path.display())))
        }
    }
}
