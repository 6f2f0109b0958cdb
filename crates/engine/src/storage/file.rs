//! File-backed guest cart storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use cart_sync_core::Cart;

use super::record::{decode_record, encode_record};
use super::{GuestCartStorage, StorageError};

/// Stores the guest cart record as a JSON file.
///
/// Writes go to a sibling temporary file that is renamed over the record, so
/// a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl GuestCartStorage for FileStorage {
    fn load(&self) -> Cart {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode_record(&raw),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No guest cart record");
                Cart::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read guest cart record");
                Cart::new()
            }
        }
    }

    fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        let raw = encode_record(cart)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        std::fs::write(&temp, raw)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), lines = cart.len(), "Saved guest cart");
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Erased guest cart record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
