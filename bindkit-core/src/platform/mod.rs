//! Platform persistence seams.
//!
//! Small JSON documents (binding records, credential sources, PIN-wrapped
//! keys) are persisted through the [`AtomicBlobStore`] trait. The crate
//! ships a file-backed implementation and an in-memory one; hosts may
//! substitute their own (encrypted preferences, keychain-backed files).

mod file;
mod memory;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use thiserror::Error;

/// Errors from a blob store or the JSON documents layered on top of it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O operation failed.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// Context describing the operation.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Encoding or decoding a stored document failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the fault.
        message: String,
    },
    /// A store lock was poisoned or could not be acquired.
    #[error("lock error: {message}")]
    Lock {
        /// Description of the fault.
        message: String,
    },
}

impl StoreError {
    /// Creates an I/O error with context.
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a serialization error.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a lock error.
    pub fn lock<S: Into<String>>(message: S) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }
}

/// Atomic storage for small named blobs.
///
/// Writes must be all-or-nothing: a reader never observes a partially
/// written blob. Implementations need not provide durability beyond what
/// the underlying medium guarantees.
pub trait AtomicBlobStore: Send + Sync {
    /// Reads a blob, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically replaces the blob's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Deletes the blob. Deleting an absent blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Whether a blob with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Whether the store can currently accept writes.
    fn writable(&self) -> bool {
        true
    }
}
