use std::fmt::{Display, Formatter};
use std::io;

/// Outcome of a failed storage range operation.
#[derive(Debug)]
pub enum StorageError {
    /// A read was abandoned because the cancel predicate fired. Not a
    /// failure: the caller will be asked for a newer range shortly.
    Cancelled,
    /// The requested range does not lie within the image.
    OutOfRange { offset: u64, len: usize },
    Io(io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Cancelled => write!(f, "operation cancelled"),
            StorageError::OutOfRange { offset, len } =>
                write!(f, "range {:#X}+{:#X} lies outside the image", offset, len),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Reasons the controller refuses to start. All of these are fatal for the
/// attempt; retrying is up to the caller.
#[derive(Debug)]
pub enum StartError {
    /// The backing store could not be queried.
    Storage(StorageError),
    /// The image is not exactly the size the geometry demands.
    SizeMismatch { found: u64, expected: u64 },
    /// The cylinder buffer or dirty bitmap could not be allocated.
    Allocation { bytes: usize },
    AlreadyRunning,
}

pub type StartResult<T> = Result<T, StartError>;

impl Display for StartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::Storage(e) => write!(f, "backing store unavailable: {}", e),
            StartError::SizeMismatch { found, expected } =>
                write!(f, "image file size invalid, found {} bytes, expected {} bytes",
                       found, expected),
            StartError::Allocation { bytes } =>
                write!(f, "failed to allocate {} bytes of memory", bytes),
            StartError::AlreadyRunning => write!(f, "controller is already running"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for StartError {
    fn from(e: StorageError) -> Self {
        StartError::Storage(e)
    }
}
