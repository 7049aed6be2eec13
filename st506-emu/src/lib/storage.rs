mod storage_interface;
mod storage_file;

pub use storage_interface::*;
pub use storage_file::FileStorage;

// In-memory implementation for testing.
#[cfg(test)]
mod storage_mock;
#[cfg(test)]
pub use storage_mock::MockStorage;
