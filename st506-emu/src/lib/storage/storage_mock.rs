use std::io;

use super::storage_interface::*;
use crate::error::{StorageError, StorageResult};

/// Called with the chunk index before each chunk of a read.
pub type ChunkHook = Box<dyn FnMut(usize) + Send>;

/// An in-memory image that records what the controller does to it.
pub struct MockStorage {
    pub data: Vec<u8>,
    /// Every successful write, as (offset, length).
    pub writes: Vec<(u64, usize)>,
    pub reads: usize,
    pub syncs: usize,
    /// Make the image size unreadable, as if the medium had gone away.
    pub fail_len: bool,
    pub fail_reads: bool,
    /// Number of writes allowed to succeed before every further write fails.
    pub write_budget: Option<usize>,
    pub chunk_hook: Option<ChunkHook>,
}

impl MockStorage {
    /// A zero-filled image of the given size.
    pub fn new(len: usize) -> Self {
        Self::with_data(vec![0; len])
    }

    pub fn with_data(data: Vec<u8>) -> Self {
        MockStorage {
            data,
            writes: Vec::new(),
            reads: 0,
            syncs: 0,
            fail_len: false,
            fail_reads: false,
            write_budget: None,
            chunk_hook: None,
        }
    }
}

impl Storage for MockStorage {
    fn image_len(&self) -> StorageResult<u64> {
        if self.fail_len {
            return Err(StorageError::Io(io::Error::new(io::ErrorKind::NotFound, "mock medium removed")));
        }
        Ok(self.data.len() as u64)
    }

    fn read_range(&mut self, offset: u64, buffer: &mut [u8],
                  cancel: &dyn Fn() -> bool) -> StorageResult<()> {
        check_range(self.data.len() as u64, offset, buffer.len())?;
        self.reads += 1;
        if self.fail_reads {
            return Err(StorageError::Io(io::Error::new(io::ErrorKind::Other, "mock read failure")));
        }
        let start = offset as usize;
        for (i, chunk) in buffer.chunks_mut(CHUNK_SIZE).enumerate() {
            if let Some(hook) = self.chunk_hook.as_mut() {
                hook(i);
            }
            if cancel() {
                return Err(StorageError::Cancelled);
            }
            let from = start + i * CHUNK_SIZE;
            chunk.copy_from_slice(&self.data[from..from + chunk.len()]);
        }
        Ok(())
    }

    fn write_range(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        check_range(self.data.len() as u64, offset, data.len())?;
        if let Some(budget) = self.write_budget.as_mut() {
            if *budget == 0 {
                return Err(StorageError::Io(io::Error::new(io::ErrorKind::Other, "mock write failure")));
            }
            *budget -= 1;
        }
        let start = offset as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
        self.writes.push((offset, data.len()));
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.syncs += 1;
        Ok(())
    }
}
