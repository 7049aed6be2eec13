use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::storage_interface::*;
use crate::error::{StorageError, StorageResult};

/// Storage backed by an image file on the host filesystem.
pub struct FileStorage {
    path: PathBuf,
    file: File,
}

impl FileStorage {
    /// Open an existing image for reading and writing. The file is never
    /// created here; a missing image is an error.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", path.display())));
        }
        let len = metadata.len();
        info!("Opened image '{}' ({} bytes).", path.display(), len);
        Ok(FileStorage { path, file })
    }

    /// Create a zero-filled image of exactly `len` bytes. An existing file
    /// is only replaced if `overwrite` is set.
    pub fn create(path: impl Into<PathBuf>, len: u64, overwrite: bool) -> io::Result<Self> {
        let path = path.into();
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options.open(&path)?;
        file.set_len(len)?;
        info!("Created image '{}' ({} bytes).", path.display(), len);
        Ok(FileStorage { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn image_len(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_range(&mut self, offset: u64, buffer: &mut [u8],
                  cancel: &dyn Fn() -> bool) -> StorageResult<()> {
        check_range(self.image_len()?, offset, buffer.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        for chunk in buffer.chunks_mut(CHUNK_SIZE) {
            if cancel() {
                debug!("Read of {:#X}+{:#X} on '{}' cancelled.",
                       offset, chunk.len(), self.path.display());
                return Err(StorageError::Cancelled);
            }
            self.file.read_exact(chunk)?;
        }
        Ok(())
    }

    fn write_range(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        check_range(self.image_len()?, offset, data.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
