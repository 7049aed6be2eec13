use crate::error::{StorageError, StorageResult};
use crate::geometry::BLOCK_SIZE;

/// Granularity at which reads check their cancel predicate: one SD sector.
pub const CHUNK_SIZE: usize = BLOCK_SIZE;

/// Block-addressable durable store holding a flat disk image.
///
/// Reads are cancellable: implementations must call `cancel` before every
/// chunk of `CHUNK_SIZE` bytes and give up with `StorageError::Cancelled`
/// as soon as it returns true. After a cancelled or failed read the contents
/// of `buffer` are undefined. Writes are never cancellable.
pub trait Storage: Send {
    /// Size of the image in bytes, as the medium reports it now.
    fn image_len(&self) -> StorageResult<u64>;

    fn read_range(&mut self, offset: u64, buffer: &mut [u8],
                  cancel: &dyn Fn() -> bool) -> StorageResult<()>;

    fn write_range(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Push buffered writes through to the medium.
    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

/// Ensure `offset..offset+len` lies within an image of `image_len` bytes.
pub fn check_range(image_len: u64, offset: u64, len: usize) -> StorageResult<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= image_len => Ok(()),
        _ => Err(StorageError::OutOfRange { offset, len }),
    }
}
