//! Recyclable pixel buffer pool
//!
//! A recycling allocator of fixed-geometry RGBA buffers matching the
//! encoder's input requirements. Buffers are exclusively writable while held;
//! their backing storage returns to the pool's free list once the encoder has
//! consumed them.

use std::sync::{Arc, Mutex, PoisonError};

/// Spare buffers kept around for reuse; anything beyond this is freed
const MAX_SPARE_BUFFERS: usize = 4;

type FreeList = Arc<Mutex<Vec<Vec<u8>>>>;

/// Pool of reusable RGBA buffers with a fixed geometry
#[derive(Debug)]
pub struct PixelBufferPool {
    width: u32,
    height: u32,
    spare: FreeList,
}

impl PixelBufferPool {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            spare: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Obtain a buffer matching the pool geometry, recycling spare storage
    /// when available.
    pub fn acquire(&self) -> PooledBuffer {
        let recycled = self
            .spare
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let data = recycled.unwrap_or_else(|| vec![0u8; self.byte_len()]);

        PooledBuffer {
            width: self.width,
            height: self.height,
            data,
            spare: Arc::clone(&self.spare),
        }
    }

    /// Hand backing storage back to the pool, e.g. after the encoder has
    /// consumed a submitted frame.
    pub fn release(&self, storage: Vec<u8>) {
        recycle(&self.spare, self.byte_len(), storage);
    }

    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

fn recycle(spare: &Mutex<Vec<Vec<u8>>>, expected_len: usize, storage: Vec<u8>) {
    if storage.len() != expected_len {
        return;
    }
    let mut spare = spare.lock().unwrap_or_else(PoisonError::into_inner);
    if spare.len() < MAX_SPARE_BUFFERS {
        spare.push(storage);
    }
}

/// A pooled RGBA buffer
///
/// Dropping the buffer returns its storage to the pool. [`detach`] transfers
/// the storage out instead, for handing to the encoder; the caller is then
/// responsible for releasing it back via [`PixelBufferPool::release`].
///
/// [`detach`]: PooledBuffer::detach
#[derive(Debug)]
pub struct PooledBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    spare: FreeList,
}

impl PooledBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take ownership of the backing storage, consuming the buffer
    pub fn detach(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if self.data.is_empty() {
            return;
        }
        let expected = self.width as usize * self.height as usize * 4;
        recycle(&self.spare, expected, std::mem::take(&mut self.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_matches_geometry() {
        let pool = PixelBufferPool::new(4, 3);
        let buffer = pool.acquire();
        assert_eq!(buffer.width(), 4);
        assert_eq!(buffer.height(), 3);
        assert_eq!(buffer.data().len(), 4 * 3 * 4);
    }

    #[test]
    fn test_dropped_buffer_storage_is_reused() {
        let pool = PixelBufferPool::new(2, 2);
        let mut buffer = pool.acquire();
        buffer.data_mut()[0] = 42;
        drop(buffer);

        // The recycled storage comes back as-is; callers overwrite every byte
        let reused = pool.acquire();
        assert_eq!(reused.data()[0], 42);
    }

    #[test]
    fn test_detach_prevents_recycling_until_release() {
        let pool = PixelBufferPool::new(2, 2);
        let storage = pool.acquire().detach();

        let fresh = pool.acquire();
        assert_eq!(fresh.data()[0], 0);

        pool.release(storage);
        drop(fresh);
    }

    #[test]
    fn test_release_rejects_wrong_size() {
        let pool = PixelBufferPool::new(2, 2);
        pool.release(vec![0u8; 3]);
        // A wrong-sized vector must never be handed out again
        let buffer = pool.acquire();
        assert_eq!(buffer.data().len(), 16);
    }
}
