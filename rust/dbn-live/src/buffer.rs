use std::{mem, time::Duration};

use dbn::decode::AlignedBuffer;

use crate::{
    transport::{ReadResult, Transport},
    Error, Result,
};

/// The session's receive buffer: a fixed-capacity, 8-byte aligned region with a
/// `consumed` cursor for bytes handed to the caller and a `valid` cursor for bytes
/// received from the transport.
///
/// The buffer never grows. Filling first compacts the unread bytes to the front so a
/// session can stream indefinitely within the same allocation.
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    inner: AlignedBuffer,
}

impl RecordBuffer {
    /// The default capacity in bytes.
    pub const DEFAULT_CAPACITY: usize = 64 * 1024;

    /// Creates a buffer with at least `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: AlignedBuffer::with_capacity(capacity),
        }
    }

    /// Returns the capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns the received bytes that haven't been consumed.
    pub fn unread(&self) -> &[u8] {
        self.inner.unread()
    }

    /// Returns the number of received bytes that haven't been consumed.
    pub fn unread_len(&self) -> usize {
        self.inner.unread_len()
    }

    /// Consumes up to `count` unread bytes, returning how many were consumed.
    pub fn advance(&mut self, count: usize) -> usize {
        self.inner.advance(count)
    }

    /// Shifts the unread bytes to the front of the buffer, then performs one read from
    /// `transport` into the remaining capacity.
    ///
    /// # Errors
    /// This function returns an error if the buffer is already full of unread bytes,
    /// since reading could never make progress, or if the transport fails.
    pub fn compact_and_fill<T: Transport>(
        &mut self,
        transport: &mut T,
        timeout: Option<Duration>,
    ) -> Result<ReadResult> {
        self.inner.compact();
        let spare = self.inner.spare_mut();
        if spare.is_empty() {
            return Err(Error::config(
                "buffer_size",
                format!(
                    "buffer of {} bytes is full without containing a complete message",
                    self.capacity()
                ),
            ));
        }
        let res = transport
            .read_some(spare, timeout)
            .map_err(|e| Error::io(e, "reading from gateway"))?;
        self.inner.commit(res.read_size);
        Ok(res)
    }

    /// Consumes `count` bytes and returns them. The returned slice is 8-byte aligned.
    ///
    /// Callers must ensure at least `count` bytes are unread.
    pub(crate) fn take(&mut self, count: usize) -> &[u8] {
        debug_assert!(count <= self.unread_len());
        if self.inner.unread().as_ptr().align_offset(mem::align_of::<u64>()) != 0 {
            self.inner.compact();
        }
        self.inner.take(count)
    }

    /// Discards every buffered byte.
    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
