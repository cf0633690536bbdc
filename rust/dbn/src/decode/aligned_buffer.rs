use std::mem;

/// A fixed-capacity byte buffer backed by `Box<[u64]>` so the start of the buffer is
/// always 8-byte aligned, as required for viewing records in place.
///
/// Bytes are appended to the spare capacity with [`spare_mut()`](Self::spare_mut) and
/// [`commit()`](Self::commit) and consumed from the front with
/// [`advance()`](Self::advance). [`compact()`](Self::compact) moves the unread bytes
/// back to the start of the buffer, which restores alignment for the next record.
///
/// Invariant: `consumed <= valid <= capacity()`
#[derive(Debug, Clone)]
pub struct AlignedBuffer {
    memory: Box<[u64]>,
    /// Byte offset of the first unread byte.
    consumed: usize,
    /// Byte offset one past the last received byte.
    valid: usize,
}

impl AlignedBuffer {
    /// Allocates a new buffer with at least `capacity` usable bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            memory: vec![0; capacity.div_ceil(mem::size_of::<u64>())].into_boxed_slice(),
            consumed: 0,
            valid: 0,
        }
    }

    fn bytes(&self) -> &[u8] {
        // Safety: `u64` storage is valid for reads as bytes
        unsafe { std::slice::from_raw_parts(self.memory.as_ptr().cast::<u8>(), self.capacity()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // Safety: `u64` storage is valid for writes as bytes
        unsafe {
            std::slice::from_raw_parts_mut(self.memory.as_mut_ptr().cast::<u8>(), self.capacity())
        }
    }

    /// Returns the buffer's byte capacity.
    pub fn capacity(&self) -> usize {
        self.memory.len() * mem::size_of::<u64>()
    }

    /// Returns the received bytes that haven't been consumed yet.
    pub fn unread(&self) -> &[u8] {
        &self.bytes()[self.consumed..self.valid]
    }

    /// Returns the number of received bytes that haven't been consumed yet.
    pub fn unread_len(&self) -> usize {
        self.valid - self.consumed
    }

    /// Returns the free space after the received bytes.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let valid = self.valid;
        &mut self.bytes_mut()[valid..]
    }

    /// Marks `count` bytes of the spare capacity as received. Returns the number of
    /// bytes committed, which is capped to the spare capacity.
    pub fn commit(&mut self, count: usize) -> usize {
        let count = count.min(self.capacity() - self.valid);
        self.valid += count;
        count
    }

    /// Consumes `count` unread bytes. Returns the number of bytes consumed, which is
    /// capped to [`unread_len()`](Self::unread_len).
    pub fn advance(&mut self, count: usize) -> usize {
        let count = count.min(self.unread_len());
        self.consumed += count;
        count
    }

    /// Consumes up to `count` unread bytes and returns them.
    pub fn take(&mut self, count: usize) -> &[u8] {
        let start = self.consumed;
        let count = self.advance(count);
        &self.bytes()[start..start + count]
    }

    /// Moves the unread bytes to the start of the buffer, discarding consumed bytes.
    pub fn compact(&mut self) {
        if self.consumed > 0 {
            let (consumed, valid) = (self.consumed, self.valid);
            self.bytes_mut().copy_within(consumed..valid, 0);
            self.valid -= consumed;
            self.consumed = 0;
        }
    }

    /// Discards all bytes.
    pub fn clear(&mut self) {
        self.consumed = 0;
        self.valid = 0;
    }
}
