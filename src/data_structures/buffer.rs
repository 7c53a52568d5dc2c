//! Arena-style growable buffer with an explicit capacity.
//!
//! The capacity mirrors the size of the GPU buffer backing the data: whenever an append
//! would overflow it, the capacity doubles and the existing contents are copied into a new
//! allocation, exactly what happens to the device buffer on the other side. Callers hold
//! element offsets, never references, so growth never invalidates anything they recorded.

use std::ops::Range;

#[derive(Clone, Debug)]
pub struct GrowableBuffer<T: bytemuck::Pod> {
    data: Vec<T>,
    capacity: usize,
    growths: u32,
}

impl<T: bytemuck::Pod> GrowableBuffer<T> {
    pub fn new(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            growths: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of elements the backing storage holds before the next reallocation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times the buffer had to reallocate so far.
    pub fn growths(&self) -> u32 {
        self.growths
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Append `items` and return the element range they landed in.
    pub fn extend_from_slice(&mut self, items: &[T]) -> Range<usize> {
        self.reserve(items.len());
        let start = self.data.len();
        self.data.extend_from_slice(items);
        start..self.data.len()
    }

    /// Forget the contents but keep the capacity.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn reserve(&mut self, extra: usize) {
        let required = self.data.len() + extra;
        if required <= self.capacity {
            return;
        }
        let mut capacity = self.capacity;
        while required > capacity {
            capacity *= 2;
        }
        // Copy into a fresh allocation of exactly the new capacity so the CPU side keeps the
        // same shape as the recreated device buffer.
        let mut grown = Vec::with_capacity(capacity);
        grown.extend_from_slice(&self.data);
        log::debug!(
            "growing buffer from {} to {} elements ({} in use)",
            self.capacity,
            capacity,
            self.data.len()
        );
        self.data = grown;
        self.capacity = capacity;
        self.growths += 1;
    }
}

