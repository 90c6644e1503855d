//! Owned CPU-side byte buffer.
//!
//! [`Buffer`] is the currency for every CPU-side GPU payload: uniform block
//! mirrors, texture images, vertex data staged for upload. It owns its bytes
//! exclusively; cloning or [`Buffer::copy`] always duplicates the contents.
//!
//! All accessors are bounds-checked. Writes past the end of the allocation
//! return [`BufferError::OutOfBounds`] instead of touching memory.
//!
//! # Example
//!
//! ```
//! use rime_core::buffer::Buffer;
//!
//! let mut buffer = Buffer::new();
//! buffer.allocate(16);
//! buffer.write(bytemuck::bytes_of(&0.5f32), 4).unwrap();
//! assert_eq!(buffer.read::<f32>(4).unwrap(), 0.5);
//! assert!(buffer.write(&[0u8; 8], 12).is_err());
//! ```

use std::ops::{Index, IndexMut};

use bytemuck::Pod;

/// Errors raised by checked [`Buffer`] access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// An access would touch bytes past the end of the allocation.
    #[error("access of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds {
        /// Start of the access in bytes.
        offset: usize,
        /// Length of the access in bytes.
        len: usize,
        /// Size of the buffer in bytes.
        size: usize,
    },
    /// A borrowed typed view does not satisfy the alignment of the type.
    #[error("view at offset {offset} is not aligned to {align} bytes")]
    Misaligned {
        /// Start of the view in bytes.
        offset: usize,
        /// Required alignment of the viewed type.
        align: usize,
    },
    /// The buffer length is not a multiple of the element size.
    #[error("buffer of {size} bytes is not a whole number of {element}-byte elements")]
    SizeMismatch {
        /// Size of the buffer in bytes.
        size: usize,
        /// Size of one element in bytes.
        element: usize,
    },
}

/// An exclusively owned region of bytes.
///
/// A default-constructed buffer, or one allocated with size zero, has no
/// storage and reports as not present (see [`Buffer::is_present`]).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Buffer {
    data: Option<Box<[u8]>>,
}

impl Buffer {
    /// Create an empty buffer with no storage.
    pub const fn new() -> Self {
        Self { data: None }
    }

    /// Create a zeroed buffer of `size` bytes.
    pub fn with_size(size: usize) -> Self {
        let mut buffer = Self::new();
        buffer.allocate(size);
        buffer
    }

    /// Create a buffer holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::new();
        }
        Self {
            data: Some(bytes.into()),
        }
    }

    /// Create a deep copy of `source`.
    ///
    /// The returned buffer never aliases `source`.
    pub fn copy(source: &Buffer) -> Self {
        Self::from_slice(source.as_bytes())
    }

    /// Replace the storage with `size` fresh bytes.
    ///
    /// The previous allocation is always released first. A size of zero
    /// leaves the buffer empty and not present.
    pub fn allocate(&mut self, size: usize) {
        self.data = None;
        if size == 0 {
            return;
        }
        self.data = Some(vec![0u8; size].into_boxed_slice());
    }

    /// Release the storage.
    pub fn release(&mut self) {
        self.data = None;
    }

    /// Set every byte to zero.
    pub fn zero_initialize(&mut self) {
        if let Some(data) = self.data.as_deref_mut() {
            data.fill(0);
        }
    }

    /// Size of the allocation in bytes.
    pub fn size(&self) -> usize {
        self.data.as_deref().map_or(0, <[u8]>::len)
    }

    /// Whether the buffer has storage.
    pub fn is_present(&self) -> bool {
        self.data.is_some()
    }

    /// The whole buffer as bytes (empty when not present).
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// The whole buffer as mutable bytes (empty when not present).
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }

    /// Copy `data` into the buffer starting at `offset`.
    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<(), BufferError> {
        let range = self.check_range(offset, data.len())?;
        self.as_bytes_mut()[range].copy_from_slice(data);
        Ok(())
    }

    /// Write a plain value at `offset`.
    pub fn write_value<T: Pod>(&mut self, value: &T, offset: usize) -> Result<(), BufferError> {
        self.write(bytemuck::bytes_of(value), offset)
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8], BufferError> {
        let range = self.check_range(offset, len)?;
        Ok(&self.as_bytes()[range])
    }

    /// Read a value of type `T` at `offset`.
    ///
    /// The read does not require `offset` to be aligned for `T`.
    pub fn read<T: Pod>(&self, offset: usize) -> Result<T, BufferError> {
        let bytes = self.slice(offset, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Borrow the bytes at `offset` as a `T`.
    pub fn view<T: Pod>(&self, offset: usize) -> Result<&T, BufferError> {
        let bytes = self.slice(offset, std::mem::size_of::<T>())?;
        bytemuck::try_from_bytes(bytes).map_err(|_| BufferError::Misaligned {
            offset,
            align: std::mem::align_of::<T>(),
        })
    }

    /// Borrow the whole buffer as a slice of `T`.
    pub fn as_slice_of<T: Pod>(&self) -> Result<&[T], BufferError> {
        let element = std::mem::size_of::<T>();
        if element == 0 || self.size() % element != 0 {
            return Err(BufferError::SizeMismatch {
                size: self.size(),
                element,
            });
        }
        bytemuck::try_cast_slice(self.as_bytes()).map_err(|_| BufferError::Misaligned {
            offset: 0,
            align: std::mem::align_of::<T>(),
        })
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, BufferError> {
        let size = self.size();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(offset..end),
            _ => Err(BufferError::OutOfBounds { offset, len, size }),
        }
    }
}

impl Index<usize> for Buffer {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.as_bytes()[index]
    }
}

impl IndexMut<usize> for Buffer {
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.as_bytes_mut()[index]
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::new();
        }
        Self {
            data: Some(bytes.into_boxed_slice()),
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size())
            .field("present", &self.is_present())
            .finish()
    }
}
