//! Index-addressed byte buffer

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised by byte store access
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Address {address:#X} (+{width}) is outside the buffer of length {length:#X}")]
    OutOfBounds {
        address: usize,
        width: usize,
        length: usize,
    },

    #[error("Unsupported integer width: {0}")]
    InvalidWidth(usize),

    #[error("Cannot shrink buffer from {current:#X} to {requested:#X}")]
    Shrink { current: usize, requested: usize },
}

/// The raw bytes of one loaded file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteStore {
    data: Vec<u8>,
}

impl ByteStore {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Creates a buffer of `length` copies of `byte`
    pub fn filled(length: usize, byte: u8) -> Self {
        Self {
            data: vec![byte; length],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn get(&self, address: usize) -> Option<u8> {
        self.data.get(address).copied()
    }

    /// Returns `length` bytes starting at `address`
    pub fn slice(&self, address: usize, length: usize) -> Result<&[u8], StoreError> {
        self.check_bounds(address, length)?;
        Ok(&self.data[address..address + length])
    }

    /// Reads a little-endian unsigned integer of 1 to 4 bytes
    pub fn read_value(&self, address: usize, width: usize) -> Result<u32, StoreError> {
        if !(1..=4).contains(&width) {
            return Err(StoreError::InvalidWidth(width));
        }
        let bytes = self.slice(address, width)?;
        Ok(bytes
            .iter()
            .rev()
            .fold(0u32, |value, byte| (value << 8) | u32::from(*byte)))
    }

    /// Checks that `[address, address + width)` lies inside the buffer
    pub fn check_bounds(&self, address: usize, width: usize) -> Result<(), StoreError> {
        match address.checked_add(width) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(StoreError::OutOfBounds {
                address,
                width,
                length: self.data.len(),
            }),
        }
    }

    /// Checks whether every byte in the range equals `filler`
    pub fn is_filled_with(&self, address: usize, length: usize, filler: u8) -> bool {
        self.slice(address, length)
            .map(|bytes| bytes.iter().all(|b| *b == filler))
            .unwrap_or(false)
    }

    /// SHA-256 of the current contents
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        hasher.finalize().into()
    }

    pub(crate) fn set(&mut self, address: usize, value: u8) {
        self.data[address] = value;
    }

    pub(crate) fn resize(&mut self, length: usize, filler: u8) {
        self.data.resize(length, filler);
    }
}

impl From<Vec<u8>> for ByteStore {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl std::ops::Index<usize> for ByteStore {
    type Output = u8;

    fn index(&self, address: usize) -> &u8 {
        &self.data[address]
    }
}

/// Splits `value` into `width` little-endian bytes
pub fn value_to_le_bytes(value: u32, width: usize) -> Vec<u8> {
    (0..width).map(|i| (value >> (8 * i)) as u8).collect()
}
