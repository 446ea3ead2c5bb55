//! Pointer values
//!
//! A pointer is stored inline as 4 little-endian bytes holding the target
//! offset plus the cartridge base address. Stored values outside the mapped
//! ROM window decode to [`Pointer::Null`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width in bytes of a stored pointer
pub const POINTER_SIZE: usize = 4;

/// Base address the cartridge is mapped at
pub const ROM_BASE: u32 = 0x0800_0000;

/// First stored value past the mapped ROM window
pub const ROM_LIMIT: u32 = 0x0A00_0000;

/// A decoded pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pointer {
    /// No target
    Null,
    /// Offset into the byte store
    To(usize),
}

impl Pointer {
    /// Decodes a raw stored value
    pub fn decode(raw: u32) -> Self {
        if (ROM_BASE..ROM_LIMIT).contains(&raw) {
            Pointer::To((raw - ROM_BASE) as usize)
        } else {
            Pointer::Null
        }
    }

    /// Encodes this pointer as the raw value stored in the byte store.
    ///
    /// Null encodes as zero. Targets past [`Pointer::max_address`] have no
    /// stored form and return `None`.
    pub fn encode(self) -> Option<u32> {
        match self {
            Pointer::Null => Some(0),
            Pointer::To(address) if address <= Self::max_address() => {
                Some(ROM_BASE + address as u32)
            }
            Pointer::To(_) => None,
        }
    }

    /// Decodes a pointer from 4 little-endian bytes
    pub fn from_le_bytes(bytes: [u8; POINTER_SIZE]) -> Self {
        Self::decode(u32::from_le_bytes(bytes))
    }

    /// Returns the 4 little-endian bytes for this pointer, if it has any
    pub fn to_le_bytes(self) -> Option<[u8; POINTER_SIZE]> {
        self.encode().map(u32::to_le_bytes)
    }

    /// Returns the target address, if any
    pub fn address(self) -> Option<usize> {
        match self {
            Pointer::Null => None,
            Pointer::To(address) => Some(address),
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, Pointer::Null)
    }

    /// Largest offset a pointer can reach
    pub fn max_address() -> usize {
        (ROM_LIMIT - ROM_BASE - 1) as usize
    }
}

impl From<usize> for Pointer {
    fn from(address: usize) -> Self {
        Pointer::To(address)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pointer::Null => write!(f, "<null>"),
            Pointer::To(address) => write!(f, "<{:06X}>", address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_in_window() {
        assert_eq!(Pointer::decode(0x0800_0100), Pointer::To(0x100));
        assert_eq!(Pointer::decode(0x09FF_FFFF), Pointer::To(0x01FF_FFFF));
    }

    #[test]
    fn test_decode_outside_window_is_null() {
        assert_eq!(Pointer::decode(0), Pointer::Null);
        assert_eq!(Pointer::decode(0x0100_0000), Pointer::Null);
        assert_eq!(Pointer::decode(ROM_LIMIT), Pointer::Null);
        assert_eq!(Pointer::decode(0xFFFF_FFFF), Pointer::Null);
    }

    #[test]
    fn test_encode_null_is_zero() {
        assert_eq!(Pointer::Null.encode(), Some(0));
        assert_eq!(Pointer::Null.to_le_bytes(), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_encode_outside_window_fails() {
        let last = Pointer::To(Pointer::max_address());
        assert_eq!(last.encode(), Some(ROM_LIMIT - 1));
        assert_eq!(Pointer::decode(ROM_LIMIT - 1), last);
        assert_eq!(Pointer::To(Pointer::max_address() + 1).encode(), None);
        assert_eq!(Pointer::To(0x0300_0000).to_le_bytes(), None);
        assert_eq!(Pointer::To(usize::MAX).encode(), None);
    }

    #[test]
    fn test_le_bytes() {
        let pointer = Pointer::To(0x0001_2345);
        assert_eq!(pointer.to_le_bytes(), Some([0x45, 0x23, 0x01, 0x08]));
        assert_eq!(Pointer::from_le_bytes([0x45, 0x23, 0x01, 0x08]), pointer);
    }

    #[test]
    fn test_display() {
        assert_eq!(Pointer::To(0x1A0).to_string(), "<0001A0>");
        assert_eq!(Pointer::Null.to_string(), "<null>");
    }
}
