//! Byte-addressable backing store.
//!
//! The memory store has no timing of its own — it is the untimed word/
//! halfword/byte load and store collaborator named in `spec.md` §1. All
//! access-latency modeling lives in [`crate::cache::CacheSim`] and the
//! controller; this module only holds bytes and bounds-checks addresses.

/// A flat, byte-addressable memory of fixed size.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Creates a zero-filled memory of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Total addressable size in bytes (`MEMORY_SIZE`).
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Loads a raw program image starting at address 0, truncating or
    /// zero-padding as needed to fit.
    pub fn load_image(&mut self, image: &[u8]) {
        let n = image.len().min(self.bytes.len());
        self.bytes[..n].copy_from_slice(&image[..n]);
    }

    fn in_bounds(&self, addr: u64, width: u64) -> bool {
        addr.saturating_add(width) <= self.bytes.len() as u64
    }

    /// Reads a little-endian byte. Returns `None` if any byte of the
    /// access falls at or beyond `MEMORY_SIZE`.
    pub fn load_u8(&self, addr: u64) -> Option<u8> {
        self.in_bounds(addr, 1).then(|| self.bytes[addr as usize])
    }

    /// Reads a little-endian halfword.
    pub fn load_u16(&self, addr: u64) -> Option<u16> {
        self.in_bounds(addr, 2).then(|| {
            let a = addr as usize;
            u16::from_le_bytes([self.bytes[a], self.bytes[a + 1]])
        })
    }

    /// Reads a little-endian word.
    pub fn load_u32(&self, addr: u64) -> Option<u32> {
        self.in_bounds(addr, 4).then(|| {
            let a = addr as usize;
            u32::from_le_bytes([
                self.bytes[a],
                self.bytes[a + 1],
                self.bytes[a + 2],
                self.bytes[a + 3],
            ])
        })
    }

    /// Writes a little-endian byte. Returns `false` if out of bounds.
    pub fn store_u8(&mut self, addr: u64, val: u8) -> bool {
        if !self.in_bounds(addr, 1) {
            return false;
        }
        self.bytes[addr as usize] = val;
        true
    }

    /// Writes a little-endian halfword. Returns `false` if out of bounds.
    pub fn store_u16(&mut self, addr: u64, val: u16) -> bool {
        if !self.in_bounds(addr, 2) {
            return false;
        }
        let a = addr as usize;
        self.bytes[a..a + 2].copy_from_slice(&val.to_le_bytes());
        true
    }

    /// Writes a little-endian word. Returns `false` if out of bounds.
    pub fn store_u32(&mut self, addr: u64, val: u32) -> bool {
        if !self.in_bounds(addr, 4) {
            return false;
        }
        let a = addr as usize;
        self.bytes[a..a + 4].copy_from_slice(&val.to_le_bytes());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trips() {
        let mut m = Memory::new(64);
        assert!(m.store_u32(4, 0xdead_beef));
        assert_eq!(m.load_u32(4), Some(0xdead_beef));
    }

    #[test]
    fn out_of_bounds_load_returns_none() {
        let m = Memory::new(16);
        assert_eq!(m.load_u32(13), None);
        assert_eq!(m.load_u8(16), None);
    }

    #[test]
    fn load_image_truncates_to_capacity() {
        let mut m = Memory::new(4);
        m.load_image(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(m.load_u32(0), Some(u32::from_le_bytes([1, 2, 3, 4])));
    }
}
