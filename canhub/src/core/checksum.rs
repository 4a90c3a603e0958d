//! Running checksums used by the wire trailers.
//!
//! - [`Sum8`]: 8-bit unsigned additive sum, trailer of fixed (`0x44`) frames.
//! - [`Crc32`]: CRC-32 with the IEEE 802.3 polynomial (the one zlib uses),
//!   trailer of variable (`0x66`) frames.
//!
//! # Example
//!
//! ```rust
//! use canhub::{Crc32, Sum8};
//!
//! let data = b"123456789";
//! assert_eq!(Crc32::compute(data), 0xCBF43926);
//! assert_eq!(Sum8::compute(&[0xff, 0x02]), 0x01);
//! ```

/// CRC32 polynomial (IEEE 802.3, reflected).
const CRC32_POLYNOMIAL: u32 = 0xEDB88320;

/// Pre-computed CRC32 lookup table.
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

/// Generates the CRC32 lookup table at compile time.
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC32_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// CRC32 checksum calculator.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    /// Current CRC state (inverted for final output).
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    /// Creates a new CRC32 calculator with initial state.
    #[inline]
    pub const fn new() -> Self {
        Self { state: 0xFFFFFFFF }
    }

    /// Feeds one byte. The decoder calls this for every frame byte.
    #[inline]
    pub fn update_byte(&mut self, byte: u8) {
        let index = ((self.state ^ (byte as u32)) & 0xFF) as usize;
        self.state = (self.state >> 8) ^ CRC32_TABLE[index];
    }

    /// Updates the CRC with the given data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    /// Returns the checksum of everything fed so far.
    ///
    /// Does not consume the running state, so more bytes may follow.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.state ^ 0xFFFFFFFF
    }

    /// Computes the CRC32 checksum of the given data in one call.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.value()
    }

    /// Resets the CRC calculator to initial state.
    #[inline]
    pub fn reset(&mut self) {
        self.state = 0xFFFFFFFF;
    }
}

/// 8-bit additive checksum: the low byte of the sum of all bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum8 {
    state: u8,
}

impl Sum8 {
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    #[inline]
    pub fn update_byte(&mut self, byte: u8) {
        self.state = self.state.wrapping_add(byte);
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    #[inline]
    pub const fn value(&self) -> u8 {
        self.state
    }

    pub fn compute(data: &[u8]) -> u8 {
        let mut sum = Self::new();
        sum.update(data);
        sum.value()
    }

    #[inline]
    pub fn reset(&mut self) {
        self.state = 0;
    }
}
