//! Decode cursor over a binary buffer.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::wire::{zigzag_decode_32, zigzag_decode_64, MAX_BLOCK_SIZE};

/// Reader decodes wire data from a binary buffer.
///
/// The buffer itself is never mutated; the reader only advances its own
/// position, so a failed decode leaves the caller's slice as it was.
pub struct Reader<'a> {
    buffer: &'a [u8],
    pos: usize,
}

/// Maximum number of bytes for a varint-encoded uint64.
/// A uint64 has 64 bits, and each varint byte encodes 7 bits,
/// so we need ceil(64/7) = 10 bytes maximum.
const MAX_VARINT_BYTES: usize = 10;

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buffer: data,
            pos: 0,
        }
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes remaining.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Returns the unconsumed tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.pos..]
    }

    /// Checks if there are enough bytes available.
    fn check_available(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(Error::short_buffer(needed, self.remaining()));
        }
        Ok(())
    }

    /// Reads a raw byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.check_available(1)?;
        let value = self.buffer[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Reads raw bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        self.check_available(length)?;
        let bytes = &self.buffer[self.pos..self.pos + length];
        self.pos += length;
        Ok(bytes)
    }

    /// Reads an unsigned varint (LEB128), capped to 32 bits.
    pub fn read_varint(&mut self) -> Result<u32> {
        let mut result: u32 = 0;
        let mut shift = 0;

        for i in 0..MAX_VARINT_BYTES {
            self.check_available(1)?;
            let b = self.buffer[self.pos];
            self.pos += 1;

            // At the 5th byte (index 4), we've consumed 28 bits.
            // The 5th byte can only contribute 4 more bits for a 32-bit value.
            if i == 4 && (b & 0xf0) != 0 {
                return Err(Error::VarintOverflow);
            }

            result |= ((b & 0x7f) as u32) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(Error::VarintOverflow)
    }

    /// Reads an unsigned 64-bit varint (LEB128), at most 10 bytes.
    pub fn read_varint64(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for i in 0..MAX_VARINT_BYTES {
            self.check_available(1)?;
            let b = self.buffer[self.pos];
            self.pos += 1;

            // At the 10th byte (index 9), we've consumed 63 bits.
            // The 10th byte can only contribute 1 more bit (bit 63 of uint64).
            if i == 9 && b > 1 {
                return Err(Error::VarintOverflow);
            }

            result |= ((b & 0x7f) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(Error::VarintOverflow)
    }

    /// Reads a zig-zag encoded 32-bit integer.
    pub fn read_int(&mut self) -> Result<i32> {
        Ok(zigzag_decode_32(self.read_varint()?))
    }

    /// Reads a zig-zag encoded 64-bit integer.
    pub fn read_long(&mut self) -> Result<i64> {
        Ok(zigzag_decode_64(self.read_varint64()?))
    }

    /// Reads a boolean. Wire bytes other than 0 and 1 are malformed.
    pub fn read_boolean(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::malformed(format!("invalid boolean byte: {b:#04x}"))),
        }
    }

    /// Reads a 32-bit float (IEEE 754, little-endian).
    pub fn read_float(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(LittleEndian::read_f32(bytes))
    }

    /// Reads a 64-bit float (IEEE 754, little-endian).
    pub fn read_double(&mut self) -> Result<f64> {
        let bytes = self.read_bytes(8)?;
        Ok(LittleEndian::read_f64(bytes))
    }

    /// Reads a long length prefix, rejecting negative or oversized values.
    fn read_length(&mut self) -> Result<usize> {
        let length = self.read_long()?;
        if length < 0 {
            return Err(Error::malformed(format!("negative length: {length}")));
        }
        if length > MAX_BLOCK_SIZE {
            return Err(Error::malformed(format!(
                "length {length} exceeds maximum {MAX_BLOCK_SIZE}"
            )));
        }
        Ok(length as usize)
    }

    /// Reads length-prefixed bytes.
    pub fn read_length_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let length = self.read_length()?;
        self.read_bytes(length)
    }

    /// Reads a length-prefixed string.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let bytes = self.read_length_prefixed_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }
}
