//! Append-only instruction stream.
//!
//! Every byte in a program is a 7-bit code below [`NUM_VALUES`]; the three
//! codes above it are reserved and never emitted.

use crate::errors::*;
use byteorder::WriteBytesExt;

/// Number of distinct encodable byte values (128 minus 3 reserved codes).
pub const NUM_VALUES: u8 = 128 - 3;

/// Largest valid encoded byte.
pub const MAX_BYTE: u8 = NUM_VALUES - 1;

/// Buffer of validated program bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteStream {
    data: Vec<u8>,
}

impl ByteStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Append one byte, rejecting anything outside `0..NUM_VALUES`.
    pub fn write(&mut self, value: u8) -> Result<()> {
        if value >= NUM_VALUES {
            return Err(SynthCodeError::Range(value as i64));
        }
        self.data.write_u8(value)?;
        Ok(())
    }

    /// Append a sequence of bytes in order.
    ///
    /// Bytes before an invalid one are kept; the failing byte and everything
    /// after it are not written.
    pub fn write_all(&mut self, values: &[u8]) -> Result<()> {
        for &value in values {
            self.write(value)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream and return the finished bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_valid_bytes() {
        let mut stream = ByteStream::new();
        stream.write(0).unwrap();
        stream.write(MAX_BYTE).unwrap();
        assert_eq!(stream.as_bytes(), &[0, 124]);
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_reserved_bytes_rejected() {
        let mut stream = ByteStream::new();
        for value in [125u8, 126, 127, 255] {
            match stream.write(value) {
                Err(SynthCodeError::Range(v)) => assert_eq!(v, value as i64),
                other => panic!("expected range error, got {:?}", other),
            }
        }
        assert!(stream.is_empty());
    }

    #[test]
    fn test_write_all_stops_at_invalid_byte() {
        let mut stream = ByteStream::new();
        assert!(stream.write_all(&[1, 2, 200, 3]).is_err());
        assert_eq!(stream.into_bytes(), vec![1, 2]);
    }
}
