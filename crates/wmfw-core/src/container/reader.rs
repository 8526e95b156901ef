//! Bounds-checked little-endian reader over container bytes.

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian};

use super::error::FormatError;

/// Cursor over a byte slice that reports failures with file offsets.
///
/// `base` is the file offset of the first byte of the slice, so nested
/// readers over a block payload still report absolute positions.
pub(crate) struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self {
            cursor: Cursor::new(data),
            base,
        }
    }

    fn data(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    fn pos(&self) -> usize {
        self.cursor.position() as usize
    }

    /// File offset of the next byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos()
    }

    pub fn remaining(&self) -> usize {
        self.data().len().saturating_sub(self.pos())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, what: &'static str, len: usize) -> Result<&'a [u8], FormatError> {
        let available = self.remaining();
        if available < len {
            return Err(FormatError::Truncated {
                what,
                offset: self.offset(),
                needed: len,
                available,
            });
        }
        let start = self.pos();
        self.cursor.set_position((start + len) as u64);
        Ok(&self.data()[start..start + len])
    }

    /// Split off the next `len` bytes as a reader of their own.
    ///
    /// A declared length running past the end of this reader is a length
    /// inconsistency rather than a truncation.
    pub fn sub_reader(&mut self, what: &'static str, len: usize) -> Result<Self, FormatError> {
        let offset = self.offset();
        let available = self.remaining();
        if len > available {
            return Err(FormatError::InconsistentLength {
                what,
                offset,
                declared: len,
                expected: available,
            });
        }
        let bytes = self.take(what, len)?;
        Ok(Self::with_base(bytes, offset))
    }

    /// Advance up to `len` bytes, stopping at the end of the data.
    pub fn skip_lenient(&mut self, len: usize) {
        let len = len.min(self.remaining());
        let pos = self.pos();
        self.cursor.set_position((pos + len) as u64);
    }

    pub fn magic(&mut self, what: &'static str) -> Result<[u8; 4], FormatError> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(self.take(what, 4)?);
        Ok(magic)
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8, FormatError> {
        Ok(self.take(what, 1)?[0])
    }

    pub fn u16(&mut self, what: &'static str) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.take(what, 2)?))
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.take(what, 4)?))
    }

    pub fn u64(&mut self, what: &'static str) -> Result<u64, FormatError> {
        Ok(LittleEndian::read_u64(self.take(what, 8)?))
    }

    /// Length-prefixed string padded so prefix + text fill whole words.
    ///
    /// `prefix` is the width of the length field: 1 or 2 bytes.
    pub fn padded_string(&mut self, what: &'static str, prefix: usize) -> Result<String, FormatError> {
        let start = self.offset();
        let len = match prefix {
            1 => usize::from(self.u8(what)?),
            _ => usize::from(self.u16(what)?),
        };
        let text = self.take(what, len)?;
        let padded = (prefix + len + 3) & !3;
        self.take(what, padded - prefix - len)?;

        std::str::from_utf8(text)
            .map(|s| s.trim_end_matches('\0').to_string())
            .map_err(|_| FormatError::InvalidText {
                what,
                offset: start,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u16("a").unwrap(), 0x1234);
        assert_eq!(r.u32("b").unwrap(), 0x12345678);
        assert_eq!(r.u8("c").unwrap(), 0xAA);
        assert!(r.is_empty());
    }

    #[test]
    fn test_truncation_reports_offset() {
        let data = [0u8; 6];
        let mut r = ByteReader::with_base(&data, 0x100);
        r.u32("first").unwrap();
        let err = r.u32("second").unwrap_err();
        assert_eq!(
            err,
            FormatError::Truncated {
                what: "second",
                offset: 0x104,
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_padded_strings() {
        // u8 prefix: 1 + 5 = 6 -> padded to 8
        let mut data = vec![5];
        data.extend_from_slice(b"hello");
        data.extend_from_slice(&[0, 0]);
        // u16 prefix: 2 + 2 = 4, no padding
        data.extend_from_slice(&[2, 0]);
        data.extend_from_slice(b"hi");
        data.push(0x7F);

        let mut r = ByteReader::new(&data);
        assert_eq!(r.padded_string("name", 1).unwrap(), "hello");
        assert_eq!(r.offset(), 8);
        assert_eq!(r.padded_string("desc", 2).unwrap(), "hi");
        assert_eq!(r.u8("tail").unwrap(), 0x7F);
    }

    #[test]
    fn test_sub_reader_length_check() {
        let data = [1u8, 2, 3, 4];
        let mut r = ByteReader::with_base(&data, 8);
        let err = r.sub_reader("payload", 5).err().unwrap();
        assert!(matches!(
            err,
            FormatError::InconsistentLength {
                declared: 5,
                expected: 4,
                offset: 8,
                ..
            }
        ));

        let mut sub = r.sub_reader("payload", 2).unwrap();
        assert_eq!(sub.offset(), 8);
        assert_eq!(sub.u16("x").unwrap(), 0x0201);
        assert_eq!(r.offset(), 10);
    }
}
