//! Endian-aware byte buffer for reading and writing MaxDB packets.
//!
//! A [`ByteBuffer`] is a view over some byte storage with a logical origin
//! (`offset`) and a byte order. Every access is expressed relative to the
//! origin and is bounds-checked; out-of-range access yields
//! [`Error::BufferTooSmall`] rather than a panic, so a malformed reply can be
//! reported instead of taking the process down.
//!
//! Sub-views created with [`ByteBuffer::view`] and [`ByteBuffer::view_mut`]
//! borrow the same storage and never copy.

use crate::error::{Error, Result};
use std::panic::Location;

/// Byte view with a logical origin and an endianness flag.
///
/// `swapped == true` means multi-byte integers are little-endian on this
/// view, `false` means big-endian.
#[derive(Debug, Clone)]
pub struct ByteBuffer<B> {
    data: B,
    offset: usize,
    swapped: bool,
}

macro_rules! read_int {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        #[track_caller]
        pub fn $name(&self, offset: usize) -> Result<$ty> {
            let raw: [u8; std::mem::size_of::<$ty>()] = self.array(offset)?;
            Ok(if self.swapped {
                <$ty>::from_le_bytes(raw)
            } else {
                <$ty>::from_be_bytes(raw)
            })
        }
    };
}

macro_rules! write_int {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        #[track_caller]
        pub fn $name(&mut self, offset: usize, value: $ty) -> Result<()> {
            let raw = if self.swapped {
                value.to_le_bytes()
            } else {
                value.to_be_bytes()
            };
            self.write_bytes(offset, &raw)
        }
    };
}

impl<B: AsRef<[u8]>> ByteBuffer<B> {
    /// Wrap storage with the origin at its first byte.
    pub fn new(data: B, swapped: bool) -> Self {
        Self {
            data,
            offset: 0,
            swapped,
        }
    }

    /// Wrap storage with the origin at `offset`.
    pub fn with_offset(data: B, offset: usize, swapped: bool) -> Self {
        Self {
            data,
            offset,
            swapped,
        }
    }

    /// Absolute position of the logical origin in the storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether this view is little-endian.
    pub fn swapped(&self) -> bool {
        self.swapped
    }

    /// Number of bytes between the origin and the end of the storage.
    pub fn len(&self) -> usize {
        self.data.as_ref().len().saturating_sub(self.offset)
    }

    /// Check if nothing is addressable through this view.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes from the origin to the end of the storage.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_ref().get(self.offset..).unwrap_or(&[])
    }

    /// Give back the underlying storage.
    pub fn into_inner(self) -> B {
        self.data
    }

    /// Borrowed sub-view whose origin is `offset` bytes past this one.
    ///
    /// `swapped` overrides the byte order; `None` inherits it.
    pub fn view(&self, offset: usize, swapped: Option<bool>) -> ByteBuffer<&[u8]> {
        ByteBuffer {
            data: self.data.as_ref(),
            offset: self.offset + offset,
            swapped: swapped.unwrap_or(self.swapped),
        }
    }

    #[track_caller]
    fn check(&self, offset: usize, len: usize) -> Result<usize> {
        let start = self.offset.saturating_add(offset);
        let total = self.data.as_ref().len();
        match start.checked_add(len) {
            Some(end) if end <= total => Ok(start),
            _ => Err(Error::BufferTooSmall {
                needed: start.saturating_add(len),
                available: total,
                location: Location::caller(),
            }),
        }
    }

    /// Borrow `len` bytes at `offset`.
    #[track_caller]
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let start = self.check(offset, len)?;
        Ok(&self.data.as_ref()[start..start + len])
    }

    #[track_caller]
    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.slice(offset, N)?);
        Ok(raw)
    }

    /// Read a single byte.
    #[track_caller]
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        let start = self.check(offset, 1)?;
        Ok(self.data.as_ref()[start])
    }

    /// Read a single signed byte.
    #[track_caller]
    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.read_u8(offset)? as i8)
    }

    read_int!(
        /// Read a u16 in the view's byte order.
        read_u16, u16
    );
    read_int!(
        /// Read an i16 in the view's byte order.
        read_i16, i16
    );
    read_int!(
        /// Read a u32 in the view's byte order.
        read_u32, u32
    );
    read_int!(
        /// Read an i32 in the view's byte order.
        read_i32, i32
    );
    read_int!(
        /// Read a u64 in the view's byte order.
        read_u64, u64
    );
    read_int!(
        /// Read an i64 in the view's byte order.
        read_i64, i64
    );

    /// Copy `len` bytes at `offset` into a fresh vector.
    #[track_caller]
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        Ok(self.slice(offset, len)?.to_vec())
    }

    /// Read `len` single-byte characters (ISO-8859-1).
    #[track_caller]
    pub fn read_ascii(&self, offset: usize, len: usize) -> Result<String> {
        Ok(self.slice(offset, len)?.iter().map(|&b| b as char).collect())
    }

    /// Read `len` bytes of UTF-16 text in the view's byte order.
    #[track_caller]
    pub fn read_unicode(&self, offset: usize, len: usize) -> Result<String> {
        let raw = self.slice(offset, len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| {
                if self.swapped {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16(&units)
            .map_err(|e| Error::type_conversion(format!("Invalid UTF-16 text: {}", e)))
    }
}

impl<'a> ByteBuffer<&'a [u8]> {
    /// Borrow `len` bytes at `offset` for the lifetime of the storage
    /// rather than of this view.
    #[track_caller]
    pub fn range(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let start = self.check(offset, len)?;
        let data: &'a [u8] = self.data;
        Ok(&data[start..start + len])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteBuffer<B> {
    /// Mutable sub-view whose origin is `offset` bytes past this one.
    pub fn view_mut(&mut self, offset: usize, swapped: Option<bool>) -> ByteBuffer<&mut [u8]> {
        ByteBuffer {
            offset: self.offset + offset,
            swapped: swapped.unwrap_or(self.swapped),
            data: self.data.as_mut(),
        }
    }

    /// Mutably borrow `len` bytes at `offset`.
    #[track_caller]
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let start = self.check(offset, len)?;
        Ok(&mut self.data.as_mut()[start..start + len])
    }

    /// Write a single byte.
    #[track_caller]
    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.slice_mut(offset, 1)?[0] = value;
        Ok(())
    }

    /// Write a single signed byte.
    #[track_caller]
    pub fn write_i8(&mut self, offset: usize, value: i8) -> Result<()> {
        self.write_u8(offset, value as u8)
    }

    write_int!(
        /// Write a u16 in the view's byte order.
        write_u16, u16
    );
    write_int!(
        /// Write an i16 in the view's byte order.
        write_i16, i16
    );
    write_int!(
        /// Write a u32 in the view's byte order.
        write_u32, u32
    );
    write_int!(
        /// Write an i32 in the view's byte order.
        write_i32, i32
    );
    write_int!(
        /// Write a u64 in the view's byte order.
        write_u64, u64
    );
    write_int!(
        /// Write an i64 in the view's byte order.
        write_i64, i64
    );

    /// Copy `value` to `offset`.
    #[track_caller]
    pub fn write_bytes(&mut self, offset: usize, value: &[u8]) -> Result<()> {
        self.slice_mut(offset, value.len())?.copy_from_slice(value);
        Ok(())
    }

    /// Write at most `len` bytes of `value`, then fill up to `len` by
    /// repeating `pad`.
    #[track_caller]
    pub fn write_bytes_padded(
        &mut self,
        offset: usize,
        value: &[u8],
        len: usize,
        pad: &[u8],
    ) -> Result<()> {
        let target = self.slice_mut(offset, len)?;
        let copied = value.len().min(len);
        target[..copied].copy_from_slice(&value[..copied]);
        if !pad.is_empty() {
            for (dst, src) in target[copied..].iter_mut().zip(pad.iter().cycle()) {
                *dst = *src;
            }
        }
        Ok(())
    }

    /// Write text as single-byte characters; characters outside
    /// ISO-8859-1 become `?`.
    #[track_caller]
    pub fn write_ascii(&mut self, offset: usize, text: &str) -> Result<()> {
        let raw = latin1_bytes(text);
        self.write_bytes(offset, &raw)
    }

    /// Write text as single-byte characters, blank padded to `len` bytes.
    #[track_caller]
    pub fn write_ascii_padded(&mut self, offset: usize, text: &str, len: usize) -> Result<()> {
        let raw = latin1_bytes(text);
        self.write_bytes_padded(offset, &raw, len, b" ")
    }

    /// Write text as UTF-16 in the view's byte order, padded with blanks to
    /// `len` bytes. Returns the number of text bytes written.
    #[track_caller]
    pub fn write_unicode(&mut self, offset: usize, text: &str, len: usize) -> Result<usize> {
        let raw = utf16_bytes(text, self.swapped);
        let pad: [u8; 2] = if self.swapped { [0x20, 0x00] } else { [0x00, 0x20] };
        self.write_bytes_padded(offset, &raw, len, &pad)?;
        Ok(raw.len().min(len))
    }
}

/// Encode text as ISO-8859-1, replacing unmappable characters with `?`.
pub fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect()
}

/// Encode text as UTF-16, little-endian when `swapped`.
pub fn utf16_bytes(text: &str, swapped: bool) -> Vec<u8> {
    text.encode_utf16()
        .flat_map(|unit| {
            if swapped {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order_follows_swap_flag() {
        let mut le = ByteBuffer::new(vec![0u8; 8], true);
        le.write_i32(0, 0x0102_0304).unwrap();
        assert_eq!(&le.as_slice()[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(le.read_i32(0).unwrap(), 0x0102_0304);

        let mut be = ByteBuffer::new(vec![0u8; 8], false);
        be.write_i32(0, 0x0102_0304).unwrap();
        assert_eq!(&be.as_slice()[..4], &[0x01, 0x02, 0x03, 0x04]);

        // Same bytes read through the opposite order.
        let flipped = ByteBuffer::new(be.as_slice(), true);
        assert_eq!(flipped.read_i32(0).unwrap(), 0x0403_0201);
    }

    #[test]
    fn test_u32_round_trip_in_both_orders() {
        let cases: [(u32, [u8; 4], [u8; 4]); 4] = [
            (0, [0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x00, 0x00]),
            (1, [0x01, 0x00, 0x00, 0x00], [0x00, 0x00, 0x00, 0x01]),
            (0x7FFF_FFFF, [0xFF, 0xFF, 0xFF, 0x7F], [0x7F, 0xFF, 0xFF, 0xFF]),
            (0xFFFF_FFFF, [0xFF, 0xFF, 0xFF, 0xFF], [0xFF, 0xFF, 0xFF, 0xFF]),
        ];
        for (value, little, big) in cases {
            for (swapped, expected) in [(true, little), (false, big)] {
                let mut buf = ByteBuffer::new(vec![0xAAu8; 6], swapped);
                buf.write_u32(1, value).unwrap();
                assert_eq!(&buf.as_slice()[1..5], &expected, "{:#x} swapped={}", value, swapped);
                assert_eq!(buf.as_slice()[0], 0xAA);
                assert_eq!(buf.as_slice()[5], 0xAA);
                assert_eq!(buf.read_u32(1).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_negative_values_keep_sign() {
        let mut buf = ByteBuffer::new(vec![0u8; 16], true);
        buf.write_i16(0, -2).unwrap();
        buf.write_i64(2, i64::MIN).unwrap();
        assert_eq!(buf.read_i16(0).unwrap(), -2);
        assert_eq!(buf.read_i64(2).unwrap(), i64::MIN);
        assert_eq!(buf.read_u16(0).unwrap(), 0xFFFE);
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let buf = ByteBuffer::new(vec![1u8, 2, 3], false);
        let err = buf.read_i32(0).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooSmall {
                needed: 4,
                available: 3,
                ..
            }
        ));
        assert!(buf.read_u8(3).is_err());
        assert!(buf.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_views_compose_offsets_without_copying() {
        let data: Vec<u8> = (0u8..32).collect();
        let buf = ByteBuffer::new(data.as_slice(), false);
        let inner = buf.view(8, None);
        let nested = inner.view(4, Some(true));
        assert_eq!(nested.offset(), 12);
        assert_eq!(nested.read_u8(0).unwrap(), 12);
        assert_eq!(nested.read_u16(0).unwrap(), u16::from_le_bytes([12, 13]));
        assert_eq!(inner.read_u16(0).unwrap(), u16::from_be_bytes([8, 9]));
        assert_eq!(nested.len(), 20);
        assert!(std::ptr::eq(nested.as_slice().as_ptr(), data[12..].as_ptr()));
    }

    #[test]
    fn test_view_mut_writes_through() {
        let mut buf = ByteBuffer::new(vec![0u8; 16], true);
        {
            let mut part = buf.view_mut(10, Some(false));
            part.write_u16(0, 0x0A0B).unwrap();
        }
        assert_eq!(buf.read_u8(10).unwrap(), 0x0A);
        assert_eq!(buf.read_u8(11).unwrap(), 0x0B);
    }

    #[test]
    fn test_padded_text() {
        let mut buf = ByteBuffer::new(vec![0u8; 12], false);
        buf.write_ascii_padded(0, "DB", 8).unwrap();
        assert_eq!(buf.read_ascii(0, 8).unwrap(), "DB      ");

        // Longer input is truncated.
        buf.write_ascii_padded(0, "MAXDBTESTDATABASE", 8).unwrap();
        assert_eq!(buf.read_ascii(0, 8).unwrap(), "MAXDBTES");
    }

    #[test]
    fn test_unicode_padding_matches_byte_order() {
        let mut le = ByteBuffer::new(vec![0u8; 8], true);
        assert_eq!(le.write_unicode(0, "A", 6).unwrap(), 2);
        assert_eq!(le.as_slice()[..6], [0x41, 0x00, 0x20, 0x00, 0x20, 0x00]);
        assert_eq!(le.read_unicode(0, 6).unwrap(), "A  ");

        let mut be = ByteBuffer::new(vec![0u8; 4], false);
        be.write_unicode(0, "\u{00e9}", 4).unwrap();
        assert_eq!(be.as_slice(), &[0x00, 0xE9, 0x00, 0x20]);
    }

    #[test]
    fn test_latin1_replaces_wide_characters() {
        assert_eq!(latin1_bytes("a\u{00fc}\u{4e2d}"), vec![b'a', 0xFC, b'?']);
    }
}
