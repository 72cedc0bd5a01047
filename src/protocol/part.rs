//! Variable-layout part payloads.
//!
//! A variable part is a sequence of rows; each row starts with a big-endian
//! i16 field count followed by that many length-prefixed fields:
//!
//! ```text
//! row    := field_count:i16 field*
//! field  := len:u8 data            (len <= 250)
//!         | 0xFF len:i16 data      (wide form)
//! ```
//!
//! The same cursor type walks nested structures: a field's bytes can be
//! handed to [`VariableDataPart::nested`] to be read as another variable
//! part.

use crate::error::{Error, Result};
use crate::protocol::buffer::ByteBuffer;
use crate::protocol::constants::*;

/// Round `len` up to the part alignment.
pub fn align(len: usize) -> usize {
    len.div_ceil(ALIGN_VALUE) * ALIGN_VALUE
}

/// Read a field length prefix at `offset`.
///
/// Returns `(field_len, prefix_width)`.
pub fn read_field_length<B: AsRef<[u8]>>(buf: &ByteBuffer<B>, offset: usize) -> Result<(usize, usize)> {
    let first = buf.read_u8(offset)?;
    if first as usize <= VARDATA_IGNORED as usize {
        Ok((first as usize, 1))
    } else {
        let wide = buf.read_i16(offset + 1)?;
        if wide < 0 {
            return Err(Error::framing(
                format!("negative field length {}", wide),
                buf.slice(offset, 3)?,
            ));
        }
        Ok((wide as usize, 3))
    }
}

/// Write a field length prefix at `offset`, returning the prefix width.
///
/// Lengths of 250 and above use the wide form.
pub fn write_field_length<B: AsRef<[u8]> + AsMut<[u8]>>(
    buf: &mut ByteBuffer<B>,
    offset: usize,
    value: usize,
) -> Result<usize> {
    if value < VARDATA_IGNORED as usize {
        buf.write_u8(offset, value as u8)?;
        Ok(1)
    } else if value <= i16::MAX as usize {
        buf.write_u8(offset, VARDATA_TWO_BYTE_LENGTH)?;
        buf.write_i16(offset + 1, value as i16)?;
        Ok(3)
    } else {
        Err(Error::framing(
            format!("field of {} bytes exceeds the variable part limit", value),
            &[],
        ))
    }
}

/// Row/field cursor over a variable part payload.
#[derive(Debug, Clone)]
pub struct VariableDataPart<'a> {
    buf: ByteBuffer<&'a [u8]>,
    arg_count: usize,
    current_row: usize,
    field_count: usize,
    current_field: usize,
    extent: usize,
    current_field_len: usize,
}

impl<'a> VariableDataPart<'a> {
    /// Cursor over `data` holding `arg_count` rows. Variable parts are
    /// always big-endian.
    pub fn new(data: &'a [u8], arg_count: usize) -> Self {
        Self::from_view(ByteBuffer::new(data, false), arg_count)
    }

    /// Cursor over an existing view.
    pub fn from_view(buf: ByteBuffer<&'a [u8]>, arg_count: usize) -> Self {
        Self {
            buf,
            arg_count,
            current_row: 0,
            field_count: 0,
            current_field: 0,
            extent: 0,
            current_field_len: 0,
        }
    }

    /// Advance to the next row. Returns `false` once all rows are consumed.
    ///
    /// Unread fields of the current row are skipped.
    pub fn next_row(&mut self) -> Result<bool> {
        if self.current_row >= self.arg_count {
            return Ok(false);
        }
        self.extent += self.current_field_len;
        self.current_field_len = 0;
        while self.current_field < self.field_count {
            let (len, width) = self.read_field_length(self.extent)?;
            self.extent += width + len;
            self.current_field += 1;
        }

        let count = self
            .buf
            .read_i16(self.extent)
            .map_err(|_| self.malformed("truncated row header"))?;
        if count < 0 {
            return Err(self.malformed("negative field count"));
        }
        self.current_row += 1;
        self.field_count = count as usize;
        self.current_field = 0;
        self.extent += 2;
        Ok(true)
    }

    /// Advance to the next field of the current row. Returns `false` at the
    /// end of the row, and before the first call to [`next_row`].
    ///
    /// [`next_row`]: VariableDataPart::next_row
    pub fn next_field(&mut self) -> Result<bool> {
        if self.current_field >= self.field_count {
            return Ok(false);
        }
        self.current_field += 1;
        self.extent += self.current_field_len;
        let (len, width) = self.read_field_length(self.extent)?;
        self.extent += width;
        self.current_field_len = len;
        if self.buf.slice(self.extent, len).is_err() {
            return Err(self.malformed("field runs past the end of the part"));
        }
        Ok(true)
    }

    /// Read a length prefix at `offset` of this part.
    pub fn read_field_length(&self, offset: usize) -> Result<(usize, usize)> {
        read_field_length(&self.buf, offset).map_err(|_| self.malformed("truncated field length"))
    }

    /// Bytes of the current field.
    pub fn current_field(&self) -> Result<&'a [u8]> {
        self.buf.range(self.extent, self.current_field_len)
    }

    /// Current field interpreted as single-byte text.
    pub fn current_ascii(&self) -> Result<String> {
        self.buf.read_ascii(self.extent, self.current_field_len)
    }

    /// Offset of the current field's data.
    pub fn current_offset(&self) -> usize {
        self.extent
    }

    /// Length of the current field's data.
    pub fn current_field_len(&self) -> usize {
        self.current_field_len
    }

    /// Number of rows this cursor walks.
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Whole payload of this part.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf.range(0, self.buf.len()).unwrap_or(&[])
    }

    /// Cursor over the current field's bytes read as a variable part.
    pub fn nested(&self, arg_count: usize) -> Result<VariableDataPart<'a>> {
        let view = ByteBuffer::new(self.current_field()?, self.buf.swapped());
        Ok(VariableDataPart::from_view(view, arg_count))
    }

    fn malformed(&self, message: &str) -> Error {
        Error::framing(message, self.buf.as_slice())
    }
}
