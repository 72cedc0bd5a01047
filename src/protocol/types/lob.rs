//! Long value (LOB) descriptors for LONG/STR columns.
//!
//! The server never puts a long value directly into a row. The row holds a
//! 40-byte descriptor instead, and the value itself comes back in one of
//! two ways:
//! 1. **Inline**: the descriptor's value mode is "all data" or "last data"
//!    and `val_pos`/`val_len` address the bytes inside the same data part
//! 2. **Deferred**: only part of the value (or none) is in the reply, and
//!    the rest must be fetched with GETVAL requests
//!
//! This module models the descriptor and the value built from it.

use crate::error::{Error, Result};
use crate::protocol::buffer::ByteBuffer;
use crate::protocol::constants::*;

/// Decoded long descriptor (`tsp00_LongDescBlock`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongDescriptor {
    /// Server handle of the long value.
    pub descriptor: [u8; 8],
    pub tab_id: [u8; 8],
    pub max_len: i32,
    pub intern_pos: i32,
    pub info_set: u8,
    pub state: u8,
    pub val_mode: u8,
    pub val_ind: i16,
    /// 1-based position of the value bytes inside the data part.
    pub val_pos: i32,
    pub val_len: i32,
}

impl LongDescriptor {
    /// Decode 40 descriptor bytes stored in the given byte order.
    pub fn from_bytes(raw: &[u8], swapped: bool) -> Result<Self> {
        if raw.len() < LONG_DESC_SIZE {
            return Err(Error::framing("truncated long descriptor", raw));
        }
        let buf = ByteBuffer::new(raw, swapped);
        let mut descriptor = [0u8; 8];
        descriptor.copy_from_slice(buf.slice(LONG_DESC_DESCRIPTOR, 8)?);
        let mut tab_id = [0u8; 8];
        tab_id.copy_from_slice(buf.slice(LONG_DESC_TABID, 8)?);
        Ok(Self {
            descriptor,
            tab_id,
            max_len: buf.read_i32(LONG_DESC_MAX_LEN)?,
            intern_pos: buf.read_i32(LONG_DESC_INTERN_POS)?,
            info_set: buf.read_u8(LONG_DESC_INFOSET)?,
            state: buf.read_u8(LONG_DESC_STATE)?,
            val_mode: buf.read_u8(LONG_DESC_VAL_MODE)?,
            val_ind: buf.read_i16(LONG_DESC_VAL_IND)?,
            val_pos: buf.read_i32(LONG_DESC_VAL_POS)?,
            val_len: buf.read_i32(LONG_DESC_VAL_LEN)?,
        })
    }

    /// Encode back into the 40-byte wire form.
    pub fn to_bytes(&self, swapped: bool) -> Result<[u8; LONG_DESC_SIZE]> {
        let mut raw = [0u8; LONG_DESC_SIZE];
        let mut buf = ByteBuffer::new(&mut raw[..], swapped);
        buf.write_bytes(LONG_DESC_DESCRIPTOR, &self.descriptor)?;
        buf.write_bytes(LONG_DESC_TABID, &self.tab_id)?;
        buf.write_i32(LONG_DESC_MAX_LEN, self.max_len)?;
        buf.write_i32(LONG_DESC_INTERN_POS, self.intern_pos)?;
        buf.write_u8(LONG_DESC_INFOSET, self.info_set)?;
        buf.write_u8(LONG_DESC_STATE, self.state)?;
        buf.write_u8(LONG_DESC_VAL_MODE, self.val_mode)?;
        buf.write_i16(LONG_DESC_VAL_IND, self.val_ind)?;
        buf.write_i32(LONG_DESC_VAL_POS, self.val_pos)?;
        buf.write_i32(LONG_DESC_VAL_LEN, self.val_len)?;
        Ok(raw)
    }

    /// Whether the whole remaining value is carried by this reply.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.val_mode,
            LONG_VALMODE_ALL_DATA | LONG_VALMODE_LAST_DATA
        )
    }

    /// Whether part of the value is carried by this reply.
    pub fn has_inline_data(&self) -> bool {
        self.val_pos > 0
            && matches!(
                self.val_mode,
                LONG_VALMODE_DATA_PART | LONG_VALMODE_ALL_DATA | LONG_VALMODE_LAST_DATA
            )
    }

    /// Bytes the descriptor addresses inside `data_part`, the payload of the
    /// data part the descriptor was read from.
    pub fn inline_data<'a>(&self, data_part: &'a [u8]) -> Result<&'a [u8]> {
        if !self.has_inline_data() || self.val_len <= 0 {
            return Ok(&[]);
        }
        let start = (self.val_pos - 1) as usize;
        ByteBuffer::new(data_part, false).range(start, self.val_len as usize)
    }
}

/// Character family of a long column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongKind {
    Ascii,
    Binary,
    Unicode,
}

/// Long column value: the descriptor plus whatever data came inline.
#[derive(Debug, Clone, PartialEq)]
pub struct LongValue {
    pub kind: LongKind,
    pub descriptor: LongDescriptor,
    /// Bytes delivered with the row; complete when
    /// [`LongDescriptor::is_complete`] holds.
    pub data: Option<Vec<u8>>,
    /// Byte order of UTF-16 data.
    pub swapped: bool,
}

impl LongValue {
    /// Create a long value with its inline data.
    pub fn with_data(kind: LongKind, descriptor: LongDescriptor, data: Vec<u8>, swapped: bool) -> Self {
        Self {
            kind,
            descriptor,
            data: Some(data),
            swapped,
        }
    }

    /// Create a long value with only a descriptor.
    pub fn descriptor_only(kind: LongKind, descriptor: LongDescriptor) -> Self {
        Self {
            kind,
            descriptor,
            data: None,
            swapped: false,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.data.is_some() && self.descriptor.is_complete()
    }

    /// Inline data as text. Unicode longs are decoded from UTF-16 in the
    /// reply's byte order, ascii longs as ISO-8859-1.
    pub fn as_string(&self) -> Option<String> {
        let data = self.data.as_ref()?;
        match self.kind {
            LongKind::Unicode => {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| {
                        if self.swapped {
                            u16::from_le_bytes([pair[0], pair[1]])
                        } else {
                            u16::from_be_bytes([pair[0], pair[1]])
                        }
                    })
                    .collect();
                Some(String::from_utf16_lossy(&units))
            }
            LongKind::Ascii | LongKind::Binary => Some(data.iter().map(|&b| b as char).collect()),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Declared maximum length of the value.
    pub fn max_len(&self) -> i32 {
        self.descriptor.max_len
    }
}
