//! Reply packet parsing.
//!
//! The whole segment/part structure is validated when the packet is
//! constructed, so cursor movement afterwards cannot run off the buffer.
//! The byte order of a reply is whatever its packet header declares.

use crate::error::{Error, Result};
use crate::protocol::buffer::ByteBuffer;
use crate::protocol::constants::*;
use crate::protocol::number;
use crate::protocol::part::{align, VariableDataPart};
use crate::protocol::types::{FieldInfo, LongDescriptor};
use bytes::Bytes;

/// Header of one part inside a reply segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartHeader {
    pub kind: u8,
    pub attributes: u8,
    pub arg_count: i16,
    pub segment_offset: i32,
    pub buf_len: usize,
    pub buf_size: i32,
    /// Offset of the part header from the packet start.
    pub offset: usize,
}

impl PartHeader {
    /// Offset of the part payload from the packet start.
    pub fn data_offset(&self) -> usize {
        self.offset + PART_HEADER_SIZE
    }

    /// Number of arguments, with negative counts read as zero.
    pub fn args(&self) -> usize {
        self.arg_count.max(0) as usize
    }
}

#[derive(Debug, Clone)]
struct SegmentIndex {
    offset: usize,
    parts: Vec<PartHeader>,
}

/// Parsed reply packet with segment and part cursors.
#[derive(Debug, Clone)]
pub struct ReplyPacket {
    data: Bytes,
    swapped: bool,
    unicode: bool,
    segments: Vec<SegmentIndex>,
    current_segment: usize,
    part_index: Option<usize>,
}

impl ReplyPacket {
    /// Parse a reply. `data` starts at the packet header (the RTE header
    /// already stripped).
    pub fn new(data: impl Into<Bytes>, unicode: bool) -> Result<Self> {
        let data = data.into();
        if data.len() < PACKET_HEADER_SIZE {
            return Err(Error::framing("reply shorter than a packet header", &data));
        }
        let swapped = data[PACKET_MESS_SWAP] == SWAP_SWAPPED;
        let segments = index_segments(&ByteBuffer::new(&data[..], swapped))?;
        Ok(Self {
            data,
            swapped,
            unicode,
            segments,
            current_segment: 0,
            part_index: None,
        })
    }

    fn buf(&self) -> ByteBuffer<&[u8]> {
        ByteBuffer::new(&self.data[..], self.swapped)
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Move to the first segment. Returns its offset.
    pub fn first_segment(&mut self) -> Option<usize> {
        self.current_segment = 0;
        self.part_index = None;
        self.segments.first().map(|s| s.offset)
    }

    /// Move to the next segment. Returns its offset, or `None` after the
    /// last one.
    pub fn next_segment(&mut self) -> Option<usize> {
        let next = self.current_segment + 1;
        let offset = self.segments.get(next)?.offset;
        self.current_segment = next;
        self.part_index = None;
        Some(offset)
    }

    fn segment(&self) -> Result<&SegmentIndex> {
        self.segments
            .get(self.current_segment)
            .ok_or_else(|| Error::framing("reply holds no segment", &self.data))
    }

    fn segment_offset(&self) -> Result<usize> {
        Ok(self.segment()?.offset)
    }

    pub fn part_count(&self) -> usize {
        self.segments
            .get(self.current_segment)
            .map_or(0, |s| s.parts.len())
    }

    /// Advance to the next part of the current segment.
    pub fn next_part(&mut self) -> Option<PartHeader> {
        let next = self.part_index.map_or(0, |i| i + 1);
        let part = *self.segments.get(self.current_segment)?.parts.get(next)?;
        self.part_index = Some(next);
        Some(part)
    }

    pub fn current_part(&self) -> Option<PartHeader> {
        let index = self.part_index?;
        self.segments
            .get(self.current_segment)?
            .parts
            .get(index)
            .copied()
    }

    pub fn clear_part_offset(&mut self) {
        self.part_index = None;
    }

    /// Position on the first part of `kind` in the current segment.
    pub fn find_part(&mut self, kind: u8) -> Option<PartHeader> {
        let segment = self.segments.get(self.current_segment)?;
        let index = segment.parts.iter().position(|p| p.kind == kind)?;
        self.part_index = Some(index);
        Some(segment.parts[index])
    }

    pub fn exists_part(&mut self, kind: u8) -> bool {
        self.find_part(kind).is_some()
    }

    /// Payload bytes of `part`.
    pub fn part_data(&self, part: &PartHeader) -> Result<&[u8]> {
        self.buf().range(part.data_offset(), part.buf_len)
    }

    /// View with its origin at the payload of `part`, in the reply's byte
    /// order. Data records are read through such a view.
    pub fn part_view(&self, part: &PartHeader) -> ByteBuffer<&[u8]> {
        ByteBuffer::with_offset(&self.data[..], part.data_offset(), self.swapped)
    }

    /// Bounds-checked view over the payload of `part` only, with its origin
    /// at the first payload byte. Reads past `buf_len` fail.
    fn part_bounded(&self, part: &PartHeader) -> Result<ByteBuffer<&[u8]>> {
        Ok(ByteBuffer::new(self.part_data(part)?, self.swapped))
    }

    fn read_string(&self, offset: usize, len: usize) -> Result<String> {
        if self.unicode {
            self.buf().read_unicode(offset, len)
        } else {
            self.buf().read_ascii(offset, len)
        }
    }

    pub fn return_code(&self) -> Result<i16> {
        self.buf()
            .read_i16(self.segment_offset()? + SEGMENT_RETURN_CODE)
    }

    /// Return code with "row not found" cleared for everything except
    /// fetches and procedure calls.
    pub fn weak_return_code(&self) -> Result<i16> {
        let rc = self.return_code()?;
        if rc != RC_ROW_NOT_FOUND {
            return Ok(rc);
        }
        let function = self.function_code()?;
        let base = if function > FUNC_MASS_OFFSET {
            function - FUNC_MASS_OFFSET
        } else {
            function
        };
        let keeps = matches!(
            base,
            FUNC_DBPROC_EXECUTE
                | FUNC_DBPROC_WITH_RESULT_SET_EXECUTE
                | FUNC_FETCH_FIRST
                | FUNC_FETCH_LAST
                | FUNC_FETCH_NEXT
                | FUNC_FETCH_PREV
                | FUNC_FETCH_POS
                | FUNC_FETCH_SAME
                | FUNC_FETCH_RELATIVE
        );
        Ok(if keeps { rc } else { 0 })
    }

    pub fn sql_state(&self) -> Result<String> {
        self.buf()
            .read_ascii(self.segment_offset()? + SEGMENT_SQL_STATE, 5)
    }

    pub fn error_pos(&self) -> Result<i32> {
        self.buf()
            .read_i32(self.segment_offset()? + SEGMENT_ERROR_POS)
    }

    pub fn function_code(&self) -> Result<i16> {
        self.buf()
            .read_i16(self.segment_offset()? + SEGMENT_FUNCTION_CODE)
    }

    /// Text of the error text part, trimmed.
    pub fn error_message(&mut self) -> Result<String> {
        match self.find_part(PARTKIND_ERROR_TEXT) {
            Some(part) => Ok(self
                .read_string(part.data_offset(), part.buf_len)?
                .trim()
                .to_string()),
            None => Ok("Unknown error".to_string()),
        }
    }

    /// Build the server error carried by the current segment.
    pub fn to_error(&mut self) -> Result<Error> {
        let code = self.return_code()? as i32;
        let sql_state = self.sql_state()?;
        let error_pos = self.error_pos()?;
        let message = if code == RC_COMMUNICATION_RESTART as i32 {
            "Communication restart required".to_string()
        } else {
            self.error_message()?
        };
        Ok(Error::Server {
            code,
            sql_state,
            message,
            error_pos,
        })
    }

    /// Field bytes behind a define byte at `offset`; `None` for NULL.
    pub fn read_data_bytes(&self, offset: usize, len: usize) -> Result<Option<&[u8]>> {
        let buf = self.buf();
        if buf.read_u8(offset)? == UNDEF_BYTE {
            return Ok(None);
        }
        buf.range(offset + 1, len.saturating_sub(1)).map(Some)
    }

    /// Row count of the result count part, if there is one with a value.
    pub fn result_count(&mut self) -> Result<Option<i64>> {
        let Some(part) = self.find_part(PARTKIND_RESULT_COUNT) else {
            return Ok(None);
        };
        match self.read_data_bytes(part.data_offset(), part.buf_len)? {
            Some(raw) => number::decode_to_i64(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Session id from the session info part. It is big-endian whatever
    /// the packet order.
    pub fn session_id(&mut self) -> Result<Option<i32>> {
        let Some(part) = self.find_part(PARTKIND_SESSION_INFO_RETURNED) else {
            return Ok(None);
        };
        let view = ByteBuffer::new(&self.data[..], false);
        view.read_i32(part.data_offset() + 1).map(Some)
    }

    /// Whether the server switched the session to unicode.
    pub fn is_unicode(&mut self) -> Result<bool> {
        match self.find_part(PARTKIND_SESSION_INFO_RETURNED) {
            Some(part) => Ok(self.buf().read_u8(part.data_offset())? == 1),
            None => Ok(false),
        }
    }

    /// Kernel version as `major * 10000 + minor * 100 + correction`.
    pub fn kernel_version(&mut self) -> Option<i32> {
        let part = self.find_part(PARTKIND_SESSION_INFO_RETURNED)?;
        let digits = self
            .buf()
            .read_ascii(part.data_offset() + SESSION_INFO_KERNEL_VERSION, 5)
            .ok()?;
        let major: i32 = digits.get(0..1)?.parse().ok()?;
        let minor: i32 = digits.get(1..3)?.parse().ok()?;
        let correction: i32 = digits.get(3..5)?.parse().ok()?;
        Some(major * 10000 + minor * 100 + correction)
    }

    /// Raw (feature, value) pairs granted by the server.
    pub fn features(&mut self) -> Result<Option<Vec<u8>>> {
        match self.find_part(PARTKIND_FEATURE) {
            Some(part) => Ok(Some(self.part_data(&part)?.to_vec())),
            None => Ok(None),
        }
    }

    /// Whether `part` carries the last chunk of its data.
    pub fn was_last_part(part: &PartHeader) -> bool {
        part.attributes & PART_ATTR_LAST_PACKET != 0
    }

    /// Cursor over the vardata part of the current segment.
    pub fn var_data_part(&mut self) -> Result<Option<VariableDataPart<'_>>> {
        let Some(part) = self.find_part(PARTKIND_VARDATA) else {
            return Ok(None);
        };
        let payload = self.part_data(&part)?;
        Ok(Some(VariableDataPart::new(payload, 1)))
    }

    /// Column names of a column names part, one length-prefixed name per
    /// argument.
    pub fn parse_column_names(&self, part: &PartHeader) -> Result<Vec<String>> {
        let buf = self.part_bounded(part)?;
        let mut names = Vec::with_capacity(part.args());
        let mut pos = 0;
        for i in 0..part.args() {
            let len = match buf.read_u8(pos) {
                Ok(len) => len as usize,
                Err(_) => return Err(overrun(part, "column name", i, buf.as_slice())),
            };
            if pos + 1 + len > buf.len() {
                return Err(overrun(part, "column name", i, buf.as_slice()));
            }
            names.push(if self.unicode {
                buf.read_unicode(pos + 1, len)?
            } else {
                buf.read_ascii(pos + 1, len)?
            });
            pos += len + 1;
        }
        Ok(names)
    }

    /// Parameter/column descriptions of a short info part.
    pub fn parse_short_fields(
        &self,
        part: &PartHeader,
        space_option: bool,
        is_vardata: bool,
    ) -> Result<Vec<FieldInfo>> {
        let buf = self.part_bounded(part)?;
        let mut fields = Vec::with_capacity(part.args());
        let mut pos = 0;
        for i in 0..part.args() {
            if pos + PARAM_INFO_SIZE > buf.len() {
                return Err(overrun(part, "parameter info", i, buf.as_slice()));
            }
            let mode = buf.read_u8(pos + PARAM_INFO_MODE)?;
            let io_type = buf.read_u8(pos + PARAM_INFO_IO_TYPE)?;
            let data_type = buf.read_u8(pos + PARAM_INFO_DATA_TYPE)?;
            let frac = buf.read_u8(pos + PARAM_INFO_FRAC)?;
            let length = buf.read_i16(pos + PARAM_INFO_LENGTH)?;
            let io_length = buf.read_i16(pos + PARAM_INFO_IN_OUT_LEN)?;
            let buf_pos = if is_vardata && io_type == PARAM_IO_INPUT {
                buf.read_i16(pos + PARAM_INFO_PARAM_NO)? as i32
            } else {
                buf.read_i32(pos + PARAM_INFO_BUF_POS)?
            };
            fields.push(FieldInfo::new(
                mode,
                io_type,
                data_type,
                frac,
                length,
                io_length,
                buf_pos,
                space_option,
                self.unicode,
            ));
            pos += PARAM_INFO_SIZE;
        }
        Ok(fields)
    }

    /// Long descriptors of the long data part, if the segment has one.
    pub fn parse_long_descriptors(&mut self) -> Result<Option<Vec<LongDescriptor>>> {
        let Some(part) = self.find_part(PARTKIND_LONG_DATA) else {
            return Ok(None);
        };
        let buf = self.part_bounded(&part)?;
        let mut result = Vec::with_capacity(part.args());
        for i in 0..part.args() {
            let pos = i * (LONG_DESC_SIZE + 1) + 1;
            let Ok(raw) = buf.slice(pos, LONG_DESC_SIZE) else {
                return Err(overrun(&part, "long descriptor", i, buf.as_slice()));
            };
            result.push(LongDescriptor::from_bytes(raw, self.swapped)?);
        }
        Ok(Some(result))
    }
}

/// Framing error for an argument count that runs past the part payload.
fn overrun(part: &PartHeader, what: &str, index: usize, payload: &[u8]) -> Error {
    Error::framing(
        format!(
            "{} {} of {} overruns part kind {} ({} bytes)",
            what,
            index + 1,
            part.args(),
            part.kind,
            part.buf_len
        ),
        payload,
    )
}

fn index_segments(buf: &ByteBuffer<&[u8]>) -> Result<Vec<SegmentIndex>> {
    let count = buf.read_i16(PACKET_NO_OF_SEGM)?;
    if count < 0 {
        return Err(Error::framing(
            format!("negative segment count {}", count),
            buf.slice(0, PACKET_HEADER_SIZE)?,
        ));
    }
    let end = buf.len();
    let mut segments = Vec::with_capacity(count as usize);
    let mut offset = PACKET_HEADER_SIZE;

    for _ in 0..count {
        let header = buf
            .slice(offset, SEGMENT_HEADER_SIZE)
            .map_err(|_| Error::framing("segment header past the end of the reply", buf.as_slice()))?;
        let seg_len = buf.read_i32(offset + SEGMENT_LEN)?;
        if seg_len < SEGMENT_HEADER_SIZE as i32 || offset + seg_len as usize > end {
            return Err(Error::framing(
                format!("segment length {} at offset {} does not fit", seg_len, offset),
                header,
            ));
        }
        let seg_end = offset + seg_len as usize;

        let part_count = buf.read_i16(offset + SEGMENT_NO_OF_PARTS)?;
        if part_count < 0 {
            return Err(Error::framing(
                format!("negative part count {}", part_count),
                header,
            ));
        }

        let mut parts = Vec::with_capacity(part_count as usize);
        let mut part_offset = offset + SEGMENT_HEADER_SIZE;
        for _ in 0..part_count {
            if part_offset + PART_HEADER_SIZE > seg_end {
                return Err(Error::framing(
                    "part header runs past its segment",
                    buf.slice(offset, seg_len as usize)?,
                ));
            }
            let buf_len = buf.read_i32(part_offset + PART_BUF_LEN)?;
            if buf_len < 0 || part_offset + PART_HEADER_SIZE + buf_len as usize > seg_end {
                return Err(Error::framing(
                    format!("part of {} bytes runs past its segment", buf_len),
                    buf.slice(part_offset, PART_HEADER_SIZE)?,
                ));
            }
            parts.push(PartHeader {
                kind: buf.read_u8(part_offset + PART_KIND)?,
                attributes: buf.read_u8(part_offset + PART_ATTRIBUTES)?,
                arg_count: buf.read_i16(part_offset + PART_ARG_COUNT)?,
                segment_offset: buf.read_i32(part_offset + PART_SEGM_OFFS)?,
                buf_len: buf_len as usize,
                buf_size: buf.read_i32(part_offset + PART_BUF_SIZE)?,
                offset: part_offset,
            });
            part_offset += align(buf_len as usize + PART_HEADER_SIZE);
        }

        segments.push(SegmentIndex { offset, parts });
        offset = seg_end;
    }
    Ok(segments)
}
