//! Request packet builder.
//!
//! A request is built in place in one buffer laid out as
//!
//! ```text
//! RTE header (24) | packet header (32) | segment* ; segment := header (40) part*
//! ```
//!
//! Segments and parts are opened with [`RequestPacket::new_segment`] and
//! [`RequestPacket::new_part`]. Their headers are backfilled when they are
//! closed, so payload lengths never have to be known up front. All offsets
//! kept by the builder are relative to the packet header; the RTE header is
//! filled in by the transport right before sending.
//!
//! Requests are always written little-endian.

use crate::error::{Error, Result};
use crate::protocol::buffer::{latin1_bytes, utf16_bytes, ByteBuffer};
use crate::protocol::constants::*;
use crate::protocol::crypto::bytes_to_hex_upper;
use crate::protocol::number;
use crate::protocol::part::{align, write_field_length};

/// Mutable request packet with segment/part bookkeeping.
#[derive(Debug)]
pub struct RequestPacket {
    data: Vec<u8>,
    unicode: bool,
    length: usize,
    segments: usize,
    segment_offset: Option<usize>,
    segment_length: usize,
    segment_parts: i16,
    part_offset: Option<usize>,
    part_length: usize,
    part_args: i16,
    sql_mode: u8,
    reply_reserve: usize,
    max_segments: usize,
}

impl RequestPacket {
    /// Allocate a request of `capacity` bytes, RTE header included.
    pub fn new(capacity: usize, unicode: bool) -> Result<Self> {
        let minimum = RTE_HEADER_SIZE + PACKET_HEADER_SIZE + SEGMENT_HEADER_SIZE + PART_HEADER_SIZE;
        if capacity < minimum {
            return Err(Error::BufferTooSmall {
                needed: minimum,
                available: capacity,
                location: std::panic::Location::caller(),
            });
        }

        let mut packet = Self {
            data: vec![0u8; capacity],
            unicode,
            length: PACKET_HEADER_SIZE,
            segments: 0,
            segment_offset: None,
            segment_length: 0,
            segment_parts: 0,
            part_offset: None,
            part_length: 0,
            part_args: 0,
            sql_mode: SQLMODE_SESSION,
            reply_reserve: 0,
            max_segments: DEFAULT_MAX_NUMBER_OF_SEGMENTS,
        };
        packet.write_packet_header()?;
        Ok(packet)
    }

    fn write_packet_header(&mut self) -> Result<()> {
        let mess_code = if self.unicode {
            MESS_CODE_UNICODE_SWAP
        } else {
            MESS_CODE_ASCII
        };
        let var_part_size = (self.capacity() - PACKET_HEADER_SIZE) as i32;
        let mut header = self.view_at(0);
        header.write_u8(PACKET_MESS_CODE, mess_code)?;
        header.write_u8(PACKET_MESS_SWAP, SWAP_SWAPPED)?;
        header.write_ascii(PACKET_APPL_VERSION, APPL_VERSION)?;
        header.write_ascii(PACKET_APPL, APPL_ID)?;
        header.write_i32(PACKET_VARPART_SIZE, var_part_size)?;
        Ok(())
    }

    /// Little-endian view whose origin is `offset` bytes past the packet
    /// header start.
    fn view_at(&mut self, offset: usize) -> ByteBuffer<&mut [u8]> {
        ByteBuffer::with_offset(self.data.as_mut_slice(), RTE_HEADER_SIZE + offset, true)
    }

    /// Forget all segments and start over.
    pub fn reset(&mut self) {
        self.length = PACKET_HEADER_SIZE;
        self.segments = 0;
        self.segment_offset = None;
        self.segment_length = 0;
        self.segment_parts = 0;
        self.part_offset = None;
        self.part_length = 0;
        self.part_args = 0;
        self.reply_reserve = 0;
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    /// Bytes available after the RTE header.
    pub fn capacity(&self) -> usize {
        self.data.len() - RTE_HEADER_SIZE
    }

    /// Packet length accumulated so far, packet header included.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Segments opened since the last reset.
    pub fn segment_count(&self) -> usize {
        self.segments
    }

    pub fn set_max_segments(&mut self, max_segments: usize) {
        self.max_segments = max_segments.max(1);
    }

    /// Change the SQL mode written into subsequent segments, returning the
    /// previous one.
    pub fn switch_sql_mode(&mut self, mode: u8) -> u8 {
        std::mem::replace(&mut self.sql_mode, mode)
    }

    /// Whole buffer including the RTE header area.
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Open a command segment, closing the current one.
    pub fn new_segment(&mut self, mess_type: u8, autocommit: bool, parse_again: bool) -> Result<()> {
        self.close_segment()?;

        let offset = self.length;
        self.segments += 1;
        self.segment_offset = Some(offset);
        self.segment_length = SEGMENT_HEADER_SIZE;
        self.segment_parts = 0;
        let own_index = self.segments as i16;
        let sql_mode = self.sql_mode;

        let mut segment = self.view_at(offset);
        segment.write_bytes_padded(0, &[], SEGMENT_HEADER_SIZE, &[0])?;
        segment.write_i32(SEGMENT_LEN, 0)?;
        segment.write_i32(SEGMENT_OFFS, (offset - PACKET_HEADER_SIZE) as i32)?;
        segment.write_i16(SEGMENT_NO_OF_PARTS, 0)?;
        segment.write_i16(SEGMENT_OWN_INDEX, own_index)?;
        segment.write_u8(SEGMENT_KIND, SEGMKIND_CMD)?;
        segment.write_u8(SEGMENT_MESS_TYPE, mess_type)?;
        segment.write_u8(SEGMENT_SQL_MODE, sql_mode)?;
        segment.write_u8(SEGMENT_PRODUCER, PRODUCER_USER_CMD)?;
        segment.write_u8(SEGMENT_COMMIT_IMMEDIATELY, autocommit as u8)?;
        segment.write_u8(SEGMENT_PARSING_AGAIN, parse_again as u8)?;

        self.reply_reserve += if self.segments == 2 {
            RESERVE_FOR_2ND_SEGMENT
        } else {
            RESERVE_FOR_REPLY
        };
        Ok(())
    }

    /// Close the current segment (and its open part), if any.
    pub fn close_segment(&mut self) -> Result<()> {
        let Some(offset) = self.segment_offset else {
            return Ok(());
        };
        self.close_part_current()?;

        let length = self.segment_length as i32;
        let parts = self.segment_parts;
        let mut segment = self.view_at(offset);
        segment.write_i32(SEGMENT_LEN, length)?;
        segment.write_i16(SEGMENT_NO_OF_PARTS, parts)?;

        self.length += self.segment_length;
        self.segment_offset = None;
        self.segment_length = 0;
        self.segment_parts = 0;
        Ok(())
    }

    /// Open a part of `kind` in the current segment, closing the open one.
    pub fn new_part(&mut self, kind: u8) -> Result<()> {
        self.close_part_current()?;
        let segment = self
            .segment_offset
            .ok_or_else(|| Error::framing("part opened outside of a segment", &[]))?;

        let offset = segment + self.segment_length;
        let buf_size = self.capacity().saturating_sub(offset + PART_HEADER_SIZE) as i32;
        self.segment_parts += 1;
        self.part_offset = Some(offset);
        self.part_length = 0;
        self.part_args = 0;

        let mut part = self.view_at(offset);
        part.write_u8(PART_KIND, kind)?;
        part.write_u8(PART_ATTRIBUTES, 0)?;
        part.write_i16(PART_ARG_COUNT, 1)?;
        part.write_i32(PART_SEGM_OFFS, (segment - PACKET_HEADER_SIZE) as i32)?;
        part.write_i32(PART_BUF_LEN, 0)?;
        part.write_i32(PART_BUF_SIZE, buf_size)?;
        Ok(())
    }

    /// Close the open part using the length and argument count collected by
    /// the appenders.
    pub fn close_part_current(&mut self) -> Result<()> {
        self.close_part(self.part_length, self.part_args)
    }

    /// Close the open part with an explicit payload length and argument
    /// count. Does nothing when no part is open.
    pub fn close_part(&mut self, extent: usize, args: i16) -> Result<()> {
        let Some(offset) = self.part_offset else {
            return Ok(());
        };
        let mut part = self.view_at(offset);
        part.write_i32(PART_BUF_LEN, extent as i32)?;
        part.write_i16(PART_ARG_COUNT, args)?;

        self.segment_length += align(extent + PART_HEADER_SIZE);
        self.part_offset = None;
        self.part_length = 0;
        self.part_args = 0;
        Ok(())
    }

    /// Close everything and finish the packet header. Returns the packet
    /// length without the RTE header.
    pub fn close(&mut self) -> Result<usize> {
        self.close_segment()?;
        let length = self.length;
        let segments = self.segments as i16;
        let mut header = self.view_at(0);
        header.write_i32(PACKET_VARPART_LEN, (length - PACKET_HEADER_SIZE) as i32)?;
        header.write_i16(PACKET_NO_OF_SEGM, segments)?;
        Ok(length)
    }

    fn data_pos(&self) -> Result<usize> {
        self.part_offset
            .map(|offset| offset + PART_HEADER_SIZE + self.part_length)
            .ok_or_else(|| Error::framing("no part is open", &[]))
    }

    fn encode_text(&self, text: &str) -> Vec<u8> {
        if self.unicode {
            utf16_bytes(text, true)
        } else {
            latin1_bytes(text)
        }
    }

    /// Free bytes once the reply reserve and one more segment with one part
    /// are accounted for.
    fn room(&self) -> i64 {
        self.capacity() as i64
            - self.length as i64
            - SEGMENT_HEADER_SIZE as i64
            - PART_HEADER_SIZE as i64
            - self.reply_reserve as i64
            - RESERVE_FOR_REPLY as i64
    }

    /// Argument count collected for the open part.
    pub fn part_args(&self) -> i16 {
        self.part_args
    }

    /// Override the argument count of the open part.
    pub fn set_part_args(&mut self, args: i16) {
        self.part_args = args;
    }

    /// Append a binary-defined value.
    pub fn add_data(&mut self, value: &[u8]) -> Result<()> {
        let pos = self.data_pos()?;
        let mut buf = self.view_at(pos);
        buf.write_u8(0, DEFINED_BINARY)?;
        buf.write_bytes(1, value)?;
        self.part_length += value.len() + 1;
        Ok(())
    }

    /// Append a NULL value of `len` data bytes.
    pub fn add_null_data(&mut self, len: usize) -> Result<()> {
        let pos = self.data_pos()?;
        let mut buf = self.view_at(pos);
        buf.write_u8(0, UNDEF_BYTE)?;
        buf.write_bytes_padded(1, &[], len, &[0])?;
        self.part_length += len + 1;
        Ok(())
    }

    /// Append raw bytes without a define byte.
    pub fn add_bytes(&mut self, value: &[u8]) -> Result<()> {
        let pos = self.data_pos()?;
        self.view_at(pos).write_bytes(0, value)?;
        self.part_length += value.len();
        Ok(())
    }

    /// Append text preceded by its define byte.
    pub fn add_data_string(&mut self, text: &str) -> Result<()> {
        let define = if self.unicode {
            DEFINED_UNICODE
        } else {
            DEFINED_ASCII
        };
        let raw = self.encode_text(text);
        let pos = self.data_pos()?;
        let mut buf = self.view_at(pos);
        buf.write_u8(0, define)?;
        buf.write_bytes(1, &raw)?;
        self.part_length += raw.len() + 1;
        Ok(())
    }

    /// Append text in the packet's encoding.
    pub fn add_string(&mut self, text: &str) -> Result<()> {
        let raw = self.encode_text(text);
        self.add_bytes(&raw)
    }

    /// Add a result count part announcing how many rows to fetch.
    pub fn add_result_count(&mut self, count: i32) -> Result<()> {
        self.new_part(PARTKIND_RESULT_COUNT)?;
        let mut value = number::encode_i64(count as i64)?;
        value.resize(RESULT_COUNT_SIZE, 0);
        self.add_data(&value)?;
        self.part_args += 1;
        Ok(())
    }

    /// Add a result count part with a NULL count, leaving the row count to
    /// the server.
    pub fn add_undefined_result_count(&mut self) -> Result<()> {
        self.new_part(PARTKIND_RESULT_COUNT)?;
        self.add_null_data(RESULT_COUNT_SIZE)?;
        self.part_args += 1;
        Ok(())
    }

    /// Start a command segment carrying `command`.
    ///
    /// With `reset` the packet is emptied first. Otherwise the command is
    /// appended as another segment, and `false` is returned when it does
    /// not fit.
    pub fn init_dbs_command(&mut self, command: &str, reset: bool, autocommit: bool) -> Result<bool> {
        self.init_command(MESS_TYPE_DBS, command, reset, autocommit, false)
    }

    /// Start a parse segment for `command`.
    pub fn init_parse_command(&mut self, command: &str, reset: bool, parse_again: bool) -> Result<bool> {
        self.init_command(MESS_TYPE_PARSE, command, reset, false, parse_again)
    }

    fn init_command(
        &mut self,
        mess_type: u8,
        command: &str,
        reset: bool,
        autocommit: bool,
        parse_again: bool,
    ) -> Result<bool> {
        if reset {
            self.reset();
        } else {
            self.close_segment()?;
            let needed = self.encode_text(command).len() as i64;
            if self.room() < needed || self.segments >= self.max_segments {
                return Ok(false);
            }
        }
        self.new_segment(mess_type, autocommit, parse_again)?;
        self.new_part(PARTKIND_COMMAND)?;
        self.add_string(command)?;
        self.part_args = 1;
        Ok(true)
    }

    /// Start an execute segment for a parsed statement.
    pub fn init_execute(&mut self, parse_id: &[u8], autocommit: bool) -> Result<()> {
        self.reset();
        self.new_segment(MESS_TYPE_EXECUTE, autocommit, false)?;
        self.add_parse_id_part(parse_id)
    }

    /// Add a "Drop Parseid" segment.
    ///
    /// Without `reset` the segment is appended, and `false` is returned
    /// when the packet has no room left for it.
    pub fn drop_parse_id(&mut self, parse_id: &[u8], reset: bool) -> Result<bool> {
        if reset {
            self.reset();
        } else {
            self.close_segment()?;
            let remaining = self.room()
                - self.encode_text(DROP_PARSE_ID_COMMAND).len() as i64
                - SEGMENT_HEADER_SIZE as i64
                - PART_HEADER_SIZE as i64
                - parse_id.len() as i64;
            if remaining <= 0 || self.segments >= self.max_segments {
                return Ok(false);
            }
        }
        self.new_segment(MESS_TYPE_DBS, false, false)?;
        self.new_part(PARTKIND_COMMAND)?;
        self.add_string(DROP_PARSE_ID_COMMAND)?;
        self.part_args = 1;
        self.add_parse_id_part(parse_id)?;
        Ok(true)
    }

    /// Append another parse id to the open parse id part.
    pub fn drop_parse_id_add_to_parse_id_part(&mut self, parse_id: &[u8]) -> Result<bool> {
        if self.room() - (parse_id.len() as i64) <= 0 {
            return Ok(false);
        }
        self.add_bytes(parse_id)?;
        self.part_args += 1;
        Ok(true)
    }

    /// Add a parse id part naming the statement to execute.
    pub fn add_parse_id_part(&mut self, parse_id: &[u8]) -> Result<()> {
        if parse_id.len() != PARSE_ID_SIZE {
            return Err(Error::InvalidParseId {
                hex: bytes_to_hex_upper(parse_id),
            });
        }
        self.new_part(PARTKIND_PARSID)?;
        self.add_bytes(parse_id)?;
        self.part_args = 1;
        Ok(())
    }

    /// Add the result table name a query should produce.
    pub fn add_cursor_part(&mut self, cursor_name: &str) -> Result<()> {
        if cursor_name.is_empty() {
            return Ok(());
        }
        self.new_part(PARTKIND_RESULT_TABLE_NAME)?;
        self.add_string(cursor_name)?;
        self.part_args = 1;
        Ok(())
    }

    /// Add a feature request part; `features` holds (feature, value) pairs.
    pub fn add_feature_request_part(&mut self, features: &[u8]) -> Result<()> {
        if features.is_empty() {
            return Ok(());
        }
        self.new_part(PARTKIND_FEATURE)?;
        self.add_bytes(features)?;
        self.part_args += (features.len() / 2) as i16;
        Ok(())
    }

    /// Add the client id part sent with the login.
    pub fn add_client_id_part(&mut self, client_id: &str) -> Result<()> {
        self.new_part(PARTKIND_CLIENT_ID)?;
        self.add_data_string(client_id)?;
        self.part_args = 1;
        Ok(())
    }

    /// Start the authentication exchange: connect command plus the client
    /// challenge, offered for SCRAMMD5.
    pub fn init_challenge_response(&mut self, user: &str, challenge: &[u8]) -> Result<()> {
        self.init_dbs_command(&format!("CONNECT {}  AUTHENTICATION", user), true, false)?;
        self.close_part_current()?;
        let mut part = self.new_var_data_part()?;
        part.add_row(2)?;
        part.write_field(SCRAM_MD5_NAME.as_bytes())?;
        part.write_field(challenge)?;
        part.close()
    }

    /// Add the SCRAMMD5 client proof to a connect segment.
    pub fn add_client_proof_part(&mut self, proof: &[u8]) -> Result<()> {
        let mut part = self.new_var_data_part()?;
        part.add_row(2)?;
        part.write_field(SCRAM_MD5_NAME.as_bytes())?;
        part.write_field(proof)?;
        part.close()
    }

    /// Set an attribute bit on the open part.
    pub fn add_part_attribute(&mut self, attribute: u8) -> Result<()> {
        let offset = self
            .part_offset
            .ok_or_else(|| Error::framing("no part is open", &[]))?;
        let mut part = self.view_at(offset);
        let current = part.read_u8(PART_ATTRIBUTES)?;
        part.write_u8(PART_ATTRIBUTES, current | attribute)
    }

    fn set_segment_flag(&mut self, field: usize) -> Result<()> {
        let offset = self
            .segment_offset
            .ok_or_else(|| Error::framing("no segment is open", &[]))?;
        self.view_at(offset).write_u8(field, 1)
    }

    /// Ask the server to describe the result or parameters.
    pub fn set_with_info(&mut self) -> Result<()> {
        self.set_segment_flag(SEGMENT_WITH_INFO)
    }

    /// Mark the current segment as a mass command (array execute or
    /// fetch).
    pub fn set_mass_command(&mut self) -> Result<()> {
        self.set_segment_flag(SEGMENT_MASS_CMD)
    }

    fn open_data_part(&mut self, kind: u8) -> Result<usize> {
        self.new_part(kind)?;
        self.data_pos()
    }

    /// Open a variable-layout vardata part.
    pub fn new_var_data_part(&mut self) -> Result<VariableDataPartWriter<'_>> {
        let data_offset = self.open_data_part(PARTKIND_VARDATA)?;
        Ok(VariableDataPartWriter {
            packet: self,
            data_offset,
            extent: 0,
            arg_count: 0,
        })
    }

    /// Open a fixed-layout data part of `kind` (usually
    /// [`PARTKIND_DATA`]).
    pub fn new_data_part(&mut self, kind: u8) -> Result<FixedDataPartWriter<'_>> {
        let data_offset = self.open_data_part(kind)?;
        Ok(FixedDataPartWriter {
            packet: self,
            data_offset,
            record_offset: 0,
            extent: 0,
            mass_extent: 0,
            arg_count: 0,
        })
    }
}

/// Writer for a variable-layout part. Nothing is committed to the part
/// header until [`close`](VariableDataPartWriter::close).
#[derive(Debug)]
pub struct VariableDataPartWriter<'p> {
    packet: &'p mut RequestPacket,
    data_offset: usize,
    extent: usize,
    arg_count: i16,
}

impl VariableDataPartWriter<'_> {
    // Variable parts are big-endian even inside a little-endian packet.
    fn view(&mut self) -> ByteBuffer<&mut [u8]> {
        ByteBuffer::with_offset(
            self.packet.data.as_mut_slice(),
            RTE_HEADER_SIZE + self.data_offset,
            false,
        )
    }

    /// Start a row of `field_count` fields.
    pub fn add_row(&mut self, field_count: i16) -> Result<()> {
        let at = self.extent;
        self.view().write_i16(at, field_count)?;
        self.extent += 2;
        Ok(())
    }

    /// Append one length-prefixed field.
    pub fn write_field(&mut self, value: &[u8]) -> Result<()> {
        let at = self.extent;
        let mut view = self.view();
        let width = write_field_length(&mut view, at, value.len())?;
        view.write_bytes(at + width, value)?;
        self.extent += width + value.len();
        self.arg_count += 1;
        Ok(())
    }

    /// Append a NULL field.
    pub fn write_null(&mut self) -> Result<()> {
        let at = self.extent;
        self.view().write_u8(at, VARDATA_NULL_VALUE)?;
        self.extent += 1;
        self.arg_count += 1;
        Ok(())
    }

    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn close(self) -> Result<()> {
        self.packet.close_part(self.extent, self.arg_count)
    }
}

/// Writer for a fixed-layout data part.
///
/// Field positions are 1-based `buf_pos` values from the parameter
/// descriptions; the define byte of a field sits at `buf_pos - 1` of the
/// record and its data at `buf_pos`.
#[derive(Debug)]
pub struct FixedDataPartWriter<'p> {
    packet: &'p mut RequestPacket,
    data_offset: usize,
    record_offset: usize,
    extent: usize,
    mass_extent: usize,
    arg_count: i16,
}

impl FixedDataPartWriter<'_> {
    /// View over the current record, in the packet's byte order.
    pub fn record(&mut self) -> ByteBuffer<&mut [u8]> {
        ByteBuffer::with_offset(
            self.packet.data.as_mut_slice(),
            RTE_HEADER_SIZE + self.data_offset + self.record_offset,
            true,
        )
    }

    pub fn is_unicode(&self) -> bool {
        self.packet.unicode
    }

    fn define_pos(buf_pos: usize) -> Result<usize> {
        buf_pos
            .checked_sub(1)
            .ok_or_else(|| Error::framing("field position 0 in data record", &[]))
    }

    /// Write only the define byte of the field at 1-based `buf_pos`.
    pub fn write_define_byte(&mut self, value: u8, buf_pos: usize) -> Result<()> {
        let at = Self::define_pos(buf_pos)?;
        self.record().write_u8(at, value)
    }

    /// Write a field: define byte followed by `value` padded with `pad` to
    /// `len` bytes.
    pub fn write_field(&mut self, define: u8, buf_pos: usize, value: &[u8], len: usize, pad: &[u8]) -> Result<()> {
        self.write_define_byte(define, buf_pos)?;
        self.record().write_bytes_padded(buf_pos, value, len, pad)?;
        self.add_arg(buf_pos, len);
        Ok(())
    }

    /// Write a NULL field of `len` data bytes.
    pub fn write_null(&mut self, buf_pos: usize, len: usize) -> Result<()> {
        self.write_define_byte(UNDEF_BYTE, buf_pos)?;
        self.record().write_bytes_padded(buf_pos, &[], len, &[0])?;
        self.add_arg(buf_pos, len);
        Ok(())
    }

    /// Record that a field of `len` bytes was written at `buf_pos`.
    pub fn add_arg(&mut self, buf_pos: usize, len: usize) {
        self.arg_count += 1;
        self.extent = self.extent.max(buf_pos + len);
    }

    /// Size of the record written so far.
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Whether another record of `record_size` bytes fits behind the
    /// current one.
    pub fn has_room_for(&self, record_size: usize) -> bool {
        let used = self.data_offset + self.record_offset + self.extent;
        self.arg_count < i16::MAX && self.packet.capacity().saturating_sub(used) > record_size
    }

    /// Move the record origin past the current record (mass commands).
    pub fn move_record_base(&mut self) {
        self.record_offset += self.extent;
        self.mass_extent += self.extent;
    }

    pub fn close(self) -> Result<()> {
        self.packet
            .close_part(self.mass_extent + self.extent, self.arg_count)
    }

    /// Close a part holding `rows` records of equal size.
    pub fn close_array_part(self, rows: i16) -> Result<()> {
        let extent = self.mass_extent + self.extent * rows.max(0) as usize;
        self.packet.close_part(extent, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(packet: &RequestPacket) -> ByteBuffer<&[u8]> {
        ByteBuffer::with_offset(packet.raw(), RTE_HEADER_SIZE, true)
    }

    #[test]
    fn test_packet_header() {
        let packet = RequestPacket::new(1024, false).unwrap();
        let header = body(&packet);
        assert_eq!(header.read_u8(PACKET_MESS_CODE).unwrap(), MESS_CODE_ASCII);
        assert_eq!(header.read_u8(PACKET_MESS_SWAP).unwrap(), SWAP_SWAPPED);
        assert_eq!(header.read_ascii(PACKET_APPL_VERSION, 5).unwrap(), "70400");
        assert_eq!(header.read_ascii(PACKET_APPL, 3).unwrap(), "ODB");
        assert_eq!(
            header.read_i32(PACKET_VARPART_SIZE).unwrap(),
            (1024 - RTE_HEADER_SIZE - PACKET_HEADER_SIZE) as i32
        );

        let unicode = RequestPacket::new(1024, true).unwrap();
        assert_eq!(body(&unicode).read_u8(PACKET_MESS_CODE).unwrap(), MESS_CODE_UNICODE_SWAP);
    }

    #[test]
    fn test_too_small_capacity() {
        assert!(matches!(
            RequestPacket::new(64, false),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_dbs_command_layout() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        assert!(packet.init_dbs_command("COMMIT", true, true).unwrap());
        let length = packet.close().unwrap();

        // header + segment header + aligned part (16 + 6 -> 24)
        assert_eq!(length, 32 + 40 + 24);

        let buf = body(&packet);
        assert_eq!(buf.read_i32(PACKET_VARPART_LEN).unwrap(), 64);
        assert_eq!(buf.read_i16(PACKET_NO_OF_SEGM).unwrap(), 1);

        let segment = buf.view(PACKET_HEADER_SIZE, None);
        assert_eq!(segment.read_i32(SEGMENT_LEN).unwrap(), 64);
        assert_eq!(segment.read_i32(SEGMENT_OFFS).unwrap(), 0);
        assert_eq!(segment.read_i16(SEGMENT_NO_OF_PARTS).unwrap(), 1);
        assert_eq!(segment.read_i16(SEGMENT_OWN_INDEX).unwrap(), 1);
        assert_eq!(segment.read_u8(SEGMENT_MESS_TYPE).unwrap(), MESS_TYPE_DBS);
        assert_eq!(segment.read_u8(SEGMENT_COMMIT_IMMEDIATELY).unwrap(), 1);
        assert_eq!(segment.read_u8(SEGMENT_SQL_MODE).unwrap(), SQLMODE_SESSION);

        let part = segment.view(SEGMENT_HEADER_SIZE, None);
        assert_eq!(part.read_u8(PART_KIND).unwrap(), PARTKIND_COMMAND);
        assert_eq!(part.read_i16(PART_ARG_COUNT).unwrap(), 1);
        assert_eq!(part.read_i32(PART_BUF_LEN).unwrap(), 6);
        assert_eq!(part.read_ascii(PART_HEADER_SIZE, 6).unwrap(), "COMMIT");
    }

    #[test]
    fn test_unicode_command_text() {
        let mut packet = RequestPacket::new(4096, true).unwrap();
        packet.init_dbs_command("AB", true, false).unwrap();
        packet.close().unwrap();
        let binding = body(&packet);
        let part = binding.view(PACKET_HEADER_SIZE + SEGMENT_HEADER_SIZE, None);
        assert_eq!(part.read_i32(PART_BUF_LEN).unwrap(), 4);
        assert_eq!(part.slice(PART_HEADER_SIZE, 4).unwrap(), &[b'A', 0, b'B', 0]);
    }

    #[test]
    fn test_appended_segments() {
        let mut packet = RequestPacket::new(32 * 1024, false).unwrap();
        let parse_id = [7u8; PARSE_ID_SIZE];
        assert!(packet.drop_parse_id(&parse_id, true).unwrap());
        assert!(packet.init_dbs_command("ROLLBACK", false, false).unwrap());
        let length = packet.close().unwrap();

        let buf = body(&packet);
        assert_eq!(buf.read_i16(PACKET_NO_OF_SEGM).unwrap(), 2);

        let first = buf.view(PACKET_HEADER_SIZE, None);
        // command part (16 + 12 -> 32) and parse id part (16 + 12 -> 32)
        assert_eq!(first.read_i32(SEGMENT_LEN).unwrap(), 40 + 32 + 32);
        assert_eq!(first.read_i16(SEGMENT_NO_OF_PARTS).unwrap(), 2);
        let parse_part = first.view(SEGMENT_HEADER_SIZE + 32, None);
        assert_eq!(parse_part.read_u8(PART_KIND).unwrap(), PARTKIND_PARSID);
        assert_eq!(parse_part.slice(PART_HEADER_SIZE, 12).unwrap(), &parse_id);

        let second = buf.view(PACKET_HEADER_SIZE + 104, None);
        assert_eq!(second.read_i16(SEGMENT_OWN_INDEX).unwrap(), 2);
        assert_eq!(second.read_i32(SEGMENT_OFFS).unwrap(), 104);
        assert_eq!(length, 32 + 104 + 40 + 24);
    }

    #[test]
    fn test_append_refused_when_full() {
        let mut packet = RequestPacket::new(512, false).unwrap();
        assert!(packet.init_dbs_command("COMMIT", true, false).unwrap());
        // Nothing is left once the reply reserves are taken out.
        assert!(!packet.drop_parse_id(&[1u8; PARSE_ID_SIZE], false).unwrap());
        assert_eq!(packet.segment_count(), 1);
    }

    #[test]
    fn test_segment_limit() {
        let mut packet = RequestPacket::new(64 * 1024, false).unwrap();
        packet.set_max_segments(2);
        assert!(packet.init_dbs_command("COMMIT", true, false).unwrap());
        assert!(packet.init_dbs_command("COMMIT", false, false).unwrap());
        assert!(!packet.init_dbs_command("COMMIT", false, false).unwrap());
    }

    #[test]
    fn test_invalid_parse_id() {
        let mut packet = RequestPacket::new(1024, false).unwrap();
        let err = packet.init_execute(&[1, 2, 3], false).unwrap_err();
        assert!(matches!(err, Error::InvalidParseId { ref hex } if hex == "010203"));
    }

    #[test]
    fn test_challenge_response_part() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        let challenge = [0xAAu8; CLIENT_CHALLENGE_SIZE];
        packet.init_challenge_response("DBA", &challenge).unwrap();
        packet.close().unwrap();

        let binding = body(&packet);
        let segment = binding.view(PACKET_HEADER_SIZE, None);
        assert_eq!(segment.read_i16(SEGMENT_NO_OF_PARTS).unwrap(), 2);

        let command = segment.view(SEGMENT_HEADER_SIZE, None);
        let text = "CONNECT DBA  AUTHENTICATION";
        assert_eq!(command.read_ascii(PART_HEADER_SIZE, text.len()).unwrap(), text);

        let vardata = command.view(align(PART_HEADER_SIZE + text.len()), None);
        assert_eq!(vardata.read_u8(PART_KIND).unwrap(), PARTKIND_VARDATA);
        assert_eq!(vardata.read_i16(PART_ARG_COUNT).unwrap(), 2);
        assert_eq!(vardata.read_i32(PART_BUF_LEN).unwrap(), 2 + 1 + 8 + 1 + 64);

        let payload = vardata.view(PART_HEADER_SIZE, Some(false));
        assert_eq!(payload.read_i16(0).unwrap(), 2);
        assert_eq!(payload.read_u8(2).unwrap(), 8);
        assert_eq!(payload.read_ascii(3, 8).unwrap(), "SCRAMMD5");
        assert_eq!(payload.read_u8(11).unwrap(), 64);
        assert_eq!(payload.slice(12, 64).unwrap(), &challenge[..]);
    }

    #[test]
    fn test_fixed_data_part_records() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        packet.init_execute(&[0u8; PARSE_ID_SIZE], true).unwrap();
        let mut part = packet.new_data_part(PARTKIND_DATA).unwrap();
        part.write_field(DEFINED_ASCII, 1, b"ab", 4, b" ").unwrap();
        part.write_null(6, 3).unwrap();
        assert_eq!(part.extent(), 9);
        part.close().unwrap();
        packet.close().unwrap();

        let binding = body(&packet);
        let segment = binding.view(PACKET_HEADER_SIZE, None);
        let data = segment.view(SEGMENT_HEADER_SIZE + 32, None);
        assert_eq!(data.read_u8(PART_KIND).unwrap(), PARTKIND_DATA);
        assert_eq!(data.read_i16(PART_ARG_COUNT).unwrap(), 2);
        assert_eq!(data.read_i32(PART_BUF_LEN).unwrap(), 9);
        assert_eq!(
            data.slice(PART_HEADER_SIZE, 9).unwrap(),
            &[b' ', b'a', b'b', b' ', b' ', 0xFF, 0, 0, 0]
        );
    }

    #[test]
    fn test_result_count_part() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        packet.init_parse_command("SELECT * FROM DUAL", true, false).unwrap();
        packet.add_result_count(1).unwrap();
        packet.close().unwrap();

        let binding = body(&packet);
        let segment = binding.view(PACKET_HEADER_SIZE, None);
        assert_eq!(segment.read_u8(SEGMENT_MESS_TYPE).unwrap(), MESS_TYPE_PARSE);
        let count = segment.view(SEGMENT_HEADER_SIZE + align(PART_HEADER_SIZE + 18), None);
        assert_eq!(count.read_u8(PART_KIND).unwrap(), PARTKIND_RESULT_COUNT);
        assert_eq!(count.read_i32(PART_BUF_LEN).unwrap(), 7);
        assert_eq!(
            count.slice(PART_HEADER_SIZE, 7).unwrap(),
            &[0, 0xC1, 0x10, 0, 0, 0, 0]
        );
    }
}
