//! High-level Connection API for the MaxDB thin client.

use crate::error::{Error, Result};
use crate::protocol::auth::{authenticate, AuthCredentials, SessionData};
use crate::protocol::buffer::ByteBuffer;
use crate::protocol::connect::{self, ConnectParams};
use crate::protocol::constants::*;
use crate::protocol::packet::PacketStream;
use crate::protocol::parse_info::{CacheStats, ParseIdGarbage, ParseInfo, ParseInfoCache};
use crate::protocol::reply::ReplyPacket;
use crate::protocol::request::RequestPacket;
use crate::protocol::types::{FieldInfo, MaxDbValue, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Rows requested per fetch round trip.
pub const DEFAULT_FETCH_SIZE: i32 = 30000;

const CURSOR_PREFIX: &str = "MAXDB_CURSOR_";

/// Result of a query execution.
#[derive(Debug)]
pub struct QueryResult {
    /// Column descriptions.
    pub columns: Arc<[FieldInfo]>,
    /// Rows returned.
    pub rows: Vec<Row>,
    /// Rows affected, for statements that are not queries.
    pub row_count: Option<i64>,
}

impl QueryResult {
    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_deref().unwrap_or(""))
            .collect()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Outcome of a statement that was executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteResult {
    /// Server function code of the statement.
    pub function_code: i16,
    /// Affected rows, when the server reports a count.
    pub row_count: Option<i64>,
    /// Values of output parameters, in parameter order.
    pub outputs: Vec<MaxDbValue>,
    /// Result table of a query, to be fetched from.
    pub cursor: Option<String>,
}

/// Cancels the running request of a connection from another task.
///
/// The cancel travels on its own socket. Afterwards the connection reports
/// [`Error::Desynchronized`] and has to be reopened.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    params: ConnectParams,
    sender_ref: i32,
    desynchronized: Arc<AtomicBool>,
}

impl CancelHandle {
    pub async fn cancel(&self) -> Result<()> {
        self.desynchronized.store(true, Ordering::Release);
        connect::cancel(&self.params, self.sender_ref).await
    }
}

/// A MaxDB database connection.
pub struct Connection {
    stream: PacketStream,
    request: RequestPacket,
    params: ConnectParams,
    session: SessionData,
    cache: Option<ParseInfoCache>,
    garbage: ParseIdGarbage,
    autocommit: bool,
    opened_at: Instant,
    cursor_seq: u64,
    desynchronized: Arc<AtomicBool>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("params", &self.params)
            .field("session_id", &self.session.session_id)
            .field("unicode", &self.session.unicode)
            .field("autocommit", &self.autocommit)
            .finish()
    }
}

impl Connection {
    /// Connect to a MaxDB database.
    ///
    /// # Arguments
    ///
    /// * `conn_str` - Either `key=value;` pairs or `host[:port]/database`
    ///   (the latter without credentials).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use maxdb_thin_rs::Connection;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let conn = Connection::connect(
    ///         "Server=localhost;Database=MAXDB;User Id=DBA;Password=secret"
    ///     ).await?;
    ///     conn.close().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let params = ConnectParams::parse(conn_str)?;
        Self::connect_with_params(&params).await
    }

    /// Connect with explicit connection parameters.
    pub async fn connect_with_params(params: &ConnectParams) -> Result<Self> {
        let mut stream = connect::connect(params).await?;
        let creds = AuthCredentials::new(&params.username, &params.password);
        let session = match authenticate(&mut stream, &creds, params.space_option).await {
            Ok(session) => session,
            Err(e) => {
                if let Err(release_error) = stream.release().await {
                    debug!(error = %release_error, "release after failed login");
                }
                return Err(e);
            }
        };

        let request = RequestPacket::new(stream.request_capacity(), session.unicode)?;
        let cache = params
            .cache
            .as_deref()
            .map(|kinds| ParseInfoCache::new(kinds, params.cache_size));
        let multiple_drop = feature_granted(session.features.as_deref(), FEATURE_MULTIPLE_DROP_PARSEID);
        debug!(
            host = %params.host,
            database = %params.database,
            session_id = session.session_id,
            cache = ?params.cache,
            "session opened"
        );

        Ok(Self {
            stream,
            request,
            params: params.clone(),
            session,
            cache,
            garbage: ParseIdGarbage::new(multiple_drop),
            autocommit: params.autocommit,
            opened_at: Instant::now(),
            cursor_seq: 0,
            desynchronized: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Check that the session still answers.
    pub async fn ping(&mut self) -> Result<()> {
        let result = self.ping_inner().await;
        self.observe(result)
    }

    async fn ping_inner(&mut self) -> Result<()> {
        self.check_usable()?;
        let mode = self.request.switch_sql_mode(SQLMODE_INTERNAL);
        let prepared = self.request.init_dbs_command("PING", true, false);
        self.request.switch_sql_mode(mode);
        prepared?;
        let mut reply = self.round_trip().await?;
        check_reply(&mut reply)?;
        Ok(())
    }

    /// Release the session and close the socket.
    pub async fn close(mut self) -> Result<()> {
        if self.is_desynchronized() {
            debug!(session_id = self.session.session_id, "closing desynchronized session");
            return Ok(());
        }
        if !self.garbage.is_empty() {
            self.flush_garbage().await;
        }
        debug!(session_id = self.session.session_id, "closing session");
        self.stream.release().await
    }

    /// Handle for cancelling the running request from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            params: self.params.clone(),
            sender_ref: self.stream.sender_ref(),
            desynchronized: Arc::clone(&self.desynchronized),
        }
    }

    /// Cancel the running request. The connection is unusable afterwards.
    pub async fn cancel(&mut self) -> Result<()> {
        debug!(session_id = self.session.session_id, "cancelling session");
        let result = self.cancel_handle().cancel().await;
        self.drop_session_state();
        result
    }

    pub fn session_id(&self) -> i32 {
        self.session.session_id
    }

    pub fn is_unicode(&self) -> bool {
        self.session.unicode
    }

    /// Kernel version as `major * 10000 + minor * 100 + correction`.
    pub fn kernel_version(&self) -> Option<i32> {
        self.session.kernel_version
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    pub fn set_autocommit(&mut self, autocommit: bool) {
        self.autocommit = autocommit;
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized.load(Ordering::Acquire)
    }

    /// Parse info cache statistics, when the cache keeps them.
    pub fn cache_stats(&self) -> Option<&[CacheStats]> {
        self.cache.as_ref().and_then(ParseInfoCache::stats)
    }

    /// Execute SQL text directly, without parsing it first.
    pub async fn execute(&mut self, sql: &str) -> Result<ExecuteResult> {
        let result = self.execute_inner(sql).await;
        self.observe(result)
    }

    async fn execute_inner(&mut self, sql: &str) -> Result<ExecuteResult> {
        self.check_usable()?;
        self.collect_garbage().await;
        trace!(sql, "executing");
        self.request.init_dbs_command(sql, true, self.autocommit)?;
        let mut reply = self.round_trip().await?;
        check_reply(&mut reply)?;
        Ok(ExecuteResult {
            function_code: base_function_code(reply.function_code()?),
            row_count: reply.result_count()?,
            outputs: Vec::new(),
            cursor: None,
        })
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT WORK").await.map(|_| ())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK WORK").await.map(|_| ())
    }

    /// Parse `sql` on the server, or take it from the parse info cache.
    pub async fn prepare(&mut self, sql: &str) -> Result<ParseInfo> {
        let result = self.prepare_inner(sql).await;
        self.observe(result)
    }

    async fn prepare_inner(&mut self, sql: &str) -> Result<ParseInfo> {
        self.check_usable()?;
        let session_id = self.session.session_id;
        if let Some(info) = self
            .cache
            .as_mut()
            .and_then(|cache| cache.find_parse_info(sql, session_id))
        {
            return Ok(info.clone());
        }
        self.collect_garbage().await;

        trace!(sql, "parsing");
        self.request.init_parse_command(sql, true, false)?;
        let mut reply = self.round_trip().await?;
        check_reply(&mut reply)?;

        let mut info = ParseInfo::new(sql, base_function_code(reply.function_code()?));
        let part = reply
            .find_part(PARTKIND_PARSID)
            .ok_or_else(|| Error::framing("parse reply carries no parse id", reply.as_bytes()))?;
        let raw = reply.part_data(&part)?;
        let parse_id = raw.get(..PARSE_ID_SIZE).unwrap_or(raw).to_vec();
        info.set_parse_id_and_session(parse_id, session_id)?;

        let space_option = self.params.space_option;
        let short_infos = if let Some(part) = reply.find_part(PARTKIND_SHORT_INFO) {
            reply.parse_short_fields(&part, space_option, false)?
        } else if let Some(part) = reply.find_part(PARTKIND_VARDATA_SHORT_INFO) {
            reply.parse_short_fields(&part, space_option, true)?
        } else {
            Vec::new()
        };
        let column_names = match reply.find_part(PARTKIND_COLUMN_NAMES) {
            Some(part) => reply.parse_column_names(&part)?,
            None => Vec::new(),
        };
        info.set_short_infos_and_column_names(short_infos, column_names)?;

        if let Some(cache) = self.cache.as_mut() {
            if let Some(mut evicted) = cache.add_parse_info(&mut info) {
                trace!(sql = %evicted.sql, "parse info evicted");
                self.garbage.extend(evicted.take_parse_ids());
            }
        }
        Ok(info)
    }

    /// Execute a parsed statement with `params` as its input values.
    pub async fn execute_prepared(
        &mut self,
        info: &ParseInfo,
        params: &[MaxDbValue],
    ) -> Result<ExecuteResult> {
        let result = self.execute_prepared_inner(info, params).await;
        self.observe(result)
    }

    async fn execute_prepared_inner(
        &mut self,
        info: &ParseInfo,
        params: &[MaxDbValue],
    ) -> Result<ExecuteResult> {
        self.check_usable()?;
        let parse_id = match &info.parse_id {
            Some(id) if info.is_valid(self.session.session_id) => id,
            other => {
                return Err(Error::InvalidParseId {
                    hex: crate::protocol::crypto::bytes_to_hex_upper(
                        other.as_deref().unwrap_or_default(),
                    ),
                })
            }
        };
        if params.len() != info.input_count {
            return Err(Error::type_conversion(format!(
                "statement takes {} parameters, {} given",
                info.input_count,
                params.len()
            )));
        }
        if info.is_already_executed() {
            trace!(sql = %info.sql, "executed while parsing");
            return Ok(ExecuteResult {
                function_code: info.function_code,
                row_count: None,
                outputs: Vec::new(),
                cursor: None,
            });
        }

        self.request.init_execute(parse_id, self.autocommit)?;
        let cursor = if info.is_select {
            self.cursor_seq += 1;
            let name = format!("{}{}", CURSOR_PREFIX, self.cursor_seq);
            self.request.add_cursor_part(&name)?;
            Some(name)
        } else {
            None
        };
        if !params.is_empty() {
            let mut writer = self.request.new_data_part(PARTKIND_DATA)?;
            let inputs = info.param_infos.iter().filter(|p| p.is_input());
            for (field, value) in inputs.zip(params) {
                field.put(&mut writer, value)?;
            }
            writer.close()?;
        }

        let mut reply = self.round_trip().await?;
        check_reply(&mut reply)?;
        let row_count = reply.result_count()?;

        let mut outputs = Vec::new();
        if info.param_infos.iter().any(FieldInfo::is_output) {
            if let Some(part) = reply.find_part(PARTKIND_DATA) {
                let record = reply.part_view(&part);
                let part_data = reply.part_data(&part)?;
                for field in info.param_infos.iter().filter(|p| p.is_output()) {
                    outputs.push(field.get(&record, part_data)?);
                }
            }
        }

        Ok(ExecuteResult {
            function_code: info.function_code,
            row_count,
            outputs,
            cursor,
        })
    }

    /// Fetch up to `count` rows of an open result table. Returns the rows
    /// and whether more are left.
    pub async fn fetch(
        &mut self,
        cursor: &str,
        columns: &Arc<[FieldInfo]>,
        count: i32,
    ) -> Result<(Vec<Row>, bool)> {
        let result = self.fetch_inner(cursor, columns, count).await;
        self.observe(result)
    }

    async fn fetch_inner(
        &mut self,
        cursor: &str,
        columns: &Arc<[FieldInfo]>,
        count: i32,
    ) -> Result<(Vec<Row>, bool)> {
        self.check_usable()?;
        if columns.is_empty() {
            return Ok((Vec::new(), false));
        }
        let command = format!(
            "FETCH NEXT \"{}\" INTO {}",
            cursor,
            vec!["?"; columns.len()].join(", ")
        );
        let mode = self.request.switch_sql_mode(SQLMODE_INTERNAL);
        let prepared = self.prepare_fetch(&command, count);
        self.request.switch_sql_mode(mode);
        prepared?;

        let mut reply = self.round_trip().await?;
        if check_reply(&mut reply)? == RC_ROW_NOT_FOUND {
            return Ok((Vec::new(), false));
        }
        let Some(part) = reply.find_part(PARTKIND_DATA) else {
            return Ok((Vec::new(), false));
        };

        let record_size = record_size(columns);
        let part_data = reply.part_data(&part)?;
        let mut rows = Vec::with_capacity(part.args());
        for i in 0..part.args() {
            let record = ByteBuffer::with_offset(
                reply.as_bytes(),
                part.data_offset() + i * record_size,
                reply.is_swapped(),
            );
            let values = columns
                .iter()
                .map(|c| c.get(&record, part_data))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(values, Arc::clone(columns)));
        }
        let more = !ReplyPacket::was_last_part(&part);
        trace!(cursor, rows = rows.len(), more, "fetched");
        Ok((rows, more))
    }

    fn prepare_fetch(&mut self, command: &str, count: i32) -> Result<()> {
        self.request.init_dbs_command(command, true, self.autocommit)?;
        self.request.set_mass_command()?;
        self.request.add_result_count(count)
    }

    /// Close a result table on the server.
    pub async fn close_cursor(&mut self, cursor: &str) -> Result<()> {
        self.execute(&format!("CLOSE \"{}\"", cursor)).await.map(|_| ())
    }

    /// Run `sql` with `params` and collect every result row.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use maxdb_thin_rs::{Connection, MaxDbValue};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let mut conn = Connection::connect(
    ///         "Server=localhost;Database=MAXDB;User Id=DBA;Password=secret"
    ///     ).await?;
    ///
    ///     let result = conn
    ///         .query("SELECT NAME FROM USERS WHERE ID = ?", &[MaxDbValue::Integer(1)])
    ///         .await?;
    ///     for row in &result {
    ///         println!("{:?}", row.get(0));
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn query(&mut self, sql: &str, params: &[MaxDbValue]) -> Result<QueryResult> {
        let mut info = self.prepare(sql).await?;
        let executed = self.execute_prepared(&info, params).await;
        let columns: Arc<[FieldInfo]> = info.column_infos.clone().into();
        if !info.is_cached {
            self.release_statement(&mut info);
        }
        let executed = executed?;

        let mut rows = Vec::new();
        if let Some(cursor) = executed.cursor.as_deref() {
            let mut more = true;
            while more {
                let (mut chunk, has_more) = self.fetch(cursor, &columns, DEFAULT_FETCH_SIZE).await?;
                more = has_more && !chunk.is_empty();
                rows.append(&mut chunk);
            }
            self.close_cursor(cursor).await?;
        }
        Ok(QueryResult {
            columns,
            rows,
            row_count: executed.row_count,
        })
    }

    /// Give back a statement that is no longer needed. Parse ids of
    /// uncached statements are queued for dropping.
    pub fn release_statement(&mut self, info: &mut ParseInfo) {
        if !info.is_cached {
            self.garbage.extend(info.take_parse_ids());
        }
    }

    async fn round_trip(&mut self) -> Result<ReplyPacket> {
        self.stream.execute(&mut self.request).await
    }

    fn check_usable(&mut self) -> Result<()> {
        if self.is_desynchronized() {
            self.drop_session_state();
            return Err(Error::Desynchronized);
        }
        Ok(())
    }

    /// Mark the session unusable when `result` failed in a way that leaves
    /// the packet stream out of step with the server.
    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal_to_session() && !self.is_desynchronized() {
                debug!(session_id = self.session.session_id, error = %e, "session desynchronized");
                self.desynchronized.store(true, Ordering::Release);
                self.drop_session_state();
            }
        }
        result
    }

    /// Parse ids died with the session; forget them.
    fn drop_session_state(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.garbage.clear();
    }

    async fn collect_garbage(&mut self) {
        if self.garbage.is_pending() {
            self.flush_garbage().await;
        }
    }

    /// Send drop requests for all queued parse ids. Failures are logged
    /// and otherwise ignored.
    async fn flush_garbage(&mut self) {
        while !self.garbage.is_empty() {
            match self.garbage.fill(&mut self.request) {
                Ok(_) if self.request.segment_count() > 0 => {}
                Ok(_) => break,
                Err(e) => {
                    debug!(error = %e, "cannot build drop parse id request");
                    break;
                }
            }
            let result = self.round_trip().await;
            if let Err(e) = self.observe(result) {
                debug!(error = %e, "dropping parse ids failed");
                if self.is_desynchronized() {
                    break;
                }
            }
        }
    }
}

/// Fail on any return code other than success and "row not found".
/// Returns the return code.
fn check_reply(reply: &mut ReplyPacket) -> Result<i16> {
    let rc = reply.weak_return_code()?;
    if rc != 0 && rc != RC_ROW_NOT_FOUND {
        return Err(reply.to_error()?);
    }
    Ok(rc)
}

fn base_function_code(code: i16) -> i16 {
    if code > FUNC_MASS_OFFSET {
        code - FUNC_MASS_OFFSET
    } else {
        code
    }
}

/// Bytes per row of a fetched result.
fn record_size(columns: &[FieldInfo]) -> usize {
    columns
        .iter()
        .map(|c| (c.buf_pos.max(1) as usize) + c.io_length.max(0) as usize - 1)
        .max()
        .unwrap_or(0)
}

/// Whether the (feature, value) pairs of the login reply switch `feature` on.
fn feature_granted(features: Option<&[u8]>, feature: u8) -> bool {
    features.is_some_and(|pairs| {
        pairs
            .chunks_exact(2)
            .any(|pair| pair[0] == feature && pair[1] != 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(buf_pos: i32, io_length: i16) -> FieldInfo {
        FieldInfo::new(PARAM_MODE_OPTIONAL, PARAM_IO_OUTPUT, DT_CHA, 0, io_length - 1, io_length, buf_pos, false, false)
    }

    #[test]
    fn test_record_size() {
        assert_eq!(record_size(&[]), 0);
        assert_eq!(record_size(&[column(1, 11)]), 11);
        assert_eq!(record_size(&[column(1, 11), column(12, 5), column(5, 3)]), 16);
    }

    #[test]
    fn test_feature_granted() {
        let features = [FEATURE_MULTIPLE_DROP_PARSEID, 1, FEATURE_SPACE_OPTION, 0];
        assert!(feature_granted(Some(&features), FEATURE_MULTIPLE_DROP_PARSEID));
        assert!(!feature_granted(Some(&features), FEATURE_SPACE_OPTION));
        assert!(!feature_granted(Some(&features), FEATURE_VARIABLE_INPUT));
        assert!(!feature_granted(None, FEATURE_MULTIPLE_DROP_PARSEID));
    }

    #[test]
    fn test_base_function_code() {
        assert_eq!(base_function_code(FUNC_INSERT), FUNC_INSERT);
        assert_eq!(base_function_code(FUNC_MASS_OFFSET + FUNC_INSERT), FUNC_INSERT);
    }

    #[test]
    fn test_query_result_accessors() {
        let columns: Arc<[FieldInfo]> = vec![column(1, 11).with_name("A")].into();
        let rows = vec![Row::new(vec![MaxDbValue::from("x")], Arc::clone(&columns))];
        let result = QueryResult {
            columns,
            rows,
            row_count: None,
        };
        assert_eq!(result.len(), 1);
        assert_eq!(result.column_names(), vec!["A"]);
        assert_eq!(result.iter().count(), 1);
    }
}
