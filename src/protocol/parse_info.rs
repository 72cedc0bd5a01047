//! Parse information and the per-session parse info cache.
//!
//! A parsed statement is identified on the server by a 12-byte parse id.
//! [`ParseInfo`] keeps that id together with the parameter and column
//! descriptions returned by the parse, so a statement seen before can be
//! executed again without another parse round trip.
//!
//! Parse ids are only meaningful inside the session that created them, so
//! every cached entry remembers its session id and is discarded when it is
//! looked up from a different session.

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::crypto::bytes_to_hex_upper;
use crate::protocol::request::RequestPacket;
use crate::protocol::types::FieldInfo;
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use tracing::trace;

/// Server-side parse result of one SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseInfo {
    pub sql: String,
    pub function_code: i16,
    pub parse_id: Option<Vec<u8>>,
    pub mass_parse_id: Option<Vec<u8>>,
    /// Session that owns the parse ids; -1 until a parse id is set.
    pub session_id: i32,
    pub param_infos: Vec<FieldInfo>,
    pub column_infos: Vec<FieldInfo>,
    pub column_names: Vec<String>,
    pub input_count: usize,
    pub is_select: bool,
    pub is_db_proc: bool,
    pub is_mass_command: bool,
    pub has_longs: bool,
    pub is_cached: bool,
}

impl ParseInfo {
    /// Describe a freshly parsed `sql`. Whether it yields a result set or
    /// calls a procedure follows from the function code.
    pub fn new(sql: impl Into<String>, function_code: i16) -> Self {
        let is_select = matches!(
            function_code,
            FUNC_SELECT | FUNC_SHOW | FUNC_DBPROC_WITH_RESULT_SET_EXECUTE | FUNC_EXPLAIN
        );
        let is_db_proc = matches!(
            function_code,
            FUNC_DBPROC_EXECUTE | FUNC_DBPROC_WITH_RESULT_SET_EXECUTE
        );
        Self {
            sql: sql.into(),
            function_code,
            parse_id: None,
            mass_parse_id: None,
            session_id: -1,
            param_infos: Vec::new(),
            column_infos: Vec::new(),
            column_names: Vec::new(),
            input_count: 0,
            is_select,
            is_db_proc,
            is_mass_command: false,
            has_longs: false,
            is_cached: false,
        }
    }

    pub fn set_parse_id_and_session(&mut self, parse_id: Vec<u8>, session_id: i32) -> Result<()> {
        check_parse_id(&parse_id)?;
        self.parse_id = Some(parse_id);
        self.session_id = session_id;
        Ok(())
    }

    /// Store the parse id used for array execution. The application code
    /// inside it tells whether the statement is a mass command.
    pub fn set_mass_parse_id(&mut self, parse_id: Option<Vec<u8>>) -> Result<()> {
        if let Some(id) = &parse_id {
            check_parse_id(id)?;
            self.is_mass_command = MASS_COMMAND_APPL_CODES.contains(&id[APPL_CODE_OFFSET]);
        }
        self.mass_parse_id = parse_id;
        Ok(())
    }

    /// Whether the server already executed the statement while parsing it.
    pub fn is_already_executed(&self) -> bool {
        self.parse_id
            .as_ref()
            .and_then(|id| id.get(APPL_CODE_OFFSET))
            .is_some_and(|code| *code == APPL_CODE_COMMAND_EXECUTED)
    }

    /// Whether the parse ids belong to `session_id`.
    pub fn is_valid(&self, session_id: i32) -> bool {
        self.session_id == session_id
    }

    /// Take the parse ids out so the caller can drop them on the server.
    pub fn take_parse_ids(&mut self) -> Vec<Vec<u8>> {
        self.parse_id
            .take()
            .into_iter()
            .chain(self.mass_parse_id.take())
            .collect()
    }

    /// Split the short field infos of a parse reply into parameters and
    /// result columns.
    ///
    /// Only a select reliably reports which fields are result columns; for
    /// every other statement all infos are kept as parameters and the
    /// column names, if any, are attached to the output parameters.
    pub fn set_short_infos_and_column_names(
        &mut self,
        short_infos: Vec<FieldInfo>,
        column_names: Vec<String>,
    ) -> Result<()> {
        self.input_count = 0;
        self.has_longs = short_infos.iter().any(FieldInfo::is_long);
        self.param_infos.clear();
        self.column_infos.clear();
        self.column_names = column_names;

        if self.function_code == FUNC_SELECT && !self.column_names.is_empty() {
            let column_count = self.column_names.len();
            let param_count = short_infos.len().checked_sub(column_count).ok_or_else(|| {
                Error::framing(
                    format!(
                        "{} column names for {} field infos",
                        column_count,
                        short_infos.len()
                    ),
                    &[],
                )
            })?;
            for info in short_infos {
                if info.is_input() {
                    if self.param_infos.len() == param_count {
                        return Err(Error::framing(
                            format!("unexpected input parameter {}", param_count),
                            &[],
                        ));
                    }
                    self.param_infos.push(info);
                } else {
                    let index = self.column_infos.len();
                    let Some(name) = self.column_names.get(index) else {
                        return Err(Error::framing(
                            format!("unexpected output column {}", index),
                            &[],
                        ));
                    };
                    let name = name.clone();
                    self.column_infos.push(info.with_name(name));
                }
            }
            self.input_count = self.param_infos.len();
            return Ok(());
        }

        if self.column_names.len() == short_infos.len() {
            self.param_infos = short_infos
                .into_iter()
                .zip(self.column_names.iter())
                .map(|(info, name)| info.with_name(name.clone()))
                .collect();
        } else {
            let mut names = self.column_names.iter();
            self.param_infos = short_infos
                .into_iter()
                .map(|info| match info.is_output().then(|| names.next()).flatten() {
                    Some(name) => info.with_name(name.clone()),
                    None => info,
                })
                .collect();
        }
        self.input_count = self.param_infos.iter().filter(|p| p.is_input()).count();
        Ok(())
    }
}

fn check_parse_id(parse_id: &[u8]) -> Result<()> {
    if parse_id.len() != PARSE_ID_SIZE {
        return Err(Error::InvalidParseId {
            hex: bytes_to_hex_upper(parse_id),
        });
    }
    Ok(())
}

/// Hit and miss counters for one statement kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub name: &'static str,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            hits: 0,
            misses: 0,
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let all = self.hits + self.misses;
        if all == 0 {
            0.0
        } else {
            self.hits as f64 / all as f64 * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} hits, {} misses, {}%",
            self.name,
            self.hits,
            self.misses,
            self.hit_rate()
        )
    }
}

// Statement kinds the cache distinguishes: other, insert, select, update, delete.
const KIND_COUNT: usize = 5;

fn kind_index(function_code: i16) -> usize {
    match function_code {
        FUNC_INSERT => 1,
        FUNC_SELECT => 2,
        FUNC_UPDATE => 3,
        FUNC_DELETE => 4,
        _ => 0,
    }
}

/// LRU cache of [`ParseInfo`] keyed by exact SQL text.
pub struct ParseInfoCache {
    entries: LruCache<String, ParseInfo>,
    filter: [bool; KIND_COUNT],
    stats: Option<Vec<CacheStats>>,
}

impl fmt::Debug for ParseInfoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseInfoCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .field("filter", &self.filter)
            .finish()
    }
}

impl ParseInfoCache {
    /// Create a cache for the statement kinds named in `kinds`.
    ///
    /// `kinds` is `"all"` or any combination of `i`, `u`, `d` and `s`
    /// (insert, update, delete, select). A `?` anywhere turns on hit/miss
    /// statistics. A `size` of zero selects the default capacity.
    pub fn new(kinds: &str, size: usize) -> Self {
        let capacity = NonZeroUsize::new(size)
            .or(NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);

        let mut filter = [false; KIND_COUNT];
        if kinds.contains("all") {
            filter = [true; KIND_COUNT];
        } else {
            for (letter, code) in [
                ('i', FUNC_INSERT),
                ('u', FUNC_UPDATE),
                ('d', FUNC_DELETE),
                ('s', FUNC_SELECT),
            ] {
                if kinds.contains(letter) {
                    filter[kind_index(code)] = true;
                }
            }
        }

        let stats = kinds.contains('?').then(|| {
            ["other", "insert", "select", "update", "delete"]
                .into_iter()
                .map(CacheStats::new)
                .collect()
        });

        Self {
            entries: LruCache::new(capacity),
            filter,
            stats,
        }
    }

    /// Whether statements with `function_code` are cached at all.
    pub fn accepts(&self, function_code: i16) -> bool {
        self.filter[kind_index(function_code)]
    }

    /// Look up `sql` for the session `session_id`.
    ///
    /// An entry parsed in another session is removed and reported as not
    /// found; its parse ids died with that session.
    pub fn find_parse_info(&mut self, sql: &str, session_id: i32) -> Option<&ParseInfo> {
        let valid = self.entries.peek(sql)?.is_valid(session_id);
        if !valid {
            trace!(sql, session_id, "dropping parse info of another session");
            self.entries.pop(sql);
            return None;
        }
        let info = self.entries.get(sql)?;
        if let Some(stats) = self.stats.as_mut() {
            stats[kind_index(info.function_code)].hits += 1;
        }
        trace!(sql, "parse info cache hit");
        Some(info)
    }

    /// Cache `info` if its statement kind is accepted, marking it cached.
    ///
    /// Returns the entry pushed out to make room (or replaced under the
    /// same SQL text), whose parse ids the caller must drop.
    pub fn add_parse_info(&mut self, info: &mut ParseInfo) -> Option<ParseInfo> {
        let kind = kind_index(info.function_code);
        if !self.filter[kind] {
            return None;
        }
        info.is_cached = true;
        if let Some(stats) = self.stats.as_mut() {
            stats[kind].misses += 1;
        }
        self.entries
            .push(info.sql.clone(), info.clone())
            .map(|(_, evicted)| evicted)
    }

    /// Remove every entry and hand them back.
    pub fn clear(&mut self) -> Vec<ParseInfo> {
        let mut removed = Vec::with_capacity(self.entries.len());
        while let Some((_, info)) = self.entries.pop_lru() {
            removed.push(info);
        }
        removed
    }

    /// Number of cached statements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached statements.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Per-kind statistics, when enabled.
    pub fn stats(&self) -> Option<&[CacheStats]> {
        self.stats.as_deref()
    }
}

/// Parse ids waiting to be dropped on the server.
///
/// Dropping is batched: ids are collected until [`is_pending`] and then
/// sent together, either as one "Drop Parseid" segment per id or, when the
/// server supports it, as a single segment carrying all of them.
///
/// [`is_pending`]: ParseIdGarbage::is_pending
#[derive(Debug, Default)]
pub struct ParseIdGarbage {
    ids: Vec<Vec<u8>>,
    multiple_drop: bool,
}

impl ParseIdGarbage {
    /// Ids collected before a drop request is worth sending.
    pub const THRESHOLD: usize = 20;

    pub fn new(multiple_drop: bool) -> Self {
        Self {
            ids: Vec::with_capacity(Self::THRESHOLD),
            multiple_drop,
        }
    }

    pub fn push(&mut self, parse_id: Vec<u8>) {
        self.ids.push(parse_id);
    }

    pub fn extend(&mut self, parse_ids: impl IntoIterator<Item = Vec<u8>>) {
        self.ids.extend(parse_ids);
    }

    pub fn is_pending(&self) -> bool {
        self.ids.len() >= Self::THRESHOLD
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget every id; used when the session is gone.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Fill `request` with drop segments for as many ids as fit. Returns
    /// `true` when every id went into the packet.
    pub fn fill(&mut self, request: &mut RequestPacket) -> Result<bool> {
        request.reset();
        let Some(first) = self.ids.pop() else {
            return Ok(true);
        };
        if !request.drop_parse_id(&first, false)? {
            self.ids.push(first);
            return Ok(false);
        }
        while let Some(id) = self.ids.pop() {
            let added = if self.multiple_drop {
                request.drop_parse_id_add_to_parse_id_part(&id)?
            } else {
                request.drop_parse_id(&id, false)?
            };
            if !added {
                self.ids.push(id);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_id(appl_code: u8) -> Vec<u8> {
        let mut id = vec![0u8; PARSE_ID_SIZE];
        id[APPL_CODE_OFFSET] = appl_code;
        id
    }

    fn parsed(sql: &str, function_code: i16, session_id: i32) -> ParseInfo {
        let mut info = ParseInfo::new(sql, function_code);
        info.set_parse_id_and_session(parse_id(0), session_id).unwrap();
        info
    }

    fn field(io_type: u8, data_type: u8) -> FieldInfo {
        FieldInfo::new(PARAM_MODE_OPTIONAL, io_type, data_type, 0, 10, 11, 1, false, false)
    }

    #[test]
    fn test_flags_from_function_code() {
        assert!(ParseInfo::new("SELECT 1 FROM DUAL", FUNC_SELECT).is_select);
        assert!(ParseInfo::new("EXPLAIN SELECT", FUNC_EXPLAIN).is_select);
        assert!(!ParseInfo::new("INSERT", FUNC_INSERT).is_select);
        let call = ParseInfo::new("CALL P", FUNC_DBPROC_EXECUTE);
        assert!(call.is_db_proc && !call.is_select);
    }

    #[test]
    fn test_already_executed_and_mass_command() {
        let mut info = ParseInfo::new("INSERT INTO T VALUES (?)", FUNC_INSERT);
        assert!(!info.is_already_executed());
        info.set_parse_id_and_session(parse_id(APPL_CODE_COMMAND_EXECUTED), 7)
            .unwrap();
        assert!(info.is_already_executed());

        info.set_mass_parse_id(Some(parse_id(44))).unwrap();
        assert!(info.is_mass_command);
        assert_eq!(info.take_parse_ids().len(), 2);
        assert!(info.parse_id.is_none() && info.mass_parse_id.is_none());
    }

    #[test]
    fn test_rejects_short_parse_id() {
        let mut info = ParseInfo::new("SELECT", FUNC_SELECT);
        assert!(matches!(
            info.set_parse_id_and_session(vec![1, 2, 3], 1),
            Err(Error::InvalidParseId { .. })
        ));
    }

    #[test]
    fn test_select_splits_params_and_columns() {
        let mut info = ParseInfo::new("SELECT A, B FROM T WHERE C = ?", FUNC_SELECT);
        let infos = vec![
            field(PARAM_IO_OUTPUT, DT_CHA),
            field(PARAM_IO_INPUT, DT_INTEGER),
            field(PARAM_IO_OUTPUT, DT_LONGA),
        ];
        info.set_short_infos_and_column_names(infos, vec!["A".into(), "B".into()])
            .unwrap();
        assert_eq!(info.param_infos.len(), 1);
        assert_eq!(info.input_count, 1);
        assert_eq!(info.column_infos.len(), 2);
        assert_eq!(info.column_infos[1].name.as_deref(), Some("B"));
        assert!(info.has_longs);
    }

    #[test]
    fn test_select_with_too_many_inputs_fails() {
        let mut info = ParseInfo::new("SELECT A FROM T WHERE B = ? AND C = ?", FUNC_SELECT);
        let infos = vec![
            field(PARAM_IO_INPUT, DT_INTEGER),
            field(PARAM_IO_INPUT, DT_INTEGER),
        ];
        assert!(info
            .set_short_infos_and_column_names(infos, vec!["A".into()])
            .is_err());
    }

    #[test]
    fn test_non_select_names_only_outputs() {
        let mut info = ParseInfo::new("CALL P(?, ?)", FUNC_DBPROC_EXECUTE);
        let infos = vec![field(PARAM_IO_INPUT, DT_INTEGER), field(PARAM_IO_OUTPUT, DT_CHA)];
        info.set_short_infos_and_column_names(infos, vec!["RESULT".into()])
            .unwrap();
        assert!(info.column_infos.is_empty());
        assert_eq!(info.param_infos[0].name, None);
        assert_eq!(info.param_infos[1].name.as_deref(), Some("RESULT"));
        assert_eq!(info.input_count, 1);
    }

    #[test]
    fn test_lookup_checks_session() {
        let mut cache = ParseInfoCache::new("all", 10);
        let mut info = parsed("SELECT * FROM T", FUNC_SELECT, 1);
        assert!(cache.add_parse_info(&mut info).is_none());
        assert!(info.is_cached);

        assert!(cache.find_parse_info("SELECT * FROM T", 1).is_some());
        assert!(cache.find_parse_info("select * from t", 1).is_none());
        assert!(cache.find_parse_info("SELECT * FROM T", 2).is_none());
        // the stale entry is gone for good
        assert!(cache.find_parse_info("SELECT * FROM T", 1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_kind_filter() {
        let mut cache = ParseInfoCache::new("iu", 0);
        assert_eq!(cache.capacity(), DEFAULT_CACHE_SIZE);
        assert!(cache.accepts(FUNC_INSERT) && cache.accepts(FUNC_UPDATE));
        assert!(!cache.accepts(FUNC_SELECT) && !cache.accepts(FUNC_NIL));

        let mut select = parsed("SELECT 1 FROM DUAL", FUNC_SELECT, 1);
        assert!(cache.add_parse_info(&mut select).is_none());
        assert!(!select.is_cached);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_returns_oldest() {
        let mut cache = ParseInfoCache::new("all", 2);
        let mut a = parsed("A", FUNC_INSERT, 1);
        let mut b = parsed("B", FUNC_INSERT, 1);
        let mut c = parsed("C", FUNC_INSERT, 1);
        cache.add_parse_info(&mut a);
        cache.add_parse_info(&mut b);
        // touch A so B becomes the oldest
        assert!(cache.find_parse_info("A", 1).is_some());
        let evicted = cache.add_parse_info(&mut c).unwrap();
        assert_eq!(evicted.sql, "B");
        assert_eq!(cache.len(), 2);

        let removed = cache.clear();
        assert_eq!(removed.len(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut cache = ParseInfoCache::new("s?", 4);
        let mut info = parsed("SELECT 1 FROM DUAL", FUNC_SELECT, 3);
        cache.add_parse_info(&mut info);
        assert!(cache.find_parse_info("SELECT 1 FROM DUAL", 3).is_some());

        let stats = cache.stats().unwrap();
        let select = &stats[2];
        assert_eq!((select.hits, select.misses), (1, 1));
        assert_eq!(select.to_string(), "select: 1 hits, 1 misses, 50%");
        assert!(ParseInfoCache::new("all", 1).stats().is_none());
    }

    #[test]
    fn test_garbage_single_segment_per_id() {
        let mut garbage = ParseIdGarbage::new(false);
        for code in 0..3 {
            garbage.push(parse_id(code));
        }
        let mut request = RequestPacket::new(16 * 1024, false).unwrap();
        assert!(garbage.fill(&mut request).unwrap());
        assert_eq!(request.segment_count(), 3);
        assert!(garbage.is_empty());
    }

    #[test]
    fn test_garbage_multiple_drop_uses_one_segment() {
        let mut garbage = ParseIdGarbage::new(true);
        garbage.extend((0..ParseIdGarbage::THRESHOLD as u8).map(parse_id));
        assert!(garbage.is_pending());
        let mut request = RequestPacket::new(16 * 1024, false).unwrap();
        assert!(garbage.fill(&mut request).unwrap());
        assert_eq!(request.segment_count(), 1);
        assert!(!garbage.is_pending());
    }

    #[test]
    fn test_garbage_stops_at_segment_limit() {
        let mut garbage = ParseIdGarbage::new(false);
        garbage.extend((0..10).map(parse_id));
        let mut request = RequestPacket::new(16 * 1024, false).unwrap();
        assert!(!garbage.fill(&mut request).unwrap());
        assert_eq!(request.segment_count(), DEFAULT_MAX_NUMBER_OF_SEGMENTS);
        assert_eq!(garbage.len(), 10 - DEFAULT_MAX_NUMBER_OF_SEGMENTS);
    }
}
