//! MaxDB wire protocol constants.

// RTE header (prefixes every packet on the wire)
pub const RTE_ACT_SEND_LEN: usize = 0;
pub const RTE_PROTOCOL_ID: usize = 4;
pub const RTE_MESS_CLASS: usize = 5;
pub const RTE_FLAGS: usize = 6;
pub const RTE_RESIDUAL_PACKETS: usize = 7;
pub const RTE_SENDER_REF: usize = 8;
pub const RTE_RECEIVER_REF: usize = 12;
pub const RTE_RETURN_CODE: usize = 16;
pub const RTE_FILLER: usize = 18;
pub const RTE_MAX_SEND_LEN: usize = 20;
pub const RTE_HEADER_SIZE: usize = 24;

pub const RTE_PROT_TCP: u8 = 3;

// RSQL message classes
pub const RSQL_INFO_REQUEST: u8 = 51;
pub const RSQL_INFO_REPLY: u8 = 52;
pub const RSQL_USER_CONN_REQUEST: u8 = 61;
pub const RSQL_USER_CONN_REPLY: u8 = 62;
pub const RSQL_USER_DATA_REQUEST: u8 = 63;
pub const RSQL_USER_DATA_REPLY: u8 = 64;
pub const RSQL_USER_CANCEL_REQUEST: u8 = 65;
pub const RSQL_USER_RELEASE_REQUEST: u8 = 66;

// RTE return codes
pub const SQLOK: i16 = 0;
pub const SQLNOTOK: i16 = 1;
pub const SQLTASKLIMIT: i16 = 2;
pub const SQLTIMEOUT: i16 = 3;
pub const SQLCRASH: i16 = 4;
pub const SQLSTART_REQUIRED: i16 = 5;
pub const SQLSHUTDOWN: i16 = 6;
pub const SQLSEND_LINE_DOWN: i16 = 7;
pub const SQLRECEIVE_LINE_DOWN: i16 = 8;
pub const SQLPACKETLIMIT: i16 = 9;
pub const SQLRELEASED: i16 = 10;
pub const SQLWOULDBLOCK: i16 = 11;
pub const SQLUNKNOWN_REQUEST: i16 = 12;
pub const SQLSERVER_DB_UNKNOWN: i16 = 13;

// Connect packet (offsets relative to the end of the RTE header)
pub const CONNECT_MESS_CODE: usize = 0;
pub const CONNECT_LENGTH: usize = 2;
pub const CONNECT_SERVICE_TYPE: usize = 4;
pub const CONNECT_OS_TYPE: usize = 5;
pub const CONNECT_MAX_SEGMENT_SIZE: usize = 8;
pub const CONNECT_MAX_DATA_LEN: usize = 12;
pub const CONNECT_PACKET_SIZE: usize = 16;
pub const CONNECT_MIN_REPLY_SIZE: usize = 20;
pub const CONNECT_SERVER_DB: usize = 24;
pub const CONNECT_CLIENT_DB: usize = 32;
pub const CONNECT_VAR_PART: usize = 40;
pub const CONNECT_END: usize = 296;
pub const CONNECT_DB_NAME_SIZE: usize = 8;
pub const CONNECT_MIN_SIZE: usize = 64;

pub const SERVICE_TYPE_USER: u8 = 0;
pub const OS_TYPE_RSQL_DOTNET: u8 = 13;
pub const MESS_CODE_ASCII: u8 = 0;
pub const MESS_CODE_UNICODE_SWAP: u8 = 19;
pub const MESS_CODE_UNICODE: u8 = 20;
pub const INFO_MAX_SEGMENT_SIZE: i32 = 1024 * 32;

// Connect argument tags
pub const ARG_PORT_NO: u8 = 0x50;
pub const ARG_REM_PID: u8 = 0x49;
pub const ARG_ACKNOWLEDGE: u8 = 0x52;
pub const ARG_NODE: u8 = 0x3E;
pub const ARG_DBROOT: u8 = 0x64;
pub const ARG_SERVERPGM: u8 = 0x70;
pub const ARG_AUTH_ALLOW: u8 = 0x61;
pub const ARG_OMIT_REPLY_PART: u8 = 0x72;

// Byte order markers
pub const SWAP_NOT_SWAPPED: u8 = 1;
pub const SWAP_SWAPPED: u8 = 2;

// Packet header (after the RTE header)
pub const PACKET_MESS_CODE: usize = 0;
pub const PACKET_MESS_SWAP: usize = 1;
pub const PACKET_APPL_VERSION: usize = 4;
pub const PACKET_APPL: usize = 9;
pub const PACKET_VARPART_SIZE: usize = 12;
pub const PACKET_VARPART_LEN: usize = 16;
pub const PACKET_NO_OF_SEGM: usize = 22;
pub const PACKET_HEADER_SIZE: usize = 32;

pub const APPL_VERSION: &str = "70400";
pub const APPL_ID: &str = "ODB";

// Segment header
pub const SEGMENT_LEN: usize = 0;
pub const SEGMENT_OFFS: usize = 4;
pub const SEGMENT_NO_OF_PARTS: usize = 8;
pub const SEGMENT_OWN_INDEX: usize = 10;
pub const SEGMENT_KIND: usize = 12;
pub const SEGMENT_MESS_TYPE: usize = 13;
pub const SEGMENT_SQL_MODE: usize = 14;
pub const SEGMENT_PRODUCER: usize = 15;
pub const SEGMENT_COMMIT_IMMEDIATELY: usize = 16;
pub const SEGMENT_IGNORE_COSTWARNING: usize = 17;
pub const SEGMENT_PREPARE: usize = 18;
pub const SEGMENT_WITH_INFO: usize = 19;
pub const SEGMENT_MASS_CMD: usize = 20;
pub const SEGMENT_PARSING_AGAIN: usize = 21;
pub const SEGMENT_COMMAND_OPTIONS: usize = 22;
// reply segment fields
pub const SEGMENT_SQL_STATE: usize = 13;
pub const SEGMENT_RETURN_CODE: usize = 18;
pub const SEGMENT_ERROR_POS: usize = 20;
pub const SEGMENT_FUNCTION_CODE: usize = 28;
pub const SEGMENT_HEADER_SIZE: usize = 40;

// Segment kinds
pub const SEGMKIND_NIL: u8 = 0;
pub const SEGMKIND_CMD: u8 = 1;
pub const SEGMKIND_RETURN: u8 = 2;

pub const PRODUCER_USER_CMD: u8 = 1;

// Message types
pub const MESS_TYPE_DBS: u8 = 2;
pub const MESS_TYPE_PARSE: u8 = 3;
pub const MESS_TYPE_SYNTAX: u8 = 5;
pub const MESS_TYPE_EXECUTE: u8 = 13;
pub const MESS_TYPE_PUTVAL: u8 = 15;
pub const MESS_TYPE_GETVAL: u8 = 16;
pub const MESS_TYPE_HELLO: u8 = 25;

// Part header
pub const PART_KIND: usize = 0;
pub const PART_ATTRIBUTES: usize = 1;
pub const PART_ARG_COUNT: usize = 2;
pub const PART_SEGM_OFFS: usize = 4;
pub const PART_BUF_LEN: usize = 8;
pub const PART_BUF_SIZE: usize = 12;
pub const PART_HEADER_SIZE: usize = 16;

pub const ALIGN_VALUE: usize = 8;

// Part kinds
pub const PARTKIND_NIL: u8 = 0;
pub const PARTKIND_APPL_PARAMETER_DESCRIPTION: u8 = 1;
pub const PARTKIND_COLUMN_NAMES: u8 = 2;
pub const PARTKIND_COMMAND: u8 = 3;
pub const PARTKIND_CONV_TABLES_RETURNED: u8 = 4;
pub const PARTKIND_DATA: u8 = 5;
pub const PARTKIND_ERROR_TEXT: u8 = 6;
pub const PARTKIND_GET_INFO: u8 = 7;
pub const PARTKIND_MODULNAME: u8 = 8;
pub const PARTKIND_PAGE: u8 = 9;
pub const PARTKIND_PARSID: u8 = 10;
pub const PARTKIND_PARSID_OF_SELECT: u8 = 11;
pub const PARTKIND_RESULT_COUNT: u8 = 12;
pub const PARTKIND_RESULT_TABLE_NAME: u8 = 13;
pub const PARTKIND_SHORT_INFO: u8 = 14;
pub const PARTKIND_USER_INFO_RETURNED: u8 = 15;
pub const PARTKIND_SURROGATE: u8 = 16;
pub const PARTKIND_BDINFO: u8 = 17;
pub const PARTKIND_LONG_DATA: u8 = 18;
pub const PARTKIND_TABLE_NAME: u8 = 19;
pub const PARTKIND_SESSION_INFO_RETURNED: u8 = 20;
pub const PARTKIND_OUTPUT_COLS_NO_PARAMETER: u8 = 21;
pub const PARTKIND_KEY: u8 = 22;
pub const PARTKIND_SERIAL: u8 = 23;
pub const PARTKIND_RELATIVE_POS: u8 = 24;
pub const PARTKIND_LONG_DEMAND: u8 = 30;
pub const PARTKIND_MESSAGE_LIST: u8 = 31;
pub const PARTKIND_VARDATA_SHORT_INFO: u8 = 32;
pub const PARTKIND_VARDATA: u8 = 33;
pub const PARTKIND_FEATURE: u8 = 34;
pub const PARTKIND_CLIENT_ID: u8 = 35;

// Part attributes
pub const PART_ATTR_LAST_PACKET: u8 = 1;
pub const PART_ATTR_NEXT_PACKET: u8 = 2;
pub const PART_ATTR_FIRST_PACKET: u8 = 4;

// Feature codes for the feature request part
pub const FEATURE_MULTIPLE_DROP_PARSEID: u8 = 1;
pub const FEATURE_SPACE_OPTION: u8 = 2;
pub const FEATURE_VARIABLE_INPUT: u8 = 3;
pub const FEATURE_OPTIMIZED_STREAMS: u8 = 4;
pub const FEATURE_CHECK_SCROLLABLE_OPTION: u8 = 5;

// SQL modes
pub const SQLMODE_NIL: u8 = 0;
pub const SQLMODE_SESSION: u8 = 1;
pub const SQLMODE_INTERNAL: u8 = 2;
pub const SQLMODE_ANSI: u8 = 3;
pub const SQLMODE_DB2: u8 = 4;
pub const SQLMODE_ORACLE: u8 = 5;
pub const SQLMODE_SAPR3: u8 = 6;

// Segment return codes
pub const RC_ROW_NOT_FOUND: i16 = 100;
pub const RC_COMMUNICATION_RESTART: i16 = -8000;
pub const RC_UNKNOWN_USER_PASSWORD: i16 = -4008;

// Function codes
pub const FUNC_NIL: i16 = 0;
pub const FUNC_CREATE_TABLE: i16 = 1;
pub const FUNC_SET_ROLE: i16 = 2;
pub const FUNC_INSERT: i16 = 3;
pub const FUNC_SELECT: i16 = 4;
pub const FUNC_UPDATE: i16 = 5;
pub const FUNC_DELETE: i16 = 9;
pub const FUNC_EXPLAIN: i16 = 27;
pub const FUNC_DBPROC_EXECUTE: i16 = 34;
pub const FUNC_FETCH_FIRST: i16 = 206;
pub const FUNC_FETCH_LAST: i16 = 207;
pub const FUNC_FETCH_NEXT: i16 = 208;
pub const FUNC_FETCH_PREV: i16 = 209;
pub const FUNC_FETCH_POS: i16 = 210;
pub const FUNC_FETCH_SAME: i16 = 211;
pub const FUNC_SHOW: i16 = 216;
pub const FUNC_DESCRIBE: i16 = 224;
pub const FUNC_FETCH_RELATIVE: i16 = 247;
pub const FUNC_SELECT_INTO: i16 = 244;
pub const FUNC_DBPROC_WITH_RESULT_SET_EXECUTE: i16 = 248;
pub const FUNC_MASS_OFFSET: i16 = 1000;

// Session info part: kernel version digits at this data offset
pub const SESSION_INFO_KERNEL_VERSION: usize = 2200;

// Application codes carried in byte 10 of a parse id
pub const APPL_CODE_OFFSET: usize = 10;
pub const APPL_CODE_COMMAND_EXECUTED: u8 = 1;
pub const MASS_COMMAND_APPL_CODES: [u8; 8] = [43, 44, 46, 70, 114, 115, 116, 117];

pub const PARSE_ID_SIZE: usize = 12;
pub const DROP_PARSE_ID_COMMAND: &str = "Drop Parseid";
pub const RESULT_COUNT_SIZE: usize = 6;
pub const RESULT_COUNT_DIGITS: usize = 10;

// Request sizing
pub const RESERVE_FOR_2ND_SEGMENT: usize = 8192;
pub const RESERVE_FOR_REPLY: usize = SEGMENT_HEADER_SIZE - PART_HEADER_SIZE + 200;
pub const DEFAULT_MAX_NUMBER_OF_SEGMENTS: usize = 6;

// Parameter info record (tsp1_param_info)
pub const PARAM_MODE_MANDATORY: u8 = 1;
pub const PARAM_MODE_OPTIONAL: u8 = 2;
pub const PARAM_MODE_DEFAULT: u8 = 4;
pub const PARAM_MODE_ESCAPE_CHAR: u8 = 8;
pub const PARAM_IO_INPUT: u8 = 0;
pub const PARAM_IO_OUTPUT: u8 = 1;
pub const PARAM_IO_INOUT: u8 = 2;
pub const PARAM_INFO_MODE: usize = 0;
pub const PARAM_INFO_IO_TYPE: usize = 1;
pub const PARAM_INFO_DATA_TYPE: usize = 2;
pub const PARAM_INFO_FRAC: usize = 3;
pub const PARAM_INFO_LENGTH: usize = 4;
pub const PARAM_INFO_IN_OUT_LEN: usize = 6;
pub const PARAM_INFO_BUF_POS: usize = 8;
pub const PARAM_INFO_PARAM_NO: usize = 8;
pub const PARAM_INFO_SIZE: usize = 12;

// Data type codes
pub const DT_FIXED: u8 = 0;
pub const DT_FLOAT: u8 = 1;
pub const DT_CHA: u8 = 2;
pub const DT_CHE: u8 = 3;
pub const DT_CHB: u8 = 4;
pub const DT_ROWID: u8 = 5;
pub const DT_STRA: u8 = 6;
pub const DT_STRE: u8 = 7;
pub const DT_STRB: u8 = 8;
pub const DT_STRDB: u8 = 9;
pub const DT_DATE: u8 = 10;
pub const DT_TIME: u8 = 11;
pub const DT_VFLOAT: u8 = 12;
pub const DT_TIMESTAMP: u8 = 13;
pub const DT_UNKNOWN: u8 = 14;
pub const DT_NUMBER: u8 = 15;
pub const DT_NONUMBER: u8 = 16;
pub const DT_DURATION: u8 = 17;
pub const DT_DBYTEEBCDIC: u8 = 18;
pub const DT_LONGA: u8 = 19;
pub const DT_LONGE: u8 = 20;
pub const DT_LONGB: u8 = 21;
pub const DT_LONGDB: u8 = 22;
pub const DT_BOOLEAN: u8 = 23;
pub const DT_UNICODE: u8 = 24;
pub const DT_SMALLINT: u8 = 29;
pub const DT_INTEGER: u8 = 30;
pub const DT_VARCHARA: u8 = 31;
pub const DT_VARCHARE: u8 = 32;
pub const DT_VARCHARB: u8 = 33;
pub const DT_STRUNI: u8 = 34;
pub const DT_LONGUNI: u8 = 35;
pub const DT_VARCHARUNI: u8 = 36;
pub const DT_UDT: u8 = 37;
pub const DT_ABAPTABHANDLE: u8 = 38;
pub const DT_DWYDE: u8 = 39;

// Define bytes in front of each field of a data record
pub const DEFINED_BINARY: u8 = 0;
pub const DEFINED_UNICODE: u8 = 1;
pub const DEFINED_ASCII: u8 = b' ';
pub const UNDEF_BYTE: u8 = 0xFF;
pub const SPECIAL_NULL_BYTE: u8 = 0xFE;

// Long descriptor (tsp00_LongDescBlock)
pub const LONG_DESC_DESCRIPTOR: usize = 0;
pub const LONG_DESC_TABID: usize = 8;
pub const LONG_DESC_MAX_LEN: usize = 16;
pub const LONG_DESC_INTERN_POS: usize = 20;
pub const LONG_DESC_INFOSET: usize = 24;
pub const LONG_DESC_STATE: usize = 25;
pub const LONG_DESC_VAL_MODE: usize = 27;
pub const LONG_DESC_VAL_IND: usize = 28;
pub const LONG_DESC_VAL_POS: usize = 32;
pub const LONG_DESC_VAL_LEN: usize = 36;
pub const LONG_DESC_SIZE: usize = 40;

pub const LONG_VALMODE_DATA_PART: u8 = 0;
pub const LONG_VALMODE_ALL_DATA: u8 = 1;
pub const LONG_VALMODE_LAST_DATA: u8 = 2;
pub const LONG_VALMODE_NO_DATA: u8 = 3;
pub const LONG_VALMODE_NO_MORE_DATA: u8 = 4;
pub const LONG_VALMODE_LAST_PUTVAL: u8 = 5;
pub const LONG_VALMODE_DATA_TRUNC: u8 = 6;
pub const LONG_VALMODE_CLOSE: u8 = 7;
pub const LONG_VALMODE_ERROR: u8 = 8;
pub const LONG_VALMODE_STARTPOS_INVALID: u8 = 9;

// Variable part length prefixes
pub const VARDATA_MAX_ONE_BYTE_LENGTH: usize = 245;
pub const VARDATA_IGNORED: u8 = 250;
pub const VARDATA_SPECIAL_NULL: u8 = 251;
pub const VARDATA_BLOB_DESCRIPTION: u8 = 252;
pub const VARDATA_DEFAULT_VALUE: u8 = 253;
pub const VARDATA_NULL_VALUE: u8 = 254;
pub const VARDATA_TWO_BYTE_LENGTH: u8 = 255;

// Authentication
pub const SCRAM_MD5_NAME: &str = "SCRAMMD5";
pub const MAX_PASSWORD_LEN_TAG: &str = "maxpasswordlen";
pub const CLIENT_CHALLENGE_SIZE: usize = 64;
pub const LEGACY_CHALLENGE_SIZE: usize = 40;
pub const LEGACY_SALT_SIZE: usize = 8;
pub const MANGLED_PASSWORD_SIZE: usize = 24;
pub const MANGLE_PASSWORD_CHARS: usize = 18;

// Ports
pub const DEFAULT_PORT: u16 = 7210;
pub const DEFAULT_SECURE_PORT: u16 = 7270;

// Defaults
pub const DEFAULT_CACHE_SIZE: usize = 1000;
pub const DEFAULT_MAX_POOL_SIZE: usize = 100;
