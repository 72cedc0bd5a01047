//! Connection parameters and the RTE connect handshake.

use crate::error::{Error, Result};
use crate::pool::PoolConfig;
use crate::protocol::buffer::ByteBuffer;
use crate::protocol::constants::*;
use crate::protocol::packet::{open_transport, Packet, PacketStream, RteHeader};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Host address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Database name.
    pub database: String,
    pub username: String,
    pub password: String,
    /// Run the session over TLS.
    pub tls: bool,
    /// TCP connection timeout (default: 20 seconds).
    pub connect_timeout: Duration,
    pub pool: PoolConfig,
    /// Statement kinds kept in the parse info cache (`"all"` or letters of
    /// `iuds`, optionally with `?` for statistics). `None` disables it.
    pub cache: Option<String>,
    /// Parse info cache capacity; 0 selects the default.
    pub cache_size: usize,
    /// Whether trailing blanks of character values are significant.
    pub space_option: bool,
    pub autocommit: bool,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("tls", &self.tls)
            .field("connect_timeout", &self.connect_timeout)
            .field("pool", &self.pool)
            .field("cache", &self.cache)
            .field("cache_size", &self.cache_size)
            .field("space_option", &self.space_option)
            .field("autocommit", &self.autocommit)
            .finish()
    }
}

impl ConnectParams {
    /// Create new connection parameters.
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: String::new(),
            password: String::new(),
            tls: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool: PoolConfig::default(),
            cache: None,
            cache_size: 0,
            space_option: false,
            autocommit: true,
        }
    }

    /// Set the connection timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use maxdb_thin_rs::ConnectParams;
    /// use std::time::Duration;
    ///
    /// let params = ConnectParams::new("localhost", 7210, "MAXDB")
    ///     .with_connect_timeout(Duration::from_secs(5));
    /// ```
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Enable or disable TLS. A port left at the plain default moves to the
    /// TLS default and back.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        if tls && self.port == DEFAULT_PORT {
            self.port = DEFAULT_SECURE_PORT;
        } else if !tls && self.port == DEFAULT_SECURE_PORT {
            self.port = DEFAULT_PORT;
        }
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Enable the parse info cache for the given statement kinds.
    pub fn with_cache(mut self, kinds: impl Into<String>, size: usize) -> Self {
        self.cache = Some(kinds.into());
        self.cache_size = size;
        self
    }

    pub fn with_space_option(mut self, space_option: bool) -> Self {
        self.space_option = space_option;
        self
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Parse a connection string.
    ///
    /// Two forms are accepted: `host[:port]/database`, and `key=value;`
    /// pairs with case-insensitive keys such as
    /// `Server=db1;Database=MAXDB;User Id=DBA;Password=secret;Encrypt=true`.
    pub fn parse(conn_str: &str) -> Result<Self> {
        if conn_str.contains('=') {
            Self::parse_pairs(conn_str)
        } else {
            Self::parse_shorthand(conn_str)
        }
    }

    fn parse_shorthand(conn_str: &str) -> Result<Self> {
        let (addr_part, database) = conn_str
            .split_once('/')
            .ok_or_else(|| Error::connect_string("Expected format: host:port/database"))?;
        let (host, port) = split_host_port(addr_part)?;
        if host.is_empty() || database.is_empty() {
            return Err(Error::connect_string(
                "Expected format: host:port/database",
            ));
        }
        Ok(Self::new(host, port.unwrap_or(DEFAULT_PORT), database))
    }

    fn parse_pairs(conn_str: &str) -> Result<Self> {
        let mut params = Self::new("", DEFAULT_PORT, "");
        let mut port = None;

        for pair in conn_str.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::connect_string(format!("missing '=' in '{}'", pair)))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "server" | "data source" | "address" | "addr" | "network address" => {
                    let (host, host_port) = split_host_port(value)?;
                    params.host = host.to_string();
                    if host_port.is_some() {
                        port = host_port;
                    }
                }
                "port" => port = Some(parse_number(&key, value)?),
                "database" | "initial catalog" => params.database = value.to_string(),
                "user id" | "user" | "uid" | "login" => params.username = value.to_string(),
                "password" | "pwd" => params.password = value.to_string(),
                "encrypt" | "ssl" => params.tls = parse_bool(&key, value)?,
                "timeout" | "connect timeout" | "connection timeout" => {
                    params.connect_timeout = Duration::from_secs(parse_number(&key, value)?);
                }
                "min pool size" => params.pool.min_pool_size = parse_number(&key, value)?,
                "max pool size" => params.pool.max_pool_size = parse_number(&key, value)?,
                "connection lifetime" => {
                    params.pool.connection_lifetime = Duration::from_secs(parse_number(&key, value)?);
                }
                "pool timeout" => {
                    let secs: u64 = parse_number(&key, value)?;
                    params.pool.acquire_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "cache" => params.cache = (!value.is_empty()).then(|| value.to_string()),
                "cache size" => params.cache_size = parse_number(&key, value)?,
                "space option" => params.space_option = parse_bool(&key, value)?,
                "autocommit" => params.autocommit = parse_bool(&key, value)?,
                _ => {
                    return Err(Error::connect_string(format!("unknown key '{}'", key)));
                }
            }
        }

        if params.host.is_empty() {
            return Err(Error::connect_string("missing server"));
        }
        if params.database.is_empty() {
            return Err(Error::connect_string("missing database"));
        }
        params.port = port.unwrap_or(if params.tls {
            DEFAULT_SECURE_PORT
        } else {
            DEFAULT_PORT
        });
        if params.pool.max_pool_size == 0 || params.pool.min_pool_size > params.pool.max_pool_size {
            return Err(Error::connect_string(format!(
                "invalid pool sizes: min {} max {}",
                params.pool.min_pool_size, params.pool.max_pool_size
            )));
        }
        Ok(params)
    }

    /// Canonical form used as the pool key.
    ///
    /// Keys are lower-cased and sorted. The password is part of the key, so
    /// sessions are never shared between different credentials.
    pub fn normalized(&self) -> String {
        let mut pairs = BTreeMap::new();
        pairs.insert("server", self.host.clone());
        pairs.insert("port", self.port.to_string());
        pairs.insert("database", self.database.clone());
        pairs.insert("user id", self.username.clone());
        pairs.insert("password", self.password.clone());
        pairs.insert("encrypt", self.tls.to_string());
        pairs.insert("timeout", self.connect_timeout.as_secs().to_string());
        pairs.insert("min pool size", self.pool.min_pool_size.to_string());
        pairs.insert("max pool size", self.pool.max_pool_size.to_string());
        pairs.insert(
            "connection lifetime",
            self.pool.connection_lifetime.as_secs().to_string(),
        );
        pairs.insert(
            "pool timeout",
            self.pool
                .acquire_timeout
                .map_or(0, |t| t.as_secs())
                .to_string(),
        );
        pairs.insert("cache", self.cache.clone().unwrap_or_default());
        pairs.insert("cache size", self.cache_size.to_string());
        pairs.insert("space option", self.space_option.to_string());
        pairs.insert("autocommit", self.autocommit.to_string());

        pairs
            .iter()
            .map(|(key, value)| format!("{}={};", key, value))
            .collect()
    }
}

fn split_host_port(addr: &str) -> Result<(&str, Option<u16>)> {
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::connect_string(format!("Invalid port: {}", port)))?;
            Ok((host, Some(port)))
        }
        None => Ok((addr, None)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::connect_string(format!("invalid number for '{}': {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(Error::connect_string(format!(
            "invalid boolean for '{}': {}",
            key, value
        ))),
    }
}

/// Values carried by a connect packet.
#[derive(Debug, Clone, Default)]
pub struct ConnectPacketData {
    pub database: String,
    pub port: u16,
    pub max_segment_size: i32,
    pub max_data_len: i32,
    pub packet_size: i32,
    pub min_reply_size: i32,
}

/// Build a connect-style packet (info, user connect or cancel request),
/// RTE header included.
pub fn build_connect_packet(
    mess_class: u8,
    sender_ref: i32,
    data: &ConnectPacketData,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; RTE_HEADER_SIZE + CONNECT_END];
    let mut pos = CONNECT_VAR_PART;
    {
        let mut body = ByteBuffer::with_offset(&mut out[..], RTE_HEADER_SIZE, true);
        body.write_u8(CONNECT_MESS_CODE, MESS_CODE_ASCII)?;
        body.write_u8(CONNECT_MESS_CODE + 1, SWAP_SWAPPED)?;
        body.write_u8(CONNECT_SERVICE_TYPE, SERVICE_TYPE_USER)?;
        body.write_u8(CONNECT_OS_TYPE, OS_TYPE_RSQL_DOTNET)?;
        body.write_i32(CONNECT_MAX_SEGMENT_SIZE, data.max_segment_size)?;
        body.write_i32(CONNECT_MAX_DATA_LEN, data.max_data_len)?;
        body.write_i32(CONNECT_PACKET_SIZE, data.packet_size)?;
        body.write_i32(CONNECT_MIN_REPLY_SIZE, data.min_reply_size)?;
        let database: String = data.database.chars().take(CONNECT_DB_NAME_SIZE).collect();
        body.write_ascii_padded(CONNECT_SERVER_DB, &database, CONNECT_DB_NAME_SIZE)?;
        body.write_ascii_padded(CONNECT_CLIENT_DB, "", CONNECT_DB_NAME_SIZE)?;

        // Arguments: length byte (including itself), tag, value.
        body.write_bytes(pos, &[4, ARG_REM_PID, b'0', 0])?;
        pos += 4;
        body.write_bytes(pos, &[4, ARG_PORT_NO])?;
        body.write_u16(pos + 2, data.port)?;
        pos += 4;
        body.write_bytes(pos, &[3, ARG_ACKNOWLEDGE, 0])?;
        pos += 3;
        body.write_bytes(pos, &[3, ARG_OMIT_REPLY_PART, 1])?;
        pos += 3;

        let connect_len = pos.max(CONNECT_MIN_SIZE - RTE_HEADER_SIZE);
        pos = connect_len;
        body.write_u16(CONNECT_LENGTH, connect_len as u16)?;
    }
    out.truncate(RTE_HEADER_SIZE + pos);
    let total = out.len();
    RteHeader::new(mess_class, sender_ref, total).write_to(&mut out[..RTE_HEADER_SIZE])?;
    Ok(out)
}

/// Decoded reply to an info or user connect request.
#[derive(Debug, Clone)]
pub struct ConnectReply {
    pub return_code: i16,
    pub sender_ref: i32,
    pub swapped: bool,
    pub max_data_len: i32,
    pub min_reply_size: i32,
    pub packet_size: i32,
    /// Database name echoed by the server.
    pub client_db: String,
    /// Authentication methods from the `AUTH_ALLOW` argument.
    pub auth_allowed: Vec<String>,
}

impl ConnectReply {
    /// Decode a connect reply packet.
    pub fn parse(packet: &Packet) -> Result<Self> {
        let payload = &packet.payload[..];
        let return_code = packet.header.return_code;
        if payload.len() < CONNECT_VAR_PART {
            if return_code != SQLOK {
                return Ok(Self {
                    return_code,
                    sender_ref: packet.header.sender_ref,
                    swapped: true,
                    max_data_len: 0,
                    min_reply_size: 0,
                    packet_size: 0,
                    client_db: String::new(),
                    auth_allowed: Vec::new(),
                });
            }
            return Err(Error::framing("truncated connect reply", payload));
        }
        let swapped = payload[CONNECT_MESS_CODE + 1] == SWAP_SWAPPED;
        let body = ByteBuffer::new(payload, swapped);

        let raw_db = body.slice(CONNECT_CLIENT_DB, CONNECT_DB_NAME_SIZE)?;
        let end = raw_db.iter().position(|&b| b == 0).unwrap_or(raw_db.len());
        let client_db = raw_db[..end].iter().map(|&b| b as char).collect::<String>();

        let mut auth_allowed = Vec::new();
        let mut pos = CONNECT_VAR_PART;
        while pos < payload.len() {
            let len = payload[pos] as usize;
            if len == 0 {
                break;
            }
            if len < 2 || pos + len > payload.len() {
                return Err(Error::framing("connect argument runs past the packet", payload));
            }
            if payload[pos + 1] == ARG_AUTH_ALLOW && len > 3 {
                let text: String = payload[pos + 2..pos + len - 1]
                    .iter()
                    .map(|&b| b as char)
                    .collect();
                auth_allowed.extend(text.split(',').map(|s| s.trim().to_string()));
            }
            pos += len;
        }

        Ok(Self {
            return_code,
            sender_ref: packet.header.sender_ref,
            swapped,
            max_data_len: body.read_i32(CONNECT_MAX_DATA_LEN)?,
            min_reply_size: body.read_i32(CONNECT_MIN_REPLY_SIZE)?,
            packet_size: body.read_i32(CONNECT_PACKET_SIZE)?,
            client_db: client_db.trim().to_string(),
            auth_allowed,
        })
    }

    /// Whether the server offers SCRAMMD5.
    pub fn is_scram_allowed(&self) -> bool {
        self.auth_allowed
            .iter()
            .any(|method| method.eq_ignore_ascii_case(SCRAM_MD5_NAME))
    }
}

/// Run the connect handshake and return a stream ready for login.
///
/// An info request first checks that the database exists and learns the
/// packet limits. The socket is then reopened and a user connect request
/// with those limits establishes the session.
pub async fn connect(params: &ConnectParams) -> Result<PacketStream> {
    let mut data = ConnectPacketData {
        database: params.database.clone(),
        port: params.port,
        max_segment_size: INFO_MAX_SEGMENT_SIZE,
        ..Default::default()
    };

    let mut stream = PacketStream::new(open_transport(params).await?);
    let info = build_connect_packet(RSQL_INFO_REQUEST, 0, &data)?;
    stream.write_raw(&info).await?;
    let reply = ConnectReply::parse(&stream.read_packet().await?)?;
    check_connect_reply(&reply, params)?;
    debug!(
        database = %params.database,
        packet_size = reply.packet_size,
        max_data_len = reply.max_data_len,
        "info request accepted"
    );
    stream.release().await.ok();

    data.max_segment_size = reply.packet_size;
    data.max_data_len = reply.max_data_len;
    data.packet_size = reply.packet_size;
    data.min_reply_size = reply.min_reply_size;

    let mut stream = PacketStream::new(open_transport(params).await?);
    let request = build_connect_packet(RSQL_USER_CONN_REQUEST, reply.sender_ref, &data)?;
    stream.write_raw(&request).await?;
    let reply = ConnectReply::parse(&stream.read_packet().await?)?;
    if reply.return_code != SQLOK {
        return Err(Error::Communication {
            code: reply.return_code as i32,
        });
    }
    stream.set_session(
        reply.sender_ref,
        reply.max_data_len.max(0) as usize,
        reply.min_reply_size.max(0) as usize,
        reply.is_scram_allowed(),
    );
    debug!(
        sender_ref = reply.sender_ref,
        scram = reply.is_scram_allowed(),
        "user connect accepted"
    );
    Ok(stream)
}

fn check_connect_reply(reply: &ConnectReply, params: &ConnectParams) -> Result<()> {
    if reply.return_code == SQLSERVER_DB_UNKNOWN {
        return Err(Error::UnknownDatabase {
            name: params.database.clone(),
        });
    }
    if reply.return_code != SQLOK {
        return Err(Error::Communication {
            code: reply.return_code as i32,
        });
    }
    let expected: String = params.database.chars().take(CONNECT_DB_NAME_SIZE).collect();
    if !expected.trim().eq_ignore_ascii_case(reply.client_db.trim()) {
        return Err(Error::UnknownDatabase {
            name: params.database.clone(),
        });
    }
    Ok(())
}

/// Ask the server to cancel the running request of session `sender_ref`.
///
/// The cancel request travels on a fresh socket.
pub async fn cancel(params: &ConnectParams, sender_ref: i32) -> Result<()> {
    let data = ConnectPacketData {
        database: params.database.clone(),
        port: params.port,
        max_segment_size: INFO_MAX_SEGMENT_SIZE,
        ..Default::default()
    };
    let mut packet = build_connect_packet(RSQL_USER_CANCEL_REQUEST, sender_ref, &data)?;
    ByteBuffer::new(&mut packet[..], true).write_i32(RTE_RECEIVER_REF, sender_ref)?;

    let mut stream = PacketStream::new(open_transport(params).await?);
    stream.write_raw(&packet).await?;
    debug!(sender_ref, "cancel request sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let params = ConnectParams::parse("dbhost:7299/MAXDB").unwrap();
        assert_eq!(params.host, "dbhost");
        assert_eq!(params.port, 7299);
        assert_eq!(params.database, "MAXDB");
        assert_eq!(params.connect_timeout, DEFAULT_CONNECT_TIMEOUT);

        let params = ConnectParams::parse("dbhost/MAXDB").unwrap();
        assert_eq!(params.port, DEFAULT_PORT);

        assert!(ConnectParams::parse("dbhost:port/MAXDB").is_err());
        assert!(ConnectParams::parse("dbhost").is_err());
    }

    #[test]
    fn test_parse_pairs() {
        let params = ConnectParams::parse(
            "Data Source=db1;Initial Catalog=TST;User Id=DBA;Password=secret;\
             Timeout=5;Max Pool Size=4;Min Pool Size=1;Pool Timeout=0;\
             Cache=iu?;Cache Size=50;Space Option=true;Autocommit=false",
        )
        .unwrap();
        assert_eq!(params.host, "db1");
        assert_eq!(params.port, DEFAULT_PORT);
        assert_eq!(params.database, "TST");
        assert_eq!(params.username, "DBA");
        assert_eq!(params.password, "secret");
        assert_eq!(params.connect_timeout, Duration::from_secs(5));
        assert_eq!(params.pool.max_pool_size, 4);
        assert_eq!(params.pool.min_pool_size, 1);
        assert_eq!(params.pool.acquire_timeout, None);
        assert_eq!(params.cache.as_deref(), Some("iu?"));
        assert_eq!(params.cache_size, 50);
        assert!(params.space_option);
        assert!(!params.autocommit);
    }

    #[test]
    fn test_parse_pairs_tls_port() {
        let params = ConnectParams::parse("SERVER=db1;DATABASE=TST;ENCRYPT=yes").unwrap();
        assert!(params.tls);
        assert_eq!(params.port, DEFAULT_SECURE_PORT);

        let params = ConnectParams::parse("Server=db1:7300;Database=TST;SSL=true").unwrap();
        assert_eq!(params.port, 7300);

        let params = ConnectParams::new("db1", DEFAULT_PORT, "TST").with_tls(true);
        assert_eq!(params.port, DEFAULT_SECURE_PORT);
    }

    #[test]
    fn test_parse_pairs_errors() {
        assert!(ConnectParams::parse("Server=db1").is_err());
        assert!(ConnectParams::parse("Database=TST;Server=").is_err());
        assert!(ConnectParams::parse("Server=db1;Database=TST;Bogus=1").is_err());
        assert!(ConnectParams::parse("Server=db1;Database=TST;Encrypt=maybe").is_err());
        assert!(ConnectParams::parse("Server=db1;Database=TST;Min Pool Size=5;Max Pool Size=2").is_err());
    }

    #[test]
    fn test_normalized_key() {
        let a = ConnectParams::parse("server=db1;database=TST;user id=DBA;password=x").unwrap();
        let b = ConnectParams::parse("Password=x;USER ID=DBA;Database=TST;Server=db1").unwrap();
        assert_eq!(a.normalized(), b.normalized());
        assert!(a.normalized().starts_with("autocommit=true;"));

        let c = a.clone().with_credentials("DBA", "y");
        assert_ne!(a.normalized(), c.normalized());
    }

    #[test]
    fn test_debug_hides_password() {
        let params = ConnectParams::new("h", 1, "d").with_credentials("u", "hunter2");
        assert!(!format!("{:?}", params).contains("hunter2"));
    }

    #[test]
    fn test_connect_packet_layout() {
        let data = ConnectPacketData {
            database: "MAXDB".to_string(),
            port: 7210,
            max_segment_size: INFO_MAX_SEGMENT_SIZE,
            ..Default::default()
        };
        let raw = build_connect_packet(RSQL_INFO_REQUEST, 0, &data).unwrap();
        assert_eq!(raw.len(), 78);

        let header = RteHeader::parse(&raw).unwrap();
        assert_eq!(header.act_send_len, 78);
        assert_eq!(header.mess_class, RSQL_INFO_REQUEST);

        let body = ByteBuffer::with_offset(&raw[..], RTE_HEADER_SIZE, true);
        assert_eq!(body.read_u8(CONNECT_MESS_CODE + 1).unwrap(), SWAP_SWAPPED);
        assert_eq!(body.read_u16(CONNECT_LENGTH).unwrap(), 54);
        assert_eq!(body.read_i32(CONNECT_MAX_SEGMENT_SIZE).unwrap(), 32768);
        assert_eq!(body.read_ascii(CONNECT_SERVER_DB, 8).unwrap(), "MAXDB   ");
        assert_eq!(body.read_ascii(CONNECT_CLIENT_DB, 8).unwrap(), "        ");
        assert_eq!(
            body.slice(CONNECT_VAR_PART, 14).unwrap(),
            &[4, b'I', b'0', 0, 4, b'P', 0x2A, 0x1C, 3, b'R', 0, 3, b'r', 1]
        );
    }

    #[test]
    fn test_connect_reply_parse() {
        let data = ConnectPacketData {
            database: "MAXDB".to_string(),
            port: 7210,
            max_data_len: 131072,
            packet_size: 131072,
            min_reply_size: 4096,
            ..Default::default()
        };
        let mut raw = build_connect_packet(RSQL_USER_CONN_REPLY, 0, &data).unwrap();
        let body = RTE_HEADER_SIZE;
        raw[body + CONNECT_CLIENT_DB..body + CONNECT_CLIENT_DB + 8].copy_from_slice(b"maxdb\0\0\0");
        // Replace the terminator area with an AUTH_ALLOW argument.
        let auth = b"BASIC,SCRAMMD5\0";
        raw.push((auth.len() + 2) as u8);
        raw.push(ARG_AUTH_ALLOW);
        raw.extend_from_slice(auth);
        raw.push(0);

        let mut header = RteHeader::parse(&raw).unwrap();
        header.sender_ref = 4711;
        let packet = Packet {
            header,
            payload: bytes::Bytes::copy_from_slice(&raw[RTE_HEADER_SIZE..]),
        };
        let reply = ConnectReply::parse(&packet).unwrap();
        assert_eq!(reply.sender_ref, 4711);
        assert_eq!(reply.client_db, "maxdb");
        assert_eq!(reply.max_data_len, 131072);
        assert_eq!(reply.min_reply_size, 4096);
        assert_eq!(reply.auth_allowed, vec!["BASIC", "SCRAMMD5"]);
        assert!(reply.is_scram_allowed());

        let params = ConnectParams::new("h", 7210, "MAXDB");
        assert!(check_connect_reply(&reply, &params).is_ok());
        let other = ConnectParams::new("h", 7210, "OTHER");
        assert!(matches!(
            check_connect_reply(&reply, &other),
            Err(Error::UnknownDatabase { .. })
        ));
    }
}
