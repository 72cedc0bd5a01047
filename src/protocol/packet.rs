//! RTE packet framing and I/O.
//!
//! Every packet on the wire starts with a 24-byte RTE header carrying the
//! total length, the request class and the sender reference the server
//! assigned at connect time. RTE headers are always little-endian.

use crate::error::{Error, Result};
use crate::protocol::buffer::ByteBuffer;
use crate::protocol::connect::ConnectParams;
use crate::protocol::constants::*;
use crate::protocol::reply::ReplyPacket;
use crate::protocol::request::RequestPacket;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Largest packet accepted from the server.
pub const MAX_PACKET_SIZE: usize = 500 * 1024;

/// Byte stream a session runs over: plain TCP or TLS.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// The RTE header in front of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RteHeader {
    /// Total packet length including this header.
    pub act_send_len: i32,
    pub protocol_id: u8,
    pub mess_class: u8,
    pub flags: u8,
    pub residual_packets: u8,
    pub sender_ref: i32,
    pub receiver_ref: i32,
    pub return_code: i16,
    pub max_send_len: i32,
}

impl RteHeader {
    /// Header for a packet of `total_len` bytes (header included).
    pub fn new(mess_class: u8, sender_ref: i32, total_len: usize) -> Self {
        Self {
            act_send_len: total_len as i32,
            protocol_id: RTE_PROT_TCP,
            mess_class,
            flags: 0,
            residual_packets: 0,
            sender_ref,
            receiver_ref: 0,
            return_code: 0,
            max_send_len: total_len as i32,
        }
    }

    /// Write the header into the first 24 bytes of `out`.
    pub fn write_to(&self, out: &mut [u8]) -> Result<()> {
        let mut buf = ByteBuffer::new(out, true);
        buf.write_i32(RTE_ACT_SEND_LEN, self.act_send_len)?;
        buf.write_u8(RTE_PROTOCOL_ID, self.protocol_id)?;
        buf.write_u8(RTE_MESS_CLASS, self.mess_class)?;
        buf.write_u8(RTE_FLAGS, self.flags)?;
        buf.write_u8(RTE_RESIDUAL_PACKETS, self.residual_packets)?;
        buf.write_i32(RTE_SENDER_REF, self.sender_ref)?;
        buf.write_i32(RTE_RECEIVER_REF, self.receiver_ref)?;
        buf.write_i16(RTE_RETURN_CODE, self.return_code)?;
        buf.write_i16(RTE_FILLER, 0)?;
        buf.write_i32(RTE_MAX_SEND_LEN, self.max_send_len)
    }

    pub fn to_bytes(&self) -> Result<[u8; RTE_HEADER_SIZE]> {
        let mut out = [0u8; RTE_HEADER_SIZE];
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Decode a header from the first 24 bytes of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let buf = ByteBuffer::new(data, true);
        Ok(Self {
            act_send_len: buf.read_i32(RTE_ACT_SEND_LEN)?,
            protocol_id: buf.read_u8(RTE_PROTOCOL_ID)?,
            mess_class: buf.read_u8(RTE_MESS_CLASS)?,
            flags: buf.read_u8(RTE_FLAGS)?,
            residual_packets: buf.read_u8(RTE_RESIDUAL_PACKETS)?,
            sender_ref: buf.read_i32(RTE_SENDER_REF)?,
            receiver_ref: buf.read_i32(RTE_RECEIVER_REF)?,
            return_code: buf.read_i16(RTE_RETURN_CODE)?,
            max_send_len: buf.read_i32(RTE_MAX_SEND_LEN)?,
        })
    }
}

/// A raw packet: RTE header plus everything behind it.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: RteHeader,
    /// Bytes after the RTE header.
    pub payload: Bytes,
}

/// Packet reader/writer over a session's byte stream.
pub struct PacketStream {
    stream: Box<dyn AsyncStream>,
    sender_ref: i32,
    max_data_len: usize,
    min_reply_size: usize,
    scram_allowed: bool,
}

impl std::fmt::Debug for PacketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("sender_ref", &self.sender_ref)
            .field("max_data_len", &self.max_data_len)
            .field("scram_allowed", &self.scram_allowed)
            .finish()
    }
}

impl PacketStream {
    /// Wrap a stream that has not been through the connect handshake yet.
    pub fn new(stream: Box<dyn AsyncStream>) -> Self {
        Self {
            stream,
            sender_ref: 0,
            max_data_len: INFO_MAX_SEGMENT_SIZE as usize,
            min_reply_size: 0,
            scram_allowed: false,
        }
    }

    /// Record what the user connect reply negotiated.
    pub fn set_session(
        &mut self,
        sender_ref: i32,
        max_data_len: usize,
        min_reply_size: usize,
        scram_allowed: bool,
    ) {
        self.sender_ref = sender_ref;
        self.max_data_len = max_data_len;
        self.min_reply_size = min_reply_size;
        self.scram_allowed = scram_allowed;
    }

    pub fn sender_ref(&self) -> i32 {
        self.sender_ref
    }

    pub fn set_sender_ref(&mut self, sender_ref: i32) {
        self.sender_ref = sender_ref;
    }

    /// Whether the server offered SCRAMMD5.
    pub fn scram_allowed(&self) -> bool {
        self.scram_allowed
    }

    /// Largest command the server accepts, without the RTE header.
    pub fn max_cmd_size(&self) -> usize {
        self.max_data_len.saturating_sub(self.min_reply_size)
    }

    /// Size of a request buffer, RTE header included.
    pub fn request_capacity(&self) -> usize {
        RTE_HEADER_SIZE + self.max_cmd_size()
    }

    /// Send raw bytes, RTE header included.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        trace!(len = data.len(), "sending packet");
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one whole packet.
    pub async fn read_packet(&mut self) -> Result<Packet> {
        let mut raw_header = [0u8; RTE_HEADER_SIZE];
        self.read_exact(&mut raw_header).await?;
        let header = RteHeader::parse(&raw_header)?;

        let total = header.act_send_len;
        if total < RTE_HEADER_SIZE as i32 || total as usize > MAX_PACKET_SIZE {
            return Err(Error::framing(
                format!("implausible packet length {}", total),
                &raw_header,
            ));
        }
        let mut payload = BytesMut::zeroed(total as usize - RTE_HEADER_SIZE);
        self.read_exact(&mut payload).await?;
        trace!(len = total, class = header.mess_class, "received packet");
        Ok(Packet {
            header,
            payload: payload.freeze(),
        })
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Send a request and wait for its reply.
    pub async fn execute(&mut self, request: &mut RequestPacket) -> Result<ReplyPacket> {
        let len = request.close()?;
        let total = len + RTE_HEADER_SIZE;
        RteHeader::new(RSQL_USER_DATA_REQUEST, self.sender_ref, total)
            .write_to(&mut request.raw_mut()[..RTE_HEADER_SIZE])?;
        self.write_raw(&request.raw()[..total]).await?;

        let packet = self.read_packet().await?;
        if packet.header.return_code != SQLOK {
            return Err(Error::Communication {
                code: packet.header.return_code as i32,
            });
        }
        ReplyPacket::new(packet.payload, request.is_unicode())
    }

    /// Tell the server the session ends and shut the stream down.
    pub async fn release(&mut self) -> Result<()> {
        let header = RteHeader::new(RSQL_USER_RELEASE_REQUEST, self.sender_ref, RTE_HEADER_SIZE);
        self.write_raw(&header.to_bytes()?).await?;
        self.stream.shutdown().await?;
        debug!(sender_ref = self.sender_ref, "session released");
        Ok(())
    }
}

/// Open the byte stream to the server: DNS, TCP connect and optional TLS.
pub async fn open_transport(params: &ConnectParams) -> Result<Box<dyn AsyncStream>> {
    use tokio::net::lookup_host;
    use tokio::time::timeout;

    let addr_str = format!("{}:{}", params.host, params.port);
    let addrs = timeout(params.connect_timeout, lookup_host(&addr_str))
        .await
        .map_err(|_| Error::ConnectionTimeout {
            host: params.host.clone(),
            port: params.port,
            timeout: params.connect_timeout,
        })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound
                || e.to_string().contains("could not resolve")
                || e.to_string().contains("Name or service not known")
                || e.to_string().contains("nodename nor servname provided")
                || e.to_string().contains("failed to lookup address")
            {
                Error::DnsResolutionFailed {
                    hostname: params.host.clone(),
                    message: e.to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

    let mut last_error = None;
    for addr in addrs {
        match timeout(params.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(tcp_stream)) => {
                tcp_stream.set_nodelay(true)?;
                debug!(%addr, tls = params.tls, "tcp connection established");
                if params.tls {
                    let tls_stream = tls_handshake(tcp_stream, &params.host).await?;
                    return Ok(Box::new(tls_stream));
                }
                return Ok(Box::new(tcp_stream));
            }
            Ok(Err(e)) => {
                last_error = Some(Error::Io(e));
                continue;
            }
            Err(_) => {
                return Err(Error::ConnectionTimeout {
                    host: params.host.clone(),
                    port: params.port,
                    timeout: params.connect_timeout,
                });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::DnsResolutionFailed {
        hostname: params.host.clone(),
        message: "no addresses resolved".to_string(),
    }))
}

fn tls_config() -> Result<rustls::ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls {
            message: e.to_string(),
        })?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(config)
}

async fn tls_handshake(
    stream: TcpStream,
    host: &str,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string()).map_err(|_| {
        Error::Tls {
            message: format!("invalid server name '{}'", host),
        }
    })?;
    let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_config()?));
    debug!(server_name = %host, "performing TLS handshake");
    let tls_stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|e| Error::Tls {
            message: e.to_string(),
        })?;
    debug!("TLS handshake completed");
    Ok(tls_stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_rte_header_layout() {
        let header = RteHeader::new(RSQL_USER_DATA_REQUEST, 0x01020304, 120);
        let raw = header.to_bytes().unwrap();
        assert_eq!(&raw[0..4], &[120, 0, 0, 0]);
        assert_eq!(raw[RTE_PROTOCOL_ID], RTE_PROT_TCP);
        assert_eq!(raw[RTE_MESS_CLASS], RSQL_USER_DATA_REQUEST);
        assert_eq!(&raw[RTE_SENDER_REF..RTE_SENDER_REF + 4], &[4, 3, 2, 1]);
        assert_eq!(&raw[RTE_MAX_SEND_LEN..], &[120, 0, 0, 0]);
        assert_eq!(RteHeader::parse(&raw).unwrap(), header);
    }

    #[tokio::test]
    async fn test_read_packet_and_closed_stream() {
        let (client, mut server) = duplex(1024);
        let mut stream = PacketStream::new(Box::new(client));

        let mut raw = RteHeader::new(RSQL_USER_DATA_REPLY, 7, RTE_HEADER_SIZE + 3)
            .to_bytes()
            .unwrap()
            .to_vec();
        raw.extend_from_slice(&[1, 2, 3]);
        server.write_all(&raw).await.unwrap();

        let packet = stream.read_packet().await.unwrap();
        assert_eq!(packet.header.sender_ref, 7);
        assert_eq!(packet.payload, vec![1, 2, 3]);

        server.write_all(&raw[..10]).await.unwrap();
        drop(server);
        assert!(matches!(
            stream.read_packet().await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_implausible_length() {
        let (client, mut server) = duplex(1024);
        let mut stream = PacketStream::new(Box::new(client));
        let raw = RteHeader::new(RSQL_USER_DATA_REPLY, 0, 4).to_bytes().unwrap();
        server.write_all(&raw).await.unwrap();
        assert!(matches!(
            stream.read_packet().await,
            Err(Error::ProtocolFraming { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_rte_error() {
        let (client, mut server) = duplex(8192);
        let mut stream = PacketStream::new(Box::new(client));
        stream.set_session(99, 4096, 0, true);
        assert_eq!(stream.request_capacity(), RTE_HEADER_SIZE + 4096);

        let server_task = tokio::spawn(async move {
            let mut header = [0u8; RTE_HEADER_SIZE];
            server.read_exact(&mut header).await.unwrap();
            let header = RteHeader::parse(&header).unwrap();
            let mut body = vec![0u8; header.act_send_len as usize - RTE_HEADER_SIZE];
            server.read_exact(&mut body).await.unwrap();

            let mut reply = RteHeader::new(RSQL_USER_DATA_REPLY, 99, RTE_HEADER_SIZE);
            reply.return_code = SQLTIMEOUT;
            server.write_all(&reply.to_bytes().unwrap()).await.unwrap();
            header
        });

        let mut request = RequestPacket::new(stream.request_capacity(), false).unwrap();
        request.init_dbs_command("PING", true, false).unwrap();
        let err = stream.execute(&mut request).await.unwrap_err();
        assert!(matches!(err, Error::Communication { code: 3 }));

        let sent = server_task.await.unwrap();
        assert_eq!(sent.mess_class, RSQL_USER_DATA_REQUEST);
        assert_eq!(sent.sender_ref, 99);
    }
}
