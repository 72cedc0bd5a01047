//! Wire-level tests against a scripted in-process server.
//!
//! The server answers the connect handshake, then replies to each data
//! request with the next canned reply and records what it was sent.

use maxdb_thin_rs::protocol::buffer::ByteBuffer;
use maxdb_thin_rs::protocol::connect::{build_connect_packet, ConnectPacketData};
use maxdb_thin_rs::protocol::constants::*;
use maxdb_thin_rs::protocol::part::align;
use maxdb_thin_rs::protocol::RteHeader;
use maxdb_thin_rs::{ConnectParams, Connection, Error, MaxDbValue};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const DATABASE: &str = "MAXDB";
const SENDER_REF: i32 = 4711;
const SESSION_ID: i32 = 0x0102_0304;

struct Part {
    kind: u8,
    attributes: u8,
    args: i16,
    data: Vec<u8>,
}

fn part(kind: u8, args: i16, data: &[u8]) -> Part {
    Part {
        kind,
        attributes: 0,
        args,
        data: data.to_vec(),
    }
}

/// Little-endian data reply with a single segment.
fn reply(rc: i16, function_code: i16, parts: &[Part]) -> Vec<u8> {
    let mut body = vec![0u8; PACKET_HEADER_SIZE];
    body[PACKET_MESS_SWAP] = SWAP_SWAPPED;
    body[PACKET_NO_OF_SEGM..PACKET_NO_OF_SEGM + 2].copy_from_slice(&1i16.to_le_bytes());

    let mut seg = vec![0u8; SEGMENT_HEADER_SIZE];
    seg[SEGMENT_NO_OF_PARTS..SEGMENT_NO_OF_PARTS + 2]
        .copy_from_slice(&(parts.len() as i16).to_le_bytes());
    seg[SEGMENT_KIND] = SEGMKIND_RETURN;
    let state: &[u8; 5] = if rc == 0 { b"00000" } else { b"42000" };
    seg[SEGMENT_SQL_STATE..SEGMENT_SQL_STATE + 5].copy_from_slice(state);
    seg[SEGMENT_RETURN_CODE..SEGMENT_RETURN_CODE + 2].copy_from_slice(&rc.to_le_bytes());
    seg[SEGMENT_FUNCTION_CODE..SEGMENT_FUNCTION_CODE + 2].copy_from_slice(&function_code.to_le_bytes());
    for p in parts {
        let mut header = vec![0u8; PART_HEADER_SIZE];
        header[PART_KIND] = p.kind;
        header[PART_ATTRIBUTES] = p.attributes;
        header[PART_ARG_COUNT..PART_ARG_COUNT + 2].copy_from_slice(&p.args.to_le_bytes());
        header[PART_BUF_LEN..PART_BUF_LEN + 4].copy_from_slice(&(p.data.len() as i32).to_le_bytes());
        seg.extend_from_slice(&header);
        seg.extend_from_slice(&p.data);
        seg.resize(align(seg.len()), 0);
    }
    let seg_len = seg.len() as i32;
    seg[SEGMENT_LEN..SEGMENT_LEN + 4].copy_from_slice(&seg_len.to_le_bytes());
    body.extend_from_slice(&seg);

    let total = RTE_HEADER_SIZE + body.len();
    let mut out = RteHeader::new(RSQL_USER_DATA_REPLY, SENDER_REF, total)
        .to_bytes()
        .unwrap()
        .to_vec();
    out.extend_from_slice(&body);
    out
}

fn ok_reply() -> Vec<u8> {
    reply(0, FUNC_NIL, &[])
}

/// Login reply: ascii session, kernel 7.9.10, multiple drop granted.
fn login_reply() -> Vec<u8> {
    let mut info = vec![0u8; SESSION_INFO_KERNEL_VERSION + 8];
    info[0] = 0;
    info[1..5].copy_from_slice(&SESSION_ID.to_be_bytes());
    info[SESSION_INFO_KERNEL_VERSION..SESSION_INFO_KERNEL_VERSION + 5].copy_from_slice(b"70910");
    reply(
        0,
        FUNC_NIL,
        &[
            part(PARTKIND_SESSION_INFO_RETURNED, 1, &info),
            part(PARTKIND_FEATURE, 1, &[FEATURE_MULTIPLE_DROP_PARSEID, 1]),
        ],
    )
}

fn connect_reply(mess_class: u8, return_code: i16) -> Vec<u8> {
    let data = ConnectPacketData {
        database: DATABASE.to_string(),
        port: DEFAULT_PORT,
        max_segment_size: 32768,
        max_data_len: 32768,
        packet_size: 32768,
        min_reply_size: 1024,
    };
    let mut packet = build_connect_packet(mess_class, SENDER_REF, &data).unwrap();
    ByteBuffer::with_offset(&mut packet[..], RTE_HEADER_SIZE, true)
        .write_ascii_padded(CONNECT_CLIENT_DB, DATABASE, CONNECT_DB_NAME_SIZE)
        .unwrap();
    let mut header = RteHeader::parse(&packet).unwrap();
    header.return_code = return_code;
    header.write_to(&mut packet[..RTE_HEADER_SIZE]).unwrap();
    packet
}

/// Read one packet; `None` once the peer closed the socket.
async fn read_packet(sock: &mut TcpStream) -> Option<(RteHeader, Vec<u8>)> {
    let mut raw = [0u8; RTE_HEADER_SIZE];
    sock.read_exact(&mut raw).await.ok()?;
    let header = RteHeader::parse(&raw).unwrap();
    let mut payload = vec![0u8; header.act_send_len as usize - RTE_HEADER_SIZE];
    sock.read_exact(&mut payload).await.ok()?;
    Some((header, payload))
}

/// Start a server that runs the handshake, then answers data requests with
/// `replies` in order. The task yields the recorded data requests.
async fn serve(replies: Vec<Vec<u8>>) -> (ConnectParams, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut info_sock, _) = listener.accept().await.unwrap();
        let (header, _) = read_packet(&mut info_sock).await.unwrap();
        assert_eq!(header.mess_class, RSQL_INFO_REQUEST);
        info_sock
            .write_all(&connect_reply(RSQL_INFO_REPLY, SQLOK))
            .await
            .unwrap();
        while read_packet(&mut info_sock).await.is_some() {}

        let (mut sock, _) = listener.accept().await.unwrap();
        let (header, _) = read_packet(&mut sock).await.unwrap();
        assert_eq!(header.mess_class, RSQL_USER_CONN_REQUEST);
        sock.write_all(&connect_reply(RSQL_USER_CONN_REPLY, SQLOK))
            .await
            .unwrap();

        let mut requests = Vec::new();
        let mut replies = replies.into_iter();
        while let Some((header, payload)) = read_packet(&mut sock).await {
            if header.mess_class == RSQL_USER_RELEASE_REQUEST {
                break;
            }
            assert_eq!(header.mess_class, RSQL_USER_DATA_REQUEST);
            assert_eq!(header.sender_ref, SENDER_REF);
            requests.push(payload);
            let answer = replies.next().expect("unexpected request");
            sock.write_all(&answer).await.unwrap();
        }
        requests
    });

    let params = ConnectParams::new("127.0.0.1", port, DATABASE)
        .with_credentials("DBA", "secret")
        .with_connect_timeout(Duration::from_secs(5));
    (params, handle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_login_ping_and_release() {
    let (params, server) = serve(vec![login_reply(), ok_reply()]).await;

    let mut conn = Connection::connect_with_params(&params).await.unwrap();
    assert_eq!(conn.session_id(), SESSION_ID);
    assert_eq!(conn.kernel_version(), Some(70910));
    assert!(!conn.is_unicode());

    conn.ping().await.unwrap();
    conn.close().await.unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(contains(&requests[0], b"CONNECT \"DBA\" IDENTIFIED BY :PW"));
    assert!(contains(&requests[1], b"PING"));
}

#[tokio::test]
async fn test_unknown_database() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        read_packet(&mut sock).await.unwrap();
        sock.write_all(&connect_reply(RSQL_INFO_REPLY, SQLSERVER_DB_UNKNOWN))
            .await
            .unwrap();
    });

    let params = ConnectParams::new("127.0.0.1", port, DATABASE).with_credentials("DBA", "secret");
    let result = Connection::connect_with_params(&params).await;
    match result {
        Err(Error::UnknownDatabase { name }) => assert_eq!(name, DATABASE),
        other => panic!("expected UnknownDatabase, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_server_error_keeps_session() {
    let error = reply(
        -4004,
        FUNC_NIL,
        &[part(PARTKIND_ERROR_TEXT, 1, b"Unknown table name:NOPE")],
    );
    let (params, server) = serve(vec![login_reply(), error, ok_reply()]).await;

    let mut conn = Connection::connect_with_params(&params).await.unwrap();
    match conn.execute("DELETE FROM NOPE").await {
        Err(Error::Server { code, message, .. }) => {
            assert_eq!(code, -4004);
            assert_eq!(message, "Unknown table name:NOPE");
        }
        other => panic!("expected a server error, got {:?}", other),
    }
    assert!(!conn.is_desynchronized());
    conn.commit().await.unwrap();
    conn.close().await.unwrap();

    let requests = server.await.unwrap();
    assert!(contains(&requests[1], b"DELETE FROM NOPE"));
    assert!(contains(&requests[2], b"COMMIT WORK"));
}

#[tokio::test]
async fn test_select_fetches_rows() {
    let parse_id = [7u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0];

    // NAME VARCHAR(10) ASCII at record position 1.
    let mut short_info = vec![PARAM_MODE_OPTIONAL, PARAM_IO_OUTPUT, DT_VARCHARA, 0];
    short_info.extend_from_slice(&10i16.to_le_bytes());
    short_info.extend_from_slice(&11i16.to_le_bytes());
    short_info.extend_from_slice(&1i32.to_le_bytes());

    let parsed = reply(
        0,
        FUNC_SELECT,
        &[
            part(PARTKIND_PARSID, 1, &parse_id),
            part(PARTKIND_SHORT_INFO, 1, &short_info),
            part(PARTKIND_COLUMN_NAMES, 1, b"\x04NAME"),
        ],
    );
    let executed = reply(0, FUNC_SELECT, &[]);

    let mut rows = Vec::new();
    rows.push(DEFINED_ASCII);
    rows.extend_from_slice(b"alice     ");
    rows.push(DEFINED_ASCII);
    rows.extend_from_slice(b"bob       ");
    let fetched = reply(
        0,
        FUNC_MASS_OFFSET + FUNC_FETCH_NEXT,
        &[Part {
            kind: PARTKIND_DATA,
            attributes: PART_ATTR_LAST_PACKET,
            args: 2,
            data: rows,
        }],
    );

    let (params, server) = serve(vec![
        login_reply(),
        parsed,
        executed,
        fetched,
        ok_reply(),
        ok_reply(),
    ])
    .await;

    let mut conn = Connection::connect_with_params(&params).await.unwrap();
    let result = conn.query("SELECT NAME FROM USERS", &[]).await.unwrap();
    assert_eq!(result.column_names(), vec!["NAME"]);
    assert_eq!(result.len(), 2);
    let names: Vec<_> = result
        .iter()
        .map(|row| row.get_by_name("name").cloned())
        .collect();
    assert_eq!(
        names,
        vec![
            Some(MaxDbValue::String("alice".to_string())),
            Some(MaxDbValue::String("bob".to_string())),
        ]
    );
    conn.close().await.unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 6);
    assert!(contains(&requests[1], b"SELECT NAME FROM USERS"));
    assert!(contains(&requests[2], &parse_id));
    assert!(contains(&requests[2], b"MAXDB_CURSOR_1"));
    assert!(contains(&requests[3], b"FETCH NEXT \"MAXDB_CURSOR_1\" INTO ?"));
    assert!(contains(&requests[4], b"CLOSE \"MAXDB_CURSOR_1\""));
    assert!(contains(&requests[5], &parse_id));
}

#[tokio::test]
async fn test_cancel_desynchronizes_session() {
    let (params, server) = serve(vec![login_reply()]).await;

    let mut conn = Connection::connect_with_params(&params).await.unwrap();
    let handle = conn.cancel_handle();

    // The cancel opens a third socket that nobody accepts; only the flag
    // matters here.
    let _ = tokio::time::timeout(Duration::from_millis(200), handle.cancel()).await;
    assert!(conn.is_desynchronized());
    assert!(matches!(conn.ping().await, Err(Error::Desynchronized)));
    drop(conn);

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 1);
}
