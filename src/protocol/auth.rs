//! SCRAMMD5 challenge/response authentication and the legacy password
//! scramble.

use crate::error::{Error, Result};
use crate::protocol::buffer::utf16_bytes;
use crate::protocol::constants::*;
use crate::protocol::crypto::{hmac_md5, md5_hash, random_bytes, xor};
use crate::protocol::packet::PacketStream;
use crate::protocol::part::VariableDataPart;
use crate::protocol::reply::ReplyPacket;
use crate::protocol::request::RequestPacket;
use tracing::debug;

/// Authentication credentials.
#[derive(Clone)]
pub struct AuthCredentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl AuthCredentials {
    /// Create new credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Session data from a successful login.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Server session id.
    pub session_id: i32,
    /// Whether the server talks unicode.
    pub unicode: bool,
    /// Kernel version as `major * 10000 + minor * 100 + correction`.
    pub kernel_version: Option<i32>,
    /// Feature values granted by the server.
    pub features: Option<Vec<u8>>,
    /// Longest password the server accepts, if it said so.
    pub max_password_length: Option<i32>,
}

/// Client side of the SCRAMMD5 exchange.
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    client_challenge: Vec<u8>,
    salt: Vec<u8>,
    server_challenge: Vec<u8>,
    max_password_length: Option<i32>,
}

impl Default for ChallengeResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeResponse {
    /// Start an exchange with a fresh random client challenge.
    pub fn new() -> Self {
        Self::with_client_challenge(random_bytes(CLIENT_CHALLENGE_SIZE))
    }

    /// Start an exchange with a fixed client challenge.
    pub fn with_client_challenge(client_challenge: Vec<u8>) -> Self {
        Self {
            client_challenge,
            salt: Vec::new(),
            server_challenge: Vec::new(),
            max_password_length: None,
        }
    }

    /// Client challenge sent with the login request.
    pub fn client_challenge(&self) -> &[u8] {
        &self.client_challenge
    }

    /// Salt from the server challenge; empty until one is parsed.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Server challenge bytes following the salt.
    pub fn server_challenge(&self) -> &[u8] {
        &self.server_challenge
    }

    /// `maxpasswordlen` announced by the server, if any.
    pub fn max_password_length(&self) -> Option<i32> {
        self.max_password_length
    }

    /// Split the server's answer into salt and server challenge.
    ///
    /// The first field names the algorithm and must be `SCRAMMD5`. The
    /// second is either the old 40-byte form (8 bytes of salt followed by
    /// the challenge) or a nested row holding salt and challenge. Newer
    /// kernels add a third field with a nested tag/value list that may
    /// carry `maxpasswordlen`.
    pub fn parse_server_challenge(&mut self, mut part: VariableDataPart<'_>) -> Result<()> {
        let raw = part.as_bytes();
        let wrong = || Error::wrong_challenge(raw);

        if !part.next_row().map_err(|_| wrong())? || !part.next_field().map_err(|_| wrong())? {
            return Err(wrong());
        }
        let algorithm = part.current_ascii().map_err(|_| wrong())?;
        if !algorithm.trim().eq_ignore_ascii_case(SCRAM_MD5_NAME) {
            return Err(wrong());
        }

        if !part.next_field().map_err(|_| wrong())? || part.current_field_len() < LEGACY_SALT_SIZE {
            return Err(wrong());
        }
        let field = part.current_field().map_err(|_| wrong())?;
        if field.len() == LEGACY_CHALLENGE_SIZE {
            self.salt = field[..LEGACY_SALT_SIZE].to_vec();
            self.server_challenge = field[LEGACY_SALT_SIZE..].to_vec();
            return Ok(());
        }

        let mut nested = part.nested(1).map_err(|_| wrong())?;
        if !nested.next_row().map_err(|_| wrong())? || !nested.next_field().map_err(|_| wrong())? {
            return Err(wrong());
        }
        self.salt = nested.current_field().map_err(|_| wrong())?.to_vec();
        if !nested.next_field().map_err(|_| wrong())? {
            return Err(wrong());
        }
        self.server_challenge = nested.current_field().map_err(|_| wrong())?.to_vec();

        if part.next_field().map_err(|_| wrong())? {
            let mut options = part.nested(1).map_err(|_| wrong())?;
            if !options.next_row().map_err(|_| wrong())? || !options.next_field().map_err(|_| wrong())? {
                return Err(wrong());
            }
            loop {
                let tag = options.current_ascii().map_err(|_| wrong())?;
                let is_max_len = tag.trim().eq_ignore_ascii_case(MAX_PASSWORD_LEN_TAG);
                if !options.next_field().map_err(|_| wrong())? {
                    return Err(wrong());
                }
                if is_max_len {
                    let value = options.current_ascii().map_err(|_| wrong())?;
                    self.max_password_length = Some(value.trim().parse().map_err(|_| wrong())?);
                }
                if !options.next_field().map_err(|_| wrong())? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Proof of knowledge of `password` for the parsed server challenge.
    pub fn client_proof(&self, password: &[u8]) -> Result<[u8; 16]> {
        scram_md5(
            &self.salt,
            password,
            &self.client_challenge,
            &self.server_challenge,
        )
    }
}

/// SCRAM-MD5 client proof.
///
/// ```text
/// salted   = HMAC-MD5(password, salt)
/// client   = MD5(salted)
/// verifier = MD5(client)
/// shared   = HMAC-MD5(verifier, salt | server_challenge | client_challenge)
/// proof    = shared XOR client
/// ```
pub fn scram_md5(
    salt: &[u8],
    password: &[u8],
    client_challenge: &[u8],
    server_challenge: &[u8],
) -> Result<[u8; 16]> {
    let salted = hmac_md5(password, &[salt])?;
    let client_key = md5_hash(&salted);
    let verifier = md5_hash(&client_key);
    let shared = hmac_md5(&verifier, &[salt, server_challenge, client_challenge])?;
    Ok(xor(&shared, &client_key))
}

/// Legacy password scramble used by kernels without SCRAMMD5.
///
/// This is an obfuscation, not a hash. The password is cut or blank-padded
/// to 18 characters, folded into six integers and written little-endian.
/// Unicode passwords contribute the first 18 bytes of their UTF-16LE form.
pub fn mangle(password: &str, unicode: bool) -> [u8; MANGLED_PASSWORD_SIZE] {
    const VP1: i32 = 2;
    const VP2: i32 = 521;
    const VP3: i32 = 133379;

    let padded: String = password
        .chars()
        .chain(std::iter::repeat(' '))
        .take(MANGLE_PASSWORD_CHARS)
        .collect();
    let mut bytes = if unicode {
        utf16_bytes(&padded, true)
    } else {
        padded
            .chars()
            .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
            .collect()
    };
    bytes.resize(MANGLE_PASSWORD_CHARS, b' ');

    let mut crypt = [0i32; 6];
    for (i, word) in crypt.iter_mut().enumerate() {
        let chunk = &bytes[i * 3..i * 3 + 3];
        *word = (chunk[0] as i32)
            .wrapping_mul(VP3)
            .wrapping_add((chunk[1] as i32).wrapping_mul(VP2))
            .wrapping_add((chunk[2] as i32).wrapping_mul(VP1));
    }
    for i in 0..6 {
        let left = if i > 0 { crypt[i - 1] } else { VP3 };
        crypt[i] = crypt[i].wrapping_add((left % 61).wrapping_mul(VP3 * 126 - 1));
    }
    for i in (0..6).rev() {
        let right = if i < 4 { crypt[i + 1] } else { VP2 };
        crypt[i] = crypt[i].wrapping_add((right % 61).wrapping_mul(VP3 * 128 - 1));
    }

    let mut out = [0u8; MANGLED_PASSWORD_SIZE];
    for (i, word) in crypt.iter().enumerate() {
        let value = if word & 1 != 0 { word.wrapping_neg() } else { *word };
        out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    out
}

/// Name of this machine, used as terminal and client id.
fn machine_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn client_id() -> String {
    format!("{}:{}", machine_name(), std::process::id())
}

/// Feature request sent with the login: (feature, value) pairs.
fn feature_request(space_option: bool) -> [u8; 10] {
    [
        FEATURE_MULTIPLE_DROP_PARSEID,
        1,
        FEATURE_SPACE_OPTION,
        space_option as u8,
        FEATURE_VARIABLE_INPUT,
        0,
        FEATURE_OPTIMIZED_STREAMS,
        0,
        FEATURE_CHECK_SCROLLABLE_OPTION,
        0,
    ]
}

/// Log in on an open transport.
///
/// With SCRAMMD5 the exchange takes two round trips: the client challenge
/// goes out with `CONNECT ... AUTHENTICATION`, then the proof with the real
/// connect command. Otherwise the mangled password is sent directly.
pub async fn authenticate(
    stream: &mut PacketStream,
    creds: &AuthCredentials,
    space_option: bool,
) -> Result<SessionData> {
    let user = quote_identifier(&creds.username);
    let mut max_password_length = None;

    let mut request = RequestPacket::new(stream.request_capacity(), false)?;
    let connect_command = format!("CONNECT {} IDENTIFIED BY :PW SQLMODE INTERNAL", user);

    if stream.scram_allowed() {
        debug!(user = %creds.username, "requesting SCRAMMD5 server challenge");
        let mut auth = ChallengeResponse::new();
        request.init_challenge_response(&user, auth.client_challenge())?;
        let mut reply = stream.execute(&mut request).await?;
        check_login_reply(&mut reply)?;
        let part = reply
            .var_data_part()?
            .ok_or_else(|| Error::wrong_challenge(&[]))?;
        auth.parse_server_challenge(part)?;
        max_password_length = auth.max_password_length();

        let proof = auth.client_proof(creds.password.as_bytes())?;
        request.init_dbs_command(&connect_command, true, false)?;
        request.add_client_proof_part(&proof)?;
    } else {
        debug!(user = %creds.username, "logging in with scrambled password");
        request.init_dbs_command(&connect_command, true, false)?;
        let mangled = mangle(&creds.password, false);
        let terminal = machine_name();
        let mut data = request.new_data_part(PARTKIND_DATA)?;
        data.write_field(DEFINED_BINARY, 1, &mangled, MANGLED_PASSWORD_SIZE, &[0])?;
        data.write_field(
            DEFINED_ASCII,
            MANGLED_PASSWORD_SIZE + 2,
            terminal.as_bytes(),
            MANGLE_PASSWORD_CHARS,
            b" ",
        )?;
        data.close()?;
    }
    request.add_client_id_part(&client_id())?;
    request.add_feature_request_part(&feature_request(space_option))?;

    let mut reply = stream.execute(&mut request).await?;
    check_login_reply(&mut reply)?;

    let session_id = reply.session_id()?.ok_or_else(|| Error::AuthenticationFailed {
        message: "login reply carries no session info".to_string(),
    })?;
    let session = SessionData {
        session_id,
        unicode: reply.is_unicode()?,
        kernel_version: reply.kernel_version(),
        features: reply.features()?,
        max_password_length,
    };
    debug!(
        session_id = session.session_id,
        unicode = session.unicode,
        kernel_version = ?session.kernel_version,
        "login complete"
    );
    Ok(session)
}

/// Turn a failed login reply into an error.
fn check_login_reply(reply: &mut ReplyPacket) -> Result<()> {
    match reply.return_code()? {
        0 => Ok(()),
        RC_UNKNOWN_USER_PASSWORD => Err(Error::AuthenticationFailed {
            message: reply.error_message()?,
        }),
        _ => Err(reply.to_error()?),
    }
}

/// Quote a user name unless the caller already did.
fn quote_identifier(name: &str) -> String {
    if name.starts_with('"') && name.ends_with('"') && name.len() > 1 {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
