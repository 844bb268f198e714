//! Request/response framing for the strongbox wire protocol.
//!
//! ```text
//! Request:
//! +----------------+------+-------+--------------+----------+
//! | client_id 16B  | ver  | code  | payload_size | payload  |
//! |                | 1B   | 2B BE | 4B BE        | N bytes  |
//! +----------------+------+-------+--------------+----------+
//!
//! Response:
//! +------+-------+--------------+------------------+
//! | ver  | code  | payload_size | payload          |
//! | 1B   | 2B BE | 4B BE        | payload_size B   |
//! +------+-------+--------------+------------------+
//! ```

use crate::error::FrameError;
use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// ASCII '3', the only server version this build speaks.
pub const SERVER_VERSION: u8 = b'3';

/// Size of the fixed request header: 16 (client id) + 1 (version) + 2 (code) + 4 (payload size).
pub const REQUEST_HEADER_SIZE: usize = 16 + 1 + 2 + 4;

/// Width of every NUL-padded name field on the wire (client name, file name).
pub const NAME_FIELD_SIZE: usize = 255;

/// The closed set of request codes a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestCode {
    /// Register a new client by name.
    Registration = 1025,
    /// Publish an RSA public key and receive a wrapped AES key.
    SendPublicKey = 1026,
    /// Re-establish a session for an already-registered, already-keyed client.
    Reconnect = 1027,
    /// Upload AES-CBC encrypted file contents.
    SendFile = 1028,
    /// Acknowledge that a CRC check passed.
    CrcCorrect = 1029,
    /// Notify that a retry is coming after a failed CRC check.
    CrcIncorrectResend = 1030,
    /// Abandon the file transfer after a failed CRC check.
    CrcIncorrectDone = 1031,
}

impl RequestCode {
    /// Map a raw wire code to a known variant, if any.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1025 => Some(Self::Registration),
            1026 => Some(Self::SendPublicKey),
            1027 => Some(Self::Reconnect),
            1028 => Some(Self::SendFile),
            1029 => Some(Self::CrcCorrect),
            1030 => Some(Self::CrcIncorrectResend),
            1031 => Some(Self::CrcIncorrectDone),
            _ => None,
        }
    }
}

/// Response codes the server may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseCode {
    /// REGISTRATION succeeded; payload carries the new client id.
    RegistrationSuccess = 2100,
    /// REGISTRATION failed because the name is already taken.
    RegistrationFailed = 2101,
    /// SEND_PUBLIC_KEY accepted; payload carries the wrapped AES key.
    ReceivedPublicKeySendAes = 2102,
    /// SEND_FILE accepted and stored; payload carries the computed CRC.
    FileReceivedCrcOk = 2103,
    /// Generic acknowledgement carrying just the client id.
    ConfirmMsg = 2104,
    /// RECONNECT approved; payload carries the re-wrapped AES key.
    ApproveReconnectSendAes = 2105,
    /// RECONNECT rejected; the client must register as new.
    ReconnectRejected = 2106,
    /// Catch-all failure response.
    GeneralError = 2107,
}

impl ResponseCode {
    /// The numeric wire value for this response code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// The fixed portion of a decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// Client id with trailing NUL padding stripped.
    pub client_id: Vec<u8>,
    /// Raw version byte as sent by the peer (never validated, per protocol).
    pub version: u8,
    /// Raw request code; may not be one of the known [`RequestCode`] values.
    pub code: u16,
    /// Declared payload length in bytes.
    pub payload_size: u32,
}

/// A fully decoded request: header plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// The fixed header fields.
    pub header: RequestHeader,
    /// Exactly `header.payload_size` bytes.
    pub payload: Vec<u8>,
}

impl RequestFrame {
    /// The decoded request code, or `None` if the wire value is unrecognized.
    pub fn code(&self) -> Option<RequestCode> {
        RequestCode::from_u16(self.header.code)
    }
}

/// Read one request frame from `reader`.
///
/// Reads the 23-byte header first; if zero bytes are available the peer has
/// disconnected cleanly and [`FrameError::Disconnected`] is returned. If the
/// connection closes after a partial header, or partway through the payload,
/// [`FrameError::Truncated`] (for a payload short-read) or an I/O error is
/// returned instead.
pub async fn read_request<R>(reader: &mut R) -> Result<RequestFrame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; REQUEST_HEADER_SIZE];
    let n = read_fill_or_eof(reader, &mut header_buf).await?;
    if n == 0 {
        return Err(FrameError::Disconnected);
    }
    if n < REQUEST_HEADER_SIZE {
        return Err(FrameError::Truncated {
            declared: REQUEST_HEADER_SIZE as u32,
            got: n,
        });
    }

    let mut cursor = &header_buf[..];
    let mut client_id = [0u8; 16];
    cursor.copy_to_slice(&mut client_id);
    let version = cursor.get_u8();
    let code = cursor.get_u16();
    let payload_size = cursor.get_u32();

    let mut payload = vec![0u8; payload_size as usize];
    let got = read_fill_or_eof(reader, &mut payload).await?;
    if got < payload.len() {
        return Err(FrameError::Truncated {
            declared: payload_size,
            got,
        });
    }

    let client_id = trim_trailing_nuls(&client_id).to_vec();

    Ok(RequestFrame {
        header: RequestHeader {
            client_id,
            version,
            code,
            payload_size,
        },
        payload,
    })
}

/// Encode a response frame to bytes: `version || code (BE) || payload_size (BE) || payload`.
pub fn encode_response(version: u8, code: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(1 + 2 + 4 + payload.len());
    buf.put_u8(version);
    buf.put_u16(code);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.to_vec()
}

/// Decode a response previously produced by [`encode_response`]. Exposed for
/// the round-trip law tests and for any client-side tooling.
pub fn decode_response(bytes: &[u8]) -> Result<(u8, u16, Vec<u8>), FrameError> {
    if bytes.len() < 7 {
        return Err(FrameError::Truncated {
            declared: 7,
            got: bytes.len(),
        });
    }
    let mut cursor = bytes;
    let version = cursor.get_u8();
    let code = cursor.get_u16();
    let payload_size = cursor.get_u32() as usize;
    if cursor.remaining() < payload_size {
        return Err(FrameError::Truncated {
            declared: payload_size as u32,
            got: cursor.remaining(),
        });
    }
    Ok((version, code, cursor[..payload_size].to_vec()))
}

/// Write a response frame to `writer` and flush it.
pub async fn write_response<W>(
    writer: &mut W,
    version: u8,
    code: u16,
    payload: &[u8],
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_response(version, code, payload);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Trim trailing NUL bytes, matching how the client name / file name fields
/// are padded to their fixed width on the wire.
pub fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Decode a NUL-padded UTF-8 name field, trimming trailing NULs and then
/// surrounding whitespace.
pub fn decode_name_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_trailing_nuls(bytes))
        .trim()
        .to_string()
}

/// Encode a name into a NUL-padded field of exactly `width` bytes, truncating
/// if the UTF-8 encoding is longer than `width`.
pub fn encode_name_field(name: &str, width: usize) -> Vec<u8> {
    let mut field = vec![0u8; width];
    let bytes = name.as_bytes();
    let len = bytes.len().min(width);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Read into `buf` until it is full or the peer closes the connection,
/// returning the number of bytes actually read (which is `buf.len()` on a
/// full read and something smaller on EOF).
async fn read_fill_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
