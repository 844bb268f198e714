//! Catalog models: the durable record of registered clients and their files.

pub mod queries;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub use queries::Catalog;

/// A registered client. `public_key` and `aes_key` are empty until
/// SEND_PUBLIC_KEY completes.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Client {
    /// 16-byte opaque id, server-assigned at registration (UUID v4 bytes).
    pub id: Vec<u8>,
    /// Unique display name, trimmed of NUL padding and surrounding whitespace.
    pub name: String,
    /// RSA public key bytes (PKCS#1 DER) as received, empty until keyed.
    pub public_key: Vec<u8>,
    /// Timestamp of the last successfully processed request from this client.
    pub last_seen: DateTime<Utc>,
    /// AES-128 session key, empty until keyed.
    pub aes_key: Vec<u8>,
}

/// A file uploaded by a client.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct File {
    /// Owning client's id.
    pub owner_id: Vec<u8>,
    /// File name as sent by the client (NUL-padded field, already trimmed).
    pub file_name: String,
    /// Server-side storage path the blob was written to.
    pub path_name: String,
    /// Whether the client has confirmed a matching CRC for this file.
    pub verified: bool,
}
