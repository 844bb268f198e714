//! Error types surfaced by the catalog, blob store, crypto, and wire layers.

use thiserror::Error;

/// Errors raised while decoding a request frame or encoding a response frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the connection before sending a full header.
    #[error("peer disconnected")]
    Disconnected,

    /// The declared payload size did not match the bytes actually available
    /// before the peer closed the connection.
    #[error("connection closed mid-frame: declared {declared} bytes, got {got}")]
    Truncated {
        /// Payload size declared in the header
        declared: u32,
        /// Bytes actually read before EOF
        got: usize,
    },

    /// Underlying socket I/O failure.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by catalog (client/file record) operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// `insert_client` was called with a name already present in the catalog.
    #[error("client name already registered")]
    DuplicateName,

    /// An operation referenced a client id with no matching row.
    #[error("unknown client id")]
    UnknownClient,

    /// An operation referenced a file that does not exist for its owner.
    #[error("unknown file")]
    UnknownFile,

    /// Underlying database failure.
    #[error("catalog database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Errors raised by the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Underlying filesystem failure.
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The RSA public key bytes could not be parsed as PKCS#1 DER.
    #[error("invalid RSA public key: {0}")]
    InvalidPublicKey(String),

    /// RSA-OAEP encryption of the AES key failed.
    #[error("RSA-OAEP encryption failed: {0}")]
    RsaEncrypt(String),

    /// AES-CBC ciphertext was shorter than one IV block.
    #[error("ciphertext shorter than one AES block")]
    ShortCiphertext,

    /// AES-CBC ciphertext length was not a multiple of the block size.
    #[error("ciphertext length {0} is not a multiple of the AES block size")]
    UnalignedCiphertext(usize),

    /// PKCS#7 padding was malformed after decryption.
    #[error("invalid PKCS#7 padding")]
    BadPadding,
}

/// Top-level error type unifying every component's errors for handlers that
/// span more than one (e.g. the session engine, which touches frames,
/// catalog, blob store, and crypto in a single dispatch).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Frame decode/encode failure.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Blob store failure.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// Cryptography failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ServerError {
    /// Whether this error should end the session outright rather than be
    /// reported to the peer as GENERAL_ERROR.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, ServerError::Frame(FrameError::Disconnected))
    }
}
