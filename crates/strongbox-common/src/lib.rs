//! Strongbox common library
//!
//! Shared functionality for the secure file-submission server:
//! - Wire protocol framing (request/response)
//! - Cryptography (RSA key wrapping, AES-CBC payload decryption)
//! - Catalog (durable client/file records)
//! - Blob store (decrypted file contents + CRC verification)
//! - Dispatch infrastructure shared by every session

pub mod catalog;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod store;
pub mod wire;

pub use catalog::{Catalog, Client, File};
pub use error::ServerError;
pub use store::BlobStore;

/// Common result type for strongbox operations
pub type Result<T> = std::result::Result<T, ServerError>;
