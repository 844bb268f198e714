//! Dispatch infrastructure shared by every session: the per-request handler
//! trait, the services a handler may need, and a registry mapping request
//! codes to handlers.
//!
//! The upstream source registered handlers through a class-level decorator
//! table; here that becomes a plain `HashMap<u16, BoxedHandler>` built once
//! at startup and shared (via `Arc`) across every connection's session loop.

mod registry;

pub use registry::{BoxedHandler, HandlerRegistry};

use crate::catalog::Catalog;
use crate::store::BlobStore;
use crate::Result;
use async_trait::async_trait;

/// Services a request handler may call into. Shared (cheaply cloned) across
/// every session; the catalog and blob store each hold their own internal
/// synchronization so no session ever locks one while awaiting socket I/O.
#[derive(Clone)]
pub struct Services {
    /// Durable client/file catalog.
    pub catalog: Catalog,
    /// Decrypted file content store.
    pub blob_store: BlobStore,
}

/// A successful handler outcome: the response code and payload to send back.
pub struct HandlerOutcome {
    /// Response code to send (one of the [`crate::wire::ResponseCode`] values).
    pub code: u16,
    /// Response payload.
    pub payload: Vec<u8>,
}

impl HandlerOutcome {
    /// Build an outcome from a response code and payload.
    pub fn new(code: u16, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }
}

/// Handles one request code's worth of protocol logic.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Process a request's payload for the given client id and return the
    /// response to send. Returning `Err` causes the session engine to
    /// respond with GENERAL_ERROR and a short diagnostic payload.
    async fn handle(&self, client_id: &[u8], payload: &[u8], services: &Services) -> Result<HandlerOutcome>;

    /// The request code this handler answers.
    fn code(&self) -> u16;

    /// Handler name, used in logs.
    fn name(&self) -> &'static str;
}
