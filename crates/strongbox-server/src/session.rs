//! Per-connection session loop: read one request frame, dispatch it through
//! the handler registry, write exactly one response frame, repeat until the
//! peer disconnects or the idle timeout expires.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use strongbox_common::error::FrameError;
use strongbox_common::protocol::{HandlerRegistry, Services};
use strongbox_common::wire::{self, ResponseCode, SERVER_VERSION};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Drives one accepted connection to completion.
pub struct Session<S> {
    stream: S,
    addr: SocketAddr,
    registry: Arc<HandlerRegistry>,
    services: Services,
    idle_timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Build a session around an accepted stream.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        registry: Arc<HandlerRegistry>,
        services: Services,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            addr,
            registry,
            services,
            idle_timeout,
        }
    }

    /// Run the read-dispatch-write loop until the peer disconnects, the
    /// connection goes idle past the configured timeout, or an unrecoverable
    /// framing error occurs.
    pub async fn run(mut self) {
        loop {
            let frame = match tokio::time::timeout(self.idle_timeout, wire::read_request(&mut self.stream)).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(FrameError::Disconnected)) => {
                    info!(addr = %self.addr, "client disconnected");
                    return;
                }
                Ok(Err(e)) => {
                    warn!(addr = %self.addr, error = %e, "framing error, ending session");
                    return;
                }
                Err(_) => {
                    info!(addr = %self.addr, "idle timeout, ending session");
                    return;
                }
            };

            let client_id = frame.header.client_id.clone();
            let code = frame.header.code;

            let (response_code, payload) = match frame.code() {
                Some(known) => {
                    debug!(addr = %self.addr, code = code, client_id = ?client_id, "dispatching request");
                    match self.registry.get(code) {
                        Some(handler) => {
                            match handler.handle(&client_id, &frame.payload, &self.services).await {
                                Ok(outcome) => {
                                    if should_touch_last_seen(known) && !client_id.is_empty() {
                                        self.services.catalog.touch_last_seen(&client_id).await;
                                    }
                                    (outcome.code, outcome.payload)
                                }
                                Err(e) if e.is_fatal_to_session() => {
                                    warn!(addr = %self.addr, code = code, error = %e, "fatal handler error, ending session");
                                    return;
                                }
                                Err(e) => {
                                    warn!(addr = %self.addr, code = code, error = %e, "handler failed");
                                    (ResponseCode::GeneralError.as_u16(), Vec::new())
                                }
                            }
                        }
                        None => {
                            warn!(addr = %self.addr, code = code, "no handler registered for known code");
                            (ResponseCode::GeneralError.as_u16(), Vec::new())
                        }
                    }
                }
                None => {
                    warn!(addr = %self.addr, code = code, "unknown request code");
                    (ResponseCode::GeneralError.as_u16(), Vec::new())
                }
            };

            if let Err(e) = wire::write_response(&mut self.stream, SERVER_VERSION, response_code, &payload).await {
                warn!(addr = %self.addr, error = %e, "failed to write response, ending session");
                return;
            }
        }
    }
}

/// REGISTRATION already sets `last_seen` itself on insert; every other known
/// request code refreshes it as the ambient per-request policy.
fn should_touch_last_seen(code: wire::RequestCode) -> bool {
    !matches!(code, wire::RequestCode::Registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use strongbox_common::catalog::Catalog;
    use strongbox_common::protocol::{HandlerOutcome, RequestHandler};
    use strongbox_common::store::BlobStore;
    use strongbox_common::wire::{encode_name_field, RequestCode};
    use strongbox_common::ServerError;
    use tokio::io::duplex;

    struct AlwaysConfirm;

    #[async_trait]
    impl RequestHandler for AlwaysConfirm {
        async fn handle(
            &self,
            client_id: &[u8],
            _payload: &[u8],
            _services: &Services,
        ) -> Result<HandlerOutcome, ServerError> {
            Ok(HandlerOutcome::new(ResponseCode::ConfirmMsg.as_u16(), client_id.to_vec()))
        }

        fn code(&self) -> u16 {
            RequestCode::CrcCorrect as u16
        }

        fn name(&self) -> &'static str {
            "AlwaysConfirm"
        }
    }

    async fn test_services(root: &std::path::Path) -> Services {
        let catalog = Catalog::connect("sqlite::memory:").unwrap();
        catalog.initialize().await.unwrap();
        Services {
            catalog,
            blob_store: BlobStore::new(root),
        }
    }

    #[tokio::test]
    async fn unknown_code_gets_general_error() {
        let dir = tempfile::tempdir().unwrap();
        let services = test_services(dir.path()).await;
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(AlwaysConfirm));

        let (mut client, server) = duplex(4096);
        let session = Session::new(
            server,
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(registry),
            services,
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(session.run());

        let mut request = vec![0u8; 16];
        request.push(SERVER_VERSION);
        request.extend_from_slice(&9999u16.to_be_bytes());
        request.extend_from_slice(&0u32.to_be_bytes());
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        client.write_all(&request).await.unwrap();

        let mut response = [0u8; 7];
        client.read_exact(&mut response).await.unwrap();
        let code = u16::from_be_bytes([response[1], response[2]]);
        assert_eq!(code, ResponseCode::GeneralError.as_u16());

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn known_code_dispatches_to_registered_handler() {
        let dir = tempfile::tempdir().unwrap();
        let services = test_services(dir.path()).await;
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(AlwaysConfirm));

        let (mut client, server) = duplex(4096);
        let session = Session::new(
            server,
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(registry),
            services,
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(session.run());

        let mut request = vec![7u8; 16];
        request.push(SERVER_VERSION);
        request.extend_from_slice(&(RequestCode::CrcCorrect as u16).to_be_bytes());
        let name_field = encode_name_field("notes.txt", 255);
        request.extend_from_slice(&(name_field.len() as u32).to_be_bytes());
        request.extend_from_slice(&name_field);

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        client.write_all(&request).await.unwrap();

        let mut header = [0u8; 7];
        client.read_exact(&mut header).await.unwrap();
        let code = u16::from_be_bytes([header[1], header[2]]);
        assert_eq!(code, ResponseCode::ConfirmMsg.as_u16());

        drop(client);
        handle.await.unwrap();
    }
}
