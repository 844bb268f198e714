//! REGISTRATION: claim a client name and mint a fresh client id.

use async_trait::async_trait;
use chrono::Utc;
use strongbox_common::catalog::Client;
use strongbox_common::crypto::generate_client_id;
use strongbox_common::error::CatalogError;
use strongbox_common::protocol::{HandlerOutcome, RequestHandler, Services};
use strongbox_common::wire::{decode_name_field, RequestCode, ResponseCode};
use strongbox_common::ServerError;
use tracing::info;

pub struct RegistrationHandler;

#[async_trait]
impl RequestHandler for RegistrationHandler {
    async fn handle(
        &self,
        _client_id: &[u8],
        payload: &[u8],
        services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        let name = decode_name_field(payload);

        if services.catalog.lookup_client_by_name(&name).await?.is_some() {
            return Ok(HandlerOutcome::new(
                ResponseCode::RegistrationFailed.as_u16(),
                Vec::new(),
            ));
        }

        let new_id = generate_client_id();
        let client = Client {
            id: new_id.to_vec(),
            name,
            public_key: Vec::new(),
            last_seen: Utc::now(),
            aes_key: Vec::new(),
        };

        match services.catalog.insert_client(&client).await {
            Ok(()) => {
                info!(client_id = ?new_id, name = %client.name, "registered new client");
                Ok(HandlerOutcome::new(
                    ResponseCode::RegistrationSuccess.as_u16(),
                    new_id.to_vec(),
                ))
            }
            Err(CatalogError::DuplicateName) => Ok(HandlerOutcome::new(
                ResponseCode::RegistrationFailed.as_u16(),
                Vec::new(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn code(&self) -> u16 {
        RequestCode::Registration as u16
    }

    fn name(&self) -> &'static str {
        "RegistrationHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_common::catalog::Catalog;
    use strongbox_common::store::BlobStore;
    use strongbox_common::wire::encode_name_field;

    async fn services() -> Services {
        let catalog = Catalog::connect("sqlite::memory:").unwrap();
        catalog.initialize().await.unwrap();
        Services {
            catalog,
            blob_store: BlobStore::new("/tmp/strongbox-test-unused"),
        }
    }

    #[tokio::test]
    async fn fresh_name_succeeds() {
        let services = services().await;
        let handler = RegistrationHandler;
        let payload = encode_name_field("alice", 255);

        let outcome = handler.handle(&[], &payload, &services).await.unwrap();
        assert_eq!(outcome.code, ResponseCode::RegistrationSuccess.as_u16());
        assert_eq!(outcome.payload.len(), 16);
    }

    #[tokio::test]
    async fn repeat_name_is_rejected() {
        let services = services().await;
        let handler = RegistrationHandler;
        let payload = encode_name_field("alice", 255);

        handler.handle(&[], &payload, &services).await.unwrap();
        let second = handler.handle(&[], &payload, &services).await.unwrap();
        assert_eq!(second.code, ResponseCode::RegistrationFailed.as_u16());
        assert!(second.payload.is_empty());
    }
}
