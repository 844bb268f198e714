//! SEND_PUBLIC_KEY and RECONNECT: key exchange and its re-affirmation.

use async_trait::async_trait;
use strongbox_common::crypto::{encrypt_aes_key, generate_aes_key, parse_public_key_der};
use strongbox_common::protocol::{HandlerOutcome, RequestHandler, Services};
use strongbox_common::wire::{decode_name_field, RequestCode, ResponseCode, NAME_FIELD_SIZE};
use strongbox_common::ServerError;

const RECONNECT_REJECTED_MESSAGE: &[u8] = b"Restart as new client";

pub struct SendPublicKeyHandler;

#[async_trait]
impl RequestHandler for SendPublicKeyHandler {
    async fn handle(
        &self,
        client_id: &[u8],
        payload: &[u8],
        services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        if payload.len() < NAME_FIELD_SIZE {
            return Ok(HandlerOutcome::new(ResponseCode::GeneralError.as_u16(), Vec::new()));
        }
        let public_key_der = &payload[NAME_FIELD_SIZE..];

        let public_key = parse_public_key_der(public_key_der)?;
        let aes_key = generate_aes_key();

        services
            .catalog
            .set_keys(client_id, public_key_der, &aes_key)
            .await?;

        let wrapped = encrypt_aes_key(&aes_key, &public_key)?;

        let mut response = Vec::with_capacity(client_id.len() + wrapped.len());
        response.extend_from_slice(client_id);
        response.extend_from_slice(&wrapped);

        Ok(HandlerOutcome::new(
            ResponseCode::ReceivedPublicKeySendAes.as_u16(),
            response,
        ))
    }

    fn code(&self) -> u16 {
        RequestCode::SendPublicKey as u16
    }

    fn name(&self) -> &'static str {
        "SendPublicKeyHandler"
    }
}

pub struct ReconnectHandler;

#[async_trait]
impl RequestHandler for ReconnectHandler {
    async fn handle(
        &self,
        client_id: &[u8],
        payload: &[u8],
        services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        let name = decode_name_field(payload);

        let client = services.catalog.lookup_client_by_name(&name).await?;
        let client = match client {
            Some(client) if !client.public_key.is_empty() => client,
            _ => {
                return Ok(HandlerOutcome::new(
                    ResponseCode::ReconnectRejected.as_u16(),
                    RECONNECT_REJECTED_MESSAGE.to_vec(),
                ));
            }
        };

        let public_key = parse_public_key_der(&client.public_key)?;
        let wrapped = encrypt_aes_key(&client.aes_key, &public_key)?;

        let mut response = Vec::with_capacity(client_id.len() + wrapped.len());
        response.extend_from_slice(client_id);
        response.extend_from_slice(&wrapped);

        Ok(HandlerOutcome::new(
            ResponseCode::ApproveReconnectSendAes.as_u16(),
            response,
        ))
    }

    fn code(&self) -> u16 {
        RequestCode::Reconnect as u16
    }

    fn name(&self) -> &'static str {
        "ReconnectHandler"
    }
}
