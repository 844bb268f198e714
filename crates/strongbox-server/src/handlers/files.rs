//! SEND_FILE, CRC_CORRECT, CRC_INCORRECT_RESEND, CRC_INCORRECT_DONE: the
//! file-transfer and verification exchange.

use async_trait::async_trait;
use strongbox_common::catalog::File as FileRecord;
use strongbox_common::crypto::{decrypt_cbc, AES_KEY_SIZE};
use strongbox_common::protocol::{HandlerOutcome, RequestHandler, Services};
use strongbox_common::wire::{decode_name_field, encode_name_field, RequestCode, ResponseCode, NAME_FIELD_SIZE};
use strongbox_common::ServerError;
use tracing::warn;

const CONTENT_SIZE_FIELD: usize = 4;

pub struct SendFileHandler;

#[async_trait]
impl RequestHandler for SendFileHandler {
    async fn handle(
        &self,
        client_id: &[u8],
        payload: &[u8],
        services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        if payload.len() < CONTENT_SIZE_FIELD + NAME_FIELD_SIZE {
            return Ok(HandlerOutcome::new(ResponseCode::GeneralError.as_u16(), Vec::new()));
        }

        let content_size = u32::from_be_bytes(payload[..CONTENT_SIZE_FIELD].try_into().unwrap());
        let name_start = CONTENT_SIZE_FIELD;
        let name_end = name_start + NAME_FIELD_SIZE;
        let file_name = decode_name_field(&payload[name_start..name_end]);

        let ciphertext = &payload[name_end..];
        if ciphertext.len() != content_size as usize {
            warn!(
                declared = content_size,
                got = ciphertext.len(),
                "SEND_FILE content_size mismatch"
            );
            return Ok(HandlerOutcome::new(ResponseCode::GeneralError.as_u16(), Vec::new()));
        }

        let aes_key_bytes = services.catalog.get_aes_key(client_id).await?;
        let aes_key: [u8; AES_KEY_SIZE] = aes_key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| strongbox_common::error::CryptoError::ShortCiphertext)?;

        let plaintext = decrypt_cbc(ciphertext, &aes_key)?;

        let stored_path = services.blob_store.write(&file_name, &plaintext).await?;

        services
            .catalog
            .insert_file(&FileRecord {
                owner_id: client_id.to_vec(),
                file_name: file_name.clone(),
                path_name: stored_path.to_string_lossy().to_string(),
                verified: false,
            })
            .await?;

        let crc = services.blob_store.crc32(&stored_path).await?;

        let mut response = Vec::with_capacity(client_id.len() + CONTENT_SIZE_FIELD + NAME_FIELD_SIZE + 4);
        response.extend_from_slice(client_id);
        response.extend_from_slice(&content_size.to_be_bytes());
        response.extend_from_slice(&encode_name_field(&file_name, NAME_FIELD_SIZE));
        response.extend_from_slice(&crc);

        Ok(HandlerOutcome::new(ResponseCode::FileReceivedCrcOk.as_u16(), response))
    }

    fn code(&self) -> u16 {
        RequestCode::SendFile as u16
    }

    fn name(&self) -> &'static str {
        "SendFileHandler"
    }
}

pub struct CrcCorrectHandler;

#[async_trait]
impl RequestHandler for CrcCorrectHandler {
    async fn handle(
        &self,
        client_id: &[u8],
        payload: &[u8],
        services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        let file_name = decode_name_field(payload);
        services
            .catalog
            .mark_file_verified(client_id, &file_name, true)
            .await?;

        Ok(HandlerOutcome::new(ResponseCode::ConfirmMsg.as_u16(), client_id.to_vec()))
    }

    fn code(&self) -> u16 {
        RequestCode::CrcCorrect as u16
    }

    fn name(&self) -> &'static str {
        "CrcCorrectHandler"
    }
}

/// Acknowledges an in-progress retry notification without mutating any
/// state (see the protocol's resolved ambiguity around this code).
pub struct CrcIncorrectResendHandler;

#[async_trait]
impl RequestHandler for CrcIncorrectResendHandler {
    async fn handle(
        &self,
        client_id: &[u8],
        _payload: &[u8],
        _services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        Ok(HandlerOutcome::new(ResponseCode::ConfirmMsg.as_u16(), client_id.to_vec()))
    }

    fn code(&self) -> u16 {
        RequestCode::CrcIncorrectResend as u16
    }

    fn name(&self) -> &'static str {
        "CrcIncorrectResendHandler"
    }
}

/// Abandons the file transfer; the file row (if any) is left `verified = false`.
pub struct CrcIncorrectDoneHandler;

#[async_trait]
impl RequestHandler for CrcIncorrectDoneHandler {
    async fn handle(
        &self,
        client_id: &[u8],
        _payload: &[u8],
        _services: &Services,
    ) -> Result<HandlerOutcome, ServerError> {
        Ok(HandlerOutcome::new(ResponseCode::ConfirmMsg.as_u16(), client_id.to_vec()))
    }

    fn code(&self) -> u16 {
        RequestCode::CrcIncorrectDone as u16
    }

    fn name(&self) -> &'static str {
        "CrcIncorrectDoneHandler"
    }
}
