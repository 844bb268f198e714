//! Concrete [`RequestHandler`] implementations for every known request code,
//! and the registry constructor that wires them up at startup.

mod files;
mod keys;
mod registration;

use std::sync::Arc;
use strongbox_common::protocol::HandlerRegistry;

/// Build the registry every session shares, one handler per request code.
pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(registration::RegistrationHandler));
    registry.register(Arc::new(keys::SendPublicKeyHandler));
    registry.register(Arc::new(keys::ReconnectHandler));
    registry.register(Arc::new(files::SendFileHandler));
    registry.register(Arc::new(files::CrcCorrectHandler));
    registry.register(Arc::new(files::CrcIncorrectResendHandler));
    registry.register(Arc::new(files::CrcIncorrectDoneHandler));
    registry
}
