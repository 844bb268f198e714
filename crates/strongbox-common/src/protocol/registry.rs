//! Handler registry: maps request codes to handlers.

use super::RequestHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Type alias for a shared, dynamically dispatched handler.
pub type BoxedHandler = Arc<dyn RequestHandler>;

/// Looks up the handler registered for a given request code.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u16, BoxedHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own declared code.
    pub fn register(&mut self, handler: BoxedHandler) {
        self.handlers.insert(handler.code(), handler);
    }

    /// Look up the handler for a request code, if one is registered.
    pub fn get(&self, code: u16) -> Option<&BoxedHandler> {
        self.handlers.get(&code)
    }
}
