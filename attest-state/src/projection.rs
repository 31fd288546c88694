//! Projection handler contract and the static handler registry.
//!
//! Each event type maps to exactly one handler. Handlers are looked up by
//! event name in a registry built once at startup; events with no
//! registered handler are stored but never applied.

pub mod handlers;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::ProjectionError,
    store::{ProjectionStore, StoredEvent},
};

/// Applies one event type's mutation to the projected state.
#[async_trait]
pub trait ProjectionHandler: Send + Sync {
    /// The fully qualified event name the handler applies.
    fn event_name(&self) -> &'static str;

    /// Applies the event's mutation.
    ///
    /// A handler that references a not-yet-projected parent entity looks it
    /// up and skips the mutation if the parent is absent; only malformed
    /// payloads and store failures surface as errors.
    async fn apply(
        &self,
        event: &StoredEvent,
        store: &dyn ProjectionStore,
    ) -> Result<(), ProjectionError>;
}

/// Static registry mapping event names to their handler.
pub struct ProjectionRegistry {
    handlers: HashMap<&'static str, Box<dyn ProjectionHandler>>,
}

impl ProjectionRegistry {
    /// Creates an empty ProjectionRegistry.
    pub fn new() -> Self {
        ProjectionRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Creates a registry holding every domain handler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(handlers::ProfileCreated));
        registry.register(Box::new(handlers::ProfileUpdated));
        registry.register(Box::new(handlers::SkillClaimed));
        registry.register(Box::new(handlers::SkillVerified));
        registry.register(Box::new(handlers::EndorsementCreated));
        registry.register(Box::new(handlers::VerifierRegistered));
        registry.register(Box::new(handlers::BountyPoolCreated));
        registry.register(Box::new(handlers::BountyClaimed));
        registry
    }

    /// Registers a handler, replacing any previous handler for the same
    /// event name.
    pub fn register(&mut self, handler: Box<dyn ProjectionHandler>) {
        self.handlers.insert(handler.event_name(), handler);
    }

    /// Returns the handler registered for `event_name`, if any.
    pub fn handler(&self, event_name: &str) -> Option<&dyn ProjectionHandler> {
        self.handlers.get(event_name).map(|handler| handler.as_ref())
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ProjectionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
