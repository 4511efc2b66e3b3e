//! Named handler registry.
//!
//! Handlers are adapted when registered, so shape errors surface at startup.
//! After registration the registry is read-only and can be shared across
//! request threads behind an `Arc`.

use crate::adapter::{Binder, BoundHandler, IntoHandler, JsonEmitter, ResponseEmitter};
use crate::bundle::SourceBundle;
use crate::context::RequestContext;
use crate::error::ShapeError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum RegistrationError {
    /// The handler or its input record has an unsupported shape.
    Shape { name: String, source: ShapeError },
    /// A handler is already registered under this name.
    Duplicate(String),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::Shape { name, source } => {
                write!(f, "cannot register handler '{name}': {source}")
            }
            RegistrationError::Duplicate(name) => {
                write!(f, "handler '{name}' is already registered")
            }
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistrationError::Shape { source, .. } => Some(source),
            RegistrationError::Duplicate(_) => None,
        }
    }
}

/// Handlers by name, all adapted with the same [`Binder`].
pub struct Registry<E: ResponseEmitter = JsonEmitter> {
    binder: Binder<E>,
    handlers: HashMap<String, Arc<BoundHandler<E>>>,
}

impl Registry<JsonEmitter> {
    pub fn new() -> Self {
        Self::with_binder(Binder::new())
    }
}

impl Default for Registry<JsonEmitter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResponseEmitter> Registry<E> {
    pub fn with_binder(binder: Binder<E>) -> Self {
        Registry {
            binder,
            handlers: HashMap::new(),
        }
    }

    /// Adapt `handler` and store it under `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the handler's shape is rejected. Nothing
    /// is stored on failure.
    pub fn register<H, M>(&mut self, name: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: IntoHandler<M>,
    {
        if self.handlers.contains_key(name) {
            warn!(handler_name = %name, "Duplicate handler registration rejected");
            return Err(RegistrationError::Duplicate(name.to_string()));
        }
        let bound = self
            .binder
            .adapt(handler)
            .map_err(|source| RegistrationError::Shape {
                name: name.to_string(),
                source,
            })?;

        info!(
            handler_name = %name,
            kind = ?bound.kind(),
            total_handlers = self.handlers.len() + 1,
            "Handler registered successfully"
        );
        self.handlers.insert(name.to_string(), Arc::new(bound));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<BoundHandler<E>>> {
        self.handlers.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler registered under `name`. `None` if there is none.
    pub fn dispatch(
        &self,
        name: &str,
        ctx: &RequestContext,
        bundle: &SourceBundle,
    ) -> Option<E::Response> {
        match self.handlers.get(name) {
            Some(handler) => Some(handler.handle(ctx, bundle)),
            None => {
                debug!(handler_name = %name, request_id = %ctx.request_id, "No handler registered");
                None
            }
        }
    }
}

impl<E: ResponseEmitter> fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.names())
            .finish()
    }
}
