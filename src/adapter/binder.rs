use super::emitter::{JsonEmitter, ResponseEmitter};
use super::handler::{HandlerShape, IntoHandler};
use super::signature::ShapeKind;
use super::validator::{RecordRef, Validator};
use crate::bundle::SourceBundle;
use crate::config::BinderConfig;
use crate::context::RequestContext;
use crate::decode::decode;
use crate::defaults::apply_defaults;
use crate::error::{Failure, ShapeError};
use crate::shape::{FieldDescriptor, RecordShape};
use crate::Record;
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, trace, warn};

/// Lifecycle of one invocation.
///
/// `Unstarted → Decoded → DefaultsApplied → Validated → Invoked →
/// Succeeded | Failed`. Context-only handlers go straight to `Invoked`;
/// `Validated` is skipped when no validator is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Unstarted,
    Decoded,
    DefaultsApplied,
    Validated,
    Invoked,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    fn advance(&mut self, next: Phase) {
        trace!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }
}

struct Stages<'a> {
    validator: Option<&'a dyn Validator>,
    config: &'a BinderConfig,
}

/// A handler shape bound to its input record.
trait Invoke: Send + Sync {
    fn kind(&self) -> ShapeKind;

    fn record_type(&self) -> &'static str;

    fn descriptors(&self) -> &[FieldDescriptor];

    fn invoke(
        &self,
        ctx: &RequestContext,
        bundle: &SourceBundle,
        stages: &Stages<'_>,
        lifecycle: &mut Lifecycle,
    ) -> Result<Option<Value>, Failure>;
}

struct Pipeline<R> {
    handler: HandlerShape<R>,
    record: RecordShape<R>,
}

impl<R: Record> Pipeline<R> {
    fn prepare(
        &self,
        bundle: &SourceBundle,
        stages: &Stages<'_>,
        lifecycle: &mut Lifecycle,
    ) -> Result<R, Failure> {
        let mut record = decode(&self.record, bundle, stages.config).map_err(Failure::Decode)?;
        lifecycle.advance(Phase::Decoded);

        apply_defaults(&self.record, &mut record).map_err(Failure::Decode)?;
        lifecycle.advance(Phase::DefaultsApplied);

        if let Some(validator) = stages.validator {
            let view = RecordRef::new(&record, self.record.type_name(), self.record.descriptors());
            validator.validate(view).map_err(Failure::Validation)?;
            lifecycle.advance(Phase::Validated);
        }
        Ok(record)
    }
}

/// Run the business handler, turning a panic into a handler failure.
fn guarded<T>(ctx: &RequestContext, call: impl FnOnce() -> anyhow::Result<T>) -> Result<T, Failure> {
    let started = Instant::now();
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => {
            debug!(
                elapsed_us = started.elapsed().as_micros() as u64,
                ok = result.is_ok(),
                "handler returned"
            );
            result.map_err(Failure::Handler)
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(
                handler_name = %ctx.handler_name,
                panic_message = %message,
                "Handler panicked"
            );
            Err(Failure::Handler(anyhow::anyhow!("handler panicked: {message}")))
        }
    }
}

impl<R: Record> Invoke for Pipeline<R> {
    fn kind(&self) -> ShapeKind {
        self.handler.kind()
    }

    fn record_type(&self) -> &'static str {
        self.record.type_name()
    }

    fn descriptors(&self) -> &[FieldDescriptor] {
        self.record.descriptors()
    }

    fn invoke(
        &self,
        ctx: &RequestContext,
        bundle: &SourceBundle,
        stages: &Stages<'_>,
        lifecycle: &mut Lifecycle,
    ) -> Result<Option<Value>, Failure> {
        match &self.handler {
            HandlerShape::NoInput(call) => {
                lifecycle.advance(Phase::Invoked);
                guarded(ctx, || call(ctx)).map(|()| None)
            }
            HandlerShape::NoInputWithValue(call) => {
                lifecycle.advance(Phase::Invoked);
                guarded(ctx, || call(ctx)).map(Some)
            }
            HandlerShape::RecordInput(call) => {
                let record = self.prepare(bundle, stages, lifecycle)?;
                lifecycle.advance(Phase::Invoked);
                guarded(ctx, || call(ctx, record)).map(|()| None)
            }
            HandlerShape::RecordInputWithValue(call) => {
                let record = self.prepare(bundle, stages, lifecycle)?;
                lifecycle.advance(Phase::Invoked);
                guarded(ctx, || call(ctx, record)).map(Some)
            }
        }
    }
}

/// Builds [`BoundHandler`]s that share one validator, emitter and config.
///
/// Configuration is scoped to the binder; `Binder::new()` uses
/// [`JsonEmitter`], no validator and the default [`BinderConfig`].
pub struct Binder<E: ResponseEmitter = JsonEmitter> {
    validator: Option<Arc<dyn Validator>>,
    emitter: Arc<E>,
    config: Arc<BinderConfig>,
}

impl Binder<JsonEmitter> {
    pub fn new() -> Self {
        Binder {
            validator: None,
            emitter: Arc::new(JsonEmitter),
            config: Arc::new(BinderConfig::default()),
        }
    }
}

impl Default for Binder<JsonEmitter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResponseEmitter> Clone for Binder<E> {
    fn clone(&self) -> Self {
        Binder {
            validator: self.validator.as_ref().map(Arc::clone),
            emitter: Arc::clone(&self.emitter),
            config: Arc::clone(&self.config),
        }
    }
}

impl<E: ResponseEmitter> Binder<E> {
    pub fn with_emitter<T: ResponseEmitter>(self, emitter: T) -> Binder<T> {
        Binder {
            validator: self.validator,
            emitter: Arc::new(emitter),
            config: self.config,
        }
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_config(mut self, config: BinderConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Check a handler's shape, compile its record shape and bind both.
    ///
    /// All shape checks happen here; a handler that passes never fails for
    /// shape reasons at request time.
    ///
    /// # Errors
    ///
    /// Returns the [`ShapeError`] for the first rule the handler or its input
    /// record violates.
    pub fn adapt<H, M>(&self, handler: H) -> Result<BoundHandler<E>, ShapeError>
    where
        H: IntoHandler<M>,
    {
        let signature = H::signature();
        let kind = signature.classify().inspect_err(|e| {
            warn!(handler = signature.candidate(), error = %e, "Handler shape rejected");
        })?;
        let record = RecordShape::<H::Input>::build().inspect_err(|e| {
            warn!(handler = signature.candidate(), error = %e, "Record shape rejected");
        })?;
        let handler = handler.into_shape();
        debug_assert_eq!(handler.kind(), kind);

        info!(
            handler = signature.candidate(),
            kind = ?kind,
            fields = record.descriptors().len(),
            "Handler adapted"
        );

        Ok(BoundHandler {
            pipeline: Arc::new(Pipeline { handler, record }),
            validator: self.validator.as_ref().map(Arc::clone),
            emitter: Arc::clone(&self.emitter),
            config: Arc::clone(&self.config),
        })
    }
}

/// A handler ready to serve requests. Immutable and cheap to share.
pub struct BoundHandler<E: ResponseEmitter = JsonEmitter> {
    pipeline: Arc<dyn Invoke>,
    validator: Option<Arc<dyn Validator>>,
    emitter: Arc<E>,
    config: Arc<BinderConfig>,
}

impl<E: ResponseEmitter> BoundHandler<E> {
    pub fn kind(&self) -> ShapeKind {
        self.pipeline.kind()
    }

    /// Type name of the input record (`NoInput` for context-only handlers).
    pub fn record_type(&self) -> &'static str {
        self.pipeline.record_type()
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        self.pipeline.descriptors()
    }

    /// Decode, apply defaults, validate and invoke.
    ///
    /// The first failing step ends the invocation; later steps do not run.
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] of the step that failed.
    pub fn call(
        &self,
        ctx: &RequestContext,
        bundle: &SourceBundle,
    ) -> Result<Option<Value>, Failure> {
        let span = info_span!(
            "bind",
            handler = %ctx.handler_name,
            request_id = %ctx.request_id
        );
        let _enter = span.enter();

        let stages = Stages {
            validator: self.validator.as_deref(),
            config: &self.config,
        };
        let mut lifecycle = Lifecycle {
            phase: Phase::Unstarted,
        };
        let result = self.pipeline.invoke(ctx, bundle, &stages, &mut lifecycle);
        match &result {
            Ok(_) => lifecycle.advance(Phase::Succeeded),
            Err(failure @ (Failure::Decode(_) | Failure::Validation(_))) => {
                warn!(phase = ?failure.phase(), error = %failure, "Request rejected");
                lifecycle.advance(Phase::Failed);
            }
            Err(failure) => {
                info!(error = %failure, "Handler failed");
                lifecycle.advance(Phase::Failed);
            }
        }
        result
    }

    /// [`call`](Self::call), then hand the outcome to the emitter exactly once.
    pub fn handle(&self, ctx: &RequestContext, bundle: &SourceBundle) -> E::Response {
        match self.call(ctx, bundle) {
            Ok(value) => self.emitter.on_success(ctx, value),
            Err(failure) => self.emitter.on_failure(ctx, &failure),
        }
    }
}

impl<E: ResponseEmitter> Clone for BoundHandler<E> {
    fn clone(&self) -> Self {
        BoundHandler {
            pipeline: Arc::clone(&self.pipeline),
            validator: self.validator.as_ref().map(Arc::clone),
            emitter: Arc::clone(&self.emitter),
            config: Arc::clone(&self.config),
        }
    }
}

impl<E: ResponseEmitter> fmt::Debug for BoundHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("kind", &self.kind())
            .field("record_type", &self.record_type())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}
