use super::signature::{OutputKind, ParamKind, ShapeKind, Signature};
use crate::context::RequestContext;
use crate::shape::ShapeBuilder;
use crate::Record;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{type_name, TypeId};

type ContextFn<T> = Box<dyn Fn(&RequestContext) -> anyhow::Result<T> + Send + Sync>;
type RecordFn<R, T> = Box<dyn Fn(&RequestContext, R) -> anyhow::Result<T> + Send + Sync>;

/// A handler erased to one of the supported call shapes.
///
/// Built once at registration; invoking it involves no further inspection.
pub enum HandlerShape<R> {
    NoInput(ContextFn<()>),
    NoInputWithValue(ContextFn<Value>),
    RecordInput(RecordFn<R, ()>),
    RecordInputWithValue(RecordFn<R, Value>),
}

impl<R> HandlerShape<R> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            HandlerShape::NoInput(_) => ShapeKind::NoInput,
            HandlerShape::NoInputWithValue(_) => ShapeKind::NoInputWithValue,
            HandlerShape::RecordInput(_) => ShapeKind::RecordInput,
            HandlerShape::RecordInputWithValue(_) => ShapeKind::RecordInputWithValue,
        }
    }
}

/// Input type of handlers that take only the context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NoInput {}

impl Record for NoInput {
    fn describe(_shape: &mut ShapeBuilder<Self>) {}
}

/// Conversion of a typed function into a [`HandlerShape`].
///
/// Implemented for `Fn(&RequestContext) -> Result<V, E>` and
/// `Fn(&RequestContext, R) -> Result<V, E>`. A handler returning
/// `Result<(), E>` is outcome-only. `M` disambiguates the two arities.
pub trait IntoHandler<M>: Send + Sync + 'static {
    type Input: Record;

    fn signature() -> Signature;

    fn into_shape(self) -> HandlerShape<Self::Input>;
}

fn outcome_only<V: 'static>() -> bool {
    TypeId::of::<V>() == TypeId::of::<()>()
}

fn outputs<V: 'static>(signature: Signature) -> Signature {
    if outcome_only::<V>() {
        signature.output(OutputKind::Outcome)
    } else {
        signature
            .output(OutputKind::Value(type_name::<V>()))
            .output(OutputKind::Outcome)
    }
}

fn encode<V: Serialize>(value: V) -> anyhow::Result<Value> {
    serde_json::to_value(value)
        .with_context(|| format!("failed to encode {} returned by handler", type_name::<V>()))
}

impl<F, V, E> IntoHandler<(V, E)> for F
where
    F: Fn(&RequestContext) -> Result<V, E> + Send + Sync + 'static,
    V: Serialize + 'static,
    E: Into<anyhow::Error> + 'static,
{
    type Input = NoInput;

    fn signature() -> Signature {
        outputs::<V>(Signature::function(type_name::<F>()).input(ParamKind::Context))
    }

    fn into_shape(self) -> HandlerShape<NoInput> {
        if outcome_only::<V>() {
            HandlerShape::NoInput(Box::new(move |ctx: &RequestContext| {
                self(ctx).map(drop).map_err(Into::into)
            }))
        } else {
            HandlerShape::NoInputWithValue(Box::new(move |ctx: &RequestContext| {
                encode(self(ctx).map_err(Into::<anyhow::Error>::into)?)
            }))
        }
    }
}

impl<F, R, V, E> IntoHandler<(R, V, E)> for F
where
    F: Fn(&RequestContext, R) -> Result<V, E> + Send + Sync + 'static,
    R: Record,
    V: Serialize + 'static,
    E: Into<anyhow::Error> + 'static,
{
    type Input = R;

    fn signature() -> Signature {
        outputs::<V>(
            Signature::function(type_name::<F>())
                .input(ParamKind::Context)
                .input(ParamKind::Record(type_name::<R>())),
        )
    }

    fn into_shape(self) -> HandlerShape<R> {
        if outcome_only::<V>() {
            HandlerShape::RecordInput(Box::new(move |ctx: &RequestContext, record: R| {
                self(ctx, record).map(drop).map_err(Into::into)
            }))
        } else {
            HandlerShape::RecordInputWithValue(Box::new(move |ctx: &RequestContext, record: R| {
                encode(self(ctx, record).map_err(Into::<anyhow::Error>::into)?)
            }))
        }
    }
}
