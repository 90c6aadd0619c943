//! Signature resolution for handlers and middlewares.
//!
//! A callable's parameters each implement [`Param`], which reports the
//! parameter's kind. The kinds are classified into one of the supported
//! [`HandlerShape`]s or [`MiddlewareShape`]s before anything is bound; only an
//! accepted callable gets its options records bound and is wrapped into the
//! normalized [`Handler`] or [`Middleware`] form.
//!
//! Handlers take up to two parameters:
//!
//! | Parameters | Shape |
//! |---|---|
//! | none | [`HandlerShape::Plain`] |
//! | `Context` | [`HandlerShape::Context`] |
//! | `T` or `Bound<T>` | [`HandlerShape::Options`] |
//! | `Context`, `T` or `Bound<T>` | [`HandlerShape::ContextOptions`] |
//!
//! Middlewares take up to three:
//!
//! | Parameters | Shape |
//! |---|---|
//! | none | [`MiddlewareShape::Plain`] |
//! | `Context` | [`MiddlewareShape::Context`] |
//! | `T` or `Bound<T>` | [`MiddlewareShape::Options`] |
//! | `Next` | [`MiddlewareShape::Next`] |
//! | `Context`, `Next` or `CtxNext` | [`MiddlewareShape::ContextNext`] |
//! | `T` or `Bound<T>`, `Next` | [`MiddlewareShape::OptionsNext`] |
//! | `Context`, `T` or `Bound<T>` | [`MiddlewareShape::ContextOptions`] |
//! | `Context`, `T` or `Bound<T>`, `Next` or `CtxNext` | [`MiddlewareShape::ContextOptionsNext`] |
//!
//! Middlewares without a continuation parameter run the next step right after
//! they return.

use std::fmt;

use crate::chain::{Continuation, CtxNext, Handler, Middleware, Next};
use crate::context::Context;
use crate::engine::OptionRegistry;
use crate::error::{Error, Result};
use crate::options::{bind, Bound, Options};

/// What a callable parameter stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Context,
    /// An options record, received as a snapshot (`T`) or as the live
    /// instance (`Bound<T>`).
    Options {
        type_name: &'static str,
        by_ref: bool,
    },
    Next,
    CtxNext,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context => f.write_str("Context"),
            Self::Options {
                type_name,
                by_ref: false,
            } => f.write_str(type_name),
            Self::Options {
                type_name,
                by_ref: true,
            } => write!(f, "Bound<{type_name}>"),
            Self::Next => f.write_str("Next"),
            Self::CtxNext => f.write_str("CtxNext"),
        }
    }
}

/// Arguments available when a wrapper is invoked.
pub struct Call<'a> {
    pub ctx: &'a Context,
    pub rest: &'a Continuation,
}

/// A type that can appear as a handler or middleware parameter.
pub trait Param: Sized + 'static {
    /// State prepared once at registration.
    type State: 'static;

    fn kind() -> ParamKind;

    fn prepare(registry: &mut dyn OptionRegistry) -> Result<Self::State>;

    fn extract(state: &Self::State, call: &Call<'_>) -> Self;
}

impl Param for Context {
    type State = ();

    fn kind() -> ParamKind {
        ParamKind::Context
    }

    fn prepare(_: &mut dyn OptionRegistry) -> Result<()> {
        Ok(())
    }

    fn extract(_: &(), call: &Call<'_>) -> Self {
        call.ctx.clone()
    }
}

impl<T: Options + Clone> Param for T {
    type State = Bound<T>;

    fn kind() -> ParamKind {
        ParamKind::Options {
            type_name: std::any::type_name::<T>(),
            by_ref: false,
        }
    }

    fn prepare(registry: &mut dyn OptionRegistry) -> Result<Bound<T>> {
        bind::<T, _>(registry)
    }

    fn extract(state: &Bound<T>, _: &Call<'_>) -> Self {
        state.get()
    }
}

impl<T: Options> Param for Bound<T> {
    type State = Bound<T>;

    fn kind() -> ParamKind {
        ParamKind::Options {
            type_name: std::any::type_name::<T>(),
            by_ref: true,
        }
    }

    fn prepare(registry: &mut dyn OptionRegistry) -> Result<Bound<T>> {
        bind::<T, _>(registry)
    }

    fn extract(state: &Bound<T>, _: &Call<'_>) -> Self {
        state.clone()
    }
}

impl Param for Next {
    type State = ();

    fn kind() -> ParamKind {
        ParamKind::Next
    }

    fn prepare(_: &mut dyn OptionRegistry) -> Result<()> {
        Ok(())
    }

    fn extract(_: &(), call: &Call<'_>) -> Self {
        Next {
            rest: call.rest.clone(),
            ctx: call.ctx.clone(),
        }
    }
}

impl Param for CtxNext {
    type State = ();

    fn kind() -> ParamKind {
        ParamKind::CtxNext
    }

    fn prepare(_: &mut dyn OptionRegistry) -> Result<()> {
        Ok(())
    }

    fn extract(_: &(), call: &Call<'_>) -> Self {
        CtxNext {
            rest: call.rest.clone(),
        }
    }
}

/// Accepted handler forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    Plain,
    Context,
    Options,
    ContextOptions,
}

/// Accepted middleware forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewareShape {
    Plain,
    Context,
    Options,
    Next,
    /// `ctx_next` is set when the continuation takes a context.
    ContextNext { ctx_next: bool },
    OptionsNext,
    ContextOptions,
    ContextOptionsNext { ctx_next: bool },
}

impl MiddlewareShape {
    /// Whether the middleware decides itself when (and if) the chain goes on.
    pub fn controls_next(&self) -> bool {
        matches!(
            self,
            Self::Next
                | Self::ContextNext { .. }
                | Self::OptionsNext
                | Self::ContextOptionsNext { .. }
        )
    }
}

pub fn classify_handler(params: &[ParamKind]) -> Result<HandlerShape> {
    use ParamKind as K;

    let unsupported = |found: &ParamKind, position| Error::UnsupportedHandlerShape {
        found: found.to_string(),
        position,
    };
    match params {
        [] => Ok(HandlerShape::Plain),
        [K::Context] => Ok(HandlerShape::Context),
        [K::Options { .. }] => Ok(HandlerShape::Options),
        [other] => Err(unsupported(other, 0)),
        [K::Context, K::Options { .. }] => Ok(HandlerShape::ContextOptions),
        [K::Context, other] => Err(unsupported(other, 1)),
        [other, _] => Err(unsupported(other, 0)),
        _ => Err(Error::InvalidHandlerSignature {
            arity: params.len(),
        }),
    }
}

pub fn classify_middleware(params: &[ParamKind]) -> Result<MiddlewareShape> {
    use ParamKind as K;

    let invalid = |reason| Error::InvalidMiddlewareSignature {
        params: params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        reason,
    };
    match params {
        [] => Ok(MiddlewareShape::Plain),
        [K::Next] => Ok(MiddlewareShape::Next),
        [K::Context] => Ok(MiddlewareShape::Context),
        [K::Options { .. }] => Ok(MiddlewareShape::Options),
        [K::CtxNext] => Err(invalid("a context next func needs a context arg before it")),

        [K::Context, K::Next] => Ok(MiddlewareShape::ContextNext { ctx_next: false }),
        [K::Context, K::CtxNext] => Ok(MiddlewareShape::ContextNext { ctx_next: true }),
        [K::Context, K::Options { .. }] => Ok(MiddlewareShape::ContextOptions),
        [K::Context, _] => Err(invalid("second arg must be an options struct or a next func")),
        [K::Options { .. }, K::Next] => Ok(MiddlewareShape::OptionsNext),
        [K::Options { .. }, _] => Err(invalid("arg after an options struct must be a next func")),
        [_, _] => Err(invalid("first arg must be a context or an options struct")),

        [K::Context, K::Options { .. }, K::Next] => {
            Ok(MiddlewareShape::ContextOptionsNext { ctx_next: false })
        }
        [K::Context, K::Options { .. }, K::CtxNext] => {
            Ok(MiddlewareShape::ContextOptionsNext { ctx_next: true })
        }
        [K::Context, K::Options { .. }, _] => Err(invalid("third arg must be a next func")),
        [K::Context, _, _] => Err(invalid("second arg must be an options struct")),
        [_, _, _] => Err(invalid("first arg must be a context")),

        _ => Err(Error::TooManyMiddlewareArgs {
            arity: params.len(),
        }),
    }
}

/// A callable usable as a command handler.
pub trait IntoHandler<Args> {
    fn into_handler(self, registry: &mut dyn OptionRegistry) -> Result<Handler>;
}

/// A callable usable as a middleware.
pub trait IntoMiddleware<Args> {
    fn into_middleware(self, registry: &mut dyn OptionRegistry) -> Result<Middleware>;
}

macro_rules! impl_into_handler {
    ($($param:ident),*) => {
        impl<Func, $($param,)*> IntoHandler<($($param,)*)> for Func
        where
            Func: Fn($($param),*) + 'static,
            $($param: Param,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn into_handler(self, registry: &mut dyn OptionRegistry) -> Result<Handler> {
                let kinds: Vec<ParamKind> = vec![$(<$param as Param>::kind()),*];
                let shape = classify_handler(&kinds)?;
                let state = ($(<$param as Param>::prepare(registry)?,)*);
                tracing::debug!(?shape, "handler resolved");

                Ok(Handler::new(shape, move |ctx| {
                    let rest = Continuation::terminal();
                    let call = Call { ctx: &ctx, rest: &rest };
                    let ($($param,)*) = &state;
                    self($(<$param as Param>::extract($param, &call)),*)
                }))
            }
        }
    };
}

impl_into_handler!();
impl_into_handler!(A);
impl_into_handler!(A, B);
impl_into_handler!(A, B, C);

macro_rules! impl_into_middleware {
    ($($param:ident),*) => {
        impl<Func, $($param,)*> IntoMiddleware<($($param,)*)> for Func
        where
            Func: Fn($($param),*) + 'static,
            $($param: Param,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn into_middleware(self, registry: &mut dyn OptionRegistry) -> Result<Middleware> {
                let kinds: Vec<ParamKind> = vec![$(<$param as Param>::kind()),*];
                let shape = classify_middleware(&kinds)?;
                let state = ($(<$param as Param>::prepare(registry)?,)*);
                let then_next = !shape.controls_next();
                tracing::debug!(?shape, "middleware resolved");

                Ok(Middleware::new(shape, move |ctx, rest| {
                    {
                        let call = Call { ctx: &ctx, rest: &rest };
                        let ($($param,)*) = &state;
                        self($(<$param as Param>::extract($param, &call)),*);
                    }
                    if then_next {
                        rest.proceed(ctx);
                    }
                }))
            }
        }
    };
}

impl_into_middleware!();
impl_into_middleware!(A);
impl_into_middleware!(A, B);
impl_into_middleware!(A, B, C);
impl_into_middleware!(A, B, C, D);
