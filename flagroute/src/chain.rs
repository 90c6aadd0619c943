//! Execution chain composition.
//!
//! Middlewares run in registration order. Each receives a continuation that
//! enters the next middleware, and the last one's continuation enters the
//! handler. A middleware that never calls its continuation stops the chain.

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::resolve::{HandlerShape, MiddlewareShape};

/// Normalized handler: `(context) -> ()`.
#[derive(Clone)]
pub struct Handler {
    shape: HandlerShape,
    call: Rc<dyn Fn(Context)>,
}

impl Handler {
    pub(crate) fn new(shape: HandlerShape, call: impl Fn(Context) + 'static) -> Self {
        Self {
            shape,
            call: Rc::new(call),
        }
    }

    pub fn shape(&self) -> HandlerShape {
        self.shape
    }

    pub fn call(&self, ctx: Context) {
        (self.call)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("shape", &self.shape).finish()
    }
}

/// Normalized middleware: `(context, continuation) -> ()`.
#[derive(Clone)]
pub struct Middleware {
    shape: MiddlewareShape,
    call: Rc<dyn Fn(Context, Continuation)>,
}

impl Middleware {
    pub(crate) fn new(
        shape: MiddlewareShape,
        call: impl Fn(Context, Continuation) + 'static,
    ) -> Self {
        Self {
            shape,
            call: Rc::new(call),
        }
    }

    pub fn shape(&self) -> MiddlewareShape {
        self.shape
    }

    pub fn call(&self, ctx: Context, next: Continuation) {
        (self.call)(ctx, next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("shape", &self.shape).finish()
    }
}

/// Middlewares in execution order followed by one handler.
#[derive(Clone)]
pub struct Chain {
    middlewares: Rc<[Middleware]>,
    handler: Handler,
}

impl Chain {
    pub fn new(middlewares: Vec<Middleware>, handler: Handler) -> Self {
        Self {
            middlewares: middlewares.into(),
            handler,
        }
    }

    pub fn run(&self, ctx: Context) {
        self.run_from(0, ctx);
    }

    fn run_from(&self, position: usize, ctx: Context) {
        match self.middlewares.get(position) {
            Some(middleware) => middleware.call(
                ctx,
                Continuation {
                    rest: Some((self.clone(), position + 1)),
                },
            ),
            None => self.handler.call(ctx),
        }
    }
}

/// The remainder of a chain, entered with a context.
///
/// Calling it more than once runs the remainder again.
#[derive(Clone)]
pub struct Continuation {
    rest: Option<(Chain, usize)>,
}

impl Continuation {
    /// A continuation that does nothing.
    pub fn terminal() -> Self {
        Self { rest: None }
    }

    pub fn proceed(&self, ctx: Context) {
        if let Some((chain, position)) = &self.rest {
            chain.run_from(*position, ctx);
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rest {
            Some((_, position)) => write!(f, "Continuation({position})"),
            None => f.write_str("Continuation(terminal)"),
        }
    }
}

/// Zero-argument continuation; passes on the context the middleware received.
#[derive(Debug, Clone)]
pub struct Next {
    pub(crate) rest: Continuation,
    pub(crate) ctx: Context,
}

impl Next {
    pub fn run(&self) {
        self.rest.proceed(self.ctx.clone());
    }
}

/// Context-accepting continuation; downstream sees the context given to `run`.
#[derive(Debug, Clone)]
pub struct CtxNext {
    pub(crate) rest: Continuation,
}

impl CtxNext {
    pub fn run(&self, ctx: Context) {
        self.rest.proceed(ctx);
    }
}
