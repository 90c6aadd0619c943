//! The router: registration entry points and command execution.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::context::Context;
use crate::describe::CommandSpec;
use crate::engine::{FlagSet, NodeId, ParsedFields, ROOT};
use crate::error::{Error, Result};
use crate::resolve::{IntoHandler, IntoMiddleware};

/// Command-line router.
///
/// Handlers and middlewares are plain closures or functions. Their parameters
/// decide what they receive: the [`Context`], an options record (`T` for a
/// snapshot, [`Bound<T>`](crate::Bound) for the live instance) and, for
/// middlewares, a continuation ([`Next`](crate::Next) or
/// [`CtxNext`](crate::CtxNext)).
///
/// ```
/// use flagroute::{Bound, Context, Next, Options, Router};
///
/// #[derive(Debug, Default, Clone, Options)]
/// pub struct Greet {
///     #[flag(short = "n", long = "name", dft = "world", desc = "who to greet")]
///     pub name: String,
/// }
///
/// let mut router = Router::new("hello", "says hello");
/// router.middleware(|next: Next| next.run())?;
/// router.handle_group("greet", "greets someone", |_: Context, greet: Bound<Greet>| {
///     println!("hello {}", greet.borrow().name);
/// })?;
///
/// router.run(Context::background(), ["greet", "-n", "rust"])?;
/// # Ok::<(), flagroute::Error>(())
/// ```
pub struct Router {
    flags: FlagSet,
    cursor: NodeId,
}

impl Router {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            flags: FlagSet::new(name, description),
            cursor: ROOT,
        }
    }

    /// A router named after the running executable.
    pub fn cmdline(description: impl Into<String>) -> Self {
        let program = std::env::args_os().next().unwrap_or_default();
        Self::new(program_name(&program), description)
    }

    /// Add a middleware to the current scope.
    ///
    /// It runs for every command registered in this scope and below, in
    /// registration order.
    pub fn middleware<M, Args>(&mut self, middleware: M) -> Result<&mut Self>
    where
        M: IntoMiddleware<Args>,
    {
        let middleware = middleware.into_middleware(&mut self.flags.registry(self.cursor))?;
        self.flags.use_middleware(self.cursor, middleware);
        Ok(self)
    }

    /// Set the handler of the current command.
    pub fn handle<H, Args>(&mut self, handler: H) -> Result<&mut Self>
    where
        H: IntoHandler<Args>,
    {
        self.flags.ensure_handler_free(self.cursor)?;
        let handler = handler.into_handler(&mut self.flags.registry(self.cursor))?;
        self.flags.handle(self.cursor, handler)?;
        Ok(self)
    }

    /// Open the subcommand `name` and register its content in `build`.
    pub fn group<F>(&mut self, name: &str, description: &str, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Router) -> Result<()>,
    {
        let scope = self.flags.cmd(self.cursor, name, description);
        self.within(scope, build)
    }

    /// Open an anonymous scope: middlewares registered in `build` apply only to
    /// the commands and handler registered alongside them.
    pub fn stmt<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Router) -> Result<()>,
    {
        let scope = self.flags.stmt(self.cursor);
        self.within(scope, build)
    }

    /// Shorthand for a group holding only a handler.
    pub fn handle_group<H, Args>(
        &mut self,
        name: &str,
        description: &str,
        handler: H,
    ) -> Result<&mut Self>
    where
        H: IntoHandler<Args>,
    {
        self.group(name, description, |r| r.handle(handler).map(|_| ()))
    }

    fn within<F>(&mut self, scope: NodeId, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Router) -> Result<()>,
    {
        let saved = std::mem::replace(&mut self.cursor, scope);
        let result = build(self);
        self.cursor = saved;
        result.map(|()| self)
    }

    /// Parse `args` (without the program name) and run the selected command.
    pub fn run<I, S>(&self, ctx: Context, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags
            .run(ctx, args.into_iter().map(Into::into).collect())
    }

    /// Run with the process arguments.
    ///
    /// A help request prints the usage to stdout and succeeds.
    pub fn run_cmdline(&self, ctx: Context) -> Result<()> {
        match self.run(ctx, std::env::args().skip(1)) {
            Err(Error::Help { usage }) => {
                print!("{usage}");
                Ok(())
            }
            other => other,
        }
    }

    /// Whether `field`, a field of a bound options instance, was supplied on
    /// the command line during the last run.
    ///
    /// Fields are identified by address, so pass a field of the live instance
    /// (reached through [`Bound<T>`](crate::Bound)), not of a snapshot.
    pub fn parsed<F>(&self, field: &F) -> bool {
        self.flags.parsed(address_of(field))
    }

    /// Snapshot of the command tree and its options.
    pub fn describe(&self) -> CommandSpec {
        CommandSpec::from_flags(&self.flags, ROOT)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.flags.name(ROOT))
            .field("scope", &self.cursor)
            .finish()
    }
}

/// [`Router::parsed`] for code that only holds the run's context.
pub fn parsed<F>(ctx: &Context, field: &F) -> bool {
    ctx.value::<ParsedFields>()
        .is_some_and(|parsed| parsed.contains(address_of(field)))
}

fn address_of<F>(field: &F) -> usize {
    (field as *const F).cast::<()>() as usize
}

fn program_name(program: &OsString) -> String {
    Path::new(program)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}
