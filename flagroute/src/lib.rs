//! # flagroute: function routing for command-line programs
//!
//! Register plain functions and closures as command handlers and middlewares.
//! Their parameter lists are inspected at registration and options records
//! declared with `#[derive(Options)]` are bound to command-line flags.
//!
//! ## Core Principles
//!
//! - **Shape-driven calls**: a callable's parameters (context, options record,
//!   continuation) decide how it is invoked
//! - **Annotated options**: `#[flag(short, long, dft, desc, sep)]` turns struct
//!   fields into flags with typed defaults
//! - **Composable middlewares**: registration order, explicit continuations,
//!   group and statement scoping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flagroute::{Bound, Context, CtxNext, Options, Router};
//! use std::time::Duration;
//!
//! #[derive(Debug, Default, Clone, Options)]
//! pub struct Global {
//!     #[flag(short = "v", long = "verbose", desc = "log more")]
//!     pub verbose: bool,
//! }
//!
//! #[derive(Debug, Default, Clone, Options)]
//! pub struct Fetch {
//!     #[flag(short = "u", long = "url", desc = "address to fetch")]
//!     pub url: String,
//!     #[flag(short = "t", long = "timeout", dft = "30s")]
//!     pub timeout: Duration,
//!     #[flag(long = "header", dft = "accept:*/*")]
//!     pub headers: Vec<String>,
//! }
//!
//! struct Verbose(bool);
//!
//! fn main() -> flagroute::Result<()> {
//!     let mut router = Router::cmdline("fetches things");
//!
//!     router.middleware(|ctx: Context, global: Global, next: CtxNext| {
//!         next.run(ctx.with_value(Verbose(global.verbose)));
//!     })?;
//!
//!     router.handle_group("fetch", "fetch one url", |ctx: Context, fetch: Bound<Fetch>| {
//!         let fetch = fetch.borrow();
//!         if ctx.value::<Verbose>().is_some_and(|v| v.0) {
//!             eprintln!("fetching {} (timeout {:?})", fetch.url, fetch.timeout);
//!         }
//!     })?;
//!
//!     router.run_cmdline(Context::background())
//! }
//! ```

extern crate self as flagroute;

// Re-export the derive macro
pub use flagroute_macros::Options;

pub mod chain;
pub mod coerce;
pub mod context;
pub mod describe;
pub mod engine;
pub mod error;
pub mod options;
pub mod resolve;
pub mod router;
pub mod tag;
pub mod tracing_support;
pub mod value;

// Re-export tracing itself (required for #[instrument] macro)
#[cfg(feature = "tracing")]
pub use tracing_support::tracing;

#[cfg(feature = "tracing")]
pub use tracing_support::{
    init_subscriber, init_subscriber_with_config, try_init_subscriber, TracingConfig,
    TracingFormat,
};

pub use chain::{CtxNext, Handler, Middleware, Next};
pub use coerce::{coerce, coerce_as, parse_duration};
pub use context::Context;
pub use describe::{CommandSpec, OptionSpec};
pub use error::{BoxError, Error, Result};
pub use options::{bind, Access, Bound, Field};
pub use resolve::{HandlerShape, IntoHandler, IntoMiddleware, MiddlewareShape, Param, ParamKind};
pub use router::{parsed, Router};
pub use tag::{FieldTags, Separators, KEY_VALUE_SEPARATOR, LIST_SEPARATOR, OUTER_LIST_SEPARATOR};
pub use value::{Flag, Kind, ParseFlag, TypeDesc, Value};

// Trait and derive macro share the name.
#[doc(no_inline)]
pub use options::Options;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, Options)]
    pub struct Serve {
        #[flag(short = "p", long = "port", dft = "8080", desc = "port to listen on")]
        pub port: u16,
        #[flag(long = "host", desc = "interface to bind")]
        pub host: String,
        pub scratch: String,
    }

    #[test]
    fn test_describe_reports_bound_options() {
        let mut router = Router::new("app", "the app");
        router.handle_group("serve", "run the server", |_: Serve| {}).unwrap();

        let spec = router.describe();
        assert!(!spec.has_handler);
        let serve = spec.find(&["serve"]).unwrap();
        assert_eq!(serve.path, "app serve");
        assert!(serve.has_handler);

        let keys: Vec<_> = serve.options.iter().map(OptionSpec::key).collect();
        assert_eq!(keys, vec!["port", "host"]);
        assert_eq!(serve.options[0].default_value.as_deref(), Some("8080"));
        assert!(!serve.options[0].required);
        assert!(serve.options[1].required);

        let schema = serve.input_schema();
        assert_eq!(schema["properties"]["port"]["type"], "integer");
        assert_eq!(schema["required"][0], "host");
    }
}
