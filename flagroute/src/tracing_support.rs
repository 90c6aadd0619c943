//! Tracing subscriber setup.
//!
//! The router emits `tracing` events while resolving callables (`debug`),
//! binding options (`debug`/`trace`) and running commands (`debug`). These
//! helpers install a `tracing-subscriber` registry for binaries that have no
//! subscriber of their own.

#[cfg(feature = "tracing")]
pub use tracing::{self, debug, error, info, instrument, trace, warn};

#[cfg(feature = "tracing")]
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, util::TryInitError,
    EnvFilter, Layer,
};

/// Output format of the fmt layer.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    Pretty,
    Compact,
    Json,
}

/// Subscriber configuration.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level filter. `None` reads `RUST_LOG`, falling back to `info`.
    pub level: Option<tracing::Level>,
    pub format: TracingFormat,
    pub timestamps: bool,
    pub target: bool,
    pub thread_ids: bool,
}

#[cfg(feature = "tracing")]
impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: false,
            target: true,
            thread_ids: false,
        }
    }
}

#[cfg(feature = "tracing")]
impl TracingConfig {
    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }

    fn layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        let base = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.target)
            .with_thread_ids(self.thread_ids);
        match (self.format, self.timestamps) {
            (TracingFormat::Pretty, true) => base.pretty().boxed(),
            (TracingFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (TracingFormat::Compact, true) => base.compact().boxed(),
            (TracingFormat::Compact, false) => base.compact().without_time().boxed(),
            (TracingFormat::Json, true) => base.json().boxed(),
            (TracingFormat::Json, false) => base.json().without_time().boxed(),
        }
    }
}

/// Install a compact stderr subscriber filtered by `RUST_LOG`.
///
/// ```ignore
/// fn main() {
///     flagroute::init_subscriber();
///
///     let mut router = flagroute::Router::cmdline("my tool");
///     // ...
/// }
/// ```
///
/// Panics if a global subscriber is already installed.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    init_subscriber_with_config(TracingConfig::default());
}

/// Install a subscriber built from `config`.
///
/// ```ignore
/// use flagroute::{init_subscriber_with_config, TracingConfig, TracingFormat};
///
/// init_subscriber_with_config(TracingConfig {
///     level: Some(flagroute::tracing::Level::DEBUG),
///     format: TracingFormat::Json,
///     ..Default::default()
/// });
/// ```
#[cfg(feature = "tracing")]
pub fn init_subscriber_with_config(config: TracingConfig) {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(config.layer())
        .init();
}

/// Like [`init_subscriber_with_config`], but reports an already installed
/// subscriber instead of panicking.
#[cfg(feature = "tracing")]
pub fn try_init_subscriber(config: TracingConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(config.layer())
        .try_init()
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}
