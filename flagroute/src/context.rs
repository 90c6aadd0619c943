//! Execution context threaded through middlewares and handlers.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Immutable carrier of request-scoped values and cancellation.
///
/// Deriving a context never changes the receiver: [`with_value`](Self::with_value)
/// returns a new context that shares everything set before it. Values are keyed
/// by type, so wrap plain types in a newtype to give them a distinct key.
///
/// ```
/// use flagroute::Context;
///
/// struct RequestId(u32);
///
/// let root = Context::background();
/// let ctx = root.with_value(RequestId(7));
///
/// assert_eq!(ctx.value::<RequestId>().map(|r| r.0), Some(7));
/// assert!(root.value::<RequestId>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Context {
    values: Option<Arc<Entry>>,
    cancel: CancellationToken,
}

struct Entry {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

impl Context {
    /// An empty, never-cancelled root context.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context carrying `value`, shadowing any earlier value of the
    /// same type.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            values: Some(Arc::new(Entry {
                key: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.values.clone(),
            })),
            cancel: self.cancel.clone(),
        }
    }

    /// The most recently set value of type `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let mut entry = self.values.as_deref();
        while let Some(e) = entry {
            if e.key == TypeId::of::<T>() {
                return e.value.downcast_ref::<T>();
            }
            entry = e.parent.as_deref();
        }
        None
    }

    /// Derive a context with its own cancellation token, cancelled together
    /// with this one.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.cancel.child_token();
        let ctx = Self {
            values: self.values.clone(),
            cancel: token.clone(),
        };
        (ctx, token)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut entry = self.values.as_deref();
        while let Some(e) = entry {
            depth += 1;
            entry = e.parent.as_deref();
        }
        f.debug_struct("Context")
            .field("values", &depth)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
