//! Options records and the argument binder.
//!
//! An options record is a plain struct whose annotated fields become
//! command-line options. [`bind`] allocates one instance, coerces every
//! field's default and registers the fields with the flag engine, which then
//! writes parsed values straight into the instance.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::coerce::coerce;
use crate::engine::{BoundOption, OptionRegistry};
use crate::error::Result;
use crate::tag::{FieldTags, TagMeta};
use crate::value::{TypeDesc, Value};

/// A struct whose fields can be bound to command-line options.
///
/// Usually derived:
///
/// ```
/// use flagroute::Options;
///
/// #[derive(Default, Clone, Options)]
/// pub struct Serve {
///     #[flag(short = "p", long = "port", dft = "8080", desc = "port to listen on")]
///     pub port: u16,
///     #[flag(long = "tag", sep = "|")]
///     pub tags: Vec<String>,
/// }
///
/// let fields = Serve::fields();
/// assert_eq!(fields.len(), 2);
/// assert_eq!(fields[0].tags.long, Some("port"));
/// ```
pub trait Options: Default + 'static {
    /// Fields in declaration order.
    fn fields() -> Vec<Field<Self>>;
}

/// Descriptor of one options field.
pub struct Field<T> {
    pub name: &'static str,
    pub tags: FieldTags,
    /// `None` for fields that are not public or carry no `#[flag]` attribute.
    pub access: Option<Access<T>>,
}

impl<T> Field<T> {
    pub fn bound(name: &'static str, tags: FieldTags, access: Access<T>) -> Self {
        Self {
            name,
            tags,
            access: Some(access),
        }
    }

    pub fn inert(name: &'static str) -> Self {
        Self {
            name,
            tags: FieldTags::default(),
            access: None,
        }
    }
}

/// Typed accessors for one field, generated per field type.
pub struct Access<T> {
    pub describe: fn() -> TypeDesc,
    pub assign: fn(&mut T, Value) -> Result<()>,
    pub address: fn(&T) -> *const (),
}

/// The live, address-stable instance of an options record.
///
/// Handlers taking `Bound<T>` see the same instance the flag engine writes to;
/// handlers taking `T` receive a clone of its current state.
pub struct Bound<T>(Rc<RefCell<T>>);

impl<T> Bound<T> {
    fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }
}

impl<T: Clone> Bound<T> {
    /// Snapshot of the current values.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Bound<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Bound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Bound").field(&self.0.borrow()).finish()
    }
}

/// Allocate an instance of `T` and register its annotated fields.
///
/// Fields are processed in declaration order. Unexported fields and fields
/// with neither a short nor a long identifier are skipped. The first failing
/// field aborts the call before anything is registered.
pub fn bind<T, R>(registry: &mut R) -> Result<Bound<T>>
where
    T: Options,
    R: OptionRegistry + ?Sized,
{
    let bound = Bound::new(T::default());
    let mut staged = Vec::new();

    for field in T::fields() {
        let Some(access) = field.access else {
            tracing::trace!(field = field.name, "skipping field without flag access");
            continue;
        };
        let meta = TagMeta::parse(&field.tags).map_err(|e| e.in_field(field.name))?;
        if meta.is_inert() {
            tracing::trace!(field = field.name, "skipping field without identifiers");
            continue;
        }

        let ty = (access.describe)();
        if let Some(text) = meta.default.text() {
            let value = coerce(&ty, text, &meta.separators).map_err(|e| e.in_field(field.name))?;
            (access.assign)(&mut bound.borrow_mut(), value).map_err(|e| e.in_field(field.name))?;
        }

        let address = (access.address)(&bound.borrow()) as usize;
        let target = bound.clone();
        let assign = access.assign;
        tracing::debug!(
            field = field.name,
            flag = %meta.display_name(),
            ty = ty.name,
            "binding option"
        );

        staged.push(BoundOption {
            field: field.name,
            short: meta.short,
            long: meta.long,
            description: meta.description,
            default_literal: meta.default.text().map(str::to_string),
            zero_default: meta.default.zero_default(),
            separators: meta.separators,
            ty,
            address,
            setter: Rc::new(move |value| assign(&mut target.borrow_mut(), value)),
        });
    }

    registry.register(staged)?;
    Ok(bound)
}
