//! Dynamic values and type descriptions.
//!
//! The coercion engine works on [`Value`] trees guided by a [`TypeDesc`]. The
//! [`Flag`] trait ties a Rust type to its description and converts a coerced
//! value back into that type.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::{BoxError, Error, Result};

/// Parse hook installed by [`ParseFlag`] types.
pub type ParseHook = fn(&str) -> std::result::Result<Value, BoxError>;

/// Structural kind of a field type.
#[derive(Debug, Clone)]
pub enum Kind {
    Int,
    Uint,
    Float,
    Bool,
    Str,
    Duration,
    DateTime,
    List(Box<TypeDesc>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
    /// No built-in rule; only usable with a parse hook.
    Opaque,
}

/// Description of a field type.
#[derive(Debug, Clone)]
pub struct TypeDesc {
    pub name: &'static str,
    pub kind: Kind,
    pub parser: Option<ParseHook>,
}

impl TypeDesc {
    pub fn new<T: ?Sized>(kind: Kind) -> Self {
        Self {
            name: type_name::<T>(),
            kind,
            parser: None,
        }
    }

    /// Description of a type that parses itself.
    pub fn custom<T: ParseFlag>() -> Self {
        Self {
            name: type_name::<T>(),
            kind: Kind::Opaque,
            parser: Some(parse_hook::<T>),
        }
    }

    /// List and map kinds collect repeated occurrences on the command line.
    pub fn is_collection(&self) -> bool {
        self.parser.is_none() && matches!(self.kind, Kind::List(_) | Kind::Map(..))
    }

    pub fn is_bool(&self) -> bool {
        self.parser.is_none() && matches!(self.kind, Kind::Bool)
    }

    pub fn is_numeric(&self) -> bool {
        self.parser.is_none() && matches!(self.kind, Kind::Int | Kind::Float)
    }

    /// Value placeholder shown in usage text.
    pub fn value_name(&self) -> &'static str {
        if self.parser.is_some() {
            return "VALUE";
        }
        match self.kind {
            Kind::Int => "INT",
            Kind::Uint => "UINT",
            Kind::Float => "FLOAT",
            Kind::Bool => "BOOL",
            Kind::Str => "STRING",
            Kind::Duration => "DURATION",
            Kind::DateTime => "TIME",
            Kind::List(_) => "LIST",
            Kind::Map(..) => "MAP",
            Kind::Opaque => "VALUE",
        }
    }
}

fn parse_hook<T: ParseFlag>(text: &str) -> std::result::Result<Value, BoxError> {
    T::parse_flag(text)
        .map(|v| Value::Custom {
            literal: text.to_string(),
            value: Box::new(v),
        })
        .map_err(Into::into)
}

/// A coerced value.
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Duration(Duration),
    DateTime(DateTime<Local>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Output of a parse hook, kept with the literal it was parsed from.
    Custom { literal: String, value: Box<dyn Any> },
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Uint(v) => write!(f, "Uint({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Duration(v) => write!(f, "Duration({v:?})"),
            Value::DateTime(v) => write!(f, "DateTime({v})"),
            Value::List(v) => f.debug_tuple("List").field(v).finish(),
            Value::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Value::Custom { literal, .. } => write!(f, "Custom({literal:?})"),
        }
    }
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Duration(_) => "duration",
            Value::DateTime(_) => "time",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Custom { .. } => "custom",
        }
    }

    /// Error for a value that does not fit the requested type.
    pub fn mismatch(&self, type_name: &'static str) -> Error {
        Error::malformed(
            format!("{self:?}"),
            type_name,
            format!("unexpected {} value", self.kind_name()),
        )
    }

    /// Key equality for map entries. Custom keys match on their literal;
    /// composite values never match.
    fn same_key(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Custom { literal: a, .. }, Value::Custom { literal: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Fold `other` into `self`: lists concatenate, maps merge entry by entry,
    /// scalars are replaced.
    pub fn merge(self, other: Value) -> Value {
        match (self, other) {
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Value::List(a)
            }
            (Value::Map(mut a), Value::Map(b)) => {
                for (key, value) in b {
                    insert_entry(&mut a, key, value);
                }
                Value::Map(a)
            }
            (_, other) => other,
        }
    }

    /// Take a custom value produced by a parse hook.
    pub fn downcast<T: 'static>(self) -> Result<T> {
        match self {
            Value::Custom { value, .. } => value
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|_| {
                    Error::malformed("<custom>", type_name::<T>(), "parse hook produced another type")
                }),
            other => Err(other.mismatch(type_name::<T>())),
        }
    }
}

/// Insert a map entry. A repeated key whose values are lists accumulates;
/// any other repeated key is overwritten.
pub(crate) fn insert_entry(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(k, _)| k.same_key(&key)) {
        Some((_, existing @ Value::List(_))) => {
            let current = std::mem::replace(existing, Value::List(Vec::new()));
            *existing = current.merge(value);
        }
        Some((_, existing)) => *existing = value,
        None => entries.push((key, value)),
    }
}

/// A type that can be bound to an option.
pub trait Flag: Sized + 'static {
    fn describe() -> TypeDesc;

    fn from_value(value: Value) -> Result<Self>;
}

/// A type that parses itself from a literal.
///
/// The parse hook takes precedence over every built-in coercion rule. Connect
/// a `ParseFlag` type to [`Flag`] with [`parse_flag!`](crate::parse_flag).
pub trait ParseFlag: Sized + 'static {
    type Err: Into<BoxError>;

    fn parse_flag(text: &str) -> std::result::Result<Self, Self::Err>;
}

/// Implement [`Flag`] for types implementing [`ParseFlag`].
///
/// ```ignore
/// struct Level(u8);
///
/// impl flagroute::ParseFlag for Level {
///     type Err = String;
///     fn parse_flag(text: &str) -> Result<Self, String> { /* ... */ }
/// }
///
/// flagroute::parse_flag!(Level);
/// ```
#[macro_export]
macro_rules! parse_flag {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Flag for $ty {
            fn describe() -> $crate::TypeDesc {
                $crate::TypeDesc::custom::<$ty>()
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                value.downcast::<$ty>()
            }
        }
    )+};
}

macro_rules! signed_flag {
    ($($ty:ty),*) => {$(
        impl Flag for $ty {
            fn describe() -> TypeDesc {
                TypeDesc::new::<$ty>(Kind::Int)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Int(n) => <$ty>::try_from(n)
                        .map_err(|e| Error::malformed(n.to_string(), type_name::<$ty>(), e)),
                    other => Err(other.mismatch(type_name::<$ty>())),
                }
            }
        }
    )*};
}

macro_rules! unsigned_flag {
    ($($ty:ty),*) => {$(
        impl Flag for $ty {
            fn describe() -> TypeDesc {
                TypeDesc::new::<$ty>(Kind::Uint)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Uint(n) => <$ty>::try_from(n)
                        .map_err(|e| Error::malformed(n.to_string(), type_name::<$ty>(), e)),
                    other => Err(other.mismatch(type_name::<$ty>())),
                }
            }
        }
    )*};
}

signed_flag!(i8, i16, i32, i64, isize);
unsigned_flag!(u8, u16, u32, u64, usize);

impl Flag for f64 {
    fn describe() -> TypeDesc {
        TypeDesc::new::<f64>(Kind::Float)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl Flag for f32 {
    fn describe() -> TypeDesc {
        TypeDesc::new::<f32>(Kind::Float)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => {
                let narrowed = v as f32;
                if v.is_finite() && !narrowed.is_finite() {
                    return Err(Error::malformed(v.to_string(), "f32", "value out of range"));
                }
                Ok(narrowed)
            }
            other => Err(other.mismatch("f32")),
        }
    }
}

impl Flag for bool {
    fn describe() -> TypeDesc {
        TypeDesc::new::<bool>(Kind::Bool)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl Flag for String {
    fn describe() -> TypeDesc {
        TypeDesc::new::<String>(Kind::Str)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(other.mismatch("String")),
        }
    }
}

impl Flag for PathBuf {
    fn describe() -> TypeDesc {
        TypeDesc::new::<PathBuf>(Kind::Str)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(v) => Ok(PathBuf::from(v)),
            other => Err(other.mismatch("PathBuf")),
        }
    }
}

impl Flag for Duration {
    fn describe() -> TypeDesc {
        TypeDesc::new::<Duration>(Kind::Duration)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Duration(v) => Ok(v),
            other => Err(other.mismatch("Duration")),
        }
    }
}

impl Flag for DateTime<Local> {
    fn describe() -> TypeDesc {
        TypeDesc::new::<DateTime<Local>>(Kind::DateTime)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            other => Err(other.mismatch("DateTime<Local>")),
        }
    }
}

impl<T: Flag> Flag for Vec<T> {
    fn describe() -> TypeDesc {
        TypeDesc::new::<Vec<T>>(Kind::List(Box::new(T::describe())))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other.mismatch(type_name::<Self>())),
        }
    }
}

impl<K, V> Flag for HashMap<K, V>
where
    K: Flag + Eq + Hash,
    V: Flag,
{
    fn describe() -> TypeDesc {
        TypeDesc::new::<HashMap<K, V>>(Kind::Map(
            Box::new(K::describe()),
            Box::new(V::describe()),
        ))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
                .collect(),
            other => Err(other.mismatch(type_name::<Self>())),
        }
    }
}

impl<K, V> Flag for BTreeMap<K, V>
where
    K: Flag + Ord,
    V: Flag,
{
    fn describe() -> TypeDesc {
        TypeDesc::new::<BTreeMap<K, V>>(Kind::Map(
            Box::new(K::describe()),
            Box::new(V::describe()),
        ))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
                .collect(),
            other => Err(other.mismatch(type_name::<Self>())),
        }
    }
}
