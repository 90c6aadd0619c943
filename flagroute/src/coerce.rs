//! Default coercion.
//!
//! Turns a textual literal into a [`Value`] for a [`TypeDesc`], recursing into
//! list and map element types. Rules are tried in priority order: a type's own
//! parse hook, durations, date-times, then the structural kind.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::error::{Error, Result};
use crate::tag::Separators;
use crate::value::{insert_entry, Flag, Kind, TypeDesc, Value};

/// Layout of date-time literals, interpreted in local time.
pub const DATE_TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Coerce `text` into a value of the described type.
pub fn coerce(desc: &TypeDesc, text: &str, seps: &Separators) -> Result<Value> {
    if let Some(parse) = desc.parser {
        return parse(text).map_err(|source| Error::ParseHook {
            literal: text.to_string(),
            type_name: desc.name,
            source,
        });
    }

    match &desc.kind {
        Kind::Duration => parse_duration(text)
            .map(Value::Duration)
            .map_err(|reason| Error::malformed(text, desc.name, reason)),
        Kind::DateTime => parse_date_time(text)
            .map(Value::DateTime)
            .map_err(|reason| Error::malformed(text, desc.name, reason)),
        Kind::Int => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| Error::malformed(text, desc.name, e)),
        Kind::Uint => text
            .parse::<u64>()
            .map(Value::Uint)
            .map_err(|e| Error::malformed(text, desc.name, e)),
        Kind::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| Error::malformed(text, desc.name, e)),
        Kind::Bool => parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| Error::malformed(text, desc.name, "invalid syntax")),
        Kind::Str => Ok(Value::Str(text.to_string())),
        Kind::List(elem) => {
            let sep = if is_plain_map(elem) {
                seps.outer_list
            } else {
                seps.list
            };
            text.split(sep)
                .map(|item| coerce(elem, item.trim(), seps))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        Kind::Map(key, value) => {
            if !is_key_kind(key) {
                return Err(Error::UnsupportedType {
                    type_name: desc.name,
                });
            }
            let mut entries = Vec::new();
            for entry in text.split(seps.list) {
                let mut parts = entry.split(seps.key_value);
                let (Some(k), Some(v), None) = (parts.next(), parts.next(), parts.next()) else {
                    return Err(Error::MalformedKeyValue {
                        entry: entry.to_string(),
                    });
                };
                let k = coerce(key, k.trim(), seps)?;
                let v = coerce(value, v.trim(), seps)?;
                insert_entry(&mut entries, k, v);
            }
            Ok(Value::Map(entries))
        }
        Kind::Opaque => Err(Error::UnsupportedType {
            type_name: desc.name,
        }),
    }
}

/// Coerce `text` straight into `T`.
pub fn coerce_as<T: Flag>(text: &str, seps: &Separators) -> Result<T> {
    T::from_value(coerce(&T::describe(), text, seps)?)
}

fn is_plain_map(desc: &TypeDesc) -> bool {
    desc.parser.is_none() && matches!(desc.kind, Kind::Map(..))
}

fn is_key_kind(desc: &TypeDesc) -> bool {
    desc.parser.is_some()
        || matches!(
            desc.kind,
            Kind::Int | Kind::Uint | Kind::Bool | Kind::Str | Kind::Duration | Kind::DateTime
        )
}

/// Boolean literals in their canonical forms.
fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_date_time(text: &str) -> std::result::Result<DateTime<Local>, String> {
    let naive = NaiveDateTime::parse_from_str(text, DATE_TIME_LAYOUT).map_err(|e| e.to_string())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| "time does not exist in the local time zone".to_string())
}

/// Parse a duration literal such as `300ms`, `1.5h` or `2h45m`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let invalid = || format!("invalid duration {text:?}");

    let mut rest = text.strip_prefix('+').unwrap_or(text);
    if rest.starts_with('-') {
        return Err(format!("negative duration {text:?}"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_end);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(format!("missing unit in duration {text:?}")),
            other => return Err(format!("unknown unit {other:?} in duration {text:?}")),
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;
        if !frac.is_empty() {
            let frac: f64 = format!("0.{frac}").parse().map_err(|_| invalid())?;
            nanos += (frac * scale as f64).round() as u128;
        }
        total = total.checked_add(nanos).ok_or_else(invalid)?;
        rest = tail;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| invalid())
}
