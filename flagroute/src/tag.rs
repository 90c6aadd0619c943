//! Field annotation metadata.
//!
//! Each options field carries raw annotation strings (`short`, `long`, `dft`,
//! `desc`, `sep`) taken verbatim from its `#[flag(...)]` attribute. They are
//! validated here, once, when the field is bound.

/// Default separator between list elements and between map entries.
pub const LIST_SEPARATOR: char = ',';

/// Default separator between a map key and its value.
pub const KEY_VALUE_SEPARATOR: char = ':';

/// Default separator between the maps of a list-of-maps.
pub const OUTER_LIST_SEPARATOR: char = ';';

/// Raw annotation strings of one field, as written in `#[flag(...)]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub short: Option<&'static str>,
    pub long: Option<&'static str>,
    pub dft: Option<&'static str>,
    pub desc: Option<&'static str>,
    pub sep: Option<&'static str>,
}

/// Separators used to split composite literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub list: char,
    pub key_value: char,
    pub outer_list: char,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            list: LIST_SEPARATOR,
            key_value: KEY_VALUE_SEPARATOR,
            outer_list: OUTER_LIST_SEPARATOR,
        }
    }
}

impl Separators {
    /// Apply per-field overrides: list, key/value and outer-list separator, in
    /// that order. Characters past the third are ignored.
    pub fn with_overrides(overrides: &str) -> Self {
        let mut seps = Self::default();
        let mut chars = overrides.trim().chars();
        if let Some(c) = chars.next() {
            seps.list = c;
        }
        if let Some(c) = chars.next() {
            seps.key_value = c;
        }
        if let Some(c) = chars.next() {
            seps.outer_list = c;
        }
        seps
    }
}

/// State of the `dft` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultLiteral {
    /// No `dft` annotation: the field stays unset until parsed.
    Absent,
    /// `dft = ""`: the type's zero value is the explicit default.
    Empty,
    /// A literal to coerce into the field's type.
    Text(String),
}

impl DefaultLiteral {
    /// Whether the zero value counts as an explicit default.
    pub fn zero_default(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Validated metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMeta {
    pub short: Option<char>,
    pub long: Option<String>,
    pub default: DefaultLiteral,
    pub description: String,
    pub separators: Separators,
}

impl TagMeta {
    pub fn parse(tags: &FieldTags) -> crate::Result<Self> {
        let short = match tags.short.filter(|s| !s.is_empty()) {
            None => None,
            Some(tag) => {
                let mut chars = tag.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => {
                        return Err(crate::Error::InvalidShortTag {
                            tag: tag.to_string(),
                        })
                    }
                }
            }
        };

        let long = tags
            .long
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        let separators = tags
            .sep
            .map(Separators::with_overrides)
            .unwrap_or_default();

        let default = match tags.dft {
            None => DefaultLiteral::Absent,
            Some("") => DefaultLiteral::Empty,
            Some(text) => DefaultLiteral::Text(text.to_string()),
        };

        Ok(Self {
            short,
            long,
            default,
            description: tags.desc.unwrap_or_default().to_string(),
            separators,
        })
    }

    /// A field without short and long identifiers is never bound.
    pub fn is_inert(&self) -> bool {
        self.short.is_none() && self.long.is_none()
    }

    /// `-s/--long`, `-s` or `--long`, for messages.
    pub fn display_name(&self) -> String {
        match (self.short, &self.long) {
            (Some(s), Some(l)) => format!("-{s}/--{l}"),
            (Some(s), None) => format!("-{s}"),
            (None, Some(l)) => format!("--{l}"),
            (None, None) => String::new(),
        }
    }
}
