//! Serializable description of a router's command tree.
//!
//! Used for documentation and tooling: every command with its bound options,
//! and a JSON Schema of each command's options in the shape tool integrations
//! expect.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::{BoundOption, FlagSet, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    /// Command names from the root, space separated.
    pub path: String,
    pub description: String,
    pub has_handler: bool,
    pub options: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    pub description: String,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub required: bool,
    /// Declared Rust type of the field.
    #[serde(rename = "type")]
    pub type_name: String,
    pub value_name: String,
}

impl OptionSpec {
    fn from_bound(option: &BoundOption) -> Self {
        Self {
            field: option.field.to_string(),
            short: option.short,
            long: option.long.clone(),
            description: option.description.clone(),
            default_value: option.default_literal.clone(),
            required: option.is_required(),
            type_name: option.ty.name.to_string(),
            value_name: option.ty.value_name().to_string(),
        }
    }

    /// The name an option is addressed by in a schema: long, then short, then
    /// the field name.
    pub fn key(&self) -> String {
        match (&self.long, self.short) {
            (Some(long), _) => long.clone(),
            (None, Some(short)) => short.to_string(),
            (None, None) => self.field.clone(),
        }
    }
}

impl CommandSpec {
    pub(crate) fn from_flags(flags: &FlagSet, command: NodeId) -> Self {
        let options = flags.options(command);
        Self {
            name: flags.name(command).to_string(),
            path: flags.path_name(command),
            description: flags.description(command).to_string(),
            has_handler: flags.has_handler(command),
            options: options.iter().map(OptionSpec::from_bound).collect(),
            subcommands: flags
                .command_children(command)
                .into_iter()
                .map(|child| Self::from_flags(flags, child))
                .collect(),
        }
    }

    /// Depth-first lookup by path relative to this command.
    pub fn find(&self, path: &[&str]) -> Option<&CommandSpec> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .subcommands
                .iter()
                .find(|sub| sub.name == *head)
                .and_then(|sub| sub.find(rest)),
        }
    }

    /// Commands that can run, depth first.
    pub fn runnable(&self) -> Vec<&CommandSpec> {
        let mut found = Vec::new();
        if self.has_handler {
            found.push(self);
        }
        for sub in &self.subcommands {
            found.extend(sub.runnable());
        }
        found
    }

    /// JSON Schema object of this command's options.
    pub fn input_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for option in &self.options {
            let key = option.key();
            let mut property = json!({
                "type": json_type(&option.value_name),
                "description": option.description,
            });
            if let Some(default) = &option.default_value {
                property["default"] = json!(default);
            }
            if option.required {
                required.push(json!(key));
            }
            properties.insert(key, property);
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn json_type(value_name: &str) -> &'static str {
    match value_name {
        "INT" | "UINT" => "integer",
        "FLOAT" => "number",
        "BOOL" => "boolean",
        "LIST" => "array",
        "MAP" => "object",
        _ => "string",
    }
}
