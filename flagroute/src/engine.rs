//! Flag engine.
//!
//! Owns the command tree, the bound options of every command, argument parsing
//! and usage rendering. Parsing and help output are delegated to `clap`: each
//! run builds a `clap::Command` tree from the registered scopes, parses the
//! tokens, writes supplied values through the bound options' setters and then
//! runs the composed chain of the selected command.

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use parking_lot::Mutex;

use crate::chain::{Chain, Handler, Middleware};
use crate::coerce::coerce;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::tag::Separators;
use crate::value::{TypeDesc, Value};

/// Identifier of a scope in the command tree.
pub type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

/// One options field handed to the engine by the binder.
pub struct BoundOption {
    pub field: &'static str,
    pub short: Option<char>,
    pub long: Option<String>,
    pub description: String,
    /// The `dft` literal, shown in usage text. The coerced value has already
    /// been written into the field.
    pub default_literal: Option<String>,
    /// Whether the zero value counts as an explicit default.
    pub zero_default: bool,
    pub separators: Separators,
    pub ty: TypeDesc,
    /// Address of the field inside its bound instance.
    pub address: usize,
    pub setter: Rc<dyn Fn(Value) -> Result<()>>,
}

impl BoundOption {
    /// Options without a default must be supplied, except switches.
    pub fn is_required(&self) -> bool {
        !self.zero_default && !self.ty.is_bool()
    }

    pub fn display_name(&self) -> String {
        match (self.short, &self.long) {
            (Some(s), Some(l)) => format!("-{s}/--{l}"),
            (Some(s), None) => format!("-{s}"),
            (None, Some(l)) => format!("--{l}"),
            (None, None) => self.field.to_string(),
        }
    }

    fn to_arg(&self, index: usize) -> Arg {
        let mut arg = Arg::new(option_id(index))
            .value_name(self.ty.value_name())
            .value_parser(value_parser!(String));
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if let Some(long) = &self.long {
            arg = arg.long(long.clone());
        }

        let mut help = self.description.clone();
        if let Some(default) = &self.default_literal {
            if !help.is_empty() {
                help.push(' ');
            }
            help.push_str(&format!("[default: {default}]"));
        }
        arg = arg.help(help);

        arg = if self.ty.is_bool() {
            arg.action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
        } else if self.ty.is_collection() {
            arg.action(ArgAction::Append)
        } else {
            arg.action(ArgAction::Set)
        };
        if self.ty.is_numeric() {
            arg = arg.allow_negative_numbers(true);
        }
        arg.required(self.is_required())
    }
}

fn option_id(index: usize) -> String {
    format!("opt-{index}")
}

/// Registration call of the engine: stores bound options for parsing and
/// usage rendering.
pub trait OptionRegistry {
    /// Register a batch of options. Either every option is stored or none is.
    fn register(&mut self, options: Vec<BoundOption>) -> Result<()>;
}

/// Addresses of the fields supplied on the command line during the last run.
#[derive(Clone, Default)]
pub struct ParsedFields(Arc<Mutex<HashSet<usize>>>);

impl ParsedFields {
    pub fn contains(&self, address: usize) -> bool {
        self.0.lock().contains(&address)
    }

    fn insert(&self, address: usize) {
        self.0.lock().insert(address);
    }

    fn clear(&self) {
        self.0.lock().clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Command,
    Stmt,
}

struct Node {
    kind: NodeKind,
    name: String,
    description: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    options: Vec<BoundOption>,
    middlewares: Vec<Middleware>,
    handler: Option<Handler>,
}

impl Node {
    fn new(kind: NodeKind, name: String, description: String, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            description,
            parent,
            children: Vec::new(),
            options: Vec::new(),
            middlewares: Vec::new(),
            handler: None,
        }
    }
}

/// The command tree with its scopes, options, middlewares and handlers.
pub struct FlagSet {
    nodes: Vec<Node>,
    parsed: ParsedFields,
}

impl FlagSet {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(
                NodeKind::Command,
                name.into(),
                description.into(),
                None,
            )],
            parsed: ParsedFields::default(),
        }
    }

    /// Open (or reopen) the subcommand `name` below `parent`.
    pub fn cmd(&mut self, parent: NodeId, name: &str, description: &str) -> NodeId {
        let owner = self.command_of(parent);
        if let Some(existing) = self
            .command_children(owner)
            .into_iter()
            .find(|&id| self.nodes[id].name == name)
        {
            if self.nodes[existing].description.is_empty() {
                self.nodes[existing].description = description.to_string();
            }
            return existing;
        }
        self.push(Node::new(
            NodeKind::Command,
            name.to_string(),
            description.to_string(),
            Some(parent),
        ))
    }

    /// Open an anonymous statement scope below `parent`.
    pub fn stmt(&mut self, parent: NodeId) -> NodeId {
        self.push(Node::new(
            NodeKind::Stmt,
            String::new(),
            String::new(),
            Some(parent),
        ))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        if let Some(parent) = node.parent {
            self.nodes[parent].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    pub fn use_middleware(&mut self, scope: NodeId, middleware: Middleware) {
        self.nodes[scope].middlewares.push(middleware);
    }

    pub fn handle(&mut self, scope: NodeId, handler: Handler) -> Result<()> {
        self.ensure_handler_free(scope)?;
        self.nodes[scope].handler = Some(handler);
        Ok(())
    }

    /// Fails with `DuplicateHandler` if the command enclosing `scope` already
    /// has a handler.
    pub fn ensure_handler_free(&self, scope: NodeId) -> Result<()> {
        let owner = self.command_of(scope);
        match self.handler_node(owner) {
            Some(_) => Err(Error::DuplicateHandler {
                command: self.path_name(owner),
            }),
            None => Ok(()),
        }
    }

    /// Option registry for `scope`; options land in its enclosing command.
    pub fn registry(&mut self, scope: NodeId) -> Scope<'_> {
        let command = self.command_of(scope);
        Scope {
            flags: self,
            command,
        }
    }

    /// Whether the field at `address` was supplied during the last run.
    pub fn parsed(&self, address: usize) -> bool {
        self.parsed.contains(address)
    }

    /// Nearest enclosing command of a scope.
    pub(crate) fn command_of(&self, mut id: NodeId) -> NodeId {
        while self.nodes[id].kind == NodeKind::Stmt {
            match self.nodes[id].parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        id
    }

    /// Subcommands of a command, looking through statement scopes.
    pub(crate) fn command_children(&self, command: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending: Vec<NodeId> = self.nodes[command].children.iter().rev().copied().collect();
        while let Some(id) = pending.pop() {
            match self.nodes[id].kind {
                NodeKind::Command => found.push(id),
                NodeKind::Stmt => pending.extend(self.nodes[id].children.iter().rev()),
            }
        }
        found
    }

    /// The scope holding a command's handler: the command itself or one of its
    /// statement scopes.
    fn handler_node(&self, command: NodeId) -> Option<NodeId> {
        let mut pending = vec![command];
        while let Some(id) = pending.pop() {
            if self.nodes[id].handler.is_some() {
                return Some(id);
            }
            pending.extend(
                self.nodes[id]
                    .children
                    .iter()
                    .filter(|&&child| self.nodes[child].kind == NodeKind::Stmt),
            );
        }
        None
    }

    pub(crate) fn name(&self, command: NodeId) -> &str {
        &self.nodes[command].name
    }

    pub(crate) fn description(&self, command: NodeId) -> &str {
        &self.nodes[command].description
    }

    pub(crate) fn options(&self, command: NodeId) -> &[BoundOption] {
        &self.nodes[command].options
    }

    pub(crate) fn has_handler(&self, command: NodeId) -> bool {
        self.handler_node(command).is_some()
    }

    /// Space-separated command names from the root.
    pub(crate) fn path_name(&self, command: NodeId) -> String {
        let names: Vec<&str> = self
            .lineage(command)
            .into_iter()
            .filter(|&id| self.nodes[id].kind == NodeKind::Command)
            .map(|id| self.nodes[id].name.as_str())
            .collect();
        names.join(" ")
    }

    /// Scopes from the root down to `id`.
    fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            ids.push(parent);
            current = parent;
        }
        ids.reverse();
        ids
    }

    fn build_command(&self, id: NodeId) -> Command {
        let node = &self.nodes[id];
        let mut command = Command::new(node.name.clone())
            .disable_help_flag(true)
            .disable_help_subcommand(true)
            .disable_version_flag(true)
            .args_override_self(true);
        if !node.description.is_empty() {
            command = command.about(node.description.clone());
        }
        for (index, option) in node.options.iter().enumerate() {
            command = command.arg(option.to_arg(index));
        }
        if let Some(help) = help_arg(&node.options) {
            command = command.arg(help);
        }
        for child in self.command_children(id) {
            command = command.subcommand(self.build_command(child));
        }
        command
    }

    /// Rendered help of one command, titled with its full path.
    pub(crate) fn usage(&self, command: NodeId) -> String {
        self.build_command(command)
            .bin_name(self.path_name(command))
            .render_help()
            .to_string()
    }

    /// Parse `args` (without the program name) and run the selected command.
    pub fn run(&self, ctx: Context, args: Vec<String>) -> Result<()> {
        self.parsed.clear();

        let matches = self
            .build_command(ROOT)
            .no_binary_name(true)
            .try_get_matches_from(args)
            .map_err(from_clap)?;

        let mut current = ROOT;
        let mut matches = &matches;
        loop {
            self.apply(current, matches)?;
            let Some((name, sub)) = matches.subcommand() else {
                break;
            };
            current = self
                .command_children(current)
                .into_iter()
                .find(|&id| self.nodes[id].name == name)
                .ok_or_else(|| Error::Parse {
                    message: format!("unknown command `{name}`"),
                    usage: self.usage(current),
                })?;
            matches = sub;
        }

        let Some(owner) = self.handler_node(current) else {
            return Err(Error::NoExecFunc {
                command: self.path_name(current),
                usage: self.usage(current),
            });
        };
        let Some(handler) = self.nodes[owner].handler.clone() else {
            return Err(Error::NoExecFunc {
                command: self.path_name(current),
                usage: self.usage(current),
            });
        };
        let middlewares: Vec<Middleware> = self
            .lineage(owner)
            .into_iter()
            .flat_map(|id| self.nodes[id].middlewares.iter().cloned())
            .collect();

        tracing::debug!(
            command = %self.path_name(current),
            middlewares = middlewares.len(),
            "running command"
        );
        Chain::new(middlewares, handler).run(ctx.with_value(self.parsed.clone()));
        Ok(())
    }

    /// Write the values supplied for `command`'s options into their fields.
    fn apply(&self, command: NodeId, matches: &ArgMatches) -> Result<()> {
        for (index, option) in self.nodes[command].options.iter().enumerate() {
            let id = option_id(index);
            if matches.value_source(&id) != Some(ValueSource::CommandLine) {
                continue;
            }
            let invalid = |source: Error| Error::InvalidValue {
                flag: option.display_name(),
                usage: self.usage(command),
                source: Box::new(source),
            };

            let mut merged: Option<Value> = None;
            for raw in matches.get_many::<String>(&id).into_iter().flatten() {
                let value = coerce(&option.ty, raw, &option.separators).map_err(invalid)?;
                merged = Some(match merged {
                    Some(previous) => previous.merge(value),
                    None => value,
                });
            }
            if let Some(value) = merged {
                (option.setter)(value).map_err(invalid)?;
                self.parsed.insert(option.address);
                tracing::trace!(field = option.field, flag = %option.display_name(), "option parsed");
            }
        }
        Ok(())
    }
}

/// `-h`/`--help`, leaving out whichever identifier a bound option already uses.
fn help_arg(options: &[BoundOption]) -> Option<Arg> {
    let short = !options.iter().any(|o| o.short == Some('h'));
    let long = !options.iter().any(|o| o.long.as_deref() == Some("help"));
    if !short && !long {
        return None;
    }
    let mut arg = Arg::new("help")
        .action(ArgAction::Help)
        .help("Print help");
    if short {
        arg = arg.short('h');
    }
    if long {
        arg = arg.long("help");
    }
    Some(arg)
}

fn from_clap(err: clap::Error) -> Error {
    use clap::error::ErrorKind;

    let usage = err.render().to_string();
    let message = usage
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_start_matches("error: ")
        .to_string();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            Error::Help { usage }
        }
        ErrorKind::MissingRequiredArgument => Error::NoInputValue { message, usage },
        _ => Error::Parse { message, usage },
    }
}

/// Option registry bound to one command of a [`FlagSet`].
pub struct Scope<'a> {
    flags: &'a mut FlagSet,
    command: NodeId,
}

impl OptionRegistry for Scope<'_> {
    fn register(&mut self, options: Vec<BoundOption>) -> Result<()> {
        let existing = &self.flags.nodes[self.command].options;
        let mut shorts: HashSet<char> = existing.iter().filter_map(|o| o.short).collect();
        let mut longs: HashSet<String> = existing.iter().filter_map(|o| o.long.clone()).collect();

        for option in &options {
            let short_taken = option.short.is_some_and(|s| !shorts.insert(s));
            let long_taken = option
                .long
                .as_ref()
                .is_some_and(|l| !longs.insert(l.clone()));
            if short_taken || long_taken {
                return Err(Error::DuplicateOption {
                    flag: option.display_name(),
                    command: self.flags.path_name(self.command),
                });
            }
        }

        self.flags.nodes[self.command].options.extend(options);
        Ok(())
    }
}
