//! Context handler contract and a named-context registry.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::function::{CallArgs, KeywordFunction, Signature};
use crate::library::LibraryState;
use crate::name;
use crate::value::Value;

/// A context of one handler kind, written `<identifier>.<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId {
    pub handler: String,
    pub name: String,
}

impl ContextId {
    pub fn new(handler: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.handler, self.name)
    }
}

impl FromStr for ContextId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let Some((handler, name)) = s.split_once('.') else {
            anyhow::bail!("invalid context `{s}`; expected handler.name");
        };
        let (handler, name) = (handler.trim(), name.trim());
        if handler.is_empty() || name.is_empty() {
            anyhow::bail!("invalid context `{s}`; expected handler.name");
        }
        Ok(ContextId::new(handler, name))
    }
}

/// Handler-specific context failure, e.g. `ModeError: No mode named 'x'.`
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ContextError {
    pub kind: String,
    pub message: String,
}

impl ContextError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Capabilities the keyword engine needs from a context kind.
pub trait ContextHandler {
    /// Identifier of the kind, also the reserved keyword argument name.
    fn identifier(&self) -> &str;

    fn auto_explicit(&self) -> bool;

    /// Name of the currently selected context.
    fn current(&self) -> &str;

    fn switch(&mut self, name: &str) -> Result<(), ContextError>;
}

/// A context kind with a fixed set of names, one of them current.
#[derive(Clone, Debug)]
pub struct Contexts {
    identifier: String,
    kind: String,
    auto_explicit: bool,
    names: Vec<String>,
    current: String,
}

impl Contexts {
    /// Create a context kind; the first name is current. An empty list yields `default`.
    pub fn new<I, N>(identifier: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let identifier = identifier.into();
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            names.push("default".to_string());
        }
        Self {
            kind: name::error_kind(&identifier),
            identifier,
            auto_explicit: false,
            current: names[0].clone(),
            names,
        }
    }

    pub fn with_auto_explicit(mut self, auto_explicit: bool) -> Self {
        self.auto_explicit = auto_explicit;
        self
    }

    pub fn with_default(mut self, name: &str) -> Result<Self, ContextError> {
        self.switch(name)?;
        Ok(self)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl ContextHandler for Contexts {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn auto_explicit(&self) -> bool {
        self.auto_explicit
    }

    fn current(&self) -> &str {
        &self.current
    }

    fn switch(&mut self, name: &str) -> Result<(), ContextError> {
        if !self.names.iter().any(|n| n == name) {
            return Err(ContextError::new(
                self.kind.clone(),
                format!("No {} named '{name}'.", self.identifier),
            ));
        }
        self.current = name.to_string();
        Ok(())
    }
}

/// The `Switch <Identifier>` keyword generated for a context kind.
pub(crate) fn context_keywords(identifier: &str) -> Vec<(String, KeywordFunction)> {
    let id = identifier.to_string();
    let switch = KeywordFunction::new(
        Signature::new(["name"]),
        move |state: &mut LibraryState, call: CallArgs| {
            let name = call
                .positional
                .first()
                .map(Value::to_string)
                .ok_or_else(|| anyhow::anyhow!("missing required argument 'name'"))?;
            state
                .context_handler_mut(&id)
                .ok_or_else(|| anyhow::anyhow!("no context handler `{id}`"))?
                .switch(&name)?;
            Ok(Value::None)
        },
    )
    .with_doc(format!("Switch the current {identifier} to `name`."));

    vec![(format!("Switch {}", name::display_name(identifier)), switch)]
}
