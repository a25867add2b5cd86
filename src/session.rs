//! Session handler contract and a typed session registry.
//!
//! A session handler owns any number of aliased session instances of one
//! kind (e.g. connections), exactly one of which is current at a time. The
//! keyword engine only talks to handlers through [`SessionHandler`]; the
//! [`Sessions`] registry is the stock implementation libraries plug in.

use std::any::Any;
use std::rc::Rc;

use thiserror::Error;

use crate::function::{CallArgs, KeywordFunction, Signature};
use crate::library::LibraryState;
use crate::name;
use crate::value::Value;

/// Shared handle to a session instance, compared by identity.
pub type SessionRef = Rc<dyn Any>;

/// True when both handles point at the same session instance.
pub fn same_session(a: &SessionRef, b: &SessionRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Handler-specific session failure, e.g. `ConnectionError: No active connection.`
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct SessionError {
    pub kind: String,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Capabilities the keyword engine and the generated keywords need from a session kind.
pub trait SessionHandler {
    /// Singular identifier, also the reserved keyword argument name (e.g. `connection`).
    fn identifier(&self) -> &str;

    /// Plural identifier naming the alias collection (e.g. `connections`).
    fn plural_identifier(&self) -> &str;

    /// Whether keywords accept `<identifier>=alias` for per-call switching.
    fn auto_explicit(&self) -> bool;

    fn current(&self) -> Result<SessionRef, SessionError>;

    fn current_alias(&self) -> Option<&str>;

    /// Alias to session mapping, in opening order.
    fn sessions(&self) -> Vec<(String, SessionRef)>;

    fn switch(&mut self, alias: &str) -> Result<(), SessionError>;

    /// Open a session under `alias` from keyword arguments and make it current.
    fn open(&mut self, alias: &str, args: &[Value]) -> Result<(), SessionError>;

    /// Close `alias`, or the current session when `None`.
    fn close(&mut self, alias: Option<&str>) -> Result<(), SessionError>;
}

type Opener<S> = Box<dyn Fn(&[Value]) -> anyhow::Result<S>>;

/// Ordered registry of aliased sessions of type `S`.
pub struct Sessions<S> {
    identifier: String,
    plural_identifier: String,
    kind: String,
    auto_explicit: bool,
    sessions: Vec<(String, Rc<S>)>,
    current: Option<String>,
    opener: Option<Opener<S>>,
}

impl<S: 'static> Sessions<S> {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            plural_identifier: format!("{identifier}s"),
            kind: name::error_kind(&identifier),
            identifier,
            auto_explicit: false,
            sessions: Vec::new(),
            current: None,
            opener: None,
        }
    }

    pub fn with_plural(mut self, plural_identifier: impl Into<String>) -> Self {
        self.plural_identifier = plural_identifier.into();
        self
    }

    pub fn with_auto_explicit(mut self, auto_explicit: bool) -> Self {
        self.auto_explicit = auto_explicit;
        self
    }

    /// Install the constructor used by the generated `Open <Identifier>` keyword.
    pub fn with_opener(mut self, opener: impl Fn(&[Value]) -> anyhow::Result<S> + 'static) -> Self {
        self.opener = Some(Box::new(opener));
        self
    }

    /// Store `session` under `alias` (replacing any previous one) and make it current.
    pub fn open_session(&mut self, alias: impl Into<String>, session: S) -> Rc<S> {
        let alias = alias.into();
        let session = Rc::new(session);
        match self.sessions.iter_mut().find(|(a, _)| *a == alias) {
            Some((_, slot)) => *slot = session.clone(),
            None => self.sessions.push((alias.clone(), session.clone())),
        }
        self.current = Some(alias);
        session
    }

    pub fn get(&self, alias: &str) -> Option<Rc<S>> {
        self.sessions
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, s)| s.clone())
    }

    pub fn current_session(&self) -> Result<Rc<S>, SessionError> {
        self.current
            .as_deref()
            .and_then(|alias| self.get(alias))
            .ok_or_else(|| self.error(format!("No active {}.", self.identifier)))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn error(&self, message: String) -> SessionError {
        SessionError::new(self.kind.clone(), message)
    }

    fn no_such(&self, alias: &str) -> SessionError {
        self.error(format!("No {} named '{alias}'.", self.identifier))
    }
}

impl<S: 'static> SessionHandler for Sessions<S> {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn plural_identifier(&self) -> &str {
        &self.plural_identifier
    }

    fn auto_explicit(&self) -> bool {
        self.auto_explicit
    }

    fn current(&self) -> Result<SessionRef, SessionError> {
        let session: SessionRef = self.current_session()?;
        Ok(session)
    }

    fn current_alias(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn sessions(&self) -> Vec<(String, SessionRef)> {
        self.sessions
            .iter()
            .map(|(alias, session)| {
                let session: SessionRef = session.clone();
                (alias.clone(), session)
            })
            .collect()
    }

    fn switch(&mut self, alias: &str) -> Result<(), SessionError> {
        if self.get(alias).is_none() {
            return Err(self.no_such(alias));
        }
        self.current = Some(alias.to_string());
        Ok(())
    }

    fn open(&mut self, alias: &str, args: &[Value]) -> Result<(), SessionError> {
        let opener = self
            .opener
            .as_ref()
            .ok_or_else(|| self.error(format!("{} sessions cannot be opened here.", self.identifier)))?;
        let session = opener(args).map_err(|err| self.error(format!("{err:#}")))?;
        self.open_session(alias, session);
        Ok(())
    }

    fn close(&mut self, alias: Option<&str>) -> Result<(), SessionError> {
        let alias = match alias {
            Some(alias) => alias.to_string(),
            None => self
                .current
                .clone()
                .ok_or_else(|| self.error(format!("No active {}.", self.identifier)))?,
        };
        let idx = self
            .sessions
            .iter()
            .position(|(a, _)| *a == alias)
            .ok_or_else(|| self.no_such(&alias))?;
        self.sessions.remove(idx);
        if self.current.as_deref() == Some(alias.as_str()) {
            self.current = None;
        }
        Ok(())
    }
}

/// `Open`, `Switch` and `Close` keywords generated for a session kind.
pub(crate) fn session_keywords(identifier: &str) -> Vec<(String, KeywordFunction)> {
    let title = name::display_name(identifier);

    let id = identifier.to_string();
    let open = KeywordFunction::new(
        Signature::new(["alias"]).with_varargs("args"),
        move |state: &mut LibraryState, call: CallArgs| {
            let (alias, rest) = split_alias(&call)?;
            handler_mut(state, &id)?.open(&alias, rest)?;
            Ok(Value::None)
        },
    )
    .with_doc(format!("Open a new {identifier} and make it the current one."));

    let id = identifier.to_string();
    let switch = KeywordFunction::new(
        Signature::new(["alias"]),
        move |state: &mut LibraryState, call: CallArgs| {
            let (alias, _) = split_alias(&call)?;
            handler_mut(state, &id)?.switch(&alias)?;
            Ok(Value::None)
        },
    )
    .with_doc(format!("Switch the current {identifier} to `alias`."));

    let id = identifier.to_string();
    let close = KeywordFunction::new(
        Signature::new(["alias"]).with_defaults([Value::None]),
        move |state: &mut LibraryState, call: CallArgs| {
            let alias = match call.positional.first() {
                None | Some(Value::None) => None,
                Some(alias) => Some(alias.to_string()),
            };
            handler_mut(state, &id)?.close(alias.as_deref())?;
            Ok(Value::None)
        },
    )
    .with_doc(format!(
        "Close the {identifier} named `alias`.\n\nCloses the current {identifier} when no alias is given."
    ));

    vec![
        (format!("Open {title}"), open),
        (format!("Switch {title}"), switch),
        (format!("Close {title}"), close),
    ]
}

fn split_alias(call: &CallArgs) -> anyhow::Result<(String, &[Value])> {
    match call.positional.split_first() {
        Some((alias, rest)) => Ok((alias.to_string(), rest)),
        None => anyhow::bail!("missing required argument 'alias'"),
    }
}

fn handler_mut<'a>(
    state: &'a mut LibraryState,
    identifier: &str,
) -> anyhow::Result<&'a mut (dyn SessionHandler + 'static)> {
    state
        .session_handler_mut(identifier)
        .ok_or_else(|| anyhow::anyhow!("no session handler `{identifier}`"))
}
