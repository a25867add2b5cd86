//! Library instances: handler tables, variables, and the keywords built over them.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::context::{ContextHandler, ContextId, context_keywords};
use crate::error::KeywordError;
use crate::function::KeywordFunction;
use crate::keyword::Keyword;
use crate::kwargs::KwArgs;
use crate::name;
use crate::session::{SessionError, SessionHandler, session_keywords};
use crate::value::Value;

/// Mutable state keyword implementations run against.
pub struct LibraryState {
    name: String,
    sessions: Vec<Box<dyn SessionHandler>>,
    contexts: Vec<Box<dyn ContextHandler>>,
    variables: BTreeMap<String, Value>,
}

impl LibraryState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sessions: Vec::new(),
            contexts: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session handlers in declaration order.
    pub fn session_handlers(&self) -> impl Iterator<Item = &(dyn SessionHandler + 'static)> {
        self.sessions.iter().map(|h| h.as_ref())
    }

    pub(crate) fn session_handlers_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut (dyn SessionHandler + 'static)> {
        self.sessions.iter_mut().map(|h| h.as_mut())
    }

    pub fn session_handler(&self, identifier: &str) -> Option<&(dyn SessionHandler + 'static)> {
        self.session_handlers().find(|h| h.identifier() == identifier)
    }

    pub fn session_handler_mut(
        &mut self,
        identifier: &str,
    ) -> Option<&mut (dyn SessionHandler + 'static)> {
        self.session_handlers_mut()
            .find(|h| h.identifier() == identifier)
    }

    /// The current session of kind `identifier`, downcast to its concrete type.
    pub fn session<S: 'static>(&self, identifier: &str) -> Result<Rc<S>, SessionError> {
        let handler = self.session_handler(identifier).ok_or_else(|| {
            SessionError::new(
                name::error_kind(identifier),
                format!("No session handler '{identifier}'."),
            )
        })?;
        handler.current()?.downcast::<S>().map_err(|_| {
            SessionError::new(
                name::error_kind(identifier),
                format!("Current {identifier} has an unexpected type."),
            )
        })
    }

    pub fn current_session_alias(&self, identifier: &str) -> Option<&str> {
        self.session_handler(identifier)?.current_alias()
    }

    pub fn context_handlers(&self) -> impl Iterator<Item = &(dyn ContextHandler + 'static)> {
        self.contexts.iter().map(|h| h.as_ref())
    }

    pub fn context_handler(&self, identifier: &str) -> Option<&(dyn ContextHandler + 'static)> {
        self.context_handlers().find(|h| h.identifier() == identifier)
    }

    pub fn context_handler_mut(
        &mut self,
        identifier: &str,
    ) -> Option<&mut (dyn ContextHandler + 'static)> {
        self.contexts
            .iter_mut()
            .map(|h| h.as_mut())
            .find(|h| h.identifier() == identifier)
    }

    pub fn current_context(&self, identifier: &str) -> Option<&str> {
        self.context_handler(identifier).map(|h| h.current())
    }

    pub fn is_active(&self, context: &ContextId) -> bool {
        self.current_context(&context.handler) == Some(context.name.as_str())
    }

    /// Currently selected context of every handler, in declaration order.
    pub fn active_contexts(&self) -> Vec<ContextId> {
        self.context_handlers()
            .map(|h| ContextId::new(h.identifier(), h.current()))
            .collect()
    }

    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Insert or update a variable, returning the previous value if present.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.variables.insert(key.into(), value)
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }
}

/// Collects handlers and keyword functions, then discovers the keywords.
pub struct LibraryBuilder {
    state: LibraryState,
    functions: Vec<(String, KeywordFunction)>,
}

impl LibraryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: LibraryState::new(name),
            functions: Vec::new(),
        }
    }

    /// Add a session kind together with its `Open`/`Switch`/`Close` keywords.
    pub fn session_handler(mut self, handler: impl SessionHandler + 'static) -> Self {
        self.functions.extend(session_keywords(handler.identifier()));
        self.state.sessions.push(Box::new(handler));
        self
    }

    /// Add a context kind together with its `Switch` keyword.
    pub fn context_handler(mut self, handler: impl ContextHandler + 'static) -> Self {
        self.functions.extend(context_keywords(handler.identifier()));
        self.state.contexts.push(Box::new(handler));
        self
    }

    pub fn keyword(mut self, name: impl Into<String>, function: KeywordFunction) -> Self {
        self.functions.push((name.into(), function));
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state.set_variable(key, value);
        self
    }

    pub fn build(self) -> Result<Library> {
        let LibraryBuilder { state, functions } = self;
        let mut keywords: Vec<Keyword> = Vec::with_capacity(functions.len());
        for (name, function) in functions {
            let keyword = Keyword::new(state.name(), name, Rc::new(function), &state);
            let key = name::normalize(keyword.name());
            if keywords.iter().any(|k| name::normalize(k.name()) == key) {
                bail!("duplicate keyword `{}`", keyword.longname());
            }
            keywords.push(keyword);
        }
        tracing::debug!(
            library = state.name(),
            keywords = keywords.len(),
            "discovered keywords"
        );
        Ok(Library { state, keywords })
    }
}

/// A library instance owning its state and keywords.
pub struct Library {
    state: LibraryState,
    keywords: Vec<Keyword>,
}

impl Library {
    pub fn builder(name: impl Into<String>) -> LibraryBuilder {
        LibraryBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn state(&self) -> &LibraryState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LibraryState {
        &mut self.state
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }

    /// Look up a keyword ignoring case, spaces and underscores.
    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        let key = name::normalize(name);
        self.keywords
            .iter()
            .find(|k| name::normalize(k.name()) == key)
    }

    pub fn keyword_names(&self) -> Vec<&str> {
        self.keywords.iter().map(|k| k.name()).collect()
    }

    pub fn keyword_arguments(&self, name: &str) -> Option<Vec<String>> {
        self.keyword(name).map(Keyword::args)
    }

    pub fn keyword_documentation(&self, name: &str) -> Option<String> {
        self.keyword(name).and_then(Keyword::doc)
    }

    pub fn run_keyword(
        &mut self,
        name: &str,
        args: Vec<Value>,
        kwargs: KwArgs,
    ) -> Result<Value, KeywordError> {
        let key = name::normalize(name);
        let Library { state, keywords } = self;
        let keyword = keywords
            .iter()
            .find(|k| name::normalize(k.name()) == key)
            .ok_or_else(|| KeywordError::NotFound(name.to_string()))?;
        keyword.call(state, args, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Contexts;
    use crate::function::{CallArgs, Signature};
    use crate::session::Sessions;

    struct Conn {
        host: String,
    }

    fn library() -> Result<Library> {
        let connections = Sessions::new("connection")
            .with_auto_explicit(true)
            .with_opener(|args: &[Value]| {
                Ok(Conn {
                    host: args.first().map(Value::to_string).unwrap_or_default(),
                })
            });
        Library::builder("Net")
            .session_handler(connections)
            .context_handler(Contexts::new("mode", ["normal", "fast"]))
            .keyword(
                "Host",
                KeywordFunction::new(Signature::default(), |state: &mut LibraryState, _| {
                    Ok(Value::Text(state.session::<Conn>("connection")?.host.clone()))
                }),
            )
            .build()
    }

    #[test]
    fn generated_keywords_are_discovered_first() -> Result<()> {
        let lib = library()?;
        assert_eq!(
            lib.keyword_names(),
            vec![
                "Open Connection",
                "Switch Connection",
                "Close Connection",
                "Switch Mode",
                "Host"
            ]
        );
        assert_eq!(
            lib.keyword_arguments("open_connection"),
            Some(vec!["alias".to_string(), "*args".to_string()])
        );
        Ok(())
    }

    #[test]
    fn dynamic_api_drives_sessions() -> Result<()> {
        let mut lib = library()?;
        lib.run_keyword(
            "Open Connection",
            vec!["A".into(), "alpha.local".into()],
            KwArgs::new(),
        )?;
        lib.run_keyword("open connection", vec!["B".into(), "beta.local".into()], KwArgs::new())?;
        assert_eq!(lib.state().current_session_alias("connection"), Some("B"));
        let host = lib.run_keyword("Host", Vec::new(), KwArgs::new())?;
        assert_eq!(host, Value::from("beta.local"));

        lib.run_keyword("SWITCH_CONNECTION", vec!["A".into()], KwArgs::new())?;
        let host = lib.run_keyword("Host", Vec::new(), KwArgs::new())?;
        assert_eq!(host, Value::from("alpha.local"));
        Ok(())
    }

    #[test]
    fn unknown_keyword_is_not_found() -> Result<()> {
        let mut lib = library()?;
        let err = lib
            .run_keyword("Nope", Vec::new(), KwArgs::new())
            .unwrap_err();
        assert!(matches!(err, KeywordError::NotFound(ref n) if n == "Nope"));
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let noop = || KeywordFunction::new(Signature::default(), |_, _| Ok(Value::None));
        let result = Library::builder("Dup")
            .keyword("Do It", noop())
            .keyword("do_it", noop())
            .build();
        let err = result.err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("duplicate keyword `Dup.do_it`"));
    }

    #[test]
    fn context_keyword_switches_state() -> Result<()> {
        let mut lib = library()?;
        assert!(lib.state().is_active(&ContextId::new("mode", "normal")));
        lib.run_keyword("Switch Mode", vec!["fast".into()], KwArgs::new())?;
        assert_eq!(
            lib.state().active_contexts(),
            vec![ContextId::new("mode", "fast")]
        );
        let err = lib
            .run_keyword("Switch Mode", vec!["slow".into()], KwArgs::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "ModeError: No mode named 'slow'.");
        Ok(())
    }

    #[test]
    fn typed_session_access_reports_missing_session() -> Result<()> {
        let lib = library()?;
        let err = lib.state().session::<Conn>("connection").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("ConnectionError: No active connection.")
        );
        let call = CallArgs::default();
        assert!(call.get(0, "alias").is_none());
        Ok(())
    }
}
