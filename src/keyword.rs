//! Keyword handler: argument discovery, documentation, and the call protocol.
//!
//! A call runs in four phases. Sessions named through reserved keyword
//! arguments (`connection=B`) are switched first, then contexts the keyword
//! has variants for. The implementation is then resolved (casts, last active
//! variant wins) and dispatched. Whatever happened, every switched context
//! and session is switched back before the call returns. The first failure
//! of the first phases is held until that restoration is done, and a failure
//! while restoring replaces it.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::KeywordError;
use crate::function::{CallArgs, Implementation, KeywordFunction};
use crate::kwargs::KwArgs;
use crate::library::LibraryState;
use crate::session::{SessionRef, same_session};
use crate::value::Value;

/// A named action of one library instance.
#[derive(Clone, Debug)]
pub struct Keyword {
    name: String,
    libname: String,
    func: Rc<KeywordFunction>,
    /// Context handler identifiers the function has variants for.
    context_handlers: Vec<String>,
    accepts_implicit_switch_options: bool,
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    SessionSwitch,
    ContextSwitch,
    Resolve,
    Dispatch,
}

/// Error held back until session and context state is restored.
struct Captured {
    error: KeywordError,
    phase: Phase,
}

impl Captured {
    fn at(phase: Phase) -> impl FnOnce(KeywordError) -> Captured {
        move |error| Captured { error, phase }
    }
}

struct SessionRestore {
    identifier: String,
    plural_identifier: String,
    previous: SessionRef,
}

struct ContextRestore {
    identifier: String,
    previous: String,
}

#[derive(Default)]
struct Restore {
    contexts: SmallVec<[ContextRestore; 2]>,
    sessions: SmallVec<[SessionRestore; 2]>,
}

impl Keyword {
    /// Wrap `func` as keyword `name` of the library whose state is `state`.
    pub fn new(
        libname: impl Into<String>,
        name: impl Into<String>,
        func: Rc<KeywordFunction>,
        state: &LibraryState,
    ) -> Self {
        let context_handlers = func.context_handlers();
        let accepts_implicit_switch_options = state.session_handlers().any(|h| h.auto_explicit())
            || context_handlers.iter().any(|identifier| {
                state
                    .context_handler(identifier)
                    .is_some_and(|h| h.auto_explicit())
            });
        Self {
            name: name.into(),
            libname: libname.into(),
            func,
            context_handlers,
            accepts_implicit_switch_options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn libname(&self) -> &str {
        &self.libname
    }

    /// `<Library>.<Keyword Name>`
    pub fn longname(&self) -> String {
        format!("{}.{}", self.libname, self.name)
    }

    pub fn function(&self) -> &KeywordFunction {
        &self.func
    }

    pub fn context_handlers(&self) -> &[String] {
        &self.context_handlers
    }

    pub fn accepts_implicit_switch_options(&self) -> bool {
        self.accepts_implicit_switch_options
    }

    /// Argument spec in dynamic library style: `name`, `name=default`, `*name`, `**name`.
    pub fn args(&self) -> Vec<String> {
        if let Some(explicit) = self.func.explicit_args() {
            return explicit.to_vec();
        }
        let signature = self.func.base().signature();
        let mut spec = Vec::with_capacity(signature.positional.len() + 2);
        for (idx, name) in signature.positional.iter().enumerate() {
            match signature.default_for(idx) {
                Some(default) => spec.push(format!("{name}={default}")),
                None => spec.push(name.clone()),
            }
        }
        if let Some(varargs) = &signature.varargs {
            spec.push(format!("*{varargs}"));
        }
        if let Some(kwargs) = &signature.kwargs {
            spec.push(format!("**{kwargs}"));
        } else if signature.varargs.is_none() && self.accepts_implicit_switch_options {
            spec.push("**options".to_string());
        }
        spec
    }

    /// Documentation with the first line kept and the rest dedented.
    pub fn doc(&self) -> Option<String> {
        let doc = self.func.doc()?;
        let Some((first, rest)) = doc.split_once('\n') else {
            return Some(doc.to_string());
        };
        Some(format!("{first}\n{}", dedent(rest)))
    }

    /// Invoke the keyword against `state`.
    ///
    /// Named arguments matching an auto-explicit session or context handler
    /// switch that handler for this call only. The state is restored before
    /// returning, on success and on failure alike.
    pub fn call(
        &self,
        state: &mut LibraryState,
        args: Vec<Value>,
        kwargs: KwArgs,
    ) -> Result<Value, KeywordError> {
        let span = tracing::debug_span!("keyword", name = %self.longname());
        let _enter = span.enter();

        let mut restore = Restore::default();
        let outcome = self.switch_and_dispatch(state, args, kwargs, &mut restore);
        if let Err(captured) = &outcome {
            debug!(
                phase = ?captured.phase,
                error = %captured.error,
                "holding error until state is restored"
            );
        }
        if let Err(err) = self.restore(state, restore) {
            if let Err(captured) = &outcome {
                warn!(
                    superseded = %captured.error,
                    error = %err,
                    "restoring state failed; dropping the earlier error"
                );
            }
            return Err(err);
        }
        outcome.map_err(|captured| captured.error)
    }

    fn switch_and_dispatch(
        &self,
        state: &mut LibraryState,
        args: Vec<Value>,
        mut kwargs: KwArgs,
        restore: &mut Restore,
    ) -> Result<Value, Captured> {
        self.switch_sessions(state, &mut kwargs, restore)
            .map_err(Captured::at(Phase::SessionSwitch))?;
        self.switch_contexts(state, &mut kwargs, restore)
            .map_err(Captured::at(Phase::ContextSwitch))?;
        let args = self
            .func
            .cast_args(args)
            .map_err(Captured::at(Phase::Resolve))?;
        let implementation = self.func.resolve(|context| state.is_active(context));
        self.dispatch(state, implementation, args, kwargs)
            .map_err(Captured::at(Phase::Dispatch))
    }

    /// Stops at the first failing handler; later handlers are not attempted.
    fn switch_sessions(
        &self,
        state: &mut LibraryState,
        kwargs: &mut KwArgs,
        restore: &mut Restore,
    ) -> Result<(), KeywordError> {
        for handler in state.session_handlers_mut() {
            if !handler.auto_explicit() {
                continue;
            }
            let Some(requested) = kwargs.pop(handler.identifier()) else {
                continue;
            };
            let previous = handler.current()?;
            let alias = requested.to_string();
            debug!(identifier = handler.identifier(), %alias, "switching session");
            handler.switch(&alias)?;
            restore.sessions.push(SessionRestore {
                identifier: handler.identifier().to_string(),
                plural_identifier: handler.plural_identifier().to_string(),
                previous,
            });
        }
        Ok(())
    }

    fn switch_contexts(
        &self,
        state: &mut LibraryState,
        kwargs: &mut KwArgs,
        restore: &mut Restore,
    ) -> Result<(), KeywordError> {
        for identifier in &self.context_handlers {
            let Some(handler) = state.context_handler_mut(identifier) else {
                continue;
            };
            if !handler.auto_explicit() {
                continue;
            }
            let Some(requested) = kwargs.pop(identifier) else {
                continue;
            };
            let previous = handler.current().to_string();
            let name = requested.to_string();
            debug!(%identifier, %name, "switching context");
            handler.switch(&name)?;
            restore.contexts.push(ContextRestore {
                identifier: identifier.clone(),
                previous,
            });
        }
        Ok(())
    }

    fn dispatch(
        &self,
        state: &mut LibraryState,
        implementation: &Implementation,
        mut args: Vec<Value>,
        mut kwargs: KwArgs,
    ) -> Result<Value, KeywordError> {
        let signature = implementation.signature();
        if signature.kwargs.is_none() && !kwargs.is_empty() {
            let filled = args.len();
            for name in signature.positional.iter().skip(filled) {
                if let Some(value) = kwargs.pop(name) {
                    args.push(value);
                }
            }
            for (key, value) in std::mem::take(&mut kwargs) {
                args.push(Value::Text(format!("{key}={value}")));
            }
            trace!(positional = args.len(), "named arguments folded into positionals");
        }
        implementation
            .invoke(state, CallArgs::new(args, kwargs))
            .map_err(KeywordError::Implementation)
    }

    /// Contexts first, then sessions. The first failure propagates immediately.
    fn restore(&self, state: &mut LibraryState, restore: Restore) -> Result<(), KeywordError> {
        for ContextRestore {
            identifier,
            previous,
        } in restore.contexts
        {
            let Some(handler) = state.context_handler_mut(&identifier) else {
                continue;
            };
            debug!(%identifier, name = %previous, "restoring context");
            if let Err(err) = handler.switch(&previous) {
                return Err(KeywordError::Restoration {
                    identifier,
                    source: Box::new(err.into()),
                });
            }
        }
        for SessionRestore {
            identifier,
            plural_identifier,
            previous,
        } in restore.sessions
        {
            let Some(handler) = state.session_handler_mut(&identifier) else {
                continue;
            };
            let alias = handler
                .sessions()
                .into_iter()
                .find(|(_, session)| same_session(session, &previous))
                .map(|(alias, _)| alias);
            let Some(alias) = alias else {
                debug!(%identifier, %plural_identifier, "previous session is gone; nothing to restore");
                continue;
            };
            debug!(%identifier, %alias, "restoring session");
            if let Err(err) = handler.switch(&alias) {
                return Err(KeywordError::Restoration {
                    identifier,
                    source: Box::new(err.into()),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [ {} ]", self.longname(), self.args().join(" | "))
    }
}

/// Strip the common leading whitespace; whitespace-only lines become empty.
fn dedent(text: &str) -> String {
    let indent = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
