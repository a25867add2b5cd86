//! JSON library descriptions: handlers plus template keywords.
//!
//! A template keyword renders its `template` with `{placeholder}`s taken from
//! the bound arguments, the current alias of every session kind, the current
//! name of every context kind, and the library variables, in that priority.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::builtin::builtin_keywords;
use crate::context::{ContextId, Contexts};
use crate::function::{CallArgs, Implementation, KeywordFunction, Signature, TypeCast};
use crate::library::{Library, LibraryState};
use crate::session::Sessions;
use crate::types::TypeTag;
use crate::value::Value;

/// Session instance of configured libraries: the values it was opened with.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub args: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub identifier: String,
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub auto_explicit: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    pub identifier: String,
    pub names: Vec<String>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub auto_explicit: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordConfig {
    pub name: String,
    /// Argument spec entries: `name`, `name=default`, `*name`, `**name`.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub doc: Option<String>,
    /// Type atoms applied to the leading positional arguments.
    #[serde(default)]
    pub casts: Vec<String>,
    pub template: String,
    /// Alternate templates keyed by `<context identifier>.<name>`, in priority order.
    #[serde(default)]
    pub variants: Vec<(String, String)>,
}

fn default_name() -> String {
    "Library".to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            sessions: Vec::new(),
            contexts: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

impl LibraryConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid library configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path`, or the empty default library when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn build(&self) -> Result<Library> {
        let mut builder = Library::builder(&self.name);
        for session in &self.sessions {
            let mut handler = Sessions::<Record>::new(&session.identifier)
                .with_auto_explicit(session.auto_explicit)
                .with_opener(|args: &[Value]| Ok(Record { args: args.to_vec() }));
            if let Some(plural) = &session.plural {
                handler = handler.with_plural(plural);
            }
            builder = builder.session_handler(handler);
        }
        for context in &self.contexts {
            let mut handler = Contexts::new(&context.identifier, context.names.iter().cloned())
                .with_auto_explicit(context.auto_explicit);
            if let Some(default) = &context.default {
                handler = handler.with_default(default)?;
            }
            builder = builder.context_handler(handler);
        }
        for (name, function) in builtin_keywords() {
            builder = builder.keyword(name, function);
        }
        for keyword in &self.keywords {
            let function = self
                .template_function(keyword)
                .with_context(|| format!("keyword `{}`", keyword.name))?;
            builder = builder.keyword(&keyword.name, function);
        }
        builder.build()
    }

    fn template_function(&self, keyword: &KeywordConfig) -> Result<KeywordFunction> {
        let signature = parse_arg_spec(&keyword.args)?;
        let mut function = KeywordFunction::from_implementation(template_implementation(
            signature.clone(),
            keyword.template.clone(),
        ));
        if let Some(doc) = &keyword.doc {
            function = function.with_doc(doc);
        }
        for atom in &keyword.casts {
            function = function.with_cast(TypeCast::new(TypeTag::from_atom(atom)?));
        }
        for (context, template) in &keyword.variants {
            let id: ContextId = context.parse()?;
            self.check_context(&id)?;
            function = function.with_variant(
                id,
                template_implementation(signature.clone(), template.clone()),
            );
        }
        Ok(function)
    }

    fn check_context(&self, id: &ContextId) -> Result<()> {
        let handler = self
            .contexts
            .iter()
            .find(|c| c.identifier == id.handler)
            .ok_or_else(|| anyhow!("unknown context handler `{}`", id.handler))?;
        if !handler.names.iter().any(|n| *n == id.name) {
            bail!("unknown context `{id}`");
        }
        Ok(())
    }
}

/// Parse `name`, `name=default`, `*name` and `**name` entries into a signature.
pub fn parse_arg_spec(entries: &[String]) -> Result<Signature> {
    let mut signature = Signature::default();
    for entry in entries {
        let entry = entry.trim();
        if let Some(name) = entry.strip_prefix("**") {
            if signature.kwargs.is_some() {
                bail!("duplicate `**` argument `{entry}`");
            }
            signature.kwargs = Some(check_name(name, entry)?);
        } else if let Some(name) = entry.strip_prefix('*') {
            if signature.varargs.is_some() || signature.kwargs.is_some() {
                bail!("misplaced `*` argument `{entry}`");
            }
            signature.varargs = Some(check_name(name, entry)?);
        } else {
            if signature.varargs.is_some() || signature.kwargs.is_some() {
                bail!("positional argument `{entry}` after variadic arguments");
            }
            match entry.split_once('=') {
                Some((name, default)) => {
                    signature.positional.push(check_name(name, entry)?);
                    signature.defaults.push(Value::parse_literal(default.trim()));
                }
                None => {
                    if !signature.defaults.is_empty() {
                        bail!("non-default argument `{entry}` follows default argument");
                    }
                    signature.positional.push(check_name(entry, entry)?);
                }
            }
        }
    }
    Ok(signature)
}

fn check_name(name: &str, entry: &str) -> Result<String> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        bail!("invalid argument name in `{entry}`");
    }
    Ok(name.to_string())
}

fn template_implementation(signature: Signature, template: String) -> Implementation {
    let declared = signature.clone();
    Implementation::new(signature, move |state: &mut LibraryState, call: CallArgs| {
        let bindings = bind(&declared, state, call)?;
        Ok(Value::Text(render(&template, &bindings)))
    })
}

fn bind(signature: &Signature, state: &LibraryState, call: CallArgs) -> Result<HashMap<String, String>> {
    let CallArgs { positional, named } = call;
    let declared = signature.positional.len();
    if positional.len() > declared && signature.varargs.is_none() {
        bail!(
            "expected at most {declared} arguments, got {}",
            positional.len()
        );
    }

    let mut bindings: HashMap<String, String> = HashMap::new();
    for (key, value) in state.variables() {
        bindings.insert(key.clone(), value.to_string());
    }
    for context in state.active_contexts() {
        bindings.insert(context.handler, context.name);
    }
    for handler in state.session_handlers() {
        if let Some(alias) = handler.current_alias() {
            bindings.insert(handler.identifier().to_string(), alias.to_string());
        }
    }

    let mut positional = positional.into_iter();
    for (idx, name) in signature.positional.iter().enumerate() {
        let value = match positional.next() {
            Some(value) => value,
            None => match named.get(name).or_else(|| signature.default_for(idx)) {
                Some(value) => value.clone(),
                None => bail!("missing required argument '{name}'"),
            },
        };
        bindings.insert(name.clone(), value.to_string());
    }
    if let Some(varargs) = &signature.varargs {
        let rest: Vec<Value> = positional.collect();
        bindings.insert(varargs.clone(), Value::List(rest).to_string());
    }
    let mut extra: BTreeMap<&str, &Value> = BTreeMap::new();
    for (key, value) in named.iter() {
        if signature.positional.iter().any(|p| p == key) {
            continue;
        }
        if signature.kwargs.is_none() {
            bail!("got an unexpected keyword argument '{key}'");
        }
        extra.insert(key, value);
    }
    for (key, value) in extra {
        bindings.insert(key.to_string(), value.to_string());
    }
    Ok(bindings)
}

/// Replace `{key}` placeholders; unknown placeholders are kept verbatim.
pub fn render(template: &str, bindings: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match bindings.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::kwargs::KwArgs;

    const DEMO: &str = r#"{
        "name": "Demo",
        "sessions": [
            {"identifier": "connection", "auto_explicit": true}
        ],
        "contexts": [
            {"identifier": "mode", "names": ["normal", "loud"], "auto_explicit": true}
        ],
        "keywords": [
            {
                "name": "Greet",
                "args": ["who", "greeting=Hello"],
                "doc": "Greet somebody.",
                "template": "{greeting}, {who} via {connection}",
                "variants": [["mode.loud", "{greeting}, {who}!!!"]]
            },
            {
                "name": "Add One",
                "args": ["n"],
                "casts": ["int"],
                "template": "{n}+1"
            }
        ]
    }"#;

    fn demo() -> Result<Library> {
        LibraryConfig::from_json(DEMO)?.build()
    }

    #[test]
    fn builds_handlers_builtins_and_templates() -> Result<()> {
        let lib = demo()?;
        assert_eq!(lib.name(), "Demo");
        let rendered: Vec<String> = ["Greet", "Open Connection", "Add One"]
            .iter()
            .filter_map(|name| lib.keyword(name).map(|k| k.to_string()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "Demo.Greet [ who | greeting=Hello | **options ]",
                "Demo.Open Connection [ alias | *args ]",
                "Demo.Add One [ n | **options ]",
            ]
        );
        assert!(lib.keyword("Set Variable").is_some());
        Ok(())
    }

    #[test]
    fn template_keywords_follow_sessions_and_contexts() -> Result<()> {
        let mut lib = demo()?;
        lib.run_keyword("Open Connection", vec!["primary".into()], KwArgs::new())?;
        lib.run_keyword("Open Connection", vec!["backup".into()], KwArgs::new())?;

        let out = lib.run_keyword("Greet", vec!["Ann".into()], KwArgs::new())?;
        assert_eq!(out, Value::from("Hello, Ann via backup"));

        let named: KwArgs = [("connection", "primary"), ("greeting", "Hi")].into_iter().collect();
        let out = lib.run_keyword("Greet", vec!["Ann".into()], named)?;
        assert_eq!(out, Value::from("Hi, Ann via primary"));
        assert_eq!(lib.state().current_session_alias("connection"), Some("backup"));

        let named: KwArgs = [("mode", "loud")].into_iter().collect();
        let out = lib.run_keyword("Greet", vec!["Ann".into()], named)?;
        assert_eq!(out, Value::from("Hello, Ann!!!"));
        assert_eq!(lib.state().current_context("mode"), Some("normal"));
        Ok(())
    }

    #[test]
    fn surplus_named_argument_overflows_template_arity() -> Result<()> {
        let mut lib = demo()?;
        let named: KwArgs = [("colour", "red")].into_iter().collect();
        let err = lib
            .run_keyword("Greet", vec!["Ann".into(), "Hey".into()], named)
            .unwrap_err();
        assert_eq!(err.to_string(), "expected at most 2 arguments, got 3");
        Ok(())
    }

    #[test]
    fn casts_are_applied_before_rendering() -> Result<()> {
        let mut lib = demo()?;
        let out = lib.run_keyword("Add One", vec!["41".into()], KwArgs::new())?;
        assert_eq!(out, Value::from("41+1"));
        let err = lib
            .run_keyword("Add One", vec!["x".into()], KwArgs::new())
            .unwrap_err();
        assert!(err.to_string().starts_with("argument 0 cannot be converted to int"));
        Ok(())
    }

    #[test]
    fn variants_must_name_known_contexts() {
        let text = r#"{"keywords": [{"name": "K", "template": "", "variants": [["mode.x", ""]]}]}"#;
        let err = LibraryConfig::from_json(text)
            .and_then(|config| config.build())
            .err()
            .map(|e| format!("{e:#}"));
        assert_eq!(
            err.as_deref(),
            Some("keyword `K`: unknown context handler `mode`")
        );
    }

    #[test]
    fn arg_spec_parsing() -> Result<()> {
        let spec: Vec<String> = ["a", "b=2", "*rest", "**opts"].iter().map(|s| s.to_string()).collect();
        let sig = parse_arg_spec(&spec)?;
        assert_eq!(sig.positional, vec!["a", "b"]);
        assert_eq!(sig.defaults, vec![Value::Int(2)]);
        assert_eq!(sig.varargs.as_deref(), Some("rest"));
        assert_eq!(sig.kwargs.as_deref(), Some("opts"));

        let bad: Vec<String> = vec!["a=1".into(), "b".into()];
        assert!(parse_arg_spec(&bad).is_err());
        let bad: Vec<String> = vec!["1x".into()];
        assert!(parse_arg_spec(&bad).is_err());
        Ok(())
    }

    #[test]
    fn render_keeps_unknown_placeholders() {
        let bindings: HashMap<String, String> = [("a".to_string(), "1".to_string())].into_iter().collect();
        assert_eq!(render("{a}-{b}-{a", &bindings), "1-{b}-{a");
    }

    #[test]
    fn loads_from_file_and_defaults_without_path() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(DEMO.as_bytes())?;
        let config = LibraryConfig::load(Some(file.path()))?;
        assert_eq!(config.keywords.len(), 2);

        let fallback = LibraryConfig::load(None)?;
        assert_eq!(fallback.name, "Library");
        assert!(fallback.build()?.keyword("Log").is_some());
        Ok(())
    }
}
