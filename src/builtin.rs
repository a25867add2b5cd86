//! Keywords every configured library carries.

use anyhow::{anyhow, bail};

use crate::function::{CallArgs, KeywordFunction, Signature};
use crate::library::LibraryState;
use crate::value::Value;

pub fn builtin_keywords() -> Vec<(String, KeywordFunction)> {
    let set_variable = KeywordFunction::new(
        Signature::new(["name", "value"]),
        |state: &mut LibraryState, call: CallArgs| {
            let name = required(&call, 0, "name")?.to_string();
            let value = required(&call, 1, "value")?.clone();
            state.set_variable(name, value);
            Ok(Value::None)
        },
    )
    .with_doc("Store `value` in the library variable `name`.");

    let get_variable = KeywordFunction::new(
        Signature::new(["name", "default"]).with_defaults([Value::None]),
        |state: &mut LibraryState, call: CallArgs| {
            let name = required(&call, 0, "name")?.to_string();
            match (state.variable(&name), call.get(1, "default")) {
                (Some(value), _) => Ok(value.clone()),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(anyhow!("Variable '{name}' not found.")),
            }
        },
    )
    .with_doc("Return the library variable `name`.\n\nFalls back to `default` when given.");

    let log = KeywordFunction::new(
        Signature::new(["message", "level"]).with_defaults([Value::from("INFO")]),
        |_: &mut LibraryState, call: CallArgs| {
            let message = required(&call, 0, "message")?.to_string();
            let level = call
                .get(1, "level")
                .map(Value::to_string)
                .unwrap_or_else(|| "INFO".to_string());
            match level.to_ascii_uppercase().as_str() {
                "TRACE" => tracing::trace!(target: "robolib::log", "{message}"),
                "DEBUG" => tracing::debug!(target: "robolib::log", "{message}"),
                "INFO" => tracing::info!(target: "robolib::log", "{message}"),
                "WARN" => tracing::warn!(target: "robolib::log", "{message}"),
                "ERROR" => tracing::error!(target: "robolib::log", "{message}"),
                other => bail!("Invalid log level '{other}'."),
            }
            Ok(Value::Text(message))
        },
    )
    .with_doc("Log `message` at `level` and return it.");

    vec![
        ("Set Variable".to_string(), set_variable),
        ("Get Variable".to_string(), get_variable),
        ("Log".to_string(), log),
    ]
}

fn required<'a>(call: &'a CallArgs, idx: usize, name: &str) -> anyhow::Result<&'a Value> {
    call.get(idx, name)
        .ok_or_else(|| anyhow!("missing required argument '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kwargs::KwArgs;
    use crate::library::Library;

    fn library() -> anyhow::Result<Library> {
        let mut builder = Library::builder("Builtins");
        for (name, function) in builtin_keywords() {
            builder = builder.keyword(name, function);
        }
        builder.build()
    }

    #[test]
    fn variables_roundtrip_through_keywords() -> anyhow::Result<()> {
        let mut lib = library()?;
        lib.run_keyword("Set Variable", vec!["x".into(), Value::Int(3)], KwArgs::new())?;
        let got = lib.run_keyword("Get Variable", vec!["x".into()], KwArgs::new())?;
        assert_eq!(got, Value::Int(3));
        assert_eq!(lib.state().variable("x"), Some(&Value::Int(3)));
        Ok(())
    }

    #[test]
    fn missing_variable_uses_default_or_fails() -> anyhow::Result<()> {
        let mut lib = library()?;
        let err = lib
            .run_keyword("Get Variable", vec!["nope".into()], KwArgs::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Variable 'nope' not found.");
        let named: KwArgs = [("default", "fallback")].into_iter().collect();
        let got = lib.run_keyword("Get Variable", vec!["nope".into()], named)?;
        assert_eq!(got, Value::from("fallback"));
        Ok(())
    }

    #[test]
    fn log_rejects_unknown_level() -> anyhow::Result<()> {
        let mut lib = library()?;
        let out = lib.run_keyword("Log", vec!["hello".into()], KwArgs::new())?;
        assert_eq!(out, Value::from("hello"));
        let err = lib
            .run_keyword("Log", vec!["hello".into(), "LOUD".into()], KwArgs::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid log level 'LOUD'.");
        Ok(())
    }
}
