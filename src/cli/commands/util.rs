use std::path::Path;

use anyhow::{Result, anyhow, bail};

use robolib::{KwArgs, Library, LibraryConfig, Value};

pub(crate) fn load_library(config: Option<&Path>) -> Result<Library> {
    let config = LibraryConfig::load(config)?;
    config.build()
}

/// Split a keyword line `Name | arg | key=value` into its trimmed cells.
pub(crate) fn parse_line(line: &str) -> Result<(String, Vec<String>)> {
    let mut cells = line.split('|').map(|cell| cell.trim().to_string());
    let name = cells.next().unwrap_or_default();
    if name.is_empty() {
        bail!("missing keyword name in `{line}`");
    }
    Ok((name, cells.collect()))
}

/// Turn CLI tokens into call arguments for keyword `name`.
///
/// `key=value` becomes a named argument when `key` is the identifier of an
/// auto-explicit session or context kind, a declared parameter of the keyword, or any
/// identifier when the keyword takes free keyword arguments. Everything else
/// is a positional literal.
pub(crate) fn parse_invocation(
    library: &Library,
    name: &str,
    tokens: &[String],
) -> Result<(Vec<Value>, KwArgs)> {
    let keyword = library
        .keyword(name)
        .ok_or_else(|| anyhow!("no keyword with name '{name}'"))?;
    let signature = keyword.function().base().signature();
    let declared: Vec<String> = keyword
        .args()
        .iter()
        .filter(|spec| !spec.starts_with('*'))
        .map(|spec| spec.split('=').next().unwrap_or_default().to_string())
        .collect();
    let state = library.state();
    let is_named = |key: &str| {
        state.session_handler(key).is_some_and(|h| h.auto_explicit())
            || state.context_handler(key).is_some_and(|h| h.auto_explicit())
            || declared.iter().any(|d| d == key)
            || (signature.kwargs.is_some() && is_identifier(key))
    };

    let mut args = Vec::new();
    let mut kwargs = KwArgs::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) if is_named(key.trim()) => {
                if kwargs
                    .insert(key.trim(), Value::parse_literal(value.trim()))
                    .is_some()
                {
                    bail!("argument `{}` given more than once", key.trim());
                }
            }
            _ => {
                if !kwargs.is_empty() {
                    bail!("positional argument `{token}` follows named arguments");
                }
                args.push(Value::parse_literal(token));
            }
        }
    }
    Ok((args, kwargs))
}

/// Parse and run one keyword line, returning the keyword's result.
pub(crate) fn run_line(library: &mut Library, line: &str) -> Result<Value> {
    let (name, cells) = parse_line(line)?;
    let (args, kwargs) = parse_invocation(library, &name, &cells)?;
    Ok(library.run_keyword(&name, args, kwargs)?)
}

pub(crate) fn print_value(value: &Value) {
    if *value != Value::None {
        println!("{value}");
    }
}

fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "name": "Shop",
        "sessions": [
            {"identifier": "cart", "auto_explicit": true},
            {"identifier": "till"}
        ],
        "keywords": [
            {"name": "Add Item", "args": ["item", "count=1"], "template": "{cart}:{item}x{count}"},
            {"name": "Tag", "args": ["**tags"], "template": "{colour}"}
        ]
    }"#;

    fn library() -> Result<Library> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(CONFIG.as_bytes())?;
        load_library(Some(file.path()))
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_line_splits_cells() -> Result<()> {
        let (name, cells) = parse_line("Add Item |  apple | count=3 ")?;
        assert_eq!(name, "Add Item");
        assert_eq!(cells, tokens(&["apple", "count=3"]));
        assert!(parse_line(" | x").is_err());
        Ok(())
    }

    #[test]
    fn named_tokens_need_a_known_key() -> Result<()> {
        let lib = library()?;
        let (args, kwargs) =
            parse_invocation(&lib, "add item", &tokens(&["a=b", "count=3", "cart=main"]))?;
        assert_eq!(args, vec![Value::from("a=b")]);
        assert_eq!(kwargs.get("count"), Some(&Value::Int(3)));
        assert_eq!(kwargs.get("cart"), Some(&Value::from("main")));

        let (_, kwargs) = parse_invocation(&lib, "Tag", &tokens(&["colour=red"]))?;
        assert_eq!(kwargs.get("colour"), Some(&Value::from("red")));

        assert!(parse_invocation(&lib, "Add Item", &tokens(&["count=1", "apple"])).is_err());

        let (args, kwargs) = parse_invocation(&lib, "Add Item", &tokens(&["till=front"]))?;
        assert_eq!(args, vec![Value::from("till=front")]);
        assert!(kwargs.is_empty());
        assert!(parse_invocation(&lib, "Missing", &[]).is_err());
        Ok(())
    }

    #[test]
    fn lines_run_against_one_library() -> Result<()> {
        let mut lib = library()?;
        run_line(&mut lib, "Open Cart | first")?;
        run_line(&mut lib, "Open Cart | second")?;
        assert_eq!(
            run_line(&mut lib, "Add Item | pear | count=2")?,
            Value::from("second:pearx2")
        );
        assert_eq!(
            run_line(&mut lib, "Add Item | pear | cart=first")?,
            Value::from("first:pearx1")
        );
        assert_eq!(lib.state().current_session_alias("cart"), Some("second"));
        assert_eq!(run_line(&mut lib, "Tag | colour=blue")?, Value::from("blue"));
        Ok(())
    }
}
