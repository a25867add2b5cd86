//! Dynamic values passed to and returned from keyword implementations.

use std::fmt;

use anyhow::{Result, anyhow, bail};

use crate::types::TypeTag;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::None => TypeTag::None,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Text(_) => TypeTag::Text,
            Value::List(_) => TypeTag::List,
        }
    }

    /// True when the value already is of kind `tag`.
    pub fn is(&self, tag: TypeTag) -> bool {
        self.type_tag() == tag
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse a literal token the way command lines and scripts spell values.
    pub fn parse_literal(token: &str) -> Value {
        if token == "~" || token == "None" || token.eq_ignore_ascii_case("null") {
            return Value::None;
        }
        if let Ok(i) = token.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = token.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Text(token.to_string())
    }

    /// Convert into kind `tag`, the default converter of a per-position cast.
    pub fn coerce(&self, tag: TypeTag) -> Result<Value> {
        if self.is(tag) {
            return Ok(self.clone());
        }
        let converted = match (tag, self) {
            (TypeTag::Text, other) => Value::Text(other.to_string()),
            (TypeTag::Int, Value::Bool(b)) => Value::Int(i64::from(*b)),
            (TypeTag::Int, Value::Float(f)) if f.is_finite() => Value::Int(f.trunc() as i64),
            (TypeTag::Int, Value::Text(s)) => Value::Int(
                s.trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid literal for int: '{s}'"))?,
            ),
            (TypeTag::Float, Value::Bool(b)) => Value::Float(if *b { 1.0 } else { 0.0 }),
            (TypeTag::Float, Value::Int(n)) => Value::Float(*n as f64),
            (TypeTag::Float, Value::Text(s)) => Value::Float(
                s.trim()
                    .parse()
                    .map_err(|_| anyhow!("could not convert string to float: '{s}'"))?,
            ),
            (TypeTag::Bool, Value::None) => Value::Bool(false),
            (TypeTag::Bool, Value::Int(n)) => Value::Bool(*n != 0),
            (TypeTag::Bool, Value::Float(f)) => Value::Bool(*f != 0.0),
            (TypeTag::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Value::Bool(true),
                "false" | "no" | "off" | "0" | "" => Value::Bool(false),
                _ => bail!("invalid literal for bool: '{s}'"),
            },
            (TypeTag::Bool, Value::List(items)) => Value::Bool(!items.is_empty()),
            (TypeTag::List, Value::Text(s)) => Value::List(
                s.chars().map(|c| Value::Text(c.to_string())).collect(),
            ),
            (tag, other) => bail!("cannot convert {} to {tag}", other.type_tag()),
        };
        Ok(converted)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_prefers_numbers() {
        assert_eq!(Value::parse_literal("42"), Value::Int(42));
        assert_eq!(Value::parse_literal("2.5"), Value::Float(2.5));
        assert_eq!(Value::parse_literal("~"), Value::None);
        assert_eq!(Value::parse_literal("abc"), Value::Text("abc".into()));
    }

    #[test]
    fn coerce_text_to_numbers() -> Result<()> {
        assert_eq!(Value::from(" 7 ").coerce(TypeTag::Int)?, Value::Int(7));
        assert_eq!(Value::from("1.5").coerce(TypeTag::Float)?, Value::Float(1.5));
        assert_eq!(Value::from("yes").coerce(TypeTag::Bool)?, Value::Bool(true));
        assert_eq!(Value::Int(3).coerce(TypeTag::Text)?, Value::from("3"));
        let err = Value::from("seven").coerce(TypeTag::Int).unwrap_err();
        assert_eq!(err.to_string(), "invalid literal for int: 'seven'");
        assert!(Value::Int(1).coerce(TypeTag::None).is_err());
        Ok(())
    }

    #[test]
    fn display_matches_default_rendering() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        let list = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(list.to_string(), "[1, a]");
    }

    #[test]
    fn integral_floats_keep_their_point() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(-3.0).to_string(), "-3.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::parse_literal("2.0").to_string(), "2.0");
        assert_eq!(Value::Float(4.0).coerce(TypeTag::Text).ok(), Some(Value::from("4.0")));
    }
}
