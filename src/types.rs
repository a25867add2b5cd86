//! Type tags used by per-position argument casts.

use anyhow::{Result, bail};

/// Compact representation of the dynamic value kinds keywords exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    None,
    Bool,
    Int,
    Float,
    Text,
    List,
}

impl TypeTag {
    /// Return the canonical string atom for this type.
    pub fn as_atom(self) -> &'static str {
        match self {
            TypeTag::None => "none",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Text => "text",
            TypeTag::List => "list",
        }
    }

    /// Parse a canonical atom into a `TypeTag`.
    pub fn from_atom(atom: &str) -> Result<TypeTag> {
        match atom {
            "none" => Ok(TypeTag::None),
            "bool" => Ok(TypeTag::Bool),
            "int" => Ok(TypeTag::Int),
            "float" => Ok(TypeTag::Float),
            "text" | "str" => Ok(TypeTag::Text),
            "list" => Ok(TypeTag::List),
            other => bail!("unknown type atom `{other}`"),
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_atom())
    }
}
