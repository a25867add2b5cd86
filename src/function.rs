//! Keyword function descriptors produced at registration time.
//!
//! A [`KeywordFunction`] bundles the base implementation with everything the
//! keyword engine consults per call: an optional argument-name override, the
//! per-position casts, and the ordered context variants.

use std::fmt;
use std::rc::Rc;

use crate::context::ContextId;
use crate::error::KeywordError;
use crate::kwargs::KwArgs;
use crate::library::LibraryState;
use crate::types::TypeTag;
use crate::value::Value;

/// Arguments handed to an implementation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: KwArgs,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>, named: KwArgs) -> Self {
        Self { positional, named }
    }

    /// Positional argument `idx`, falling back to the named argument `name`.
    pub fn get(&self, idx: usize, name: &str) -> Option<&Value> {
        self.positional.get(idx).or_else(|| self.named.get(name))
    }
}

pub type KeywordFn = Rc<dyn Fn(&mut LibraryState, CallArgs) -> anyhow::Result<Value>>;

/// Declared parameters of an implementation. The library receiver is never listed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signature {
    pub positional: Vec<String>,
    /// Defaults bound to the trailing positional names.
    pub defaults: Vec<Value>,
    pub varargs: Option<String>,
    pub kwargs: Option<String>,
}

impl Signature {
    pub fn new<I, N>(positional: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            positional: positional.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_defaults(mut self, defaults: impl IntoIterator<Item = Value>) -> Self {
        self.defaults = defaults.into_iter().collect();
        self
    }

    pub fn with_varargs(mut self, name: impl Into<String>) -> Self {
        self.varargs = Some(name.into());
        self
    }

    pub fn with_kwargs(mut self, name: impl Into<String>) -> Self {
        self.kwargs = Some(name.into());
        self
    }

    /// Default of positional parameter `idx`, if it falls within the trailing defaults window.
    pub fn default_for(&self, idx: usize) -> Option<&Value> {
        let from_end = self.positional.len().checked_sub(idx)?;
        let start = self.defaults.len().checked_sub(from_end)?;
        self.defaults.get(start)
    }
}

/// A callable together with its declared signature.
#[derive(Clone)]
pub struct Implementation {
    signature: Signature,
    func: KeywordFn,
}

impl Implementation {
    pub fn new(
        signature: Signature,
        func: impl Fn(&mut LibraryState, CallArgs) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        Self {
            signature,
            func: Rc::new(func),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn invoke(&self, state: &mut LibraryState, args: CallArgs) -> anyhow::Result<Value> {
        (self.func)(state, args)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

type Converter = Rc<dyn Fn(&Value) -> anyhow::Result<Value>>;

/// Expected type of one positional argument plus the converter applied otherwise.
#[derive(Clone)]
pub struct TypeCast {
    expected: TypeTag,
    convert: Converter,
}

impl TypeCast {
    /// Cast using the default conversion of [`Value::coerce`].
    pub fn new(expected: TypeTag) -> Self {
        Self::with_converter(expected, move |value| value.coerce(expected))
    }

    pub fn with_converter(
        expected: TypeTag,
        convert: impl Fn(&Value) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        Self {
            expected,
            convert: Rc::new(convert),
        }
    }

    pub fn expected(&self) -> TypeTag {
        self.expected
    }

    pub fn apply(&self, value: Value) -> anyhow::Result<Value> {
        if value.is(self.expected) {
            return Ok(value);
        }
        (self.convert)(&value)
    }
}

impl fmt::Debug for TypeCast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeCast").field(&self.expected).finish()
    }
}

/// Registered keyword: base implementation, casts, overrides and context variants.
#[derive(Clone, Debug)]
pub struct KeywordFunction {
    doc: Option<String>,
    args: Option<Vec<String>>,
    casts: Vec<TypeCast>,
    base: Implementation,
    variants: Vec<(ContextId, Implementation)>,
}

impl KeywordFunction {
    pub fn new(
        signature: Signature,
        func: impl Fn(&mut LibraryState, CallArgs) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        Self::from_implementation(Implementation::new(signature, func))
    }

    pub fn from_implementation(base: Implementation) -> Self {
        Self {
            doc: None,
            args: None,
            casts: Vec::new(),
            base,
            variants: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Override the reported argument spec; reflection is ignored when set.
    pub fn with_args<I, N>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cast(mut self, cast: TypeCast) -> Self {
        self.casts.push(cast);
        self
    }

    /// Register `implementation` for when `context` is active. Later variants take priority.
    pub fn with_variant(mut self, context: ContextId, implementation: Implementation) -> Self {
        self.variants.push((context, implementation));
        self
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn explicit_args(&self) -> Option<&[String]> {
        self.args.as_deref().filter(|args| !args.is_empty())
    }

    pub fn casts(&self) -> &[TypeCast] {
        &self.casts
    }

    pub fn base(&self) -> &Implementation {
        &self.base
    }

    pub fn variants(&self) -> &[(ContextId, Implementation)] {
        &self.variants
    }

    /// Handler identifiers that own at least one variant, in order of first appearance.
    pub fn context_handlers(&self) -> Vec<String> {
        let mut handlers: Vec<String> = Vec::new();
        for (context, _) in &self.variants {
            if !handlers.contains(&context.handler) {
                handlers.push(context.handler.clone());
            }
        }
        handlers
    }

    /// Apply the per-position casts; arguments past the cast list pass through.
    pub fn cast_args(&self, args: Vec<Value>) -> Result<Vec<Value>, KeywordError> {
        if self.casts.is_empty() {
            return Ok(args);
        }
        args.into_iter()
            .enumerate()
            .map(|(index, arg)| match self.casts.get(index) {
                Some(cast) => cast.apply(arg).map_err(|source| KeywordError::Cast {
                    index,
                    expected: cast.expected(),
                    source,
                }),
                None => Ok(arg),
            })
            .collect()
    }

    /// The implementation to call: the last variant whose context is active, else the base.
    pub fn resolve(&self, is_active: impl Fn(&ContextId) -> bool) -> &Implementation {
        let mut resolved = &self.base;
        for (context, implementation) in &self.variants {
            if is_active(context) {
                resolved = implementation;
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Implementation {
        Implementation::new(Signature::default(), |_, _| Ok(Value::None))
    }

    #[test]
    fn defaults_bind_to_trailing_names() {
        let sig = Signature::new(["x", "y", "z"]).with_defaults([Value::Int(1), Value::Int(2)]);
        assert_eq!(sig.default_for(0), None);
        assert_eq!(sig.default_for(1), Some(&Value::Int(1)));
        assert_eq!(sig.default_for(2), Some(&Value::Int(2)));
        assert_eq!(sig.default_for(3), None);
    }

    #[test]
    fn extra_defaults_align_from_the_end() {
        let sig = Signature::new(["a"]).with_defaults([Value::Int(1), Value::Int(2)]);
        assert_eq!(sig.default_for(0), Some(&Value::Int(2)));
    }

    #[test]
    fn casts_apply_per_position() -> anyhow::Result<()> {
        let func = KeywordFunction::from_implementation(noop())
            .with_cast(TypeCast::new(TypeTag::Int))
            .with_cast(TypeCast::new(TypeTag::Text));
        let cast = func.cast_args(vec![
            Value::from("5"),
            Value::Int(6),
            Value::from("rest"),
        ])?;
        assert_eq!(cast, vec![Value::Int(5), Value::from("6"), Value::from("rest")]);
        Ok(())
    }

    #[test]
    fn failed_cast_reports_position() {
        let func = KeywordFunction::from_implementation(noop())
            .with_cast(TypeCast::new(TypeTag::Float))
            .with_cast(TypeCast::new(TypeTag::Int));
        let err = func
            .cast_args(vec![Value::from("1.5"), Value::from("x")])
            .unwrap_err();
        match err {
            KeywordError::Cast {
                index, expected, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(expected, TypeTag::Int);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn custom_converter_only_runs_on_mismatch() -> anyhow::Result<()> {
        let cast = TypeCast::with_converter(TypeTag::Int, |v| Ok(Value::Int(v.to_string().len() as i64)));
        assert_eq!(cast.apply(Value::from("abcd"))?, Value::Int(4));
        assert_eq!(cast.apply(Value::Int(9))?, Value::Int(9));
        Ok(())
    }

    #[test]
    fn last_active_variant_wins() {
        let marked = |tag: i64| {
            Implementation::new(Signature::default(), move |_, _| Ok(Value::Int(tag)))
        };
        let func = KeywordFunction::from_implementation(marked(0))
            .with_variant(ContextId::new("mode", "a"), marked(1))
            .with_variant(ContextId::new("lang", "b"), marked(2))
            .with_variant(ContextId::new("mode", "c"), marked(3));
        assert_eq!(func.context_handlers(), vec!["mode".to_string(), "lang".to_string()]);

        let mut state = LibraryState::new("Lib");
        let mut call = |active: &[ContextId]| {
            func.resolve(|ctx| active.contains(ctx))
                .invoke(&mut state, CallArgs::default())
                .unwrap()
        };
        assert_eq!(call(&[]), Value::Int(0));
        assert_eq!(call(&[ContextId::new("mode", "a")]), Value::Int(1));
        assert_eq!(
            call(&[ContextId::new("mode", "a"), ContextId::new("lang", "b")]),
            Value::Int(2)
        );
        assert_eq!(
            call(&[ContextId::new("lang", "b"), ContextId::new("mode", "c")]),
            Value::Int(3)
        );
    }

    #[test]
    fn empty_override_falls_back_to_signature() {
        let func = KeywordFunction::from_implementation(noop()).with_args(Vec::<String>::new());
        assert!(func.explicit_args().is_none());
    }
}
