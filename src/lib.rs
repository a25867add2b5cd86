//! Keyword libraries with per-call session and context switching.

pub mod builtin;
pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod keyword;
pub mod kwargs;
pub mod library;
pub mod name;
pub mod session;
pub mod types;
pub mod value;

pub type Result<T> = anyhow::Result<T>;

pub use config::LibraryConfig;
pub use context::{ContextError, ContextHandler, ContextId, Contexts};
pub use error::KeywordError;
pub use function::{CallArgs, Implementation, KeywordFunction, Signature, TypeCast};
pub use keyword::Keyword;
pub use kwargs::KwArgs;
pub use library::{Library, LibraryBuilder, LibraryState};
pub use session::{SessionError, SessionHandler, SessionRef, Sessions};
pub use types::TypeTag;
pub use value::Value;
