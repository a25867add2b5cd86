mod keywords;
mod run;
mod script;
mod shell;
mod util;

pub(crate) use keywords::{cmd_doc, cmd_keywords};
pub(crate) use run::cmd_run;
pub(crate) use script::cmd_script;
pub(crate) use shell::cmd_shell;

pub(crate) use util::load_library;
