use anyhow::Result;

use robolib::Library;

use super::util::{parse_invocation, print_value};

pub(crate) fn cmd_run(library: &mut Library, name: &str, tokens: &[String]) -> Result<()> {
    let (args, kwargs) = parse_invocation(library, name, tokens)?;
    let value = library.run_keyword(name, args, kwargs)?;
    print_value(&value);
    Ok(())
}
