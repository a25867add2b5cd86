use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use robolib::Library;

use super::util::{print_value, run_line};

pub(crate) fn cmd_script(library: &mut Library, file: &Path) -> Result<()> {
    let text =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let mut executed = 0usize;
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value = run_line(library, line)
            .with_context(|| format!("{}:{}: `{line}`", file.display(), idx + 1))?;
        print_value(&value);
        executed += 1;
    }
    tracing::info!(executed, "script finished");
    Ok(())
}
