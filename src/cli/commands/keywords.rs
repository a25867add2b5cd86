use anyhow::{Result, anyhow};

use robolib::Library;
use robolib::name::normalize;

pub(crate) fn cmd_keywords(library: &Library, prefix: Option<&str>) -> Result<()> {
    let prefix = prefix.map(normalize).unwrap_or_default();
    let mut found = false;
    for keyword in library
        .keywords()
        .filter(|k| normalize(k.name()).starts_with(&prefix))
    {
        println!("{keyword}");
        found = true;
    }
    if !found {
        println!("no keywords registered");
    }
    Ok(())
}

pub(crate) fn cmd_doc(library: &Library, name: &str) -> Result<()> {
    let keyword = library
        .keyword(name)
        .ok_or_else(|| anyhow!("no keyword with name '{name}'"))?;
    println!("{keyword}");
    match keyword.doc() {
        Some(doc) => println!("\n{doc}"),
        None => println!("\n(no documentation)"),
    }
    Ok(())
}
