use std::io::{self, BufRead, Write};

use anyhow::Result;

use robolib::{Library, LibraryState};

use super::util::{print_value, run_line};

pub(crate) fn cmd_shell(library: &mut Library) -> Result<()> {
    let stdin = io::stdin();
    let mut input = String::new();

    println!(
        "{} keyword shell. Commands: help, keywords, state, quit. Anything else runs a keyword line.",
        library.name()
    );
    loop {
        print!("robolib> ");
        io::stdout().flush().ok();
        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line {
            "help" => {
                println!(
                    "Commands:\n  keywords                     list keywords with their argument specs\n  state                        show current sessions, contexts and variables\n  Name | arg | key=value       run a keyword\n  quit/exit                    leave the shell"
                );
                Ok(())
            }
            "quit" | "exit" => break,
            "keywords" => {
                for keyword in library.keywords() {
                    println!("{keyword}");
                }
                Ok(())
            }
            "state" => {
                for entry in describe_state(library.state()) {
                    println!("{entry}");
                }
                Ok(())
            }
            _ => run_line(library, line).map(|value| print_value(&value)),
        };

        if let Err(err) = result {
            eprintln!("error: {err:#}");
        }
    }

    Ok(())
}

fn describe_state(state: &LibraryState) -> Vec<String> {
    let mut out = Vec::new();
    for handler in state.session_handlers() {
        let aliases: Vec<String> = handler.sessions().into_iter().map(|(a, _)| a).collect();
        out.push(format!(
            "{}: {} (open: {})",
            handler.identifier(),
            handler.current_alias().unwrap_or("-"),
            aliases.join(", ")
        ));
    }
    for context in state.active_contexts() {
        out.push(format!("{}: {}", context.handler, context.name));
    }
    for (key, value) in state.variables() {
        out.push(format!("${key} = {value}"));
    }
    if out.is_empty() {
        out.push("no sessions, contexts or variables".to_string());
    }
    out
}
