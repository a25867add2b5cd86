mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Parser)]
#[command(name = "robolib", version, about = "Run keywords of a configured keyword library")]
struct Cli {
    /// JSON library description; an empty library is used when omitted
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(
        long = "log-level",
        global = true,
        default_value = "warn",
        value_name = "LEVEL"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List keywords with their argument specs
    Keywords {
        #[arg(long = "prefix")]
        prefix: Option<String>,
    },
    /// Show the documentation of a keyword
    Doc { name: String },
    /// Run one keyword and print its result
    Run {
        name: String,
        /// Positional literals; `key=value` binds a handler or declared argument
        #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Run keyword lines (`Name | arg | key=value`) from a file, stopping at the first failure
    Script { file: PathBuf },
    /// Interactive keyword shell
    Shell,
}

pub(crate) fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    let mut library = commands::load_library(cli.config.as_deref())?;

    match cli.command {
        Command::Keywords { prefix } => commands::cmd_keywords(&library, prefix.as_deref()),
        Command::Doc { name } => commands::cmd_doc(&library, &name),
        Command::Run { name, args } => commands::cmd_run(&mut library, &name, &args),
        Command::Script { file } => commands::cmd_script(&mut library, &file),
        Command::Shell => commands::cmd_shell(&mut library),
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);
    tracing::subscriber::set_global_default(Registry::default().with(env_filter).with(fmt_layer))?;
    Ok(())
}
