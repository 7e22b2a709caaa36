//! tunesync CLI entry point.

use clap::Parser;
use std::process::ExitCode;
use tunesync::cli::commands;
use tunesync::cli::{Cli, Commands};
use tunesync::config::Config;
use tunesync::error::Error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Version => return commands::version::execute(json),
        Commands::Completions { shell } => return commands::completions::execute(shell),
        Commands::Smart { command } => return commands::smart::execute(command, json),
        _ => {}
    }

    let config = Config::resolve(cli.db.as_deref(), cli.actor.as_deref())?;
    match &cli.command {
        Commands::Init { force } => commands::init::execute(&config, *force, json),
        Commands::Sync {
            file,
            include_system,
        } => commands::sync::execute(&config, file, *include_system, json),
        Commands::Track { command } => commands::track::execute(command, &config, json),
        Commands::Playlist { command } => commands::playlist::execute(command, &config, json),
        Commands::Version | Commands::Completions { .. } | Commands::Smart { .. } => Ok(()),
    }
}
