use std::ffi::OsString;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;

use kcedit_config::{ConfigError, KubeConfig};

/// List, import, export and switch kube config contexts
#[derive(Parser, Debug)]
#[command(name = "kcedit", version)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Kube config to edit, defaults to KUBECONFIG or ~/.kube/config
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List contexts, users or clusters
    Ls {
        /// One of: context, users, cluster
        target: Option<String>,
    },
    /// Import one or all contexts from another config file
    Import {
        filename: PathBuf,
        context_name: Option<String>,
    },
    /// Export a context with its cluster and user into a new file
    Export {
        filename: PathBuf,
        context_name: String,
    },
    /// Make a context the current one
    Switch { context_name: String },
}

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;

fn main() {
    process::exit(execute(std::env::args_os()));
}

/// Parse `argv`, run the command and return the process exit code.
fn execute<I, T>(argv: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(err) => return parse_failure(err),
    };

    init_logging(args.debug);

    let Some(command) = args.command else {
        let _ = Args::command().print_help();
        return EXIT_FAILURE;
    };

    match run(args.kubeconfig, command) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            eprintln!("Error: {err:#}");
            EXIT_FAILURE
        }
    }
}

/// help and version are not failures; an unknown command is reported and ignored
fn parse_failure(err: clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            EXIT_OK
        }
        ErrorKind::InvalidSubcommand => {
            let command = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(command)) => command.as_str(),
                _ => "",
            };
            println!("Unknown command: {command}");
            EXIT_OK
        }
        _ => {
            let _ = err.print();
            EXIT_FAILURE
        }
    }
}

/// Debug output goes to stderr so listings on stdout stay clean
fn init_logging(debug: bool) {
    if debug {
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_target(true)
            .try_init();
    }
}

fn run(kubeconfig: Option<PathBuf>, command: Command) -> Result<()> {
    let path = match kubeconfig {
        Some(path) => path,
        None => KubeConfig::default_path()?,
    };
    debug!(path = %path.display(), ?command, "running");
    let mut config = KubeConfig::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    match command {
        Command::Ls { target } => match target.as_deref() {
            None | Some("context") => print_lines(config.list_contexts()),
            Some("users") => print_lines(config.list_users()),
            Some("cluster") => print_lines(config.list_clusters()),
            Some(_) => println!("Unknown ls target. Use: context, users, cluster"),
        },
        Command::Import {
            filename,
            context_name,
        } => {
            let imported = config.import_file(&filename, context_name.as_deref());
            if let Some(summary) = report(imported)? {
                println!("Successfully imported {} context(s)", summary.contexts);
            }
        }
        Command::Export {
            filename,
            context_name,
        } => {
            if report(config.export_file(&filename, &context_name))?.is_some() {
                println!(
                    "Successfully exported context '{}' to {}",
                    context_name,
                    filename.display()
                );
            }
        }
        Command::Switch { context_name } => {
            if report(config.switch(&context_name))?.is_some() {
                println!("Switched to context '{}'", context_name);
            }
        }
    }

    Ok(())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

/// Missing files or contexts are reported and end the command normally.
/// Anything else is passed up.
fn report<T>(result: Result<T, ConfigError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_recoverable() => {
            println!("Error: {err}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
