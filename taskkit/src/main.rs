mod commands;
mod formatting;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use taskkit_core::config::{CONFIG_FILE, DEFAULT_TASK};
use taskkit_core::BumpType;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskkit")]
#[command(about = "Declarative build tasks with dependency ordering, watch mode and release pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Task to run
    #[arg(default_value = DEFAULT_TASK)]
    task: String,

    /// Version bump used by release tasks
    #[arg(long, value_enum, default_value = "patch")]
    bump: BumpArg,

    /// Run the dev task once without starting watch mode
    #[arg(long, action)]
    no_watch: bool,

    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tasks
    List {
        #[arg(long, action)]
        json: bool,
    },
    /// Show the task graph in dependency order
    Graph {
        #[arg(long, action)]
        json: bool,
        /// Print Graphviz DOT instead
        #[arg(long, action, conflicts_with = "json")]
        dot: bool,
    },
    /// Check the config for unknown tasks, cycles and bad watch bindings
    Validate {
        #[arg(long, action)]
        json: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum BumpArg {
    Major,
    Minor,
    Patch,
}

impl From<BumpArg> for BumpType {
    fn from(arg: BumpArg) -> Self {
        match arg {
            BumpArg::Major => BumpType::Major,
            BumpArg::Minor => BumpType::Minor,
            BumpArg::Patch => BumpType::Patch,
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::List { json }) => commands::cmd_list(&cli.config, json),
        Some(Commands::Graph { json, dot }) => commands::cmd_graph(&cli.config, json, dot),
        Some(Commands::Validate { json }) => commands::cmd_validate(&cli.config, json),
        None => commands::cmd_run(&cli.config, &cli.task, cli.bump.into(), cli.no_watch),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            commands::print_failure(&error);
            ExitCode::from(commands::exit_code(&error))
        }
    }
}
