#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use bugtrack_core::config::{self, UserConfig};
use bugtrack_core::error::ErrorCode;
use clap::{CommandFactory, Parser, Subcommand};
use cmd::Globals;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "bt: role-aware bug tracker for small project teams",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (unless BUGTRACK_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (id or email); overrides BUGTRACK_USER and login.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tracker in the current directory",
        after_help = "EXAMPLES:\n    bt init\n    bt init --force --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Identity",
        about = "Register a new user",
        after_help = "EXAMPLES:\n    bt register --name Ana --email ana@example.com --password s3cret"
    )]
    Register(cmd::user::RegisterArgs),

    #[command(
        next_help_heading = "Identity",
        about = "Check credentials and remember the user as the default actor"
    )]
    Login(cmd::user::LoginArgs),

    #[command(next_help_heading = "Identity", about = "Show the acting user")]
    Whoami,

    #[command(next_help_heading = "Identity", about = "Change your credential")]
    Passwd(cmd::user::PasswdArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Create, inspect, and join projects",
        after_help = "EXAMPLES:\n    bt project create --name Tracker --repo git@example.com:t.git\n    bt project join 3\n    bt project members 3 --json"
    )]
    Project {
        #[command(subcommand)]
        command: cmd::project::ProjectCommand,
    },

    #[command(
        next_help_heading = "Bugs",
        about = "Report bugs and move them through their lifecycle",
        after_help = "EXAMPLES:\n    bt bug report --project 3 \"save button does nothing\" --severity high\n    bt bug assign 7\n    bt bug resolve 7 --commit 4f2a9c1"
    )]
    Bug {
        #[command(subcommand)]
        command: cmd::bug::BugCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    bt completions bash\n    bt completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BUGTRACK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "bugtrack=debug,info"
        } else {
            "bugtrack=info,warn"
        })
    });

    let format = env::var("BUGTRACK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode, user_config: &UserConfig) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let globals = Globals {
        output,
        user_flag: cli.user.as_deref(),
        user_config,
    };

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Register(args) => cmd::user::run_register(args, globals, &project_root),
        Commands::Login(args) => cmd::user::run_login(args, globals, &project_root),
        Commands::Whoami => cmd::user::run_whoami(globals, &project_root),
        Commands::Passwd(args) => cmd::user::run_passwd(args, globals, &project_root),
        Commands::Project { command } => {
            cmd::project::run_project(command, globals, &project_root)
        }
        Commands::Bug { command } => cmd::bug::run_bug(command, globals, &project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user_config = config::load_user_config().unwrap_or_else(|err| {
        tracing::warn!("ignoring user config: {err:#}");
        UserConfig::default()
    });
    let output = OutputMode::from_name(&config::resolve_output(cli.json, &user_config));

    match run(&cli, output, &user_config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.downcast_ref::<cmd::Reported>().is_none() {
                let cli_err = CliError::coded(ErrorCode::InternalUnexpected, format!("{err:#}"));
                if render_error(output, &cli_err).is_err() {
                    eprintln!("error: {err:#}");
                }
            }
            tracing::debug!(json = output.is_json(), "command failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
