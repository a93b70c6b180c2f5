//! LoopGrab Command-Line Interface
//!
//! Starts loop-aligned audio captures and reports their progress through the
//! capture service's IPC socket.

mod client;
mod colors;
mod commands;
mod exit_codes;

use clap::{Parser, Subcommand};
use exit_codes::ExitCode;

/// LoopGrab - capture one full loop of a video's audio as WAV
#[derive(Parser, Debug)]
#[command(name = "loopgrab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture one full iteration of the best video, from its loop start
    Start,
    /// Show the current capture status
    Status {
        /// Refresh every second until the running capture settles
        #[arg(short, long)]
        watch: bool,
    },
    /// Check that the service is reachable
    Ping,
    /// Show version information
    Version,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                ExitCode::InvalidArguments
            } else {
                ExitCode::Success
            };
            std::process::exit(code.as_i32());
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", colors::error(&format!("Failed to create runtime: {}", e)));
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    };

    let exit_code = runtime.block_on(run(cli));
    std::process::exit(exit_code.as_i32());
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::Start => commands::start(cli.json, cli.quiet).await,
        Commands::Status { watch } => commands::status(cli.json, watch).await,
        Commands::Ping => commands::ping(cli.json).await,
        Commands::Version => {
            commands::version(cli.json);
            ExitCode::Success
        }
    }
}
