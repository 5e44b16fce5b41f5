use crate::commands::{run_allocate, run_generate, run_plan, AllocateArgs, GenerateArgs, PlanArgs};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use sales_intel::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "sales-intel",
    about = "Prioritize accounts, allocate sales actions, and draft pre-call plans",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write a synthetic account dataset to CSV
    Generate(GenerateArgs),
    /// Score accounts and allocate the action budget
    Allocate(AllocateArgs),
    /// Draft a pre-call plan for one customer
    Plan(PlanArgs),
    /// Run the full pipeline on synthetic accounts and print the results
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Generate(args) => run_generate(args),
        Command::Allocate(args) => run_allocate(args),
        Command::Plan(args) => tokio::task::spawn_blocking(move || run_plan(args))
            .await
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?,
        Command::Demo(args) => run_demo(args),
    }
}
