use crate::demo::{run_demo, DemoArgs};
use crate::infra::{parse_job, SeedJob};
use crate::server;
use clap::{Args, Parser, Subcommand};
use interview_booking::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Interview Booking",
    about = "Run the interview availability and booking service from the command line",
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
    /// Race several candidates for one interview slot against the in-memory store
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
    /// Register a job posting as EMPLOYER_ID:JOB_ID[:TITLE] (repeatable)
    #[arg(long = "job", value_parser = parse_job)]
    pub(crate) jobs: Vec<SeedJob>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
