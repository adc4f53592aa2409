use crate::commands::{run_dataset, run_score, run_train, DatasetArgs, ScoreArgs, TrainArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use farm_biosecurity::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Farm Biosecurity Assessor",
    about = "Score farm biosecurity questionnaires and manage the trained risk model",
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
    /// Train candidate models on a synthetic dataset and save the winner
    Train(TrainArgs),
    /// Write a labeled synthetic dataset as CSV
    Dataset(DatasetArgs),
    /// Score a questionnaire stored as JSON
    Score(ScoreArgs),
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
        Command::Train(args) => run_train(args),
        Command::Dataset(args) => run_dataset(args),
        Command::Score(args) => run_score(args),
    }
}
