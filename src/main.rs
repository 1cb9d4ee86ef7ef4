use clap::Parser;
use gentrack::cli::{Cli, Commands};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => gentrack::cli::generate(args).await,
        Commands::Status(args) => gentrack::cli::status(args),
        Commands::Clear(args) => gentrack::cli::clear(args),
        Commands::Config(args) => gentrack::cli::config(args),
    }
}
