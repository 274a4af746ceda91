use clap::Parser;
use coldstart::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() {
    // Load .env before anything reads HF_TOKEN.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cli::run::execute(&args).await,
        Commands::Provision(args) => cli::provision::execute(&args).await,
        Commands::Check(cmd) => cli::check::execute(&cmd),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
