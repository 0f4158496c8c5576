//! `enrich` binary entry point.

use clap::Parser;
use enrich::cli::{commands, Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Run(args) => commands::run(args),
        Commands::Validate(args) => commands::validate(args),
        Commands::Doctor(args) => commands::doctor(args),
    };
    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}
