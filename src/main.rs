mod cli;
mod config;
mod credentials;
mod errors;
mod logger;
mod spotify;
mod tasks;
mod ytdlp;

use cli::Cli;
use logger::Logger;

#[tokio::main]
async fn main() {
    if let Err(e) = Logger::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
