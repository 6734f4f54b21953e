use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "akaryakit")]
#[command(about = "Turkish retail fuel price aggregation API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080, env = "PORT")]
        port: u16,
    },
    /// Run one refresh pipeline and print the result
    Update,
    /// Show cached snapshot state
    Status,
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(port).await;
        }
        Commands::Update => {
            commands::update::run().await;
        }
        Commands::Status => {
            commands::status::run().await;
        }
    }
}
