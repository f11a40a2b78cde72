use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relayer-cli")]
#[command(about = "Management CLI for the permit relayer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check chain connectivity and the relayer address
    Health,
    /// Show the state of a relay attempt
    Status {
        /// Attempt id (0x-prefixed, 32 bytes)
        id: String,
    },
    /// Submit a relay request read from a JSON file
    Submit {
        file: PathBuf,
    },
    /// Check a permit signature without relaying it
    Verify {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{base}/health")).send().await?,
        Commands::Status { id } => client.get(format!("{base}/attempts/{id}")).send().await?,
        Commands::Submit { file } => {
            let body = read_body(&file)?;
            client
                .post(format!("{base}/submit-transaction"))
                .json(&body)
                .send()
                .await?
        }
        Commands::Verify { file } => {
            let body = read_body(&file)?;
            client
                .post(format!("{base}/verify-signature"))
                .json(&body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn read_body(path: &PathBuf) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{rendered}");
    } else {
        eprintln!("Error: relayer returned status {status}");
        eprintln!("{rendered}");
        std::process::exit(1);
    }
    Ok(())
}
