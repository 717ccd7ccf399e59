//! OptiKV CLI Client
//!
//! Command-line interface for sending one transaction to OptiKV.

use clap::Parser;
use optikv::network::Client;
use optikv::protocol::Response;
use optikv::Transaction;
use tracing_subscriber::{fmt, EnvFilter};

/// OptiKV CLI
#[derive(Parser, Debug)]
#[command(name = "optikv-cli")]
#[command(about = "Send a transaction to an OptiKV server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    /// Transaction id echoed in the reply
    #[arg(long, default_value = "cli")]
    id: String,

    /// Key to read back (repeatable)
    #[arg(short, long = "read")]
    reads: Vec<String>,

    /// Condition KEY=VALUE; KEY= expects empty or absent, KEY alone expects absent
    #[arg(short, long = "cond")]
    conditions: Vec<String>,

    /// Write KEY=VALUE; KEY alone removes the key
    #[arg(short, long = "write")]
    writes: Vec<String>,
}

impl Args {
    fn into_transaction(self) -> Transaction {
        let mut txn = Transaction::new(self.id);
        for key in self.reads {
            txn = txn.read(key);
        }
        for entry in self.conditions {
            txn = match entry.split_once('=') {
                Some((key, value)) => txn.expect(key, value),
                None => txn.expect_absent(entry),
            };
        }
        for entry in self.writes {
            txn = match entry.split_once('=') {
                Some((key, value)) => txn.write(key, value),
                None => txn.remove(entry),
            };
        }
        txn
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays a single JSON reply
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let server = args.server.clone();
    let txn = args.into_transaction();

    let mut client = match Client::connect(&server).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", server, e);
            std::process::exit(1);
        }
    };

    match client.execute(&txn).await {
        Ok(response) => {
            match serde_json::to_string(&response) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to render response: {}", e),
            }
            if let Response::Error { .. } = response {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("Request failed: {}", e);
            std::process::exit(1);
        }
    }
}
