use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use l2_engine::{
    bytes_to_hex, command_to_json, execution_to_json, felt_to_hex, felt_to_word, parse_felt,
    AccountIndex, Command, CommandOp, Engine, EngineConfig, RawCommand, TokenIndex,
};

#[derive(Parser)]
#[command(name = "l2-cli")]
#[command(about = "l2 engine cli for command buffers and witness replay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Decode {
        #[arg(long)]
        payload: String,
        #[arg(long, default_value_t = 0)]
        relayer: AccountIndex,
    },
    Encode {
        #[arg(long)]
        op: String,
        #[arg(long)]
        nonce: u64,
        #[arg(long, default_value_t = 0)]
        index0: u32,
        #[arg(long, default_value_t = 0)]
        index1: u32,
        #[arg(long, default_value = "0")]
        word0: String,
        #[arg(long, default_value = "0")]
        word1: String,
    },
    Replay {
        #[arg(long)]
        commands: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        nft_bid_token: TokenIndex,
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Deserialize)]
struct BatchEntry {
    payload: String,
    #[serde(default)]
    relayer: AccountIndex,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Decode { payload, relayer } => {
            let command = Command::decode_hex(&payload, relayer)?;
            println!("{}", serde_json::to_string_pretty(&command_to_json(&command))?);
        }
        Commands::Encode {
            op,
            nonce,
            index0,
            index1,
            word0,
            word1,
        } => {
            let op = CommandOp::from_name(&op).ok_or_else(|| format!("unknown op {op}"))?;
            let mut raw = RawCommand::new(op, nonce, index0, index1);
            raw.word0 = felt_to_word(&parse_felt(&word0)?);
            raw.word1 = felt_to_word(&parse_felt(&word1)?);
            // Round through the decoder so only buffers the engine accepts are printed.
            let command = Command::from_raw(&raw, 0)?;
            println!("{}", bytes_to_hex(&command.encode()));
        }
        Commands::Replay {
            commands,
            out,
            nft_bid_token,
            verify,
        } => {
            let batch: Vec<BatchEntry> = serde_json::from_str(&fs::read_to_string(&commands)?)?;
            let mut engine = Engine::in_memory(EngineConfig { nft_bid_token }).await?;
            let initial_root = engine.root();
            let mut results = Vec::with_capacity(batch.len());
            let mut expected_root = initial_root;
            for (position, entry) in batch.iter().enumerate() {
                let command = Command::decode_hex(&entry.payload, entry.relayer)?;
                let paths = engine.execute(&command).await?;
                if verify {
                    let gap = command.witness_gap();
                    for (slot, path) in paths.iter().enumerate() {
                        // An unwitnessed write precedes the path at the gap.
                        if gap == Some(slot) {
                            expected_root = path.root_before;
                        }
                        if path.root_before != expected_root || !path.is_consistent() {
                            return Err(format!(
                                "witness {} of command {position} does not verify",
                                path.leaf_index
                            )
                            .into());
                        }
                        expected_root = path.root_after;
                    }
                }
                results.push(execution_to_json(&command, &paths));
            }
            let report = serde_json::json!({
                "initial_root": felt_to_hex(initial_root),
                "final_root": felt_to_hex(engine.root()),
                "commands": Value::Array(results),
            });
            let serialized = serde_json::to_string_pretty(&report)?;
            if let Some(path) = out {
                fs::write(path, serialized)?;
            } else {
                println!("{serialized}");
            }
        }
    }
    Ok(())
}
