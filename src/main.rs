//! Rewind CLI

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use rewind::storage::{Codec, JsonCodec, YamlCodec};
use rewind::transaction::Transaction;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Rewind v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: rewind <command> [options]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  stats <recording>        Summarize a recording file");
        eprintln!("  convert <from> <to>      Re-encode a recording (json <-> yaml)");
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "stats" if args.len() >= 3 => stats(Path::new(&args[2])),
        "stats" => {
            eprintln!("Usage: rewind stats <recording>");
            process::exit(1);
        }
        "convert" if args.len() >= 4 => convert(Path::new(&args[2]), Path::new(&args[3])),
        "convert" => {
            eprintln!("Usage: rewind convert <from> <to>");
            process::exit(1);
        }
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'rewind' for usage information.");
            process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn stats(path: &Path) -> Result<()> {
    let transactions = load(path)?;

    println!("Recording: {}", path.display());
    println!("Transactions: {}", transactions.len());

    let mut by_method: BTreeMap<String, usize> = BTreeMap::new();
    for transaction in &transactions {
        *by_method
            .entry(transaction.request.method.to_string())
            .or_default() += 1;
    }
    for (method, count) in &by_method {
        println!("  {method}: {count}");
    }

    println!();
    for transaction in &transactions {
        println!(
            "  {} {} -> {}",
            transaction.request.method, transaction.request.uri, transaction.response.status
        );
    }

    Ok(())
}

fn convert(from: &Path, to: &Path) -> Result<()> {
    let transactions = load(from)?;

    let codec = codec_for(to)?;
    let encoded = codec.encode(&transactions).context("encode recording")?;
    std::fs::write(to, encoded).with_context(|| format!("write {}", to.display()))?;

    println!(
        "Converted {} transactions: {} -> {}",
        transactions.len(),
        from.display(),
        to.display()
    );
    Ok(())
}

fn load(path: &Path) -> Result<Vec<Transaction>> {
    let raw = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    codec_for(path)?.decode(&raw).context("decode recording")
}

fn codec_for(path: &Path) -> Result<Box<dyn Codec>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Box::new(JsonCodec)),
        Some("yaml" | "yml") => Ok(Box::new(YamlCodec)),
        other => bail!("unsupported recording suffix: {other:?}"),
    }
}
