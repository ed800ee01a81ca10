//! Statement-to-OFX converter - CLI tool for converting unstructured bank
//! statement text into OFX 1.02 documents.

use clap::Parser;
use ofx_converter::{ConverterConfig, GeminiCapability, Result, StatementConverter};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ofx_convert")]
#[command(about = "Convert unstructured bank statement text to OFX 1.02", long_about = None)]
struct Cli {
    /// Input file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extraction model identifier
    #[arg(long)]
    model: Option<String>,

    /// Currency code written to the account section
    #[arg(long, default_value = "USD")]
    currency: String,

    /// Bank identifier placeholder
    #[arg(long, default_value = "123456789")]
    bank_id: String,

    /// Account identifier placeholder
    #[arg(long, default_value = "000000001")]
    account_id: String,

    /// File name reported to the extraction capability (defaults to the
    /// input path's file name)
    #[arg(long)]
    file_name: Option<String>,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let (raw_text, default_name) = match cli.input {
        Some(ref path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "statement".to_string());
            (fs::read_to_string(path)?, name)
        }
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            (text, "stdin".to_string())
        }
    };
    let file_name = cli.file_name.clone().unwrap_or(default_name);

    let mut config = ConverterConfig::default();
    config.ofx.currency = cli.currency.clone();
    config.ofx.bank_id = cli.bank_id.clone();
    config.ofx.account_id = cli.account_id.clone();

    let capability = GeminiCapability::from_env(cli.model.clone())?;
    let mut converter = StatementConverter::with_config(capability, config);

    let quiet = cli.quiet;
    let document = converter
        .convert(&raw_text, &file_name, |message| {
            if !quiet {
                eprintln!("{message}");
            }
        })
        .await?;

    match cli.output {
        Some(ref path) => fs::write(path, document.as_bytes())?,
        None => io::stdout().write_all(document.as_bytes())?,
    }

    Ok(())
}
