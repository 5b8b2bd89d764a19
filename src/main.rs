use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "corteplan",
    version,
    about = "Extract cut-plan fields and the diagram crop from cutting-plan PDFs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one PDF and print the result as JSON
    Extract {
        /// PDF file to process
        file: String,

        /// Write the cropped diagram to this PNG path instead of inlining it
        #[arg(long = "image-out")]
        image_out: Option<String>,
    },
    /// Run the HTTP extraction server
    Serve {
        /// Listen address (overrides settings)
        #[arg(long = "addr")]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    corteplan::logging::init(cli.verbose)?;
    let settings = corteplan::settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;

    match cli.command {
        Command::Extract { file, image_out } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read pdf: {}", file))?;
            let extraction = corteplan::process_pdf(&bytes, &settings)?;
            match image_out {
                Some(path) => {
                    write_data_url(&extraction.image_data_url, &path)?;
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&extraction.fields)?
                    );
                }
                None => {
                    let payload = serde_json::json!({
                        "ok": true,
                        "fields": extraction.fields,
                        "imageDataUrl": extraction.image_data_url,
                    });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
            }
            Ok(())
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.listen_addr.clone());
            corteplan::server::run_server(settings, addr).await
        }
    }
}

fn write_data_url(data_url: &str, path: &str) -> Result<()> {
    let payload = data_url
        .strip_prefix("data:image/png;base64,")
        .ok_or_else(|| anyhow!("unexpected image payload format"))?;
    let bytes = BASE64
        .decode(payload)
        .with_context(|| "failed to decode image payload")?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write image: {}", path))?;
    Ok(())
}
