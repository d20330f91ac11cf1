//! Phone reservation demo.
//!
//! ```text
//! cargo run -p phone-reservation -- --config demos/phone-reservation/callo.toml
//! curl -s localhost:8000 -d '{"name":"reservation"}'
//! ```

mod reservation;

use anyhow::Context;
use callo::AppConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "phone-reservation", about = "Callo reservation demo server")]
struct Args {
    /// TOML config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_with_env(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let mut config = AppConfig::default();
            config.crypt.password = Some("password-for-phone-call".into());
            config.http.bind = "127.0.0.1:8000".into();
            config.apply_env(|name| std::env::var(name).ok());
            config.validate()?;
            config
        }
    };
    callo::observe::init_tracing(&config.log)?;

    let engine = config
        .builder()
        .on(reservation::FLOW, reservation::flow())
        .build()?;

    config.ingress(engine).run().await?;
    Ok(())
}
