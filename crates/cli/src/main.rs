use std::{
    io::{self, BufWriter, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use cmr_api::HttpTransport;
use cmr_search::Query;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

use cli::{Action, Cli};
use config::CliConfig;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = CliConfig::load().context("failed to load configuration")?;
    run(&cli, &config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: &Cli, config: &CliConfig) -> Result<()> {
    let transport = HttpTransport::with_config(config.client_config()).context("failed to build HTTP client")?;
    let query = cli.build_query(config, Arc::new(transport))?;
    let action = cli.action(config);
    debug!(entity = %query.entity(), action = ?action, "running search");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match action {
        Action::DryRun => print_dry_run(&query, &mut out)?,
        Action::Hits => writeln!(out, "{}", query.hits()?)?,
        Action::GetAll => {
            for item in query.get_all()? {
                writeln!(out, "{item}")?;
            }
        }
        Action::Get(limit) => {
            for item in query.get(limit)? {
                writeln!(out, "{item}")?;
            }
        }
        Action::Stream(page_size) => {
            for item in query.results(page_size) {
                writeln!(out, "{}", item?)?;
                out.flush()?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Print the first request as JSON with credentials redacted.
fn print_dry_run(query: &Query, out: &mut impl Write) -> Result<()> {
    let request = query.request(cli::DEFAULT_LIMIT)?;
    let body = serde_json::json!({
        "method": format!("{:?}", request.method).to_uppercase(),
        "url": request.full_url().to_string(),
        "headers": request.redacted_headers(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    Ok(())
}
