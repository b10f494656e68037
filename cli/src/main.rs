use anyhow::{bail, Context, Result};
use clap::Parser;
use dispatch_core::{Config, DispatchRequest, TicketDispatcher};
use tokio::io::AsyncReadExt;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Recommend assignees for a ticket
#[derive(Parser, Debug)]
#[command(name = "dispatch", version, about)]
struct Cli {
    /// Ticket description, issue id, or a `{"description": ...}` body;
    /// read from stdin when omitted
    description: Option<String>,

    /// Ceiling on model turns for the analysis stage
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Do not print tool activity to stderr
    #[arg(long)]
    no_logs: bool,

    /// Print the final model output without parsing it
    #[arg(long)]
    raw: bool,
}

async fn read_request(cli: &Cli) -> Result<DispatchRequest> {
    let text = match &cli.description {
        Some(text) => text.clone(),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read ticket from stdin")?;
            buf
        }
    };
    let request = DispatchRequest::from_input(&text);
    if request.description.is_empty() {
        bail!("ticket description is empty");
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(max) = cli.max_iterations {
        config.max_iterations = max;
    }

    let request = read_request(&cli).await?;
    let description = request.description;
    let dispatcher = TicketDispatcher::from_config(&config)?;

    let printer = if cli.no_logs {
        None
    } else {
        let mut events = dispatcher.subscribe();
        Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                eprintln!("{}", event.encode());
            }
        }))
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling dispatch");
            interrupt.cancel();
        }
    });

    info!(model = %config.model, "dispatching ticket");
    let outcome = if cli.raw {
        dispatcher.dispatch_raw_with_cancel(&description, cancel.clone()).await
    } else {
        dispatcher
            .dispatch_with_cancel(&description, cancel.clone())
            .await
            .map(|result| result.encode())
    };

    dispatcher.events().close();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let output = outcome.context("dispatch failed")?;
    println!("{}", output);
    Ok(())
}
