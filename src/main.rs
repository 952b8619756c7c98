//! Main entry point for the vidhop CLI

use anyhow::Context;
use clap::Parser;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidhop::cli::{Args, OutputFormatter, VerbosityLevel};
use vidhop::core::resolver::ReportOptions;
use vidhop::{ApiResponse, CancellationToken, Resolver};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbosity_level());

    let formatter = OutputFormatter::new(args.verbosity_level());
    if let Err(err) = run(args, formatter).await {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args, mut formatter: OutputFormatter) -> anyhow::Result<()> {
    debug!("Parsed args: {:?}", args);

    let request = args.request().context("invalid request")?;
    let config = args.resolver_config().context("invalid configuration")?;
    let resolver = Resolver::new(config).context("failed to build resolver")?;

    // Ctrl-C cancels the in-flight resolution
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    info!("Resolving {}", request);
    let started = Instant::now();
    let json_output = args.json || args.report;
    if !json_output {
        formatter.start_spinner(&format!("Resolving {}", request));
    }

    let (result, report) = resolver
        .resolve_with_report(&request, &cancel, ReportOptions { raw: args.raw })
        .await;
    formatter.finish_spinner();

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&ApiResponse::from_result(&result))?);
    } else {
        formatter.print_report_summary(&report);
        match &result {
            Ok(stream) => formatter.print_stream(stream, started.elapsed()),
            Err(error) => formatter.print_failure(error),
        }
    }

    // Failure already printed above
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialize logging; `RUST_LOG` wins over the verbosity flags
fn init_logging(verbosity: VerbosityLevel) {
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "vidhop=debug",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
