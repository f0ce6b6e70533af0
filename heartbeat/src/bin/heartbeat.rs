use std::{
    backtrace::{Backtrace, BacktraceStatus},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Result, anyhow};
use clap::Parser;
use heartbeat::{
    cfg::{Config, read_config},
    error::Fatal,
    heartbeat::{Heartbeat, Schedule},
    metrics::{HeartbeatMetrics, NoopMetrics, OtelMetrics},
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use tokio::time::Duration;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Hex-encoded private key of the federator which signs heartbeats.
    #[arg(value_parser = PrivateKeySigner::from_str)]
    secret_key: PrivateKeySigner,
    #[clap(long, short, default_values = ["config.toml"])]
    config_file: Vec<PathBuf>,
    #[clap(long, default_value = "false")]
    log_json: bool,
    /// Run a single round of each task and exit.
    #[clap(long)]
    once: bool,
    /// Never publish heartbeats.
    #[clap(long)]
    no_emit: bool,
    /// Never read heartbeat logs.
    #[clap(long)]
    no_sync: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_line_number(true)
        .with_ansi(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    // Set a panic hook that records the panic as a `tracing` event at the `ERROR` verbosity level.
    std::panic::set_hook(Box::new(|panic| {
        let message = match panic.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");

        let backtrace = Backtrace::capture();
        let backtrace =
            (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());

        match (panic.location(), backtrace) {
            (None, None) => error!(thread_name, message),
            (None, Some(backtrace)) => error!(thread_name, message, %backtrace),
            (Some(location), backtrace) => error!(
                thread_name,
                message,
                panic.file = location.file(),
                panic.line = location.line(),
                panic.column = location.column(),
                backtrace = backtrace.as_deref().unwrap_or_default(),
            ),
        }
    }));

    let config = read_config(&args.config_file)?;
    let metrics = init_metrics(&config)?;

    let signer = args.secret_key;
    info!(
        federator = %signer.address(),
        version = heartbeat::FEDERATOR_VERSION,
        primary = %config.primary.rpc_url,
        secondaries = config.secondaries.len(),
        "starting heartbeat"
    );
    let heartbeat = Heartbeat::from_config(&config, signer, metrics)?;

    let emit = !args.no_emit;
    let sync = !args.no_sync;

    if args.once {
        if emit {
            exit_on_fatal(heartbeat.emit_liveness().await.map(|_| ()));
        }
        if sync {
            exit_on_fatal(heartbeat.sync_logs().await.map(|_| ()));
        }
        return Ok(());
    }

    let schedule = Schedule {
        emit: emit.then_some(config.emit_interval),
        sync: sync.then_some(config.sync_interval),
    };
    tokio::select! {
        fatal = heartbeat.run(schedule) => exit_on_fatal(Err(fatal)),
        _ = tokio::signal::ctrl_c() => info!("received ctrl-c, shutting down"),
    }
    Ok(())
}

fn init_metrics(config: &Config) -> Result<Arc<dyn HeartbeatMetrics>> {
    let Some(endpoint) = &config.otlp_collector_endpoint else {
        return Ok(Arc::new(NoopMetrics));
    };

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()
        .map_err(|e| anyhow!("failed to build metric exporter: {e}"))?;
    let reader = PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(10))
        .build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    opentelemetry::global::set_meter_provider(provider);

    Ok(Arc::new(OtelMetrics::new()))
}

/// A fatal error means the federator cannot do anything useful, so the process stops.
fn exit_on_fatal(result: Result<(), Fatal>) {
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
