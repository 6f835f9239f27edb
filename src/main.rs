use anyhow::{Result, bail};
use clap::Parser;
use highlights_events::{
    EventRouter, EventTransport, Lifecycle, WILDCARD,
    cli::Args,
    config::Config,
    events::create_event_channel,
    monitoring::setup_metrics,
    router::forward_to,
    tracing_setup::setup_tracing,
    ui::{EventPrinter, PrinterExit, PrinterOptions},
};
use std::sync::Arc;
use tokio::time::{Instant, interval};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_tracing(&args.log_level, args.json_logs)?;

    info!(
        "Starting highlights event client v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_args(&args)?;

    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    // Application root: exactly one router and one transport per process.
    let router = Arc::new(EventRouter::new());
    let transport = Arc::new(EventTransport::new(
        config.transport.clone(),
        router.clone(),
    )?);

    let (event_tx, event_rx) = create_event_channel();
    let forward = forward_to(event_tx);
    if config.output.kinds.is_empty() {
        router.subscribe(WILDCARD, forward.clone());
    } else {
        for kind in &config.output.kinds {
            router.subscribe(kind, forward.clone());
        }
    }
    for lifecycle in Lifecycle::ALL {
        router.subscribe(lifecycle.kind(), forward.clone());
    }
    // The router now owns every sender; clearing it closes the channel.
    drop(forward);

    let mut printer = EventPrinter::new(
        event_rx,
        config.output.format.clone(),
        PrinterOptions {
            colored: config.output.colored,
            quiet: config.output.quiet,
        },
    );

    let status_task = config.status.interval.map(|period| {
        let transport = transport.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = transport.snapshot();
                info!(
                    state = %snapshot.state,
                    attempt = snapshot.attempt,
                    frames_received = snapshot.frames_received,
                    frames_dropped = snapshot.frames_dropped,
                    dispatch_failures = snapshot.dispatch_failures,
                    reconnects = snapshot.reconnects,
                    "Connection status"
                );
            }
        })
    });

    transport.connect(None);
    info!("Client started. Press Ctrl+C to shutdown...");

    let started = Instant::now();
    let exit = tokio::select! {
        exit = printer.run() => Some(exit),
        _ = tokio::signal::ctrl_c() => None,
    };

    transport.disconnect();
    if let Some(task) = status_task {
        task.abort();
    }

    info!(
        "{}",
        printer
            .formatter()
            .format_summary(started.elapsed().as_secs())
    );

    match exit {
        Some(PrinterExit::GaveUp) => {
            bail!("event stream unavailable: maximum reconnection attempts exhausted")
        }
        Some(PrinterExit::ChannelClosed) => {
            warn!("Event channel closed unexpectedly");
            Ok(())
        }
        None => {
            info!("Client stopped successfully");
            Ok(())
        }
    }
}
