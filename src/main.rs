use clap::Parser;
use registry_watcher::client::Client;
use registry_watcher::config::Args;
use registry_watcher::scheduler::Scheduler;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(message) = args.validate() {
        eprintln!("{message}");
        std::process::exit(1);
    }

    if let Err(e) = registry_watcher::telemetry::init(args.log_level) {
        eprintln!("failed to initialize logging: {e}");
    }

    if args.dry_run {
        info!("dry-run mode: register/deregister calls will be logged, not issued");
    }

    info!(
        registry = %args.registry.display(),
        url = %args.url,
        log_interval_minutes = args.log,
        full_interval_hours = args.full,
        "starting registry watcher"
    );

    let client = Client::new(args.url.clone()).with_dry_run(args.dry_run);
    let scheduler = Scheduler::new(args.registry.clone(), args.timestamp.clone(), client);

    scheduler.run_startup_full_scan().await;

    let log_interval = Duration::from_secs(args.log * 60);
    let full_interval = Duration::from_secs(args.full * 3600);

    tokio::select! {
        _ = scheduler.run(log_interval, full_interval) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, exiting");
        }
    }
}
