//! `flightwatch` - CLI for the fleet watcher
//!
//! Runs the polling scheduler, or performs one-off checks and queries against
//! the configured sources and store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use flightwatch::cli::output::{render_check, render_history, render_status, CheckOutput};
use flightwatch::cli::{Cli, Command, ConfigCommand, HistoryCommand};
use flightwatch::{init_logging, notify, open_store, Config, Reconciler, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // `config validate` reports problems instead of failing on them
    if let Command::Config(config_cmd) = cli.command {
        return handle_config(cli.config, config_cmd);
    }

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Run => handle_run(&config).await,
        Command::Check(cmd) => handle_check(&config, cmd.json).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::NotifyTest => handle_notify_test(&config).await,
        Command::Config(_) => Ok(()),
    }
}

fn build_scheduler(config: &Config) -> Result<Scheduler> {
    let reconciler = Reconciler::from_config(config).context("setting up reconciler")?;
    Ok(Scheduler::new(reconciler, config.poll_interval()))
}

async fn handle_run(config: &Config) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    let (stop, shutdown) = watch::channel(false);

    let task = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run(shutdown).await }
    });

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Interrupted, finishing current pass");
    let _ = stop.send(true);
    task.await.context("scheduler task panicked")?;
    Ok(())
}

async fn handle_check(config: &Config, json: bool) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    let report = scheduler.check_now().await;
    let output = CheckOutput::new(&report, scheduler.status().tracked.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_check(&output));
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let status = build_scheduler(config)?.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(config).context("opening store")?;
    let mut events = store.load_history().context("reading event log")?;
    events.truncate(cmd.limit);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print!("{}", render_history(&events));
    }
    Ok(())
}

async fn handle_notify_test(config: &Config) -> Result<()> {
    let notifier = notify::from_config(&config.notify)?;
    notifier
        .send(&notify::self_test_message(&config.fleet()))
        .await
        .with_context(|| format!("sending test message via {}", notifier.name()))?;
    println!("Test message sent via {}.", notifier.name());
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print_config(&config);
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                path.unwrap_or_else(Config::default_config_path).display()
            );
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Fleet]");
    for aircraft in &config.fleet.aircraft {
        println!("  {:<8} {}", aircraft.registration, aircraft.icao24);
    }
    println!();
    println!("[Sources]");
    let order: Vec<String> = config.sources.order.iter().map(ToString::to_string).collect();
    println!("  Order:              {}", order.join(", "));
    println!("  Fallback delay:     {} ms", config.sources.fallback_delay_ms);
    println!("  OpenSky timeout:    {} s", config.sources.opensky.timeout_secs);
    println!("  ADSB.lol timeout:   {} s", config.sources.adsb_lol.timeout_secs);
    println!();
    println!("[Scheduler]");
    println!("  Interval:           {} s", config.scheduler.interval_secs);
    println!();
    println!("[Storage]");
    println!("  Backend:            {:?}", config.storage.backend);
    println!("  Path:               {}", config.storage_path().display());
    println!("  History limit:      {}", config.storage.history_limit);
    println!();
    println!("[Reconciler]");
    println!(
        "  Hold on outage:     {}",
        config.reconciler.hold_on_source_outage
    );
    println!();
    println!("[Notify]");
    let telegram =
        config.notify.telegram_token.is_some() && config.notify.telegram_chat_id.is_some();
    println!(
        "  Telegram:           {}",
        if telegram { "configured" } else { "not configured" }
    );
}
