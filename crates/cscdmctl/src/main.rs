// # cscdmctl - Domain Manager record tool
//
// Thin front end over `cscdm-core`: it parses one command, configures a
// client, runs the command, prints the result as JSON, and stops the client.
// No batching, retry, or caching logic lives here.
//
// ## Configuration
//
// Every flag can also be set through the environment:
//
// - `CSCDM_API_KEY`: API key (required)
// - `CSCDM_API_TOKEN`: Bearer token (required)
// - `CSCDM_API_URL`: Base URL (default `https://apis.cscglobal.com/dbs/api/v2/`)
// - `CSCDM_LOG_LEVEL`: error, warn, info, debug, trace (default info)
// - `CSCDM_FLUSH_IDLE_MS`: Idle window before a flush (default 5000)
// - `CSCDM_POLL_INTERVAL_MS`: Status poll interval (default 5000)
//
// ## Example
//
// ```bash
// export CSCDM_API_KEY=your_key
// export CSCDM_API_TOKEN=your_token
//
// cscdmctl zones
// cscdmctl add example.com TXT _acme-challenge token-value 300
// cscdmctl edit example.com MX @ mx1.example.com mx2.example.com 300 20
// cscdmctl zone example.com --type TXT --key _acme-challenge
// cscdmctl purge example.com TXT _acme-challenge token-value
// ```
//
// Logs go to stderr so stdout carries only the JSON result.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cscdm_core::config::CscdmConfig;
use cscdm_core::{CscdmClient, RecordAction};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Command};

/// Exit codes for different termination scenarios
///
/// - 0: Command succeeded
/// - 1: Configuration or startup error
/// - 2: Runtime error (the command failed)
#[derive(Debug, Clone, Copy)]
enum CtlExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<CtlExitCode> for ExitCode {
    fn from(code: CtlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version also arrive here
            return if e.use_stderr() {
                CtlExitCode::ConfigError.into()
            } else {
                CtlExitCode::Success.into()
            };
        }
    };

    let config = cli.config();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return CtlExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CtlExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CtlExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(cli.command, config).await {
            Ok(()) => CtlExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
                CtlExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run one command and print its result
async fn run(command: Command, config: CscdmConfig) -> Result<()> {
    let client = cscdm_api_http::configure_with(&config).context("failed to configure client")?;
    info!("Running {:?}", command);

    let result = execute(&client, command).await;
    client.stop().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(client: &CscdmClient, command: Command) -> Result<serde_json::Value> {
    let value = match command {
        Command::Zones => {
            let zones = client.list_zones().await.context("failed to list zones")?;
            serde_json::to_value(zones)?
        }
        Command::Zone(args) => {
            let zone = client
                .get_zone(&args.name)
                .await
                .with_context(|| format!("failed to read zone {}", args.name))?;
            args.view(&zone)?
        }
        Command::Add {
            zone,
            record_type,
            key,
            value,
            ttl,
            priority,
        } => {
            let mut action = RecordAction::add(zone, record_type, key, value);
            if let Some(ttl) = ttl {
                action = action.with_ttl(ttl);
            }
            if let Some(priority) = priority {
                action = action.with_priority(priority);
            }
            perform(client, action).await?
        }
        Command::Edit(args) => {
            let zone = client
                .get_zone(&args.zone)
                .await
                .with_context(|| format!("failed to read zone {}", args.zone))?;
            perform(client, args.to_action(&zone)).await?
        }
        Command::Purge {
            zone,
            record_type,
            key,
            value,
        } => perform(client, RecordAction::purge(zone, record_type, key, value)).await?,
    };
    Ok(value)
}

/// Submit a single action without waiting out the idle window
async fn perform(client: &CscdmClient, action: RecordAction) -> Result<serde_json::Value> {
    let description = format!("{} {} {} in {}", action.action, action.record_type, action.key_id(), action.zone_name);

    // join! polls the action first, so it is queued before the flush request
    let (result, ()) = tokio::join!(client.perform_record_action(action), async {
        client.flush_now()
    });

    let record = result.with_context(|| format!("failed to {}", description))?;
    Ok(serde_json::to_value(record)?)
}
