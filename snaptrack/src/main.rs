//! `snaptrack`, a terminal client for the snaptrack host monitor.
//!

mod cli;
mod display;

use clap::ArgMatches;
use cli::{Invocation, WatchChannel};
use log::{debug, info, warn, LevelFilter};
use postage::stream::Stream;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use snaptrack_api::{
    config::{load_config, log_path, Config},
    log::{get_level, set_level_str},
};
use snaptrack_channel::{
    ChannelConfig, ChannelScope, ChannelSnapshot, CommandIntent, CommandKind, CommandTarget,
    ConnectionState, Notification,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::broadcast::error::RecvError, time};

const OPEN_TIMEOUT: Duration = Duration::from_secs(2);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn main() -> anyhow::Result<()> {
    let args = cli::init();

    // create the dotdir path, so the config & log files can be written.
    snaptrack_api::config::mkdir()?;

    let mut config = load_config()?.with_env_overrides();
    if let Some(endpoint) = global_value(&args, "ENDPOINT") {
        config.endpoint = endpoint.to_string();
    }

    let level = global_value(&args, "LOG").or_else(|| config.log_level.as_deref());
    let unrecognized = level.filter(|level| !set_level_str(level));

    init()?;

    if let Some(level) = unrecognized {
        warn!("unrecognized log level: {}", level);
    }

    let invocation = cli::invocation(&args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;

    let result = runtime.block_on(async { main_async(config, invocation).await });

    runtime.shutdown_timeout(Duration::from_millis(25));

    result
}

fn init() -> anyhow::Result<()> {
    let log_file = log_path()?;

    let config = simplelog::ConfigBuilder::new()
        .set_time_format_str("%H:%M:%S%.3f")
        .build();

    let level = get_level().unwrap_or(LevelFilter::Warn);
    CombinedLogger::init(vec![
        TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(level, config, std::fs::File::create(log_file)?),
    ])
    .unwrap();

    log_panics::init();

    Ok(())
}

// clap only records a global argument on the subcommand where it was given
fn global_value<'a>(args: &'a ArgMatches, name: &str) -> Option<&'a str> {
    let nested = match args.subcommand() {
        (_, Some(subcommand)) => global_value(subcommand, name),
        _ => None,
    };

    nested.or_else(|| args.value_of(name))
}

async fn main_async(config: Config, invocation: Invocation) -> anyhow::Result<()> {
    let scope = ChannelScope::new(ChannelConfig::from(&config))?;
    debug!("using endpoint {}", config.endpoint);

    let result = match invocation {
        Invocation::Watch(channel) => watch(&scope, &config.endpoint, channel).await,
        Invocation::Command(intent) => run_command(&scope, intent).await,
    };

    scope.close();
    result
}

async fn watch(scope: &ChannelScope, endpoint: &str, channel: WatchChannel) -> anyhow::Result<()> {
    let mut notifications = scope.notifications();

    let previous = Mutex::new(ChannelSnapshot::default());
    let _subscription = scope.subscribe(move |snapshot: &ChannelSnapshot| {
        let mut previous = match previous.lock() {
            Ok(previous) => previous,
            Err(poisoned) => poisoned.into_inner(),
        };

        for line in display::changes(&previous, snapshot, channel) {
            println!("{}", line);
        }

        *previous = snapshot.clone();
    })?;

    loop {
        tokio::select! {
            interrupt = tokio::signal::ctrl_c() => {
                interrupt?;
                info!("interrupted, closing the connection");
                return Ok(());
            }
            notification = notifications.recv() => match notification {
                Ok(Notification::Connected(id)) => {
                    eprintln!("connected to {} ({})", endpoint, id);
                }
                Ok(Notification::Disconnected { reason }) => {
                    eprintln!("disconnected: {}", reason);
                    return Ok(());
                }
                Ok(Notification::Action(response)) => {
                    println!("{}", display::action(&response));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}

async fn run_command(scope: &ChannelScope, intent: CommandIntent) -> anyhow::Result<()> {
    let mut notifications = scope.notifications();
    scope.attach()?;

    let state = time::timeout(OPEN_TIMEOUT, scope.wait_for_open())
        .await
        .map_err(|_| anyhow::format_err!("timed out connecting to the agent"))??;

    if state != ConnectionState::Open {
        return Err(anyhow::format_err!(
            "the connection to the agent is {}",
            state
        ));
    }

    let logs_for = match (&intent.kind, &intent.target) {
        (CommandKind::Logs, CommandTarget::Service(name)) => Some(name.clone()),
        _ => None,
    };

    let mut snapshots = scope.snapshots();
    let previous = scope.snapshot();

    scope.dispatch(intent)?;

    let response = async {
        loop {
            tokio::select! {
                notification = notifications.recv() => match notification {
                    Ok(Notification::Action(response)) => {
                        println!("{}", display::action(&response));
                        return if response.success {
                            Ok(())
                        } else {
                            Err(anyhow::format_err!("the agent rejected the command"))
                        };
                    }
                    Ok(Notification::Disconnected { reason }) => {
                        return Err(anyhow::format_err!("disconnected: {}", reason));
                    }
                    Ok(Notification::Connected(_)) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        return Err(anyhow::format_err!("the channel closed"));
                    }
                },
                snapshot = snapshots.recv(), if logs_for.is_some() => {
                    let snapshot = match snapshot {
                        Some(snapshot) => snapshot,
                        None => return Err(anyhow::format_err!("the channel closed")),
                    };

                    let service = logs_for.as_deref().unwrap_or("");
                    let current = snapshot.logs.get(service);
                    let replaced = match (previous.logs.get(service), current) {
                        (Some(previous), Some(current)) => !Arc::ptr_eq(previous, current),
                        (None, Some(_)) => true,
                        _ => false,
                    };

                    if let (true, Some(lines)) = (replaced, current) {
                        for line in lines.iter() {
                            println!("{}", line);
                        }

                        return Ok(());
                    }
                }
            }
        }
    };

    time::timeout(RESPONSE_TIMEOUT, response)
        .await
        .map_err(|_| anyhow::format_err!("timed out waiting for the agent to respond"))?
}
