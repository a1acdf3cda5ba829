// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Alarm Remote console application.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::env::{self, VarError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alarm_remote::bluetooth::{self, CommandKind, DeviceHandle, RfcommTransport};
use alarm_remote::config::Config;
use alarm_remote::state::AppState;
use alarm_remote::{RemoteControl, SessionEvent};

/// Environment variable holding the stored alarm password.
const PASSWORD_ENV: &str = "ALARM_REMOTE_PASSWORD";

#[derive(Debug, Parser)]
#[command(version, about = "Control a Bluetooth serial alarm controller")]
struct Args {
    /// Configuration file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device name or address to connect to at startup.
    #[arg(long)]
    device: Option<String>,
}

/// The stored password, if the environment provides a non-empty one.
fn stored_password(value: Result<String, VarError>) -> Option<String> {
    match value {
        Ok(password) if !password.is_empty() => Some(password),
        Ok(_) => None,
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            warn!("{} is not valid unicode, ignoring it", PASSWORD_ENV);
            None
        }
    }
}

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Devices,
    Connect(String),
    Password(String),
    Send(CommandKind),
    Disconnect,
    Status,
    Log,
    Help,
    Quit,
}

impl ConsoleCommand {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "devices" => Some(Self::Devices),
            "connect" if !rest.is_empty() => Some(Self::Connect(rest.to_string())),
            "password" if !rest.is_empty() => Some(Self::Password(rest.to_string())),
            "disconnect" => Some(Self::Disconnect),
            "status" => Some(Self::Status),
            "log" => Some(Self::Log),
            "help" | "?" => Some(Self::Help),
            "quit" | "exit" => Some(Self::Quit),
            other => CommandKind::parse(other).map(Self::Send),
        }
    }
}

const HELP: &str = "\
commands:
  devices              list paired devices
  connect <name|addr>  connect to a controller
  password <pin>       enter the alarm password
  beep                 sound the buzzer
  activate             arm the alarm
  deactivate           disarm the alarm
  disconnect           close the connection
  status               show connection state
  log                  show recent activity
  quit                 disconnect and exit";

/// Resolve a user-supplied name or address against the paired devices.
async fn resolve_device(query: &str) -> Result<DeviceHandle> {
    match bluetooth::paired_devices().await {
        Ok(devices) => {
            if let Some(device) = bluetooth::find_device(&devices, query) {
                return Ok(device.clone());
            }
        }
        Err(e) => warn!("Could not list paired devices: {}", e),
    }

    // An explicit address can be used even when it is not listed.
    if query.parse::<bluer::Address>().is_ok() {
        return Ok(DeviceHandle::new(query, query));
    }
    Err(anyhow!("no paired device named '{}'", query))
}

async fn connect(remote: &RemoteControl<RfcommTransport>, state: &AppState, query: &str) {
    match resolve_device(query).await {
        Ok(device) => {
            state.set_connecting(device.clone());
            println!("Connecting to {}...", device);
            remote.connect(device);
        }
        Err(e) => println!("{}", e),
    }
}

fn render(event: &SessionEvent) {
    match event {
        SessionEvent::Connected { device } => println!("Connected to {}", device),
        SessionEvent::ConnectFailed { device, error } => {
            println!("Error connecting to {}: {}", device, error)
        }
        SessionEvent::Disconnected => println!("Disconnected"),
        SessionEvent::Replied { kind, reply } => println!("{}: {}", kind, reply.as_str().trim_end()),
        SessionEvent::CommandFailed { kind, error } => println!("{} failed: {}", kind, error),
    }
}

/// Handle one console line. Returns `false` when the user asked to quit.
async fn handle_line(
    line: &str,
    remote: &RemoteControl<RfcommTransport>,
    state: &AppState,
) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    let Some(command) = ConsoleCommand::parse(line) else {
        println!("unknown command, type 'help'");
        return true;
    };

    match command {
        ConsoleCommand::Devices => match bluetooth::paired_devices().await {
            Ok(devices) if devices.is_empty() => println!("no paired devices"),
            Ok(devices) => {
                for device in devices {
                    println!("  {}", device);
                }
            }
            Err(e) => println!("Could not list paired devices: {}", e),
        },
        ConsoleCommand::Connect(query) => connect(remote, state, &query).await,
        ConsoleCommand::Password(value) => {
            remote.capture_password(value);
            println!("Password set");
        }
        ConsoleCommand::Send(kind) => {
            state.record_command(kind);
            remote.command(kind);
        }
        ConsoleCommand::Disconnect => {
            remote.disconnect();
        }
        ConsoleCommand::Status => {
            let device = state
                .get_device()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{} {}", state.get_status().as_str(), device);
            println!("enabled: {:?}", state.enabled_actions(remote.lock_state()));
        }
        ConsoleCommand::Log => {
            for entry in state.log_entries() {
                println!("[{}] {}", entry.timestamp.format("%H:%M:%S"), entry.text);
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("alarm_remote=info".parse()?),
        )
        .init();

    info!("Starting Alarm Remote v{}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(32);
    let remote = RemoteControl::new(
        config.transport(),
        stored_password(env::var(PASSWORD_ENV)),
        event_tx,
    );
    let state = Arc::new(AppState::with_log_capacity(
        config.session.activity_log_entries,
    ));

    if let Some(target) = args.device.as_ref().or(config.bluetooth.device.as_ref()) {
        connect(&remote, &state, target).await;
    }

    println!("Ready. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&line, &remote, &state).await {
                            info!("Quit requested");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        break;
                    }
                }
            }
            Some(event) = event_rx.recv() => {
                state.apply(&event);
                render(&event);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Teardown never fails; a join error only means the task panicked.
    if let Err(e) = remote.disconnect().await {
        error!("Disconnect task failed: {}", e);
    }

    info!("Alarm Remote stopped");
    Ok(())
}
