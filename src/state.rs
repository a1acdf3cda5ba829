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

//! Application state management.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::activation::LockState;
use crate::bluetooth::protocol::CommandKind;
use crate::bluetooth::DeviceHandle;
use crate::events::SessionEvent;

/// Default number of activity log lines kept.
pub const DEFAULT_LOG_ENTRIES: usize = 100;

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// Actions currently available to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnabledActions {
    pub password: bool,
    pub beep: bool,
    pub activate: bool,
    pub deactivate: bool,
}

impl EnabledActions {
    pub fn allows(&self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::Beep => self.beep,
            CommandKind::Activate => self.activate,
            CommandKind::Deactivate => self.deactivate,
        }
    }
}

/// One line of the activity log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

/// Shared application state, updated from [`SessionEvent`]s.
#[derive(Debug)]
pub struct AppState {
    /// Current connection status.
    pub connection_status: RwLock<ConnectionStatus>,

    /// Connected or target device.
    pub device: RwLock<Option<DeviceHandle>>,

    /// Recent activity, oldest first.
    log: RwLock<VecDeque<LogEntry>>,
    log_capacity: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_ENTRIES)
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            connection_status: RwLock::new(ConnectionStatus::Disconnected),
            device: RwLock::new(None),
            log: RwLock::new(VecDeque::new()),
            log_capacity: log_capacity.max(1),
        }
    }

    pub fn set_connecting(&self, device: DeviceHandle) {
        self.append_log(format!("Connecting to {}...", device.name()));
        *self.connection_status.write() = ConnectionStatus::Connecting;
        *self.device.write() = Some(device);
    }

    /// Record a command being sent. Only the token is logged.
    pub fn record_command(&self, kind: CommandKind) {
        self.append_log(kind.token().to_string());
    }

    /// Apply a completion event.
    pub fn apply(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected { device } => {
                *self.connection_status.write() = ConnectionStatus::Connected;
                *self.device.write() = Some(device.clone());
                self.append_log(format!("Connected to {}", device.name()));
            }
            SessionEvent::ConnectFailed { device, error } => {
                *self.connection_status.write() = ConnectionStatus::Error;
                self.append_log(format!("Error connecting to {}: {}", device.name(), error));
            }
            SessionEvent::Disconnected => {
                *self.connection_status.write() = ConnectionStatus::Disconnected;
                *self.device.write() = None;
                self.append_log("Disconnected".to_string());
            }
            SessionEvent::Replied { reply, .. } => {
                self.append_log(reply.as_str().trim_end().to_string());
            }
            SessionEvent::CommandFailed { kind, error } => {
                self.append_log(format!("{} failed: {}", kind, error));
            }
        }
    }

    pub fn get_status(&self) -> ConnectionStatus {
        *self.connection_status.read()
    }

    pub fn get_device(&self) -> Option<DeviceHandle> {
        self.device.read().clone()
    }

    /// Which actions may be offered right now, given the activation
    /// controller's `lock`.
    pub fn enabled_actions(&self, lock: LockState) -> EnabledActions {
        let connected = self.get_status() == ConnectionStatus::Connected;
        let unlocked = connected && lock == LockState::Unlocked;

        EnabledActions {
            password: connected,
            beep: connected,
            activate: unlocked,
            deactivate: unlocked,
        }
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.read().iter().cloned().collect()
    }

    fn append_log(&self, text: String) {
        let mut log = self.log.write();
        if log.len() == self.log_capacity {
            log.pop_front();
        }
        log.push_back(LogEntry {
            timestamp: Local::now(),
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::protocol::Reply;
    use crate::bluetooth::TransportError;
    use crate::activation::ActivationController;
    use crate::session::{Session, SessionError};
    use crate::testing::ScriptedTransport;

    fn hc06() -> DeviceHandle {
        DeviceHandle::new("98:D3:31:F5:1A:2B", "HC-06")
    }

    #[test]
    fn test_initially_nothing_enabled() {
        let state = AppState::new();
        assert_eq!(state.get_status(), ConnectionStatus::Disconnected);
        assert_eq!(
            state.enabled_actions(LockState::Unlocked),
            EnabledActions::default()
        );
    }

    #[test]
    fn test_actions_follow_connection_and_password() {
        let state = AppState::new();
        state.set_connecting(hc06());
        assert_eq!(state.get_status(), ConnectionStatus::Connecting);
        assert!(!state.enabled_actions(LockState::Unlocked).beep);

        state.apply(&SessionEvent::Connected { device: hc06() });
        let actions = state.enabled_actions(LockState::Locked);
        assert!(actions.password);
        assert!(actions.allows(CommandKind::Beep));
        assert!(!actions.allows(CommandKind::Activate));

        let actions = state.enabled_actions(LockState::Unlocked);
        assert!(actions.allows(CommandKind::Activate));
        assert!(actions.allows(CommandKind::Deactivate));

        state.apply(&SessionEvent::Disconnected);
        assert_eq!(
            state.enabled_actions(LockState::Unlocked),
            EnabledActions::default()
        );
        assert_eq!(state.get_device(), None);
    }

    #[test]
    fn test_connect_failure_disables_actions() {
        let state = AppState::new();
        state.apply(&SessionEvent::ConnectFailed {
            device: hc06(),
            error: SessionError::ConnectFailed(TransportError::Unreachable("HC-06".into())),
        });

        assert_eq!(state.get_status(), ConnectionStatus::Error);
        assert_eq!(
            state.enabled_actions(LockState::Unlocked),
            EnabledActions::default()
        );
        assert!(state.log_entries()[0].text.starts_with("Error connecting to HC-06"));
    }

    #[tokio::test]
    async fn test_actions_track_captured_password() {
        let session = Arc::new(Session::new(ScriptedTransport::new()));
        let activation = ActivationController::new(session);
        let state = AppState::new();
        state.apply(&SessionEvent::Connected { device: hc06() });

        assert!(!state.enabled_actions(activation.lock_state()).activate);
        activation.capture_password("1234");
        assert!(state.enabled_actions(activation.lock_state()).activate);
    }

    #[test]
    fn test_log_records_token_and_reply() {
        let state = AppState::new();
        state.record_command(CommandKind::Activate);
        state.apply(&SessionEvent::Replied {
            kind: CommandKind::Activate,
            reply: Reply::new("armed\r\n"),
        });

        let texts: Vec<_> = state.log_entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["ACT", "armed"]);
    }

    #[test]
    fn test_log_is_bounded() {
        let state = AppState::with_log_capacity(2);
        state.record_command(CommandKind::Beep);
        state.record_command(CommandKind::Activate);
        state.record_command(CommandKind::Deactivate);

        let texts: Vec<_> = state.log_entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["ACT", "DEACT"]);
    }
}
