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

//! Command session over a single transport.
//!
//! A [`Session`] owns its transport and runs at most one command exchange at
//! a time. The serial protocol has no framing, so two overlapping writes
//! would make the replies impossible to attribute.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::bluetooth::protocol::{self, Command, Reply};
use crate::bluetooth::{DeviceHandle, Transport, TransportError};

/// State of the session's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

/// Errors surfaced by [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] TransportError),

    #[error("not connected")]
    NotConnected,

    #[error("I/O failure: {0}")]
    IoFailure(#[source] TransportError),
}

impl SessionError {
    fn io(e: TransportError) -> Self {
        match e {
            TransportError::NotConnected => SessionError::NotConnected,
            other => SessionError::IoFailure(other),
        }
    }
}

struct Status {
    state: TransportState,
    device: Option<DeviceHandle>,
}

/// Serializes commands to one device over one transport.
pub struct Session<T: Transport> {
    /// Exclusive execution token. Held for the whole of a connect or a
    /// write/read exchange.
    link: Mutex<T>,
    status: RwLock<Status>,
    /// Wakes an in-flight connect or exchange when the session is torn down.
    abort: Notify,
    /// Bumped by every disconnect.
    teardowns: AtomicU64,
}

impl<T: Transport> Session<T> {
    /// Create a disconnected session owning `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            link: Mutex::new(transport),
            status: RwLock::new(Status {
                state: TransportState::Disconnected,
                device: None,
            }),
            abort: Notify::new(),
            teardowns: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> TransportState {
        self.status.read().state.clone()
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.status.read().device.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.read().state == TransportState::Connected
    }

    fn set_status(&self, state: TransportState, device: Option<DeviceHandle>) {
        let mut status = self.status.write();
        status.state = state;
        status.device = device;
    }

    /// Connect to `device`, closing any existing connection first.
    ///
    /// Waits for an in-flight [`send`](Self::send) to finish rather than
    /// interrupting it. A [`disconnect`](Self::disconnect) issued while this
    /// call is queued or opening the channel abandons it.
    pub async fn connect(&self, device: DeviceHandle) -> Result<(), SessionError> {
        let teardowns = self.teardowns.load(Ordering::SeqCst);
        let mut transport = self.link.lock().await;

        // Registered before the teardown check so a disconnect landing after
        // it still wakes this connect.
        let aborted = self.abort.notified();
        if self.teardowns.load(Ordering::SeqCst) != teardowns {
            info!("Connect to {} abandoned by disconnect", device);
            return Err(abandoned());
        }

        if transport.is_open() {
            if let Some(previous) = self.device() {
                info!("Closing connection to {} before reconnecting", previous);
            }
            transport.disconnect().await;
        }

        self.set_status(TransportState::Connecting, Some(device.clone()));
        info!("Connecting to {}...", device);

        let outcome = tokio::select! {
            result = transport.connect(&device) => Some(result),
            _ = aborted => None,
        };

        match outcome {
            Some(Ok(())) => {
                info!("Connected to {}", device);
                self.set_status(TransportState::Connected, Some(device));
                Ok(())
            }
            Some(Err(e)) => {
                warn!("Failed to connect to {}: {}", device, e);
                self.set_status(TransportState::Failed(e.to_string()), Some(device));
                Err(SessionError::ConnectFailed(e))
            }
            None => {
                info!("Connect to {} abandoned by disconnect", device);
                transport.disconnect().await;
                self.set_status(TransportState::Disconnected, None);
                Err(abandoned())
            }
        }
    }

    /// Tear down the connection. Never fails and is safe to repeat.
    ///
    /// An exchange in flight is abandoned and fails with
    /// [`SessionError::IoFailure`]; a connect in flight fails with
    /// [`SessionError::ConnectFailed`].
    pub async fn disconnect(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.set_status(TransportState::Disconnected, None);
        self.abort.notify_waiters();

        let mut transport = self.link.lock().await;
        transport.disconnect().await;
        self.set_status(TransportState::Disconnected, None);
        debug!("Session disconnected");
    }

    /// Send `command` and return the controller's reply.
    ///
    /// Concurrent callers wait their turn; only one write/read pair runs at
    /// any instant. No retry is attempted.
    pub async fn send(&self, command: &Command) -> Result<Reply, SessionError> {
        let mut transport = self.link.lock().await;

        // Registered before the state check so a disconnect landing after it
        // still wakes this exchange.
        let aborted = self.abort.notified();
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let bytes = protocol::encode(command);
        info!("Sending {}", command.token());

        let exchange = async {
            transport.write(&bytes).await?;
            transport.read().await
        };

        let raw = tokio::select! {
            result = exchange => result.map_err(SessionError::io)?,
            _ = aborted => {
                warn!("Session disconnected while waiting for reply to {}", command.token());
                return Err(SessionError::IoFailure(TransportError::IoFailure(
                    "session disconnected".to_string(),
                )));
            }
        };

        let reply = protocol::decode(&raw);
        debug!("Reply to {}: {:?}", command.token(), reply.as_str());
        Ok(reply)
    }
}

fn abandoned() -> SessionError {
    SessionError::ConnectFailed(TransportError::Unreachable(
        "connection abandoned by disconnect".to_string(),
    ))
}
