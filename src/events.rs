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

//! Background dispatch of user actions and completion events.
//!
//! Every action runs on its own tokio task and reports back exactly one
//! [`SessionEvent`] over a channel, so the caller never has to share mutable
//! state with a worker.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::activation::{ActivationController, DispatchError, LockState};
use crate::bluetooth::protocol::{CommandKind, Reply};
use crate::bluetooth::{DeviceHandle, Transport};
use crate::session::{Session, SessionError};

/// Terminal outcome of one dispatched action.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connection established.
    Connected { device: DeviceHandle },
    /// Connection attempt failed.
    ConnectFailed {
        device: DeviceHandle,
        error: SessionError,
    },
    /// Connection torn down.
    Disconnected,
    /// The controller replied to a command.
    Replied { kind: CommandKind, reply: Reply },
    /// A command was refused or could not be delivered.
    CommandFailed {
        kind: CommandKind,
        error: DispatchError,
    },
}

/// Runs connect, command and disconnect requests off the caller's task.
pub struct RemoteControl<T: Transport> {
    session: Arc<Session<T>>,
    activation: Arc<ActivationController<T>>,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl<T: Transport> RemoteControl<T> {
    /// Create a remote over `transport`, seeded with a stored password.
    pub fn new(
        transport: T,
        stored_password: Option<String>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let session = Arc::new(Session::new(transport));
        let activation = Arc::new(ActivationController::with_password(
            session.clone(),
            stored_password,
        ));

        Self {
            session,
            activation,
            event_tx,
        }
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    pub fn activation(&self) -> &Arc<ActivationController<T>> {
        &self.activation
    }

    pub fn capture_password(&self, value: impl Into<String>) {
        self.activation.capture_password(value);
    }

    pub fn password(&self) -> Option<String> {
        self.activation.password()
    }

    pub fn lock_state(&self) -> LockState {
        self.activation.lock_state()
    }

    /// Connect to `device` in the background.
    pub fn connect(&self, device: DeviceHandle) -> JoinHandle<()> {
        let session = self.session.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let event = match session.connect(device.clone()).await {
                Ok(()) => SessionEvent::Connected { device },
                Err(error) => SessionEvent::ConnectFailed { device, error },
            };
            emit(&event_tx, event).await;
        })
    }

    /// Authorize and send `kind` in the background.
    pub fn command(&self, kind: CommandKind) -> JoinHandle<()> {
        let activation = self.activation.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let event = match activation.dispatch(kind).await {
                Ok(reply) => {
                    info!("{} acknowledged", kind);
                    SessionEvent::Replied { kind, reply }
                }
                Err(error) => {
                    warn!("{} failed: {}", kind, error);
                    SessionEvent::CommandFailed { kind, error }
                }
            };
            emit(&event_tx, event).await;
        })
    }

    /// Disconnect in the background.
    pub fn disconnect(&self) -> JoinHandle<()> {
        let session = self.session.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            session.disconnect().await;
            emit(&event_tx, SessionEvent::Disconnected).await;
        })
    }
}

async fn emit(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("Event receiver dropped");
    }
}
