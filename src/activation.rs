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

//! Password gate for alarm commands.
//!
//! The password is kept and sent as plain text: the controller firmware
//! compares the literal digits appended to the activation tokens.

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::bluetooth::protocol::{Command, CommandKind, Reply};
use crate::bluetooth::Transport;
use crate::session::{Session, SessionError};

/// Whether a password has been captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

/// Authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("a password is required for this command")]
    Locked,
}

/// Failure of an authorized dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Composes commands with the captured password and hands them to the
/// session.
pub struct ActivationController<T: Transport> {
    session: Arc<Session<T>>,
    password: RwLock<Option<String>>,
}

impl<T: Transport> ActivationController<T> {
    /// Create a locked controller.
    pub fn new(session: Arc<Session<T>>) -> Self {
        Self {
            session,
            password: RwLock::new(None),
        }
    }

    /// Create a controller seeded from a stored password.
    ///
    /// An empty stored value counts as no password.
    pub fn with_password(session: Arc<Session<T>>, stored: Option<String>) -> Self {
        Self {
            session,
            password: RwLock::new(stored.filter(|p| !p.is_empty())),
        }
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Store `value` as the password, replacing any previous one.
    pub fn capture_password(&self, value: impl Into<String>) {
        *self.password.write() = Some(value.into());
        info!("Password captured");
    }

    /// The current password, for the caller to persist.
    pub fn password(&self) -> Option<String> {
        self.password.read().clone()
    }

    pub fn lock_state(&self) -> LockState {
        if self.password.read().is_some() {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }

    /// Build the command for `kind`.
    ///
    /// Beep is always allowed. Activate and deactivate need a password.
    pub fn authorize(&self, kind: CommandKind) -> Result<Command, AuthError> {
        let password = self.password.read();
        let command = match (kind, password.as_deref()) {
            (CommandKind::Beep, _) => Command::beep(),
            (CommandKind::Activate, Some(p)) => Command::activate(p),
            (CommandKind::Deactivate, Some(p)) => Command::deactivate(p),
            (_, None) => {
                debug!("Refusing {}: no password captured", kind);
                return Err(AuthError::Locked);
            }
        };
        Ok(command)
    }

    /// Authorize `kind` and send it over the session.
    pub async fn dispatch(&self, kind: CommandKind) -> Result<Reply, DispatchError> {
        let command = self.authorize(kind)?;
        Ok(self.session.send(&command).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::DeviceHandle;
    use crate::testing::ScriptedTransport;

    fn controller() -> (ActivationController<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new();
        let session = Arc::new(Session::new(transport.clone()));
        (ActivationController::new(session), transport)
    }

    #[test]
    fn test_beep_always_authorized() {
        let (controller, _) = controller();
        assert_eq!(controller.lock_state(), LockState::Locked);
        assert_eq!(controller.authorize(CommandKind::Beep), Ok(Command::beep()));

        controller.capture_password("1234");
        assert_eq!(controller.authorize(CommandKind::Beep), Ok(Command::beep()));
    }

    #[test]
    fn test_activation_locked_without_password() {
        let (controller, _) = controller();
        assert_eq!(controller.authorize(CommandKind::Activate), Err(AuthError::Locked));
        assert_eq!(controller.authorize(CommandKind::Deactivate), Err(AuthError::Locked));
    }

    #[test]
    fn test_activation_uses_last_password() {
        let (controller, _) = controller();
        controller.capture_password("1234");
        controller.capture_password("9999");

        assert_eq!(controller.lock_state(), LockState::Unlocked);
        let command = controller.authorize(CommandKind::Activate).unwrap();
        assert_eq!(command.password(), Some("9999"));
        let command = controller.authorize(CommandKind::Deactivate).unwrap();
        assert_eq!(command, Command::deactivate("9999"));
        assert_eq!(controller.password(), Some("9999".to_string()));
    }

    #[test]
    fn test_stored_password() {
        let session = Arc::new(Session::new(ScriptedTransport::new()));
        let controller = ActivationController::with_password(session.clone(), Some("4321".into()));
        assert_eq!(controller.lock_state(), LockState::Unlocked);

        let controller = ActivationController::with_password(session, Some(String::new()));
        assert_eq!(controller.lock_state(), LockState::Locked);
    }

    #[tokio::test]
    async fn test_dispatch_locked_sends_nothing() {
        let (controller, transport) = controller();
        controller
            .session()
            .connect(DeviceHandle::new("98:D3:31:F5:1A:2B", "HC-06"))
            .await
            .unwrap();

        let err = controller.dispatch(CommandKind::Activate).await.unwrap_err();
        assert_eq!(err, DispatchError::Auth(AuthError::Locked));
        assert!(transport.written().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_composes_password() {
        let (controller, transport) = controller();
        controller
            .session()
            .connect(DeviceHandle::new("98:D3:31:F5:1A:2B", "HC-06"))
            .await
            .unwrap();
        controller.capture_password("2468");
        transport.push_reply(b"armed");

        let reply = controller.dispatch(CommandKind::Activate).await.unwrap();
        assert_eq!(reply.as_str(), "armed");
        assert_eq!(transport.written(), vec![b"ACT2468".to_vec()]);
    }

    #[tokio::test]
    async fn test_dispatch_surfaces_session_errors() {
        let (controller, _) = controller();
        let err = controller.dispatch(CommandKind::Beep).await.unwrap_err();
        assert_eq!(err, DispatchError::Session(SessionError::NotConnected));
    }
}
