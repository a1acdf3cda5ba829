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

//! Bluetooth communication module.
//!
//! Provides the raw byte channel to the alarm controller's serial radio
//! module and the text protocol spoken over it.

pub mod discovery;
pub mod protocol;
pub mod rfcomm;

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub use discovery::{find_device, paired_devices};
pub use protocol::{Command, CommandKind, Reply};
pub use rfcomm::RfcommTransport;

/// A radio peer selected by the user.
///
/// `id` is the platform identifier (the Bluetooth address for RFCOMM),
/// `name` is the alias shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    id: String,
    name: String,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Errors raised by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device could not be opened.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// Opening the channel took longer than allowed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// I/O was attempted without an open channel.
    #[error("not connected")]
    NotConnected,

    /// Reading or writing the open channel failed.
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::IoFailure(e.to_string())
    }
}

/// A single bidirectional byte channel to one device.
///
/// Implementations hold at most one open channel. They know nothing about
/// the command protocol.
pub trait Transport: Send + 'static {
    /// Open a channel to `device`, closing any previous one first.
    fn connect(
        &mut self,
        device: &DeviceHandle,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the channel if open. Close errors are logged, never returned.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Write all of `bytes` to the open channel.
    fn write(&mut self, bytes: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Perform a single blocking read from the open channel.
    fn read(&mut self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Whether a channel is currently open.
    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_handle_display() {
        let device = DeviceHandle::new("98:D3:31:F5:1A:2B", "HC-06");
        assert_eq!(device.to_string(), "HC-06 (98:D3:31:F5:1A:2B)");
        assert_eq!(device.id(), "98:D3:31:F5:1A:2B");
        assert_eq!(device.name(), "HC-06");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: TransportError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert!(matches!(err, TransportError::IoFailure(ref msg) if msg.contains("pipe closed")));
    }
}
