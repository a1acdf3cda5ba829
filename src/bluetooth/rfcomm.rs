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

//! Bluetooth RFCOMM client transport.

use bluer::rfcomm::{SocketAddr, Stream};
use bluer::Address;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{DeviceHandle, Transport, TransportError};

/// RFCOMM channel used by the serial-port profile on HC-05/HC-06 modules.
pub const DEFAULT_CHANNEL: u8 = 1;

/// Time allowed for the RFCOMM connection to come up.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Size of the buffer used for a single reply read.
pub const DEFAULT_READ_BUFFER: usize = 1024;

/// Serial-over-Bluetooth channel to one paired device.
pub struct RfcommTransport {
    channel: u8,
    connect_timeout: Duration,
    read_buffer: usize,
    stream: Option<Stream>,
}

impl Default for RfcommTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER)
    }
}

impl RfcommTransport {
    /// Create a transport that connects on `channel`.
    pub fn new(channel: u8, connect_timeout: Duration, read_buffer: usize) -> Self {
        Self {
            channel,
            connect_timeout,
            read_buffer: read_buffer.max(1),
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut Stream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Transport for RfcommTransport {
    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
        self.disconnect().await;

        let address: Address = device.id().parse().map_err(|_| {
            TransportError::Unreachable(format!("invalid Bluetooth address '{}'", device.id()))
        })?;
        let addr = SocketAddr::new(address, self.channel);

        info!("Opening RFCOMM channel {} to {}", self.channel, device);
        let stream = match tokio::time::timeout(self.connect_timeout, Stream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::Unreachable(format!("{}: {}", device, e))),
            Err(_) => return Err(TransportError::Timeout(self.connect_timeout)),
        };

        info!("RFCOMM channel open to {}", device);
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error closing RFCOMM channel: {}", e);
            }
            info!("RFCOMM channel closed");
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream()?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        debug!("Wrote {} bytes", bytes.len());
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; self.read_buffer];
        let stream = self.stream()?;

        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(TransportError::IoFailure(
                "connection closed by remote".to_string(),
            ));
        }

        buf.truncate(n);
        debug!("Read {} bytes", n);
        Ok(buf)
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_io_without_channel_is_not_connected() {
        let mut transport = RfcommTransport::default();
        assert!(!transport.is_open());
        assert_eq!(transport.write(b"BEEP").await, Err(TransportError::NotConnected));
        assert_eq!(transport.read().await, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_disconnect_without_channel_is_noop() {
        let mut transport = RfcommTransport::default();
        transport.disconnect().await;
        transport.disconnect().await;
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_invalid_address_is_unreachable() {
        let mut transport = RfcommTransport::default();
        let device = DeviceHandle::new("not-an-address", "HC-06");
        let err = transport.connect(&device).await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
        assert!(!transport.is_open());
    }
}
