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

//! Test utilities.
//!
//! [`ScriptedTransport`] stands in for the radio link. Clones share state,
//! so a test can hand one clone to a session and inspect the other.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::bluetooth::{DeviceHandle, Transport, TransportError};

#[derive(Default)]
struct Script {
    open: Option<DeviceHandle>,
    unreachable: HashSet<String>,
    connect_error: Option<TransportError>,
    connect_delay: Duration,
    reads: VecDeque<Result<Vec<u8>, TransportError>>,
    write_error: Option<TransportError>,
    read_delay: Duration,
    hang_reads: bool,
    written: Vec<Vec<u8>>,
    connected: Vec<DeviceHandle>,
    closed: Vec<DeviceHandle>,
    exchange_open: bool,
    overlaps: usize,
}

/// In-memory transport with scripted replies.
///
/// Without a scripted reply, a read echoes the last write.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make connecting to the device with this id fail as unreachable.
    pub fn mark_unreachable(&self, id: &str) {
        self.script.lock().unreachable.insert(id.to_string());
    }

    /// Fail the next connect with `error`.
    pub fn set_connect_error(&self, error: TransportError) {
        self.script.lock().connect_error = Some(error);
    }

    /// Delay every connect by `delay`.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.script.lock().connect_delay = delay;
    }

    /// Queue a reply for the next read.
    pub fn push_reply(&self, bytes: &[u8]) {
        self.script.lock().reads.push_back(Ok(bytes.to_vec()));
    }

    /// Queue a failure for the next read.
    pub fn push_read_error(&self, error: TransportError) {
        self.script.lock().reads.push_back(Err(error));
    }

    /// Fail the next write with `error`.
    pub fn fail_next_write(&self, error: TransportError) {
        self.script.lock().write_error = Some(error);
    }

    /// Delay every read by `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        self.script.lock().read_delay = delay;
    }

    /// Make every read wait forever.
    pub fn hang_reads(&self) {
        self.script.lock().hang_reads = true;
    }

    /// Every payload written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.script.lock().written.clone()
    }

    /// Every device a channel was opened to, in order.
    pub fn connected(&self) -> Vec<DeviceHandle> {
        self.script.lock().connected.clone()
    }

    /// Every device whose open channel was closed, in order.
    pub fn closed(&self) -> Vec<DeviceHandle> {
        self.script.lock().closed.clone()
    }

    pub fn open_device(&self) -> Option<DeviceHandle> {
        self.script.lock().open.clone()
    }

    /// Writes that started while another exchange was still waiting for its
    /// reply.
    pub fn overlapping_exchanges(&self) -> usize {
        self.script.lock().overlaps
    }

    fn close(script: &mut Script) {
        if let Some(device) = script.open.take() {
            script.closed.push(device);
        }
        script.exchange_open = false;
    }
}

impl Transport for ScriptedTransport {
    async fn connect(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
        let delay = {
            let mut script = self.script.lock();
            Self::close(&mut script);
            script.connect_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock();
        if let Some(error) = script.connect_error.take() {
            return Err(error);
        }
        if script.unreachable.contains(device.id()) {
            return Err(TransportError::Unreachable(device.to_string()));
        }

        script.open = Some(device.clone());
        script.connected.push(device.clone());
        Ok(())
    }

    async fn disconnect(&mut self) {
        Self::close(&mut self.script.lock());
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut script = self.script.lock();
        if script.open.is_none() {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = script.write_error.take() {
            return Err(error);
        }

        if script.exchange_open {
            script.overlaps += 1;
        }
        script.exchange_open = true;
        script.written.push(bytes.to_vec());
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, TransportError> {
        let (delay, hang) = {
            let script = self.script.lock();
            if script.open.is_none() {
                return Err(TransportError::NotConnected);
            }
            (script.read_delay, script.hang_reads)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock();
        script.exchange_open = false;
        match script.reads.pop_front() {
            Some(result) => result,
            None => Ok(script.written.last().cloned().unwrap_or_default()),
        }
    }

    fn is_open(&self) -> bool {
        self.script.lock().open.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_last_write() {
        let mut transport = ScriptedTransport::new();
        transport
            .connect(&DeviceHandle::new("00:00:00:00:00:01", "HC-06"))
            .await
            .unwrap();

        transport.write(b"BEEP").await.unwrap();
        assert_eq!(transport.read().await.unwrap(), b"BEEP");
    }

    #[tokio::test]
    async fn test_connect_closes_previous_channel() {
        let mut transport = ScriptedTransport::new();
        let first = DeviceHandle::new("00:00:00:00:00:01", "first");
        let second = DeviceHandle::new("00:00:00:00:00:02", "second");

        transport.connect(&first).await.unwrap();
        transport.connect(&second).await.unwrap();

        assert_eq!(transport.closed(), vec![first]);
        assert_eq!(transport.open_device(), Some(second));
    }

    #[tokio::test]
    async fn test_scripted_connect_error_is_one_shot() {
        let mut transport = ScriptedTransport::new();
        let device = DeviceHandle::new("00:00:00:00:00:01", "HC-06");
        transport.set_connect_error(TransportError::Timeout(Duration::from_secs(10)));

        assert_eq!(
            transport.connect(&device).await,
            Err(TransportError::Timeout(Duration::from_secs(10)))
        );
        assert!(!transport.is_open());
        assert!(transport.connect(&device).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_write() {
        let mut transport = ScriptedTransport::new();
        transport
            .connect(&DeviceHandle::new("00:00:00:00:00:01", "HC-06"))
            .await
            .unwrap();
        transport.fail_next_write(TransportError::IoFailure("broken pipe".into()));

        assert!(transport.write(b"BEEP").await.is_err());
        assert!(transport.write(b"BEEP").await.is_ok());
        assert_eq!(transport.written().len(), 1);
    }
}
