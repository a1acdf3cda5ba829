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

//! Paired device lookup.

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use super::DeviceHandle;

/// List devices already paired with the default adapter.
///
/// Pairing itself is left to the platform; this only reads the bonded set.
pub async fn paired_devices() -> Result<Vec<DeviceHandle>> {
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    debug!("Using Bluetooth adapter: {}", adapter.name());

    if !adapter.is_powered().await? {
        return Err(anyhow!(
            "Bluetooth adapter {} is powered off",
            adapter.name()
        ));
    }

    let mut devices = Vec::new();
    for addr in adapter.device_addresses().await? {
        let device = adapter.device(addr)?;
        if device.is_paired().await? {
            let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
            devices.push(DeviceHandle::new(addr.to_string(), name));
        }
    }

    info!("Found {} paired devices", devices.len());
    Ok(devices)
}

/// Pick the device matching `query` by name, falling back to address.
///
/// Names match exactly; addresses match case-insensitively.
pub fn find_device<'a>(devices: &'a [DeviceHandle], query: &str) -> Option<&'a DeviceHandle> {
    let query = query.trim();
    devices
        .iter()
        .find(|d| d.name() == query)
        .or_else(|| devices.iter().find(|d| d.id().eq_ignore_ascii_case(query)))
}
