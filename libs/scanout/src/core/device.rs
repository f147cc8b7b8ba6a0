// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPU device selection.

use crate::core::capability::{names, CapabilityScope, CapabilitySet};
use crate::core::error::SetupError;
use crate::egl::{DeviceHandle, DeviceString, EglApi};

/// A physical GPU that can drive DRM/KMS.
#[derive(Debug, Clone)]
pub struct Device {
    handle: DeviceHandle,
    extensions: CapabilitySet,
}

impl Device {
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    pub fn extensions(&self) -> &CapabilitySet {
        &self.extensions
    }
}

/// Client-side extensions needed to enumerate and query devices.
fn require_device_enumeration(client: &CapabilitySet) -> Result<(), SetupError> {
    if client.contains(names::DEVICE_BASE)
        || (client.contains(names::DEVICE_ENUMERATION) && client.contains(names::DEVICE_QUERY))
    {
        return Ok(());
    }
    // Name the extension an implementation is most likely to be missing.
    client.require(names::DEVICE_BASE)
}

/// Pick the first enumerated device that advertises `EGL_EXT_device_drm`.
///
/// Selection is first-match in driver enumeration order, with no scoring,
/// so the same enumeration and extension strings always give the same
/// device.
pub fn select_device<A: EglApi + ?Sized>(api: &A) -> Result<Device, SetupError> {
    let client =
        CapabilitySet::from_query(CapabilityScope::Client, api.client_extensions().as_deref());
    require_device_enumeration(&client)?;

    let count = api.device_count().map_err(SetupError::DeviceQueryFailed)?;
    if count == 0 {
        return Err(SetupError::NoDevicesFound);
    }

    let devices = api
        .enumerate_devices(count)
        .map_err(SetupError::DeviceQueryFailed)?;
    tracing::debug!("Enumerated {} EGL device(s)", devices.len());

    for (index, handle) in devices.into_iter().enumerate() {
        let extensions = CapabilitySet::from_query(
            CapabilityScope::Device,
            api.device_string(handle, DeviceString::Extensions).as_deref(),
        );
        if extensions.contains(names::DEVICE_DRM) {
            tracing::info!("Selected EGL device {} ({:?})", index, handle);
            return Ok(Device { handle, extensions });
        }
        tracing::debug!("Skipping EGL device {} ({:?}): no {}", index, handle, names::DEVICE_DRM);
    }

    Err(SetupError::NoCompatibleDevice)
}
