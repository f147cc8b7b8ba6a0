// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGLDisplay bound to the device's DRM node.
//!
//! The DRM descriptor is opened here once and handed to EGL as
//! `EGL_DRM_MASTER_FD_EXT`, so the driver's mode-setting calls and the
//! application's flip-event reads go through the same descriptor. It
//! stays open for the lifetime of the connection.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::core::capability::{names, CapabilityScope, CapabilitySet};
use crate::core::device::Device;
use crate::core::error::SetupError;
use crate::egl::constants::DRM_MASTER_FD_EXT;
use crate::egl::{AttribList, DeviceString, DisplayHandle, EglApi, Int};

/// The process's one display connection.
#[derive(Debug)]
pub struct DisplayConnection {
    device: Device,
    drm_path: PathBuf,
    drm_file: File,
    display: DisplayHandle,
    version: (Int, Int),
    extensions: CapabilitySet,
}

impl DisplayConnection {
    pub fn handle(&self) -> DisplayHandle {
        self.display
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The DRM descriptor EGL was given.
    pub fn drm_fd(&self) -> BorrowedFd<'_> {
        self.drm_file.as_fd()
    }

    pub fn drm_path(&self) -> &Path {
        &self.drm_path
    }

    /// EGL `(major, minor)` reported by `eglInitialize`.
    pub fn version(&self) -> (Int, Int) {
        self.version
    }

    /// Display-scope extensions, queried once after initialisation.
    pub fn extensions(&self) -> &CapabilitySet {
        &self.extensions
    }
}

fn open_drm_node(path: &Path) -> Result<File, SetupError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| SetupError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Open `device`'s DRM node and create an initialised EGLDisplay on it.
pub fn open_display<A: EglApi + ?Sized>(
    api: &A,
    device: Device,
) -> Result<DisplayConnection, SetupError> {
    device.extensions().require(names::DEVICE_DRM)?;

    let drm_path = api
        .device_string(device.handle(), DeviceString::DrmDeviceFile)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or(SetupError::NoDeviceFile)?;

    let drm_file = open_drm_node(&drm_path)?;
    tracing::debug!(path = %drm_path.display(), fd = drm_file.as_raw_fd(), "Opened DRM device");

    let client =
        CapabilitySet::from_query(CapabilityScope::Client, api.client_extensions().as_deref());
    client.require(names::PLATFORM_BASE)?;
    client.require(names::PLATFORM_DEVICE)?;

    let attribs = AttribList::<Int>::new()
        .with(DRM_MASTER_FD_EXT, drm_file.as_raw_fd())
        .build();
    let display = api
        .platform_display(device.handle(), &attribs)
        .map_err(SetupError::DisplayFailed)?;

    let version = api.initialize(display).map_err(SetupError::InitFailed)?;
    tracing::info!(
        "Initialized EGL {}.{} display on {}",
        version.0,
        version.1,
        drm_path.display()
    );

    let extensions = CapabilitySet::from_query(
        CapabilityScope::Display,
        api.display_extensions(display).as_deref(),
    );

    Ok(DisplayConnection {
        device,
        drm_path,
        drm_file,
        display,
        version,
        extensions,
    })
}
