// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{os::fd::RawFd, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error(transparent)]
    Tunnel(#[from] hevtun_core::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigSetupError),

    #[error("failed to load tunnel library: {0}")]
    LoadLibrary(#[source] hevtun_core::LoadError),

    #[error("failed to read tunnel config {file}: {error}")]
    ReadTunnelConfig {
        file: PathBuf,
        error: std::io::Error,
    },

    #[error("either --tun-fd or --tun-name is required")]
    NoTunSource,

    #[error("fd {fd} is not an open descriptor: {error}")]
    InvalidTunFd { fd: RawFd, error: nix::Error },

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[error("failed setting up tun device: {0}")]
    CreateTunDevice(#[source] tun::Error),

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    #[error("creating a tun device is not supported on this platform, pass --tun-fd")]
    TunDeviceUnsupported,

    #[error("sudo/root privileges required, try rerunning with sudo: `sudo -E {binary_name} run`")]
    RootPrivilegesRequired { binary_name: String },

    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    #[error("failed to join stop task: {0}")]
    StopTask(#[source] tokio::task::JoinError),

    #[error("tunnel exited on its own (code: {0})")]
    UnexpectedExit(i32),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
