// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

//! Process-wide tunnel used by the VPN service.
//!
//! The service only understands "start returned 0", so every outcome is
//! logged here and flattened into the acknowledgement.

use std::os::fd::{BorrowedFd, RawFd};

use hevtun_core::{
    close_descriptor, DynamicLoader, LibraryLoader, RunningFlag, StartOutcome, StopOutcome,
    TunnelController,
};
use lazy_static::lazy_static;
use parking_lot::Mutex;

/// Value returned by every start request.
pub const START_ACK: i32 = 0;

lazy_static! {
    static ref BRIDGE: Bridge = Bridge::new(TunnelController::default());
}

pub struct Bridge<L: LibraryLoader = DynamicLoader> {
    controller: Mutex<TunnelController<L>>,
    running: RunningFlag,
}

impl<L: LibraryLoader> Bridge<L> {
    pub fn new(controller: TunnelController<L>) -> Self {
        let running = controller.running_flag();
        Self {
            controller: Mutex::new(controller),
            running,
        }
    }

    pub fn start_tunnel(&self, config: &str, tun_fd: RawFd) -> i32 {
        if tun_fd < 0 {
            tracing::error!("Refusing to start tunnel on invalid fd {}", tun_fd);
            return START_ACK;
        }

        // SAFETY: the service keeps `tun_fd` open until this call returns.
        let tun_fd = unsafe { BorrowedFd::borrow_raw(tun_fd) };
        match self.controller.lock().start(config, tun_fd) {
            Ok(StartOutcome::Started) => tracing::info!("Tunnel started"),
            Ok(StartOutcome::AlreadyRunning) => {
                tracing::debug!("Tunnel already running; skip start")
            }
            Ok(StartOutcome::LoadFailed(err)) => tracing::error!("Tunnel not started: {}", err),
            Err(err) => tracing::error!("Failed to start tunnel: {}", err),
        }
        START_ACK
    }

    /// Blocks until the tunnel library has returned.
    pub fn stop_tunnel(&self) {
        match self.controller.lock().stop() {
            Ok(StopOutcome::NotLoaded) => {
                tracing::warn!("Stop requested but tunnel library not loaded")
            }
            Ok(StopOutcome::Stopped { exit_code }) => {
                tracing::info!("Tunnel stopped (exit code: {:?})", exit_code)
            }
            Err(err) => tracing::error!("Tunnel stopped with error: {}", err),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

pub fn start_tunnel(config: &str, tun_fd: RawFd) -> i32 {
    BRIDGE.start_tunnel(config, tun_fd)
}

pub fn stop_tunnel() {
    BRIDGE.stop_tunnel()
}

pub fn is_running() -> bool {
    BRIDGE.is_running()
}

pub fn close_fd(fd: RawFd) {
    close_descriptor(fd)
}
