// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

//! Start/stop lifecycle for the `hev-socks5-tunnel` native library.
//!
//! The library is loaded at runtime, its blocking entry point is driven from a
//! dedicated worker thread and the caller's tun descriptor is duplicated so the
//! library never owns the caller's handle.

#![cfg(unix)]

mod config;
mod controller;
mod descriptor;
mod error;
pub mod loader;
mod status;

pub use config::{
    LibraryConfig, TunnelConfig, DEFAULT_LIBRARY_NAME, DEFAULT_RUN_SYMBOL, DEFAULT_STOP_SYMBOL,
};
pub use controller::{StartOutcome, StopOutcome, TunnelController};
pub use descriptor::close_descriptor;
pub use error::{Error, LoadError, Result};
pub use loader::{DynamicLoader, LibraryLoader, TunnelLibrary};
pub use status::{RunningFlag, TunnelStatus, TunnelStatusReceiver};
