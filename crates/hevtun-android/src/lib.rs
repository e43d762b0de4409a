// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

#![cfg(unix)]

pub mod bridge;
#[cfg(target_os = "android")]
mod exports;
#[cfg(target_os = "android")]
mod logging;
