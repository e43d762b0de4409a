// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::io;

use tokio::signal::unix::{signal, SignalKind};

/// Resolves on the first Ctrl-C, SIGTERM or SIGQUIT.
pub(crate) async fn wait_for_signal() -> io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received Ctrl-C signal.");
        }
        _ = sigterm.recv() => tracing::info!("Received SIGTERM signal."),
        _ = sigquit.recv() => tracing::info!("Received SIGQUIT signal."),
    }
    Ok(())
}
