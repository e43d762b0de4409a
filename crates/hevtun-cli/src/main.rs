// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

mod commands;
mod config;
mod error;
mod shutdown_handler;
mod tun_source;

use std::fs;

use clap::Parser;
use hevtun_core::{
    DynamicLoader, LibraryConfig, LibraryLoader, StartOutcome, StopOutcome, TunnelController,
    TunnelStatus,
};

use commands::{CliArgs, Commands, RunArgs};
use error::{Error, Result};
use tun_source::TunSource;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    setup_logging();

    let library_config = config::library_config(args.config.as_deref(), args.library)?;
    tracing::debug!("Tunnel library: {}", library_config);

    match args.command {
        Commands::Run(run_args) => run_tunnel(library_config, run_args).await?,
        Commands::Probe => probe(&library_config)?,
    }
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

pub(crate) fn unix_has_root(binary_name: &str) -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        tracing::debug!("Root privileges acquired");
        Ok(())
    } else {
        Err(Error::RootPrivilegesRequired {
            binary_name: binary_name.to_string(),
        })
    }
}

fn probe(library_config: &LibraryConfig) -> Result<()> {
    // Resolve only; the stop entry point is never called on an idle library.
    let library = DynamicLoader
        .load(library_config)
        .map_err(Error::LoadLibrary)?;
    tracing::info!("Loaded {:?} from {}", library, library_config);
    Ok(())
}

async fn run_tunnel(library_config: LibraryConfig, args: RunArgs) -> Result<()> {
    let tunnel_config =
        fs::read(&args.tunnel_config).map_err(|error| Error::ReadTunnelConfig {
            file: args.tunnel_config.clone(),
            error,
        })?;
    let tun = TunSource::open(&args)?;

    let mut controller = TunnelController::new(library_config);
    let mut status = controller.subscribe();

    match controller.start(tunnel_config, tun.as_fd())? {
        StartOutcome::Started => tracing::info!("Tunnel started, press Ctrl-C to stop"),
        StartOutcome::AlreadyRunning => tracing::warn!("Tunnel was already running"),
        StartOutcome::LoadFailed(err) => return Err(Error::LoadLibrary(err)),
    }

    let unexpected_exit = tokio::select! {
        result = shutdown_handler::wait_for_signal() => {
            result.map_err(Error::Signal)?;
            None
        }
        result = status.wait_for(TunnelStatus::is_unexpected_exit) => {
            result.ok().map(|status| status.clone())
        }
    };

    // Stop blocks until the library returns.
    let outcome = tokio::task::spawn_blocking(move || controller.stop())
        .await
        .map_err(Error::StopTask)??;
    match outcome {
        StopOutcome::Stopped { exit_code } => {
            tracing::info!("Tunnel stopped (exit code: {:?})", exit_code)
        }
        StopOutcome::NotLoaded => tracing::debug!("Tunnel library was already unloaded"),
    }
    drop(tun);

    match unexpected_exit {
        Some(TunnelStatus::Exited { code, .. }) => Err(Error::UnexpectedExit(code)),
        Some(TunnelStatus::Panicked) => Err(hevtun_core::Error::WorkerPanicked.into()),
        _ => Ok(()),
    }
}
