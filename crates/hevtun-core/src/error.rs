// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("{what} contains nul byte: {name}")]
    InvalidName { what: &'static str, name: String },

    #[error("failed to open {library}: {reason}")]
    Open { library: String, reason: String },

    #[error("failed to resolve {symbol} in {library}: {reason}")]
    MissingSymbol {
        library: String,
        symbol: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to spawn tunnel worker: {0}")]
    SpawnWorker(#[source] std::io::Error),

    #[error("tunnel config is too large ({0} bytes)")]
    ConfigTooLarge(usize),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("tunnel worker panicked")]
    WorkerPanicked,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
