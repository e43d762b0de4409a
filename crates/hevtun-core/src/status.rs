// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::watch;

use crate::error::LoadError;

pub type TunnelStatusReceiver = watch::Receiver<TunnelStatus>;

/// Last observed state of the tunnel worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TunnelStatus {
    /// No worker has been started yet.
    #[default]
    Idle,

    /// The library is loaded and the blocking entry point has been entered.
    Running,

    /// The library could not be loaded, the worker exited without running.
    LoadFailed(LoadError),

    /// The blocking entry point returned.
    Exited { code: i32, stop_requested: bool },

    /// The blocking entry point unwound instead of returning.
    Panicked,
}

impl TunnelStatus {
    /// The tunnel went down without anyone asking it to.
    pub fn is_unexpected_exit(&self) -> bool {
        matches!(
            self,
            TunnelStatus::Exited {
                stop_requested: false,
                ..
            } | TunnelStatus::Panicked
        )
    }
}

impl fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelStatus::Idle => write!(f, "idle"),
            TunnelStatus::Running => write!(f, "running"),
            TunnelStatus::LoadFailed(err) => write!(f, "load failed: {err}"),
            TunnelStatus::Exited {
                code,
                stop_requested: true,
            } => write!(f, "stopped (code: {code})"),
            TunnelStatus::Exited {
                code,
                stop_requested: false,
            } => write!(f, "exited unexpectedly (code: {code})"),
            TunnelStatus::Panicked => write!(f, "worker panicked"),
        }
    }
}

/// Shared view of whether the worker is inside the tunnel library.
///
/// Cloning is cheap and reads never block, so a clone can be handed to threads
/// that must not wait on the controller.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Raise the flag until the returned guard is dropped.
    pub(crate) fn raise(&self) -> RunningGuard {
        self.0.store(true, Ordering::Release);
        RunningGuard(self.clone())
    }
}

/// Clears the running flag on drop, including when the worker unwinds.
#[must_use]
pub(crate) struct RunningGuard(RunningFlag);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_clears_flag() {
        let flag = RunningFlag::default();
        assert!(!flag.get());

        let guard = flag.raise();
        let observer = flag.clone();
        assert!(observer.get());

        drop(guard);
        assert!(!observer.get());
    }

    #[test]
    fn guard_clears_flag_on_panic() {
        let flag = RunningFlag::default();
        let worker_flag = flag.clone();
        let result = std::thread::spawn(move || {
            let _guard = worker_flag.raise();
            panic!("library blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!flag.get());
    }

    #[test]
    fn unexpected_exit() {
        assert!(TunnelStatus::Exited {
            code: -1,
            stop_requested: false
        }
        .is_unexpected_exit());
        assert!(!TunnelStatus::Exited {
            code: 0,
            stop_requested: true
        }
        .is_unexpected_exit());
        assert!(TunnelStatus::Panicked.is_unexpected_exit());
        assert!(!TunnelStatus::Running.is_unexpected_exit());
    }
}
