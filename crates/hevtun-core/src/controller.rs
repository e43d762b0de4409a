// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    ffi::c_uint,
    os::fd::{AsRawFd, BorrowedFd, RawFd},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    config::{LibraryConfig, TunnelConfig},
    descriptor::DescriptorSlot,
    error::{Error, LoadError, Result},
    loader::{DynamicLoader, LibraryLoader, TunnelLibrary},
    status::{RunningFlag, RunningGuard, TunnelStatus, TunnelStatusReceiver},
};

const WORKER_THREAD_NAME: &str = "hevtun-worker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The worker entered the tunnel library.
    Started,

    /// A tunnel is already running; nothing was done.
    AlreadyRunning,

    /// The library could not be loaded; the worker exited without running.
    LoadFailed(LoadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was loaded, so there was nothing to stop.
    NotLoaded,

    /// The tunnel was torn down and the library unloaded. `exit_code` is the
    /// value returned by the library, if a worker was running.
    Stopped { exit_code: Option<i32> },
}

/// Sent by the worker once it no longer needs the caller's descriptor.
enum Handoff {
    Running,
    LoadFailed(LoadError),
}

struct Shared {
    running: RunningFlag,
    library: Mutex<Option<Arc<dyn TunnelLibrary>>>,
    tun_fd: DescriptorSlot,
    stop_requested: AtomicBool,
    status: watch::Sender<TunnelStatus>,
}

impl Shared {
    fn ensure_loaded<L: LibraryLoader>(
        &self,
        loader: &L,
        config: &LibraryConfig,
    ) -> Result<Arc<dyn TunnelLibrary>, LoadError> {
        let mut library = self.library.lock();
        if let Some(library) = library.as_ref() {
            return Ok(Arc::clone(library));
        }

        tracing::debug!("Loading tunnel library {}", config);
        let loaded = loader.load(config)?;
        *library = Some(Arc::clone(&loaded));
        Ok(loaded)
    }
}

/// Owns the tunnel library, the worker thread and the duplicated tun fd.
///
/// `start` and `stop` take `&mut self`, so lifecycle requests are serialized
/// by whoever owns the controller. [`TunnelController::running_flag`] can be
/// read from anywhere without waiting on them.
pub struct TunnelController<L: LibraryLoader = DynamicLoader> {
    loader: Arc<L>,
    config: Arc<LibraryConfig>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Option<i32>>>,
}

impl TunnelController<DynamicLoader> {
    pub fn new(config: LibraryConfig) -> Self {
        Self::with_loader(config, DynamicLoader)
    }
}

impl Default for TunnelController<DynamicLoader> {
    fn default() -> Self {
        Self::new(LibraryConfig::default())
    }
}

impl<L: LibraryLoader> TunnelController<L> {
    pub fn with_loader(config: LibraryConfig, loader: L) -> Self {
        let (status, _) = watch::channel(TunnelStatus::Idle);
        Self {
            loader: Arc::new(loader),
            config: Arc::new(config),
            shared: Arc::new(Shared {
                running: RunningFlag::default(),
                library: Mutex::new(None),
                tun_fd: DescriptorSlot::default(),
                stop_requested: AtomicBool::new(false),
                status,
            }),
            worker: None,
        }
    }

    pub fn library_config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.get()
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.shared.running.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.library.lock().is_some()
    }

    pub fn status(&self) -> TunnelStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe(&self) -> TunnelStatusReceiver {
        self.shared.status.subscribe()
    }

    /// Load the library and resolve its entry points, unless already done.
    pub fn load(&self) -> Result<()> {
        self.shared.ensure_loaded(&*self.loader, &self.config)?;
        Ok(())
    }

    /// Start the tunnel on a duplicate of `tun_fd`.
    ///
    /// Returns once the worker has loaded the library and duplicated the
    /// descriptor, without waiting for the tunnel to come up. The first start
    /// after a stop can therefore block for as long as `dlopen` takes. The
    /// caller keeps ownership of `tun_fd`.
    pub fn start(
        &mut self,
        config: impl Into<TunnelConfig>,
        tun_fd: BorrowedFd<'_>,
    ) -> Result<StartOutcome> {
        if self.shared.running.get() {
            tracing::debug!("Tunnel already running, skipping start");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let config = config.into();
        if c_uint::try_from(config.len()).is_err() {
            return Err(Error::ConfigTooLarge(config.len()));
        }

        if let Err(err) = self.join_worker() {
            tracing::warn!("Previous tunnel worker ended badly: {}", err);
        }
        self.shared.stop_requested.store(false, Ordering::Release);

        let (handoff_tx, handoff_rx) = mpsc::sync_channel(1);
        let raw_fd = tun_fd.as_raw_fd();
        let shared = Arc::clone(&self.shared);
        let loader = Arc::clone(&self.loader);
        let library_config = Arc::clone(&self.config);

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || {
                run_worker(&shared, &*loader, &library_config, config, raw_fd, handoff_tx)
            })
            .map_err(Error::SpawnWorker)?;
        self.worker = Some(worker);

        match handoff_rx.recv() {
            Ok(Handoff::Running) => Ok(StartOutcome::Started),
            Ok(Handoff::LoadFailed(err)) => Ok(StartOutcome::LoadFailed(err)),
            Err(_) => {
                tracing::error!("Tunnel worker went away before taking over the tun fd");
                self.join_worker()?;
                Err(Error::WorkerPanicked)
            }
        }
    }

    /// Stop the tunnel and unload the library.
    ///
    /// Blocks until the library's run call has returned. There is no timeout:
    /// a library that ignores the stop request blocks this call forever.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        let Some(library) = self.shared.library.lock().clone() else {
            tracing::debug!("Stop requested but the tunnel library is not loaded");
            return Ok(StopOutcome::NotLoaded);
        };

        tracing::info!("Stopping the tunnel");
        self.shared.stop_requested.store(true, Ordering::Release);
        library.request_stop();
        drop(library);

        let joined = self.join_worker();

        if self.shared.tun_fd.close() {
            tracing::warn!("Closed a tun fd duplicate the worker left open");
        }
        if self.shared.library.lock().take().is_some() {
            tracing::debug!("Released tunnel library {}", self.config.library.display());
        }

        let exit_code = joined?;
        Ok(StopOutcome::Stopped { exit_code })
    }

    fn join_worker(&mut self) -> Result<Option<i32>> {
        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        worker.join().map_err(|_| {
            tracing::error!("Tunnel worker panicked");
            Error::WorkerPanicked
        })
    }
}

impl<L: LibraryLoader> Drop for TunnelController<L> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!("Failed to stop tunnel on drop: {}", err);
        }
        // A worker that failed to load is not covered by `stop`.
        if let Err(err) = self.join_worker() {
            tracing::warn!("Failed to join tunnel worker on drop: {}", err);
        }
    }
}

fn run_worker<L: LibraryLoader>(
    shared: &Shared,
    loader: &L,
    library_config: &LibraryConfig,
    config: TunnelConfig,
    caller_fd: RawFd,
    handoff: mpsc::SyncSender<Handoff>,
) -> Option<i32> {
    let running = shared.running.raise();

    let library = match shared.ensure_loaded(loader, library_config) {
        Ok(library) => library,
        Err(err) => {
            tracing::error!("Failed to load tunnel library: {}", err);
            drop(running);
            shared
                .status
                .send_replace(TunnelStatus::LoadFailed(err.clone()));
            let _ = handoff.send(Handoff::LoadFailed(err));
            return None;
        }
    };

    // SAFETY: `start` keeps the caller's descriptor borrowed until it has
    // received the handoff, which is only sent after the duplicate exists.
    let tun_fd = shared
        .tun_fd
        .duplicate_from(unsafe { BorrowedFd::borrow_raw(caller_fd) });
    shared.status.send_replace(TunnelStatus::Running);
    let _ = handoff.send(Handoff::Running);
    drop(handoff);

    let mut teardown = WorkerTeardown {
        shared,
        running: Some(running),
        code: None,
    };

    tracing::info!(
        "Entering tunnel library (config: {} bytes, tun fd: {})",
        config.len(),
        tun_fd
    );
    let code = library.run(&config, tun_fd);
    drop(library);

    teardown.code = Some(code);
    drop(teardown);
    Some(code)
}

/// Closes the duplicate and publishes the final status once `run` is left,
/// whether it returned or unwound.
struct WorkerTeardown<'a> {
    shared: &'a Shared,
    running: Option<RunningGuard>,
    code: Option<i32>,
}

impl Drop for WorkerTeardown<'_> {
    fn drop(&mut self) {
        self.shared.tun_fd.close();
        drop(self.running.take());

        let stop_requested = self.shared.stop_requested.load(Ordering::Acquire);
        let status = match self.code {
            Some(code) if stop_requested => {
                tracing::info!("Tunnel library returned {} after stop request", code);
                TunnelStatus::Exited {
                    code,
                    stop_requested,
                }
            }
            Some(code) => {
                tracing::warn!("Tunnel library returned {} on its own", code);
                TunnelStatus::Exited {
                    code,
                    stop_requested,
                }
            }
            None => {
                tracing::error!("Tunnel library unwound out of its run call");
                TunnelStatus::Panicked
            }
        };
        self.shared.status.send_replace(status);
    }
}
