// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

//! Runtime loading of the tunnel library.
//!
//! [`LibraryLoader`] is the seam between the controller and `dlopen`: the
//! controller only ever sees a [`TunnelLibrary`], which keeps the module
//! loaded for as long as any clone of it is alive.

use std::{
    ffi::{c_int, c_uchar, c_uint, c_void, CStr, CString},
    fmt,
    os::{fd::RawFd, unix::ffi::OsStrExt},
    ptr::NonNull,
    sync::Arc,
};

use crate::{
    config::{LibraryConfig, TunnelConfig},
    error::LoadError,
};

/// Entry points of a loaded tunnel library.
pub trait TunnelLibrary: Send + Sync + fmt::Debug {
    /// Run the tunnel on `tun_fd`. Blocks until the tunnel terminates.
    fn run(&self, config: &TunnelConfig, tun_fd: RawFd) -> i32;

    /// Ask a concurrent [`TunnelLibrary::run`] to return. Does not block.
    fn request_stop(&self);
}

pub trait LibraryLoader: Send + Sync + 'static {
    /// Open the library and resolve both entry points.
    ///
    /// Either both entry points are usable or an error is returned; nothing is
    /// left loaded on failure.
    fn load(&self, config: &LibraryConfig) -> Result<Arc<dyn TunnelLibrary>, LoadError>;
}

type RunFn = unsafe extern "C" fn(cfg: *const c_uchar, len: c_uint, tun_fd: c_int) -> c_int;
type QuitFn = unsafe extern "C" fn();

/// Loads the library with `dlopen(RTLD_NOW | RTLD_LOCAL)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLoader;

impl LibraryLoader for DynamicLoader {
    fn load(&self, config: &LibraryConfig) -> Result<Arc<dyn TunnelLibrary>, LoadError> {
        let library = DynamicLibrary::open(config)?;
        Ok(Arc::new(library))
    }
}

/// `dlopen` handle, closed on drop.
struct ModuleHandle {
    handle: NonNull<c_void>,
    name: String,
}

// dlopen handles are process-global, safe to share across threads.
unsafe impl Send for ModuleHandle {}
unsafe impl Sync for ModuleHandle {}

impl ModuleHandle {
    fn open(name: &str, path: &CStr) -> Result<Self, LoadError> {
        let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        match NonNull::new(handle) {
            Some(handle) => Ok(Self {
                handle,
                name: name.to_owned(),
            }),
            None => Err(LoadError::Open {
                library: name.to_owned(),
                reason: last_dl_error(),
            }),
        }
    }

    fn symbol(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError> {
        let c_symbol = CString::new(symbol).map_err(|_| LoadError::InvalidName {
            what: "symbol name",
            name: symbol.to_owned(),
        })?;

        // Clear any stale error so a null result can be told apart.
        unsafe { libc::dlerror() };
        let address = unsafe { libc::dlsym(self.handle.as_ptr(), c_symbol.as_ptr()) };
        NonNull::new(address).ok_or_else(|| LoadError::MissingSymbol {
            library: self.name.clone(),
            symbol: symbol.to_owned(),
            reason: last_dl_error(),
        })
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        let result = unsafe { libc::dlclose(self.handle.as_ptr()) };
        if result != 0 {
            tracing::warn!("dlclose of {} failed: {}", self.name, last_dl_error());
        } else {
            tracing::debug!("Unloaded {}", self.name);
        }
    }
}

/// Tunnel library resolved through `dlsym`.
pub struct DynamicLibrary {
    run: RunFn,
    quit: QuitFn,
    module: ModuleHandle,
}

impl DynamicLibrary {
    pub fn open(config: &LibraryConfig) -> Result<Self, LoadError> {
        let name = config.library.display().to_string();
        let path = CString::new(config.library.as_os_str().as_bytes()).map_err(|_| {
            LoadError::InvalidName {
                what: "library path",
                name: name.clone(),
            }
        })?;

        // On any failure below the handle is dropped, which closes the module.
        let module = ModuleHandle::open(&name, &path)?;
        let run = module.symbol(&config.run_symbol)?;
        let quit = module.symbol(&config.stop_symbol)?;

        tracing::debug!("Resolved tunnel symbols in {}", name);

        // SAFETY: the symbol names identify functions with these signatures.
        let (run, quit) = unsafe {
            (
                std::mem::transmute::<*mut c_void, RunFn>(run.as_ptr()),
                std::mem::transmute::<*mut c_void, QuitFn>(quit.as_ptr()),
            )
        };

        Ok(Self { run, quit, module })
    }
}

impl TunnelLibrary for DynamicLibrary {
    fn run(&self, config: &TunnelConfig, tun_fd: RawFd) -> i32 {
        let len = match c_uint::try_from(config.len()) {
            Ok(len) => len,
            Err(_) => {
                tracing::error!("Tunnel config of {} bytes is too large", config.len());
                return -1;
            }
        };
        unsafe { (self.run)(config.as_ptr(), len, tun_fd) }
    }

    fn request_stop(&self) {
        unsafe { (self.quit)() }
    }
}

impl fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("module", &self.module.name)
            .finish()
    }
}

fn last_dl_error() -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown error".to_owned()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}
