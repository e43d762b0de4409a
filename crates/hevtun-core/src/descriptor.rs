// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd},
    sync::Arc,
};

use parking_lot::Mutex;

/// Value handed to the library when no duplicate could be made.
pub(crate) const INVALID_FD: RawFd = -1;

/// Private duplicate of the caller's tun descriptor.
///
/// An empty slot stands for the `-1` sentinel, so closing twice is a no-op and
/// the worker and `stop` can both attempt it.
#[derive(Debug, Clone, Default)]
pub(crate) struct DescriptorSlot(Arc<Mutex<Option<OwnedFd>>>);

impl DescriptorSlot {
    /// Duplicate `fd` into the slot and return the raw value to hand out.
    ///
    /// A failed `dup` leaves the slot empty and yields [`INVALID_FD`].
    pub(crate) fn duplicate_from(&self, fd: BorrowedFd<'_>) -> RawFd {
        match fd.try_clone_to_owned() {
            Ok(duplicate) => {
                let raw = duplicate.as_raw_fd();
                tracing::debug!("Duplicated tun fd {} as {}", fd.as_raw_fd(), raw);
                let previous = self.0.lock().replace(duplicate);
                if previous.is_some() {
                    tracing::warn!("Replaced a tun fd duplicate that was never closed");
                }
                raw
            }
            Err(err) => {
                tracing::warn!("Failed to duplicate tun fd {}: {}", fd.as_raw_fd(), err);
                INVALID_FD
            }
        }
    }

    /// Close the duplicate if it is still open. Returns whether it was.
    pub(crate) fn close(&self) -> bool {
        let duplicate = self.0.lock().take();
        match duplicate {
            Some(fd) => {
                tracing::debug!("Closing tun fd duplicate {}", fd.as_raw_fd());
                drop(fd);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> Option<RawFd> {
        self.0.lock().as_ref().map(AsRawFd::as_raw_fd)
    }
}

/// Close a descriptor the controller never took ownership of.
///
/// Errors (already closed, never valid) are logged and otherwise ignored;
/// passing a descriptor someone else still owns is the caller's mistake.
pub fn close_descriptor(fd: RawFd) {
    if let Err(err) = nix::unistd::close(fd) {
        tracing::debug!("close({}) failed: {}", fd, err);
    }
}
