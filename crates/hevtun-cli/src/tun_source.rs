// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::{net::Ipv4Addr, os::fd::AsRawFd};

use nix::fcntl::{fcntl, FcntlArg};

use crate::{
    commands::RunArgs,
    error::{Error, Result},
};

/// The tun descriptor the tunnel library is started on.
///
/// Kept alive for the whole run; the library only ever sees a duplicate.
pub(crate) enum TunSource {
    Inherited(OwnedFd),
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    Device(tun::platform::Device),
}

impl TunSource {
    pub(crate) fn open(args: &RunArgs) -> Result<Self> {
        match (&args.tun.tun_fd, &args.tun.tun_name) {
            (Some(fd), _) => Self::inherit(*fd),
            (None, Some(name)) => Self::create(name, args.tun_address, args.tun_mtu),
            (None, None) => Err(Error::NoTunSource),
        }
    }

    fn inherit(fd: RawFd) -> Result<Self> {
        fcntl(fd, FcntlArg::F_GETFD).map_err(|error| Error::InvalidTunFd { fd, error })?;
        tracing::info!("Using inherited tun fd {}", fd);
        // SAFETY: the descriptor is open and was handed to this process to own.
        Ok(TunSource::Inherited(unsafe { OwnedFd::from_raw_fd(fd) }))
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    fn create(name: &str, address: Ipv4Addr, mtu: u16) -> Result<Self> {
        crate::unix_has_root("hevtun")?;

        let mut tun_config = tun::Configuration::default();
        tun_config
            .name(name)
            .address(address)
            .netmask(Ipv4Addr::BROADCAST)
            .mtu(i32::from(mtu))
            .up();

        #[cfg(target_os = "linux")]
        tun_config.platform(|config| {
            config.packet_information(false);
        });

        let device = tun::create(&tun_config).map_err(Error::CreateTunDevice)?;
        tracing::info!(
            "Created tun device {} ({}/32, mtu {}, fd {})",
            name,
            address,
            mtu,
            device.as_raw_fd()
        );
        Ok(TunSource::Device(device))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn create(_name: &str, _address: std::net::Ipv4Addr, _mtu: u16) -> Result<Self> {
        Err(Error::TunDeviceUnsupported)
    }

    pub(crate) fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            TunSource::Inherited(fd) => fd.as_fd(),
            // SAFETY: the device owns the descriptor and outlives the borrow.
            #[cfg(any(target_os = "linux", target_os = "macos"))]
            TunSource::Device(device) => unsafe { BorrowedFd::borrow_raw(device.as_raw_fd()) },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::{
        fd::{AsRawFd, IntoRawFd},
        unix::net::UnixStream,
    };

    use super::*;

    #[test]
    fn inherit_open_fd() {
        let (local, _peer) = UnixStream::pair().unwrap();
        let raw = local.into_raw_fd();

        let source = TunSource::inherit(raw).unwrap();
        assert_eq!(source.as_fd().as_raw_fd(), raw);
    }

    #[test]
    fn inherit_closed_fd() {
        let err = TunSource::inherit(1_000_000).err().unwrap();
        assert!(matches!(err, Error::InvalidTunFd { fd: 1_000_000, .. }));
    }
}
