// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// File name of the tunnel library as shipped in `jniLibs`.
pub const DEFAULT_LIBRARY_NAME: &str = "libhev-socks5-tunnel.so";

/// Blocking entry point: `int (const unsigned char *cfg, unsigned int len, int tun_fd)`.
pub const DEFAULT_RUN_SYMBOL: &str = "hev_socks5_tunnel_main_from_str";

/// Non-blocking entry point: `void (void)`.
pub const DEFAULT_STOP_SYMBOL: &str = "hev_socks5_tunnel_quit";

/// Where to find the tunnel library and which symbols to resolve in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub library: PathBuf,
    pub run_symbol: String,
    pub stop_symbol: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from(DEFAULT_LIBRARY_NAME),
            run_symbol: DEFAULT_RUN_SYMBOL.to_owned(),
            stop_symbol: DEFAULT_STOP_SYMBOL.to_owned(),
        }
    }
}

impl fmt::Display for LibraryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.library.display(),
            self.run_symbol,
            self.stop_symbol
        )
    }
}

/// Owned copy of the opaque tunnel configuration.
///
/// The buffer always carries a trailing nul byte past [`TunnelConfig::len`] so
/// libraries that treat it as a C string stay in bounds. The contents may hold
/// proxy credentials, so they are never printed and are wiped on drop.
#[derive(Clone)]
pub struct TunnelConfig {
    buf: Vec<u8>,
}

impl TunnelConfig {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        let mut buf = Vec::with_capacity(bytes.len() + 1);
        buf.extend_from_slice(bytes);
        buf.push(0);
        Self { buf }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len()]
    }

    /// Pointer to the first byte; valid for `len() + 1` bytes.
    pub fn as_ptr(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for TunnelConfig {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TunnelConfig {
    fn from(mut value: String) -> Self {
        let config = Self::new(&value);
        value.zeroize();
        config
    }
}

impl From<&[u8]> for TunnelConfig {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for TunnelConfig {
    fn from(mut value: Vec<u8>) -> Self {
        let config = Self::new(&value);
        value.zeroize();
        config
    }
}

impl fmt::Debug for TunnelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelConfig")
            .field("len", &self.len())
            .field("contents", &"(hidden)")
            .finish()
    }
}

impl Drop for TunnelConfig {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_match_shipped_library() {
        let config = LibraryConfig::default();
        assert_eq!(config.library, PathBuf::from("libhev-socks5-tunnel.so"));
        assert_eq!(config.run_symbol, "hev_socks5_tunnel_main_from_str");
        assert_eq!(config.stop_symbol, "hev_socks5_tunnel_quit");
    }

    #[test]
    fn tunnel_config_is_nul_terminated() {
        let config = TunnelConfig::from("tunnel:\n  mtu: 1500\n");
        assert_eq!(config.len(), 20);
        assert_eq!(config.as_bytes(), b"tunnel:\n  mtu: 1500\n");
        let raw = unsafe { std::slice::from_raw_parts(config.as_ptr(), config.len() + 1) };
        assert_eq!(raw.last(), Some(&0));
    }

    #[test]
    fn empty_tunnel_config() {
        let config = TunnelConfig::from(Vec::new());
        assert!(config.is_empty());
        assert_eq!(config.as_bytes(), b"");
    }

    #[test]
    fn tunnel_config_debug_hides_contents() {
        let config = TunnelConfig::from("password: hunter2");
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("len: 17"));
    }
}
