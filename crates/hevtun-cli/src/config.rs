// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs,
    path::{Path, PathBuf},
};

use hevtun_core::LibraryConfig;
use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug)]
pub enum ConfigSetupError {
    #[error("failed to parse config file {file}: {error}")]
    Parse {
        file: PathBuf,
        error: Box<toml::de::Error>,
    },

    #[error("failed to read config file {file}: {error}")]
    ReadConfig {
        file: PathBuf,
        error: std::io::Error,
    },
}

/// Library settings from `config_file` (defaults when absent), with the
/// library path optionally overridden.
pub(crate) fn library_config(
    config_file: Option<&Path>,
    library_override: Option<PathBuf>,
) -> Result<LibraryConfig, ConfigSetupError> {
    let mut config = match config_file {
        Some(file) => read_config_file(file)?,
        None => LibraryConfig::default(),
    };
    if let Some(library) = library_override {
        config.library = library;
    }
    Ok(config)
}

pub(crate) fn read_config_file<C>(file_path: &Path) -> Result<C, ConfigSetupError>
where
    C: DeserializeOwned,
{
    let file_content =
        fs::read_to_string(file_path).map_err(|error| ConfigSetupError::ReadConfig {
            file: file_path.to_path_buf(),
            error,
        })?;
    toml::from_str(&file_content).map_err(|error| ConfigSetupError::Parse {
        file: file_path.to_path_buf(),
        error: Box::new(error),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use hevtun_core::{DEFAULT_RUN_SYMBOL, DEFAULT_STOP_SYMBOL};

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        let config = library_config(None, None).unwrap();
        assert_eq!(config, LibraryConfig::default());
    }

    #[test]
    fn partial_file_keeps_default_symbols() {
        let file = write_config("library = \"/data/app/lib/arm64/libhev-socks5-tunnel.so\"\n");
        let config = library_config(Some(file.path()), None).unwrap();
        assert_eq!(
            config.library,
            PathBuf::from("/data/app/lib/arm64/libhev-socks5-tunnel.so")
        );
        assert_eq!(config.run_symbol, DEFAULT_RUN_SYMBOL);
        assert_eq!(config.stop_symbol, DEFAULT_STOP_SYMBOL);
    }

    #[test]
    fn override_wins_over_file() {
        let file = write_config(
            "library = \"libhev.so\"\nrun_symbol = \"tunnel_main\"\nstop_symbol = \"tunnel_quit\"\n",
        );
        let config =
            library_config(Some(file.path()), Some(PathBuf::from("/tmp/libother.so"))).unwrap();
        assert_eq!(config.library, PathBuf::from("/tmp/libother.so"));
        assert_eq!(config.run_symbol, "tunnel_main");
        assert_eq!(config.stop_symbol, "tunnel_quit");
    }

    #[test]
    fn malformed_file() {
        let file = write_config("library = [\n");
        let err = library_config(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigSetupError::Parse { .. }));
    }

    #[test]
    fn missing_file() {
        let err = library_config(Some(Path::new("/nonexistent/hevtun.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigSetupError::ReadConfig { .. }));
    }
}
