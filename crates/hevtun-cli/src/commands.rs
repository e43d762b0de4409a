// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{net::Ipv4Addr, os::fd::RawFd, path::PathBuf};

use clap::{Args, Parser, Subcommand};

const DEFAULT_TUN_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const DEFAULT_TUN_MTU: u16 = 1500;

#[derive(Parser, Debug)]
#[clap(author = "Nymtech", version, about)]
pub(crate) struct CliArgs {
    /// Path to a TOML file naming the tunnel library and its symbols.
    #[arg(short, long, value_parser = check_path)]
    pub(crate) config: Option<PathBuf>,

    /// Load the tunnel library from this path instead.
    #[arg(long, global = true)]
    pub(crate) library: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the tunnel in the foreground until interrupted
    Run(RunArgs),

    /// Check that the tunnel library loads and exports its entry points
    Probe,
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// File handed to the tunnel library as its configuration, unparsed.
    #[arg(long, value_parser = check_path)]
    pub(crate) tunnel_config: PathBuf,

    #[command(flatten)]
    pub(crate) tun: TunArgs,

    /// IPv4 address of a tun device created with --tun-name.
    #[arg(long, default_value_t = DEFAULT_TUN_ADDRESS)]
    pub(crate) tun_address: Ipv4Addr,

    /// MTU of a tun device created with --tun-name.
    #[arg(long, default_value_t = DEFAULT_TUN_MTU)]
    pub(crate) tun_mtu: u16,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub(crate) struct TunArgs {
    /// Open tun descriptor inherited from the parent process.
    #[arg(long)]
    pub(crate) tun_fd: Option<RawFd>,

    /// Create a tun device with this name (requires root).
    #[arg(long)]
    pub(crate) tun_name: Option<String>,
}

fn check_path(path: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(format!("Path {:?} does not exist", path));
    }
    if !path.is_file() {
        return Err(format!("Path {:?} is not a file", path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("hevtun").chain(args.iter().copied()))
    }

    #[test]
    fn run_with_inherited_fd() {
        let mut tunnel_config = tempfile::NamedTempFile::new().unwrap();
        writeln!(tunnel_config, "tunnel:\n  mtu: 1500").unwrap();
        let path = tunnel_config.path().to_str().unwrap();

        let args = parse(&["run", "--tunnel-config", path, "--tun-fd", "7"]).unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run command");
        };
        assert_eq!(run.tun.tun_fd, Some(7));
        assert_eq!(run.tun.tun_name, None);
        assert_eq!(run.tun_address, DEFAULT_TUN_ADDRESS);
        assert_eq!(run.tun_mtu, DEFAULT_TUN_MTU);
    }

    #[test]
    fn run_requires_exactly_one_tun_source() {
        let tunnel_config = tempfile::NamedTempFile::new().unwrap();
        let path = tunnel_config.path().to_str().unwrap();

        assert!(parse(&["run", "--tunnel-config", path]).is_err());
        assert!(parse(&[
            "run",
            "--tunnel-config",
            path,
            "--tun-fd",
            "7",
            "--tun-name",
            "tun0"
        ])
        .is_err());
    }

    #[test]
    fn missing_tunnel_config_is_rejected() {
        assert!(parse(&["run", "--tunnel-config", "/nonexistent/hev.yml", "--tun-fd", "7"]).is_err());
    }

    #[test]
    fn probe_with_library_override() {
        let args = parse(&["probe", "--library", "/opt/hev/libhev-socks5-tunnel.so"]).unwrap();
        assert!(matches!(args.command, Commands::Probe));
        assert_eq!(
            args.library,
            Some(PathBuf::from("/opt/hev/libhev-socks5-tunnel.so"))
        );
    }
}
