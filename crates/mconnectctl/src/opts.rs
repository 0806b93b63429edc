use clap::{ArgAction, Parser, Subcommand};
use mconnect_client::DevicePath;

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq, Eq)]
pub struct Opt {
    pub log_debug: bool,
    pub json: bool,
    pub bus_address: Option<String>,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version, about)]
pub(super) struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Print machine readable output, one JSON object per line.
    #[arg(long, global = true)]
    json: bool,

    /// Address of the bus mconnect is registered on. Defaults to the session bus.
    #[arg(long = "address", global = true, env = "MCONNECT_BUS_ADDRESS")]
    bus_address: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Action {
    /// Generate a shell completion script
    ShellCompletions {
        #[arg(short, long)]
        shell: clap_complete::Shell,
    },

    /// List the devices known to the mconnect daemon.
    #[command(name = "list", alias = "ls")]
    List,

    /// Print devices coming and going, battery updates and pings as they happen.
    #[command(name = "monitor", alias = "m")]
    Monitor {
        /// Ask the daemon for its devices again every this many seconds. 0 disables rescanning.
        #[arg(long, default_value_t = 30)]
        rescan: u64,
    },

    /// Ask the daemon to allow a device.
    #[command(name = "allow")]
    Allow {
        /// Object path of the device, as printed by `list`.
        device: DevicePath,
    },

    /// Set whether a device is allowed, and wait for the daemon to confirm.
    #[command(name = "set-allowed")]
    SetAllowed {
        /// Object path of the device, as printed by `list`.
        device: DevicePath,

        #[arg(action = ArgAction::Set)]
        allowed: bool,
    },
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { log_debug, json, bus_address, action } = other;
        Opt { log_debug, json, bus_address, action }
    }
}
