//! Command-line interface, matching the flag set of
//! `daemon_cl.cpp` exactly (short single-letter flags rather than the
//! long `--kebab-case` style `clap` favors by default, since these mirror
//! a fixed external interface).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "gptp", author, version, about = "IEEE 802.1AS (gPTP) daemon")]
pub struct Args {
    /// Network interface to run the port on.
    pub ifname: String,

    /// Start syntonization (enable the clock servo).
    #[arg(short = 'S')]
    pub syntonize: bool,

    /// Enable pulse-per-second output.
    #[arg(short = 'P')]
    pub pps: bool,

    /// Persistence file for port/clock state.
    #[arg(short = 'M')]
    pub persistence_file: Option<PathBuf>,

    /// POSIX group granting IPC read access.
    #[arg(short = 'G')]
    pub ipc_group: Option<String>,

    /// Override priority1 (default 248).
    #[arg(short = 'R')]
    pub priority1: Option<u8>,

    /// PHY delay ns per link speed: gbTx,gbRx,mbTx,mbRx.
    #[arg(short = 'D')]
    pub phy_delay: Option<String>,

    /// Force MASTER (ignored under the automotive profile).
    #[arg(short = 'T')]
    pub force_master: bool,

    /// Force SLAVE (ignored under the automotive profile).
    #[arg(short = 'L')]
    pub force_slave: bool,

    /// Test-mode logging (trace level).
    #[arg(short = 'E')]
    pub test_mode: bool,

    /// Enable the AVnu automotive profile.
    #[arg(short = 'V')]
    pub automotive: bool,

    /// Declare this clock the grandmaster (automotive profile only).
    #[arg(long = "GM")]
    pub grandmaster: bool,

    /// Allow a negative correctionField.
    #[arg(short = 'N')]
    pub allow_negative_correction: bool,

    /// Initial log2(sync interval), seconds.
    #[arg(long = "INITSYNC")]
    pub init_log_sync_interval: Option<i8>,

    /// Operational log2(sync interval), seconds.
    #[arg(long = "OPERSYNC")]
    pub oper_log_sync_interval: Option<i8>,

    /// Initial log2(pdelay interval), seconds.
    #[arg(long = "INITPDELAY")]
    pub init_log_pdelay_interval: Option<i8>,

    /// Operational log2(pdelay interval), seconds.
    #[arg(long = "OPERPDELAY")]
    pub oper_log_pdelay_interval: Option<i8>,

    /// Read additional configuration from an INI file.
    #[arg(short = 'F')]
    pub config_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interface_and_flags() {
        let args = Args::parse_from(["gptp", "eth0", "-S", "-V", "-R", "64"]);
        assert_eq!(args.ifname, "eth0");
        assert!(args.syntonize);
        assert!(args.automotive);
        assert_eq!(args.priority1, Some(64));
    }

    #[test]
    fn config_file_flag() {
        let args = Args::parse_from(["gptp", "eth0", "-F", "/etc/gptp/gptp.cfg"]);
        assert_eq!(
            args.config_file,
            Some(PathBuf::from("/etc/gptp/gptp.cfg"))
        );
    }
}
