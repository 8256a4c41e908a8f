//! Commandline parsing with clap, for the regular OS commandline tool
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{command, Args, FromArgMatches, Parser, ValueEnum};
use clap_num::maybe_hex;

use crate::commandline::{Cli, FanModeArg, LogLevel, VariantArg};

/// Sensor readout and fan control for Nuvoton NCT6687 embedded controllers
#[derive(Parser)]
#[command(arg_required_else_help = true)]
struct ClapCli {
    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,

    /// Show tool version information
    #[arg(long)]
    version: bool,

    /// Print voltages, temperatures, fan speeds and duty cycles
    #[arg(long)]
    sensors: bool,

    /// Show chip, base address, board variant and EC firmware version
    #[arg(long)]
    info: bool,

    /// Hex dump one 256 byte page of the EC register space
    #[arg(long, value_parser=maybe_hex::<u8>)]
    dump_page: Option<u8>,

    /// Switch a fan to manual control and set its duty cycle (0-255)
    #[clap(num_args = 2)]
    #[arg(long, value_names(["CHANNEL", "DUTY"]))]
    fansetduty: Vec<u32>,

    /// Hand a fan to the firmware (auto) or keep its current duty (manual)
    #[clap(num_args = 2)]
    #[arg(long, value_names(["CHANNEL", "MODE"]))]
    fanmode: Vec<String>,

    /// Keep running for this many seconds before exiting (repeats --sensors every second)
    #[arg(long, value_name = "SECS")]
    hold: Option<u64>,

    /// Revert every fan changed by this invocation before exiting
    #[arg(long)]
    restore: bool,

    /// HWM base address, skips Super-I/O detection (Advanced)
    #[arg(long, value_parser=maybe_hex::<u16>)]
    base_address: Option<u16>,

    /// Register layout of the board. By default detected from SMBIOS
    #[clap(value_enum)]
    #[arg(long)]
    variant: Option<VariantArg>,

    /// Pin the whole firmware fan curve instead of a single duty register
    #[arg(long)]
    brute_force: bool,

    /// Read voltage inputs unmapped and unscaled
    #[arg(long)]
    manual_voltage: bool,

    /// Path of the configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Parse a list of commandline arguments and return the struct
pub fn parse(args: &[String]) -> Cli {
    let cli = command!()
        .name("nct6687_tool")
        .disable_version_flag(true);
    let mut cli = ClapCli::augment_args(cli);

    let matches = cli.clone().get_matches_from(args);
    let args = ClapCli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    let fansetduty = match args.fansetduty.as_slice() {
        [channel, duty] => Some((*channel as usize, *duty)),
        // Checked by clap
        _ => None,
    };
    let fanmode = match args.fanmode.as_slice() {
        [channel, mode] => {
            let channel = channel.parse::<usize>().unwrap_or_else(|_| {
                cli.error(
                    ErrorKind::InvalidValue,
                    "First argument of --fanmode must be a fan channel number",
                )
                .exit()
            });
            let mode = FanModeArg::from_str(mode, true).unwrap_or_else(|_| {
                cli.error(
                    ErrorKind::InvalidValue,
                    "Second argument of --fanmode must be one of: 'manual', 'auto'",
                )
                .exit()
            });
            Some((channel, mode))
        }
        _ => None,
    };

    Cli {
        verbosity: LogLevel(args.verbosity.log_level_filter()),
        version: args.version,
        sensors: args.sensors,
        info: args.info,
        dump_page: args.dump_page,
        fansetduty,
        fanmode,
        hold: args.hold,
        restore: args.restore,
        base_address: args.base_address,
        variant: args.variant,
        brute_force: args.brute_force,
        manual_voltage: args.manual_voltage,
        config: args.config,
    }
}
