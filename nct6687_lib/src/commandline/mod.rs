//! Module to factor out commandline interaction
//! The binary only parses arguments and calls [`run_with_args`].

pub mod clap_std;

use std::path::PathBuf;

use crate::board::BoardVariant;
use crate::config::{self, DeviceConfig};
use crate::device::Nct6687;
use crate::ec::{EcError, EcResult, PortIo};
use crate::handshake::Delay;
use crate::os_specific;
use crate::sensors::ControlMode;
use crate::util;

#[cfg(feature = "raw_pio")]
use crate::ec::portio::{self, PortIoDriver};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum VariantArg {
    Default,
    AlternateA,
}

impl From<VariantArg> for BoardVariant {
    fn from(arg: VariantArg) -> BoardVariant {
        match arg {
            VariantArg::Default => BoardVariant::Default,
            VariantArg::AlternateA => BoardVariant::AlternateA,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FanModeArg {
    Manual,
    Auto,
}

impl From<FanModeArg> for ControlMode {
    fn from(arg: FanModeArg) -> ControlMode {
        match arg {
            FanModeArg::Manual => ControlMode::Manual,
            FanModeArg::Auto => ControlMode::Firmware,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogLevel(log::LevelFilter);

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel(log::LevelFilter::Error)
    }
}

#[derive(Debug, Default)]
pub struct Cli {
    pub verbosity: LogLevel,
    pub version: bool,
    pub sensors: bool,
    pub info: bool,
    pub dump_page: Option<u8>,
    pub fansetduty: Option<(usize, u32)>,
    pub fanmode: Option<(usize, FanModeArg)>,
    pub hold: Option<u64>,
    pub restore: bool,
    pub base_address: Option<u16>,
    pub variant: Option<VariantArg>,
    pub brute_force: bool,
    pub manual_voltage: bool,
    pub config: Option<PathBuf>,
}

pub fn parse(args: &[String]) -> Cli {
    clap_std::parse(args)
}

fn print_tool_version() {
    println!("nct6687_tool version {}", crate::built_info::PKG_VERSION);
    println!("Built at:   {}", crate::built_info::BUILT_TIME_UTC);
    println!("OS Version: {}", os_specific::get_os_version());
}

/// Resolve the device configuration
///
/// Later sources win: defaults, DMI board detection, configuration file,
/// command line.
pub fn resolve_config(args: &Cli) -> EcResult<DeviceConfig> {
    let mut cfg = DeviceConfig::default();

    #[cfg(feature = "smbios")]
    if let Some(variant) = crate::smbios::detect_board_variant() {
        cfg.variant = variant;
    }

    if let Some(file) = config::load_config(args.config.as_deref())? {
        file.apply(&mut cfg);
    }

    if let Some(variant) = args.variant {
        cfg.variant = variant.into();
    }
    cfg.brute_force |= args.brute_force;
    cfg.manual_voltage |= args.manual_voltage;
    Ok(cfg)
}

#[cfg(feature = "raw_pio")]
fn open_device(args: &Cli) -> EcResult<Nct6687<PortIoDriver>> {
    use crate::handshake::OsDelay;
    use crate::superio;

    let mut cfg = resolve_config(args)?;

    let base = if let Some(base) = args.base_address {
        base
    } else {
        for port in superio::SIO_PORTS {
            portio::request_ports(port, 2)?;
        }
        let chip = superio::probe(&PortIoDriver, &OsDelay)?;
        cfg.kind = chip.kind;
        chip.base_address
    };
    portio::request_ec_space(base)?;

    debug!("Using {:?}", cfg);
    let device = Nct6687::new(PortIoDriver, base, cfg);
    device.probe();
    Ok(device)
}

#[cfg(not(feature = "raw_pio"))]
fn open_device(_args: &Cli) -> EcResult<Nct6687<NoPorts>> {
    Err(EcError::DeviceError(
        "Built without a port I/O driver".to_string(),
    ))
}

/// Stand-in so [`open_device`] has a type to return without port access
#[cfg(not(feature = "raw_pio"))]
pub struct NoPorts;

#[cfg(not(feature = "raw_pio"))]
impl PortIo for NoPorts {
    fn inb(&self, _port: u16) -> u8 {
        0xFF
    }
    fn outb(&self, _port: u16, _value: u8) {}
}

pub fn print_sensors<P: PortIo, D: Delay>(device: &Nct6687<P, D>) {
    let snapshot = device.update();

    println!("Voltages (V)             Current      Min      Max");
    for (i, reading) in snapshot.voltage.iter().enumerate() {
        if let (Some(label), Some(r)) = (device.voltage_label(i), reading) {
            println!(
                "  {:<20} {:>9} {:>8} {:>8}",
                label,
                util::format_milli(r.current),
                util::format_milli(r.min),
                util::format_milli(r.max)
            );
        }
    }

    println!("Temperatures (C)");
    for (i, reading) in snapshot.temperature.iter().enumerate() {
        if let (Some(label), Some(r)) = (device.temperature_label(i), reading) {
            println!(
                "  {:<20} {:>9} {:>8} {:>8}",
                label,
                util::format_milli(r.current),
                util::format_milli(r.min),
                util::format_milli(r.max)
            );
        }
    }

    println!("Fans (RPM)");
    for (i, reading) in snapshot.fan.iter().enumerate() {
        if let (Some(label), Some(r)) = (device.fan_label(i), reading) {
            println!(
                "  {:<20} {:>9} {:>8} {:>8}  (min limit {})",
                label, r.current, r.min, r.max, snapshot.fan_min[i]
            );
        }
    }

    println!("PWM");
    for (i, (pwm, mode)) in snapshot.pwm.iter().zip(snapshot.mode.iter()).enumerate() {
        if !device.have_pwm(i) {
            continue;
        }
        if let Some(label) = device.fan_label(i) {
            let percent = u32::from(*pwm) * 100 / 255;
            println!("  {:<20} {:>9} {:>7}%  {:?}", label, pwm, percent, mode);
        }
    }
}

pub fn print_info<P: PortIo, D: Delay>(device: &Nct6687<P, D>) {
    let cfg = device.config();
    println!("Chip:           {}", cfg.kind.name());
    println!("Base address:   {:#06X}", device.ec().base());
    println!("Board variant:  {:?}", cfg.variant);
    println!("Brute force:    {}", cfg.brute_force);
    println!("Manual voltage: {}", cfg.manual_voltage);
    println!("EC firmware:    {}", device.firmware_info());
}

fn run_commands<P: PortIo, D: Delay>(args: &Cli, device: &Nct6687<P, D>) -> EcResult<()> {
    if args.info {
        print_info(device);
    }
    if let Some(page) = args.dump_page {
        util::print_multiline_buffer(&device.dump_page(page), usize::from(page) << 8);
    }
    if let Some((channel, duty)) = args.fansetduty {
        device.set_manual_duty(channel, duty)?;
        let (pwm, mode) = device.pwm(channel)?;
        println!("Fan {}: duty {} ({:?})", channel, pwm, mode);
    }
    if let Some((channel, mode)) = args.fanmode {
        device.set_control_mode(channel, mode.into())?;
    }
    if args.sensors {
        print_sensors(device);
    }
    if let Some(secs) = args.hold {
        for _ in 0..secs {
            os_specific::sleep(1_000_000);
            if args.sensors {
                println!();
                print_sensors(device);
            }
        }
    }
    if args.restore {
        device.teardown()?;
    }
    Ok(())
}

pub fn run_with_args(args: &Cli) -> i32 {
    let level = args.verbosity.0.as_str();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if args.version {
        print_tool_version();
        return 0;
    }

    let device = match open_device(args) {
        Ok(device) => device,
        Err(err) => {
            error!("Failed to open device: {}", err);
            return 1;
        }
    };

    match run_commands(args, &device) {
        Ok(()) => 0,
        Err(err @ EcError::InvalidArgument(_)) => {
            error!("{}", err);
            2
        }
        Err(err) => {
            error!("{}", err);
            1
        }
    }
}
