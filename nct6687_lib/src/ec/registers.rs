//! Register layout of the NCT6687 EC space

// Offsets of the EC space window, relative to the HWM base address
pub const EC_SPACE_PAGE_REGISTER_OFFSET: u16 = 0x04;
pub const EC_SPACE_INDEX_REGISTER_OFFSET: u16 = 0x05;
pub const EC_SPACE_DATA_REGISTER_OFFSET: u16 = 0x06;
/// Written to the page register before the page number itself
pub const EC_SPACE_PAGE_SELECT: u8 = 0xFF;
/// Number of ports, starting at the page register, that must be accessible
pub const EC_SPACE_PORT_COUNT: u16 = 3;

pub const NUM_REG_VOLTAGE: usize = 14;
pub const NUM_REG_TEMP: usize = 7;
pub const NUM_REG_FAN: usize = 8;
pub const NUM_REG_PWM: usize = 8;

pub const fn reg_temp(x: usize) -> u16 {
    0x100 + (x as u16) * 2
}
pub const fn reg_voltage(x: usize) -> u16 {
    0x120 + (x as u16) * 2
}
pub const fn reg_fan_rpm(x: usize) -> u16 {
    0x140 + (x as u16) * 2
}
pub const fn reg_pwm(x: usize) -> u16 {
    0x160 + x as u16
}
pub const fn reg_pwm_write(x: usize) -> u16 {
    0xA28 + x as u16
}
/// 16 bit
pub const fn reg_fan_min(x: usize) -> u16 {
    0x3B8 + (x as u16) * 2
}

// Alternate layout for system fans on some MSI boards. `x` counts from the first system fan.
pub const fn reg_fan_rpm_alt(x: usize) -> u16 {
    0x150 + (x as u16) * 2
}
pub const fn reg_pwm_alt(x: usize) -> u16 {
    0x168 + x as u16
}
/// First curve point of the firmware fan curve
pub const fn reg_pwm_write_alt(x: usize) -> u16 {
    0xC70 + (x as u16) * 0x10
}

/// Hardware monitor configuration, bit 7 starts monitoring
pub const HWM_CFG: u16 = 0x180;
pub const HWM_CFG_START: u8 = 0x80;

/// Values that enable the Super-I/O voltage inputs
pub const SIO_VOLTAGE_ENABLE: [(u16, u8); 5] = [
    (0x1BB, 0x61),
    (0x1BC, 0x62),
    (0x1BD, 0x63),
    (0x1BE, 0x64),
    (0x1BF, 0x65),
];

/// One bit per fan channel, set means manual control
pub const REG_FAN_CTRL_MODE: u16 = 0xA00;
/// Shared by all channels: handshake commands are written here, engine status is read back
pub const REG_FAN_PWM_COMMAND: u16 = 0xA01;

pub const FAN_CFG_REQ: u8 = 0x80;
pub const FAN_CFG_DONE: u8 = 0x40;

pub const REG_BUILD_YEAR: u16 = 0x604;
pub const REG_BUILD_MONTH: u16 = 0x605;
pub const REG_BUILD_DAY: u16 = 0x606;
pub const REG_VERSION_HI: u16 = 0x608;
pub const REG_VERSION_LO: u16 = 0x609;
