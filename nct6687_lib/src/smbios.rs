//! Board identification through SMBIOS/DMI, to pick the register layout
use std::io::ErrorKind;

use smbioslib::*;

use crate::board::BoardVariant;

const MSI_MANUFACTURER: &str = "Micro-Star International Co., Ltd.";

/// Boards whose system fans sit in the alternate register block
const ALTERNATE_A_BOARDS: &[&str] = &[
    "MAG B650 TOMAHAWK WIFI (MS-7D75)",
    "MAG B650M MORTAR WIFI (MS-7D76)",
    "MAG X670E TOMAHAWK WIFI (MS-7E12)",
    "MPG B650I EDGE WIFI (MS-7D73)",
    "MPG X670E CARBON WIFI (MS-7D70)",
    "PRO B650-P WIFI (MS-7E26)",
    "PRO B650M-A WIFI (MS-7E27)",
    "PRO X670-P WIFI (MS-7E27)",
];

fn dmidecode_string_val(s: &SMBiosString) -> Option<String> {
    match s.as_ref() {
        Ok(val) if val.is_empty() => Some("Not Specified".to_owned()),
        Ok(val) => Some(val.to_owned()),
        Err(SMBiosStringError::FieldOutOfBounds) => None,
        Err(SMBiosStringError::InvalidStringNumber(_)) => Some("<BAD INDEX>".to_owned()),
        Err(SMBiosStringError::Utf8(val)) => {
            Some(String::from_utf8_lossy(&val.clone().into_bytes()).to_string())
        }
    }
}

// On Linux this reads either from /dev/mem or sysfs
// On FreeBSD from /dev/mem
pub fn get_smbios() -> Option<SMBiosData> {
    match smbioslib::table_load_from_device() {
        Ok(data) => Some(data),
        Err(ref e) if e.kind() == ErrorKind::PermissionDenied => {
            warn!("Must be root to get SMBIOS data.");
            None
        }
        Err(err) => {
            warn!("Failed to get SMBIOS: {:?}", err);
            None
        }
    }
}

/// Baseboard manufacturer and product name
pub fn baseboard() -> Option<(String, String)> {
    let smbios = get_smbios()?;
    for undefined_struct in smbios.iter() {
        if let DefinedStruct::BaseBoardInformation(data) = undefined_struct.defined_struct() {
            let manufacturer = dmidecode_string_val(&data.manufacturer())?;
            let product = dmidecode_string_val(&data.product())?;
            return Some((manufacturer, product));
        }
    }
    None
}

pub fn variant_for_board(manufacturer: &str, product: &str) -> BoardVariant {
    if manufacturer == MSI_MANUFACTURER && ALTERNATE_A_BOARDS.contains(&product) {
        BoardVariant::AlternateA
    } else {
        BoardVariant::Default
    }
}

/// Register layout of the board we are running on, `None` if SMBIOS is unavailable
pub fn detect_board_variant() -> Option<BoardVariant> {
    let (manufacturer, product) = baseboard()?;
    let variant = variant_for_board(&manufacturer, &product);
    debug!("Board {} {} uses {:?} layout", manufacturer, product, variant);
    Some(variant)
}
