use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::board::{BoardVariant, ChipKind};
use crate::ec::{EcError, EcResult};

/// Settings that decide how registers are mapped and written
///
/// Passed to the device on construction. Control sessions take a copy when
/// they start, so changing it only affects later sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub kind: ChipKind,
    pub variant: BoardVariant,
    /// Pin every point of the firmware fan curve instead of writing a single duty
    pub brute_force: bool,
    /// Voltage inputs are read unmapped and unscaled (external sensors)
    pub manual_voltage: bool,
}

/// Contents of the configuration file. Everything is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub variant: Option<BoardVariant>,
    pub brute_force: Option<bool>,
    pub manual_voltage: Option<bool>,
}

impl ConfigFile {
    /// Overlay the values present in the file
    pub fn apply(&self, config: &mut DeviceConfig) {
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(brute_force) = self.brute_force {
            config.brute_force = brute_force;
        }
        if let Some(manual_voltage) = self.manual_voltage {
            config.manual_voltage = manual_voltage;
        }
    }
}

pub const CONFIG_FILE: &str = "nct6687_config.toml";

pub fn parse_config(toml_str: &str) -> EcResult<ConfigFile> {
    toml::from_str(toml_str).map_err(|err| EcError::Config(err.to_string()))
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![];
    if let Ok(mut path) = std::env::current_exe() {
        path.pop();
        path.push(CONFIG_FILE);
        paths.push(path);
    }
    paths.push(CONFIG_FILE.into());
    paths
}

/// Load the configuration file
///
/// An explicit `path` must exist. Without one, the file is looked up next to
/// the executable and then in the working directory, and may be missing.
pub fn load_config(path: Option<&Path>) -> EcResult<Option<ConfigFile>> {
    let toml_str = if let Some(path) = path {
        std::fs::read_to_string(path)
            .map_err(|err| EcError::Config(format!("{}: {}", path.display(), err)))?
    } else if let Some(toml_str) = default_locations()
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
    {
        toml_str
    } else {
        debug!("No {} found", CONFIG_FILE);
        return Ok(None);
    };

    let decoded = parse_config(&toml_str)?;
    debug!("{:?}", decoded);
    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_changes_nothing() {
        let file = parse_config("").unwrap();
        let mut config = DeviceConfig::default();
        file.apply(&mut config);
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn overlay_values() {
        let file = parse_config("variant = \"alternate_a\"\nbrute_force = true\n").unwrap();
        let mut config = DeviceConfig {
            manual_voltage: true,
            ..Default::default()
        };
        file.apply(&mut config);
        assert_eq!(config.variant, BoardVariant::AlternateA);
        assert!(config.brute_force);
        assert!(config.manual_voltage);
        assert_eq!(config.kind, ChipKind::Nct6687);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            parse_config("fan_speed = 3"),
            Err(EcError::Config(_))
        ));
        assert!(parse_config("variant = \"b\"").is_err());
    }

    #[test]
    fn load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "manual_voltage = true").unwrap();
        let loaded = load_config(Some(file.path())).unwrap().unwrap();
        assert_eq!(loaded.manual_voltage, Some(true));
        assert_eq!(loaded.variant, None);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert!(matches!(
            load_config(Some(&path)),
            Err(EcError::Config(_))
        ));
    }
}
