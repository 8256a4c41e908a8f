//! Mapping of fan channels to EC registers, depending on the board design

use serde::Deserialize;

use crate::ec::registers::*;

/// Fans with this index and above are system fans (CPU and pump come first)
pub const FIRST_SYSTEM_FAN: usize = 2;

const FAN_LABELS: [&str; NUM_REG_FAN] = [
    "CPU Fan",
    "Pump Fan",
    "System Fan #1",
    "System Fan #2",
    "System Fan #3",
    "System Fan #4",
    "System Fan #5",
    "System Fan #6",
];

/// Register layout variant of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardVariant {
    #[default]
    Default,
    /// Newer MSI boards, system fans live in a different register block
    AlternateA,
}

/// Which chip of the family was found. Decides the code that completes a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipKind {
    #[default]
    Nct6687,
    /// Older firmware, completes the handshake with all bits cleared
    Nct6686,
}

impl ChipKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChipKind::Nct6687 => "NCT6687D",
            ChipKind::Nct6686 => "NCT6686D",
        }
    }
}

/// Registers belonging to one fan channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanChannel {
    pub rpm: u16,
    pub pwm_read: u16,
    pub pwm_write: u16,
    pub label: &'static str,
}

/// Registers of all fan channels for one [`BoardVariant`]
///
/// Callers look up a channel once per operation and keep using that copy,
/// even if the device switches variants in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanChannelMap {
    variant: BoardVariant,
    channels: [FanChannel; NUM_REG_FAN],
}

impl FanChannelMap {
    pub fn new(variant: BoardVariant) -> Self {
        let channels = core::array::from_fn(|i| {
            let label = FAN_LABELS[i];
            match variant {
                BoardVariant::AlternateA if i >= FIRST_SYSTEM_FAN => FanChannel {
                    rpm: reg_fan_rpm_alt(i - FIRST_SYSTEM_FAN),
                    pwm_read: reg_pwm_alt(i - FIRST_SYSTEM_FAN),
                    pwm_write: reg_pwm_write_alt(i - FIRST_SYSTEM_FAN),
                    label,
                },
                _ => FanChannel {
                    rpm: reg_fan_rpm(i),
                    pwm_read: reg_pwm(i),
                    pwm_write: reg_pwm_write(i),
                    label,
                },
            }
        });
        FanChannelMap { variant, channels }
    }

    /// Replace the active layout
    pub fn select(&mut self, variant: BoardVariant) {
        *self = Self::new(variant);
    }

    pub fn variant(&self) -> BoardVariant {
        self.variant
    }

    pub fn channel(&self, index: usize) -> Option<FanChannel> {
        self.channels.get(index).copied()
    }

    pub fn channels(&self) -> &[FanChannel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for FanChannelMap {
    fn default() -> Self {
        Self::new(BoardVariant::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_is_linear() {
        let map = FanChannelMap::default();
        assert_eq!(map.len(), 8);
        let fan3 = map.channel(3).unwrap();
        assert_eq!(fan3.rpm, 0x146);
        assert_eq!(fan3.pwm_read, 0x163);
        assert_eq!(fan3.pwm_write, 0xA2B);
        assert_eq!(fan3.label, "System Fan #2");
    }

    #[test]
    fn alternate_map_moves_only_system_fans() {
        let map = FanChannelMap::new(BoardVariant::AlternateA);
        let default = FanChannelMap::default();
        assert_eq!(map.channel(0), default.channel(0));
        assert_eq!(map.channel(1), default.channel(1));

        let sys1 = map.channel(FIRST_SYSTEM_FAN).unwrap();
        assert_eq!(sys1.rpm, 0x150);
        assert_eq!(sys1.pwm_read, 0x168);
        assert_eq!(sys1.pwm_write, 0xC70);
        let sys6 = map.channel(7).unwrap();
        assert_eq!(sys6.pwm_write, 0xCC0);
    }

    #[test]
    fn select_replaces_map() {
        let mut map = FanChannelMap::default();
        map.select(BoardVariant::AlternateA);
        assert_eq!(map.variant(), BoardVariant::AlternateA);
        assert_eq!(map.channel(2).unwrap().rpm, 0x150);
        map.select(BoardVariant::Default);
        assert_eq!(map.channel(2).unwrap().rpm, 0x144);
    }

    #[test]
    fn unknown_channel() {
        assert!(FanChannelMap::default().channel(8).is_none());
    }

    #[test]
    fn variant_names_in_config_files() {
        #[derive(Deserialize)]
        struct Wrapper {
            variant: BoardVariant,
        }
        let w: Wrapper = toml::from_str("variant = \"alternate_a\"").unwrap();
        assert_eq!(w.variant, BoardVariant::AlternateA);
    }
}
