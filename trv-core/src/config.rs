use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::ConfigError,
    types::{Bias, MAX_TARGET_C, MIN_TARGET_C},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Pre-warm in FROST and soften setbacks using learned occupancy history.
    pub predictive_prewarm: bool,
    pub bake_uplift_c: u8,
    pub bake_duration_m: u8,
    /// Setback applied when occupancy is expected within the hour.
    pub setback_small_c: u8,
    pub setback_full_c: u8,
    /// Reference WARM temperatures at the energy-saving and comfort ends.
    pub eco_warm_c: u8,
    pub comfort_warm_c: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            predictive_prewarm: true,
            bake_uplift_c: 5,
            bake_duration_m: 30,
            setback_small_c: 1,
            setback_full_c: 3,
            eco_warm_c: 17,
            comfort_warm_c: 21,
        }
    }
}

impl ResolverConfig {
    pub fn sanitize(&mut self) {
        self.bake_uplift_c = self.bake_uplift_c.clamp(1, 10);
        self.bake_duration_m = self.bake_duration_m.clamp(1, 120);
        self.setback_full_c = self.setback_full_c.clamp(1, 10);
        self.setback_small_c = self.setback_small_c.min(self.setback_full_c);
        self.eco_warm_c = self.eco_warm_c.clamp(MIN_TARGET_C, MAX_TARGET_C);
        self.comfort_warm_c = self.comfort_warm_c.clamp(self.eco_warm_c, MAX_TARGET_C);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValveConfig {
    /// Low-flow installations: always open at `min_slew_pc` per tick.
    pub glacial: bool,
    /// The node also acts as boiler hub, so eager Eco closing is skipped.
    pub hub_mode: bool,
    pub min_slew_pc: u8,
    pub max_slew_pc: u8,
    pub fast_slew_pc: u8,
    pub very_fast_slew_pc: u8,
    /// Degrees under target at which opening uses the very fast rate.
    pub well_under_target_c: u8,
    /// Lowest opening that reliably passes water.
    pub really_open_floor_pc: u8,
    /// Zero disables lingering.
    pub linger_floor_pc: u8,
    pub linger_max_ticks: u8,
    pub hysteresis_pc: u8,
    pub step_granularity_pc: u8,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            glacial: false,
            hub_mode: false,
            min_slew_pc: 1,
            max_slew_pc: 5,
            fast_slew_pc: 10,
            very_fast_slew_pc: 20,
            well_under_target_c: 2,
            really_open_floor_pc: 10,
            linger_floor_pc: 10,
            linger_max_ticks: 5,
            hysteresis_pc: 2,
            step_granularity_pc: 1,
        }
    }
}

impl ValveConfig {
    pub fn sanitize(&mut self) {
        self.min_slew_pc = self.min_slew_pc.clamp(1, 100);
        self.max_slew_pc = self.max_slew_pc.clamp(self.min_slew_pc, 100);
        self.fast_slew_pc = self.fast_slew_pc.clamp(self.max_slew_pc, 100);
        self.very_fast_slew_pc = self.very_fast_slew_pc.clamp(self.fast_slew_pc, 100);
        self.well_under_target_c = self.well_under_target_c.max(1);
        self.really_open_floor_pc = self.really_open_floor_pc.min(50);
        self.linger_floor_pc = self.linger_floor_pc.min(50);
        self.hysteresis_pc = self.hysteresis_pc.min(20);
        self.step_granularity_pc = self.step_granularity_pc.clamp(1, 10);
    }

    /// Opening below which the valve closes one point per tick.
    pub fn linger_threshold_pc(&self) -> Option<u8> {
        self.linger_floor_pc.checked_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub base_addr: u16,
    /// Mid-band with 1/8 °C resolution in compressed temperatures.
    pub compand_low_c: u8,
    pub compand_high_c: u8,
    /// Hourly samples that must exceed a value for it to count as bottom quartile.
    pub bottom_quartile_min_above: u8,
    pub smoothing_shift: u8,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            base_addr: 0,
            compand_low_c: 16,
            compand_high_c: 24,
            bottom_quartile_min_above: 18,
            smoothing_shift: 3,
        }
    }
}

impl StatsConfig {
    pub fn sanitize(&mut self) {
        self.bottom_quartile_min_above = self.bottom_quartile_min_above.clamp(12, 23);
        self.smoothing_shift = self.smoothing_shift.clamp(1, 6);
    }
}

/// How much a node may say about the room over an unsecured channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxSecurityLevel {
    /// Everything, including occupancy, may be sent in the clear.
    AlwaysAll,
    #[default]
    MostUnsecured,
    SecureOnly,
    Never,
}

impl TxSecurityLevel {
    pub fn permits_occupancy(self, secure_channel: bool) -> bool {
        secure_channel || self == Self::AlwaysAll
    }
}

/// User-settable FROST and WARM references; FROST never exceeds WARM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTemperatures {
    frost_c: u8,
    warm_c: u8,
}

impl Default for TargetTemperatures {
    fn default() -> Self {
        Self {
            frost_c: 6,
            warm_c: 18,
        }
    }
}

impl TargetTemperatures {
    pub fn new(frost_c: u8, warm_c: u8) -> Result<Self, ConfigError> {
        check_target(frost_c)?;
        check_target(warm_c)?;
        Ok(Self {
            frost_c: frost_c.min(warm_c),
            warm_c,
        })
    }

    pub fn frost_c(&self) -> u8 {
        self.frost_c
    }

    pub fn warm_c(&self) -> u8 {
        self.warm_c
    }

    /// Sets FROST, lowering it to WARM if it would otherwise exceed it.
    pub fn set_frost_c(&mut self, value: u8) -> Result<bool, ConfigError> {
        check_target(value)?;
        let value = value.min(self.warm_c);
        let changed = self.frost_c != value;
        self.frost_c = value;
        Ok(changed)
    }

    /// Sets WARM, raising it to FROST if it would otherwise fall below it.
    pub fn set_warm_c(&mut self, value: u8) -> Result<bool, ConfigError> {
        check_target(value)?;
        let value = value.max(self.frost_c);
        let changed = self.warm_c != value;
        self.warm_c = value;
        Ok(changed)
    }

    pub fn bias(&self, resolver: &ResolverConfig) -> Bias {
        let midpoint = (u16::from(resolver.eco_warm_c) + u16::from(resolver.comfort_warm_c) + 1) / 2;
        if u16::from(self.warm_c) < midpoint {
            Bias::Eco
        } else {
            Bias::Comfort
        }
    }

    pub fn sanitize(&mut self) {
        self.warm_c = self.warm_c.clamp(MIN_TARGET_C, MAX_TARGET_C);
        self.frost_c = self.frost_c.clamp(MIN_TARGET_C, self.warm_c);
    }
}

fn check_target(value: u8) -> Result<(), ConfigError> {
    if (MIN_TARGET_C..=MAX_TARGET_C).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::TargetOutOfRange {
            value,
            min: MIN_TARGET_C,
            max: MAX_TARGET_C,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrvConfig {
    pub resolver: ResolverConfig,
    pub valve: ValveConfig,
    pub stats: StatsConfig,
    pub targets: TargetTemperatures,
    pub tx_security: TxSecurityLevel,
    /// Two-byte node ID carried in status frames; both bytes share bit 7.
    pub node_id: Option<[u8; 2]>,
}

impl TrvConfig {
    pub fn sanitize(&mut self) {
        self.resolver.sanitize();
        self.valve.sanitize();
        self.stats.sanitize();
        self.targets.sanitize();
        if let Some([id0, id1]) = self.node_id {
            if id0 == 0xff || id1 == 0xff || (id0 ^ id1) & 0x80 != 0 {
                warn!("dropping unsendable node ID {id0:02x}{id1:02x}");
                self.node_id = None;
            }
        }
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_slice(bytes).map_err(|err| {
            warn!("rejecting TRV config: {err}");
            ConfigError::Parse(err.to_string())
        })?;
        config.sanitize();
        Ok(config)
    }
}
