use chrono::Timelike;
use tracing::debug;

use crate::{
    config::{ResolverConfig, TargetTemperatures},
    stats::{RandomSource, StatisticsEngine, HOURS_PER_DAY},
    store::NvStore,
    types::{Bias, Mode, Occupancy, TempC16, MAX_TARGET_C, MIN_TARGET_C},
};

pub trait WarmPredictor {
    fn should_warm_at_hour(&self, hour: u8, warm_c: u8) -> bool;
}

impl<S: NvStore, R: RandomSource> WarmPredictor for StatisticsEngine<S, R> {
    fn should_warm_at_hour(&self, hour: u8, warm_c: u8) -> bool {
        StatisticsEngine::should_warm_at_hour(self, hour, warm_c)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl WarmPredictor for NoHistory {
    fn should_warm_at_hour(&self, _hour: u8, _warm_c: u8) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub current: TempC16,
    /// Raw 10-bit ambient light level.
    pub ambient_light: u16,
    pub room_dark: bool,
    pub occupancy: Occupancy,
    /// Occupancy confidence for statistics, if the tracker reports one.
    pub occupancy_pc: Option<u8>,
    pub warm_scheduled_now: bool,
    pub has_schedule: bool,
    pub power_low: bool,
    pub hour: u8,
    pub minute: u8,
}

impl Environment {
    pub fn with_time<T: Timelike>(mut self, now: &T) -> Self {
        self.hour = now.hour() as u8;
        self.minute = now.minute() as u8;
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            current: TempC16::from_celsius(18),
            ambient_light: 0,
            room_dark: false,
            occupancy: Occupancy::LikelyOccupied,
            occupancy_pc: None,
            warm_scheduled_now: false,
            has_schedule: false,
            power_low: false,
            hour: 12,
            minute: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetTemperatureResolver {
    config: ResolverConfig,
}

impl TargetTemperatureResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn compute_target_temperature<P: WarmPredictor>(
        &self,
        mode: Mode,
        temps: &TargetTemperatures,
        env: &Environment,
        predictor: &P,
    ) -> u8 {
        let target = match mode {
            // Capped by WARM so switching FROST to WARM never lowers the target.
            Mode::Frost => self
                .frost_target(temps, env, predictor)
                .min(self.warm_target(temps, env, predictor)),
            mode if mode.is_bake() => temps
                .warm_c()
                .saturating_add(self.config.bake_uplift_c)
                .min(MAX_TARGET_C),
            Mode::Warm | Mode::Bake { .. } => self.warm_target(temps, env, predictor),
        };
        debug!("target {target}C in {} at {:02}:{:02}", mode.as_str(), env.hour, env.minute);
        target
    }

    fn warm_target<P: WarmPredictor>(
        &self,
        temps: &TargetTemperatures,
        env: &Environment,
        predictor: &P,
    ) -> u8 {
        let warm = temps.warm_c();
        let eco = temps.bias(&self.config) == Bias::Eco;
        let setback_allowed = env.room_dark
            && env.occupancy.is_likely_unoccupied()
            && (!env.warm_scheduled_now || eco);
        if !setback_allowed {
            return warm;
        }

        let setback = if predictor.should_warm_at_hour(env.hour, warm) {
            self.config.setback_small_c
        } else {
            self.config.setback_full_c
        };
        let target = warm.saturating_sub(setback).max(temps.frost_c());
        if self.config.predictive_prewarm {
            target
        } else {
            target.max(MIN_TARGET_C)
        }
    }

    fn frost_target<P: WarmPredictor>(
        &self,
        temps: &TargetTemperatures,
        env: &Environment,
        predictor: &P,
    ) -> u8 {
        let frost = temps.frost_c();
        let warm = temps.warm_c();
        // Never pre-heat an abandoned room.
        if !self.config.predictive_prewarm || !env.has_schedule || env.occupancy.is_long_vacant() {
            return frost;
        }
        if env.current >= TempC16::from_celsius(i16::from(warm)) {
            return frost;
        }

        let prewarm = warm.saturating_sub(self.config.setback_full_c).max(frost);
        if predictor.should_warm_at_hour(env.hour, warm) {
            return if env.room_dark && env.occupancy.is_likely_unoccupied() {
                prewarm
            } else {
                warm
            };
        }

        let next_hour = (env.hour % HOURS_PER_DAY + 1) % HOURS_PER_DAY;
        let current_c = env.current.whole_c();
        if predictor.should_warm_at_hour(next_hour, warm) && current_c <= i16::from(prewarm) {
            // Nudge up in the last half hour so the switch to WARM overshoots less.
            if env.minute >= 30 && current_c == i16::from(prewarm) {
                return prewarm.saturating_add(1).min(warm);
            }
            return prewarm;
        }

        frost
    }
}
