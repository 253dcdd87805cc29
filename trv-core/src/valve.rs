use tracing::debug;

use crate::{
    config::ValveConfig,
    types::{Bias, TempC16, ValveState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveInputs {
    pub current: TempC16,
    pub target_c: u8,
    pub bias: Bias,
    pub bake: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveOutcome {
    pub percent_open: u8,
    pub moved: bool,
    /// BAKE has done its job and should be dropped by the caller.
    pub cancel_bake: bool,
}

#[derive(Debug, Clone)]
pub struct ValvePositionController {
    config: ValveConfig,
}

impl ValvePositionController {
    pub fn new(config: ValveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValveConfig {
        &self.config
    }

    /// Runs one control tick, updating `state` in place.
    ///
    /// Under target the opening never falls, over target it never rises, and
    /// an open valve over target always closes by at least one point.
    pub fn compute_required_valve_percent(
        &self,
        state: &mut ValveState,
        inputs: &ValveInputs,
    ) -> ValveOutcome {
        let old = state.percent_open;
        let current_c = inputs.current.whole_c();
        let target_c = i16::from(inputs.target_c);

        let (new, cancel_bake) = if current_c < target_c {
            state.linger_ticks = 0;
            (self.open_further(old, target_c - current_c, inputs), false)
        } else if current_c > target_c {
            (self.close_further(state, inputs.bias), inputs.bake)
        } else {
            state.linger_ticks = 0;
            (self.track_proportional(old, inputs.current.fraction()), inputs.bake)
        };

        state.move_to(new);
        if state.moved {
            debug!(
                "valve {old}% -> {new}% (current {}/16C, target {}C)",
                inputs.current.raw(),
                inputs.target_c
            );
        }
        ValveOutcome {
            percent_open: state.percent_open,
            moved: state.moved,
            cancel_bake,
        }
    }

    fn open_further(&self, old: u8, degrees_under: i16, inputs: &ValveInputs) -> u8 {
        let cfg = &self.config;
        let slew = if cfg.glacial {
            cfg.min_slew_pc
        } else if inputs.bake {
            return 100;
        } else if degrees_under >= i16::from(cfg.well_under_target_c) {
            cfg.very_fast_slew_pc
        } else if inputs.bias == Bias::Comfort {
            cfg.fast_slew_pc
        } else {
            cfg.max_slew_pc
        };
        old.saturating_add(slew).min(100)
    }

    fn close_further(&self, state: &mut ValveState, bias: Bias) -> u8 {
        let cfg = &self.config;
        let old = state.percent_open;
        if old == 0 {
            state.linger_ticks = 0;
            return 0;
        }
        let eager = bias == Bias::Eco && !cfg.hub_mode;
        let very_fast = cfg.very_fast_slew_pc.max(1);

        let Some(threshold) = cfg.linger_threshold_pc() else {
            return if eager { 0 } else { old.saturating_sub(very_fast) };
        };

        if old <= threshold {
            if state.linger_ticks >= cfg.linger_max_ticks {
                state.linger_ticks = 0;
                return 0;
            }
            state.linger_ticks = state.linger_ticks.saturating_add(1);
            return old - 1;
        }

        state.linger_ticks = 0;
        let candidate = if eager {
            cfg.linger_floor_pc
        } else {
            old.saturating_sub(very_fast).max(threshold)
        };
        candidate.min(old - 1)
    }

    fn track_proportional(&self, old: u8, fraction: u8) -> u8 {
        let cfg = &self.config;
        let proportional = ((16 - fraction.min(15)) * 6).max(cfg.really_open_floor_pc);
        let error = old.abs_diff(proportional);
        if error <= cfg.hysteresis_pc.saturating_add(cfg.step_granularity_pc) {
            return old;
        }

        let slew = if cfg.glacial {
            cfg.min_slew_pc
        } else {
            cfg.max_slew_pc
        };
        let step = slew.min(error);
        if proportional > old {
            old + step
        } else {
            old - step
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn controller() -> ValvePositionController {
        ValvePositionController::new(ValveConfig::default())
    }

    fn inputs(current: TempC16, target_c: u8, bias: Bias) -> ValveInputs {
        ValveInputs {
            current,
            target_c,
            bias,
            bake: false,
        }
    }

    fn c(celsius: i16) -> TempC16 {
        TempC16::from_celsius(celsius)
    }

    #[test]
    fn opening_rate_follows_distance_and_bias() {
        let valve = controller();

        let mut state = ValveState::new(0);
        valve.compute_required_valve_percent(&mut state, &inputs(c(15), 21, Bias::Comfort));
        assert_eq!(state.percent_open, 20);

        let mut state = ValveState::new(0);
        valve.compute_required_valve_percent(&mut state, &inputs(c(20), 21, Bias::Comfort));
        assert_eq!(state.percent_open, 10);

        let mut state = ValveState::new(0);
        valve.compute_required_valve_percent(&mut state, &inputs(c(17), 18, Bias::Eco));
        assert_eq!(state.percent_open, 5);

        let mut state = ValveState::new(98);
        let outcome =
            valve.compute_required_valve_percent(&mut state, &inputs(c(15), 21, Bias::Comfort));
        assert_eq!(outcome.percent_open, 100);
        assert_eq!(state.cumulative_movement, 2);
    }

    #[test]
    fn bake_opens_fully_unless_glacial() {
        let bake = ValveInputs {
            bake: true,
            ..inputs(c(20), 23, Bias::Eco)
        };

        let mut state = ValveState::new(0);
        let outcome = controller().compute_required_valve_percent(&mut state, &bake);
        assert_eq!(
            outcome,
            ValveOutcome {
                percent_open: 100,
                moved: true,
                cancel_bake: false,
            }
        );

        let glacial = ValvePositionController::new(ValveConfig {
            glacial: true,
            ..ValveConfig::default()
        });
        let mut state = ValveState::new(0);
        glacial.compute_required_valve_percent(&mut state, &bake);
        assert_eq!(state.percent_open, 1);
    }

    #[test]
    fn eco_closes_eagerly_then_lingers() {
        let valve = controller();
        let hot = inputs(c(20), 18, Bias::Eco);
        let mut state = ValveState::new(50);

        let mut trace = Vec::new();
        for _ in 0..8 {
            valve.compute_required_valve_percent(&mut state, &hot);
            trace.push(state.percent_open);
        }
        assert_eq!(trace, vec![10, 9, 8, 7, 6, 5, 4, 0]);
        assert_eq!(state.linger_ticks, 0);
    }

    #[test]
    fn comfort_and_hub_close_at_very_fast_rate() {
        let hub = ValvePositionController::new(ValveConfig {
            hub_mode: true,
            ..ValveConfig::default()
        });
        for (valve, bias) in [(controller(), Bias::Comfort), (hub, Bias::Eco)] {
            let mut state = ValveState::new(50);
            let hot = inputs(c(25), 21, bias);
            let mut trace = Vec::new();
            for _ in 0..3 {
                valve.compute_required_valve_percent(&mut state, &hot);
                trace.push(state.percent_open);
            }
            assert_eq!(trace, vec![30, 10, 9]);
        }
    }

    #[test]
    fn without_linger_floor_closing_skips_band() {
        let valve = ValvePositionController::new(ValveConfig {
            linger_floor_pc: 0,
            ..ValveConfig::default()
        });

        let mut state = ValveState::new(50);
        valve.compute_required_valve_percent(&mut state, &inputs(c(20), 18, Bias::Eco));
        assert_eq!(state.percent_open, 0);

        let mut state = ValveState::new(15);
        valve.compute_required_valve_percent(&mut state, &inputs(c(22), 21, Bias::Comfort));
        assert_eq!(state.percent_open, 0);
    }

    #[test]
    fn over_target_cancels_bake() {
        let mut state = ValveState::new(100);
        let outcome = controller().compute_required_valve_percent(
            &mut state,
            &ValveInputs {
                bake: true,
                ..inputs(c(24), 23, Bias::Eco)
            },
        );
        assert!(outcome.cancel_bake);
        assert!(outcome.moved);
        assert!(outcome.percent_open < 100);
    }

    #[test]
    fn at_target_tracks_fraction_with_hysteresis() {
        let valve = controller();
        let half = inputs(TempC16(18 * 16 + 8), 18, Bias::Eco);

        let mut state = ValveState::new(0);
        valve.compute_required_valve_percent(&mut state, &half);
        assert_eq!(state.percent_open, 5);

        let mut state = ValveState::new(47);
        let outcome = valve.compute_required_valve_percent(&mut state, &half);
        assert!(!outcome.moved);
        assert_eq!(state.percent_open, 47);

        let mut state = ValveState::new(60);
        valve.compute_required_valve_percent(&mut state, &half);
        assert_eq!(state.percent_open, 55);
    }

    #[test]
    fn at_target_respects_really_open_floor() {
        let valve = controller();
        let nearly_over = inputs(TempC16(18 * 16 + 15), 18, Bias::Eco);
        let mut state = ValveState::new(30);
        for _ in 0..10 {
            valve.compute_required_valve_percent(&mut state, &nearly_over);
        }
        assert_eq!(state.percent_open, 10);
    }

    #[test]
    fn reaching_target_cancels_bake() {
        let mut state = ValveState::new(100);
        let outcome = controller().compute_required_valve_percent(
            &mut state,
            &ValveInputs {
                bake: true,
                ..inputs(c(23), 23, Bias::Eco)
            },
        );
        assert!(outcome.cancel_bake);
    }
}
