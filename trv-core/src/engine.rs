use tracing::{debug, info, warn};

use crate::{
    config::{TargetTemperatures, TrvConfig},
    error::{ConfigError, FrameError},
    frame::{encode_stats_frame, StatsFrame, TempAndPower},
    stats::{RandomSource, StatisticsEngine, StatsSample},
    store::NvStore,
    target::{Environment, TargetTemperatureResolver},
    types::{Bias, Mode, ModeState, TempC16, ValveState},
    valve::{ValveInputs, ValveOutcome, ValvePositionController},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub mode: ModeState,
    pub targets: TargetTemperatures,
    pub valve: ValveState,
    pub target_c: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub target_c: u8,
    pub percent_open: u8,
    pub moved: bool,
    pub bake_cancelled: bool,
    pub bake_expired: bool,
    /// The outgoing status frame is stale and should be rebuilt.
    pub status_changed: bool,
}

pub struct TrvEngine<S, R> {
    config: TrvConfig,
    state: ControllerState,
    resolver: TargetTemperatureResolver,
    valve: ValvePositionController,
    stats: StatisticsEngine<S, R>,
    last_reported: Option<StatsFrame>,
}

impl<S: NvStore, R: RandomSource> TrvEngine<S, R> {
    pub fn new(mut config: TrvConfig, store: S, random: R) -> Result<Self, ConfigError> {
        config.sanitize();
        let stats = StatisticsEngine::new(store, random, config.stats.clone())?;
        let targets = config.targets;
        Ok(Self {
            resolver: TargetTemperatureResolver::new(config.resolver.clone()),
            valve: ValvePositionController::new(config.valve.clone()),
            stats,
            state: ControllerState {
                mode: ModeState::default(),
                targets,
                valve: ValveState::default(),
                target_c: targets.frost_c(),
            },
            config,
            last_reported: None,
        })
    }

    pub fn config(&self) -> &TrvConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn stats(&self) -> &StatisticsEngine<S, R> {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatisticsEngine<S, R> {
        &mut self.stats
    }

    pub fn mode(&self) -> Mode {
        self.state.mode.debounced()
    }

    pub fn bias(&self) -> Bias {
        self.state.targets.bias(&self.config.resolver)
    }

    pub fn request_mode(&mut self, mode: Mode) {
        self.state.mode.request(mode);
    }

    pub fn settle_mode(&mut self) -> bool {
        let changed = self.state.mode.settle();
        if changed {
            info!("mode now {}", self.mode().as_str());
        }
        changed
    }

    pub fn start_bake(&mut self) {
        let minutes_left = self.config.resolver.bake_duration_m;
        self.state.mode.request(Mode::Bake { minutes_left });
        self.state.mode.settle();
        info!("BAKE started for {minutes_left} minutes");
    }

    pub fn set_frost_c(&mut self, value: u8) -> Result<bool, ConfigError> {
        self.state.targets.set_frost_c(value).inspect_err(|err| {
            warn!("rejecting FROST target: {err}");
        })
    }

    pub fn set_warm_c(&mut self, value: u8) -> Result<bool, ConfigError> {
        self.state.targets.set_warm_c(value).inspect_err(|err| {
            warn!("rejecting WARM target: {err}");
        })
    }

    pub fn compute_target_temperature(&mut self, env: &Environment) -> u8 {
        let target = self.resolver.compute_target_temperature(
            self.state.mode.debounced(),
            &self.state.targets,
            env,
            &self.stats,
        );
        if target != self.state.target_c {
            debug!("target {} -> {target}C", self.state.target_c);
        }
        self.state.target_c = target;
        target
    }

    /// Moves the valve toward the last computed target.
    ///
    /// `cancel_bake` in the outcome is set only if BAKE was actually dropped.
    pub fn compute_required_valve_percent(&mut self, current: TempC16) -> ValveOutcome {
        let inputs = ValveInputs {
            current,
            target_c: self.state.target_c,
            bias: self.bias(),
            bake: self.state.mode.debounced().is_bake(),
        };
        let mut outcome = self
            .valve
            .compute_required_valve_percent(&mut self.state.valve, &inputs);
        outcome.cancel_bake = outcome.cancel_bake && self.state.mode.cancel_bake();
        if outcome.cancel_bake {
            info!("BAKE cancelled at {}/16C", current.raw());
        }
        outcome
    }

    pub fn sample_stats(&mut self, full_sample: bool, env: &Environment) -> bool {
        let sample = StatsSample {
            temp: env.current,
            ambient_light: env.ambient_light,
            warm_mode: self.state.mode.debounced().is_warm(),
            occupancy_pc: env.occupancy_pc,
        };
        self.stats.sample_stats(full_sample, env.hour, &sample)
    }

    pub fn should_warm_at_hour(&self, hour: u8) -> bool {
        self.stats
            .should_warm_at_hour(hour, self.state.targets.warm_c())
    }

    pub fn zap_stats(&mut self, max_bytes: usize) -> bool {
        self.stats.zap_stats(max_bytes)
    }

    pub fn tick_minute(&mut self, env: &Environment) -> TickReport {
        let target_c = self.compute_target_temperature(env);
        let valve = self.compute_required_valve_percent(env.current);
        let bake_expired = self.state.mode.tick_minute();
        if bake_expired {
            info!("BAKE expired");
        }

        let status_changed = valve.moved || self.last_reported != Some(self.status_frame(env));
        TickReport {
            target_c,
            percent_open: valve.percent_open,
            moved: valve.moved,
            bake_cancelled: valve.cancel_bake,
            bake_expired,
            status_changed,
        }
    }

    /// Encodes the current status into `buf`, returning the terminator offset.
    pub fn build_status_frame(
        &mut self,
        env: &Environment,
        buf: &mut [u8],
    ) -> Result<usize, FrameError> {
        let frame = self.status_frame(env);
        let end = encode_stats_frame(&frame, buf, self.config.tx_security, false)?;
        self.last_reported = Some(frame);
        Ok(end)
    }

    fn status_frame(&self, env: &Environment) -> StatsFrame {
        // 0x00 and 0xFF are not sendable as light levels.
        let light = (env.ambient_light >> 2).clamp(1, 254) as u8;
        StatsFrame {
            id: self.config.node_id,
            temp_and_power: Some(TempAndPower {
                temp: env.current,
                power_low: env.power_low,
            }),
            ambient_light: Some(light),
            occupancy: env.occupancy.into(),
        }
    }
}
