// Each StatSet is a 24-byte row (one byte per local hour), rows back to back
// from `StatsConfig::base_addr`. Erased bytes surface as `None`.

use rand_core::RngCore;
use tracing::{debug, info, warn};

use crate::{
    compand::Compander,
    config::StatsConfig,
    error::ConfigError,
    store::{NvStore, ERASED},
    types::TempC16,
};

pub const HOURS_PER_DAY: u8 = 24;

/// Seven days of WARM usage, newest day in bit 6.
const WARM_HISTORY_MASK: u8 = 0x7f;
const WARM_NEWEST_BIT: u8 = 0x40;
/// Yesterday, the day before, and the same day last week.
const WARM_RECENT_DAYS_MASK: u8 = 0x61;

/// Highest stored ambient-light code; keeps clear of the erased sentinel.
const MAX_LIGHT_CODE: u8 = 0xfe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatSet {
    TempLast,
    TempSmoothed,
    AmbLightLast,
    AmbLightSmoothed,
    OccupancyLast,
    OccupancySmoothed,
    WarmModeByHour,
}

impl StatSet {
    pub const ALL: [StatSet; 7] = [
        Self::TempLast,
        Self::TempSmoothed,
        Self::AmbLightLast,
        Self::AmbLightSmoothed,
        Self::OccupancyLast,
        Self::OccupancySmoothed,
        Self::WarmModeByHour,
    ];

    fn row(self) -> usize {
        match self {
            Self::TempLast => 0,
            Self::TempSmoothed => 1,
            Self::AmbLightLast => 2,
            Self::AmbLightSmoothed => 3,
            Self::OccupancyLast => 4,
            Self::OccupancySmoothed => 5,
            Self::WarmModeByHour => 6,
        }
    }
}

pub const STATS_REGION_BYTES: usize = StatSet::ALL.len() * HOURS_PER_DAY as usize;

/// Source of uniformly distributed bytes for stochastic rounding.
pub trait RandomSource {
    fn random_byte(&mut self) -> u8;
}

#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: RngCore> RandomSource for RngSource<R> {
    fn random_byte(&mut self) -> u8 {
        (self.0.next_u32() & 0xff) as u8
    }
}

/// Exponential smoothing with stochastic rounding.
///
/// Computes `(old * (2^shift - 1) + new + r) / 2^shift` with `r` the low
/// `shift` bits of `random`. The result always lies between `old` and `new`.
pub fn smooth_stats_value(old: u8, new: u8, shift: u8, random: u8) -> u8 {
    let shift = shift.clamp(1, 7);
    let r = u16::from(random) & ((1 << shift) - 1);
    let old = u16::from(old);
    let sum = (old << shift) - old + u16::from(new) + r;
    (sum >> shift) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSample {
    pub temp: TempC16,
    /// Raw 10-bit ambient light level.
    pub ambient_light: u16,
    /// Debounced mode was WARM (or BAKE) at the time of the sample.
    pub warm_mode: bool,
    pub occupancy_pc: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: u16,
    temp_sum: i32,
    light_sum: u32,
    occupancy_sum: u32,
    occupancy_count: u16,
    warm_votes: i16,
}

impl Accumulator {
    fn add(&mut self, sample: &StatsSample) {
        self.count = self.count.saturating_add(1);
        self.temp_sum += i32::from(sample.temp.raw());
        self.light_sum += u32::from(sample.ambient_light);
        if let Some(pc) = sample.occupancy_pc {
            self.occupancy_sum += u32::from(pc.min(100));
            self.occupancy_count = self.occupancy_count.saturating_add(1);
        }
        self.warm_votes = if sample.warm_mode {
            self.warm_votes.saturating_add(1)
        } else {
            self.warm_votes.saturating_sub(1)
        };
    }
}

fn rounded_mean(sum: i64, count: u16) -> i64 {
    let count = i64::from(count.max(1));
    (sum + count / 2).div_euclid(count)
}

pub struct StatisticsEngine<S, R> {
    store: S,
    random: R,
    config: StatsConfig,
    compander: Compander,
    acc: Accumulator,
}

impl<S: NvStore, R> StatisticsEngine<S, R> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn compander(&self) -> &Compander {
        &self.compander
    }

    fn addr(&self, set: StatSet, hour: u8) -> usize {
        usize::from(self.config.base_addr)
            + set.row() * usize::from(HOURS_PER_DAY)
            + usize::from(hour)
    }

    pub fn get_by_hour_stat(&self, hour: u8, set: StatSet) -> Option<u8> {
        if hour >= HOURS_PER_DAY {
            return None;
        }
        match self.store.read_byte(self.addr(set, hour)) {
            ERASED => None,
            value => Some(value),
        }
    }

    pub fn get_by_hour_temp(&self, hour: u8, set: StatSet) -> Option<TempC16> {
        if !matches!(set, StatSet::TempLast | StatSet::TempSmoothed) {
            return None;
        }
        self.get_by_hour_stat(hour, set)
            .and_then(|code| self.compander.expand_temp_c16(code))
    }

    pub fn min_by_hour_stat(&self, set: StatSet) -> Option<u8> {
        (0..HOURS_PER_DAY)
            .filter_map(|hour| self.get_by_hour_stat(hour, set))
            .min()
    }

    pub fn max_by_hour_stat(&self, set: StatSet) -> Option<u8> {
        (0..HOURS_PER_DAY)
            .filter_map(|hour| self.get_by_hour_stat(hour, set))
            .max()
    }

    /// True if `sample` sits in the lowest quarter of the 24 hourly values.
    ///
    /// Gives up (false) if any hour of the set is still unset.
    pub fn in_bottom_quartile(&self, set: StatSet, sample: u8) -> bool {
        let mut above = 0u8;
        for hour in 0..HOURS_PER_DAY {
            match self.get_by_hour_stat(hour, set) {
                None => return false,
                Some(value) if value > sample => above += 1,
                Some(_) => {}
            }
        }
        above >= self.config.bottom_quartile_min_above
    }

    pub fn should_warm_at_hour(&self, hour: u8, warm_c: u8) -> bool {
        if hour >= HOURS_PER_DAY {
            return false;
        }

        // Habitually dark hours are treated as asleep or away.
        if let Some(light) = self.get_by_hour_stat(hour, StatSet::AmbLightSmoothed) {
            if self.in_bottom_quartile(StatSet::AmbLightSmoothed, light) {
                return false;
            }
        }

        if let Some(history) = self.get_by_hour_stat(hour, StatSet::WarmModeByHour) {
            if history & WARM_HISTORY_MASK == 0 {
                return false;
            }
            if (history & WARM_RECENT_DAYS_MASK).count_ones() >= 2 {
                return true;
            }
        }

        self.get_by_hour_temp(hour, StatSet::TempSmoothed)
            .is_some_and(|temp| temp.rounded_c() >= i16::from(warm_c))
    }

    /// Erases up to `max_bytes` cells of the statistics region.
    ///
    /// Cells already erased cost nothing, so repeated calls make progress.
    /// Returns true once the whole region reads back erased.
    pub fn zap_stats(&mut self, max_bytes: usize) -> bool {
        let start = usize::from(self.config.base_addr);
        let mut budget = max_bytes;
        for addr in start..start + STATS_REGION_BYTES {
            if self.store.read_byte(addr) == ERASED {
                continue;
            }
            if budget == 0 {
                debug!("stats zap paused at address {addr}");
                return false;
            }
            self.store.smart_erase(addr);
            budget -= 1;
        }
        self.acc = Accumulator::default();
        info!("stats region erased");
        true
    }
}

impl<S: NvStore, R: RandomSource> StatisticsEngine<S, R> {
    pub fn new(store: S, random: R, config: StatsConfig) -> Result<Self, ConfigError> {
        let compander = Compander::new(config.compand_low_c, config.compand_high_c)?;
        Ok(Self {
            store,
            random,
            config,
            compander,
            acc: Accumulator::default(),
        })
    }

    /// Adds a reading; on `full_sample` commits the period's means for `hour`.
    ///
    /// Returns true if anything was committed.
    pub fn sample_stats(&mut self, full_sample: bool, hour: u8, sample: &StatsSample) -> bool {
        self.acc.add(sample);
        if !full_sample {
            return false;
        }

        let acc = std::mem::take(&mut self.acc);
        if hour >= HOURS_PER_DAY {
            warn!("discarding stats for invalid hour {hour}");
            return false;
        }

        let temp_mean = rounded_mean(i64::from(acc.temp_sum), acc.count);
        let temp_mean = TempC16(temp_mean.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16);
        let temp_code = self.compander.compress_temp_c16(temp_mean);
        self.commit_pair(hour, StatSet::TempLast, StatSet::TempSmoothed, temp_code);

        let light_mean = rounded_mean(i64::from(acc.light_sum), acc.count);
        let light_code = (light_mean >> 2).clamp(0, i64::from(MAX_LIGHT_CODE)) as u8;
        self.commit_pair(hour, StatSet::AmbLightLast, StatSet::AmbLightSmoothed, light_code);

        if acc.occupancy_count > 0 {
            let occupancy = rounded_mean(i64::from(acc.occupancy_sum), acc.occupancy_count);
            self.commit_pair(
                hour,
                StatSet::OccupancyLast,
                StatSet::OccupancySmoothed,
                occupancy.clamp(0, 100) as u8,
            );
        }

        self.push_warm_history(hour, acc.warm_votes > 0);

        info!(
            "hourly stats committed for hour {hour}: temp {:?}, light {light_code}, warm votes {}",
            temp_mean, acc.warm_votes
        );
        true
    }

    fn commit_pair(&mut self, hour: u8, last: StatSet, smoothed: StatSet, value: u8) {
        let last_addr = self.addr(last, hour);
        self.store.smart_update(last_addr, value);

        let smoothed_addr = self.addr(smoothed, hour);
        let next = match self.store.read_byte(smoothed_addr) {
            ERASED => value,
            old => smooth_stats_value(
                old,
                value,
                self.config.smoothing_shift,
                self.random.random_byte(),
            ),
        };
        self.store.smart_update(smoothed_addr, next);
    }

    fn push_warm_history(&mut self, hour: u8, warm: bool) {
        let addr = self.addr(StatSet::WarmModeByHour, hour);
        let newest = if warm { WARM_NEWEST_BIT } else { 0 };
        let next = match self.store.read_byte(addr) {
            // First use: assume every tracked day looked like today.
            ERASED => {
                if warm {
                    WARM_HISTORY_MASK
                } else {
                    0
                }
            }
            old => ((old & WARM_HISTORY_MASK) >> 1) | newest,
        };

        let old = self.store.read_byte(addr);
        if next & !old == 0 {
            self.store.smart_clear_bits(addr, next);
        } else {
            self.store.smart_update(addr, next);
        }
    }
}
