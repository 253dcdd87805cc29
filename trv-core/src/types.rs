use serde::{Deserialize, Serialize};

pub const MIN_TARGET_C: u8 = 5;
pub const MAX_TARGET_C: u8 = 95;

pub const VALVE_MOVEMENT_WRAP: u16 = 8192;

/// Signed fixed-point temperature in 1/16 °C units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempC16(pub i16);

impl TempC16 {
    pub const fn from_celsius(celsius: i16) -> Self {
        Self(celsius << 4)
    }

    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Whole degrees, rounded towards negative infinity.
    pub const fn whole_c(self) -> i16 {
        self.0 >> 4
    }

    /// Sixteenths above [`Self::whole_c`], in `0..=15`.
    pub const fn fraction(self) -> u8 {
        (self.0 & 0xf) as u8
    }

    /// Nearest whole degree, halves rounding up.
    pub const fn rounded_c(self) -> i16 {
        (self.0.saturating_add(8)) >> 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Frost,
    Warm,
    Bake { minutes_left: u8 },
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frost => "FROST",
            Self::Warm => "WARM",
            Self::Bake { .. } => "BAKE",
        }
    }

    pub fn is_warm(self) -> bool {
        !matches!(self, Self::Frost)
    }

    pub fn is_bake(self) -> bool {
        matches!(self, Self::Bake { minutes_left } if minutes_left > 0)
    }
}

/// Only the committed ("debounced") mode drives heating decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    committed: Mode,
    pending: Option<Mode>,
}

impl ModeState {
    pub fn new(mode: Mode) -> Self {
        Self {
            committed: normalize(mode),
            pending: None,
        }
    }

    pub fn debounced(&self) -> Mode {
        self.committed
    }

    pub fn pending(&self) -> Option<Mode> {
        self.pending
    }

    pub fn bake_minutes_left(&self) -> u8 {
        match self.committed {
            Mode::Bake { minutes_left } => minutes_left,
            _ => 0,
        }
    }

    pub fn request(&mut self, mode: Mode) {
        self.pending = Some(normalize(mode));
    }

    /// Commits the pending request, returning true if the committed mode changed.
    pub fn settle(&mut self) -> bool {
        let Some(mode) = self.pending.take() else {
            return false;
        };
        let changed = self.committed != mode;
        self.committed = mode;
        changed
    }

    pub fn cancel_bake(&mut self) -> bool {
        if let Mode::Bake { .. } = self.committed {
            self.committed = Mode::Warm;
            true
        } else {
            false
        }
    }

    /// Counts BAKE down by a minute; returns true when it expired on this call.
    pub fn tick_minute(&mut self) -> bool {
        match self.committed {
            Mode::Bake { minutes_left } if minutes_left > 1 => {
                self.committed = Mode::Bake {
                    minutes_left: minutes_left - 1,
                };
                false
            }
            Mode::Bake { .. } => {
                self.committed = Mode::Warm;
                true
            }
            _ => false,
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(Mode::Frost)
    }
}

fn normalize(mode: Mode) -> Mode {
    match mode {
        Mode::Bake { minutes_left: 0 } => Mode::Warm,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Eco,
    Comfort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Occupancy {
    /// Activity detected within the last few minutes.
    RecentlyOccupied,
    LikelyOccupied,
    Vacant,
    LongVacant,
}

impl Occupancy {
    pub fn is_likely_occupied(self) -> bool {
        matches!(self, Self::RecentlyOccupied | Self::LikelyOccupied)
    }

    pub fn is_likely_unoccupied(self) -> bool {
        !self.is_likely_occupied()
    }

    pub fn is_long_vacant(self) -> bool {
        matches!(self, Self::LongVacant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValveState {
    pub percent_open: u8,
    pub moved: bool,
    /// Total travel in percentage points, modulo [`VALVE_MOVEMENT_WRAP`].
    pub cumulative_movement: u16,
    /// Consecutive ticks spent closing inside the linger band.
    pub linger_ticks: u8,
}

impl ValveState {
    pub fn new(percent_open: u8) -> Self {
        Self {
            percent_open: percent_open.min(100),
            ..Self::default()
        }
    }

    pub(crate) fn move_to(&mut self, percent_open: u8) {
        let percent_open = percent_open.min(100);
        let delta = u16::from(self.percent_open.abs_diff(percent_open));
        self.moved = delta != 0;
        self.cumulative_movement =
            (self.cumulative_movement % VALVE_MOVEMENT_WRAP + delta) % VALVE_MOVEMENT_WRAP;
        self.percent_open = percent_open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_c16_splits_whole_and_fraction() {
        let t = TempC16::from_celsius(19);
        assert_eq!(t.whole_c(), 19);
        assert_eq!(t.fraction(), 0);

        let t = TempC16(19 * 16 + 9);
        assert_eq!(t.whole_c(), 19);
        assert_eq!(t.fraction(), 9);
        assert_eq!(t.rounded_c(), 20);

        let t = TempC16(-1);
        assert_eq!(t.whole_c(), -1);
        assert_eq!(t.fraction(), 15);
    }

    #[test]
    fn request_only_takes_effect_after_settle() {
        let mut mode = ModeState::new(Mode::Frost);
        mode.request(Mode::Warm);
        assert_eq!(mode.debounced(), Mode::Frost);

        assert!(mode.settle());
        assert_eq!(mode.debounced(), Mode::Warm);
        assert!(!mode.settle());
    }

    #[test]
    fn frost_clears_bake() {
        let mut mode = ModeState::new(Mode::Bake { minutes_left: 30 });
        assert_eq!(mode.bake_minutes_left(), 30);

        mode.request(Mode::Frost);
        mode.settle();

        assert_eq!(mode.debounced(), Mode::Frost);
        assert_eq!(mode.bake_minutes_left(), 0);
    }

    #[test]
    fn bake_counts_down_to_warm() {
        let mut mode = ModeState::new(Mode::Bake { minutes_left: 2 });
        assert!(!mode.tick_minute());
        assert_eq!(mode.debounced(), Mode::Bake { minutes_left: 1 });
        assert!(mode.tick_minute());
        assert_eq!(mode.debounced(), Mode::Warm);
        assert!(!mode.tick_minute());
    }

    #[test]
    fn zero_length_bake_is_plain_warm() {
        let mode = ModeState::new(Mode::Bake { minutes_left: 0 });
        assert_eq!(mode.debounced(), Mode::Warm);
    }

    #[test]
    fn movement_counter_wraps() {
        let mut valve = ValveState::new(0);
        valve.cumulative_movement = VALVE_MOVEMENT_WRAP - 10;
        valve.move_to(100);
        assert!(valve.moved);
        assert_eq!(valve.cumulative_movement, 90);

        valve.move_to(100);
        assert!(!valve.moved);
        assert_eq!(valve.cumulative_movement, 90);
    }

    #[test]
    fn movement_counter_tolerates_out_of_range_start() {
        let mut valve = ValveState::new(0);
        valve.cumulative_movement = u16::MAX;
        valve.move_to(100);
        assert_eq!(
            valve.cumulative_movement,
            (u16::MAX % VALVE_MOVEMENT_WRAP + 100) % VALVE_MOVEMENT_WRAP
        );
    }
}
