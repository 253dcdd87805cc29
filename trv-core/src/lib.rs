pub mod compand;
pub mod config;
pub mod crc;
pub mod engine;
pub mod error;
pub mod frame;
pub mod remote;
pub mod schedule;
pub mod stats;
pub mod store;
pub mod target;
pub mod types;
pub mod valve;

pub use compand::Compander;
pub use config::{
    ResolverConfig, StatsConfig, TargetTemperatures, TrvConfig, TxSecurityLevel, ValveConfig,
};
pub use engine::{ControllerState, TickReport, TrvEngine};
pub use error::{ConfigError, FrameError};
pub use frame::{
    decode_stats_frame, decode_trailing_minimal, encode_stats_frame, encode_trailing_minimal,
    verify_trailing_minimal, OccupancyCode, StatsFrame, TempAndPower,
};
pub use remote::RemoteStatusSlot;
pub use schedule::{Schedule, ScheduleEntry};
pub use stats::{RandomSource, RngSource, StatSet, StatisticsEngine, StatsSample};
pub use store::{MemStore, NvStore};
pub use target::{Environment, NoHistory, TargetTemperatureResolver, WarmPredictor};
pub use types::{Bias, Mode, ModeState, Occupancy, TempC16, ValveState};
pub use valve::{ValveInputs, ValveOutcome, ValvePositionController};
