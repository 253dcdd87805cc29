use std::sync::{
    atomic::{AtomicU32, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use tracing::warn;

use crate::{
    error::FrameError,
    frame::{decode_stats_frame, StatsFrame},
};

/// Last good status frame heard from a remote node; readers never see a torn frame.
#[derive(Debug, Default)]
pub struct RemoteStatusSlot {
    latest: Mutex<Option<StatsFrame>>,
    rejected: AtomicU32,
}

impl RemoteStatusSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The previous record survives a rejected frame.
    pub fn offer(&self, bytes: &[u8]) -> Result<(), FrameError> {
        match decode_stats_frame(bytes) {
            Ok((frame, _)) => {
                self.put(frame);
                Ok(())
            }
            Err(err) => {
                let rejected = self.rejected.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
                warn!("ignoring remote status frame: {err} ({rejected} rejected)");
                Err(err)
            }
        }
    }

    pub fn put(&self, frame: StatsFrame) {
        *self.lock() = Some(frame);
    }

    /// Returns and clears the record.
    pub fn take(&self) -> Option<StatsFrame> {
        self.lock().take()
    }

    pub fn peek(&self) -> Option<StatsFrame> {
        *self.lock()
    }

    pub fn rejected_count(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }

    // The record is plain data, so a panic mid-update cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, Option<StatsFrame>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::{
        config::TxSecurityLevel,
        frame::{encode_stats_frame, OccupancyCode, TempAndPower},
        types::TempC16,
    };

    fn frame(temp: i16) -> StatsFrame {
        StatsFrame {
            id: Some([0x12, 0x34]),
            temp_and_power: Some(TempAndPower {
                temp: TempC16(temp),
                power_low: false,
            }),
            ambient_light: Some(100),
            occupancy: OccupancyCode::Possible,
        }
    }

    fn encoded(frame: &StatsFrame) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let end =
            encode_stats_frame(frame, &mut buf, TxSecurityLevel::AlwaysAll, false).unwrap();
        buf[..=end].to_vec()
    }

    #[test]
    fn take_clears_the_record() {
        let slot = RemoteStatusSlot::new();
        slot.offer(&encoded(&frame(300))).unwrap();

        assert_eq!(slot.peek(), Some(frame(300)));
        assert_eq!(slot.take(), Some(frame(300)));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn rejected_frame_keeps_previous_record() {
        let slot = RemoteStatusSlot::new();
        slot.put(frame(300));

        let mut corrupt = encoded(&frame(310));
        corrupt[1] ^= 0x01;
        assert!(slot.offer(&corrupt).is_err());
        assert_eq!(slot.offer(&[0x00]), Err(FrameError::BadHeader));

        assert_eq!(slot.rejected_count(), 2);
        assert_eq!(slot.peek(), Some(frame(300)));
    }

    #[test]
    fn concurrent_writers_leave_a_whole_frame() {
        let slot = Arc::new(RemoteStatusSlot::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || {
                    for i in 0..50 {
                        slot.put(frame(n * 100 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let last = slot.take().unwrap();
        assert_eq!(last.id, Some([0x12, 0x34]));
        assert_eq!(last.ambient_light, Some(100));
    }
}
