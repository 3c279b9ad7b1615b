//! Ad slot scheduling.
//!
//! Turns an ordered ad selection plus program timing into a gapless run of
//! timestamped placements, rejecting selections that cannot fit.

use chrono::TimeDelta;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::ad::{Ad, AdId};
use crate::core::placement::{AdPlacement, ExistingPlacement, PlacementBatch, ProgramWindow};
use crate::core::time::{self, Timestamp};

/// Error type for scheduling operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Program window is empty: start {start} is not before end {end}")]
    EmptyWindow { start: Timestamp, end: Timestamp },
    #[error("Ad {ad_id} has no duration")]
    ZeroDuration { ad_id: AdId },
    #[error("Ad start {requested} is before the program starts at {program_start}")]
    StartBeforeProgram {
        requested: Timestamp,
        program_start: Timestamp,
    },
    #[error(
        "Selected ads end at {batch_end}, {} past the program end {program_end}",
        time::format_span(*overflow)
    )]
    ExceedsProgramWindow {
        batch_end: Timestamp,
        program_end: Timestamp,
        overflow: TimeDelta,
    },
}

/// Scheduler with configurable slot gap and trailing buffer
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Propose where the next ad batch should start.
    ///
    /// With nothing placed yet the proposal is one gap after the program start and
    /// must fall strictly before the program end. Otherwise it is one gap after the
    /// latest existing end and must fall strictly before the program end minus the
    /// trailing buffer. Returns `None` when no slot is available.
    pub fn suggest_next_start_time(
        &self,
        window: &ProgramWindow,
        existing: &[ExistingPlacement],
    ) -> Option<Timestamp> {
        let gap = time::to_delta(self.config.slot_gap);

        let (candidate, limit) = match existing.iter().map(|p| p.end_time).max() {
            None => (window.start().checked_add_signed(gap)?, window.end()),
            Some(latest_end) => {
                let buffer = time::to_delta(self.config.trailing_buffer);
                (
                    latest_end.checked_add_signed(gap)?,
                    window.end().checked_sub_signed(buffer)?,
                )
            }
        };

        if candidate < limit {
            Some(candidate)
        } else {
            debug!(
                candidate = %candidate,
                limit = %limit,
                "No ad slot available"
            );
            None
        }
    }

    /// Lay out `selected_ads` back to back from `requested_start`.
    ///
    /// Ads are placed in the order given; nothing is sorted. The whole batch is
    /// rejected if it starts before the program or ends after it, so callers never
    /// see a partial layout. An empty selection yields an empty batch.
    pub fn place_batch(
        &self,
        selected_ads: &[Ad],
        requested_start: Timestamp,
        window: &ProgramWindow,
    ) -> Result<PlacementBatch, ScheduleError> {
        if requested_start < window.start() {
            return Err(ScheduleError::StartBeforeProgram {
                requested: requested_start,
                program_start: window.start(),
            });
        }

        if selected_ads.is_empty() {
            return Ok(PlacementBatch::empty());
        }

        let mut placements = Vec::with_capacity(selected_ads.len());
        let mut cursor = requested_start;
        let mut total_duration = TimeDelta::zero();

        if let Some(ad) = selected_ads.iter().find(|ad| ad.duration_seconds == 0) {
            return Err(ScheduleError::ZeroDuration { ad_id: ad.id });
        }

        for ad in selected_ads {
            let end = cursor.checked_add_signed(ad.duration()).ok_or_else(|| {
                ScheduleError::ExceedsProgramWindow {
                    batch_end: Timestamp::MAX_UTC,
                    program_end: window.end(),
                    overflow: TimeDelta::MAX,
                }
            })?;
            placements.push(AdPlacement {
                ad: ad.clone(),
                start_time: cursor,
                end_time: end,
            });
            total_duration += ad.duration();
            cursor = end;
        }

        if cursor > window.end() {
            return Err(ScheduleError::ExceedsProgramWindow {
                batch_end: cursor,
                program_end: window.end(),
                overflow: cursor - window.end(),
            });
        }

        debug!(
            count = placements.len(),
            start = %requested_start,
            end = %cursor,
            "Placed ad batch"
        );

        Ok(PlacementBatch {
            placements,
            total_duration,
        })
    }
}

/// `Scheduler::suggest_next_start_time` with the default 30s gap and buffer
pub fn suggest_next_start_time(
    window: &ProgramWindow,
    existing: &[ExistingPlacement],
) -> Option<Timestamp> {
    Scheduler::default().suggest_next_start_time(window, existing)
}

/// `Scheduler::place_batch` with default configuration
pub fn place_batch(
    selected_ads: &[Ad],
    requested_start: Timestamp,
    window: &ProgramWindow,
) -> Result<PlacementBatch, ScheduleError> {
    Scheduler::default().place_batch(selected_ads, requested_start, window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    fn morning_show() -> ProgramWindow {
        ProgramWindow::new(at(9, 0, 0), at(10, 0, 0)).unwrap()
    }

    #[test]
    fn test_suggest_with_no_existing_ads() {
        let window = morning_show();
        assert_eq!(suggest_next_start_time(&window, &[]), Some(at(9, 0, 30)));
    }

    #[test]
    fn test_suggest_with_no_existing_ads_short_program() {
        // start + 30s lands exactly on the end: not strictly before
        let window = ProgramWindow::new(at(9, 0, 0), at(9, 0, 30)).unwrap();
        assert_eq!(suggest_next_start_time(&window, &[]), None);

        let window = ProgramWindow::new(at(9, 0, 0), at(9, 0, 31)).unwrap();
        assert_eq!(suggest_next_start_time(&window, &[]), Some(at(9, 0, 30)));
    }

    #[test]
    fn test_suggest_after_latest_existing_end() {
        let window = morning_show();
        let existing = vec![
            ExistingPlacement::new(at(9, 10, 0), at(9, 12, 0)),
            ExistingPlacement::new(at(9, 0, 30), at(9, 1, 0)),
        ];
        assert_eq!(
            suggest_next_start_time(&window, &existing),
            Some(at(9, 12, 30))
        );
    }

    #[test]
    fn test_suggest_respects_trailing_buffer() {
        let window = morning_show();

        // 09:59:00 + 30s = 09:59:30, which is not before 10:00:00 - 30s
        let existing = vec![ExistingPlacement::new(at(9, 58, 0), at(9, 59, 0))];
        assert_eq!(suggest_next_start_time(&window, &existing), None);

        // 09:58:59 + 30s = 09:59:29 fits
        let existing = vec![ExistingPlacement::new(at(9, 58, 0), at(9, 58, 59))];
        assert_eq!(
            suggest_next_start_time(&window, &existing),
            Some(at(9, 59, 29))
        );
    }

    #[test]
    fn test_suggest_with_custom_gap() {
        let scheduler = Scheduler::new(SchedulerConfig {
            slot_gap: Duration::from_secs(60),
            trailing_buffer: Duration::from_secs(0),
        });
        let window = morning_show();
        assert_eq!(
            scheduler.suggest_next_start_time(&window, &[]),
            Some(at(9, 1, 0))
        );
        let existing = vec![ExistingPlacement::new(at(9, 58, 0), at(9, 58, 59))];
        assert_eq!(
            scheduler.suggest_next_start_time(&window, &existing),
            Some(at(9, 59, 59))
        );
    }

    #[test]
    fn test_place_two_ads_back_to_back() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "Coffee", 20), Ad::new(2, "Cars", 15)];
        let start = suggest_next_start_time(&window, &[]).unwrap();

        let batch = place_batch(&ads, start, &window).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.placements[0].start_time, at(9, 0, 30));
        assert_eq!(batch.placements[0].end_time, at(9, 0, 50));
        assert_eq!(batch.placements[1].start_time, at(9, 0, 50));
        assert_eq!(batch.placements[1].end_time, at(9, 1, 5));
        assert_eq!(batch.total_duration, time::seconds(35));
    }

    #[test]
    fn test_place_preserves_selection_order() {
        let window = morning_show();
        let ads = vec![
            Ad::new(9, "Zebra", 10).with_category(3),
            Ad::new(1, "Apple", 5).with_category(1),
            Ad::new(4, "Mango", 7).with_category(2),
        ];

        let batch = place_batch(&ads, at(9, 0, 30), &window).unwrap();
        let ids: Vec<_> = batch.placements.iter().map(|p| p.ad.id).collect();
        assert_eq!(ids, vec![9, 1, 4]);
    }

    #[test]
    fn test_place_has_no_gaps() {
        let window = morning_show();
        let ads: Vec<_> = (1..=12)
            .map(|i| Ad::new(i, format!("Ad {}", i), (i as u32 * 7) % 45 + 1))
            .collect();
        let start = at(9, 5, 0);

        let batch = place_batch(&ads, start, &window).unwrap();

        for pair in batch.placements.windows(2) {
            assert_eq!(pair[1].start_time, pair[0].end_time);
        }
        let total: u32 = ads.iter().map(|ad| ad.duration_seconds).sum();
        assert_eq!(batch.end_time(), Some(start + time::seconds(total)));
        assert_eq!(batch.total_duration, time::seconds(total));
    }

    #[test]
    fn test_place_ending_exactly_at_program_end() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "Closer", 30)];
        let batch = place_batch(&ads, at(9, 59, 30), &window).unwrap();
        assert_eq!(batch.end_time(), Some(window.end()));
    }

    #[test]
    fn test_place_exceeding_program_window() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "Marathon", 3000), Ad::new(2, "Encore", 600)];

        let err = place_batch(&ads, at(9, 0, 30), &window).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::ExceedsProgramWindow {
                batch_end: at(10, 0, 30),
                program_end: at(10, 0, 0),
                overflow: time::seconds(30),
            }
        );
    }

    #[test]
    fn test_place_start_before_program() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "Early", 10)];
        let err = place_batch(&ads, at(8, 59, 59), &window).unwrap_err();
        assert!(matches!(err, ScheduleError::StartBeforeProgram { .. }));
    }

    #[test]
    fn test_place_rejects_zero_length_ad() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "A", 15), Ad::new(2, "B", 0)];
        let err = place_batch(&ads, at(9, 0, 30), &window).unwrap_err();
        assert_eq!(err, ScheduleError::ZeroDuration { ad_id: 2 });
    }

    #[test]
    fn test_place_empty_selection() {
        let window = morning_show();
        let batch = place_batch(&[], at(9, 0, 30), &window).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.total_duration, TimeDelta::zero());
    }

    #[test]
    fn test_place_is_deterministic() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "A", 20), Ad::new(2, "B", 15)];
        let first = place_batch(&ads, at(9, 0, 30), &window);
        let second = place_batch(&ads, at(9, 0, 30), &window);
        assert_eq!(first, second);
    }

    #[test]
    fn test_error_message_reports_overflow() {
        let window = morning_show();
        let ads = vec![Ad::new(1, "Long", 3600)];
        let err = place_batch(&ads, at(9, 0, 30), &window).unwrap_err();
        assert!(err.to_string().contains("00:00:30.000"));
    }
}
