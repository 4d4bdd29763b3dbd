//! Completion math shared by books and folders.

use serde::{Deserialize, Serialize};
use crate::item::Item;

/// Upper bound of `percent_completed`.
pub const FULL_PERCENT: f64 = 100.0;

/// The derived fields the aggregator owns for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    /// Percentage complete (0-100)
    pub percent_completed: f64,

    /// Total playable length in seconds
    pub duration: f64,

    /// Whether the item counts as finished
    pub is_finished: bool,
}

impl ItemProgress {
    /// Progress of an empty folder.
    pub const EMPTY: ItemProgress = ItemProgress {
        percent_completed: 0.0,
        duration: 0.0,
        is_finished: false,
    };

    /// True when both numeric fields are within `tolerance` of `other` and the
    /// finished flags agree.
    pub fn approx_eq(&self, other: &ItemProgress, tolerance: f64) -> bool {
        self.is_finished == other.is_finished
            && (self.percent_completed - other.percent_completed).abs() <= tolerance
            && (self.duration - other.duration).abs() <= tolerance
    }

    /// Let an explicit user mark stand in for the derived finished flag.
    pub fn with_mark(mut self, mark: Option<bool>) -> Self {
        if let Some(finished) = mark {
            self.is_finished = finished;
        }
        self
    }
}

impl Default for ItemProgress {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Percentage of a book played, clamped to [0, 100]. Zero duration yields 0.
pub fn book_percent(current_time: f64, duration: f64) -> f64 {
    if duration.is_nan() || duration <= 0.0 || !current_time.is_finite() {
        return 0.0;
    }
    (current_time / duration * FULL_PERCENT).clamp(0.0, FULL_PERCENT)
}

/// Reduce a folder's direct children to the folder's own progress.
///
/// Each child is weighted by its duration; zero-duration children carry no
/// weight. A folder counts as finished once it reaches 100% or when it has
/// children and every one of them is finished.
pub fn folder_progress<'a, I>(children: I) -> ItemProgress
where
    I: IntoIterator<Item = &'a Item>,
{
    let mut total_duration = 0.0_f64;
    let mut weighted = 0.0_f64;
    let mut count = 0usize;
    let mut all_finished = true;

    for child in children {
        count += 1;
        all_finished &= child.is_finished;

        let weight = if child.duration.is_finite() && child.duration > 0.0 {
            child.duration
        } else {
            0.0
        };
        total_duration += weight;
        weighted += weight * child.percent_completed.clamp(0.0, FULL_PERCENT);
    }

    if count == 0 {
        return ItemProgress::EMPTY;
    }

    let percent_completed = if total_duration > 0.0 {
        (weighted / total_duration).clamp(0.0, FULL_PERCENT)
    } else {
        0.0
    };

    ItemProgress {
        percent_completed,
        duration: total_duration,
        is_finished: percent_completed >= FULL_PERCENT || all_finished,
    }
}
