/// Time left until the next epoch, truncated to whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochEta {
    pub hours: u64,
    pub minutes: u64,
}

impl EpochEta {
    /// Countdown from `now` to `next_epoch_at` (both unix seconds). Never negative.
    pub fn until(next_epoch_at: u64, now: u64) -> Self {
        let remaining = next_epoch_at.saturating_sub(now);
        Self {
            hours: remaining / 3600,
            minutes: (remaining % 3600) / 60,
        }
    }
}

impl std::fmt::Display for EpochEta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in {}h {}m", self.hours, self.minutes)
    }
}
