use std::fmt;

/// Transfer progress for an in-flight upload or download.
///
/// One value is produced per progress tick reported by the transport. Values
/// are plain data: they are `Copy`, compare by both fields and carry no
/// reference back to the transfer that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RxProgress {
    /// Bytes sent or received so far.
    pub bytes_written: i64,

    /// Expected size of the transfer, or [`RxProgress::UNKNOWN`].
    pub total_bytes: i64,
}

impl RxProgress {
    /// Sentinel for a transfer whose size the server did not announce.
    pub const UNKNOWN: i64 = -1;

    pub const fn new(bytes_written: i64, total_bytes: i64) -> Self {
        Self {
            bytes_written,
            total_bytes,
        }
    }

    /// Builds a progress value from the byte counters the transport keeps.
    ///
    /// A missing total maps to [`RxProgress::UNKNOWN`]. Counters above
    /// `i64::MAX` saturate.
    pub fn from_transport(bytes_written: u64, total_bytes: Option<u64>) -> Self {
        let clamp = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
        Self {
            bytes_written: clamp(bytes_written),
            total_bytes: total_bytes.map_or(Self::UNKNOWN, clamp),
        }
    }

    /// `total_bytes - bytes_written`, not clamped.
    ///
    /// Negative when the transport reports more bytes than it announced.
    #[must_use]
    pub const fn bytes_remaining(&self) -> i64 {
        self.total_bytes - self.bytes_written
    }

    /// Completion ratio in `0.0..=1.0` for consistent counters.
    ///
    /// Returns `0.0` while the total is zero or unknown.
    #[must_use]
    pub fn completed(&self) -> f64 {
        if self.total_bytes > 0 {
            self.bytes_written as f64 / self.total_bytes as f64
        } else {
            0.0
        }
    }

    /// Completion as a percentage, `None` when the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        if self.is_indeterminate() {
            None
        } else {
            Some(self.completed() * 100.0)
        }
    }

    /// Returns `true` if the server did not announce a size.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        self.total_bytes < 0
    }
}

impl fmt::Display for RxProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_indeterminate() {
            write!(f, "{} bytes", self.bytes_written)
        } else {
            write!(
                f,
                "{}/{} bytes ({:.1}%)",
                self.bytes_written,
                self.total_bytes,
                self.completed() * 100.0
            )
        }
    }
}
