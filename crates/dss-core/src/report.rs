//! Run-level outcome handed back to the caller.

use crate::summary::SummaryTable;
use dss_cfa::BlockId;
use std::fmt;
use std::time::Duration;

/// Tri-boolean analysis status. Combination is a conjunction per flag, so
/// the all-true value is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgorithmStatus {
    pub sound: bool,
    pub precise: bool,
    pub property_checked: bool,
}

impl Default for AlgorithmStatus {
    fn default() -> Self {
        Self {
            sound: true,
            precise: true,
            property_checked: true,
        }
    }
}

impl AlgorithmStatus {
    pub fn combine(self, other: Self) -> Self {
        Self {
            sound: self.sound && other.sound,
            precise: self.precise && other.precise,
            property_checked: self.property_checked && other.property_checked,
        }
    }

    pub fn unsound() -> Self {
        Self {
            sound: false,
            ..Self::default()
        }
    }
}

impl fmt::Display for AlgorithmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sound={} precise={} property_checked={}",
            self.sound, self.precise, self.property_checked
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No error location is reachable.
    Safe,
    /// A violation was confirmed along these blocks, root first.
    Unsafe { visited: Vec<BlockId> },
    Unknown { reason: String },
}

impl Verdict {
    pub fn is_unsafe(&self) -> bool {
        matches!(self, Verdict::Unsafe { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe"),
            Verdict::Unsafe { visited } => {
                let path: Vec<String> = visited.iter().map(BlockId::to_string).collect();
                write!(f, "unsafe via {}", path.join(" -> "))
            }
            Verdict::Unknown { reason } => write!(f, "unknown ({reason})"),
        }
    }
}

/// Scheduler counters.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Requests read by the run loop.
    pub requests: usize,
    pub invalidated: usize,
    pub dispatched: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Summary commits that changed the table.
    pub summary_updates: usize,
    pub late_messages: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct RunReport {
    pub verdict: Verdict,
    pub status: AlgorithmStatus,
    pub stats: SchedulerStats,
    /// Summaries as committed when the run ended (partial on cancellation).
    pub summaries: SummaryTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_identity() {
        let s = AlgorithmStatus {
            sound: true,
            precise: false,
            property_checked: true,
        };
        assert_eq!(s.combine(AlgorithmStatus::default()), s);
        assert_eq!(AlgorithmStatus::default().combine(s), s);
        assert!(!s.combine(AlgorithmStatus::unsound()).sound);
    }

    #[test]
    fn test_verdict_display() {
        let v = Verdict::Unsafe {
            visited: vec![BlockId::new(0), BlockId::new(2)],
        };
        assert_eq!(v.to_string(), "unsafe via B0 -> B2");
    }
}
