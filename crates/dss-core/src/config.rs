use dss_cpa::WaitlistOrder;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a distributed summary run.
#[derive(Debug, Clone)]
pub struct DssConfig {
    /// Worker threads (0 = use all available).
    pub num_threads: usize,
    /// Waitlist order of the per-block engines.
    pub waitlist_order: WaitlistOrder,
    /// Compute successors of one engine pop in parallel.
    pub parallel_transfer: bool,
    /// Attach fault candidates to error conditions, if the domain supports it.
    pub fault_localization: bool,
    /// Where confirmed faults are written.
    pub fault_report: PathBuf,
    /// Refinements of one summary before it stops being re-propagated.
    pub max_summary_versions: u64,
    /// Longest chain of blocks a backward condition is followed through.
    pub max_backward_depth: usize,
    /// Wall-clock limit for the whole run.
    pub timeout: Option<Duration>,
    /// How long the run loop blocks waiting for task results.
    pub poll_interval: Duration,
}

impl Default for DssConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            waitlist_order: WaitlistOrder::Topological,
            parallel_transfer: false,
            fault_localization: true,
            fault_report: PathBuf::from("faults.txt"),
            max_summary_versions: 8,
            max_backward_depth: 64,
            timeout: None,
            poll_interval: Duration::from_millis(10),
        }
    }
}
