pub mod handlers;
pub mod locks;
pub mod orchestrator;
pub mod transitions;

use serde::Serialize;

pub use orchestrator::{OrchestratorSettings, PipelineOrchestrator};

/// Counters for one run. Each counts actions taken, not candidates touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub screened: u32,
    pub shortlisted: u32,
    pub rejected_at_screen: u32,
    pub assessments_sent: u32,
    pub results_checked: u32,
    pub decisions_made: u32,
    pub finalized: u32,
    pub errors: u32,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.screened += other.screened;
        self.shortlisted += other.shortlisted;
        self.rejected_at_screen += other.rejected_at_screen;
        self.assessments_sent += other.assessments_sent;
        self.results_checked += other.results_checked;
        self.decisions_made += other.decisions_made;
        self.finalized += other.finalized;
        self.errors += other.errors;
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Screened={} Shortlisted={} Rejected={} Sent={} Checked={} Decisions={} Finalized={} Errors={}",
            self.screened,
            self.shortlisted,
            self.rejected_at_screen,
            self.assessments_sent,
            self.results_checked,
            self.decisions_made,
            self.finalized,
            self.errors
        )
    }
}

/// Result of `process_pipeline`. Serialises as either `{"skipped": true, "reason": ..}`
/// or the bare stats object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunReport {
    Skipped { skipped: bool, reason: String },
    Completed(RunStats),
}

impl RunReport {
    pub fn skipped(reason: impl Into<String>) -> Self {
        RunReport::Skipped {
            skipped: true,
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunReport::Skipped { .. })
    }

    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            RunReport::Completed(stats) => Some(stats),
            RunReport::Skipped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_every_counter() {
        let mut total = RunStats {
            screened: 1,
            errors: 1,
            ..Default::default()
        };
        total.merge(&RunStats {
            screened: 2,
            shortlisted: 1,
            finalized: 3,
            ..Default::default()
        });
        assert_eq!(total.screened, 3);
        assert_eq!(total.shortlisted, 1);
        assert_eq!(total.finalized, 3);
        assert_eq!(total.errors, 1);
    }

    #[test]
    fn test_report_serialisation_shapes() {
        let skipped = serde_json::to_value(RunReport::skipped("Pipeline status is paused")).unwrap();
        assert_eq!(skipped["skipped"], true);
        assert_eq!(skipped["reason"], "Pipeline status is paused");

        let completed = serde_json::to_value(RunReport::Completed(RunStats {
            screened: 2,
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(completed["screened"], 2);
        assert!(completed.get("skipped").is_none());
    }

    #[test]
    fn test_summary_line() {
        let stats = RunStats {
            screened: 3,
            shortlisted: 2,
            rejected_at_screen: 1,
            errors: 1,
            ..Default::default()
        };
        assert_eq!(
            stats.summary_line(),
            "Screened=3 Shortlisted=2 Rejected=1 Sent=0 Checked=0 Decisions=0 Finalized=0 Errors=1"
        );
    }
}
