use std::fmt;
use std::time::Duration;

use serde::Serialize;

use scheduler_dispatcher::DispatchStats;
use scheduler_domain::SchedulerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Outcome of one strategy run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub strategy: String,
    pub mode: String,
    pub elapsed_seconds: f64,
    pub completed: u64,
    pub total: u64,
    pub violations: usize,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DispatchStats>,
}

impl RunReport {
    /// Run that never got going (bad code, init failure).
    pub fn failed(
        strategy: impl Into<String>,
        mode: impl Into<String>,
        total: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            mode: mode.into(),
            elapsed_seconds: 0.0,
            completed: 0,
            total,
            violations: 0,
            verdict: Verdict::Fail,
            reason: Some(reason.into()),
            stats: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_seconds)
    }

    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn throughput(&self) -> f64 {
        if self.elapsed_seconds <= 0.0 {
            return 0.0;
        }
        self.completed as f64 / self.elapsed_seconds
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchmarkSummary {
    pub runs: Vec<RunReport>,
}

impl BenchmarkSummary {
    pub fn all_passed(&self) -> bool {
        !self.runs.is_empty() && self.runs.iter().all(RunReport::passed)
    }

    pub fn failed_runs(&self) -> usize {
        self.runs.iter().filter(|run| !run.passed()).count()
    }

    pub fn to_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for BenchmarkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<18} {:<8} {:>10} {:>21} {:>10} {:>11} {:<7}",
            "strategy", "mode", "elapsed_s", "completed/total", "ratio", "violations", "verdict"
        )?;
        for run in &self.runs {
            writeln!(
                f,
                "{:<18} {:<8} {:>10.3} {:>21} {:>9.1}% {:>11} {:<7}",
                run.strategy,
                run.mode,
                run.elapsed_seconds,
                format!("{}/{}", run.completed, run.total),
                run.completion_ratio() * 100.0,
                run.violations,
                run.verdict,
            )?;
            if let Some(reason) = &run.reason {
                writeln!(f, "    reason: {reason}")?;
            }
        }
        write!(
            f,
            "{} run(s), {} failed",
            self.runs.len(),
            self.failed_runs()
        )
    }
}
