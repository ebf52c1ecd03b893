//! Step runner.
//!
//! Runs the functional steps in order and stops at the first fatal one. The
//! verdict is written onto the device-under-test row, then teardown runs
//! whatever happened before.

use serde_json::json;
use tracing::{info, warn};

use crate::bench::Bench;
use crate::db::row;
use crate::operator::StepLog;
use crate::steps::{standard_steps, Step, StepContext, StepOutcome, StepStatus, Teardown};

/// Ordered steps plus the teardown step.
pub struct Sequence {
    steps: Vec<Box<dyn Step>>,
    teardown: Box<dyn Step>,
}

/// Outcomes of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceReport {
    /// Functional steps that ran, in order.
    pub outcomes: Vec<StepOutcome>,
    /// Teardown outcome.
    pub teardown: StepOutcome,
}

impl SequenceReport {
    /// No functional step failed.
    pub fn passed(&self) -> bool {
        self.failed_step().is_none()
    }

    /// Name of the first fatal step.
    pub fn failed_step(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| o.status == StepStatus::Fatal)
            .map(|o| o.report.step_name.as_str())
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::standard()
    }
}

impl Sequence {
    /// Full bench sequence.
    pub fn standard() -> Self {
        Self::new(standard_steps())
    }

    /// Custom steps followed by the standard teardown.
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            teardown: Box::new(Teardown),
        }
    }

    /// Step ids in run order, teardown last.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .chain(std::iter::once(&self.teardown))
            .map(|s| s.name())
            .collect()
    }

    /// Run every step on `bench`.
    pub fn run(
        &self,
        bench: &mut Bench,
        log: &mut dyn StepLog,
        progress: &mut dyn FnMut(u8),
    ) -> SequenceReport {
        let mut outcomes = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            info!(step = step.name(), "step started");
            let outcome = {
                let mut ctx = StepContext::new(&mut *log, &mut *progress);
                step.run(bench, &mut ctx)
            };
            info!(step = step.name(), status = %outcome.status, "step finished");
            let fatal = outcome.status == StepStatus::Fatal;
            outcomes.push(outcome);
            if fatal {
                break;
            }
        }

        let failed = outcomes
            .iter()
            .find(|o| o.status == StepStatus::Fatal)
            .map(|o| o.report.step_name.clone());
        record_verdict(bench, failed.as_deref());

        let teardown = {
            let mut ctx = StepContext::new(&mut *log, &mut *progress);
            self.teardown.run(bench, &mut ctx)
        };
        info!(status = %teardown.status, "sequence finished");

        SequenceReport { outcomes, teardown }
    }
}

fn record_verdict(bench: &mut Bench, failed_step: Option<&str>) {
    let Some(id) = bench.device_under_test_id else {
        return;
    };
    let changes = row(json!({
        "result": u8::from(failed_step.is_none()),
        "failure_label": failed_step.unwrap_or(""),
    }));
    let written = bench.database().and_then(|db| {
        db.update_by_id("device_under_test", id, changes)
            .map_err(Into::into)
    });
    if let Err(e) = written {
        warn!(error = %e, "could not record the verdict");
    }
}
