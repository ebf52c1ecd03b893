//! Test steps.
//!
//! Each step is a unit struct implementing [`Step`]. A step never returns an
//! error: failures become a [`StepStatus::Fatal`] outcome whose report lists
//! what went wrong.

mod ethernet;
mod init_dut;
mod initialisation;
mod mac_address;
mod print_label;
mod programming;
mod selftest;
mod teardown;

use core::fmt;

use tracing::debug;

use crate::bench::Bench;
use crate::error::Result;
use crate::operator::{Color, StepLog};

pub use ethernet::Ethernet;
pub use init_dut::InitDut;
pub use initialisation::Initialisation;
pub use mac_address::MacAddressStep;
pub use print_label::PrintLabel;
pub use programming::{Programming, PROGRAMMER_CLI};
pub use selftest::SelfTest;
pub use teardown::Teardown;

/// Step result code, as the host expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Step passed.
    Success,
    /// Step failed; the run stops.
    Fatal,
    /// Step completed with warnings.
    Partial,
}

impl StepStatus {
    /// Numeric code: 0 success, 1 fatal, 2 partial.
    pub const fn code(self) -> u8 {
        match self {
            StepStatus::Success => 0,
            StepStatus::Fatal => 1,
            StepStatus::Partial => 2,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Fatal => write!(f, "fatal"),
            StepStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Messages a step hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Id of the step.
    pub step_name: String,
    /// Human-readable lines, in order.
    pub infos: Vec<String>,
}

impl StepReport {
    /// Empty report for a step.
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            infos: Vec::new(),
        }
    }

    /// Append a line.
    pub fn push(&mut self, info: impl Into<String>) {
        self.infos.push(info.into());
    }
}

/// Status plus report of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Result code.
    pub status: StepStatus,
    /// Messages.
    pub report: StepReport,
}

/// Host callbacks available while a step runs.
pub struct StepContext<'a> {
    log: &'a mut dyn StepLog,
    progress: &'a mut dyn FnMut(u8),
}

impl<'a> StepContext<'a> {
    /// Wrap the host log sink and progress callback.
    pub fn new(log: &'a mut dyn StepLog, progress: &'a mut dyn FnMut(u8)) -> Self {
        Self { log, progress }
    }

    /// Show a line to the operator.
    pub fn log(&mut self, message: impl AsRef<str>, color: Color) {
        let message = message.as_ref();
        debug!(target: "operator", color = %color, "{}", message);
        self.log.log(message, color);
    }

    /// Report step progress, 0 to 100.
    pub fn progress(&mut self, percent: u8) {
        (self.progress)(percent.min(100));
    }
}

/// One test step.
pub trait Step {
    /// Step id, recorded in `step_name` rows.
    fn name(&self) -> &'static str;

    /// One-line description for the host.
    fn info(&self) -> &'static str;

    /// Run the step.
    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome;
}

/// Run a step body, turning an error into a fatal outcome.
pub(crate) fn guarded<F>(name: &str, ctx: &mut StepContext<'_>, body: F) -> StepOutcome
where
    F: FnOnce(&mut StepContext<'_>, &mut StepReport) -> Result<StepStatus>,
{
    let mut report = StepReport::new(name);
    let status = match body(ctx, &mut report) {
        Ok(status) => status,
        Err(e) => {
            ctx.log(e.to_string(), Color::Red);
            report.infos.extend(e.report_lines());
            StepStatus::Fatal
        }
    };
    StepOutcome { status, report }
}

/// Functional steps in run order, teardown excluded.
pub fn standard_steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(Initialisation),
        Box::new(Programming),
        Box::new(InitDut),
        Box::new(SelfTest),
        Box::new(Ethernet),
        Box::new(MacAddressStep),
        Box::new(PrintLabel),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_status_codes() {
        assert_eq!(StepStatus::Success.code(), 0);
        assert_eq!(StepStatus::Fatal.code(), 1);
        assert_eq!(StepStatus::Partial.code(), 2);
    }

    #[test]
    fn test_guarded_turns_errors_into_fatal() {
        let mut lines = Vec::new();
        let mut log = |m: &str, c: Color| lines.push((m.to_string(), c));
        let mut progress = |_: u8| {};
        let mut ctx = StepContext::new(&mut log, &mut progress);

        let outcome = guarded("test", &mut ctx, |_, _| {
            Err(Error::Failed(vec!["Failed test: TEST ETH NOK".into()]))
        });

        assert_eq!(outcome.status, StepStatus::Fatal);
        assert_eq!(outcome.report.infos, ["Failed test: TEST ETH NOK".to_string()]);
        drop(ctx);
        assert_eq!(lines[0].1, Color::Red);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut seen = Vec::new();
        let mut log = |_: &str, _: Color| {};
        let mut progress = |p: u8| seen.push(p);
        let mut ctx = StepContext::new(&mut log, &mut progress);

        ctx.progress(150);
        drop(ctx);
        assert_eq!(seen, [100u8]);
    }

    #[test]
    fn test_step_ids_in_order() {
        let names: Vec<_> = standard_steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "initialisation",
                "programmation",
                "init_dut",
                "test",
                "ethernet",
                "adresse_mac",
                "print_label"
            ]
        );
    }
}
