//! Network check of the board.

use std::path::Path;
use std::time::Duration;

use crate::bench::Bench;
use crate::db::ValueRecord;
use crate::operator::Color;
use crate::process::ping_args;
use crate::retry::{Attempt, RetryPolicy};

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Pings the board until it answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ethernet;

impl Step for Ethernet {
    fn name(&self) -> &'static str {
        "ethernet"
    }

    fn info(&self) -> &'static str {
        "Checks that the board answers ping."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            let step_id = bench.begin_step(self.name())?;
            let dut = bench.settings.dut.clone();
            ctx.log(
                format!("The bench network card must be set to {}", dut.host_ip),
                Color::Blue,
            );
            ctx.log(format!("Checking connectivity with {}...", dut.ip), Color::Blue);

            let args = ping_args(&dut.ip, dut.ping_count);
            let timeout = Some(Duration::from_millis(dut.ping_timeout_ms));
            let attempts = bench.settings.retry.max_attempts;
            let failure = format!(
                "No connectivity with {} after {} attempts",
                dut.ip, attempts
            );

            let used = RetryPolicy::automatic(attempts).run(bench, ctx, "Ping", |bench, _, n| {
                Ok(match bench.processes.run(Path::new("ping"), &args, timeout) {
                    Ok(exit) if exit.success() => Attempt::Done(n),
                    Ok(exit) if exit.timed_out => Attempt::Retry {
                        reason: format!("Attempt {} timed out", n),
                        details: vec![failure.clone()],
                    },
                    Ok(_) => Attempt::Retry {
                        reason: format!("Attempt {} failed", n),
                        details: vec![failure.clone()],
                    },
                    Err(e) => Attempt::Retry {
                        reason: format!("Error during attempt {}: {}", n, e),
                        details: vec![format!("{}: {}", failure, e)],
                    },
                })
            })?;

            ctx.log(format!("Connectivity with {} OK", dut.ip), Color::Green);
            bench.save_value(ValueRecord::new(step_id, "ping_attempts", i64::from(used)).valid(true))?;
            ctx.progress(100);
            report.push("Step OK");
            Ok(StepStatus::Success)
        })
    }
}
