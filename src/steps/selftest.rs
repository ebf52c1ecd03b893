//! Board self-test over the serial console.

use std::time::Duration;

use tracing::debug;

use crate::bench::Bench;
use crate::db::ValueRecord;
use crate::dut::selftest::{SELFTEST_COMMAND, READY};
use crate::dut::SelfTestReport;
use crate::error::{Error, LinkError, Result};
use crate::operator::Color;
use crate::retry::{Attempt, RetryPolicy};

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

const LED_CHECK: &str = "Check that:\n\
    - the chaser is correct (16 LEDs)\n\
    - the green LED on the left of the board is on\n\
    - the three-colour blinking LED next to it is on\n\
    - the red LEDs are on\n\
    - the green AT LED is on";

/// Runs the board self-test, then has the operator check the LEDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfTest;

impl Step for SelfTest {
    fn name(&self) -> &'static str {
        "test"
    }

    fn info(&self) -> &'static str {
        "Runs the board self-test and the LED check."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            let step_id = bench.begin_step(self.name())?;
            bench.dut_link()?;

            let delay = bench.settings.timings.selftest_delay_ms;
            bench.wait_ms(delay);

            let policy = RetryPolicy::from_settings(&bench.settings.retry);
            policy.run(bench, ctx, "Self-test", |bench, ctx, _| {
                run_selftest(bench, ctx, step_id)
            })?;
            ctx.progress(80);

            bench.ask("Chaser and LED check", LED_CHECK)?;

            ctx.progress(100);
            report.push("Step OK");
            Ok(StepStatus::Success)
        })
    }
}

fn run_selftest(bench: &mut Bench, ctx: &mut StepContext<'_>, step_id: i64) -> Result<Attempt<()>> {
    let timeout = Duration::from_millis(bench.settings.dut.selftest_timeout_ms);
    let answer = match bench
        .dut_link()?
        .send_command(SELFTEST_COMMAND, Some(READY), timeout)
    {
        Ok(answer) => answer,
        Err(LinkError::NotConnected) => return Err(Error::Link(LinkError::NotConnected)),
        Err(e) => {
            let message = format!("Communication error: {}", e);
            return Ok(Attempt::retry(message));
        }
    };
    ctx.log(format!("TEST sent, {} received", answer), Color::Blue);
    bench.save_value(ValueRecord::new(step_id, "selftest", answer.as_str()))?;

    let transcript = SelfTestReport::parse(&answer);
    debug!(
        results = transcript.results().len(),
        failed = transcript.failed().len(),
        "self-test evaluated"
    );
    if transcript.passed() {
        return Ok(Attempt::Done(()));
    }
    if !transcript.is_ready() {
        return Ok(Attempt::retry("Communication error: 'READY' not received"));
    }

    let failed = transcript.failed();
    Ok(Attempt::Retry {
        reason: format!("Failed tests: {}", failed.join(", ")),
        details: failed
            .iter()
            .map(|line| format!("Failed test: {}", line))
            .collect(),
    })
}
