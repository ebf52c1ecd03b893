//! Powering the board, opening its console and checking the input rails.

use tracing::info;

use crate::bench::Bench;
use crate::config::{DaqPin, Relay, Volts};
use crate::db::ValueRecord;
use crate::dut::LinkSettings;
use crate::error::Result;
use crate::operator::Color;
use crate::retry::{Attempt, RetryPolicy};

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Input rails seen through the divider: record key, line, display name.
const RAILS: [(&str, DaqPin, &str); 3] = [
    ("IVE1_V", DaqPin::MeasureIve1, "IVE1"),
    ("IVE2_V", DaqPin::MeasureIve2, "IVE2"),
    ("IVF_V", DaqPin::MeasureIvf, "IVF"),
];

/// Powers the board in application mode and measures IVE1, IVE2 and IVF.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitDut;

impl Step for InitDut {
    fn name(&self) -> &'static str {
        "init_dut"
    }

    fn info(&self) -> &'static str {
        "Powers the board, opens its serial port and checks the input rails."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            let step_id = bench.begin_step(self.name())?;
            bench.daq_handle()?;

            bench.set_relay(Relay::EnBtl, false)?;
            bench.set_relay(Relay::EnGndInputs2, false)?;
            bench.set_relay(Relay::EnAutomatic24V, true)?;
            bench.set_relay(Relay::EnAutomaticBtl, true)?;
            bench.set_relay(Relay::En24V, true)?;
            let power_up = bench.settings.timings.power_up_ms;
            bench.wait_ms(power_up);
            ctx.progress(20);

            open_link(bench, ctx)?;
            ctx.progress(40);

            let attempts = bench.settings.retry.max_attempts;
            RetryPolicy::automatic(attempts).run(bench, ctx, "Input rails", |bench, ctx, _| {
                measure_rails(bench, ctx, step_id)
            })?;

            ctx.progress(100);
            report.push("Step OK");
            Ok(StepStatus::Success)
        })
    }
}

fn open_link(bench: &mut Bench, ctx: &mut StepContext<'_>) -> Result<()> {
    let port = bench.dut_port();
    if bench.settings.is_debug() {
        ctx.log(
            format!("DEBUG mode: using {} for the serial link.", port),
            Color::Yellow,
        );
    }
    if let Some(mut old) = bench.dut.take() {
        if old.is_connected() {
            old.close()?;
        }
    }

    let settings = LinkSettings::from(&bench.settings.dut);
    let link = bench.connector.open(&port, &settings)?;
    bench.dut = Some(link);
    info!(port = %port, baud = settings.baud_rate, "serial link open");
    ctx.log(format!("Port {} opened", port), Color::Blue);
    Ok(())
}

/// One measurement pass with the ground relay closed.
///
/// The relay is opened again whatever the outcome.
fn measure_rails(bench: &mut Bench, ctx: &mut StepContext<'_>, step_id: i64) -> Result<Attempt<()>> {
    bench.set_relay(Relay::EnGndInputs2, true)?;
    let settle = bench.settings.measurement.settle_ms;
    bench.wait_ms(settle);

    let measured = read_rails(bench, ctx, step_id);
    let released = bench.set_relay(Relay::EnGndInputs2, false);
    let attempt = measured?;
    released?;
    Ok(attempt)
}

fn read_rails(bench: &mut Bench, ctx: &mut StepContext<'_>, step_id: i64) -> Result<Attempt<()>> {
    let window = bench.settings.measurement.clone();
    let divider = window.divider();
    let mut out_of_range = Vec::new();

    for (key, pin, label) in RAILS {
        let rail = divider.rail_voltage(Volts(bench.read_analog(pin)?));
        ctx.log(
            format!(
                "{} measured: {}, min={} V, max={} V",
                label, rail, window.min_volts.0, window.max_volts.0
            ),
            Color::Blue,
        );
        let inside = window.contains(rail);
        bench.save_value(
            ValueRecord::new(step_id, key, rail.0)
                .unit("V")
                .limits(window.min_volts.0, window.max_volts.0)
                .valid(inside),
        )?;
        if !inside {
            out_of_range.push(format!(
                "{} measured at {}, outside the limits ({}-{} V).",
                label, rail, window.min_volts.0, window.max_volts.0
            ));
        }
    }

    if out_of_range.is_empty() {
        Ok(Attempt::Done(()))
    } else {
        Ok(Attempt::Retry {
            reason: out_of_range.join(" "),
            details: out_of_range,
        })
    }
}
