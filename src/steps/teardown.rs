//! End of test: release every bench resource.

use std::fs;

use tracing::{info, warn};

use crate::bench::Bench;
use crate::operator::Color;

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Removes config.json, closes the serial port, opens every relay and closes
/// the DAQ tasks.
///
/// Resources that were never brought up make the outcome partial.
#[derive(Debug, Clone, Copy, Default)]
pub struct Teardown;

impl Step for Teardown {
    fn name(&self) -> &'static str {
        "fin_du_test"
    }

    fn info(&self) -> &'static str {
        "Cleans up and releases resources at the end of the test."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            bench.begin_step(self.name())?;
            let mut status = StepStatus::Success;

            let config = bench.config_json_path();
            match fs::remove_file(&config) {
                Ok(()) => ctx.log("config.json removed.", Color::Blue),
                Err(e) => {
                    warn!(path = %config.display(), error = %e, "config.json not removed");
                    ctx.log("Could not remove config.json.", Color::Yellow);
                    status = StepStatus::Partial;
                }
            }
            ctx.progress(25);

            if let Some(mut link) = bench.dut.take() {
                if link.is_connected() {
                    match link.close() {
                        Ok(()) => ctx.log("Serial port closed.", Color::Blue),
                        Err(e) => {
                            ctx.log(format!("Error while closing the serial port: {}", e), Color::Yellow);
                            status = StepStatus::Partial;
                        }
                    }
                }
            }
            ctx.progress(50);

            match bench.relays.take() {
                None => {
                    ctx.log("The MCP23017 was not initialised.", Color::Yellow);
                    status = StepStatus::Partial;
                }
                Some(mut relays) => match relays.all_off() {
                    Ok(()) => ctx.log("The MCP23017 was reset.", Color::Blue),
                    Err(e) => {
                        ctx.log(format!("Could not reset the MCP23017: {}", e), Color::Yellow);
                        status = StepStatus::Partial;
                    }
                },
            }
            ctx.progress(75);

            match (&bench.daq, bench.daq_device.take()) {
                (Some(daq), Some(_)) => {
                    daq.borrow_mut().close_all();
                    ctx.log("The DAQ was closed.", Color::Blue);
                }
                _ => {
                    ctx.log("The DAQ was not initialised.", Color::Yellow);
                    status = StepStatus::Partial;
                }
            }
            ctx.progress(100);

            info!(status = %status, "teardown finished");
            report.push(if status == StepStatus::Success {
                "Cleanup done."
            } else {
                "Cleanup done partially."
            });
            Ok(status)
        })
    }
}
