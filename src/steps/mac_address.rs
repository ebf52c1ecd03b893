//! MAC address reuse or assignment.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use tracing::info;

use crate::bench::Bench;
use crate::db::ValueRecord;
use crate::dut::mac::{mac_write_command, write_accepted, MAC_QUERY_COMMAND};
use crate::dut::{MacAddress, MacLedger};
use crate::error::{ConfigError, Error, Result};
use crate::operator::Color;

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Keeps the address already on the board, or gives it the next one from
/// the ledger and checks it was stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacAddressStep;

impl Step for MacAddressStep {
    fn name(&self) -> &'static str {
        "adresse_mac"
    }

    fn info(&self) -> &'static str {
        "Assigns and verifies the MAC address of the board."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            let step_id = bench.begin_step(self.name())?;
            let timeout = Duration::from_millis(bench.settings.dut.timeout_ms);

            // The first answer may hold boot output
            query_mac(bench, timeout)?;
            let answer = query_mac(bench, timeout)?;

            if let Some(existing) = MacAddress::find_in(&answer) {
                ctx.log(
                    format!("MAC address already on the board: {}", existing),
                    Color::Blue,
                );
                bench.save_value(ValueRecord::new(step_id, "mac_address", existing.to_string()))?;
                report.push("Step OK - existing MAC address kept");
                return Ok(StepStatus::Success);
            }
            ctx.log("No MAC address on the board, assigning a new one.", Color::Blue);
            ctx.progress(25);

            let (mac, ledger, row) = match ledger_path(bench, ctx) {
                Some(path) => {
                    let (ledger, mac, row) = assign_from_ledger(bench, ctx, path)?;
                    (mac, ledger, Some(row))
                }
                None => (ask_mac(bench, ctx)?, None, None),
            };
            ctx.progress(50);

            let written = bench
                .dut_link()?
                .send_command(&mac_write_command(&mac), None, timeout)?;
            if !write_accepted(&written) {
                return Err(Error::failed(
                    "Error while writing the MAC address on the board.",
                ));
            }
            let settle = bench.settings.timings.mac_settle_ms;
            bench.wait_ms(settle);

            let answer = query_mac(bench, timeout)?;
            if MacAddress::find_in(&answer) != Some(mac) {
                return Err(Error::failed(format!(
                    "The MAC address read from the board ({}) does not match the configured one ({}).",
                    answer, mac
                )));
            }
            ctx.log(format!("MAC address {} verified on the board.", mac), Color::Blue);
            ctx.progress(75);

            if let Some(ledger) = &ledger {
                ledger.save()?;
            }
            info!(mac = %mac, row = ?row, "MAC address assigned");

            if let Some(row) = row {
                bench.save_value(
                    ValueRecord::new(step_id, "mac_address_line", row).valid(true),
                )?;
            }
            bench.save_value(ValueRecord::new(step_id, "mac_address", mac.to_string()))?;

            ctx.progress(100);
            report.push("Step OK");
            Ok(StepStatus::Success)
        })
    }
}

fn query_mac(bench: &mut Bench, timeout: Duration) -> Result<String> {
    let answer = bench
        .dut_link()?
        .send_command(MAC_QUERY_COMMAND, None, timeout)?;
    Ok(answer)
}

/// Ledger to draw from: the debug file in development builds, the
/// config.json entry otherwise.
fn ledger_path(bench: &Bench, ctx: &mut StepContext<'_>) -> Option<PathBuf> {
    let path = if bench.settings.is_debug() && !bench.settings.debug.mac_file.as_os_str().is_empty()
    {
        let path = bench.settings.debug.mac_file.clone();
        ctx.log(
            format!(
                "DEBUG mode: using the MAC file {} without attributing the address",
                path.display()
            ),
            Color::Yellow,
        );
        path
    } else {
        PathBuf::from(&bench.items.mac_address_file.path)
    };
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Next ledger address. Debug builds only look it up; production runs
/// attribute it, and get the ledger back to save once the board confirmed.
fn assign_from_ledger(
    bench: &Bench,
    ctx: &mut StepContext<'_>,
    path: PathBuf,
) -> Result<(Option<MacLedger>, MacAddress, usize)> {
    let mut ledger = MacLedger::open(&path)?;
    let (assignment, ledger) = if bench.settings.is_debug() {
        (ledger.next_free(), None)
    } else {
        let article = bench.settings.run.article.trim();
        if article.is_empty() {
            return Err(ConfigError::MissingArticle.into());
        }
        let date = Local::now().format("%Y-%m-%d").to_string();
        let assignment = ledger.assign(article, &date, &bench.settings.run.command_number);
        (assignment, Some(ledger))
    };

    let assignment =
        assignment.ok_or_else(|| Error::failed("No MAC address could be assigned."))?;
    ctx.log(
        format!(
            "MAC address: {} line {}",
            assignment.mac_address, assignment.row
        ),
        Color::Blue,
    );
    Ok((ledger, assignment.mac_address, assignment.row))
}

/// Operator-typed address, asked again until it parses.
fn ask_mac(bench: &mut Bench, ctx: &mut StepContext<'_>) -> Result<MacAddress> {
    loop {
        let answer = bench.ask(
            "MAC address",
            "No MAC ledger configured.\nEnter the MAC address of the board (XX:XX:XX:XX:XX:XX)",
        )?;
        match answer.trim().parse::<MacAddress>() {
            Ok(mac) => return Ok(mac),
            Err(e) => ctx.log(e.to_string(), Color::Red),
        }
    }
}
