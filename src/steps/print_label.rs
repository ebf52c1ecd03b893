//! Traceability label.

use chrono::Local;

use crate::bench::Bench;
use crate::db::ValueRecord;
use crate::error::{Error, HardwareError, RecordError, Result};
use crate::operator::Color;
use crate::printer::Label;

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Prints the label of the tested board.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintLabel;

impl Step for PrintLabel {
    fn name(&self) -> &'static str {
        "print_label"
    }

    fn info(&self) -> &'static str {
        "Prints the traceability label."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            let step_id = bench.begin_step(self.name())?;
            if bench.printer.is_none() {
                return Err(HardwareError::PrinterNotInitialized.into());
            }

            let label = build_label(bench)?;
            ctx.log(format!("Printing label: {}", label.lines.join(" | ")), Color::Blue);
            if let Some(printer) = bench.printer.as_deref_mut() {
                printer.print_label(&label)?;
            }

            let printed =
                serde_json::to_string(&label.lines).map_err(|e| Error::Io(e.to_string()))?;
            bench.save_value(ValueRecord::new(step_id, "label_printed", printed))?;

            ctx.progress(100);
            report.push("Step OK");
            Ok(StepStatus::Success)
        })
    }
}

fn build_label(bench: &Bench) -> Result<Label> {
    let id = bench
        .device_under_test_id
        .ok_or(Error::Record(RecordError::NoDeviceUnderTest))?;
    let station = &bench.settings.station;
    let run = &bench.settings.run;
    Ok(Label {
        lines: vec![
            station.company.clone(),
            Local::now().format("%Y-%m-%d").to_string(),
            format!("ID: {}", id),
            format!("{}{}", run.article, run.indice),
            station.git_hash.clone(),
        ],
        qrcode: Some(id.to_string()),
        copies: 1,
    })
}
