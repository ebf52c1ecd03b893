//! Flashing the bootloader and the application with STM32CubeProgrammer.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::bench::Bench;
use crate::db::ValueRecord;
use crate::error::{ConfigError, Error, Result};
use crate::operator::Color;

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Executable of the programmer command line tool.
#[cfg(windows)]
pub const PROGRAMMER_CLI: &str = "STM32_Programmer_CLI.exe";
/// Executable of the programmer command line tool.
#[cfg(not(windows))]
pub const PROGRAMMER_CLI: &str = "STM32_Programmer_CLI";

/// Flashes the board through its serial bootloader.
#[derive(Debug, Clone, Copy, Default)]
pub struct Programming;

impl Step for Programming {
    fn name(&self) -> &'static str {
        "programmation"
    }

    fn info(&self) -> &'static str {
        "Programs the board under test."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            let step_id = bench.begin_step(self.name())?;

            if bench.settings.is_debug() && bench.settings.debug.skip_programming {
                ctx.log("DEBUG mode: programming is disabled.", Color::Yellow);
                report.push("Programming skipped");
                return Ok(StepStatus::Success);
            }

            let port = bench.dut_port();
            if bench.settings.is_debug() {
                ctx.log(format!("DEBUG mode: using {}.", port), Color::Yellow);
            }

            let programmer = programmer_path(bench)?;
            let binaries = [
                ("Bootloader", PathBuf::from(&bench.items.btl.path)),
                ("Application", application_path(bench)),
            ];

            let total = binaries.len();
            for (index, (key, path)) in binaries.iter().enumerate() {
                ctx.progress((index * 100 / total) as u8);
                flash(bench, ctx, step_id, &programmer, &port, key, path)?;
            }
            ctx.progress(100);

            bench.ask(
                "Programming done",
                "Move the programming switch down and power the bench back on.",
            )?;

            report.push("Step OK");
            Ok(StepStatus::Success)
        })
    }
}

fn programmer_path(bench: &Bench) -> Result<PathBuf> {
    let dir = &bench.items.stm32_cube_programmer.path;
    if dir.is_empty() {
        return Err(ConfigError::MissingPath("STM32CubeProgrammer").into());
    }
    let cli = Path::new(dir).join(PROGRAMMER_CLI);
    if !cli.exists() {
        return Err(ConfigError::ProgrammerNotFound(cli.display().to_string()).into());
    }
    Ok(cli)
}

/// Firmware chosen at initialisation, else the one from config.json.
fn application_path(bench: &Bench) -> PathBuf {
    match &bench.firmware_path {
        Some(path) if !path.as_os_str().is_empty() => path.clone(),
        _ => PathBuf::from(&bench.items.microcontroller.path),
    }
}

fn flash(
    bench: &mut Bench,
    ctx: &mut StepContext<'_>,
    step_id: i64,
    programmer: &Path,
    port: &str,
    key: &str,
    image: &Path,
) -> Result<()> {
    if image.as_os_str().is_empty() || !image.exists() {
        return Err(ConfigError::FileNotFound(image.display().to_string()).into());
    }

    let args = vec![
        "-c".to_string(),
        format!("port={}", port),
        "-w".to_string(),
        image.display().to_string(),
    ];
    ctx.log(
        format!("Command: {} {}", programmer.display(), args.join(" ")),
        Color::Blue,
    );

    let exit = bench.processes.run(programmer, &args, None)?;
    let code = exit
        .code
        .map_or_else(|| "none".to_string(), |c| c.to_string());
    let message = format!("Programming {} - returncode={}", image.display(), code);
    info!(image = %image.display(), code = %code, "programmer finished");
    ctx.log(&message, Color::Blue);
    bench.save_value(ValueRecord::new(step_id, key, message))?;

    if !exit.success() {
        return Err(Error::failed(format!(
            "Error programming file: {}",
            image.display()
        )));
    }
    Ok(())
}
