//! Subprocess execution for the programmer CLI and `ping`.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How a subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when killed by a signal or on timeout.
    pub code: Option<i32>,
    /// The process was killed after its timeout.
    pub timed_out: bool,
}

impl ProcessExit {
    /// Normal exit with `code`.
    pub const fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            timed_out: false,
        }
    }

    /// Exit code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs.
pub trait ProcessRunner {
    /// Run `program` to completion, killing it after `timeout` when given.
    fn run(&mut self, program: &Path, args: &[String], timeout: Option<Duration>)
        -> io::Result<ProcessExit>;
}

/// Runs programs on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

const POLL: Duration = Duration::from_millis(50);

impl ProcessRunner for SystemRunner {
    fn run(
        &mut self,
        program: &Path,
        args: &[String],
        timeout: Option<Duration>,
    ) -> io::Result<ProcessExit> {
        debug!(program = %program.display(), args = ?args, "spawning");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(timeout) = timeout else {
            let status = child.wait()?;
            return Ok(ProcessExit {
                code: status.code(),
                timed_out: false,
            });
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(ProcessExit {
                    code: status.code(),
                    timed_out: false,
                });
            }
            if Instant::now() >= deadline {
                warn!(program = %program.display(), "timeout, killing process");
                child.kill()?;
                child.wait()?;
                return Ok(ProcessExit {
                    code: None,
                    timed_out: true,
                });
            }
            thread::sleep(POLL);
        }
    }
}

/// Arguments of a `ping` sending `count` echo requests to `ip`.
pub fn ping_args(ip: &str, count: u32) -> Vec<String> {
    let count_flag = if cfg!(windows) { "-n" } else { "-c" };
    vec![count_flag.to_string(), count.to_string(), ip.to_string()]
}
