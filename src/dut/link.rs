//! Serial link to the board under test.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::DutSettings;
use crate::error::LinkError;

/// Line parameters of the board console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate, 8N1.
    pub baud_rate: u32,
    /// Default response timeout.
    pub timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            timeout: Duration::from_secs(1),
        }
    }
}

impl From<&DutSettings> for LinkSettings {
    fn from(dut: &DutSettings) -> Self {
        Self {
            baud_rate: dut.baud_rate,
            timeout: Duration::from_millis(dut.timeout_ms),
        }
    }
}

/// Command/response exchange with the board.
pub trait DutLink {
    /// Send `command` as is and collect the answer.
    ///
    /// Input left unread by earlier exchanges is discarded first.
    ///
    /// With `read_until`, reading goes on until that text was received and
    /// fails with [`LinkError::Timeout`] otherwise. Without it, reading stops
    /// at the first complete line, or returns what arrived when `timeout`
    /// elapses.
    fn send_command(
        &mut self,
        command: &str,
        read_until: Option<&str>,
        timeout: Duration,
    ) -> Result<String, LinkError>;

    /// Whether the port is open.
    fn is_connected(&self) -> bool;

    /// Close the port.
    fn close(&mut self) -> Result<(), LinkError>;
}

/// Opens links by port name.
pub trait DutConnector {
    /// Open `port` with the given line parameters.
    fn open(&mut self, port: &str, settings: &LinkSettings) -> Result<Box<dyn DutLink>, LinkError>;
}

const IDLE_POLL: Duration = Duration::from_millis(5);
/// Upper bound on stale input discarded before a command.
const MAX_DRAIN: usize = 16 * 1024;

/// [`DutLink`] over any byte stream.
pub struct DutSession<P: Read + Write> {
    name: String,
    port: Option<P>,
}

impl<P: Read + Write> DutSession<P> {
    /// Wrap an already opened stream.
    pub fn new(name: impl Into<String>, port: P) -> Self {
        Self {
            name: name.into(),
            port: Some(port),
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discard whatever is already waiting on the port.
    fn drain(port: &mut P) -> Result<usize, LinkError> {
        let mut chunk = [0u8; 256];
        let mut discarded = 0;
        while discarded < MAX_DRAIN {
            match port.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => discarded += n,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
                Err(e) => return Err(LinkError::Io(e.to_string())),
            }
        }
        Ok(discarded)
    }

    fn collect(port: &mut P, read_until: Option<&str>, timeout: Duration) -> Result<String, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut received: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 256];

        loop {
            match port.read(&mut chunk) {
                Ok(0) => thread::sleep(IDLE_POLL),
                Ok(n) => received.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(LinkError::Io(e.to_string())),
            }

            let text = String::from_utf8_lossy(&received);
            let complete = match read_until {
                Some(terminator) => text.contains(terminator),
                None => text.contains('\n'),
            };
            if complete {
                return Ok(text.trim().to_string());
            }

            if Instant::now() >= deadline {
                return match read_until {
                    Some(terminator) => Err(LinkError::Timeout {
                        expected: terminator.to_string(),
                    }),
                    None => Ok(text.trim().to_string()),
                };
            }
        }
    }
}

impl<P: Read + Write> DutLink for DutSession<P> {
    fn send_command(
        &mut self,
        command: &str,
        read_until: Option<&str>,
        timeout: Duration,
    ) -> Result<String, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        let stale = Self::drain(port)?;
        if stale > 0 {
            debug!(port = %self.name, bytes = stale, "discarded stale input");
        }
        debug!(port = %self.name, command = %command.trim_end(), "sending command");

        port.write_all(command.as_bytes())
            .and_then(|_| port.flush())
            .map_err(|e| LinkError::Io(e.to_string()))?;

        let answer = Self::collect(port, read_until, timeout)?;
        trace!(port = %self.name, answer = %answer, "answer received");
        Ok(answer)
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<(), LinkError> {
        if self.port.take().is_some() {
            debug!(port = %self.name, "serial port closed");
        }
        Ok(())
    }
}

/// Opens real serial ports.
#[cfg(feature = "serial")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

#[cfg(feature = "serial")]
impl DutConnector for SerialConnector {
    fn open(&mut self, port: &str, settings: &LinkSettings) -> Result<Box<dyn DutLink>, LinkError> {
        use serialport::{DataBits, Parity, StopBits};

        let stream = serialport::new(port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            // short reads; the response deadline is handled by the session
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| LinkError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        debug!(port = port, baud = settings.baud_rate, "serial port opened");
        Ok(Box::new(DutSession::new(port, stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Stream answering each written command with the next scripted reply.
    #[derive(Default)]
    struct ScriptedPort {
        replies: VecDeque<&'static str>,
        pending: Vec<u8>,
        written: Vec<u8>,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            if let Some(reply) = self.replies.pop_front() {
                self.pending.extend_from_slice(reply.as_bytes());
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(replies: &[&'static str]) -> DutSession<ScriptedPort> {
        DutSession::new(
            "COM3",
            ScriptedPort {
                replies: replies.iter().copied().collect(),
                ..ScriptedPort::default()
            },
        )
    }

    #[test]
    fn test_read_until_terminator() {
        let mut link = session(&["TEST EN COURS\r\nTEST RS485 OK\r\nREADY\r\n"]);

        let answer = link
            .send_command("TEST\n", Some("READY"), Duration::from_millis(200))
            .unwrap();

        assert!(answer.starts_with("TEST EN COURS"));
        assert!(answer.ends_with("READY"));
    }

    #[test]
    fn test_missing_terminator_times_out() {
        let mut link = session(&["TEST EN COURS\r\n"]);

        let result = link.send_command("TEST\n", Some("READY"), Duration::from_millis(20));

        assert_eq!(
            result,
            Err(LinkError::Timeout {
                expected: "READY".into()
            })
        );
    }

    #[test]
    fn test_single_line_without_terminator() {
        let mut link = session(&["MAC=00:80:E1:12:34:56\r\n"]);

        let answer = link
            .send_command("TEST MAC\r", None, Duration::from_millis(200))
            .unwrap();

        assert_eq!(answer, "MAC=00:80:E1:12:34:56");
    }

    #[test]
    fn test_leftover_line_is_not_taken_as_answer() {
        let mut link = DutSession::new(
            "COM3",
            ScriptedPort {
                replies: VecDeque::from(["OK\r\n"]),
                pending: b"MAC=00:80:E1:12:34:56\r\n".to_vec(),
                ..ScriptedPort::default()
            },
        );

        let answer = link
            .send_command("TEST MAC=00:80:E1:00:00:02\n", None, Duration::from_millis(200))
            .unwrap();

        assert_eq!(answer, "OK");
    }

    #[test]
    fn test_silence_returns_empty_answer() {
        let mut link = session(&[]);
        let answer = link
            .send_command("TEST MAC\r", None, Duration::from_millis(10))
            .unwrap();
        assert!(answer.is_empty());
    }

    #[test]
    fn test_closed_link_refuses_commands() {
        let mut link = session(&["OK\n"]);
        link.close().unwrap();

        assert!(!link.is_connected());
        assert_eq!(
            link.send_command("TEST\n", None, Duration::from_millis(10)),
            Err(LinkError::NotConnected)
        );
    }
}
