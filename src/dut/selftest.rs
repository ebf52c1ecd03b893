//! Board self-test transcript.
//!
//! The board answers `TEST` with a progress line, one line per checked
//! function and a final `READY`:
//!
//! ```text
//! TEST EN COURS
//! TEST RS485 OK
//! TEST ETH NOK
//! READY
//! ```

/// Command starting the self-test.
pub const SELFTEST_COMMAND: &str = "TEST\n";

/// Marker closing the transcript.
pub const READY: &str = "READY";

const PROGRESS: &str = "TEST EN COURS";

/// Evaluated self-test answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfTestReport {
    results: Vec<String>,
    failed: Vec<String>,
    ready: bool,
}

impl SelfTestReport {
    /// Evaluate a transcript.
    ///
    /// A `TEST ...` line passes when it ends with `OK` but not `NOK`.
    /// Progress and `READY` lines carry no result; other lines are ignored.
    pub fn parse(answer: &str) -> Self {
        let mut report = Self::default();
        for line in answer.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line == READY {
                report.ready = true;
                continue;
            }
            if line == PROGRESS || !line.starts_with("TEST") {
                continue;
            }
            report.results.push(line.to_string());
            if !line_passes(line) {
                report.failed.push(line.to_string());
            }
        }
        report
    }

    /// Whether the transcript was complete and every line passed.
    pub fn passed(&self) -> bool {
        self.ready && self.failed.is_empty()
    }

    /// Whether `READY` was received.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Every result line.
    pub fn results(&self) -> &[String] {
        &self.results
    }

    /// Failed result lines.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

pub(crate) fn line_passes(line: &str) -> bool {
    line.ends_with("OK") && !line.ends_with("NOK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_ok() {
        let report = SelfTestReport::parse(
            "TEST EN COURS\r\nTEST RS485 OK\r\nTEST INPUTS OK\r\nREADY\r\n",
        );
        assert!(report.passed());
        assert_eq!(report.results().len(), 2);
    }

    #[test]
    fn test_nok_line_fails() {
        let report = SelfTestReport::parse("TEST EN COURS\nTEST ETH NOK\nTEST RS485 OK\nREADY");
        assert!(!report.passed());
        assert_eq!(report.failed(), ["TEST ETH NOK".to_string()]);
    }

    #[test]
    fn test_missing_ready_is_not_a_pass() {
        let report = SelfTestReport::parse("TEST EN COURS\nTEST RS485 OK\n");
        assert!(!report.is_ready());
        assert!(!report.passed());
        assert!(report.failed().is_empty());
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        let report = SelfTestReport::parse("boot v1.2\nTEST OUT ERR\nREADY");
        assert_eq!(report.failed(), ["TEST OUT ERR".to_string()]);
        assert_eq!(report.results().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_ok_lines_pass(names in prop::collection::vec("[A-Z0-9]{1,8}", 1..10)) {
            let mut answer = String::from("TEST EN COURS\n");
            for name in &names {
                answer.push_str(&format!("TEST {} OK\n", name));
            }
            answer.push_str("READY\n");
            prop_assert!(SelfTestReport::parse(&answer).passed());
        }

        #[test]
        fn prop_one_nok_fails(names in prop::collection::vec("[A-Z0-9]{1,8}", 1..10), bad in 0usize..10) {
            let bad = bad % names.len();
            let mut answer = String::new();
            for (i, name) in names.iter().enumerate() {
                let verdict = if i == bad { "NOK" } else { "OK" };
                answer.push_str(&format!("TEST {} {}\n", name, verdict));
            }
            answer.push_str("READY\n");
            let report = SelfTestReport::parse(&answer);
            prop_assert!(!report.passed());
            prop_assert_eq!(report.failed().len(), 1);
        }
    }
}
