//! MAC addresses as exchanged with the board console.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::selftest::line_passes;

/// Query the MAC address stored on the board.
pub const MAC_QUERY_COMMAND: &str = "TEST MAC\r";

/// Command writing `mac` into the board.
pub fn mac_write_command(mac: &MacAddress) -> String {
    format!("TEST MAC={}\n", mac)
}

/// Whether the board acknowledged a MAC write: one answer line ends in `OK`,
/// `NOK` excluded.
pub fn write_accepted(answer: &str) -> bool {
    answer.lines().map(str::trim).any(line_passes)
}

/// 48-bit MAC address, written `XX:XX:XX:XX:XX:XX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

/// Text is not a colon-separated MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacError(pub String);

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a MAC address (XX:XX:XX:XX:XX:XX)", self.0)
    }
}

impl std::error::Error for ParseMacError {}

impl MacAddress {
    /// First MAC address appearing in a board answer.
    ///
    /// Tokens are split on whitespace and `=`, so `MAC=00:80:E1:...` works.
    pub fn find_in(text: &str) -> Option<Self> {
        text.split(|c: char| c.is_whitespace() || c == '=')
            .find_map(|token| token.parse().ok())
    }
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseMacError(s.to_string());
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(error)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(error());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| error())?;
        }
        if parts.next().is_some() {
            return Err(error());
        }
        Ok(MacAddress(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_and_format() {
        let mac: MacAddress = "00:80:e1:0a:ff:01".parse().unwrap();
        assert_eq!(mac.0, [0x00, 0x80, 0xE1, 0x0A, 0xFF, 0x01]);
        assert_eq!(mac.to_string(), "00:80:E1:0A:FF:01");
    }

    #[test]
    fn test_rejects_malformed() {
        for text in ["", "00:80:E1:0A:FF", "00:80:E1:0A:FF:01:02", "0:80:E1:0A:FF:01", "00-80-E1-0A-FF-01", "+0:80:E1:0A:FF:01", "GG:80:E1:0A:FF:01"] {
            assert!(text.parse::<MacAddress>().is_err(), "{} accepted", text);
        }
    }

    #[test]
    fn test_find_in_board_answer() {
        let mac = MacAddress::find_in("TEST MAC\r\nMAC=00:80:E1:12:34:56 OK").unwrap();
        assert_eq!(mac.to_string(), "00:80:E1:12:34:56");
        assert_eq!(MacAddress::find_in("TEST MAC NOK"), None);
    }

    #[test]
    fn test_write_command() {
        let mac = MacAddress([0, 0x80, 0xE1, 1, 2, 3]);
        assert_eq!(mac_write_command(&mac), "TEST MAC=00:80:E1:01:02:03\n");
    }

    #[test]
    fn test_write_acknowledgement() {
        assert!(write_accepted("OK"));
        assert!(write_accepted("TEST MAC=00:80:E1:01:02:03\r\nOK"));
        assert!(!write_accepted("MAC NOK"));
        assert!(!write_accepted("NOK"));
        assert!(!write_accepted("ERROR"));
        assert!(!write_accepted(""));
    }

    #[test]
    fn test_serde_as_text() {
        let mac = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"AA:BB:CC:DD:EE:FF\"");
        assert_eq!(serde_json::from_str::<MacAddress>(&json).unwrap(), mac);
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(bytes in any::<[u8; 6]>()) {
            let mac = MacAddress(bytes);
            prop_assert_eq!(mac.to_string().parse::<MacAddress>(), Ok(mac));
        }

        #[test]
        fn prop_found_anywhere_in_answer(bytes in any::<[u8; 6]>(), prefix in "[A-Z ]{0,12}") {
            let mac = MacAddress(bytes);
            let answer = format!("{} MAC={}\r\n", prefix, mac);
            prop_assert_eq!(MacAddress::find_in(&answer), Some(mac));
        }
    }
}
