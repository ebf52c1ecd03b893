//! Test configuration items (config.json stored in the database).

use serde_json::Value;

use crate::error::ConfigError;

/// One entry of config.json.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigItem {
    /// Key in config.json.
    pub key: String,
    /// File or directory path.
    pub path: String,
    /// Serial port name.
    pub port: String,
    /// Display name.
    pub name: String,
}

impl ConfigItem {
    fn from_entry(key: &str, entry: Option<&Value>) -> Self {
        let field = |name: &str| {
            entry
                .and_then(|e| e.get(name))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            key: key.to_string(),
            path: field("path"),
            port: field("port"),
            name: field("name"),
        }
    }
}

/// Every config.json entry the steps use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigItems {
    /// Directory of the STM32CubeProgrammer installation.
    pub stm32_cube_programmer: ConfigItem,
    /// MAC ledger file.
    pub mac_address_file: ConfigItem,
    /// Serial port of the board.
    pub dut: ConfigItem,
    /// Bootloader image.
    pub btl: ConfigItem,
    /// Application image.
    pub microcontroller: ConfigItem,
}

impl ConfigItems {
    /// config.json keys, in field order.
    pub const KEYS: [&'static str; 5] = [
        "STM32CubeProgrammer",
        "MAC_ADRESS_FILE",
        "PORT_COM_DUT",
        "BTL",
        "MICROCONTROLLER",
    ];

    /// Build items from a parsed config.json; missing keys give empty items.
    pub fn from_json(json: &Value) -> Self {
        let item = |key: &str| ConfigItem::from_entry(key, json.get(key));
        Self {
            stm32_cube_programmer: item(Self::KEYS[0]),
            mac_address_file: item(Self::KEYS[1]),
            dut: item(Self::KEYS[2]),
            btl: item(Self::KEYS[3]),
            microcontroller: item(Self::KEYS[4]),
        }
    }

    /// Parse config.json content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a JSON object.
    pub fn from_slice(content: &[u8]) -> Result<Self, ConfigError> {
        let json: Value =
            serde_json::from_slice(content).map_err(|e| ConfigError::TestConfig(e.to_string()))?;
        if !json.is_object() {
            return Err(ConfigError::TestConfig("config.json is not an object".into()));
        }
        Ok(Self::from_json(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let content = br#"{
            "STM32CubeProgrammer": {"path": "C:\\Program Files\\STM32CubeProgrammer\\bin"},
            "PORT_COM_DUT": {"port": "COM4", "name": "UIB"}
        }"#;
        let items = ConfigItems::from_slice(content).unwrap();
        assert_eq!(items.dut.port, "COM4");
        assert_eq!(items.dut.name, "UIB");
        assert_eq!(items.dut.key, "PORT_COM_DUT");
        assert!(items.stm32_cube_programmer.path.ends_with("bin"));
    }

    #[test]
    fn test_missing_keys_give_empty_items() {
        let items = ConfigItems::from_slice(b"{}").unwrap();
        assert_eq!(items.mac_address_file.key, "MAC_ADRESS_FILE");
        assert!(items.mac_address_file.path.is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(ConfigItems::from_slice(b"[1, 2]").is_err());
        assert!(ConfigItems::from_slice(b"not json").is_err());
    }
}
