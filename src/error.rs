//! Error types for the bench sequencer.
//!
//! Steps never leak these to the host: at the step boundary an error becomes a
//! fatal status plus the error's text in the step report.

use core::fmt;

/// Result type alias using the crate's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for every bench operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Bench settings or test configuration problem
    Config(ConfigError),
    /// Database access or lookup problem
    Database(DatabaseError),
    /// DAQ, relay expander or printer problem
    Hardware(HardwareError),
    /// Serial link to the board under test
    Link(LinkError),
    /// Value recording precondition
    Record(RecordError),
    /// File system or subprocess I/O
    Io(String),
    /// The operator cancelled a prompt
    Cancelled(String),
    /// A check on the board failed; one message per failed item
    Failed(Vec<String>),
}

impl Error {
    /// Build a check failure carrying a single message.
    pub fn failed(message: impl Into<String>) -> Self {
        Error::Failed(vec![message.into()])
    }

    /// Messages to append to a step report, one per line.
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            Error::Failed(lines) => lines.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse the TOML bench settings
    ParseError(String),
    /// Settings file could not be read
    IoError(String),
    /// Voltage window is empty (min must be < max)
    InvalidVoltageWindow {
        /// Lower bound in volts
        min: f64,
        /// Upper bound in volts
        max: f64,
    },
    /// Divider resistors must both be > 0
    InvalidDivider {
        /// Top resistor in kilo-ohms
        r1: f64,
        /// Bottom resistor in kilo-ohms
        r2: f64,
    },
    /// Baud rate must be > 0
    InvalidBaudRate(u32),
    /// Retry attempts must be >= 1
    InvalidRetryAttempts(u32),
    /// No product list id configured
    MissingProductId,
    /// No article to attribute a ledger MAC address to
    MissingArticle,
    /// Operator must be given as "First Last"
    InvalidOperatorName(String),
    /// Requested product does not match the bench product
    ProductMismatch {
        /// Product list id given for the run
        given: String,
        /// Product list id this bench is built for
        expected: String,
    },
    /// config.json could not be written, read or parsed
    TestConfig(String),
    /// A required path is not configured
    MissingPath(&'static str),
    /// Programmer command line tool is missing
    ProgrammerNotFound(String),
    /// A file to flash or read is missing
    FileNotFound(String),
    /// MAC ledger file is malformed
    InvalidMacLedger(String),
    /// Bench context built without a required part
    MissingComponent(&'static str),
}

/// Database errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseError {
    /// No database connection on the bench context
    NotConnected,
    /// Table is not known to the backend
    UnknownTable(String),
    /// Row with this id does not exist
    RowNotFound {
        /// Table name
        table: String,
        /// Row id
        id: i64,
    },
    /// Reference data missing for this bench
    NotFound(String),
    /// Row content does not have the expected shape
    InvalidRow {
        /// Table name
        table: String,
        /// What is wrong with it
        reason: String,
    },
    /// Backend failure
    Backend(String),
}

/// Hardware errors.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// No DAQ driver supplied by the host
    DaqUnavailable,
    /// DAQ driver lists no device
    NoDaqDevice,
    /// No device of the expected model
    DaqModelNotFound(&'static str),
    /// DAQ was not brought up by initialisation
    DaqNotInitialized,
    /// Vendor driver failure
    Daq(String),
    /// Relay expander was not brought up by initialisation
    RelaysNotInitialized,
    /// I2C transfer to the relay expander failed
    I2c {
        /// 7-bit device address
        address: u8,
        /// Failure kind reported by the bus
        reason: String,
    },
    /// Label printer not configured
    PrinterNotInitialized,
    /// Label printer failure
    Printer(String),
}

/// Serial link errors.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Link is not open
    NotConnected,
    /// Port could not be opened
    Open {
        /// Port name
        port: String,
        /// Driver message
        reason: String,
    },
    /// Expected text never arrived
    Timeout {
        /// Text the read was waiting for
        expected: String,
    },
    /// Read or write failure
    Io(String),
}

/// Value recording errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// No database connection to record into
    NoDatabase,
    /// The device-under-test row has not been created yet
    NoDeviceUnderTest,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Database(e) => write!(f, "Database error: {}", e),
            Error::Hardware(e) => write!(f, "Hardware error: {}", e),
            Error::Link(e) => write!(f, "Serial link error: {}", e),
            Error::Record(e) => write!(f, "Recording error: {}", e),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Cancelled(title) => write!(f, "The operator cancelled the input ({})", title),
            Error::Failed(lines) => write!(f, "{}", lines.join("; ")),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::InvalidVoltageWindow { min, max } => {
                write!(f, "Invalid voltage window: min ({}) must be < max ({})", min, max)
            }
            ConfigError::InvalidDivider { r1, r2 } => {
                write!(f, "Invalid divider: R1 ({} kOhm) and R2 ({} kOhm) must be > 0", r1, r2)
            }
            ConfigError::InvalidBaudRate(v) => write!(f, "Invalid baud rate: {}. Must be > 0", v),
            ConfigError::InvalidRetryAttempts(v) => {
                write!(f, "Invalid retry attempts: {}. Must be >= 1", v)
            }
            ConfigError::MissingProductId => write!(f, "No product list id configured"),
            ConfigError::MissingArticle => write!(
                f,
                "No article configured, the MAC address cannot be attributed"
            ),
            ConfigError::InvalidOperatorName(name) => write!(
                f,
                "Operator '{}' must contain at least a first name and a last name",
                name
            ),
            ConfigError::ProductMismatch { given, expected } => write!(
                f,
                "Product list id ({}) does not match the bench product list id ({})",
                given, expected
            ),
            ConfigError::TestConfig(msg) => {
                write!(f, "Problem while creating/reading config.json: {}", msg)
            }
            ConfigError::MissingPath(what) => write!(f, "No path configured for {}", what),
            ConfigError::ProgrammerNotFound(path) => {
                write!(f, "STM32CubeProgrammer not found at {}", path)
            }
            ConfigError::FileNotFound(path) => write!(f, "File not found: {}", path),
            ConfigError::InvalidMacLedger(msg) => write!(f, "Invalid MAC ledger: {}", msg),
            ConfigError::MissingComponent(what) => write!(f, "Bench built without {}", what),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::NotConnected => write!(f, "database is not initialised"),
            DatabaseError::UnknownTable(table) => write!(f, "unknown table '{}'", table),
            DatabaseError::RowNotFound { table, id } => {
                write!(f, "no row {} in table '{}'", id, table)
            }
            DatabaseError::NotFound(what) => write!(f, "no {} found in the database", what),
            DatabaseError::InvalidRow { table, reason } => {
                write!(f, "invalid row in table '{}': {}", table, reason)
            }
            DatabaseError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareError::DaqUnavailable => write!(f, "no DAQ driver available"),
            HardwareError::NoDaqDevice => write!(f, "no NI device detected"),
            HardwareError::DaqModelNotFound(model) => write!(f, "no {} device detected", model),
            HardwareError::DaqNotInitialized => write!(f, "the DAQ is not initialised"),
            HardwareError::Daq(msg) => write!(f, "DAQ failure: {}", msg),
            HardwareError::RelaysNotInitialized => {
                write!(f, "the MCP23017 relay bank is not initialised")
            }
            HardwareError::I2c { address, reason } => {
                write!(f, "I2C transfer to 0x{:02X} failed: {}", address, reason)
            }
            HardwareError::PrinterNotInitialized => write!(f, "the label printer is not initialised"),
            HardwareError::Printer(msg) => write!(f, "label printer failure: {}", msg),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::NotConnected => write!(f, "the DUT serial port is not open"),
            LinkError::Open { port, reason } => {
                write!(f, "could not open port {}: {}", port, reason)
            }
            LinkError::Timeout { expected } => write!(f, "'{}' not received", expected),
            LinkError::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::NoDatabase => write!(f, "database is not initialised"),
            RecordError::NoDeviceUnderTest => {
                write!(f, "device under test row has not been created")
            }
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DatabaseError> for Error {
    fn from(e: DatabaseError) -> Self {
        Error::Database(e)
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Error::Hardware(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        Error::Record(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl std::error::Error for Error {}
impl std::error::Error for ConfigError {}
impl std::error::Error for DatabaseError {}
impl std::error::Error for HardwareError {}
impl std::error::Error for LinkError {}
impl std::error::Error for RecordError {}
