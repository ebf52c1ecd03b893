//! Label printer seam.

use crate::error::HardwareError;

/// Traceability label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Text lines, top to bottom.
    pub lines: Vec<String>,
    /// QR code content.
    pub qrcode: Option<String>,
    /// Number of copies.
    pub copies: u32,
}

/// Label printer driver.
pub trait LabelPrinter {
    /// Print a label.
    fn print_label(&mut self, label: &Label) -> Result<(), HardwareError>;
}
