//! Unit types for electrical quantities.
//!
//! Keeps volts and kilo-ohms apart at compile time in the measurement path.

use core::fmt;
use core::ops::{Div, Mul};

use serde::Deserialize;

/// Electrical potential in volts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Volts(pub f64);

impl Mul<f64> for Volts {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Volts {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for Volts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} V", self.0)
    }
}

/// Resistance in kilo-ohms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct KiloOhms(pub f64);

/// Resistor divider between a rail and a DAQ analog input.
///
/// `Vout = Vin * R2 / (R1 + R2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divider {
    /// Top resistor (rail side).
    pub r1: KiloOhms,
    /// Bottom resistor (ground side).
    pub r2: KiloOhms,
}

impl Divider {
    /// Create a divider from its two resistors.
    pub const fn new(r1: KiloOhms, r2: KiloOhms) -> Self {
        Self { r1, r2 }
    }

    /// Output over input ratio.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.r2.0 / (self.r1.0 + self.r2.0)
    }

    /// Rail voltage from the voltage seen at the DAQ input.
    #[inline]
    pub fn rail_voltage(&self, measured: Volts) -> Volts {
        measured / self.ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divider_ratio() {
        let divider = Divider::new(KiloOhms(12.0), KiloOhms(5.6));
        assert!((divider.ratio() - 5.6 / 17.6).abs() < 1e-12);
    }

    #[test]
    fn test_rail_voltage_inverts_divider() {
        let divider = Divider::new(KiloOhms(12.0), KiloOhms(5.6));
        let seen = Volts(24.0) * divider.ratio();
        assert!((divider.rail_voltage(seen).0 - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_volts_display() {
        assert_eq!(Volts(24.12345).to_string(), "24.123 V");
    }
}
