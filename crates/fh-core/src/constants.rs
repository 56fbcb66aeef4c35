//! Physical constants tables used when deriving thermodynamic parameters.
//!
//! The engine accepts a named constants set in its configuration statement, so
//! the orchestrator must derive `beta` from the same table the engine will
//! use. Units follow the engine convention: energies in kJ/mol, temperatures
//! in Kelvin.

use serde::{Deserialize, Serialize};

/// Named physical constants table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConstantsTable {
    /// 2018 CODATA recommended values.
    #[default]
    Codata2018,
    /// 2014 CODATA recommended values.
    Codata2014,
    /// 2010 CODATA recommended values.
    Codata2010,
}

impl ConstantsTable {
    /// Boltzmann constant in J/K.
    pub fn boltzmann_constant(&self) -> f64 {
        match self {
            ConstantsTable::Codata2018 => 1.380_649e-23,
            ConstantsTable::Codata2014 => 1.380_648_52e-23,
            ConstantsTable::Codata2010 => 1.380_648_8e-23,
        }
    }

    /// Avogadro constant in 1/mol.
    pub fn avogadro_constant(&self) -> f64 {
        match self {
            ConstantsTable::Codata2018 => 6.022_140_76e23,
            ConstantsTable::Codata2014 => 6.022_140_857e23,
            ConstantsTable::Codata2010 => 6.022_141_29e23,
        }
    }

    /// Molar gas constant in J/(mol K).
    pub fn molar_gas_constant(&self) -> f64 {
        self.boltzmann_constant() * self.avogadro_constant()
    }

    /// Inverse temperature in mol/kJ for a temperature in Kelvin.
    pub fn beta_from_temperature(&self, kelvin: f64) -> f64 {
        1.0 / (kelvin * self.molar_gas_constant() / 1e3)
    }

    /// Identifier used in the engine's configuration statement.
    pub fn engine_name(&self) -> &'static str {
        match self {
            ConstantsTable::Codata2018 => "CODATA2018",
            ConstantsTable::Codata2014 => "CODATA2014",
            ConstantsTable::Codata2010 => "CODATA2010",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_constant_matches_published_value() {
        let r = ConstantsTable::Codata2018.molar_gas_constant();
        assert!((r - 8.314_462_618).abs() < 1e-6);
    }

    #[test]
    fn beta_at_300k_codata2010() {
        // Reference value computed from R = kB * NA for the 2010 table.
        let beta = ConstantsTable::Codata2010.beta_from_temperature(300.0);
        let r = 1.380_648_8e-23 * 6.022_141_29e23;
        assert!((beta - 1.0 / (300.0 * r / 1e3)).abs() < 1e-12);
    }

    #[test]
    fn engine_names_are_stable() {
        assert_eq!(ConstantsTable::Codata2018.engine_name(), "CODATA2018");
        assert_eq!(ConstantsTable::Codata2010.engine_name(), "CODATA2010");
    }
}
