// This code is part of the fscc-core project.
//
// (C) Copyright the fscc-core authors 2026.
//
// This code is licensed under the GNU Lesser General Public License,
// version 3 or later. You may obtain a copy of this license in the
// LICENSE.txt file in the root directory of this source tree or at
// https://www.gnu.org/licenses/lgpl-3.0.html.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

//! Configuration record (§3.7, §6.3): the recognised TOML surface,
//! deserialised once at startup into an immutable, validated `Config`.
//! Unknown keys and out-of-range enumerations are rejected as
//! configuration errors rather than silently ignored, via serde's
//! `deny_unknown_fields`.

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::tensor::diveps::ShiftType;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Arithmetic {
    Real,
    Complex,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compression {
    None,
    Lz4,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpenmpAlgorithm {
    External,
    Internal,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrintLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct Sector {
    pub h: usize,
    pub p: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ActiveSpaceSpec {
    ByEnergy { emin: f64, emax: f64 },
    Total { nacth: usize, nactp: usize },
    PerIrrep { counts: Vec<(String, usize, usize)> },
    PerSpinor { active: Vec<bool> },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum OccupationSpec {
    PerIrrep { occupied: Vec<(String, usize)> },
    PerSpinor { occupied: Vec<bool> },
}

fn default_shift_type() -> ShiftTypeConfig {
    ShiftTypeConfig::None
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShiftTypeConfig {
    None,
    Real,
    Realimag,
    Imag,
    Taylor,
}

impl From<ShiftTypeConfig> for ShiftType {
    fn from(value: ShiftTypeConfig) -> Self {
        match value {
            ShiftTypeConfig::None => ShiftType::None,
            ShiftTypeConfig::Real => ShiftType::Real,
            ShiftTypeConfig::Realimag => ShiftType::RealImag,
            ShiftTypeConfig::Imag => ShiftType::Imag,
            ShiftTypeConfig::Taylor => ShiftType::Taylor,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShiftConfigRecord {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_shift_type")]
    pub shift_type: ShiftTypeConfig,
    #[serde(default)]
    pub power: u32,
    #[serde(default)]
    pub level_values: Vec<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ShiftFormulaConfig {
    Line,
    Box_,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IhImmsBlock {
    pub target_sectors: Vec<Sector>,
    pub subspace_counts: Vec<usize>,
    pub main_signatures: Vec<Vec<usize>>,
    #[serde(default)]
    pub frontier_explicit: Option<f64>,
    #[serde(default = "default_auto_epsilon")]
    pub auto_epsilon: f64,
    pub formula: ShiftFormulaConfig,
    pub scale: f64,
}

fn default_auto_epsilon() -> f64 {
    1e-8
}

fn default_tile_size() -> usize {
    100
}

fn default_disk_usage_level() -> u8 {
    0
}

fn default_compression() -> Compression {
    Compression::None
}

fn default_nthreads() -> usize {
    1
}

fn default_openmp_algorithm() -> OpenmpAlgorithm {
    OpenmpAlgorithm::External
}

fn default_hermitise() -> bool {
    false
}

fn default_degen_thresh() -> f64 {
    1e-6
}

fn default_nroots() -> usize {
    usize::MAX
}

/// The fully validated configuration record consumed once at startup
/// (§3.7): every field of §6.3 plus defaults for the optional ones.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub arithmetic: Arithmetic,
    #[serde(default = "default_tile_size")]
    pub tile_size: usize,
    #[serde(default = "default_disk_usage_level")]
    pub disk_usage_level: u8,
    #[serde(default = "default_compression")]
    pub compression: Compression,
    #[serde(default = "default_nthreads")]
    pub nthreads: usize,
    #[serde(default = "default_openmp_algorithm")]
    pub openmp_algorithm: OpenmpAlgorithm,
    pub target_sector: Sector,
    pub active_space_spec: ActiveSpaceSpec,
    pub occupation_spec: OccupationSpec,
    #[serde(default)]
    pub shift: ShiftConfigRecord,
    #[serde(default)]
    pub ih_imms: Option<IhImmsBlock>,
    #[serde(default = "default_hermitise")]
    pub hermitise_model_vectors: bool,
    #[serde(default)]
    pub print_level: PrintLevel,
    #[serde(default = "default_degen_thresh")]
    pub degen_thresh: f64,
    #[serde(default)]
    pub nroots_per_irrep: std::collections::HashMap<String, usize>,
    #[serde(default = "default_nroots")]
    pub nroots_default: usize,
    #[serde(default)]
    pub roots_energy_cutoff: Option<f64>,
}

impl Default for ShiftConfigRecord {
    fn default() -> Self {
        ShiftConfigRecord {
            enabled: false,
            shift_type: ShiftTypeConfig::None,
            power: 0,
            level_values: Vec::new(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document against the recognised
    /// surface of §6.3. An unrecognised key anywhere in the document,
    /// or an enumeration value outside its recognised set, is a
    /// configuration error raised before any diagram is touched
    /// (testable scenario 7).
    pub fn from_toml_str(text: &str) -> EngineResult<Config> {
        let cfg: Config = toml::from_str(text).map_err(|e| {
            EngineError::configuration("Config::from_toml_str", format!("malformed configuration: {e}"))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.tile_size == 0 {
            return Err(EngineError::configuration(
                "Config::validate",
                "tile_size must be positive",
            ));
        }
        if self.disk_usage_level > 4 {
            return Err(EngineError::configuration(
                "Config::validate",
                format!("disk_usage_level must be in 0..4, got {}", self.disk_usage_level),
            ));
        }
        if self.nthreads == 0 {
            return Err(EngineError::configuration(
                "Config::validate",
                "nthreads must be positive",
            ));
        }
        if self.degen_thresh < 0.0 {
            return Err(EngineError::configuration(
                "Config::validate",
                "degen_thresh must be non-negative",
            ));
        }
        if let Some(cutoff) = self.roots_energy_cutoff {
            if !cutoff.is_finite() {
                return Err(EngineError::configuration(
                    "Config::validate",
                    "roots_energy_cutoff must be finite",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        arithmetic = "real"
        target_sector = { h = 0, p = 1 }
        active_space_spec = { type = "total", nacth = 0, nactp = 2 }
        occupation_spec = { type = "per_spinor", occupied = [true, false] }
        "#
    }

    #[test]
    fn minimal_record_parses_with_defaults() {
        let cfg = Config::from_toml_str(minimal_toml()).unwrap();
        assert_eq!(cfg.arithmetic, Arithmetic::Real);
        assert_eq!(cfg.disk_usage_level, 0);
        assert_eq!(cfg.compression, Compression::None);
        assert!(!cfg.hermitise_model_vectors);
        assert_eq!(cfg.degen_thresh, 1e-6);
        assert_eq!(cfg.print_level, PrintLevel::Normal);
    }

    #[test]
    fn unknown_key_is_a_configuration_error() {
        let text = format!("{}\nbogus_key = 42\n", minimal_toml());
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn unrecognised_shift_type_is_a_configuration_error() {
        let text = format!(
            "{}\n[shift]\nenabled = true\nshift_type = \"not_a_real_shift\"\n",
            minimal_toml()
        );
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn out_of_range_disk_usage_level_is_rejected() {
        let text = format!("{}\ndisk_usage_level = 9\n", minimal_toml());
        assert!(Config::from_toml_str(&text).is_err());
    }
}
