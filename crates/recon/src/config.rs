use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::PER_SOURCE_METRICS;
use crate::error::ReconError;
use crate::report::CONSUMPTION_COLUMNS;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Zero-pad width for codes.
    #[serde(default = "default_code_width")]
    pub code_width: usize,
    /// Reject duplicate codes within a source instead of joining their cross product.
    #[serde(default)]
    pub strict_keys: bool,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub columns: ColumnSynonyms,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub dates: DateConfig,
    #[serde(default = "default_fuel_buckets")]
    pub fuel_buckets: Vec<FuelBucket>,
}

fn default_name() -> String {
    "Auditoria de abastecimentos".into()
}

fn default_code_width() -> usize {
    4
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            code_width: default_code_width(),
            strict_keys: false,
            sources: SourcesConfig::default(),
            columns: ColumnSynonyms::default(),
            thresholds: Thresholds::default(),
            dates: DateConfig::default(),
            fuel_buckets: default_fuel_buckets(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default = "default_source_a")]
    pub a: SourceConfig,
    #[serde(default = "default_source_b")]
    pub b: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            a: default_source_a(),
            b: default_source_b(),
        }
    }
}

/// One input table. `file` and `sheet` are only consulted by loaders;
/// the engine itself works on already materialized tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub label: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

fn default_source_a() -> SourceConfig {
    SourceConfig {
        label: "POSTO".into(),
        file: "POSTO.xlsx".into(),
        sheet: None,
    }
}

fn default_source_b() -> SourceConfig {
    SourceConfig {
        label: "PMM".into(),
        file: "PMM.xlsx".into(),
        sheet: None,
    }
}

// ---------------------------------------------------------------------------
// Column synonyms
// ---------------------------------------------------------------------------

/// Acceptable header names per canonical field, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSynonyms {
    pub date: Vec<String>,
    pub code: Vec<String>,
    pub fuel_type: Vec<String>,
    pub quantity: Vec<String>,
    pub sector: Vec<String>,
}

impl Default for ColumnSynonyms {
    fn default() -> Self {
        fn list(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        Self {
            date: list(&["data", "Data"]),
            code: list(&["numero_nota", "Numero_Nota", "nota"]),
            fuel_type: list(&["tipo_combustivel", "Tipo_Combustivel", "combustivel", "Tipo"]),
            quantity: list(&["litragem", "Litragem", "litros", "Valor"]),
            sector: list(&["setor", "Setor", "departamento", "secretaria"]),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds + dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    #[serde(default = "default_outlier_percentile")]
    pub outlier_percentile: f64,
    #[serde(default = "default_type_mean_ratio")]
    pub type_mean_ratio: f64,
    #[serde(default = "default_value_rtol")]
    pub value_rtol: f64,
    #[serde(default = "default_value_atol")]
    pub value_atol: f64,
}

fn default_outlier_percentile() -> f64 {
    0.99
}

fn default_type_mean_ratio() -> f64 {
    2.0
}

fn default_value_rtol() -> f64 {
    1e-5
}

fn default_value_atol() -> f64 {
    1e-8
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            outlier_percentile: default_outlier_percentile(),
            type_mean_ratio: default_type_mean_ratio(),
            value_rtol: default_value_rtol(),
            value_atol: default_value_atol(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateConfig {
    /// Read ambiguous `05/01/2024` as 5 January instead of May 1st.
    #[serde(default)]
    pub day_first: bool,
}

// ---------------------------------------------------------------------------
// Fuel buckets
// ---------------------------------------------------------------------------

/// A named fuel category matched by case-insensitive substrings of the fuel type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuelBucket {
    pub name: String,
    pub patterns: Vec<String>,
}

impl FuelBucket {
    pub fn matches(&self, fuel_type: &str) -> bool {
        let upper = fuel_type.to_uppercase();
        self.patterns.iter().any(|p| upper.contains(&p.to_uppercase()))
    }
}

fn default_fuel_buckets() -> Vec<FuelBucket> {
    vec![
        FuelBucket {
            name: "Gasolina".into(),
            patterns: vec!["GAS".into(), "GASOLINA".into()],
        },
        FuelBucket {
            name: "Diesel".into(),
            patterns: vec!["DIE".into(), "DIESEL".into()],
        },
    ]
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.code_width == 0 {
            return Err(ReconError::ConfigValidation("code_width must be at least 1".into()));
        }

        let synonyms = [
            ("date", &self.columns.date),
            ("code", &self.columns.code),
            ("fuel_type", &self.columns.fuel_type),
            ("quantity", &self.columns.quantity),
            ("sector", &self.columns.sector),
        ];
        for (field, names) in synonyms {
            if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "columns.{field}: synonym list must be non-empty and contain no blank names"
                )));
            }
        }

        let p = self.thresholds.outlier_percentile;
        if !(p > 0.0 && p < 1.0) {
            return Err(ReconError::ConfigValidation(format!(
                "thresholds.outlier_percentile must be in (0, 1), got {p}"
            )));
        }
        let ratio = self.thresholds.type_mean_ratio;
        if !(ratio > 0.0 && ratio.is_finite()) {
            return Err(ReconError::ConfigValidation(format!(
                "thresholds.type_mean_ratio must be positive, got {ratio}"
            )));
        }
        if self.thresholds.value_rtol < 0.0 || self.thresholds.value_atol < 0.0 {
            return Err(ReconError::ConfigValidation(
                "thresholds.value_rtol / value_atol must not be negative".into(),
            ));
        }

        let mut seen = HashSet::new();
        for bucket in &self.fuel_buckets {
            if bucket.name.trim().is_empty() {
                return Err(ReconError::ConfigValidation("fuel bucket with empty name".into()));
            }
            let lower = bucket.name.trim().to_lowercase();
            let reserved = PER_SOURCE_METRICS
                .iter()
                .chain(CONSUMPTION_COLUMNS.iter())
                .any(|name| name.to_lowercase() == lower);
            if reserved {
                return Err(ReconError::ConfigValidation(format!(
                    "fuel bucket '{}' clashes with a built-in metric or column name",
                    bucket.name
                )));
            }
            if !seen.insert(bucket.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate fuel bucket '{}'",
                    bucket.name
                )));
            }
            if bucket.patterns.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "fuel bucket '{}' has no patterns",
                    bucket.name
                )));
            }
        }

        if self.sources.a.label == self.sources.b.label {
            return Err(ReconError::ConfigValidation(format!(
                "sources a and b share the label '{}'",
                self.sources.a.label
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
