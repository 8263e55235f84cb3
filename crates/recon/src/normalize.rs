use serde::Serialize;

use crate::config::ColumnSynonyms;
use crate::value::RawTable;

/// The five fields every source is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    Code,
    FuelType,
    Quantity,
    Sector,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        Self::Date,
        Self::Code,
        Self::FuelType,
        Self::Quantity,
        Self::Sector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Code => "code",
            Self::FuelType => "fuel_type",
            Self::Quantity => "quantity",
            Self::Sector => "sector",
        }
    }

    /// Header used for this field in exported tables.
    pub fn header(&self) -> &'static str {
        match self {
            Self::Date => "DATA",
            Self::Code => "NOTA",
            Self::FuelType => "TIPO",
            Self::Quantity => "VALOR",
            Self::Sector => "SETOR",
        }
    }

    pub fn synonyms<'a>(&self, table: &'a ColumnSynonyms) -> &'a [String] {
        match self {
            Self::Date => &table.date,
            Self::Code => &table.code,
            Self::FuelType => &table.fuel_type,
            Self::Quantity => &table.quantity,
            Self::Sector => &table.sector,
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the column for one canonical field.
///
/// First pass: case-insensitive exact match, synonyms in order.
/// Second pass: first column whose name contains a synonym, synonyms in order.
pub fn guess_column(columns: &[String], synonyms: &[String]) -> Option<usize> {
    let lowered: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();

    for synonym in synonyms {
        let s = synonym.to_lowercase();
        if let Some(idx) = lowered.iter().position(|c| *c == s) {
            return Some(idx);
        }
    }

    for synonym in synonyms {
        let s = synonym.to_lowercase();
        if let Some(idx) = lowered.iter().position(|c| c.contains(&s)) {
            return Some(idx);
        }
    }

    None
}

/// Resolved column index per canonical field (`None` = synthesized as absent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub date: Option<usize>,
    pub code: Option<usize>,
    pub fuel_type: Option<usize>,
    pub quantity: Option<usize>,
    pub sector: Option<usize>,
}

impl ColumnBinding {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        match field {
            CanonicalField::Date => self.date,
            CanonicalField::Code => self.code,
            CanonicalField::FuelType => self.fuel_type,
            CanonicalField::Quantity => self.quantity,
            CanonicalField::Sector => self.sector,
        }
    }

    fn set(&mut self, field: CanonicalField, idx: Option<usize>) {
        match field {
            CanonicalField::Date => self.date = idx,
            CanonicalField::Code => self.code = idx,
            CanonicalField::FuelType => self.fuel_type = idx,
            CanonicalField::Quantity => self.quantity = idx,
            CanonicalField::Sector => self.sector = idx,
        }
    }

    /// True if column `idx` feeds any canonical field.
    pub fn is_bound(&self, idx: usize) -> bool {
        CanonicalField::ALL.iter().any(|f| self.get(*f) == Some(idx))
    }

    pub fn unbound_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }
}

/// Bind every canonical field of `table` against the synonym table.
pub fn bind_columns(label: &str, table: &RawTable, synonyms: &ColumnSynonyms) -> ColumnBinding {
    let mut binding = ColumnBinding::default();
    for field in CanonicalField::ALL {
        let idx = guess_column(&table.columns, field.synonyms(synonyms));
        match idx {
            Some(i) => log::debug!("{label}: {field} <- column '{}'", table.columns[i]),
            None => log::warn!("{label}: no column matches '{field}', treating it as absent"),
        }
        binding.set(field, idx);
    }
    binding
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let columns = cols(&["DATA", "Numero_Nota", "LITRAGEM"]);
        assert_eq!(guess_column(&columns, &cols(&["litragem"])), Some(2));
        assert_eq!(guess_column(&columns, &cols(&["numero_nota", "nota"])), Some(1));
    }

    #[test]
    fn exact_beats_substring_regardless_of_synonym_order() {
        // "nota" is an exact hit on column 1, "numero_nota" only a substring of column 0
        let columns = cols(&["numero_nota_fiscal", "nota"]);
        assert_eq!(guess_column(&columns, &cols(&["numero_nota", "nota"])), Some(1));
    }

    #[test]
    fn substring_fallback_follows_synonym_order() {
        let columns = cols(&["Qtd Litros", "Valor Total"]);
        assert_eq!(guess_column(&columns, &cols(&["litragem", "litros", "valor"])), Some(0));
    }

    #[test]
    fn no_match_is_none() {
        let columns = cols(&["a", "b"]);
        assert_eq!(guess_column(&columns, &cols(&["setor"])), None);
    }

    #[test]
    fn bind_default_synonyms() {
        let table = RawTable::new(cols(&["Data", "Numero_Nota", "Tipo_Combustivel", "Litragem", "Placa"]));
        let binding = bind_columns("A", &table, &ColumnSynonyms::default());
        assert_eq!(binding.date, Some(0));
        assert_eq!(binding.code, Some(1));
        assert_eq!(binding.fuel_type, Some(2));
        assert_eq!(binding.quantity, Some(3));
        assert_eq!(binding.sector, None);
        assert_eq!(binding.unbound_fields(), vec![CanonicalField::Sector]);
        assert!(binding.is_bound(3));
        assert!(!binding.is_bound(4));
    }
}
