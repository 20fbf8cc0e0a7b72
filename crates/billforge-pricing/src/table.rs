//! Static benchmark table (tier 2)

use crate::error::PricingError;
use billforge_domain::codes::base_code;
use std::collections::HashMap;
use std::path::Path;

/// Built-in reference rates, roughly Medicare-scale dollars
const BUILTIN_RATES: &[(&str, f64)] = &[
    ("99211", 24.0),
    ("99212", 57.0),
    ("99213", 92.5),
    ("99214", 131.0),
    ("99215", 184.0),
    ("99281", 22.0),
    ("99282", 45.0),
    ("99283", 78.0),
    ("99284", 134.0),
    ("99285", 196.0),
    ("99221", 105.0),
    ("99222", 140.0),
    ("99223", 208.0),
    ("99231", 41.0),
    ("99232", 75.0),
    ("99233", 108.0),
    ("99238", 76.0),
    ("80048", 8.5),
    ("80053", 10.6),
    ("80061", 13.4),
    ("82040", 4.9),
    ("82247", 5.1),
    ("82310", 5.2),
    ("82374", 4.8),
    ("82435", 4.6),
    ("82465", 4.3),
    ("82565", 5.0),
    ("82947", 3.9),
    ("83718", 8.2),
    ("84075", 5.0),
    ("84132", 4.6),
    ("84155", 3.7),
    ("84295", 4.8),
    ("84450", 5.1),
    ("84460", 5.2),
    ("84478", 5.7),
    ("84520", 3.9),
    ("85025", 7.8),
    ("36415", 3.0),
    ("71046", 31.0),
    ("73030", 33.0),
    ("73560", 34.0),
    ("73610", 35.0),
    ("73721", 225.0),
    ("70450", 110.0),
    ("93000", 17.0),
    ("96372", 15.0),
    ("20610", 64.0),
    ("12001", 98.0),
    ("10060", 126.0),
    ("29881", 540.0),
    ("27447", 1380.0),
    ("92950", 170.0),
    ("31500", 165.0),
    ("36556", 128.0),
    ("94002", 92.0),
    ("94003", 68.0),
    ("J1885", 1.2),
    ("J2405", 0.3),
];

/// Read-only code → reference rate table
#[derive(Debug, Clone)]
pub struct BenchmarkTable {
    rates: HashMap<String, f64>,
}

impl BenchmarkTable {
    /// The built-in table
    pub fn builtin() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(code, rate)| ((*code).to_string(), *rate))
                .collect(),
        }
    }

    /// An empty table (every lookup misses)
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Parse a `{"99213": 92.5, ...}` JSON object
    pub fn from_json(json: &str) -> Result<Self, PricingError> {
        let raw: HashMap<String, f64> = serde_json::from_str(json)?;
        let mut rates = HashMap::with_capacity(raw.len());
        for (code, rate) in raw {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(PricingError::InvalidRate { code, rate });
            }
            rates.insert(base_code(&code).to_string(), rate);
        }
        Ok(Self { rates })
    }

    /// Load a JSON table from disk
    pub fn load(path: &Path) -> Result<Self, PricingError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Reference rate for a code
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(base_code(code)).copied()
    }

    /// Number of codes in the table
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billforge_domain::codes;
    use std::io::Write;

    #[test]
    fn test_builtin_covers_catalogue() {
        let table = BenchmarkTable::builtin();
        for (code, _) in BUILTIN_RATES {
            assert!(codes::is_known(code), "{} not in catalogue", code);
        }
        assert_eq!(table.get("99213-25"), Some(92.5));
        assert_eq!(table.get("00000"), None);
    }

    #[test]
    fn test_from_json() {
        let table = BenchmarkTable::from_json(r#"{"99213": 100.0, "71046-26": 20}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("71046"), Some(20.0));
    }

    #[test]
    fn test_from_json_rejects_bad_rates() {
        assert!(matches!(
            BenchmarkTable::from_json(r#"{"99213": -1}"#),
            Err(PricingError::InvalidRate { .. })
        ));
        assert!(matches!(
            BenchmarkTable::from_json(r#"["99213"]"#),
            Err(PricingError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"93000": 21.0}}"#).unwrap();

        let table = BenchmarkTable::load(file.path()).unwrap();
        assert_eq!(table.get("93000"), Some(21.0));
    }
}
