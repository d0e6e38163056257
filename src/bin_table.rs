// 🏦 BIN Table - Issuer metadata keyed by card-number prefix
//
// Resolution is longest-prefix:
// - "400000"   → exact hit, record returned as registered
// - "40000099" → no exact hit, falls back to "4000009", then "400000"
//               and reports the queried value in `bin`
// - "123456"   → nothing at or above the floor → None

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// BIN RECORD
// ============================================================================

/// Issuer metadata for one registered prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinRecord {
    /// Registered prefix (or the full query on a fallback match)
    pub bin: String,
    pub brand: String,
    #[serde(rename = "type")]
    pub card_type: String,
    pub level: String,
    pub bank: String,
    pub country: String,
    pub currency: String,
    pub prepaid: String,
}

impl BinRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bin: &str,
        brand: &str,
        card_type: &str,
        level: &str,
        bank: &str,
        country: &str,
        currency: &str,
        prepaid: &str,
    ) -> Self {
        BinRecord {
            bin: bin.to_string(),
            brand: brand.to_string(),
            card_type: card_type.to_string(),
            level: level.to_string(),
            bank: bank.to_string(),
            country: country.to_string(),
            currency: currency.to_string(),
            prepaid: prepaid.to_string(),
        }
    }

    /// Same record reported under a different `bin`
    fn reported_as(&self, query: &str) -> BinRecord {
        BinRecord {
            bin: query.to_string(),
            ..self.clone()
        }
    }
}

// ============================================================================
// PREFIX BOUNDS
// ============================================================================

/// Allowed key/query lengths, 6..=8 unless configured otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl PrefixBounds {
    pub fn new(min_len: usize, max_len: usize) -> Result<Self> {
        let bounds = PrefixBounds { min_len, max_len };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_len == 0 {
            bail!("prefix min_len must be at least 1");
        }
        if self.min_len > self.max_len {
            bail!(
                "prefix min_len ({}) is greater than max_len ({})",
                self.min_len,
                self.max_len
            );
        }
        Ok(())
    }

    pub fn contains(&self, len: usize) -> bool {
        len >= self.min_len && len <= self.max_len
    }
}

impl Default for PrefixBounds {
    fn default() -> Self {
        PrefixBounds { min_len: 6, max_len: 8 }
    }
}

// ============================================================================
// BIN TABLE
// ============================================================================

fn default_bins() -> [BinRecord; 6] {
    [
        BinRecord::new("400000", "Visa", "Debit", "Classic", "Chase Bank", "United States", "USD", "No"),
        BinRecord::new("424242", "Visa", "Credit", "Classic", "Test Bank", "United States", "USD", "No"),
        BinRecord::new("510000", "Mastercard", "Credit", "Standard", "Bank of America", "United States", "USD", "No"),
        BinRecord::new("340000", "American Express", "Credit", "Gold", "American Express", "United States", "USD", "No"),
        BinRecord::new("450000", "Visa", "Credit", "Platinum", "Wells Fargo", "United States", "USD", "Yes"),
        BinRecord::new("520000", "Mastercard", "Debit", "World", "Citibank", "United States", "USD", "No"),
    ]
}

/// Prefix → record mapping. Read-only once handed to the resolver.
#[derive(Debug, Clone)]
pub struct BinTable {
    records: HashMap<String, BinRecord>,
    bounds: PrefixBounds,
}

impl BinTable {
    /// Empty table with default 6..=8 bounds
    pub fn new() -> Self {
        Self::with_bounds(PrefixBounds::default())
    }

    pub fn with_bounds(bounds: PrefixBounds) -> Self {
        BinTable {
            records: HashMap::new(),
            bounds,
        }
    }

    /// Table seeded with the demonstration issuers
    pub fn seeded() -> Self {
        let mut table = BinTable::new();
        for record in default_bins() {
            table.records.insert(record.bin.clone(), record);
        }
        table
    }

    /// Seeded table under custom bounds. Fails when a seed key falls outside them.
    pub fn seeded_with_bounds(bounds: PrefixBounds) -> Result<Self> {
        bounds.validate()?;
        let mut table = BinTable::with_bounds(bounds);
        for record in default_bins() {
            table
                .insert(record)
                .context("demo BIN table does not fit the configured prefix bounds")?;
        }
        Ok(table)
    }

    /// Register a record under its own `bin` key (replaces an existing key)
    pub fn insert(&mut self, record: BinRecord) -> Result<()> {
        if !record.bin.chars().all(|c| c.is_ascii_digit()) {
            bail!("BIN key must be digits only: {:?}", record.bin);
        }
        if !self.bounds.contains(record.bin.len()) {
            bail!(
                "BIN key {:?} has length {}, expected {}..={}",
                record.bin,
                record.bin.len(),
                self.bounds.min_len,
                self.bounds.max_len
            );
        }
        self.records.insert(record.bin.clone(), record);
        Ok(())
    }

    pub fn bounds(&self) -> PrefixBounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, prefix: &str) -> Option<&BinRecord> {
        self.records.get(prefix)
    }

    /// All records, sorted by key
    pub fn all_records(&self) -> Vec<BinRecord> {
        let mut records: Vec<BinRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.bin.cmp(&b.bin));
        records
    }

    /// Longest-prefix resolution.
    ///
    /// Exact hits come back unmodified. Otherwise prefixes are tried from
    /// `query.len() - 1` down to `min_len`; the first hit is returned with
    /// `bin` overridden to the full query. Never validates `query`: anything
    /// that cannot match simply yields `None`.
    pub fn resolve(&self, query: &str) -> Option<BinRecord> {
        if let Some(record) = self.records.get(query) {
            debug!(query, "exact BIN match");
            return Some(record.clone());
        }

        // Byte slicing below needs char boundaries
        if !query.is_ascii() {
            return None;
        }

        let min = self.bounds.min_len;
        for len in (min..query.len()).rev() {
            if let Some(record) = self.records.get(&query[..len]) {
                debug!(query, prefix = &query[..len], "prefix BIN match");
                return Some(record.reported_as(query));
            }
        }

        None
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load from a CSV with a header row: bin,brand,type,level,bank,country,currency,prepaid
    pub fn from_csv<P: AsRef<Path>>(path: P, bounds: PrefixBounds) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path.as_ref())
            .with_context(|| format!("Failed to open BIN table CSV: {:?}", path.as_ref()))?;

        let mut table = BinTable::with_bounds(bounds);
        for (line, result) in rdr.deserialize().enumerate() {
            let record: BinRecord =
                result.with_context(|| format!("Failed to parse BIN row {}", line + 1))?;
            table.insert(record)?;
        }

        info!(records = table.len(), path = ?path.as_ref(), "loaded BIN table from CSV");
        Ok(table)
    }

    /// Load from a JSON array of records
    pub fn from_json_file<P: AsRef<Path>>(path: P, bounds: PrefixBounds) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read BIN table: {:?}", path.as_ref()))?;

        let records: Vec<BinRecord> =
            serde_json::from_str(&content).context("Failed to parse BIN table JSON")?;

        let mut table = BinTable::with_bounds(bounds);
        for record in records {
            table.insert(record)?;
        }

        info!(records = table.len(), path = ?path.as_ref(), "loaded BIN table from JSON");
        Ok(table)
    }

    /// Pick the loader by file extension (`.csv`, anything else is JSON)
    pub fn from_file<P: AsRef<Path>>(path: P, bounds: PrefixBounds) -> Result<Self> {
        let is_csv = path
            .as_ref()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            Self::from_csv(path, bounds)
        } else {
            Self::from_json_file(path, bounds)
        }
    }
}

impl Default for BinTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn visa_debit(bin: &str) -> BinRecord {
        BinRecord::new(bin, "Visa", "Debit", "Classic", "Chase Bank", "United States", "USD", "No")
    }

    fn table_with(bins: &[&str]) -> BinTable {
        let mut table = BinTable::new();
        for bin in bins {
            table.insert(visa_debit(bin)).unwrap();
        }
        table
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("binscope-{}-{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn test_exact_match_precedence() {
        let table = table_with(&["400000"]);
        let record = table.resolve("400000").unwrap();
        assert_eq!(record, visa_debit("400000"));
    }

    #[test]
    fn test_longest_prefix_fallback_overrides_bin() {
        let table = table_with(&["400000"]);
        let record = table.resolve("40000099").unwrap();

        assert_eq!(record.bin, "40000099");
        assert_eq!(record.brand, "Visa");
        assert_eq!(record.bank, "Chase Bank");
        // Registered record is untouched
        assert_eq!(table.get("400000").unwrap().bin, "400000");
    }

    #[test]
    fn test_longest_registered_prefix_wins() {
        let mut table = table_with(&["400000"]);
        table
            .insert(BinRecord::new("4000009", "Visa", "Credit", "Gold", "Other Bank", "Canada", "CAD", "No"))
            .unwrap();

        let record = table.resolve("40000099").unwrap();
        assert_eq!(record.bank, "Other Bank");
        assert_eq!(record.bin, "40000099");
    }

    #[test]
    fn test_no_match_below_floor() {
        let table = table_with(&["999999"]);
        assert!(table.resolve("123456").is_none());
    }

    #[test]
    fn test_prefix_shorter_than_floor_is_ignored() {
        let mut table = BinTable::with_bounds(PrefixBounds::new(5, 8).unwrap());
        table.insert(visa_debit("40000")).unwrap();

        assert!(table.resolve("4000001").is_some());

        let strict = BinTable::with_bounds(PrefixBounds::default());
        assert!(strict.resolve("4000001").is_none());
    }

    #[test]
    fn test_resolve_fails_softly() {
        let table = BinTable::seeded();
        assert!(table.resolve("").is_none());
        assert!(table.resolve("abc").is_none());
        assert!(table.resolve("4000é99").is_none());
    }

    #[test]
    fn test_seeded_table() {
        let table = BinTable::seeded();
        assert_eq!(table.len(), 6);

        let amex = table.resolve("340000").unwrap();
        assert_eq!(amex.brand, "American Express");
        assert_eq!(amex.level, "Gold");

        let prepaid = table.resolve("45000012").unwrap();
        assert_eq!(prepaid.prepaid, "Yes");
        assert_eq!(prepaid.bin, "45000012");
    }

    #[test]
    fn test_seeded_with_bounds() {
        let wide = BinTable::seeded_with_bounds(PrefixBounds::new(6, 10).unwrap()).unwrap();
        assert_eq!(wide.len(), 6);
        assert_eq!(wide.bounds(), PrefixBounds::new(6, 10).unwrap());

        let record = wide.resolve("4000001234").unwrap();
        assert_eq!(record.bank, "Chase Bank");
        assert_eq!(record.bin, "4000001234");

        // Six-digit seeds cannot live under a seven-digit floor
        assert!(BinTable::seeded_with_bounds(PrefixBounds::new(7, 8).unwrap()).is_err());
        assert!(BinTable::seeded_with_bounds(PrefixBounds { min_len: 0, max_len: 8 }).is_err());
    }

    #[test]
    fn test_insert_rejects_bad_keys() {
        let mut table = BinTable::new();
        assert!(table.insert(visa_debit("4000")).is_err());
        assert!(table.insert(visa_debit("400000123")).is_err());
        assert!(table.insert(visa_debit("40a000")).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_bounds_validation() {
        assert!(PrefixBounds::new(0, 8).is_err());
        assert!(PrefixBounds::new(9, 8).is_err());
        assert!(PrefixBounds::new(6, 6).is_ok());
    }

    #[test]
    fn test_load_csv() {
        let path = temp_path("bins.csv");
        fs::write(
            &path,
            "bin,brand,type,level,bank,country,currency,prepaid\n\
             601100,Discover,Credit,Standard,Discover Bank,United States,USD,No\n\
             35280000,JCB,Credit,Gold,JCB Co,Japan,JPY,No\n",
        )
        .unwrap();

        let table = BinTable::from_file(&path, PrefixBounds::default()).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("60110012").unwrap().brand, "Discover");
        assert_eq!(table.resolve("35280000").unwrap().card_type, "Credit");
    }

    #[test]
    fn test_load_json() {
        let path = temp_path("bins.json");
        let records = vec![visa_debit("411111")];
        fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let table = BinTable::from_file(&path, PrefixBounds::default()).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(table.all_records(), records);
    }

    #[test]
    fn test_load_missing_file() {
        let err = BinTable::from_file(temp_path("missing.json"), PrefixBounds::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to read BIN table"));
    }

    #[test]
    fn test_record_serializes_type_field() {
        let json = serde_json::to_value(visa_debit("400000")).unwrap();
        assert_eq!(json["type"], "Debit");
        assert!(json.get("card_type").is_none());
    }
}
