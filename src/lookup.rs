// 🔎 Lookup front door - turns free-text input into a resolver query
//
// The resolver trusts its input; this is where "  4000-0099 " becomes
// "40000099" or gets rejected before it ever reaches the table.

use crate::bin_table::{BinRecord, BinTable, PrefixBounds};
use serde::Serialize;

/// Result of a user-facing lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found { record: BinRecord },
    NotFound { query: String },
    Rejected { reason: String },
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&BinRecord> {
        match self {
            LookupOutcome::Found { record } => Some(record),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found { .. })
    }
}

/// Keep digits only, capped at `max_len` (what an input field shows while typing)
pub fn truncate_input(raw: &str, bounds: PrefixBounds) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(bounds.max_len)
        .collect()
}

/// Strip non-digits and enforce the length bounds
pub fn normalize_query(raw: &str, bounds: PrefixBounds) -> Result<String, String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if !bounds.contains(digits.len()) {
        return Err(format!(
            "Please enter a valid BIN ({}-{} digits)",
            bounds.min_len, bounds.max_len
        ));
    }

    Ok(digits)
}

/// Normalize then resolve against `table`
pub fn lookup(table: &BinTable, raw: &str) -> LookupOutcome {
    match normalize_query(raw, table.bounds()) {
        Ok(query) => match table.resolve(&query) {
            Some(record) => LookupOutcome::Found { record },
            None => LookupOutcome::NotFound { query },
        },
        Err(reason) => LookupOutcome::Rejected { reason },
    }
}
