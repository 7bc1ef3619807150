use std::collections::BTreeSet;

use crate::error::DeskError;
use crate::model::Asset;

/// Symbols marked for the next batch save. Only ever holds symbols listed in
/// the current market snapshot once [`SelectionSet::reconcile`] has run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    symbols: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        SelectionSet::default()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn toggle(&mut self, symbol: &str) {
        if !self.symbols.remove(symbol) {
            self.symbols.insert(symbol.to_string());
        }
    }

    /// Clears the set when every visible row is already selected, otherwise
    /// selects exactly the visible rows.
    pub fn toggle_all(&mut self, rows: &[&Asset]) {
        let all_selected = rows.iter().all(|asset| self.contains(&asset.symbol));
        self.symbols.clear();
        if !all_selected {
            self.symbols
                .extend(rows.iter().map(|asset| asset.symbol.clone()));
        }
    }

    /// Drops symbols the snapshot no longer lists. Returns how many went.
    pub fn reconcile(&mut self, snapshot: &[Asset]) -> usize {
        let before = self.symbols.len();
        self.symbols
            .retain(|symbol| snapshot.iter().any(|asset| &asset.symbol == symbol));
        before - self.symbols.len()
    }

    pub fn remove_all<'a>(&mut self, symbols: impl IntoIterator<Item = &'a str>) {
        for symbol in symbols {
            self.symbols.remove(symbol);
        }
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    /// Current market records for the selection, in snapshot order.
    pub fn resolve(&self, snapshot: &[Asset]) -> Result<Vec<Asset>, DeskError> {
        let batch: Vec<Asset> = snapshot
            .iter()
            .filter(|asset| self.contains(&asset.symbol))
            .cloned()
            .collect();
        if batch.is_empty() {
            return Err(DeskError::validation(
                "Select assets with Space before saving",
            ));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Category, FilterState, Snapshots, Tab, derive_rows};

    fn asset(symbol: &str, change: f64, price: f64) -> Asset {
        Asset {
            symbol: symbol.to_string(),
            price,
            change,
            volume: 0.0,
            rsi: None,
        }
    }

    fn snapshot() -> Vec<Asset> {
        vec![
            asset("BTCUSDT", 2.0, 64_000.0),
            asset("ETHUSDT", -1.0, 3_100.0),
            asset("SOLUSDT", 3.0, 150.0),
        ]
    }

    #[test]
    fn toggle_flips_membership() {
        let mut selection = SelectionSet::new();
        selection.toggle("BTCUSDT");
        assert!(selection.contains("BTCUSDT"));
        selection.toggle("BTCUSDT");
        assert!(selection.is_empty());
    }

    #[test]
    fn toggle_all_selects_only_visible_rows() {
        let market = snapshot();
        let snapshots = Snapshots {
            market: &market,
            watchlist: &[],
        };
        let filter = FilterState::new("", Category::Gainers);
        let rows = derive_rows(snapshots, &filter, Tab::Market);

        let mut selection = SelectionSet::new();
        selection.toggle("ETHUSDT");
        selection.toggle_all(&rows);

        let selected: Vec<&str> = selection.iter().collect();
        assert_eq!(selected, vec!["BTCUSDT", "SOLUSDT"]);
        for symbol in selection.iter() {
            assert!(rows.iter().any(|row| row.symbol == symbol));
        }

        selection.toggle_all(&rows);
        assert!(selection.is_empty());
    }

    #[test]
    fn toggle_all_on_empty_view_clears() {
        let mut selection = SelectionSet::new();
        selection.toggle("BTCUSDT");
        selection.toggle_all(&[]);
        assert!(selection.is_empty());
    }

    #[test]
    fn reconcile_drops_delisted_symbols() {
        let mut selection = SelectionSet::new();
        selection.toggle("BTCUSDT");
        selection.toggle("DOGEUSDT");
        let dropped = selection.reconcile(&snapshot());
        assert_eq!(dropped, 1);
        assert!(selection.contains("BTCUSDT"));
        assert!(!selection.contains("DOGEUSDT"));
    }

    #[test]
    fn resolve_uses_current_records_in_snapshot_order() {
        let mut selection = SelectionSet::new();
        selection.toggle("SOLUSDT");
        selection.toggle("BTCUSDT");
        let batch = selection.resolve(&snapshot()).expect("selection resolves");
        let symbols: Vec<&str> = batch.iter().map(|asset| asset.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "SOLUSDT"]);
        assert_eq!(batch[0].price, 64_000.0);
    }

    #[test]
    fn resolve_rejects_empty_selection() {
        let err = SelectionSet::new()
            .resolve(&snapshot())
            .expect_err("empty selection must not resolve");
        assert!(matches!(err, DeskError::Validation(_)));
    }
}
