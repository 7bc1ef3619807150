use crate::model::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Market,
    Watchlist,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Market => "Global Market",
            Tab::Watchlist => "Watchlist",
        }
    }

    pub fn toggled(&self) -> Tab {
        match self {
            Tab::Market => Tab::Watchlist,
            Tab::Watchlist => Tab::Market,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    All,
    Gainers,
    Losers,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::All => "All Assets",
            Category::Gainers => "Top Gainers",
            Category::Losers => "Top Losers",
        }
    }

    pub fn matches(&self, change: f64) -> bool {
        match self {
            Category::All => true,
            Category::Gainers => change > 0.0,
            Category::Losers => change < 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_term: String,
    pub category: Category,
}

impl FilterState {
    pub fn new(search_term: impl Into<String>, category: Category) -> Self {
        FilterState {
            search_term: search_term.into(),
            category,
        }
    }
}

/// Market and watchlist snapshots as last confirmed by the remote service.
#[derive(Debug, Clone, Copy)]
pub struct Snapshots<'a> {
    pub market: &'a [Asset],
    pub watchlist: &'a [Asset],
}

impl<'a> Snapshots<'a> {
    pub fn for_tab(&self, tab: Tab) -> &'a [Asset] {
        match tab {
            Tab::Market => self.market,
            Tab::Watchlist => self.watchlist,
        }
    }
}

/// Rows to display for `tab`: symbol search, then category, in source order.
pub fn derive_rows<'a>(snapshots: Snapshots<'a>, filter: &FilterState, tab: Tab) -> Vec<&'a Asset> {
    let needle = filter.search_term.to_lowercase();
    snapshots
        .for_tab(tab)
        .iter()
        .filter(|asset| asset.symbol.to_lowercase().contains(&needle))
        .filter(|asset| filter.category.matches(asset.change))
        .collect()
}
