use serde::Deserialize;
use yahoo_finance_api as yahoo;

use crate::error::SnapshotError;

/// One ticker in a market snapshot.
///
/// `weight` is any positive scalar proportional to the on-screen area the
/// ticker should get (market cap in the bundled data). Items without a
/// sector are grouped under "Others" by the aggregator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketItem {
    ticker: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sector: Option<String>,
    weight: f64,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    change_percent: f64,
}

impl MarketItem {
    pub fn get_ticker(&self) -> &str {
        &self.ticker
    }

    pub fn get_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ticker)
    }

    pub fn get_sector(&self) -> Option<&str> {
        self.sector.as_deref()
    }

    pub fn get_weight(&self) -> f64 {
        self.weight
    }

    pub fn get_price(&self) -> f64 {
        self.price
    }

    pub fn get_change_percent(&self) -> f64 {
        self.change_percent
    }

    fn update_quote(&mut self, price: f64, change_percent: f64) {
        self.price = price;
        self.change_percent = change_percent;
    }

    #[cfg(test)]
    pub fn for_test(ticker: &str, sector: Option<&str>, weight: f64, change_percent: f64) -> Self {
        MarketItem {
            ticker: ticker.to_string(),
            name: None,
            sector: sector.map(str::to_string),
            weight,
            price: 100.0,
            change_percent,
        }
    }
}

/// Parse a snapshot from JSON and sanitize it for layout.
///
/// Items with a zero, negative or non-finite weight cannot get an area and
/// are dropped here; a bad change percentage is kept and handled by the
/// color mapper instead.
pub fn from_string(data: &str) -> Result<Vec<MarketItem>, SnapshotError> {
    let mut items = serde_json::from_str::<Vec<MarketItem>>(data)?;
    items.retain(|item| item.weight.is_finite() && item.weight > 0.0);
    Ok(items)
}

/// Weight-averaged change percentage across the snapshot, for the header.
pub fn weighted_change(items: &[MarketItem]) -> f64 {
    let mut weight_sum = 0.0;
    let mut change_sum = 0.0;
    for item in items {
        if item.change_percent.is_finite() {
            weight_sum += item.weight;
            change_sum += item.weight * item.change_percent;
        }
    }
    if weight_sum > 0.0 {
        change_sum / weight_sum
    } else {
        0.0
    }
}

// Get recent daily quotes for a ticker
async fn fetch_quote(ticker: &str) -> Result<yahoo::YResponse, yahoo::YahooError> {
    yahoo::YahooConnector::new()?
        .get_quote_range(ticker, "1d", "5d")
        .await
}

/// Refresh one item with its latest price and daily change.
///
/// Network failures leave the snapshot values in place so the tile still
/// renders; the returned flag feeds the network status indicator.
pub async fn handle_item(mut item: MarketItem) -> (MarketItem, bool) {
    let quotes = match fetch_quote(&item.ticker).await {
        Ok(response) => match response.quotes() {
            Ok(quotes) => quotes,
            Err(_) => return (item, false),
        },
        Err(_) => return (item, false),
    };

    match quotes.as_slice() {
        [] => (item, false),
        [only] => {
            let change = item.change_percent;
            item.update_quote(only.close, change);
            (item, true)
        }
        [.., prev, last] => {
            let change = if prev.close > 0.0 {
                (last.close - prev.close) / prev.close * 100.0
            } else {
                item.change_percent
            };
            item.update_quote(last.close, change);
            (item, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"[
        {"Ticker": "AAPL", "Name": "Apple Inc.", "Sector": "Technology",
         "Weight": 3000.0, "Price": 185.5, "ChangePercent": 0.68},
        {"Ticker": "XOM", "Sector": "Energy", "Weight": 450.0,
         "Price": 105.2, "ChangePercent": -1.1},
        {"Ticker": "ZZZ", "Weight": 12.0}
    ]"#;

    #[test]
    fn test_from_string_parses_pascal_case() {
        let items = from_string(SNAPSHOT).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].get_ticker(), "AAPL");
        assert_eq!(items[0].get_name(), "Apple Inc.");
        assert_eq!(items[0].get_sector(), Some("Technology"));
        assert_eq!(items[1].get_name(), "XOM");
        assert_eq!(items[2].get_sector(), None);
        assert_eq!(items[2].get_price(), 0.0);
    }

    #[test]
    fn test_from_string_drops_unusable_weights() {
        let data = r#"[
            {"Ticker": "A", "Weight": 10.0},
            {"Ticker": "B", "Weight": 0.0},
            {"Ticker": "C", "Weight": -3.0},
            {"Ticker": "D", "Weight": 5.0}
        ]"#;
        let items = from_string(data).unwrap();
        let tickers: Vec<&str> = items.iter().map(MarketItem::get_ticker).collect();
        assert_eq!(tickers, vec!["A", "D"]);
    }

    #[test]
    fn test_from_string_rejects_malformed_json() {
        assert!(from_string("not json").is_err());
    }

    #[test]
    fn test_weighted_change() {
        let items = vec![
            MarketItem::for_test("A", None, 60.0, 2.0),
            MarketItem::for_test("B", None, 40.0, -1.0),
        ];
        // (60*2 - 40*1) / 100 = 0.8
        assert!((weighted_change(&items) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_change_skips_non_finite() {
        let items = vec![
            MarketItem::for_test("A", None, 60.0, 2.0),
            MarketItem::for_test("B", None, 40.0, f64::NAN),
        ];
        assert!((weighted_change(&items) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_change_empty_is_zero() {
        assert_eq!(weighted_change(&[]), 0.0);
    }
}
