//! Groups a flat market snapshot into the two-level sector tree the
//! renderer paints.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::layout::{layout, Rect};
use crate::market::MarketItem;

/// Bucket for items that carry no sector.
pub const OTHERS_SECTOR: &str = "Others";

/// A ticker with its assigned sub-rect, in the owning sector's local
/// 0-100 space.
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapNode {
    pub item: MarketItem,
    pub rect: Rect,
}

/// A sector with its canvas rect and its members laid out inside it.
///
/// Member rects are local to the sector: an item 50% wide inside a sector
/// covering the right 30% of the canvas renders at 15% canvas width. The
/// renderer composes the nesting.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorNode {
    pub name: String,
    pub weight: f64,
    pub rect: Rect,
    pub items: Vec<TreemapNode>,
}

/// Build the sector tree for one snapshot.
///
/// Sectors are ordered by total weight descending (ties by name), members
/// by weight descending (ties by ticker), so identical input always yields
/// identical output. An empty snapshot yields an empty tree; callers show
/// the "no data" state instead of laying out nothing.
pub fn aggregate(items: &[MarketItem]) -> Vec<SectorNode> {
    if items.is_empty() {
        return Vec::new();
    }

    let mut buckets: HashMap<&str, Vec<&MarketItem>> = HashMap::new();
    for item in items {
        buckets
            .entry(item.get_sector().unwrap_or(OTHERS_SECTOR))
            .or_default()
            .push(item);
    }

    let mut sectors: Vec<(String, f64, Vec<&MarketItem>)> = buckets
        .into_iter()
        .map(|(name, mut members)| {
            members.sort_by(|a, b| {
                b.get_weight()
                    .partial_cmp(&a.get_weight())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.get_ticker().cmp(b.get_ticker()))
            });
            let weight: f64 = members.iter().map(|m| m.get_weight()).sum();
            (name.to_string(), weight, members)
        })
        .collect();
    sectors.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let sector_weights: Vec<f64> = sectors.iter().map(|(_, weight, _)| *weight).collect();
    let sector_rects = layout(&sector_weights, Rect::CANVAS);

    sectors
        .into_iter()
        .zip(sector_rects)
        .map(|((name, weight, members), rect)| {
            let member_weights: Vec<f64> = members.iter().map(|m| m.get_weight()).collect();
            let member_rects = layout(&member_weights, Rect::CANVAS);
            let items = members
                .into_iter()
                .zip(member_rects)
                .map(|(item, rect)| TreemapNode {
                    item: item.clone(),
                    rect,
                })
                .collect();
            SectorNode {
                name,
                weight,
                rect,
                items,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Vec<MarketItem> {
        vec![
            MarketItem::for_test("AAPL", Some("Technology"), 3000.0, 0.68),
            MarketItem::for_test("MSFT", Some("Technology"), 2800.0, -0.55),
            MarketItem::for_test("XOM", Some("Energy"), 450.0, -1.1),
            MarketItem::for_test("CVX", Some("Energy"), 280.0, 0.3),
            MarketItem::for_test("O", None, 40.0, 0.29),
        ]
    }

    #[test]
    fn test_empty_snapshot_yields_empty_tree() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_sectors_ordered_by_weight_descending() {
        let tree = aggregate(&snapshot());
        let names: Vec<&str> = tree.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Technology", "Energy", "Others"]);
        assert!((tree[0].weight - 5800.0).abs() < 1e-9);
        assert!((tree[1].weight - 730.0).abs() < 1e-9);
        assert!((tree[2].weight - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_sector_goes_to_others() {
        let tree = aggregate(&snapshot());
        let others = tree.iter().find(|s| s.name == OTHERS_SECTOR).unwrap();
        assert_eq!(others.items.len(), 1);
        assert_eq!(others.items[0].item.get_ticker(), "O");
    }

    #[test]
    fn test_every_item_in_exactly_one_bucket() {
        let items = snapshot();
        let tree = aggregate(&items);
        let mut seen: Vec<&str> = tree
            .iter()
            .flat_map(|s| s.items.iter().map(|n| n.item.get_ticker()))
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["AAPL", "CVX", "MSFT", "O", "XOM"]);
        for sector in &tree {
            for node in &sector.items {
                let expected = node.item.get_sector().unwrap_or(OTHERS_SECTOR);
                assert_eq!(sector.name, expected);
            }
        }
    }

    #[test]
    fn test_members_sorted_by_weight_then_ticker() {
        let mut items = snapshot();
        items.push(MarketItem::for_test("AMD", Some("Technology"), 2800.0, 1.0));
        let tree = aggregate(&items);
        let tech = &tree[0];
        let tickers: Vec<&str> = tech.items.iter().map(|n| n.item.get_ticker()).collect();
        // AMD and MSFT tie at 2800; ticker ascending breaks the tie.
        assert_eq!(tickers, vec!["AAPL", "AMD", "MSFT"]);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let items = snapshot();
        assert_eq!(aggregate(&items), aggregate(&items));
    }

    #[test]
    fn test_input_not_mutated() {
        let items = snapshot();
        let before = items.clone();
        let _ = aggregate(&items);
        assert_eq!(items, before);
    }

    #[test]
    fn test_sector_rects_tile_canvas() {
        let tree = aggregate(&snapshot());
        let total: f64 = tree.iter().map(|s| s.rect.area()).sum();
        assert!((total - Rect::CANVAS.area()).abs() < 1e-6);
    }

    #[test]
    fn test_item_rects_tile_local_frame() {
        for sector in aggregate(&snapshot()) {
            let total: f64 = sector.items.iter().map(|n| n.rect.area()).sum();
            assert!((total - Rect::CANVAS.area()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_two_sector_end_to_end() {
        // Tech 60 vs Energy 40 on the square canvas: tie on the split axis
        // resolves vertical, so Tech takes the left 60%.
        let items = vec![
            MarketItem::for_test("AAPL", Some("Tech"), 60.0, 2.0),
            MarketItem::for_test("XOM", Some("Energy"), 40.0, -1.0),
        ];
        let tree = aggregate(&items);
        assert_eq!(tree.len(), 2);

        let tech = &tree[0];
        assert_eq!(tech.name, "Tech");
        assert_eq!(
            tech.rect,
            Rect {
                x: 0.0,
                y: 0.0,
                w: 60.0,
                h: 100.0
            }
        );
        assert_eq!(tech.items.len(), 1);
        assert_eq!(tech.items[0].rect, Rect::CANVAS);

        let energy = &tree[1];
        assert_eq!(energy.name, "Energy");
        assert_eq!(
            energy.rect,
            Rect {
                x: 60.0,
                y: 0.0,
                w: 40.0,
                h: 100.0
            }
        );
        assert_eq!(energy.items[0].rect, Rect::CANVAS);
    }

    #[test]
    fn test_single_item_snapshot() {
        let items = vec![MarketItem::for_test("AAPL", Some("Tech"), 1.0, 0.0)];
        let tree = aggregate(&items);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].rect, Rect::CANVAS);
        assert_eq!(tree[0].items[0].rect, Rect::CANVAS);
    }
}
