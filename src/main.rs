use std::fs::read_to_string;

use crate::error::SnapshotError;
use crate::market::MarketItem;
use crate::tui::NetworkStatus;

use clap::{arg, Command};
use colored::Colorize;
use serde::Deserialize;
use serde::Serialize;

mod color;
mod error;
mod hover;
mod layout;
mod market;
mod sectors;
mod tui;

#[derive(Serialize, Deserialize)]
struct Config {
    snapshot_file: String,
    refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_file: "/home/Joe/snapshot.json".to_string(),
            refresh_secs: 60,
        }
    }
}

fn cli() -> Command {
    Command::new("marketmap_rs")
        .about("A simple market heatmap tool")
        .author("Markus Zoppelt")
        .arg_required_else_help(true)
        .allow_external_subcommands(true)
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(
            Command::new("heatmap")
                .about("Print the market heatmap grouped by sector")
                .arg(
                    arg!(<FILE> "JSON file with your market snapshot")
                        .required(false)
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("movers")
                .about("Show the biggest movers in the snapshot")
                .arg(
                    arg!(<FILE> "JSON file with your market snapshot")
                        .required(false)
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("tui")
                .about("Open the interactive heatmap")
                .arg(
                    arg!(<FILE> "JSON file with your market snapshot")
                        .required(false)
                        .default_value(""),
                )
                .arg(
                    arg!(--tab <TAB> "Start on the given tab (heatmap or movers)")
                        .required(false),
                ),
        )
}

// returns a snapshot with the latest quotes applied to the file data
async fn create_live_snapshot(snapshot_str: String) -> (Vec<MarketItem>, NetworkStatus) {
    let items = match market::from_string(&snapshot_str) {
        Ok(items) => items,
        Err(e) => {
            eprintln!("Error parsing snapshot: {e}");
            return (Vec::new(), NetworkStatus::Disconnected);
        }
    };

    // move each item into its own refresh task
    let tasks: Vec<_> = items
        .into_iter()
        .map(|item| tokio::spawn(async move { market::handle_item(item).await }))
        .collect();

    let mut refreshed = Vec::new();
    let mut live = 0usize;
    let mut stale = 0usize;
    for result in futures::future::join_all(tasks).await {
        match result {
            Ok((item, updated)) => {
                if updated {
                    live += 1;
                } else {
                    stale += 1;
                }
                refreshed.push(item);
            }
            Err(e) => eprintln!("Error refreshing quote: {e:?}"),
        }
    }

    let network_status = if stale == 0 {
        NetworkStatus::Connected
    } else if live == 0 {
        NetworkStatus::Disconnected
    } else {
        NetworkStatus::Partial
    };
    (refreshed, network_status)
}

fn load_snapshot_str(filename: &str) -> Result<String, SnapshotError> {
    if filename.ends_with(".gpg") {
        let output = std::process::Command::new("gpg")
            .arg("-d")
            .arg(filename)
            .output()
            .map_err(|e| SnapshotError::Gpg {
                path: filename.to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(SnapshotError::Gpg {
                path: filename.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        read_to_string(filename).map_err(|e| SnapshotError::Io {
            path: filename.to_string(),
            source: e,
        })
    }
}

// Print the heatmap as colored weight bars, sector by sector
fn print_heatmap(items: &[MarketItem]) {
    if items.is_empty() {
        println!("{}", "No market data - the snapshot is empty".yellow());
        return;
    }

    let tree = sectors::aggregate(items);
    let total_weight: f64 = items.iter().map(MarketItem::get_weight).sum();

    for sector in &tree {
        let share = sector.weight / total_weight * 100.0;
        println!("{} ({share:.1}%)", sector.name.bold());
        for node in &sector.items {
            let change = node.item.get_change_percent();
            let bucket = color::bucket_for(change);
            // Bar length follows the laid-out area share within the sector.
            let bar_len = (node.rect.area() / layout::Rect::CANVAS.area() * 40.0)
                .round()
                .max(1.0) as usize;
            let bar = "█".repeat(bar_len);
            let change_str = if change.is_finite() {
                format!("{change:+.2}%")
            } else {
                "-".to_string()
            };
            // Pad before coloring; ANSI escapes would break the alignment.
            println!(
                "  {:<8} {}  {}",
                node.item.get_ticker(),
                format!("{change_str:>8}").color(bucket.ansi()),
                bar.color(bucket.ansi()),
            );
        }
    }
}

// Print the snapshot as a table, biggest absolute movers first
fn print_movers(items: &[MarketItem]) {
    use comfy_table::{
        presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement,
        Table,
    };

    if items.is_empty() {
        println!("{}", "No market data - the snapshot is empty".yellow());
        return;
    }

    let mut ranked: Vec<&MarketItem> = items.iter().collect();
    ranked.sort_by(|a, b| {
        let ka = if a.get_change_percent().is_finite() {
            a.get_change_percent().abs()
        } else {
            -1.0
        };
        let kb = if b.get_change_percent().is_finite() {
            b.get_change_percent().abs()
        } else {
            -1.0
        };
        kb.partial_cmp(&ka)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.get_ticker().cmp(b.get_ticker()))
    });

    let total_weight: f64 = items.iter().map(MarketItem::get_weight).sum();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);

    table.set_header(vec![
        Cell::new("Ticker").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Sector").add_attribute(Attribute::Bold),
        Cell::new("Price").add_attribute(Attribute::Bold),
        Cell::new("Change").add_attribute(Attribute::Bold),
        Cell::new("Weight").add_attribute(Attribute::Bold),
    ]);

    let change_cell = |change: f64| {
        let bucket = color::bucket_for(change);
        let c = if bucket == color::ColorBucket::Flat {
            TColor::White
        } else if bucket.is_gain() {
            TColor::Green
        } else {
            TColor::Red
        };
        let text = if change.is_finite() {
            format!("{change:+.2}%")
        } else {
            "-".to_string()
        };
        Cell::new(text).set_alignment(CellAlignment::Right).fg(c)
    };

    for item in &ranked {
        let weight_share = item.get_weight() / total_weight * 100.0;
        table.add_row(vec![
            Cell::new(item.get_ticker()),
            Cell::new(item.get_name()),
            Cell::new(item.get_sector().unwrap_or(sectors::OTHERS_SECTOR)),
            Cell::new(format!("{:.2}", item.get_price())).set_alignment(CellAlignment::Right),
            change_cell(item.get_change_percent()),
            Cell::new(format!("{weight_share:.1}%")).set_alignment(CellAlignment::Right),
        ]);
    }

    let market_change = market::weighted_change(items);
    table.add_row(vec![
        Cell::new("MARKET").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        change_cell(market_change).add_attribute(Attribute::Bold),
        Cell::new("100.0%").set_alignment(CellAlignment::Right),
    ]);

    let curr_time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    println!("Market movers as of {curr_time}");
    println!("{table}");
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg: Config = confy::load("marketmap", "config")?;

    let matches = cli().get_matches();

    if let Some(_matches) = matches.subcommand_matches("config") {
        println!(
            "Your config file is located here: \n{}",
            confy::get_configuration_file_path("marketmap", "config")?.display()
        );
    }

    for subcommand in ["heatmap", "movers", "tui"].iter() {
        if let Some(matches) = matches.subcommand_matches(subcommand) {
            let mut filename = String::new();

            // try to get filename as argument
            if let Ok(Some(f)) = matches.try_get_one::<String>("FILE") {
                filename = f.to_string();
            }
            // if no argument is given, try to get filename from config
            if filename.is_empty() {
                filename.clone_from(&cfg.snapshot_file);
            }
            // if no argument and no config is given, print help
            if filename.is_empty() {
                cli().print_help()?;
                return Ok(());
            }

            let snapshot_str = match load_snapshot_str(&filename) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{e}");
                    return Ok(());
                }
            };

            let (items, network_status) = create_live_snapshot(snapshot_str.clone()).await;
            if network_status == NetworkStatus::Disconnected {
                eprintln!("Warning: live quotes unavailable, showing snapshot values");
            }

            match subcommand as &str {
                "heatmap" => print_heatmap(&items),
                "movers" => print_movers(&items),
                "tui" => {
                    let tab = matches
                        .get_one::<String>("tab")
                        .and_then(|s| tui::Tab::from_str(s));
                    tui::run_tui(items, snapshot_str, cfg.refresh_secs, tab)
                        .await
                        .map_err(|e| eyre::eyre!("{e}"))?;
                }
                _ => (),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli() {
        let matches = cli().get_matches_from(vec!["marketmap_rs", "heatmap", "example_data.json"]);
        assert_eq!(matches.subcommand_name(), Some("heatmap"));
    }

    #[test]
    fn test_cli_tui_tab() {
        let matches = cli().get_matches_from(vec!["marketmap_rs", "tui", "--tab", "movers"]);
        let sub = matches.subcommand_matches("tui").unwrap();
        assert_eq!(
            sub.get_one::<String>("tab").map(String::as_str),
            Some("movers")
        );
    }

    #[test]
    fn test_load_snapshot_str_missing_file() {
        assert!(load_snapshot_str("definitely_not_here.json").is_err());
    }

    #[tokio::test]
    async fn test_create_live_snapshot_keeps_all_items() {
        // Works offline: failed quote fetches keep the snapshot values.
        let snapshot_str = std::fs::read_to_string("example_data.json").unwrap();
        let expected = market::from_string(&snapshot_str).unwrap().len();
        let (items, _network_status) = create_live_snapshot(snapshot_str).await;
        assert_eq!(items.len(), expected);
    }
}
