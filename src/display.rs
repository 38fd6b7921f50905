use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use plo_gto::cards::{Card, Suit};
use plo_gto::equity::{CategoryBreakdown, DoubleBoardStats};
use plo_gto::game_state::Action;
use plo_gto::hand_evaluator::HandCategory;
use plo_gto::solver::{InfoSetStrategy, NutabilityReport};

pub fn equity_bar(equity: f64, width: usize) -> String {
    let filled = ((equity.clamp(0.0, 1.0)) * width as f64) as usize;
    let bar: String = "\u{2588}".repeat(filled) + &"\u{2591}".repeat(width - filled);
    let pct = format!("{:.1}%", equity * 100.0);

    if equity >= 0.6 {
        format!("{} {}", bar.green(), pct)
    } else if equity >= 0.4 {
        format!("{} {}", bar.yellow(), pct)
    } else {
        format!("{} {}", bar.red(), pct)
    }
}

pub fn board_display(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "(preflop)".dimmed().to_string();
    }
    cards
        .iter()
        .map(|card| {
            let text = card.pretty();
            match card.suit() {
                Suit::Spades => text.white().to_string(),
                Suit::Hearts => text.red().to_string(),
                Suit::Diamonds => text.blue().to_string(),
                Suit::Clubs => text.green().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn styled_action(action: &Action) -> String {
    let text = action.to_string().to_uppercase();
    match action {
        Action::Bet { .. } | Action::Raise { .. } => text.red().bold().to_string(),
        Action::Call => text.green().bold().to_string(),
        Action::Fold => text.dimmed().bold().to_string(),
        Action::Check => text.yellow().bold().to_string(),
    }
}

pub fn print_section(title: &str, content: &str) {
    println!("\n{}", title.cyan().bold());
    println!("  {}", content);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

/// Per-hand equity and tie percentages, one row per hand.
pub fn equity_table(labels: &[String], equity: &[f64], ties: &[f64]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Hand"),
        Cell::new("Equity").set_alignment(CellAlignment::Right),
        Cell::new("Tie").set_alignment(CellAlignment::Right),
        Cell::new(""),
    ]);
    for ((label, eq), tie) in labels.iter().zip(equity).zip(ties) {
        table.add_row(vec![
            Cell::new(label.bold().to_string()),
            Cell::new(format!("{:.2}%", eq)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", tie)).set_alignment(CellAlignment::Right),
            Cell::new(equity_bar(eq / 100.0, 20)),
        ]);
    }
    table.to_string()
}

/// Made-hand frequencies, skipping categories that never came up.
pub fn category_table(title: &str, breakdown: &CategoryBreakdown) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new(title),
        Cell::new("Count").set_alignment(CellAlignment::Right),
        Cell::new("%").set_alignment(CellAlignment::Right),
    ]);
    for (category, pct) in breakdown.percentages().into_iter().rev() {
        let count = breakdown.count(category);
        if count == 0 {
            continue;
        }
        let name = if category == HandCategory::StraightFlush {
            category.to_string().magenta().to_string()
        } else {
            category.to_string()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", pct)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

pub fn double_board_table(labels: &[String], stats: &DoubleBoardStats) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Hand", "Scoop", "Chop both", "Top", "Bottom"]);
    for (i, label) in labels.iter().enumerate() {
        let pct = |v: &[f64]| Cell::new(format!("{:.1}%", v[i] * 100.0)).set_alignment(CellAlignment::Right);
        table.add_row(vec![
            Cell::new(label.bold().to_string()),
            pct(&stats.scoop_both),
            pct(&stats.chop_both),
            pct(&stats.split_top),
            pct(&stats.split_bottom),
        ]);
    }
    table.to_string()
}

/// The most visited information sets with their average strategy.
pub fn strategy_table(strategies: &[InfoSetStrategy], limit: usize) -> String {
    let mut rows: Vec<&InfoSetStrategy> = strategies.iter().collect();
    rows.sort_by(|a, b| b.visits.cmp(&a.visits));

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Info set", "Visits", "Strategy"]);
    for s in rows.into_iter().take(limit) {
        let mix = s
            .actions
            .iter()
            .map(|a| format!("{} {:.0}%", styled_action(&a.action), a.frequency * 100.0))
            .collect::<Vec<_>>()
            .join("  ");
        table.add_row(vec![
            Cell::new(&s.infoset),
            Cell::new(s.visits).set_alignment(CellAlignment::Right),
            Cell::new(mix),
        ]);
    }
    table.to_string()
}

pub fn report_table(report: &NutabilityReport) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Bucket", "Freq", "EV"]);
    for b in report.buckets.iter().filter(|b| b.samples > 0) {
        let ev = if b.ev >= 0.0 {
            format!("{:.2}", b.ev).green().to_string()
        } else {
            format!("{:.2}", b.ev).red().to_string()
        };
        table.add_row(vec![
            Cell::new(b.bucket.to_string()),
            Cell::new(format!("{:.1}%", b.frequency * 100.0)).set_alignment(CellAlignment::Right),
            Cell::new(ev).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}
