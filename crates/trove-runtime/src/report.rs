//! Text reports for account histories and scan results.

use chrono::DateTime;
use trove_history::{AccountHistory, RedemptionRecord, ScanUpdate, TroveEvent};

/// Collateral unit shown in reports.
pub const COLLATERAL_SYMBOL: &str = "CDCETH";
/// Debt unit shown in reports.
pub const DEBT_SYMBOL: &str = "USC";

const DISPLAY_PLACES: usize = 4;

/// `Mon-DD-YYYY HH:MM:SS UTC`.
pub fn format_date(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%b-%d-%Y %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{timestamp} (unix)"))
}

/// `1st`, `2nd`, `3rd`, `4th`, ..., `11th`, `12th`, `13th`, `21st`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn tx_link(explorer_tx_url: &str, hash: &str) -> String {
    format!("{}/{}", explorer_tx_url.trim_end_matches('/'), hash)
}

/// Lifecycle listing, oldest first.
pub fn render_lifecycle(events: &[TroveEvent], explorer_tx_url: &str) -> String {
    let mut lines = vec!["Trove Lifecycle".to_string()];
    if events.is_empty() {
        lines.push("  No Trove events found for this address".to_string());
    }
    for event in events {
        lines.push(format!(
            "  {} ({})",
            event.operation.label(),
            format_date(event.timestamp)
        ));
        lines.push(format!(
            "    Collateral: {} {}  Debt: {} {}",
            event.collateral.format_fixed(DISPLAY_PLACES),
            COLLATERAL_SYMBOL,
            event.debt.format_fixed(DISPLAY_PLACES),
            DEBT_SYMBOL
        ));
        lines.push(format!("    Tx: {}", tx_link(explorer_tx_url, &event.tx_hash)));
    }
    lines.join("\n")
}

/// Redemption summary with before/after state and impact.
pub fn render_redemptions(records: &[RedemptionRecord], explorer_tx_url: &str) -> String {
    let mut lines = vec!["Redemption Summary".to_string()];
    if records.is_empty() {
        lines.push("  No redemptions found".to_string());
    }

    for (i, record) in records.iter().enumerate() {
        let event = &record.event;
        lines.push(String::new());
        lines.push(format!("  {} Redemption", record.kind().label()));
        lines.push(format!("    Time: {}", format_date(event.timestamp)));
        lines.push(format!("    Tx: {}", tx_link(explorer_tx_url, &event.tx_hash)));
        if let Some(redeemer) = record.redeemer {
            lines.push(format!("    Redeemer: {redeemer}"));
        }

        let Some(previous) = &record.previous_state else {
            lines.push(format!(
                "    No previous state available (block {}, tx {})",
                event.block_number, event.tx_hash
            ));
            continue;
        };

        let which = if records.len() > 1 {
            format!("{} ", ordinal(i + 1))
        } else {
            String::new()
        };
        lines.push(format!("    State of Trove prior to {which}redemption ({}):", previous.source.label()));
        lines.push(format!(
            "      Collateral: {} {}",
            previous.collateral.format_fixed(DISPLAY_PLACES),
            COLLATERAL_SYMBOL
        ));
        lines.push(format!(
            "      Debt: {} {}",
            previous.debt.format_fixed(DISPLAY_PLACES),
            DEBT_SYMBOL
        ));
        lines.push(format!("      Tx: {}", tx_link(explorer_tx_url, &previous.tx_hash)));

        lines.push("    After Redemption:".to_string());
        lines.push(format!(
            "      Collateral: {} {}",
            event.collateral.format_fixed(DISPLAY_PLACES),
            COLLATERAL_SYMBOL
        ));
        lines.push(format!(
            "      Debt: {} {}",
            event.debt.format_fixed(DISPLAY_PLACES),
            DEBT_SYMBOL
        ));

        if let Some(impact) = record.impact() {
            lines.push("    Impact:".to_string());
            lines.push(format!(
                "      Collateral Redeemed: {} {}",
                impact.collateral_redeemed.format_fixed(DISPLAY_PLACES),
                COLLATERAL_SYMBOL
            ));
            lines.push(format!(
                "      Debt Reduced: {} {}",
                impact.debt_reduced.format_fixed(DISPLAY_PLACES),
                DEBT_SYMBOL
            ));
        }
    }
    lines.join("\n")
}

/// Full per-account report.
pub fn render_account(history: &AccountHistory, explorer_tx_url: &str) -> String {
    let mut out = format!("Account {}\n\n", history.account);
    out.push_str(&render_lifecycle(&history.lifecycle, explorer_tx_url));
    out.push_str("\n\n");
    out.push_str(&render_redemptions(&history.redemptions, explorer_tx_url));
    if history.interrupted {
        out.push_str("\n\nSearch interrupted; results are partial.");
    }
    out
}

/// One-line progress rendering.
pub fn render_update(update: &ScanUpdate) -> String {
    match update {
        ScanUpdate::TotalFound { message, .. } => message.clone(),
        ScanUpdate::Processing {
            current, total, ..
        } => format!("[{current}/{total}] processing"),
        ScanUpdate::NewEvent {
            events,
            current,
            total,
            ..
        } => format!("[{current}/{total}] {} redemptions found", events.len()),
        ScanUpdate::Complete { message, events } => {
            format!("{message}: {} redemptions", events.len())
        }
    }
}
