//! Plain-text rendering of snapshots and events.

use crate::config::DisplayConfig;
use crate::epoch::{EpochSnapshot, PolicyState};
use crate::scanner::{PolicyEvent, PolicyEventKind};

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

fn fixed(value: Decimal, dp: u32) -> String {
    format!("{:.*}", dp as usize, value.round_dp(dp))
}

/// Short status line, e.g. `Epoch 42 in 3h 2m`.
pub fn nickname(snapshot: &EpochSnapshot) -> String {
    format!("Epoch {} {}", snapshot.epoch, snapshot.eta)
}

/// One-line yield summary.
pub fn presence(snapshot: &EpochSnapshot, display: &DisplayConfig) -> String {
    match &snapshot.policy {
        PolicyState::Expansion(m) => match m.yield_per_share {
            Some(y) => format!("{} {} per {}", fixed(y, 4), display.cash_symbol, display.share_symbol),
            None => "Yield unavailable".to_string(),
        },
        PolicyState::Contraction(_) | PolicyState::Neutral => "No expansion".to_string(),
    }
}

/// Multi-line summary of a snapshot.
pub fn stats(snapshot: &EpochSnapshot, display: &DisplayConfig) -> String {
    let cash = &display.cash_symbol;
    let share = &display.share_symbol;

    let mut lines = vec![
        format!("Epoch {} (next {})", snapshot.epoch, snapshot.eta),
        format!("{cash} TWAP: ${}", fixed(snapshot.reference_price, 4)),
    ];
    if let Some(spot) = snapshot.spot_price {
        lines.push(format!("{cash} spot: ${}", fixed(spot, 4)));
    }
    lines.push(format!("Mode: {}", snapshot.mode()));
    lines.push(format!("Circulating {cash}: {}", fixed(snapshot.total_cash_supply, 2)));
    lines.push(format!("Boardroom {share}: {}", fixed(snapshot.boardroom_stake, 2)));

    match &snapshot.policy {
        PolicyState::Expansion(m) => {
            lines.push(format!("Expansion rate: {}%", fixed(m.expansion_rate * Decimal::ONE_HUNDRED, 2)));
            lines.push(format!("Seigniorage: {} {cash}", fixed(m.seigniorage_amount, 2)));
            lines.push(format!("To boardroom: {} {cash}", fixed(m.boardroom_amount, 2)));
            match m.yield_per_share {
                Some(y) => lines.push(format!("Per {share}: {} {cash}", fixed(y, 4))),
                None => lines.push(format!("Per {share}: unavailable (nothing staked)")),
            }
            if let Some(apr) = m.annualized_yield_per_share {
                lines.push(format!("Per {share} per year: {} {cash}", fixed(apr, 2)));
            }
        }
        PolicyState::Contraction(m) => {
            lines.push(format!("Burnable {cash}: {}", fixed(m.burnable_amount, 2)));
            if let Some(bonds) = m.outstanding_bonds {
                lines.push(format!("Outstanding bonds: {}", fixed(bonds, 2)));
            }
        }
        PolicyState::Neutral => lines.push("No supply change this epoch".to_string()),
    }

    if let Some(rewards) = &snapshot.lp_rewards {
        if rewards.started() {
            lines.push(format!(
                "LP rewards live since block {} ({} {share} total)",
                rewards.start_block,
                fixed(rewards.total_reward_amount, 0)
            ));
        } else {
            lines.push(format!(
                "LP rewards start in {} blocks ({} {share} total)",
                rewards.blocks_until_start(),
                fixed(rewards.total_reward_amount, 0)
            ));
        }
    }

    lines.join("\n")
}

/// Announcement for a detected policy execution.
pub fn event_message(event: &PolicyEvent, snapshot: &EpochSnapshot, display: &DisplayConfig) -> String {
    let when = i64::try_from(event.timestamp)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| event.timestamp.to_string());

    let headline = match &event.kind {
        PolicyEventKind::SeigniorageDistributed { seigniorage } => format!(
            "Epoch {} distributed {} {} to the boardroom",
            snapshot.epoch,
            fixed(*seigniorage, 2),
            display.cash_symbol
        ),
        PolicyEventKind::NoOpEpoch => format!("Epoch {} started with no seigniorage", snapshot.epoch),
    };

    format!(
        "{headline}\nblock {} at {when}\n\n{}",
        event.block_number,
        stats(snapshot, display)
    )
}
