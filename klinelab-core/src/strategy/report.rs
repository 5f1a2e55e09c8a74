//! Text rendering of quotes and decisions.
//!
//! Markdown blocks for the caller to embed in its own response. Prices are
//! rounded to cents here and nowhere else.

use std::fmt::Write;

use super::levels::round2;
use super::regime::suggested_parameters;
use super::{Action, StrategyDecision};
use crate::domain::RealTimeQuote;

/// Quote as a two-column Markdown table.
pub fn format_quote(quote: &RealTimeQuote) -> String {
    let rows = [
        ("Symbol", quote.symbol.clone()),
        ("Last price", format!("{:.2}", quote.current_price)),
        ("Bid", format!("{:.2} ({:.4})", quote.bid, quote.bid_qty)),
        ("Ask", format!("{:.2} ({:.4})", quote.ask, quote.ask_qty)),
        (
            "24h change",
            format!("{:+.2} ({:+.2}%)", quote.change_24h, quote.change_pct_24h),
        ),
        ("24h high", format!("{:.2}", quote.high_24h)),
        ("24h low", format!("{:.2}", quote.low_24h)),
        ("24h volume", format!("{:.4}", quote.volume_24h)),
        (
            "Fetched at",
            quote.fetched_at.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        ),
    ];

    let mut out = String::from("| Field | Value |\n|---|---|\n");
    for (field, value) in rows {
        let _ = writeln!(out, "| {field} | {value} |");
    }
    out
}

fn vote_label(vote: f64) -> &'static str {
    if vote > 0.0 {
        "bullish"
    } else if vote < 0.0 {
        "bearish"
    } else {
        "neutral"
    }
}

/// Full decision report.
pub fn format_decision(d: &StrategyDecision) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**Trading strategy**\n");
    let _ = writeln!(out, "- **Market regime**: {}", d.regime);
    let p = suggested_parameters(d.regime);
    let _ = writeln!(
        out,
        "- **Suggested parameters**: MA {}/{}, RSI {}, Bollinger {}",
        p.ma_short, p.ma_long, p.rsi_period, p.boll_period
    );
    let _ = writeln!(
        out,
        "- **Direction**: {} (score: {:.2})",
        d.direction, d.score
    );
    let _ = writeln!(
        out,
        "- **Signal strength**: {} (confidence: {:.0}%)",
        d.signal_strength,
        d.confidence * 100.0
    );
    let _ = writeln!(out, "\n**Recommendation**\n");
    let _ = writeln!(out, "- **Action**: {}", d.action);
    let _ = writeln!(out, "- **Position size**: {}", d.position_size_hint);
    let _ = writeln!(out, "\n**Key levels**\n");
    let _ = writeln!(
        out,
        "- **Support**: {} / {}",
        round2(d.support_1),
        round2(d.support_2)
    );
    let _ = writeln!(
        out,
        "- **Resistance**: {} / {}",
        round2(d.resistance_1),
        round2(d.resistance_2)
    );
    let _ = writeln!(out, "- **Stop-loss**: {}", round2(d.stop_loss));
    let _ = writeln!(out, "- **Take-profit**: {}", round2(d.take_profit));
    if d.level_fallback {
        let _ = writeln!(out, "- *ATR unavailable; stop/target taken from levels*");
    }
    let _ = writeln!(
        out,
        "- **Risk:reward**: 1:{}",
        round2(d.risk_reward_ratio)
    );

    let _ = writeln!(out, "\n**Indicator signals**\n");
    for (kind, vote) in &d.votes {
        let _ = writeln!(out, "- {kind}: {} ({vote:+.1})", vote_label(*vote));
    }

    let _ = writeln!(out, "\n**Weights applied**\n");
    for (kind, weight) in &d.weights {
        let _ = writeln!(out, "- {kind}: {:.0}%", weight * 100.0);
    }
    out
}

/// One-paragraph interpretation of a decision.
pub fn rationale(d: &StrategyDecision) -> String {
    let stance = match d.action {
        Action::Buy => "favour buying",
        Action::Sell => "favour selling",
        Action::HoldOrRangeTrade => "hold or trade the range",
    };
    format!(
        "The market is {regime} with a {direction} bias (score {score:.2}), so the signals \
         {stance}. Price {price} sits between support {s1} and resistance {r1}. Place the \
         stop at {stop} and the target at {target} for a 1:{rr} risk:reward, using a \
         {size} position at {strength} signal strength ({confidence:.0}% confidence).",
        regime = d.regime,
        direction = d.direction,
        score = d.score,
        price = round2(d.current_price),
        s1 = round2(d.support_1),
        r1 = round2(d.resistance_1),
        stop = round2(d.stop_loss),
        target = round2(d.take_profit),
        rr = round2(d.risk_reward_ratio),
        size = d.position_size_hint,
        strength = d.signal_strength,
        confidence = d.confidence * 100.0,
    )
}
