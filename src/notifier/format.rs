//! Alert message rendering (Telegram HTML subset)

use crate::types::{SecurityAssessment, TokenCandidate};

/// Escape the three characters Telegram's HTML mode cares about
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Render an opportunity alert for a token that passed the alert predicate
pub fn format_alert(candidate: &TokenCandidate, assessment: &SecurityAssessment) -> String {
    format!(
        "🚨 <b>New opportunity: {name} (${symbol})</b>\n\
         \n\
         <b>Mint:</b> <code>{address}</code>\n\
         <b>Creator:</b> <code>{creator}</code>\n\
         <b>Migrated:</b> {migrated}\n\
         \n\
         <b>Safety score:</b> {score}/100 ({verdict})\n\
         <b>Top holder:</b> {top:.1}%\n\
         <b>Liquidity locked:</b> {locked}\n\
         <b>Bundled:</b> {bundled}\n\
         <b>Initial liquidity:</b> {liquidity:.2} SOL\n\
         <b>Creator fee:</b> {fee:.2}%\n\
         <b>Holders:</b> {holders}\n\
         \n\
         <a href=\"https://dexscreener.com/solana/{address}\">DexScreener</a>",
        name = escape_html(&candidate.name),
        symbol = escape_html(&candidate.symbol),
        address = candidate.address,
        creator = escape_html(&candidate.creator),
        migrated = candidate.migrated_at.format("%Y-%m-%d %H:%M UTC"),
        score = assessment.safety_score,
        verdict = assessment.verdict,
        top = assessment.top_holder_pct,
        locked = yes_no(assessment.liquidity_locked),
        bundled = yes_no(assessment.bundled),
        liquidity = candidate.initial_liquidity_sol,
        fee = candidate.creator_fee_pct,
        holders = candidate.holder_count,
    )
}
