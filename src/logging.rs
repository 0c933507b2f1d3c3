use crate::{
    blocks::ShutdownReason,
    cycle::{CycleReport, Decision},
    summary::RunSummary,
};
use eyre::{Result, WrapErr};
use serde::Serialize;
use std::{
    fs::File,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub fn init_logging() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("draw_auction_bot=info".parse()?),
        )
        .init();
    Ok(())
}

pub fn report_cycle(block: u64, report: &CycleReport) {
    let phase = report.phase();

    if let Some(snapshot) = &report.snapshot {
        debug!(
            block,
            phase = %phase,
            native_usd = %snapshot.native_token_rate_usd,
            reward_token = %snapshot.reward_token.symbol,
            reward_usd = %snapshot.reward_token.rate_usd,
            start_draw_reward_usd = %snapshot.phase_one_reward_usd,
            finish_draw_reward_usd = %snapshot.phase_two_reward_usd,
            rng_fee_usd = %snapshot.rng_fee_usd(),
            seconds_remaining = snapshot.seconds_remaining(),
            closes_soon = snapshot.auction_closes_soon,
            "auction snapshot"
        );
    }

    if let Some(cost) = &report.cost {
        debug!(
            block,
            gas_units = cost.gas_units,
            gas_price = cost.gas_price_wei,
            max_fee_per_gas = cost.max_fee_per_gas_wei,
            base_fee_usd = %cost.base_fee_usd,
            max_fee_usd = %cost.max_fee_usd,
            avg_fee_usd = %cost.avg_fee_usd,
            "cost estimate"
        );
    }

    let (gross, net) = report
        .profit
        .as_ref()
        .map(|profit| {
            (
                profit.gross_profit_usd.to_string(),
                profit.net_profit_usd.to_string(),
            )
        })
        .unwrap_or_default();

    match &report.decision {
        Decision::ContextUnavailable { error } => {
            warn!(block, error = %error, "auction context unavailable, skipping")
        }
        Decision::NoAuction => info!(block, "no auction open"),
        Decision::CostUndeterminable => warn!(
            block,
            phase = %phase,
            gross_usd = %gross,
            "gas cost undeterminable, not dispatching"
        ),
        Decision::NotProfitable => info!(
            block,
            phase = %phase,
            gross_usd = %gross,
            net_usd = %net,
            "not profitable"
        ),
        Decision::DryRun { forced } => info!(
            block,
            phase = %phase,
            gross_usd = %gross,
            net_usd = %net,
            forced,
            "dry run, would dispatch"
        ),
        Decision::Dispatched { tx_hash, forced } => info!(
            block,
            phase = %phase,
            gross_usd = %gross,
            net_usd = %net,
            forced,
            tx = ?tx_hash,
            "transaction dispatched"
        ),
        Decision::SubmissionFailed { error } => error!(
            block,
            phase = %phase,
            net_usd = %net,
            error = %error,
            "submission failed"
        ),
    }
}

pub fn log_summary(summary: &RunSummary, reason: &ShutdownReason) {
    let message = match reason {
        ShutdownReason::Interrupted => "run summary",
        ShutdownReason::BlockStreamError => "run summary (block stream error)",
        ShutdownReason::BlockStreamEnded => "run summary (block stream ended)",
    };
    info!(
        cycles = summary.cycles,
        dispatched = summary.dispatched,
        forced = summary.forced,
        not_profitable = summary.not_profitable,
        no_auction = summary.no_auction,
        context_unavailable = summary.context_unavailable,
        cost_undeterminable = summary.cost_undeterminable,
        submission_failures = summary.submission_failures,
        dry_runs = summary.dry_runs,
        "{message}"
    );

    for record in &summary.transactions {
        info!(
            block = record.block,
            phase = %record.phase,
            tx = ?record.tx_hash,
            forced = record.forced,
            net_usd = %record.net_profit_usd,
            "dispatched"
        );
    }
}

#[derive(Serialize)]
struct PersistedSummary<'a> {
    reason: &'a ShutdownReason,
    summary: &'a RunSummary,
}

pub fn persist_summary(summary: &RunSummary, reason: &ShutdownReason) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .wrap_err("system clock is before UNIX_EPOCH")?
        .as_secs();
    let path = PathBuf::from(format!("draw-auction-summary-{timestamp}.json"));
    let mut file = File::create(&path).wrap_err("failed to create summary file")?;
    let payload = PersistedSummary { reason, summary };
    serde_json::to_writer_pretty(&mut file, &payload).wrap_err("failed to write summary file")?;
    Ok(path)
}
