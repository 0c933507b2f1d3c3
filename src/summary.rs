use crate::{
    cycle::{CycleReport, Decision},
    snapshot::Phase,
};
use alloy::primitives::B256;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub no_auction: u64,
    pub context_unavailable: u64,
    pub cost_undeterminable: u64,
    pub not_profitable: u64,
    pub dry_runs: u64,
    pub dispatched: u64,
    pub forced: u64,
    pub submission_failures: u64,
    pub transactions: Vec<DispatchRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub block: u64,
    pub phase: Phase,
    pub tx_hash: B256,
    pub forced: bool,
    pub net_profit_usd: Decimal,
}

impl RunSummary {
    pub fn record(&mut self, block: u64, report: &CycleReport) {
        self.cycles += 1;
        match &report.decision {
            Decision::ContextUnavailable { .. } => self.context_unavailable += 1,
            Decision::NoAuction => self.no_auction += 1,
            Decision::CostUndeterminable => self.cost_undeterminable += 1,
            Decision::NotProfitable => self.not_profitable += 1,
            Decision::DryRun { .. } => self.dry_runs += 1,
            Decision::SubmissionFailed { .. } => self.submission_failures += 1,
            Decision::Dispatched { tx_hash, forced } => {
                self.dispatched += 1;
                if *forced {
                    self.forced += 1;
                }
                self.transactions.push(DispatchRecord {
                    block,
                    phase: report.phase(),
                    tx_hash: *tx_hash,
                    forced: *forced,
                    net_profit_usd: report
                        .profit
                        .as_ref()
                        .map(|profit| profit.net_profit_usd)
                        .unwrap_or_default(),
                });
            }
        }
    }
}
