use crate::{
    auction::AuctionReader,
    gas::{CostEstimate, FeeQuote, GasOracle, estimate_cost},
    profit::{ProfitPolicy, ProfitResult, evaluate},
    relay::Submitter,
    snapshot::{AuctionSnapshot, Phase},
    transaction::{TxBuilder, gas_limit_for},
};
use alloy::primitives::B256;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub use_private_relay: bool,
    pub dry_run: bool,
    pub native_decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Decision {
    ContextUnavailable { error: String },
    NoAuction,
    CostUndeterminable,
    NotProfitable,
    DryRun { forced: bool },
    Dispatched { tx_hash: B256, forced: bool },
    SubmissionFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub fees: Option<FeeQuote>,
    pub snapshot: Option<AuctionSnapshot>,
    pub cost: Option<CostEstimate>,
    pub profit: Option<ProfitResult>,
    pub decision: Decision,
}

impl CycleReport {
    fn new(decision: Decision) -> Self {
        Self {
            fees: None,
            snapshot: None,
            cost: None,
            profit: None,
            decision,
        }
    }

    pub fn phase(&self) -> Phase {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.phase)
            .unwrap_or(Phase::None)
    }
}

pub struct DrawCycle<R, G, S> {
    reader: R,
    oracle: G,
    submitter: S,
    builder: TxBuilder,
    policy: ProfitPolicy,
    settings: DispatchSettings,
}

impl<R, G, S> DrawCycle<R, G, S>
where
    R: AuctionReader,
    G: GasOracle,
    S: Submitter,
{
    pub fn new(
        reader: R,
        oracle: G,
        submitter: S,
        builder: TxBuilder,
        policy: ProfitPolicy,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            reader,
            oracle,
            submitter,
            builder,
            policy,
            settings,
        }
    }

    #[instrument(skip_all)]
    pub async fn run(&self) -> CycleReport {
        let fees = match self.oracle.fee_quote().await {
            Ok(fees) => fees,
            Err(err) => {
                return CycleReport::new(Decision::ContextUnavailable {
                    error: err.to_string(),
                });
            }
        };

        let mut report = CycleReport::new(Decision::NoAuction);
        report.fees = Some(fees);

        let snapshot = match self.reader.load_snapshot(fees.gas_price).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                report.decision = Decision::ContextUnavailable {
                    error: err.to_string(),
                };
                return report;
            }
        };
        debug!(phase = %snapshot.phase, "auction classified");

        let phase = snapshot.phase;
        let (Some(candidate), Some(gas_limit)) =
            (self.builder.build_for_phase(&snapshot), gas_limit_for(phase))
        else {
            report.snapshot = Some(snapshot);
            return report;
        };

        let cost = estimate_cost(
            &self.oracle,
            &candidate,
            fees,
            snapshot.native_token_rate_usd,
            self.settings.native_decimals,
        )
        .await;

        let Some(profit) = evaluate(&snapshot, &cost, &self.policy) else {
            report.snapshot = Some(snapshot);
            return report;
        };

        report.snapshot = Some(snapshot);
        report.cost = Some(cost);
        report.profit = Some(profit.clone());

        if !profit.should_dispatch() {
            report.decision = if profit.cost_undeterminable {
                Decision::CostUndeterminable
            } else {
                Decision::NotProfitable
            };
            return report;
        }

        if self.settings.dry_run {
            report.decision = Decision::DryRun {
                forced: profit.forced,
            };
            return report;
        }

        let tx = self.builder.finalize(candidate, gas_limit, fees.gas_price);
        report.decision = match self
            .submitter
            .submit(tx, self.settings.use_private_relay)
            .await
        {
            Ok(tx_hash) => Decision::Dispatched {
                tx_hash,
                forced: profit.forced,
            },
            Err(err) => Decision::SubmissionFailed {
                error: err.to_string(),
            },
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CycleError,
        profit::DEFAULT_MAX_FORCE_LOSS_USD,
        snapshot::{RngFee, fixtures},
        transaction::{FINISH_DRAW_GAS_LIMIT, START_DRAW_GAS_LIMIT},
    };
    use alloy::{
        primitives::{Address, TxKind, U256, address},
        rpc::types::TransactionRequest,
    };
    use async_trait::async_trait;
    use eyre::eyre;
    use rust_decimal::Decimal;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    const OPERATOR: Address = address!("0x1111111111111111111111111111111111111111");
    const RNG: Address = address!("0x00000000000000000000000000000000000000e1");
    const DRAW_MANAGER: Address = address!("0x00000000000000000000000000000000000000d1");
    const TX_HASH: B256 = B256::repeat_byte(0xab);

    // 1 gwei flat, native token at $1000: 1_000_000 buffered gas units cost $1.
    const GAS_PRICE: u128 = 1_000_000_000;

    struct StubReader(Option<AuctionSnapshot>);

    #[async_trait]
    impl AuctionReader for StubReader {
        async fn load_snapshot(&self, _gas_price: u128) -> Result<AuctionSnapshot, CycleError> {
            self.0
                .clone()
                .ok_or_else(|| CycleError::ContextUnavailable("missing canStartDraw".into()))
        }
    }

    struct StubOracle {
        estimate: Option<u64>,
        calls: AtomicUsize,
    }

    impl StubOracle {
        /// Estimate that yields `usd` of gas cost once the buffer is added.
        fn costing(usd: u64) -> Self {
            Self {
                estimate: Some(usd * 1_000_000 - crate::gas::GAS_ESTIMATE_BUFFER),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                estimate: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GasOracle for StubOracle {
        async fn fee_quote(&self) -> Result<FeeQuote, CycleError> {
            Ok(FeeQuote {
                gas_price: GAS_PRICE,
                max_fee_per_gas: GAS_PRICE,
            })
        }

        async fn estimate_gas(&self, _tx: &TransactionRequest) -> eyre::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.estimate.ok_or_else(|| eyre!("execution reverted"))
        }
    }

    #[derive(Clone, Default)]
    struct StubSubmitter {
        sent: Arc<Mutex<Vec<(TransactionRequest, bool)>>>,
        reject: bool,
    }

    #[async_trait]
    impl Submitter for StubSubmitter {
        async fn submit(
            &self,
            tx: TransactionRequest,
            use_private_relay: bool,
        ) -> Result<B256, CycleError> {
            if self.reject {
                return Err(CycleError::SubmissionFailed("nonce too low".into()));
            }
            self.sent.lock().unwrap().push((tx, use_private_relay));
            Ok(TX_HASH)
        }
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            use_private_relay: true,
            dry_run: false,
            native_decimals: 18,
        }
    }

    fn cycle(
        snapshot: Option<AuctionSnapshot>,
        oracle: StubOracle,
        submitter: StubSubmitter,
        settings: DispatchSettings,
    ) -> DrawCycle<StubReader, StubOracle, StubSubmitter> {
        DrawCycle::new(
            StubReader(snapshot),
            oracle,
            submitter,
            TxBuilder::new(OPERATOR, DRAW_MANAGER, RNG, OPERATOR),
            ProfitPolicy {
                min_profit_threshold_usd: Decimal::ONE,
                max_force_loss_usd: DEFAULT_MAX_FORCE_LOSS_USD,
                require_sunk_cost_recipient: false,
                reward_recipient: OPERATOR,
            },
            settings,
        )
    }

    fn start_draw_snapshot() -> AuctionSnapshot {
        let mut snapshot = fixtures::snapshot(true, false);
        snapshot.native_token_rate_usd = Decimal::from(1000);
        snapshot.phase_one_reward_usd = Decimal::from(12);
        snapshot.rng_fee = Some(RngFee {
            amount: U256::from(2_000_000_000_000_000u64),
            amount_usd: Decimal::from(2),
        });
        snapshot
    }

    fn finish_draw_snapshot(closes_soon: bool) -> AuctionSnapshot {
        let mut snapshot = fixtures::snapshot(false, true);
        snapshot.native_token_rate_usd = Decimal::from(1000);
        snapshot.phase_two_reward_usd = Decimal::ONE;
        snapshot.auction_closes_soon = closes_soon;
        snapshot
    }

    #[tokio::test]
    async fn profitable_start_draw_is_dispatched() {
        let submitter = StubSubmitter::default();
        let cycle = cycle(
            Some(start_draw_snapshot()),
            StubOracle::costing(3),
            submitter.clone(),
            settings(),
        );

        let report = cycle.run().await;

        let profit = report.profit.as_ref().unwrap();
        assert_eq!(report.cost.as_ref().unwrap().gas_cost_usd, Decimal::from(3));
        assert_eq!(profit.net_profit_usd, Decimal::from(7));
        assert!(profit.profitable);
        assert_eq!(
            report.decision,
            Decision::Dispatched {
                tx_hash: TX_HASH,
                forced: false
            }
        );

        let sent = submitter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (tx, private) = &sent[0];
        assert!(*private);
        assert_eq!(tx.to, Some(TxKind::Call(RNG)));
        assert_eq!(tx.value, Some(U256::from(2_000_000_000_000_000u64)));
        assert_eq!(tx.gas, Some(START_DRAW_GAS_LIMIT));
        assert_eq!(tx.gas_price, Some(GAS_PRICE));
    }

    #[tokio::test]
    async fn losing_finish_draw_is_forced_near_close() {
        let submitter = StubSubmitter::default();
        let cycle = cycle(
            Some(finish_draw_snapshot(true)),
            StubOracle::costing(4),
            submitter.clone(),
            settings(),
        );

        let report = cycle.run().await;

        let profit = report.profit.as_ref().unwrap();
        assert_eq!(profit.net_profit_usd, Decimal::from(-3));
        assert!(!profit.profitable);
        assert!(profit.forced);
        assert_eq!(
            report.decision,
            Decision::Dispatched {
                tx_hash: TX_HASH,
                forced: true
            }
        );

        let sent = submitter.sent.lock().unwrap();
        assert_eq!(sent[0].0.to, Some(TxKind::Call(DRAW_MANAGER)));
        assert_eq!(sent[0].0.gas, Some(FINISH_DRAW_GAS_LIMIT));
    }

    #[tokio::test]
    async fn losing_finish_draw_waits_while_window_open() {
        let submitter = StubSubmitter::default();
        let cycle = cycle(
            Some(finish_draw_snapshot(false)),
            StubOracle::costing(4),
            submitter.clone(),
            settings(),
        );

        let report = cycle.run().await;

        assert_eq!(report.decision, Decision::NotProfitable);
        assert!(!report.profit.unwrap().forced);
        assert!(submitter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_auction_skips_estimation() {
        let oracle = StubOracle::costing(3);
        let submitter = StubSubmitter::default();
        let cycle = cycle(
            Some(fixtures::snapshot(false, false)),
            oracle,
            submitter.clone(),
            settings(),
        );

        let report = cycle.run().await;

        assert_eq!(report.decision, Decision::NoAuction);
        assert_eq!(report.phase(), Phase::None);
        assert!(report.cost.is_none());
        assert_eq!(cycle.oracle.calls.load(Ordering::SeqCst), 0);
        assert!(submitter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_context_ends_cycle_quietly() {
        let submitter = StubSubmitter::default();
        let cycle = cycle(None, StubOracle::costing(3), submitter.clone(), settings());

        let report = cycle.run().await;

        assert!(matches!(
            report.decision,
            Decision::ContextUnavailable { .. }
        ));
        assert_eq!(report.phase(), Phase::None);
        assert_eq!(cycle.oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_estimate_never_dispatches() {
        let submitter = StubSubmitter::default();
        let cycle = cycle(
            Some(start_draw_snapshot()),
            StubOracle::failing(),
            submitter.clone(),
            settings(),
        );

        let report = cycle.run().await;

        assert_eq!(report.decision, Decision::CostUndeterminable);
        assert!(submitter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_reports_without_sending() {
        let submitter = StubSubmitter::default();
        let mut settings = settings();
        settings.dry_run = true;
        let cycle = cycle(
            Some(start_draw_snapshot()),
            StubOracle::costing(3),
            submitter.clone(),
            settings,
        );

        let report = cycle.run().await;

        assert_eq!(report.decision, Decision::DryRun { forced: false });
        assert!(submitter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_is_reported() {
        let submitter = StubSubmitter {
            reject: true,
            ..StubSubmitter::default()
        };
        let cycle = cycle(
            Some(start_draw_snapshot()),
            StubOracle::costing(3),
            submitter,
            settings(),
        );

        let report = cycle.run().await;

        assert!(matches!(report.decision, Decision::SubmissionFailed { .. }));
    }

    #[tokio::test]
    async fn repeated_cycles_agree_on_unchanged_state() {
        let mut settings = settings();
        settings.dry_run = true;
        let cycle = cycle(
            Some(start_draw_snapshot()),
            StubOracle::costing(3),
            StubSubmitter::default(),
            settings,
        );

        let first = cycle.run().await;
        let second = cycle.run().await;

        assert_eq!(first, second);
        assert_eq!(first.phase(), Phase::PhaseOne);
    }
}
