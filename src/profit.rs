use crate::{
    gas::CostEstimate,
    snapshot::{AuctionSnapshot, Phase},
};
use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;

/// Largest loss, in USD, accepted to finish a draw whose start was already paid for.
pub const DEFAULT_MAX_FORCE_LOSS_USD: Decimal = Decimal::from_parts(5, 0, 0, true, 0);

#[derive(Debug, Clone)]
pub struct ProfitPolicy {
    pub min_profit_threshold_usd: Decimal,
    pub max_force_loss_usd: Decimal,
    /// Only force a finish when this operator received the start-draw reward.
    pub require_sunk_cost_recipient: bool,
    pub reward_recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitResult {
    pub gross_profit_usd: Decimal,
    pub net_profit_usd: Decimal,
    pub profitable: bool,
    pub forced: bool,
    pub cost_undeterminable: bool,
}

impl ProfitResult {
    fn undeterminable(gross_profit_usd: Decimal) -> Self {
        Self {
            gross_profit_usd,
            net_profit_usd: Decimal::ZERO,
            profitable: false,
            forced: false,
            cost_undeterminable: true,
        }
    }

    pub fn should_dispatch(&self) -> bool {
        self.profitable || self.forced
    }
}

pub fn evaluate(
    snapshot: &AuctionSnapshot,
    cost: &CostEstimate,
    policy: &ProfitPolicy,
) -> Option<ProfitResult> {
    match snapshot.phase {
        Phase::None => None,
        Phase::PhaseOne => Some(evaluate_start_draw(
            snapshot.phase_one_reward_usd,
            cost,
            snapshot.rng_fee_usd(),
            policy,
        )),
        Phase::PhaseTwo => Some(evaluate_finish_draw(
            snapshot.phase_two_reward_usd,
            cost,
            snapshot.auction_closes_soon,
            snapshot.phase_one_recipient,
            policy,
        )),
    }
}

pub fn evaluate_start_draw(
    reward_usd: Decimal,
    cost: &CostEstimate,
    rng_fee_usd: Decimal,
    policy: &ProfitPolicy,
) -> ProfitResult {
    if cost.is_undeterminable() {
        return ProfitResult::undeterminable(reward_usd);
    }

    let net_profit_usd = reward_usd - cost.gas_cost_usd - rng_fee_usd;
    ProfitResult {
        gross_profit_usd: reward_usd,
        net_profit_usd,
        profitable: net_profit_usd > policy.min_profit_threshold_usd,
        forced: false,
        cost_undeterminable: false,
    }
}

pub fn evaluate_finish_draw(
    reward_usd: Decimal,
    cost: &CostEstimate,
    auction_closes_soon: bool,
    start_draw_recipient: Address,
    policy: &ProfitPolicy,
) -> ProfitResult {
    if cost.is_undeterminable() {
        return ProfitResult::undeterminable(reward_usd);
    }

    let net_profit_usd = reward_usd - cost.gas_cost_usd;
    let sunk_cost_is_ours =
        !policy.require_sunk_cost_recipient || start_draw_recipient == policy.reward_recipient;

    ProfitResult {
        gross_profit_usd: reward_usd,
        net_profit_usd,
        profitable: net_profit_usd > policy.min_profit_threshold_usd,
        forced: auction_closes_soon
            && sunk_cost_is_ours
            && net_profit_usd > policy.max_force_loss_usd,
        cost_undeterminable: false,
    }
}
