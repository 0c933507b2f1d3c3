use crate::{error::CycleError, usd};
use alloy::primitives::{Address, I256, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Which side of the draw auction is actionable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    None,
    PhaseOne,
    PhaseTwo,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::None => write!(f, "None"),
            Phase::PhaseOne => write!(f, "StartDraw"),
            Phase::PhaseTwo => write!(f, "FinishDraw"),
        }
    }
}

pub fn classify(phase_one_eligible: bool, phase_two_eligible: bool) -> Phase {
    if phase_one_eligible {
        Phase::PhaseOne
    } else if phase_two_eligible {
        Phase::PhaseTwo
    } else {
        Phase::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardToken {
    pub symbol: String,
    pub decimals: u8,
    pub rate_usd: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RngFee {
    pub amount: U256,
    pub amount_usd: Decimal,
}

#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub reward_token: Address,
    pub reward_symbol: String,
    pub reward_decimals: u8,
    pub reward_feed_decimals: u8,
    pub native_decimals: u8,
    pub native_feed_decimals: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotPolicy {
    pub closes_soon_secs: u64,
    pub max_feed_age_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ChainReads {
    pub can_start_draw: bool,
    pub start_draw_reward: U256,
    pub can_finish_draw: bool,
    pub finish_draw_reward: U256,
    pub auction_duration: u64,
    pub last_start_draw_closed_at: u64,
    pub last_start_draw_recipient: Address,
    pub draw_id_to_award: u64,
    pub first_draw_opens_at: u64,
    pub draw_period_seconds: u64,
    pub native_answer: I256,
    pub native_updated_at: u64,
    pub reward_answer: I256,
    pub reward_updated_at: u64,
    pub block_timestamp: u64,
    pub rng_fee: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionSnapshot {
    pub native_token_rate_usd: Decimal,
    pub reward_token: RewardToken,
    pub phase_one_eligible: bool,
    pub phase_one_reward: U256,
    pub phase_one_reward_usd: Decimal,
    pub phase_two_eligible: bool,
    pub phase_two_reward: U256,
    pub phase_two_reward_usd: Decimal,
    /// `None` when the randomness backend charges no fee.
    pub rng_fee: Option<RngFee>,
    pub window_closes_at: u64,
    pub auction_closes_soon: bool,
    /// Reward recipient of the most recent completed start-draw auction.
    pub phase_one_recipient: Address,
    pub block_timestamp: u64,
    pub phase: Phase,
}

impl AuctionSnapshot {
    pub fn from_reads(
        reads: ChainReads,
        tokens: &TokenMetadata,
        policy: SnapshotPolicy,
    ) -> Result<Self, CycleError> {
        let now = reads.block_timestamp;

        let native_token_rate_usd =
            feed_rate("native", reads.native_answer, tokens.native_feed_decimals)?;
        ensure_fresh("native", reads.native_updated_at, now, policy.max_feed_age_secs)?;
        let reward_rate_usd =
            feed_rate("reward", reads.reward_answer, tokens.reward_feed_decimals)?;
        ensure_fresh("reward", reads.reward_updated_at, now, policy.max_feed_age_secs)?;

        let phase_one_reward_usd = usd_value(
            "start draw reward",
            reads.start_draw_reward,
            tokens.reward_decimals,
            reward_rate_usd,
        )?;
        let phase_two_reward_usd = usd_value(
            "finish draw reward",
            reads.finish_draw_reward,
            tokens.reward_decimals,
            reward_rate_usd,
        )?;

        let rng_fee = match reads.rng_fee {
            Some(amount) => Some(RngFee {
                amount,
                amount_usd: usd_value(
                    "rng fee",
                    amount,
                    tokens.native_decimals,
                    native_token_rate_usd,
                )?,
            }),
            None => None,
        };

        let phase = classify(reads.can_start_draw, reads.can_finish_draw);

        let window_closes_at = match phase {
            Phase::PhaseTwo => reads
                .last_start_draw_closed_at
                .saturating_add(reads.auction_duration),
            Phase::PhaseOne | Phase::None => reads
                .draw_id_to_award
                .saturating_mul(reads.draw_period_seconds)
                .saturating_add(reads.first_draw_opens_at)
                .saturating_add(reads.auction_duration),
        };
        let auction_closes_soon =
            window_closes_at.saturating_sub(now) <= policy.closes_soon_secs;

        Ok(Self {
            native_token_rate_usd,
            reward_token: RewardToken {
                symbol: tokens.reward_symbol.clone(),
                decimals: tokens.reward_decimals,
                rate_usd: reward_rate_usd,
            },
            phase_one_eligible: reads.can_start_draw,
            phase_one_reward: reads.start_draw_reward,
            phase_one_reward_usd,
            phase_two_eligible: reads.can_finish_draw,
            phase_two_reward: reads.finish_draw_reward,
            phase_two_reward_usd,
            rng_fee,
            window_closes_at,
            auction_closes_soon,
            phase_one_recipient: reads.last_start_draw_recipient,
            block_timestamp: now,
            phase,
        })
    }

    pub fn rng_fee_usd(&self) -> Decimal {
        self.rng_fee.map(|fee| fee.amount_usd).unwrap_or(Decimal::ZERO)
    }

    pub fn rng_fee_amount(&self) -> U256 {
        self.rng_fee.map(|fee| fee.amount).unwrap_or(U256::ZERO)
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.window_closes_at.saturating_sub(self.block_timestamp)
    }
}

fn feed_rate(label: &str, answer: I256, decimals: u8) -> Result<Decimal, CycleError> {
    usd::feed_rate(answer, decimals).ok_or_else(|| {
        CycleError::ContextUnavailable(format!(
            "{label} price feed returned invalid answer {answer}"
        ))
    })
}

fn ensure_fresh(label: &str, updated_at: u64, now: u64, max_age: u64) -> Result<(), CycleError> {
    let age = now.saturating_sub(updated_at);
    if age > max_age {
        return Err(CycleError::ContextUnavailable(format!(
            "{label} price feed is stale ({age}s old, max {max_age}s)"
        )));
    }
    Ok(())
}

fn usd_value(
    label: &str,
    amount: U256,
    decimals: u8,
    rate: Decimal,
) -> Result<Decimal, CycleError> {
    usd::to_usd(amount, decimals, rate).ok_or_else(|| {
        CycleError::ContextUnavailable(format!("{label} {amount} overflows USD conversion"))
    })
}
