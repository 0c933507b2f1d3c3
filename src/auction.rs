use crate::{
    DrawManager::DrawManagerInstance,
    ERC20::ERC20Instance,
    PriceFeed::PriceFeedInstance,
    PrizePool::PrizePoolInstance,
    Rng::RngInstance,
    config::Deployment,
    error::CycleError,
    snapshot::{AuctionSnapshot, ChainReads, SnapshotPolicy, TokenMetadata},
    validate::ChainFacts,
};
use alloy::{
    primitives::{Address, U256},
    providers::Provider,
};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngBackend {
    Witnet(Address),
    Blockhash(Address),
}

impl RngBackend {
    pub fn address(&self) -> Address {
        match self {
            RngBackend::Witnet(address) | RngBackend::Blockhash(address) => *address,
        }
    }

    pub fn charges_fee(&self) -> bool {
        matches!(self, RngBackend::Witnet(_))
    }
}

#[async_trait]
pub trait AuctionReader: Send + Sync {
    async fn load_snapshot(&self, gas_price: u128) -> Result<AuctionSnapshot, CycleError>;
}

#[derive(Debug, Clone)]
pub struct DrawAuction<P>
where
    P: Provider + Clone,
{
    pub provider: P,
    pub draw_manager: DrawManagerInstance<P>,
    pub prize_pool: PrizePoolInstance<P>,
    pub rng: RngInstance<P>,
    pub rng_backend: RngBackend,
    pub native_feed: PriceFeedInstance<P>,
    pub reward_feed: PriceFeedInstance<P>,
    pub tokens: TokenMetadata,
    pub policy: SnapshotPolicy,
}

impl<P> DrawAuction<P>
where
    P: Provider + Clone,
{
    pub async fn resolve(provider: P, deployment: &Deployment) -> Result<Self> {
        let draw_manager = DrawManagerInstance::new(deployment.draw_manager, provider.clone());
        let prize_pool = PrizePoolInstance::new(deployment.prize_pool, provider.clone());
        let rng = RngInstance::new(deployment.rng.address(), provider.clone());
        let native_feed = PriceFeedInstance::new(deployment.native_usd_feed, provider.clone());
        let reward_feed = PriceFeedInstance::new(deployment.reward_usd_feed, provider.clone());

        let (reward_token, native_feed_decimals, reward_feed_decimals) = provider
            .multicall()
            .add(prize_pool.prizeToken())
            .add(native_feed.decimals())
            .add(reward_feed.decimals())
            .aggregate()
            .await
            .wrap_err("failed to resolve prize token and price feeds")?;

        let token = ERC20Instance::new(reward_token, provider.clone());
        let (reward_symbol, reward_decimals) = provider
            .multicall()
            .add(token.symbol())
            .add(token.decimals())
            .aggregate()
            .await
            .wrap_err(format!("failed to read prize token metadata at {reward_token}"))?;

        let tokens = TokenMetadata {
            reward_token,
            reward_symbol,
            reward_decimals,
            reward_feed_decimals,
            native_decimals: deployment.native_decimals,
            native_feed_decimals,
        };

        Ok(Self {
            provider,
            draw_manager,
            prize_pool,
            rng,
            rng_backend: deployment.rng,
            native_feed,
            reward_feed,
            tokens,
            policy: SnapshotPolicy {
                closes_soon_secs: deployment.policy.closes_soon_secs,
                max_feed_age_secs: deployment.policy.max_feed_age_secs,
            },
        })
    }

    pub async fn chain_facts(&self, signer: Address) -> Result<ChainFacts> {
        let chain_id = self.provider.get_chain_id().await?;
        let signer_balance = self.provider.get_balance(signer).await?;

        let mut missing_code = Vec::new();
        for (name, address) in [
            ("draw manager", *self.draw_manager.address()),
            ("prize pool", *self.prize_pool.address()),
            ("rng", *self.rng.address()),
            ("native price feed", *self.native_feed.address()),
            ("reward price feed", *self.reward_feed.address()),
        ] {
            let code = self
                .provider
                .get_code_at(address)
                .await
                .wrap_err(format!("failed to fetch code for {name} at {address}"))?;
            if code.is_empty() {
                missing_code.push(format!("{name} ({address})"));
            }
        }

        Ok(ChainFacts {
            chain_id,
            signer_balance,
            missing_code,
        })
    }

    #[instrument(skip(self))]
    pub async fn read(&self, gas_price: u128) -> Result<ChainReads, CycleError> {
        let multicall = self
            .provider
            .multicall()
            .add(self.draw_manager.canStartDraw())
            .add(self.draw_manager.startDrawReward())
            .add(self.draw_manager.canFinishDraw())
            .add(self.draw_manager.finishDrawReward())
            .add(self.draw_manager.auctionDuration())
            .add(self.draw_manager.getLastStartDrawAuction())
            .add(self.prize_pool.getDrawIdToAward())
            .add(self.prize_pool.firstDrawOpensAt())
            .add(self.prize_pool.drawPeriodSeconds())
            .add(self.native_feed.latestRoundData())
            .add(self.reward_feed.latestRoundData())
            .get_current_block_timestamp();

        let (reads, rng_fee) = if self.rng_backend.charges_fee() {
            let (
                can_start_draw,
                start_draw_reward,
                can_finish_draw,
                finish_draw_reward,
                auction_duration,
                last_start_draw,
                draw_id_to_award,
                first_draw_opens_at,
                draw_period_seconds,
                native_round,
                reward_round,
                block_timestamp,
                fee,
            ) = multicall
                .add(self.rng.estimateRandomizeFee(U256::from(gas_price)))
                .aggregate()
                .await
                .map_err(unavailable)?;
            (
                (
                    can_start_draw,
                    start_draw_reward,
                    can_finish_draw,
                    finish_draw_reward,
                    auction_duration,
                    last_start_draw,
                    draw_id_to_award,
                    first_draw_opens_at,
                    draw_period_seconds,
                    native_round,
                    reward_round,
                    block_timestamp,
                ),
                Some(fee),
            )
        } else {
            (multicall.aggregate().await.map_err(unavailable)?, None)
        };

        let (
            can_start_draw,
            start_draw_reward,
            can_finish_draw,
            finish_draw_reward,
            auction_duration,
            last_start_draw,
            draw_id_to_award,
            first_draw_opens_at,
            draw_period_seconds,
            native_round,
            reward_round,
            block_timestamp,
        ) = reads;

        debug!(can_start_draw, can_finish_draw, "auction flags read");

        Ok(ChainReads {
            can_start_draw,
            start_draw_reward,
            can_finish_draw,
            finish_draw_reward,
            auction_duration: as_u64(auction_duration),
            last_start_draw_closed_at: as_u64(last_start_draw.closedAt),
            last_start_draw_recipient: last_start_draw.recipient,
            draw_id_to_award: as_u64(draw_id_to_award),
            first_draw_opens_at: as_u64(first_draw_opens_at),
            draw_period_seconds: as_u64(draw_period_seconds),
            native_answer: native_round.answer,
            native_updated_at: as_u64(native_round.updatedAt),
            reward_answer: reward_round.answer,
            reward_updated_at: as_u64(reward_round.updatedAt),
            block_timestamp: as_u64(block_timestamp),
            rng_fee,
        })
    }
}

#[async_trait]
impl<P> AuctionReader for DrawAuction<P>
where
    P: Provider + Clone + Send + Sync,
{
    async fn load_snapshot(&self, gas_price: u128) -> Result<AuctionSnapshot, CycleError> {
        let reads = self.read(gas_price).await?;
        AuctionSnapshot::from_reads(reads, &self.tokens, self.policy)
    }
}

fn unavailable(err: impl std::fmt::Display) -> CycleError {
    CycleError::ContextUnavailable(err.to_string())
}

fn as_u64<T>(value: T) -> u64
where
    T: TryInto<u64>,
{
    value.try_into().unwrap_or(u64::MAX)
}
