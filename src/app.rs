use crate::{
    auction::DrawAuction,
    blocks::{BlockConsumer, BlockProducer, ShutdownReason},
    config::Config,
    cycle::{DispatchSettings, DrawCycle},
    gas::ProviderGasOracle,
    logging::{log_summary, persist_summary},
    profit::ProfitPolicy,
    relay::RelaySubmitter,
    transaction::TxBuilder,
    validate::PreflightValidator,
};
use alloy::providers::Provider;
use eyre::Result;
use futures_util::StreamExt;
use tracing::{error, info, instrument, warn};

type ProviderCycle<P> = DrawCycle<DrawAuction<P>, ProviderGasOracle<P>, RelaySubmitter<P>>;

pub struct DrawAuctionBot<P>
where
    P: Provider + Clone + Unpin,
{
    block_producer: BlockProducer<P>,
    block_consumer: BlockConsumer<DrawAuction<P>, ProviderGasOracle<P>, RelaySubmitter<P>>,
}

impl<P> DrawAuctionBot<P>
where
    P: Provider + Clone + Send + Sync + Unpin + 'static,
{
    pub async fn build_with_provider(
        provider: P,
        private_relay: Option<P>,
        config: Config,
    ) -> Result<Self> {
        let deployment = &config.deployment;
        info!(
            chain_id = deployment.chain_id,
            draw_manager = %deployment.draw_manager,
            rng = ?deployment.rng,
            recipient = %config.reward_recipient,
            min_profit_usd = %config.min_profit_threshold_usd,
            private_relay = config.relay.use_private_relay,
            dry_run = config.dry_run,
            "configuration loaded"
        );

        let auction = DrawAuction::resolve(provider.clone(), deployment).await?;
        info!(
            token = %auction.tokens.reward_token,
            symbol = %auction.tokens.reward_symbol,
            decimals = auction.tokens.reward_decimals,
            "prize token resolved"
        );

        let facts = auction.chain_facts(config.signer.address()).await?;
        PreflightValidator::new(&facts, &config).run()?;

        let every_blocks = deployment.policy.poll_every_blocks;
        let block_producer = BlockProducer::new(provider.clone(), &config.transport).await?;
        let cycle = build_cycle(auction, provider, private_relay, &config);
        let block_consumer = BlockConsumer::new(cycle, every_blocks);

        Ok(Self {
            block_producer,
            block_consumer,
        })
    }

    #[instrument(skip_all)]
    pub async fn run(mut self) -> Result<()> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("interrupt received, stopping");
                    break ShutdownReason::Interrupted;
                }
                next = self.block_producer.next() => match next {
                    Some(Ok(header)) => {
                        self.block_consumer.handle_block(&header).await;
                    }
                    Some(Err(err)) => {
                        error!(?err, "block stream terminated");
                        break ShutdownReason::BlockStreamError;
                    }
                    None => {
                        warn!("block stream ended unexpectedly");
                        break ShutdownReason::BlockStreamEnded;
                    }
                },
            }
        };

        self.record_summary(reason);
        Ok(())
    }

    fn record_summary(&self, reason: ShutdownReason) {
        let summary = self.block_consumer.summary();
        log_summary(summary, &reason);
        match persist_summary(summary, &reason) {
            Ok(path) => info!(file = %path.display(), "run summary persisted"),
            Err(err) => warn!(?err, "failed to persist run summary"),
        }
    }
}

fn build_cycle<P>(
    auction: DrawAuction<P>,
    provider: P,
    private_relay: Option<P>,
    config: &Config,
) -> ProviderCycle<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    let deployment = &config.deployment;
    let builder = TxBuilder::new(
        config.signer.address(),
        deployment.draw_manager,
        deployment.rng.address(),
        config.reward_recipient,
    );
    let policy = ProfitPolicy {
        min_profit_threshold_usd: config.min_profit_threshold_usd,
        max_force_loss_usd: deployment.policy.max_force_loss_usd,
        require_sunk_cost_recipient: deployment.policy.require_sunk_cost_recipient,
        reward_recipient: config.reward_recipient,
    };
    let settings = DispatchSettings {
        use_private_relay: config.relay.use_private_relay,
        dry_run: config.dry_run,
        native_decimals: deployment.native_decimals,
    };

    DrawCycle::new(
        auction,
        ProviderGasOracle::new(provider.clone()),
        RelaySubmitter::new(provider, private_relay),
        builder,
        policy,
        settings,
    )
}
