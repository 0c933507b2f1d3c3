mod app;
mod auction;
mod blocks;
mod config;
mod cycle;
mod error;
mod gas;
mod logging;
mod profit;
mod relay;
mod snapshot;
mod summary;
mod transaction;
mod usd;
mod validate;

use crate::{app::DrawAuctionBot, config::Config, logging::init_logging};
use alloy::{providers::ProviderBuilder, sol};
use eyre::Result;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract DrawManager {
        struct StartDrawAuction {
            address recipient;
            uint40 closedAt;
            uint24 drawId;
            uint32 rngRequestId;
        }

        function canStartDraw() external view returns (bool);
        function startDrawReward() external view returns (uint256);
        function canFinishDraw() external view returns (bool);
        function finishDrawReward() external view returns (uint256);
        function auctionDuration() external view returns (uint48);
        function getLastStartDrawAuction()
            external
            view
            returns (StartDrawAuction memory result);
        function finishDraw(address rewardRecipient) external returns (uint24);
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract PrizePool {
        function prizeToken() external view returns (address);
        function getDrawIdToAward() external view returns (uint24);
        function firstDrawOpensAt() external view returns (uint48);
        function drawPeriodSeconds() external view returns (uint48);
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract Rng {
        function estimateRandomizeFee(uint256 gasPrice) external view returns (uint256);
        function startDraw(address drawManager, address rewardRecipient)
            external
            payable
            returns (uint24);
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract ERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract PriceFeed {
        function decimals() external view returns (uint8);
        function latestRoundData()
            external
            view
            returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let config = Config::from_env()?;
    let provider = ProviderBuilder::new()
        .wallet(config.signer.clone())
        .connect_with(&config.transport)
        .await?;
    let private_relay = match &config.relay.endpoint {
        Some(endpoint) => Some(
            ProviderBuilder::new()
                .wallet(config.signer.clone())
                .connect_with(endpoint)
                .await?,
        ),
        None => None,
    };
    DrawAuctionBot::build_with_provider(provider, private_relay, config)
        .await?
        .run()
        .await
}
