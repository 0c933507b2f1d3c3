use crate::{error::CycleError, usd};
use alloy::{primitives::U256, providers::Provider, rpc::types::TransactionRequest};
use async_trait::async_trait;
use eyre::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

pub const GAS_ESTIMATE_BUFFER: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub gas_price: u128,
    pub max_fee_per_gas: u128,
}

#[async_trait]
pub trait GasOracle: Send + Sync {
    async fn fee_quote(&self) -> Result<FeeQuote, CycleError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct ProviderGasOracle<P>
where
    P: Provider + Clone,
{
    provider: P,
}

impl<P> ProviderGasOracle<P>
where
    P: Provider + Clone,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> GasOracle for ProviderGasOracle<P>
where
    P: Provider + Clone + Send + Sync,
{
    async fn fee_quote(&self) -> Result<FeeQuote, CycleError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|err| CycleError::GasPriceUnavailable(err.to_string()))?;

        // Legacy-only chains reject fee history; fall back to the flat price.
        let max_fee_per_gas = match self.provider.estimate_eip1559_fees().await {
            Ok(estimate) => estimate.max_fee_per_gas.max(gas_price),
            Err(err) => {
                debug!(?err, "eip1559 fee estimate unavailable");
                gas_price
            }
        };

        Ok(FeeQuote {
            gas_price,
            max_fee_per_gas,
        })
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(tx.clone()).await?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Buffered gas units; zero when the estimate could not be obtained.
    pub gas_units: u64,
    pub gas_price_wei: u128,
    pub max_fee_per_gas_wei: u128,
    pub base_fee_usd: Decimal,
    pub max_fee_usd: Decimal,
    pub avg_fee_usd: Decimal,
    pub gas_cost_usd: Decimal,
}

impl CostEstimate {
    pub fn zero(fees: FeeQuote) -> Self {
        Self {
            gas_units: 0,
            gas_price_wei: fees.gas_price,
            max_fee_per_gas_wei: fees.max_fee_per_gas,
            base_fee_usd: Decimal::ZERO,
            max_fee_usd: Decimal::ZERO,
            avg_fee_usd: Decimal::ZERO,
            gas_cost_usd: Decimal::ZERO,
        }
    }

    pub fn from_gas_units(
        gas_units: u64,
        fees: FeeQuote,
        native_rate_usd: Decimal,
        native_decimals: u8,
    ) -> Self {
        let units = U256::from(gas_units);
        let base = usd::to_usd(
            units * U256::from(fees.gas_price),
            native_decimals,
            native_rate_usd,
        );
        let max = usd::to_usd(
            units * U256::from(fees.max_fee_per_gas),
            native_decimals,
            native_rate_usd,
        );

        let (Some(base_fee_usd), Some(max_fee_usd)) = (base, max) else {
            warn!(gas_units, "gas cost overflowed USD conversion");
            return Self::zero(fees);
        };
        let Some(avg_fee_usd) = base_fee_usd
            .checked_add(max_fee_usd)
            .map(|sum| sum / Decimal::TWO)
        else {
            return Self::zero(fees);
        };

        Self {
            gas_units,
            gas_price_wei: fees.gas_price,
            max_fee_per_gas_wei: fees.max_fee_per_gas,
            base_fee_usd,
            max_fee_usd,
            avg_fee_usd,
            gas_cost_usd: avg_fee_usd,
        }
    }

    pub fn is_undeterminable(&self) -> bool {
        self.gas_cost_usd.is_zero()
    }
}

pub async fn estimate_cost<G>(
    oracle: &G,
    tx: &TransactionRequest,
    fees: FeeQuote,
    native_rate_usd: Decimal,
    native_decimals: u8,
) -> CostEstimate
where
    G: GasOracle + ?Sized,
{
    match oracle.estimate_gas(tx).await {
        Ok(estimated) => {
            let gas_units = estimated.saturating_add(GAS_ESTIMATE_BUFFER);
            debug!(estimated, gas_units, "gas estimated");
            CostEstimate::from_gas_units(gas_units, fees, native_rate_usd, native_decimals)
        }
        Err(err) => {
            warn!(?err, "gas estimation failed");
            CostEstimate::zero(fees)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::eyre;

    struct FixedGas(Option<u64>);

    #[async_trait]
    impl GasOracle for FixedGas {
        async fn fee_quote(&self) -> Result<FeeQuote, CycleError> {
            Ok(fees())
        }

        async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64> {
            self.0.ok_or_else(|| eyre!("execution reverted"))
        }
    }

    fn fees() -> FeeQuote {
        FeeQuote {
            gas_price: 10_000_000_000,
            max_fee_per_gas: 30_000_000_000,
        }
    }

    #[test]
    fn prices_gas_in_usd() {
        // 100k gas at 10 gwei = 0.001 ETH, at 30 gwei = 0.003 ETH
        let cost = CostEstimate::from_gas_units(100_000, fees(), Decimal::from(2000), 18);
        assert_eq!(cost.base_fee_usd, Decimal::from(2));
        assert_eq!(cost.max_fee_usd, Decimal::from(6));
        assert_eq!(cost.avg_fee_usd, Decimal::from(4));
        assert_eq!(cost.gas_cost_usd, Decimal::from(4));
        assert!(!cost.is_undeterminable());
    }

    #[test]
    fn respects_native_decimals() {
        let fees = FeeQuote {
            gas_price: 1_000_000,
            max_fee_per_gas: 1_000_000,
        };
        // 8-decimal native token: 100k * 1e6 = 1e11 base units = 1000 tokens
        let cost = CostEstimate::from_gas_units(100_000, fees, Decimal::ONE, 8);
        assert_eq!(cost.gas_cost_usd, Decimal::from(1000));
    }

    #[tokio::test]
    async fn buffers_successful_estimates() {
        let cost = estimate_cost(
            &FixedGas(Some(250_000)),
            &TransactionRequest::default(),
            fees(),
            Decimal::from(2000),
            18,
        )
        .await;
        assert_eq!(cost.gas_units, 250_000 + GAS_ESTIMATE_BUFFER);
    }

    #[tokio::test]
    async fn failed_estimate_is_zero_and_unbuffered() {
        let cost = estimate_cost(
            &FixedGas(None),
            &TransactionRequest::default(),
            fees(),
            Decimal::from(2000),
            18,
        )
        .await;
        assert_eq!(cost.gas_units, 0);
        assert!(cost.is_undeterminable());
        assert_eq!(cost.gas_price_wei, fees().gas_price);
    }
}
