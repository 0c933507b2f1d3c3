use crate::config::Config;
use alloy::primitives::U256;
use eyre::{Result, eyre};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct ChainFacts {
    pub chain_id: u64,
    pub signer_balance: U256,
    /// Human-readable names of configured contracts without deployed code.
    pub missing_code: Vec<String>,
}

pub struct PreflightValidator<'a> {
    facts: &'a ChainFacts,
    config: &'a Config,
}

impl<'a> PreflightValidator<'a> {
    pub fn new(facts: &'a ChainFacts, config: &'a Config) -> Self {
        Self { facts, config }
    }

    pub fn run(&self) -> Result<()> {
        self.ensure_chain_id()?;
        self.ensure_contracts_deployed()?;
        self.ensure_recipient_set()?;
        self.ensure_policy_bounds()?;
        self.ensure_gas_funds()?;
        Ok(())
    }

    fn ensure_chain_id(&self) -> Result<()> {
        let expected = self.config.deployment.chain_id;
        if self.facts.chain_id != expected {
            return Err(eyre!(
                "RPC endpoint serves chain {} but deployment config targets chain {expected}",
                self.facts.chain_id
            ));
        }
        Ok(())
    }

    fn ensure_contracts_deployed(&self) -> Result<()> {
        if !self.facts.missing_code.is_empty() {
            return Err(eyre!(
                "no contract code at: {}",
                self.facts.missing_code.join(", ")
            ));
        }
        Ok(())
    }

    fn ensure_recipient_set(&self) -> Result<()> {
        if self.config.reward_recipient.is_zero() {
            return Err(eyre!("REWARD_RECIPIENT cannot be the zero address"));
        }
        Ok(())
    }

    fn ensure_policy_bounds(&self) -> Result<()> {
        if self.config.min_profit_threshold_usd < Decimal::ZERO {
            return Err(eyre!(
                "MIN_PROFIT_THRESHOLD_USD must not be negative, got {}",
                self.config.min_profit_threshold_usd
            ));
        }
        let max_force_loss = self.config.deployment.policy.max_force_loss_usd;
        if max_force_loss > Decimal::ZERO {
            return Err(eyre!(
                "policy.max_force_loss_usd must be zero or negative, got {max_force_loss}"
            ));
        }
        Ok(())
    }

    fn ensure_gas_funds(&self) -> Result<()> {
        if self.facts.signer_balance.is_zero() && !self.config.dry_run {
            return Err(eyre!(
                "signer {} has no native balance to pay for gas",
                self.config.signer.address()
            ));
        }
        Ok(())
    }
}
