use crate::{
    DrawManager, Rng,
    snapshot::{AuctionSnapshot, Phase},
};
use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    rpc::types::eth::TransactionRequest,
    sol_types::SolCall,
};

pub const START_DRAW_GAS_LIMIT: u64 = 850_000;
pub const FINISH_DRAW_GAS_LIMIT: u64 = 800_000;

pub fn gas_limit_for(phase: Phase) -> Option<u64> {
    match phase {
        Phase::PhaseOne => Some(START_DRAW_GAS_LIMIT),
        Phase::PhaseTwo => Some(FINISH_DRAW_GAS_LIMIT),
        Phase::None => None,
    }
}

#[derive(Debug, Clone)]
pub struct TxBuilder {
    from: Address,
    draw_manager: Address,
    rng: Address,
    reward_recipient: Address,
}

impl TxBuilder {
    pub fn new(
        from: Address,
        draw_manager: Address,
        rng: Address,
        reward_recipient: Address,
    ) -> Self {
        Self {
            from,
            draw_manager,
            rng,
            reward_recipient,
        }
    }

    pub fn build_for_phase(&self, snapshot: &AuctionSnapshot) -> Option<TransactionRequest> {
        match snapshot.phase {
            Phase::PhaseOne => Some(self.build_start_draw_request(snapshot.rng_fee_amount())),
            Phase::PhaseTwo => Some(self.build_finish_draw_request()),
            Phase::None => None,
        }
    }

    pub fn build_start_draw_request(&self, rng_fee: U256) -> TransactionRequest {
        let calldata = Bytes::from(
            Rng::startDrawCall {
                drawManager: self.draw_manager,
                rewardRecipient: self.reward_recipient,
            }
            .abi_encode(),
        );
        self.build_base_request(self.rng, calldata, rng_fee)
    }

    pub fn build_finish_draw_request(&self) -> TransactionRequest {
        let calldata = Bytes::from(
            DrawManager::finishDrawCall {
                rewardRecipient: self.reward_recipient,
            }
            .abi_encode(),
        );
        self.build_base_request(self.draw_manager, calldata, U256::ZERO)
    }

    pub fn finalize(
        &self,
        tx: TransactionRequest,
        gas_limit: u64,
        gas_price: u128,
    ) -> TransactionRequest {
        tx.with_gas_limit(gas_limit).with_gas_price(gas_price)
    }

    fn build_base_request(&self, to: Address, calldata: Bytes, value: U256) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.from)
            .with_to(to)
            .with_input(calldata)
            .with_value(value)
    }
}
