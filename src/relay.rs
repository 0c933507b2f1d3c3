use crate::error::CycleError;
use alloy::{primitives::B256, providers::Provider, rpc::types::TransactionRequest};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Submitter: Send + Sync {
    /// Hand the transaction off and return as soon as it has a hash.
    async fn submit(
        &self,
        tx: TransactionRequest,
        use_private_relay: bool,
    ) -> Result<B256, CycleError>;
}

#[derive(Debug, Clone)]
pub struct RelaySubmitter<P>
where
    P: Provider + Clone,
{
    public: P,
    private: Option<P>,
}

impl<P> RelaySubmitter<P>
where
    P: Provider + Clone,
{
    pub fn new(public: P, private: Option<P>) -> Self {
        Self { public, private }
    }
}

#[async_trait]
impl<P> Submitter for RelaySubmitter<P>
where
    P: Provider + Clone + Send + Sync,
{
    async fn submit(
        &self,
        tx: TransactionRequest,
        use_private_relay: bool,
    ) -> Result<B256, CycleError> {
        let (provider, route) = match (use_private_relay, &self.private) {
            (true, Some(private)) => (private, "private"),
            (true, None) => {
                return Err(CycleError::SubmissionFailed(
                    "private relay requested but no relay endpoint is connected".to_string(),
                ));
            }
            (false, _) => (&self.public, "public"),
        };

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|err| CycleError::SubmissionFailed(err.to_string()))?;
        let tx_hash = *pending.tx_hash();
        info!(tx = ?tx_hash, route, "transaction broadcast");
        Ok(tx_hash)
    }
}
