use crate::{
    auction::AuctionReader,
    cycle::{CycleReport, DrawCycle},
    gas::GasOracle,
    logging::report_cycle,
    relay::Submitter,
    summary::RunSummary,
};
use std::{
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use alloy::{
    network::BlockResponse,
    providers::Provider,
    rpc::{client::BuiltInConnectionString, types::eth::Header},
};
use eyre::{Result, eyre};
use futures_util::{Stream, StreamExt, stream::BoxStream};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, instrument};

const HTTP_POLL_INTERVAL: Duration = Duration::from_secs(12);

pub struct BlockProducer<P>
where
    P: Provider + Clone + Unpin,
{
    stream: BoxStream<'static, Result<Header>>,
    _marker: PhantomData<P>,
}

impl<P> BlockProducer<P>
where
    P: Provider + Clone + Send + Sync + Unpin + 'static,
{
    pub async fn new(provider: P, endpoint: &BuiltInConnectionString) -> Result<Self> {
        let stream = match endpoint {
            BuiltInConnectionString::Ws(_, _) | BuiltInConnectionString::Ipc(_) => {
                let sub = provider.subscribe_blocks().await?;
                sub.into_stream().map(Ok).boxed()
            }
            BuiltInConnectionString::Http(_) => {
                align_polling(&provider).await?;
                let mut watcher = provider.watch_full_blocks().await?;
                watcher.set_poll_interval(HTTP_POLL_INTERVAL);
                watcher
                    .into_stream()
                    .map(|res| match res {
                        Ok(block) => Ok(block.header().clone()),
                        Err(err) => Err(eyre!(err)),
                    })
                    .boxed()
            }
            _ => {
                return Err(eyre!(
                    "unsupported transport for block production, enable HTTP, WS, or IPC"
                ));
            }
        };

        Ok(Self {
            stream,
            _marker: PhantomData,
        })
    }
}

impl<P> Stream for BlockProducer<P>
where
    P: Provider + Clone + Unpin,
{
    type Item = Result<Header>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.as_mut().get_mut();
        Pin::new(&mut this.stream).poll_next(cx)
    }
}

pub struct BlockConsumer<R, G, S> {
    cycle: DrawCycle<R, G, S>,
    every_blocks: u64,
    summary: RunSummary,
}

impl<R, G, S> BlockConsumer<R, G, S>
where
    R: AuctionReader,
    G: GasOracle,
    S: Submitter,
{
    pub fn new(cycle: DrawCycle<R, G, S>, every_blocks: u64) -> Self {
        Self {
            cycle,
            every_blocks: every_blocks.max(1),
            summary: RunSummary::default(),
        }
    }

    #[instrument(skip_all, fields(block = header.number))]
    pub async fn handle_block(&mut self, header: &Header) -> Option<CycleReport> {
        if !is_due(header.number, self.every_blocks) {
            debug!("skipping block");
            return None;
        }

        let report = self.cycle.run().await;
        report_cycle(header.number, &report);
        self.summary.record(header.number, &report);
        Some(report)
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

fn is_due(block: u64, every_blocks: u64) -> bool {
    block % every_blocks == 0
}

#[derive(Debug, Clone, Serialize)]
pub enum ShutdownReason {
    Interrupted,
    BlockStreamError,
    BlockStreamEnded,
}

async fn align_polling<P>(provider: &P) -> Result<()>
where
    P: Provider,
{
    let start = provider.get_block_number().await?;
    loop {
        let current = provider.get_block_number().await?;
        if current > start {
            break;
        }
        sleep(Duration::from_millis(250)).await;
    }
    sleep(Duration::from_millis(250)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::is_due;

    #[test]
    fn every_block_is_due_by_default() {
        assert!((100..110).all(|block| is_due(block, 1)));
    }

    #[test]
    fn sparse_polling_skips_blocks() {
        let due: Vec<u64> = (1..=12).filter(|block| is_due(*block, 5)).collect();
        assert_eq!(due, vec![5, 10]);
    }
}
