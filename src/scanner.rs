//! Chunked log scanning over block ranges
//!
//! RPC endpoints cap the span of a single `eth_getLogs` call, so a requested
//! range is paged through in sub-ranges of at most `step` blocks and the
//! results concatenated in chain order.

use alloy::rpc::types::{Filter, Log};
use tracing::debug;

use crate::chain::ChainSource;
use crate::error::QueryError;

/// Half-open `[from, to)` span of block heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }
}

/// Pages a block range through a topic filter in `step`-sized chunks.
#[derive(Debug, Clone, Copy)]
pub struct LogScanner {
    step: u64,
}

impl LogScanner {
    pub fn new(step: u64) -> Self {
        Self { step: step.max(1) }
    }

    /// Fetch all logs matching `base` across `range`.
    ///
    /// `eth_getLogs` bounds are inclusive, so a chunk `[s, e)` is queried as
    /// `fromBlock = s, toBlock = e - 1`; chunks neither overlap nor leave
    /// gaps. Results keep chain order.
    pub async fn scan<C: ChainSource>(
        &self,
        chain: &C,
        base: &Filter,
        range: BlockRange,
    ) -> Result<Vec<Log>, QueryError> {
        if range.is_empty() {
            return Err(QueryError::Fatal(format!(
                "empty block range [{}, {})",
                range.from, range.to
            )));
        }

        let mut logs = Vec::new();
        let mut start = range.from;

        while start < range.to {
            let end = std::cmp::min(start + self.step, range.to);
            let filter = base.clone().from_block(start).to_block(end - 1);

            let chunk = chain.get_logs(&filter).await?;
            debug!(
                from_block = start,
                to_block = end - 1,
                count = chunk.len(),
                "scanned log chunk"
            );

            logs.extend(chunk);
            start = end;
        }

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256};
    use alloy::rpc::types::TransactionRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::chain::TxReceipt;
    use crate::error::SubmitError;

    /// Records the inclusive bounds of every log query it receives.
    #[derive(Default)]
    struct RangeRecorder {
        calls: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl ChainSource for RangeRecorder {
        fn sender(&self) -> Option<Address> {
            None
        }

        async fn head_number(&self) -> Result<u64, QueryError> {
            Ok(0)
        }

        async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, QueryError> {
            let from = filter.get_from_block().expect("bounded filter");
            let to = filter.get_to_block().expect("bounded filter");
            self.calls.lock().unwrap().push((from, to));
            Ok(Vec::new())
        }

        async fn nonce(&self, _account: Address) -> Result<u64, QueryError> {
            Ok(0)
        }

        async fn submit(&self, _tx: TransactionRequest) -> Result<B256, SubmitError> {
            Err(SubmitError::NoSigner)
        }

        async fn wait_for_receipt(&self, _tx_hash: B256) -> Result<TxReceipt, SubmitError> {
            Err(SubmitError::NoSigner)
        }
    }

    #[tokio::test]
    async fn chunks_wide_ranges_without_overlap_or_gap() {
        let chain = RangeRecorder::default();
        let scanner = LogScanner::new(10_000);

        scanner
            .scan(&chain, &Filter::new(), BlockRange::new(0, 25_000))
            .await
            .unwrap();

        let calls = chain.calls.lock().unwrap();
        assert_eq!(*calls, vec![(0, 9_999), (10_000, 19_999), (20_000, 24_999)]);
    }

    #[tokio::test]
    async fn narrow_range_issues_single_query() {
        let chain = RangeRecorder::default();
        let scanner = LogScanner::new(10_000);

        scanner
            .scan(&chain, &Filter::new(), BlockRange::new(1_000, 2_000))
            .await
            .unwrap();

        let calls = chain.calls.lock().unwrap();
        assert_eq!(*calls, vec![(1_000, 1_999)]);
    }

    #[tokio::test]
    async fn empty_range_is_rejected() {
        let chain = RangeRecorder::default();
        let scanner = LogScanner::new(10_000);

        let result = scanner
            .scan(&chain, &Filter::new(), BlockRange::new(2_000, 2_000))
            .await;

        assert!(matches!(result, Err(QueryError::Fatal(_))));
        assert!(chain.calls.lock().unwrap().is_empty());
    }
}
