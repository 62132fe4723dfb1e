//! Batched reward payment dispatch
//!
//! New addresses are partitioned into fixed-size batches, purely by
//! position, and each batch is paid with one `batchSend` transaction
//! carrying `value = amount × batch size`. Batches are submitted strictly
//! one after another, each waiting for its receipt before the next begins:
//! the signing account's nonce is fetched immediately before every
//! submission, and concurrent submissions would race on it.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use tracing::{error, info, warn};

use crate::chain::ChainSource;

sol! {
    /// Reward contract interface: pays `amount` to every recipient in one
    /// call, funded by the transaction value.
    contract BatchSend {
        function batchSend(address[] calldata recipients, uint256 amount) external payable;
    }
}

/// Split `addresses` into contiguous batches of at most `batch_size`,
/// preserving order. Boundaries are purely positional.
pub fn partition(addresses: &[Address], batch_size: usize) -> impl Iterator<Item = &[Address]> {
    addresses.chunks(batch_size.max(1))
}

/// Terminal state of one submitted (or skipped) batch.
#[derive(Debug, Clone)]
pub enum BatchStatus {
    /// Dry-run mode: recipients were logged, nothing was submitted.
    DryRun,
    Confirmed { tx_hash: B256 },
    Reverted { tx_hash: B256 },
    SubmitFailed { reason: String },
}

impl BatchStatus {
    /// Whether the batch's addresses count as handled for ledger purposes.
    pub fn is_paid(&self) -> bool {
        matches!(self, BatchStatus::DryRun | BatchStatus::Confirmed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub recipients: Vec<Address>,
    pub status: BatchStatus,
}

/// Per-batch outcomes of one dispatch round, in submission order.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl DispatchReport {
    /// Addresses whose batch confirmed (or was a dry run); only these may be
    /// marked paid in the ledger.
    pub fn paid_addresses(&self) -> Vec<Address> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_paid())
            .flat_map(|o| o.recipients.iter().copied())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_paid())
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.outcomes.iter().filter(|o| o.status.is_paid()).count()
    }

    /// Batches actually sent to the chain (everything but dry runs).
    pub fn submitted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.status, BatchStatus::DryRun))
            .count()
    }
}

/// Submits one payment transaction per batch of new addresses.
pub struct BatchDispatcher {
    batch_send: Address,
    amount: U256,
    batch_size: usize,
    dry_run: bool,
}

impl BatchDispatcher {
    pub fn new(batch_send: Address, amount: U256, batch_size: usize, dry_run: bool) -> Self {
        Self {
            batch_send,
            amount,
            batch_size: batch_size.max(1),
            dry_run,
        }
    }

    /// Pay every address in `recipients`, batch by batch, in order.
    ///
    /// Failures never escape as errors: a reverted or unsubmittable batch is
    /// recorded in the report and the remaining batches still run.
    pub async fn pay<C: ChainSource>(&self, chain: &C, recipients: &[Address]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for batch in partition(recipients, self.batch_size) {
            let status = if self.dry_run {
                info!(count = batch.len(), recipients = ?batch, "dry run, skipping submission");
                BatchStatus::DryRun
            } else {
                self.send_batch(chain, batch).await
            };

            report.outcomes.push(BatchOutcome {
                recipients: batch.to_vec(),
                status,
            });
        }

        report
    }

    async fn send_batch<C: ChainSource>(&self, chain: &C, batch: &[Address]) -> BatchStatus {
        let sender = match chain.sender() {
            Some(sender) => sender,
            None => {
                return BatchStatus::SubmitFailed {
                    reason: "no signing account configured".to_string(),
                }
            }
        };

        // Fetched fresh for every batch: the previous confirmation bumped it
        let nonce = match chain.nonce(sender).await {
            Ok(nonce) => nonce,
            Err(e) => {
                error!(error = %e, "failed to fetch sender nonce");
                return BatchStatus::SubmitFailed {
                    reason: e.to_string(),
                };
            }
        };

        let call = BatchSend::batchSendCall {
            recipients: batch.to_vec(),
            amount: self.amount,
        };
        let total = self.amount * U256::from(batch.len() as u64);

        let tx = TransactionRequest::default()
            .to(self.batch_send)
            .nonce(nonce)
            .value(total)
            .input(Bytes::from(call.abi_encode()).into());

        let tx_hash = match chain.submit(tx).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                error!(error = %e, count = batch.len(), "batch submission failed");
                return BatchStatus::SubmitFailed {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            tx_hash = %tx_hash,
            count = batch.len(),
            value = %total,
            "reward batch submitted"
        );

        match chain.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.status => {
                info!(
                    tx_hash = %tx_hash,
                    block = ?receipt.block_number,
                    "reward batch confirmed"
                );
                BatchStatus::Confirmed { tx_hash }
            }
            Ok(_) => {
                warn!(tx_hash = %tx_hash, "reward batch reverted");
                BatchStatus::Reverted { tx_hash }
            }
            Err(e) => {
                error!(tx_hash = %tx_hash, error = %e, "no confirmation for reward batch");
                BatchStatus::SubmitFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: usize) -> Vec<Address> {
        (0..n)
            .map(|i| {
                let mut bytes = [0u8; 20];
                bytes[18] = (i >> 8) as u8;
                bytes[19] = i as u8;
                Address::from(bytes)
            })
            .collect()
    }

    #[test]
    fn partition_is_positional_and_order_preserving() {
        let all = addrs(250);
        let batches: Vec<&[Address]> = partition(&all, 100).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], &all[..100]);
        assert_eq!(batches[1], &all[100..200]);
        assert_eq!(batches[2], &all[200..]);
    }

    #[test]
    fn partition_of_exact_multiple_has_no_tail() {
        let all = addrs(200);
        let sizes: Vec<usize> = partition(&all, 100).map(<[Address]>::len).collect();
        assert_eq!(sizes, vec![100, 100]);
    }

    #[test]
    fn report_excludes_failed_batches_from_paid() {
        let report = DispatchReport {
            outcomes: vec![
                BatchOutcome {
                    recipients: addrs(2),
                    status: BatchStatus::Confirmed {
                        tx_hash: B256::ZERO,
                    },
                },
                BatchOutcome {
                    recipients: vec![Address::repeat_byte(0xee)],
                    status: BatchStatus::Reverted {
                        tx_hash: B256::ZERO,
                    },
                },
            ],
        };

        assert_eq!(report.paid_addresses(), addrs(2));
        assert!(!report.all_succeeded());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.submitted_count(), 2);
    }

    #[test]
    fn dry_run_counts_as_paid_but_not_submitted() {
        let report = DispatchReport {
            outcomes: vec![BatchOutcome {
                recipients: addrs(3),
                status: BatchStatus::DryRun,
            }],
        };

        assert_eq!(report.paid_addresses().len(), 3);
        assert!(report.all_succeeded());
        assert_eq!(report.submitted_count(), 0);
    }
}
