//! Scan controller: the loop that finds and pays new bridge users
//!
//! One sequential cycle per tick: read the head, scan mint events over the
//! next block window, diff the recipients against the ledger, pay the unseen
//! subset in batches, extend the ledger with what was actually paid, advance
//! the cursor. The cursor advances even when a batch fails, so that batch's
//! addresses are not retried on later ticks; the failure is logged and
//! reported instead of blocking the scan.

use std::collections::HashSet;
use std::time::Duration;

use alloy::primitives::Address;
use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chain::ChainSource;
use crate::config::Config;
use crate::dispatcher::{BatchDispatcher, DispatchReport};
use crate::error::QueryError;
use crate::events::{mint_filter, mint_recipient, payout_filter, payout_recipient};
use crate::ledger::RewardLedger;
use crate::scanner::{BlockRange, LogScanner};
use crate::server::{SharedMetrics, SharedStats};

/// What one scan window produced.
#[derive(Debug)]
pub struct ScanSummary {
    pub from: u64,
    pub to: u64,
    /// Distinct mint recipients observed in the window
    pub candidates: usize,
    /// Candidates not yet in the ledger, in dispatch order
    pub new_addresses: Vec<Address>,
    pub report: DispatchReport,
}

/// Result of a single `tick`.
#[derive(Debug)]
pub enum TickOutcome {
    /// Head too close to the cursor; nothing scanned
    Skipped { head: u64 },
    Completed(ScanSummary),
}

/// Owns the cursor and the ledger; drives scan/diff/pay/advance cycles.
pub struct RewardWatcher<C: ChainSource> {
    chain: C,
    config: Config,
    scanner: LogScanner,
    dispatcher: BatchDispatcher,
    ledger: RewardLedger,
    cursor: u64,
    stats: SharedStats,
    metrics: SharedMetrics,
}

impl<C: ChainSource> RewardWatcher<C> {
    pub fn new(chain: C, config: Config, stats: SharedStats, metrics: SharedMetrics) -> Self {
        let scanner = LogScanner::new(config.max_step);
        let dispatcher = BatchDispatcher::new(
            config.batch_send_address,
            config.reward_amount,
            config.batch_size,
            config.dry_run,
        );
        let cursor = config.bridge_deploy_block;

        Self {
            chain,
            config,
            scanner,
            dispatcher,
            ledger: RewardLedger::new(),
            cursor,
            stats,
            metrics,
        }
    }

    /// Next block height the scan will start from.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    /// Populate the ledger from the reward contract's full payout history,
    /// up to the current head. Runs once, before the scan loop.
    pub async fn seed_ledger(&mut self) -> Result<(), QueryError> {
        let head = self.chain.head_number().await?;
        let range = BlockRange::new(self.config.payout_deploy_block, head);

        if !range.is_empty() {
            let filter = payout_filter(self.config.batch_send_address);
            let logs = self.scanner.scan(&self.chain, &filter, range).await?;

            let mut receivers = HashSet::new();
            for log in &logs {
                match payout_recipient(log) {
                    Ok(addr) => {
                        receivers.insert(addr);
                    }
                    Err(e) => warn!(
                        error = %e,
                        block = ?log.block_number,
                        "skipping malformed payout log"
                    ),
                }
            }
            self.ledger.extend(receivers);
        }

        info!(
            paid_addresses = self.ledger.len(),
            from_block = self.config.payout_deploy_block,
            to_block = head,
            "reward ledger seeded"
        );

        {
            let mut stats = self.stats.write().await;
            stats.ledger_size = self.ledger.len() as u64;
            stats.cursor = self.cursor;
            stats.chain_head = head;
            stats.seeded = true;
        }
        self.metrics.ledger_size.set(self.ledger.len() as i64);
        self.metrics.cursor_height.set(self.cursor as i64);
        self.metrics.chain_head.set(head as i64);

        Ok(())
    }

    /// Run exactly one scan/diff/pay/advance cycle.
    ///
    /// On a transient error the cursor is untouched and the same window is
    /// retried on the next call.
    pub async fn tick(&mut self) -> Result<TickOutcome, QueryError> {
        let head = self.chain.head_number().await?;
        self.metrics.chain_head.set(head as i64);

        // Stay clear of the tip: very recent blocks may still reorg
        if head.saturating_sub(self.cursor) < self.config.min_advance {
            debug!(head, cursor = self.cursor, "head too close, waiting");
            let mut stats = self.stats.write().await;
            stats.chain_head = head;
            return Ok(TickOutcome::Skipped { head });
        }

        let from = self.cursor;
        let end = std::cmp::min(from + self.config.max_step, head);

        let mut candidates: HashSet<Address> = HashSet::new();
        for token in &self.config.tokens {
            let logs = self
                .scanner
                .scan(&self.chain, &mint_filter(*token), BlockRange::new(from, end))
                .await?;

            for log in &logs {
                match mint_recipient(log) {
                    Ok(addr) => {
                        candidates.insert(addr);
                    }
                    Err(e) => warn!(
                        error = %e,
                        token = %token,
                        block = ?log.block_number,
                        "skipping malformed mint log"
                    ),
                }
            }
        }

        let new_addresses = self.ledger.unseen(&candidates);

        let report = if new_addresses.is_empty() {
            DispatchReport::default()
        } else {
            info!(
                count = new_addresses.len(),
                from_block = from,
                to_block = end,
                "paying newly bridged users"
            );
            let report = self.dispatcher.pay(&self.chain, &new_addresses).await;
            self.ledger.extend(report.paid_addresses());
            report
        };

        // Advance unconditionally, accepting that a failed batch's addresses
        // fall outside every future window
        self.cursor = end;

        let paid = report.paid_addresses().len();
        let failed = report.failed_count();
        if failed > 0 {
            error!(
                failed_batches = failed,
                "some reward batches did not succeed; their addresses remain unpaid"
            );
        }
        info!(
            paid_addresses = self.ledger.len(),
            cursor = self.cursor,
            "scan iteration complete"
        );

        self.publish(head, paid as u64, report.submitted_count() as u64, failed as u64)
            .await;

        Ok(TickOutcome::Completed(ScanSummary {
            from,
            to: end,
            candidates: candidates.len(),
            new_addresses,
            report,
        }))
    }

    async fn publish(&self, head: u64, paid: u64, submitted: u64, failed: u64) {
        {
            let mut stats = self.stats.write().await;
            stats.ledger_size = self.ledger.len() as u64;
            stats.cursor = self.cursor;
            stats.chain_head = head;
            stats.addresses_paid += paid;
            stats.batches_submitted += submitted;
            stats.batches_failed += failed;
        }
        self.metrics.ledger_size.set(self.ledger.len() as i64);
        self.metrics.cursor_height.set(self.cursor as i64);
        self.metrics.addresses_paid_total.inc_by(paid);
        self.metrics.batches_submitted_total.inc_by(submitted);
        self.metrics.batches_failed_total.inc_by(failed);
    }

    /// Main run loop: tick, sleep, repeat, until shutdown.
    pub async fn run(&mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        info!("Reward watcher starting...");

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {
                    match self.tick().await {
                        Ok(_) => {}
                        Err(QueryError::Transient(e)) => {
                            self.metrics.scan_errors_total.inc();
                            warn!(error = %e, "transient scan failure, retrying from the same cursor");
                        }
                        Err(QueryError::Fatal(e)) => {
                            self.metrics.scan_errors_total.inc();
                            error!(error = %e, "scan query rejected");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
