//! Delivery receipt reconciliation.
//!
//! Accepted tickets only mean the gateway queued the message. The receipt
//! lookup reports whether the platform service actually took it. Failures
//! are logged and counted; nothing is retried or remediated.

use std::sync::Arc;
use std::time::Duration;

use barrio_common::Metrics;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::services::gateway::{
    DeliveryFailure, DeliveryStatus, DeliveryTicket, PushGatewayService,
};

/// Receipt lookup outcome for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiptSummary {
    /// Receipts resolved as delivered.
    pub ok: usize,
    /// Receipts resolved as failed.
    pub error: usize,
    /// Ticket ids with no receipt, including those in failed lookups.
    pub missing: usize,
    /// Lookup requests that failed as a whole.
    pub lookup_failures: usize,
}

/// Fetches and classifies receipts for accepted tickets.
#[derive(Clone)]
pub struct ReceiptReconciler {
    gateway: PushGatewayService,
    batch_size: usize,
    max_concurrent: usize,
    delay: Duration,
    metrics: Arc<Metrics>,
}

impl ReceiptReconciler {
    /// Create a new reconciler.
    #[must_use]
    pub fn new(
        gateway: PushGatewayService,
        batch_size: usize,
        max_concurrent: usize,
        delay: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            gateway,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
            delay,
            metrics,
        }
    }

    /// Ids of tickets that are eligible for a receipt lookup.
    #[must_use]
    pub fn receipt_ids(tickets: &[DeliveryTicket]) -> Vec<String> {
        tickets
            .iter()
            .filter_map(DeliveryTicket::receipt_id)
            .map(str::to_string)
            .collect()
    }

    /// Look up and log receipts for `tickets`.
    ///
    /// Makes no gateway call when no ticket was accepted.
    pub async fn reconcile(&self, tickets: &[DeliveryTicket]) -> ReceiptSummary {
        let ids = Self::receipt_ids(tickets);
        let mut summary = ReceiptSummary::default();
        if ids.is_empty() {
            return summary;
        }

        if !self.delay.is_zero() {
            debug!(delay_ms = self.delay.as_millis() as u64, "Waiting before receipt lookup");
            tokio::time::sleep(self.delay).await;
        }

        let lookups: Vec<_> = ids
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .enumerate()
            .map(|(index, chunk)| {
                let gateway = self.gateway.clone();
                async move {
                    let result = gateway.get_receipts(&chunk).await;
                    (index, chunk, result)
                }
            })
            .collect();
        let results: Vec<_> = stream::iter(lookups)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        for (index, chunk, result) in results {
            let receipts = match result {
                Ok(receipts) => receipts,
                Err(e) => {
                    warn!(chunk = index, size = chunk.len(), error = %e, "Receipt lookup failed");
                    summary.lookup_failures += 1;
                    summary.missing += chunk.len();
                    continue;
                }
            };

            for id in &chunk {
                match receipts.get(id) {
                    Some(receipt) if receipt.status == DeliveryStatus::Ok => summary.ok += 1,
                    Some(receipt) => {
                        let failure = receipt.failure().unwrap_or(DeliveryFailure::Other(None));
                        warn!(
                            ticket_id = %id,
                            error = %failure,
                            message = receipt.message.as_deref().unwrap_or_default(),
                            "Push delivery failed"
                        );
                        summary.error += 1;
                    }
                    None => {
                        debug!(ticket_id = %id, "No receipt available");
                        summary.missing += 1;
                    }
                }
            }
        }

        Metrics::add(&self.metrics.receipts_ok, summary.ok);
        Metrics::add(&self.metrics.receipts_error, summary.error);
        Metrics::add(&self.metrics.receipts_missing, summary.missing);
        Metrics::add(&self.metrics.receipt_lookup_failures, summary.lookup_failures);
        info!(
            ok = summary.ok,
            error = summary.error,
            missing = summary.missing,
            "Receipts reconciled"
        );
        summary
    }
}
