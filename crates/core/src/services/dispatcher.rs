//! Chunked push dispatch.

use std::sync::Arc;

use barrio_common::{Metrics, config::PushConfig};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::services::gateway::{
    DeliveryFailure, DeliveryStatus, DeliveryTicket, PushGatewayService,
};
use crate::services::message::PushMessage;
use crate::services::receipts::ReceiptReconciler;
use crate::services::recipients::Resolution;

/// What happened to the messages of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Messages handed to the dispatcher.
    pub built: usize,
    /// Recipients dropped before sending.
    pub skipped: usize,
    /// Send requests made.
    pub chunks: usize,
    /// Send requests that failed as a whole.
    pub chunk_failures: usize,
    pub tickets_ok: usize,
    pub tickets_error: usize,
    pub receipts_ok: usize,
    pub receipts_error: usize,
    /// Accepted tickets whose receipt could not be resolved.
    pub receipts_missing: usize,
    /// Receipt requests that failed as a whole.
    pub receipt_lookup_failures: usize,
}

/// Sends messages in gateway-sized chunks, then reconciles their receipts.
#[derive(Clone)]
pub struct PushDispatcher {
    gateway: PushGatewayService,
    send_batch_size: usize,
    max_concurrent: usize,
    reconciler: ReceiptReconciler,
    metrics: Arc<Metrics>,
}

impl PushDispatcher {
    /// Create a dispatcher using the batch sizes and concurrency in `config`.
    #[must_use]
    pub fn new(gateway: PushGatewayService, config: &PushConfig, metrics: Arc<Metrics>) -> Self {
        let reconciler = ReceiptReconciler::new(
            gateway.clone(),
            config.receipt_batch_size,
            config.max_concurrent_requests,
            config.receipt_delay(),
            metrics.clone(),
        );
        Self {
            gateway,
            send_batch_size: config.send_batch_size.max(1),
            max_concurrent: config.max_concurrent_requests.max(1),
            reconciler,
            metrics,
        }
    }

    /// Send every message, then look up receipts for the accepted ones.
    pub async fn dispatch(&self, resolution: Resolution) -> DispatchReport {
        let mut report = DispatchReport {
            built: resolution.messages.len(),
            skipped: resolution.skipped,
            ..DispatchReport::default()
        };
        Metrics::add(&self.metrics.messages_built, report.built);
        Metrics::add(&self.metrics.messages_skipped, report.skipped);

        if resolution.messages.is_empty() {
            info!(skipped = report.skipped, "No push messages to send");
            return report;
        }

        let tickets = self.send_all(&resolution.messages, &mut report).await;

        let receipts = self.reconciler.reconcile(&tickets).await;
        report.receipts_ok = receipts.ok;
        report.receipts_error = receipts.error;
        report.receipts_missing = receipts.missing;
        report.receipt_lookup_failures = receipts.lookup_failures;

        info!(
            built = report.built,
            skipped = report.skipped,
            chunks = report.chunks,
            chunk_failures = report.chunk_failures,
            tickets_ok = report.tickets_ok,
            tickets_error = report.tickets_error,
            "Push dispatch finished"
        );
        report
    }

    /// Send `messages` in chunks, returning tickets in chunk order.
    ///
    /// A failed chunk contributes no tickets and does not stop the others.
    async fn send_all(
        &self,
        messages: &[PushMessage],
        report: &mut DispatchReport,
    ) -> Vec<DeliveryTicket> {
        // Sends own their chunk; a borrowed chunk makes `dispatch` non-`Send`.
        let sends: Vec<_> = messages
            .chunks(self.send_batch_size)
            .map(<[PushMessage]>::to_vec)
            .enumerate()
            .map(|(index, chunk)| {
                let gateway = self.gateway.clone();
                async move {
                    let result = gateway.send(&chunk).await;
                    (index, chunk.len(), result)
                }
            })
            .collect();
        let results: Vec<_> = stream::iter(sends)
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut tickets = Vec::with_capacity(messages.len());
        for (index, size, result) in results {
            report.chunks += 1;
            match result {
                Ok(chunk_tickets) => {
                    if chunk_tickets.len() != size {
                        warn!(
                            chunk = index,
                            size,
                            tickets = chunk_tickets.len(),
                            "Ticket count does not match chunk size"
                        );
                    }
                    for ticket in &chunk_tickets {
                        match ticket.status {
                            DeliveryStatus::Ok => report.tickets_ok += 1,
                            DeliveryStatus::Error => {
                                report.tickets_error += 1;
                                let failure =
                                    ticket.failure().unwrap_or(DeliveryFailure::Other(None));
                                warn!(
                                    chunk = index,
                                    error = %failure,
                                    message = ticket.message.as_deref().unwrap_or_default(),
                                    "Push ticket rejected"
                                );
                            }
                        }
                    }
                    tickets.extend(chunk_tickets);
                }
                Err(e) => {
                    error!(chunk = index, size, error = %e, "Failed to send push chunk");
                    report.chunk_failures += 1;
                }
            }
        }

        Metrics::add(&self.metrics.chunks_sent, report.chunks);
        Metrics::add(&self.metrics.chunks_failed, report.chunk_failures);
        Metrics::add(&self.metrics.tickets_ok, report.tickets_ok);
        Metrics::add(&self.metrics.tickets_error, report.tickets_error);
        tickets
    }
}
