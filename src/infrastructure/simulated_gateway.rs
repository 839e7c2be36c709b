use crate::domain::charge::{Amount, UserId};
use crate::domain::ports::{GatewayError, PaymentGateway, Receipt};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Concurrency ceiling of the payment processor.
pub const GATEWAY_CONCURRENCY_LIMIT: usize = 5;

/// An in-process stand-in for the payment processor.
///
/// Rejects calls beyond its concurrency ceiling, declines configured users and
/// keeps every issued receipt. `Clone` shares the counters and the receipt log.
#[derive(Clone)]
pub struct SimulatedGateway {
    limit: usize,
    latency: Duration,
    declined: Arc<HashSet<UserId>>,
    in_flight: Arc<AtomicUsize>,
    next_reference: Arc<AtomicU64>,
    receipts: Arc<RwLock<Vec<Receipt>>>,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(GATEWAY_CONCURRENCY_LIMIT)
    }
}

impl SimulatedGateway {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            latency: Duration::ZERO,
            declined: Arc::new(HashSet::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            next_reference: Arc::new(AtomicU64::new(1)),
            receipts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Delay applied to every call while it counts as in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Users whose payments are declined.
    pub fn with_declined_users(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.declined = Arc::new(users.into_iter().collect());
        self
    }

    /// Receipts issued so far, in completion order.
    pub async fn receipts(&self) -> Vec<Receipt> {
        self.receipts.read().await.clone()
    }
}

/// Decrements the in-flight counter when a call ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, amount: Amount, user_id: &UserId) -> Result<Receipt, GatewayError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        if current > self.limit {
            return Err(GatewayError::ConcurrencyExceeded { limit: self.limit });
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.declined.contains(user_id) {
            return Err(GatewayError::Declined {
                user_id: user_id.clone(),
                reason: "card declined".to_string(),
            });
        }

        let reference = format!(
            "rcpt-{:06}",
            self.next_reference.fetch_add(1, Ordering::SeqCst)
        );
        let receipt = Receipt {
            reference,
            user_id: user_id.clone(),
            amount,
        };
        self.receipts.write().await.push(receipt.clone());
        Ok(receipt)
    }
}
