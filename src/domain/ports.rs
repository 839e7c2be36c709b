use super::charge::{Amount, Charge, UserId};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Read-only access to the charge records.
#[async_trait]
pub trait ChargeSource: Send + Sync {
    /// Returns every charge, in source order.
    async fn charges(&self) -> Result<Vec<Charge>>;
}

/// Proof of a successful gateway call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub reference: String,
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Payment declined for user {user_id}: {reason}")]
    Declined { user_id: UserId, reason: String },
    #[error("Gateway concurrency limit of {limit} exceeded")]
    ConcurrencyExceeded { limit: usize },
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// The external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        amount: Amount,
        user_id: &UserId,
    ) -> std::result::Result<Receipt, GatewayError>;
}

pub type ChargeSourceBox = Box<dyn ChargeSource>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
