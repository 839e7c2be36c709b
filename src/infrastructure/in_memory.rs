use crate::domain::charge::Charge;
use crate::domain::ports::ChargeSource;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory charge source.
///
/// Uses `Arc<RwLock<Vec<Charge>>>` so clones share the same records.
/// Charges are served in the order they were given.
#[derive(Default, Clone)]
pub struct InMemoryChargeSource {
    charges: Arc<RwLock<Vec<Charge>>>,
}

impl InMemoryChargeSource {
    /// Creates a new, empty in-memory charge source.
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<Vec<Charge>> for InMemoryChargeSource {
    fn from(charges: Vec<Charge>) -> Self {
        Self {
            charges: Arc::new(RwLock::new(charges)),
        }
    }
}

#[async_trait]
impl ChargeSource for InMemoryChargeSource {
    async fn charges(&self) -> Result<Vec<Charge>> {
        Ok(self.charges.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charge::Amount;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_in_memory_charge_source_preserves_order() {
        let source = InMemoryChargeSource::from(
            ["c1", "c2", "c3"]
                .into_iter()
                .map(|id| Charge::new(id, "b1", "u1", Amount::new(dec!(1.0)).unwrap(), 100))
                .collect::<Vec<_>>(),
        );

        let ids: Vec<String> = source
            .charges()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_in_memory_charge_source_starts_empty() {
        let source = InMemoryChargeSource::new();
        assert!(source.charges().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_charge_source_clones_share_records() {
        let source =
            InMemoryChargeSource::from(vec![Charge::new("c1", "b1", "u1", Amount::ZERO, 100)]);
        let clone = source.clone();

        assert_eq!(clone.charges().await.unwrap(), source.charges().await.unwrap());
    }
}
