//! Ledger aggregation.
//!
//! A ledger item groups every charge sharing a `(building_id, due_at)` key. The
//! functions here are pure: they take charges by value or reference and return
//! new collections, so they can be called from any context without setup.

use super::charge::{Amount, BuildingId, Charge, UnixSeconds, UserId};
use crate::error::{LedgerError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Aggregate of all charges sharing a building and a due time.
///
/// Only `aggregate` creates ledger items, always from a seed charge, so the
/// charge list is never empty and `amount` always equals the sum of the charges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerItem {
    due_at: UnixSeconds,
    amount: Amount,
    building_id: BuildingId,
    charges: Vec<Charge>,
}

impl LedgerItem {
    fn seed(charge: Charge) -> Self {
        Self {
            due_at: charge.due_at,
            amount: charge.amount,
            building_id: charge.building_id.clone(),
            charges: vec![charge],
        }
    }

    fn merge(&mut self, charge: Charge) {
        self.amount += charge.amount;
        self.charges.push(charge);
    }

    pub fn due_at(&self) -> UnixSeconds {
        self.due_at
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn building_id(&self) -> &BuildingId {
        &self.building_id
    }

    /// Constituent charges, in the order they were encountered.
    pub fn charges(&self) -> &[Charge] {
        &self.charges
    }

    /// The user of the first charge merged into this item.
    pub fn first_user(&self) -> &UserId {
        &self.charges[0].user_id
    }
}

/// Which charges a ledger listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerScope {
    Building(BuildingId),
    User(UserId),
}

impl LedgerScope {
    pub fn matches(&self, charge: &Charge) -> bool {
        match self {
            LedgerScope::Building(building_id) => &charge.building_id == building_id,
            LedgerScope::User(user_id) => &charge.user_id == user_id,
        }
    }
}

/// Raw selector pair as received from a caller.
///
/// Exactly one of the two must be set; see `TryFrom<ScopeQuery> for LedgerScope`.
/// An empty id counts as not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeQuery {
    pub building_id: Option<BuildingId>,
    pub user_id: Option<UserId>,
}

impl ScopeQuery {
    pub fn building(building_id: impl Into<String>) -> Self {
        Self {
            building_id: Some(BuildingId::new(building_id)),
            user_id: None,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            building_id: None,
            user_id: Some(UserId::new(user_id)),
        }
    }
}

impl TryFrom<ScopeQuery> for LedgerScope {
    type Error = LedgerError;

    fn try_from(query: ScopeQuery) -> Result<Self> {
        let building_id = query.building_id.filter(|id| !id.as_str().is_empty());
        let user_id = query.user_id.filter(|id| !id.as_str().is_empty());
        match (building_id, user_id) {
            (Some(building_id), None) => Ok(LedgerScope::Building(building_id)),
            (None, Some(user_id)) => Ok(LedgerScope::User(user_id)),
            (Some(building_id), Some(user_id)) => Err(LedgerError::ScopeValidationError(format!(
                "building_id ({building_id}) and user_id ({user_id}) are mutually exclusive"
            ))),
            (None, None) => Err(LedgerError::ScopeValidationError(
                "one of building_id or user_id is required".to_string(),
            )),
        }
    }
}

/// Returns the charges covered by `scope`, in input order.
pub fn select_by_scope(charges: &[Charge], scope: &LedgerScope) -> Vec<Charge> {
    charges
        .iter()
        .filter(|charge| scope.matches(charge))
        .cloned()
        .collect()
}

/// Returns the charges due at or before `now`, in input order.
pub fn select_due(charges: &[Charge], now: UnixSeconds) -> Vec<Charge> {
    charges
        .iter()
        .filter(|charge| charge.is_due(now))
        .cloned()
        .collect()
}

/// Groups charges into ledger items keyed by `(building_id, due_at)`.
///
/// Items come out in the order their key was first seen.
pub fn aggregate(charges: impl IntoIterator<Item = Charge>) -> Vec<LedgerItem> {
    let mut items: Vec<LedgerItem> = Vec::new();
    let mut index: HashMap<(BuildingId, UnixSeconds), usize> = HashMap::new();

    for charge in charges {
        let key = (charge.building_id.clone(), charge.due_at);
        match index.get(&key) {
            Some(&position) => items[position].merge(charge),
            None => {
                index.insert(key, items.len());
                items.push(LedgerItem::seed(charge));
            }
        }
    }

    items
}

/// Sorts ledger items most recent first. Ties keep their relative order.
pub fn sort_by_due_desc(items: &mut [LedgerItem]) {
    items.sort_by(|a, b| b.due_at.cmp(&a.due_at));
}
