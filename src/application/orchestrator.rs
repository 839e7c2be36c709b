use crate::application::batch::{BatchExecutor, FailurePolicy, InFlightJobs, Job, JobResult};
use crate::domain::charge::{Amount, UnixSeconds, UserId};
use crate::domain::ledger::{self, LedgerItem, LedgerScope, ScopeQuery};
use crate::domain::ports::{ChargeSourceBox, PaymentGatewayRef};
use crate::error::Result;
use tracing::{debug, info, instrument};

/// Number of simultaneous calls the payment processor accepts.
pub const PAYMENT_CONCURRENCY: usize = 5;

/// How a settlement run drives the batch executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementConfig {
    pub concurrency: usize,
    pub policy: FailurePolicy,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            concurrency: PAYMENT_CONCURRENCY,
            policy: FailurePolicy::FailFast,
        }
    }
}

/// A payment that has been decided but not yet sent to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentJob {
    pub amount: Amount,
    pub user_id: UserId,
}

impl PaymentJob {
    /// Bills the whole ledger item to the user of its first charge.
    ///
    /// A ledger item is keyed by building and due time, so its charges may
    /// belong to several users; only the first one is billed.
    pub fn for_ledger_item(item: &LedgerItem) -> Self {
        Self {
            amount: item.amount(),
            user_id: item.first_user().clone(),
        }
    }

    pub fn into_job(self, gateway: PaymentGatewayRef) -> Job {
        Job::new(move || async move {
            let receipt = gateway.charge(self.amount, &self.user_id).await?;
            debug!(
                reference = %receipt.reference,
                user_id = %receipt.user_id,
                amount = %receipt.amount,
                "Payment settled"
            );
            JobResult::Ok(())
        })
    }
}

/// Builds one payment per ledger item, in ledger order.
pub fn payment_jobs(items: &[LedgerItem]) -> Vec<PaymentJob> {
    items.iter().map(PaymentJob::for_ledger_item).collect()
}

/// Entry point for ledger queries and payment settlement.
///
/// `PaymentOrchestrator` owns its collaborators: the charge source it reads
/// from and the gateway payments are sent to. It keeps no settlement state
/// between calls, only the payments a failed run left in flight.
pub struct PaymentOrchestrator {
    charge_source: ChargeSourceBox,
    gateway: PaymentGatewayRef,
    config: SettlementConfig,
    in_flight: InFlightJobs,
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator` with the default settlement config.
    ///
    /// # Arguments
    ///
    /// * `charge_source` - Where charges are read from.
    /// * `gateway` - The payment processor used by settlement.
    pub fn new(charge_source: ChargeSourceBox, gateway: PaymentGatewayRef) -> Self {
        Self {
            charge_source,
            gateway,
            config: SettlementConfig::default(),
            in_flight: InFlightJobs::new(),
        }
    }

    pub fn with_config(mut self, config: SettlementConfig) -> Self {
        self.config = config;
        self
    }

    /// Lists the ledger items of one building or one user, most recent first.
    ///
    /// The scope is validated before any charge is read.
    #[instrument(skip(self))]
    pub async fn list_ledger_items(&self, query: ScopeQuery) -> Result<Vec<LedgerItem>> {
        let scope = LedgerScope::try_from(query)?;
        let charges = self.charge_source.charges().await?;

        let mut items = ledger::aggregate(ledger::select_by_scope(&charges, &scope));
        ledger::sort_by_due_desc(&mut items);

        debug!(ledger_items = items.len(), "Ledger listed");
        Ok(items)
    }

    /// Pays every ledger item due at or before `now`.
    ///
    /// Nothing is recorded about which items were paid: a failed run may have
    /// paid any prefix of the items, and a second run pays all due items again.
    #[instrument(skip(self))]
    pub async fn settle_due_payments(&self, now: UnixSeconds) -> Result<()> {
        let executor = BatchExecutor::new(self.config.concurrency)?
            .with_policy(self.config.policy)
            .with_in_flight(self.in_flight.clone());
        let charges = self.charge_source.charges().await?;

        let due = ledger::select_due(&charges, now);
        let due_charges = due.len();
        let items = ledger::aggregate(due);

        let jobs: Vec<Job> = payment_jobs(&items)
            .into_iter()
            .map(|payment| payment.into_job(self.gateway.clone()))
            .collect();

        info!(
            due_charges,
            ledger_items = items.len(),
            waves = executor.wave_sizes(jobs.len()).len(),
            "Settling due payments"
        );
        executor.run(jobs).await?;
        info!(ledger_items = items.len(), "Settlement complete");
        Ok(())
    }

    /// Waits for payments a failed settlement left running.
    ///
    /// A fail-fast run returns on the first failure while the rest of its wave
    /// is still talking to the gateway. Call this before shutting the runtime
    /// down so those payments are not cut off.
    pub async fn wait_for_in_flight(&self) {
        self.in_flight.wait().await;
    }
}
