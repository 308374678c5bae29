//! Balance recomputation engine.
//!
//! Every mutation of a tenant's entries is followed by a recompute that
//! restores the running-balance chain. A cascade walks forward from the
//! mutated position, anchored at the balance of the entry just before it; a
//! full recompute walks the whole ledger from zero. Both produce the same
//! balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenantbook_shared::types::{LedgerEntryId, TenantId};
use tenantbook_shared::{LedgerConfig, RecomputeStrategy};
use tracing::{debug, error};

use super::balance::{BalanceUpdate, running_balances, verify_chain};
use super::entry::{CanonicalKey, EntryChanges, LedgerEntry, NewLedgerEntry};
use super::error::LedgerError;
use super::store::LedgerScope;

/// Outcome of one recompute pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    /// Tenant that was recomputed.
    pub tenant_id: TenantId,
    /// Balance just before the first examined entry.
    pub starting_balance: Decimal,
    /// Number of entries walked.
    pub examined: usize,
    /// Entries whose persisted balance was stale.
    pub changes: Vec<BalanceUpdate>,
    /// Balance after the last examined entry (the anchor if none).
    pub final_balance: Decimal,
}

impl RecomputeReport {
    /// Returns true if no balance had to be rewritten.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Restores running balances after mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeEngine {
    strategy: RecomputeStrategy,
    verify: bool,
}

impl Default for RecomputeEngine {
    fn default() -> Self {
        Self::new(RecomputeStrategy::Cascade, true)
    }
}

impl RecomputeEngine {
    /// Creates an engine.
    ///
    /// With `verify` set, balances are re-read after writing and checked
    /// against the chain rule before the unit of work may commit.
    #[must_use]
    pub const fn new(strategy: RecomputeStrategy, verify: bool) -> Self {
        Self { strategy, verify }
    }

    /// Creates an engine from the ledger configuration.
    #[must_use]
    pub const fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.recompute_strategy, config.verify_after_recompute)
    }

    /// Strategy used after mutations.
    #[must_use]
    pub const fn strategy(&self) -> RecomputeStrategy {
        self.strategy
    }

    /// Recomputes every entry at or after `from`.
    pub async fn cascade<S: LedgerScope>(
        &self,
        scope: &mut S,
        from: CanonicalKey,
    ) -> Result<RecomputeReport, LedgerError> {
        let anchor = scope
            .last_before(from)
            .await?
            .map_or(Decimal::ZERO, |entry| entry.balance);
        let entries = scope.list_from(from).await?;
        self.rewrite(scope, anchor, &entries).await
    }

    /// Recomputes the tenant's whole ledger from a zero baseline.
    pub async fn full<S: LedgerScope>(&self, scope: &mut S) -> Result<RecomputeReport, LedgerError> {
        let entries = scope.list(None).await?;
        self.rewrite(scope, Decimal::ZERO, &entries).await
    }

    /// Computes what a full recompute would change without writing anything.
    pub async fn preview_full<S: LedgerScope>(
        &self,
        scope: &S,
    ) -> Result<RecomputeReport, LedgerError> {
        let tenant_id = scope.tenant_id();
        let entries = scope.list(None).await?;
        let updates = running_balances(tenant_id, Decimal::ZERO, &entries)?;
        Ok(report(tenant_id, Decimal::ZERO, &updates))
    }

    /// Restores the chain after a mutation at `from`, using the configured
    /// strategy.
    pub async fn settle<S: LedgerScope>(
        &self,
        scope: &mut S,
        from: CanonicalKey,
    ) -> Result<RecomputeReport, LedgerError> {
        match self.strategy {
            RecomputeStrategy::Cascade => self.cascade(scope, from).await,
            RecomputeStrategy::Full => self.full(scope).await,
        }
    }

    /// Inserts an entry and settles balances from its position.
    ///
    /// Returns the entry with its computed balance.
    pub async fn insert<S: LedgerScope>(
        &self,
        scope: &mut S,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, LedgerError> {
        entry.validate()?;
        let inserted = scope.insert(entry).await?;
        self.settle(scope, inserted.key()).await?;
        reload(scope, inserted.id).await
    }

    /// Applies changes to an entry and settles balances if needed.
    ///
    /// Changes that match the current values are dropped first. When the
    /// date moves, the walk starts from the earlier of the old and new
    /// positions. Returns `None` if nothing changed.
    pub async fn amend<S: LedgerScope>(
        &self,
        scope: &mut S,
        id: LedgerEntryId,
        changes: EntryChanges,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let current = scope.get(id).await?.ok_or(LedgerError::EntryNotFound(id))?;
        let changes = changes.against(&current);
        if changes.is_empty() {
            return Ok(None);
        }
        changes.validate()?;

        let updated = scope.update(id, &changes).await?;
        if changes.affects_balances() {
            self.settle(scope, current.key().min(updated.key())).await?;
        }
        reload(scope, id).await.map(Some)
    }

    /// Deletes an entry and settles balances from its former position.
    pub async fn remove<S: LedgerScope>(
        &self,
        scope: &mut S,
        id: LedgerEntryId,
    ) -> Result<LedgerEntry, LedgerError> {
        let removed = scope.delete(id).await?;
        self.settle(scope, removed.key()).await?;
        Ok(removed)
    }

    async fn rewrite<S: LedgerScope>(
        &self,
        scope: &mut S,
        anchor: Decimal,
        entries: &[LedgerEntry],
    ) -> Result<RecomputeReport, LedgerError> {
        let tenant_id = scope.tenant_id();
        let updates = running_balances(tenant_id, anchor, entries)?;

        for update in updates.iter().filter(|update| update.changed()) {
            scope.set_balance(update.id, update.new).await?;
        }

        if self.verify
            && let Some(first) = entries.first()
        {
            let persisted = scope.list_from(first.key()).await?;
            if let Err(err) = verify_chain(tenant_id, anchor, &persisted) {
                error!(tenant_id = %tenant_id, error = %err, "Running balance verification failed");
                return Err(err);
            }
        }

        let report = report(tenant_id, anchor, &updates);
        debug!(
            tenant_id = %tenant_id,
            examined = report.examined,
            rewritten = report.changes.len(),
            final_balance = %report.final_balance,
            "Recomputed running balances"
        );
        Ok(report)
    }
}

fn report(tenant_id: TenantId, anchor: Decimal, updates: &[BalanceUpdate]) -> RecomputeReport {
    RecomputeReport {
        tenant_id,
        starting_balance: anchor,
        examined: updates.len(),
        changes: updates.iter().copied().filter(BalanceUpdate::changed).collect(),
        final_balance: updates.last().map_or(anchor, |update| update.new),
    }
}

async fn reload<S: LedgerScope>(scope: &S, id: LedgerEntryId) -> Result<LedgerEntry, LedgerError> {
    scope.get(id).await?.ok_or(LedgerError::EntryNotFound(id))
}
