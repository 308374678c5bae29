//! Document synchronizer.
//!
//! Binds each billing document to at most one ledger entry through its
//! reference number. Each event is one unit of work on the tenant: locate the
//! entry by reference, write, then settle balances.
//!
//! Under [`SyncPolicy::BestEffort`] failures are logged and reported as a
//! [`SyncOutcome`] so the document write can proceed. Integrity failures from
//! the recompute engine are always returned as errors.

use std::sync::Arc;

use serde::Serialize;
use tenantbook_shared::types::{LedgerEntryId, TenantId};
use tenantbook_shared::{LedgerConfig, SyncPolicy};
use tracing::{debug, error, info, warn};

use crate::ledger::{
    EntryChanges, LedgerEntry, LedgerError, LedgerScope, LedgerStore, NewLedgerEntry,
    RecomputeEngine,
};

use super::description::describe;
use super::document::{BillingDocument, ChangedFields};

/// Who is acting, and whether the ledger should be touched at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    created_by: String,
    skip_sync: bool,
}

impl SyncContext {
    /// Context for a user-initiated change.
    #[must_use]
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            skip_sync: false,
        }
    }

    /// Context for system-initiated changes.
    #[must_use]
    pub fn system(config: &LedgerConfig) -> Self {
        Self::new(config.system_user.clone())
    }

    /// Marks the change as already reflected in the ledger.
    ///
    /// Used when a document is updated as a consequence of a ledger entry,
    /// such as an invoice marked paid by a matching payment.
    #[must_use]
    pub fn skipping_sync(mut self) -> Self {
        self.skip_sync = true;
        self
    }

    /// Author recorded on created entries.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Returns true if the event must not touch the ledger.
    #[must_use]
    pub const fn skip_sync(&self) -> bool {
        self.skip_sync
    }
}

/// What a document event did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A new entry was created.
    Created(LedgerEntry),
    /// The document already had an entry.
    AlreadySynced,
    /// The caller asked to skip synchronization.
    Skipped,
    /// No monitored field changed.
    Ignored,
    /// The entry already matched the document.
    Unchanged {
        /// Linked entry.
        entry_id: LedgerEntryId,
    },
    /// The entry was rewritten.
    Updated(LedgerEntry),
    /// The entry was deleted.
    Deleted(LedgerEntry),
    /// The document had no entry to update or delete.
    MissingEntry,
    /// Synchronization failed and was tolerated.
    Failed {
        /// Error message.
        reason: String,
    },
}

/// Applies document lifecycle events to the tenant ledger.
pub struct DocumentSynchronizer<S: LedgerStore> {
    store: Arc<S>,
    engine: RecomputeEngine,
    policy: SyncPolicy,
}

impl<S: LedgerStore> DocumentSynchronizer<S> {
    /// Creates a synchronizer.
    #[must_use]
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            engine: RecomputeEngine::from_config(config),
            policy: config.sync_policy,
        }
    }

    /// Failure policy in effect.
    #[must_use]
    pub const fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Entry currently linked to a reference number, if any.
    pub async fn linked_entry(
        &self,
        tenant_id: TenantId,
        reference_no: &str,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let scope = self.store.begin(tenant_id).await?;
        let entry = scope.find_by_reference(reference_no).await?;
        scope.rollback().await?;
        Ok(entry)
    }

    /// Handles a newly created document.
    ///
    /// Creating twice with the same reference yields one entry.
    pub async fn on_document_created(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
        ctx: &SyncContext,
    ) -> Result<SyncOutcome, LedgerError> {
        if ctx.skip_sync() {
            debug!(tenant_id = %tenant_id, reference_no = %document.reference_no, "Ledger sync skipped");
            return Ok(SyncOutcome::Skipped);
        }
        let result = self.create(tenant_id, document, ctx).await;
        self.resolve(tenant_id, document, "create", result)
    }

    /// Handles a document update.
    ///
    /// Only changes to monitored fields (amount, status, description inputs)
    /// are synced. The entry keeps its transaction date.
    pub async fn on_document_changed(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
        changed: &ChangedFields,
        ctx: &SyncContext,
    ) -> Result<SyncOutcome, LedgerError> {
        if ctx.skip_sync() {
            return Ok(SyncOutcome::Skipped);
        }
        if !changed.touches_ledger() {
            return Ok(SyncOutcome::Ignored);
        }
        let result = self.update(tenant_id, document).await;
        self.resolve(tenant_id, document, "update", result)
    }

    /// Handles a deleted document by deleting its entry.
    pub async fn on_document_deleted(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
        ctx: &SyncContext,
    ) -> Result<SyncOutcome, LedgerError> {
        if ctx.skip_sync() {
            return Ok(SyncOutcome::Skipped);
        }
        let result = self.delete(tenant_id, document).await;
        self.resolve(tenant_id, document, "delete", result)
    }

    async fn create(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
        ctx: &SyncContext,
    ) -> Result<SyncOutcome, LedgerError> {
        let mut scope = self.store.begin(tenant_id).await?;
        if scope.find_by_reference(&document.reference_no).await?.is_some() {
            scope.rollback().await?;
            return Ok(SyncOutcome::AlreadySynced);
        }

        let posting = document.posting()?;
        let description = description_for(tenant_id, document);
        let entry = NewLedgerEntry::new(
            document.transaction_date,
            posting,
            description,
            ctx.created_by(),
        )
        .with_reference(document.reference_no.clone())
        .with_category(document.kind.category())
        .with_remarks(document.remarks.clone())
        .with_payment(
            document.payment_method.clone(),
            document.transfer_reference_no.clone(),
        );

        let created = self.engine.insert(&mut scope, entry).await?;
        scope.commit().await?;

        info!(
            tenant_id = %tenant_id,
            reference_no = %document.reference_no,
            entry_id = %created.id,
            balance = %created.balance,
            "Created ledger entry for {}",
            document.kind.label()
        );
        Ok(SyncOutcome::Created(created))
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
    ) -> Result<SyncOutcome, LedgerError> {
        let mut scope = self.store.begin(tenant_id).await?;
        let Some(current) = scope.find_by_reference(&document.reference_no).await? else {
            return Err(LedgerError::MissingLinkedEntry {
                tenant_id,
                reference_no: document.reference_no.clone(),
            });
        };

        let changes = EntryChanges {
            posting: Some(document.posting()?),
            description: Some(description_for(tenant_id, document)),
            remarks: Some(document.remarks.clone()),
            ..EntryChanges::default()
        };
        let Some(updated) = self.engine.amend(&mut scope, current.id, changes).await? else {
            scope.rollback().await?;
            return Ok(SyncOutcome::Unchanged {
                entry_id: current.id,
            });
        };
        scope.commit().await?;

        info!(
            tenant_id = %tenant_id,
            reference_no = %document.reference_no,
            entry_id = %updated.id,
            balance = %updated.balance,
            "Updated ledger entry for {}",
            document.kind.label()
        );
        Ok(SyncOutcome::Updated(updated))
    }

    async fn delete(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
    ) -> Result<SyncOutcome, LedgerError> {
        let mut scope = self.store.begin(tenant_id).await?;
        let Some(current) = scope.find_by_reference(&document.reference_no).await? else {
            return Err(LedgerError::MissingLinkedEntry {
                tenant_id,
                reference_no: document.reference_no.clone(),
            });
        };

        let removed = self.engine.remove(&mut scope, current.id).await?;
        scope.commit().await?;

        info!(
            tenant_id = %tenant_id,
            reference_no = %document.reference_no,
            entry_id = %removed.id,
            "Deleted ledger entry for {}",
            document.kind.label()
        );
        Ok(SyncOutcome::Deleted(removed))
    }

    fn resolve(
        &self,
        tenant_id: TenantId,
        document: &BillingDocument,
        action: &str,
        result: Result<SyncOutcome, LedgerError>,
    ) -> Result<SyncOutcome, LedgerError> {
        let err = match result {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        if err.is_integrity_failure() {
            error!(
                tenant_id = %tenant_id,
                reference_no = %document.reference_no,
                error = %err,
                "Ledger {action} aborted: balances could not be settled"
            );
            return Err(err);
        }

        if let LedgerError::DuplicateReference { .. } = err {
            debug!(
                tenant_id = %tenant_id,
                reference_no = %document.reference_no,
                "Ledger entry already exists"
            );
            return Ok(SyncOutcome::AlreadySynced);
        }

        match (self.policy, err) {
            (SyncPolicy::Atomic, err) => {
                error!(
                    tenant_id = %tenant_id,
                    reference_no = %document.reference_no,
                    error = %err,
                    "Ledger {action} failed"
                );
                Err(err)
            }
            (SyncPolicy::BestEffort, err @ LedgerError::MissingLinkedEntry { .. }) => {
                warn!(
                    tenant_id = %tenant_id,
                    reference_no = %document.reference_no,
                    error = %err,
                    "Ledger {action} skipped: no linked entry"
                );
                Ok(SyncOutcome::MissingEntry)
            }
            (SyncPolicy::BestEffort, err) => {
                error!(
                    tenant_id = %tenant_id,
                    reference_no = %document.reference_no,
                    error = %err,
                    "Ledger {action} failed, document change kept"
                );
                Ok(SyncOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }
}

fn description_for(tenant_id: TenantId, document: &BillingDocument) -> String {
    let description = describe(document);
    for fallback in &description.fallbacks {
        warn!(
            tenant_id = %tenant_id,
            reference_no = %document.reference_no,
            error = %fallback,
            "Using placeholder in ledger description"
        );
    }
    description.text
}
