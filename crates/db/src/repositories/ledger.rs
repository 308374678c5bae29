//! PostgreSQL ledger store.
//!
//! A scope is one database transaction. It starts by locking the tenant's row
//! in `tenant_ledger_locks` with `SELECT ... FOR UPDATE`, so that lookups,
//! writes and balance recomputes for one tenant are serialized while other
//! tenants proceed in parallel. Dropping a scope without committing rolls the
//! transaction back.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbBackend, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, RuntimeErr, Set, SqlErr, Statement, TransactionTrait,
};
use tenantbook_core::ledger::{
    CanonicalKey, DateRange, EntryChanges, LedgerEntry, LedgerError, LedgerScope, LedgerStore,
    NewLedgerEntry, Posting,
};
use tenantbook_shared::types::{LedgerEntryId, TenantId};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entities::{tenant_ledger_locks, tenant_ledgers};

const ENSURE_LOCK_ROW_SQL: &str =
    "INSERT INTO tenant_ledger_locks (tenant_id) VALUES ($1) ON CONFLICT (tenant_id) DO NOTHING";

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Ledger store backed by the `tenant_ledgers` table.
#[derive(Debug, Clone)]
pub struct SeaOrmLedgerStore {
    db: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    /// Creates a store on top of a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl LedgerStore for SeaOrmLedgerStore {
    type Scope = SeaOrmLedgerScope;

    async fn begin(&self, tenant_id: TenantId) -> Result<SeaOrmLedgerScope, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        lock_tenant(&txn, tenant_id).await.map_err(store_error)?;
        debug!(tenant_id = %tenant_id, "Tenant ledger locked");
        Ok(SeaOrmLedgerScope { tenant_id, txn })
    }

    async fn tenant_ids(&self) -> Result<Vec<TenantId>, LedgerError> {
        let ids: Vec<Uuid> = tenant_ledgers::Entity::find()
            .select_only()
            .column(tenant_ledgers::Column::TenantId)
            .distinct()
            .order_by_asc(tenant_ledgers::Column::TenantId)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(ids.into_iter().map(TenantId::from_uuid).collect())
    }
}

/// Creates the tenant's lock row if needed, then locks it.
async fn lock_tenant(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<(), DbErr> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        ENSURE_LOCK_ROW_SQL,
        [tenant_id.into_inner().into()],
    ))
    .await?;

    tenant_ledger_locks::Entity::find_by_id(tenant_id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await?;
    Ok(())
}

/// One locked unit of work on a tenant's ledger.
pub struct SeaOrmLedgerScope {
    tenant_id: TenantId,
    txn: DatabaseTransaction,
}

impl SeaOrmLedgerScope {
    fn tenant_filter(&self) -> Condition {
        Condition::all().add(tenant_ledgers::Column::TenantId.eq(self.tenant_id.into_inner()))
    }

    async fn find_model(
        &self,
        id: LedgerEntryId,
    ) -> Result<Option<tenant_ledgers::Model>, LedgerError> {
        tenant_ledgers::Entity::find_by_id(id.get())
            .filter(self.tenant_filter())
            .one(&self.txn)
            .await
            .map_err(store_error)
    }
}

impl LedgerScope for SeaOrmLedgerScope {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn insert(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let tenant_id = self.tenant_id;
        let reference_no = entry.reference_no.clone();

        let model = new_active_model(tenant_id, entry)
            .insert(&self.txn)
            .await
            .map_err(|err| match (err.sql_err(), reference_no) {
                (Some(SqlErr::UniqueConstraintViolation(_)), Some(reference_no)) => {
                    LedgerError::DuplicateReference {
                        tenant_id,
                        reference_no,
                    }
                }
                _ => store_error(err),
            })?;

        to_entry(model)
    }

    async fn update(
        &mut self,
        id: LedgerEntryId,
        changes: &EntryChanges,
    ) -> Result<LedgerEntry, LedgerError> {
        let model = self
            .find_model(id)
            .await?
            .ok_or(LedgerError::EntryNotFound(id))?;

        let mut entry = to_entry(model.clone())?;
        changes.apply(&mut entry, Utc::now());

        let mut active = model.into_active_model();
        active.transaction_date = Set(entry.transaction_date);
        active.debit_amount = Set(entry.posting.debit_amount());
        active.credit_amount = Set(entry.posting.credit_amount());
        active.description = Set(entry.description);
        active.remarks = Set(entry.remarks);
        active.payment_method = Set(entry.payment_method);
        active.transfer_reference_no = Set(entry.transfer_reference_no);
        active.updated_at = Set(entry.updated_at.into());

        let updated = active.update(&self.txn).await.map_err(store_error)?;
        to_entry(updated)
    }

    async fn set_balance(&mut self, id: LedgerEntryId, balance: Decimal) -> Result<(), LedgerError> {
        let result = tenant_ledgers::Entity::update_many()
            .col_expr(tenant_ledgers::Column::Balance, Expr::value(balance))
            .filter(self.tenant_filter())
            .filter(tenant_ledgers::Column::Id.eq(id.get()))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Err(LedgerError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn delete(&mut self, id: LedgerEntryId) -> Result<LedgerEntry, LedgerError> {
        let model = self
            .find_model(id)
            .await?
            .ok_or(LedgerError::EntryNotFound(id))?;

        tenant_ledgers::Entity::delete_by_id(model.id)
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        to_entry(model)
    }

    async fn get(&self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, LedgerError> {
        self.find_model(id).await?.map(to_entry).transpose()
    }

    async fn find_by_reference(&self, reference_no: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        tenant_ledgers::Entity::find()
            .filter(self.tenant_filter())
            .filter(tenant_ledgers::Column::ReferenceNo.eq(reference_no))
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(to_entry)
            .transpose()
    }

    async fn list(&self, range: Option<DateRange>) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut condition = self.tenant_filter();
        if let Some(range) = range {
            if let Some(from) = range.from {
                condition = condition.add(tenant_ledgers::Column::TransactionDate.gte(from));
            }
            if let Some(to) = range.to {
                condition = condition.add(tenant_ledgers::Column::TransactionDate.lte(to));
            }
        }

        tenant_ledgers::Entity::find()
            .filter(condition)
            .order_by_asc(tenant_ledgers::Column::TransactionDate)
            .order_by_asc(tenant_ledgers::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(to_entry)
            .collect()
    }

    async fn last_before(&self, key: CanonicalKey) -> Result<Option<LedgerEntry>, LedgerError> {
        let before = Condition::any()
            .add(tenant_ledgers::Column::TransactionDate.lt(key.transaction_date))
            .add(
                Condition::all()
                    .add(tenant_ledgers::Column::TransactionDate.eq(key.transaction_date))
                    .add(tenant_ledgers::Column::Id.lt(key.id.get())),
            );

        tenant_ledgers::Entity::find()
            .filter(self.tenant_filter().add(before))
            .order_by_desc(tenant_ledgers::Column::TransactionDate)
            .order_by_desc(tenant_ledgers::Column::Id)
            .one(&self.txn)
            .await
            .map_err(store_error)?
            .map(to_entry)
            .transpose()
    }

    async fn list_from(&self, key: CanonicalKey) -> Result<Vec<LedgerEntry>, LedgerError> {
        let from = Condition::any()
            .add(tenant_ledgers::Column::TransactionDate.gt(key.transaction_date))
            .add(
                Condition::all()
                    .add(tenant_ledgers::Column::TransactionDate.eq(key.transaction_date))
                    .add(tenant_ledgers::Column::Id.gte(key.id.get())),
            );

        tenant_ledgers::Entity::find()
            .filter(self.tenant_filter().add(from))
            .order_by_asc(tenant_ledgers::Column::TransactionDate)
            .order_by_asc(tenant_ledgers::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(to_entry)
            .collect()
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(store_error)
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.txn.rollback().await.map_err(store_error)
    }
}

fn new_active_model(tenant_id: TenantId, entry: NewLedgerEntry) -> tenant_ledgers::ActiveModel {
    let now = Utc::now().into();
    tenant_ledgers::ActiveModel {
        tenant_id: Set(tenant_id.into_inner()),
        transaction_date: Set(entry.transaction_date),
        debit_amount: Set(entry.posting.debit_amount()),
        credit_amount: Set(entry.posting.credit_amount()),
        balance: Set(Decimal::ZERO),
        reference_no: Set(entry.reference_no),
        category: Set(entry.category.as_str().to_string()),
        description: Set(entry.description),
        payment_method: Set(entry.payment_method),
        transfer_reference_no: Set(entry.transfer_reference_no),
        remarks: Set(entry.remarks),
        created_by: Set(entry.created_by),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Converts a row into a domain entry.
///
/// # Errors
///
/// Returns an error if the row breaks the one-sided posting rule or carries
/// an unknown category.
pub fn to_entry(model: tenant_ledgers::Model) -> Result<LedgerEntry, LedgerError> {
    Ok(LedgerEntry {
        id: LedgerEntryId(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        transaction_date: model.transaction_date,
        posting: Posting::from_columns(model.debit_amount, model.credit_amount)?,
        balance: model.balance,
        reference_no: model.reference_no,
        category: model.category.parse()?,
        description: model.description,
        payment_method: model.payment_method,
        transfer_reference_no: model.transfer_reference_no,
        remarks: model.remarks,
        created_by: model.created_by,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

/// Maps a database error into a ledger error.
///
/// Serialization failures and deadlocks become
/// [`LedgerError::ConcurrentModification`] so callers can retry.
pub fn store_error(err: DbErr) -> LedgerError {
    if is_serialization_failure(&err) {
        warn!(error = %err, "Ledger transaction conflicted");
        return LedgerError::ConcurrentModification;
    }
    LedgerError::Store(err.to_string())
}

fn is_serialization_failure(err: &DbErr) -> bool {
    let (DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))) = err
    else {
        return false;
    };
    matches!(
        db_err.code().as_deref(),
        Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use tenantbook_core::ledger::EntryCategory;

    fn row(debit: Decimal, credit: Decimal, category: &str) -> tenant_ledgers::Model {
        let now = Utc::now().into();
        tenant_ledgers::Model {
            id: 42,
            tenant_id: Uuid::now_v7(),
            transaction_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            debit_amount: debit,
            credit_amount: credit,
            balance: dec!(1500),
            reference_no: Some("INV-B".to_string()),
            category: category.to_string(),
            description: "Maintenance Invoice INV-B - A-101".to_string(),
            payment_method: None,
            transfer_reference_no: None,
            remarks: Some("Boiler".to_string()),
            created_by: "System".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_converts_to_entry() {
        let model = row(dec!(500), Decimal::ZERO, "maintenance");
        let tenant_id = model.tenant_id;

        let entry = to_entry(model).unwrap();
        assert_eq!(entry.id, LedgerEntryId(42));
        assert_eq!(entry.tenant_id.into_inner(), tenant_id);
        assert_eq!(entry.posting, Posting::debit(dec!(500)).unwrap());
        assert_eq!(entry.balance, dec!(1500));
        assert_eq!(entry.category, EntryCategory::Maintenance);
        assert_eq!(entry.remarks.as_deref(), Some("Boiler"));
    }

    #[rstest]
    #[case(Decimal::ZERO, Decimal::ZERO)]
    #[case(dec!(10), dec!(10))]
    fn test_row_with_invalid_posting_is_rejected(#[case] debit: Decimal, #[case] credit: Decimal) {
        let err = to_entry(row(debit, credit, "rent")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPosting { .. }));
    }

    #[test]
    fn test_row_with_unknown_category_is_rejected() {
        let err = to_entry(row(dec!(10), Decimal::ZERO, "utilities")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_new_entry_starts_at_zero_balance() {
        let tenant_id = TenantId::new();
        let entry = NewLedgerEntry::new(
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            Posting::credit(dec!(1200)).unwrap(),
            "Payment",
            "alice",
        )
        .with_reference("PAY-C")
        .with_category(EntryCategory::RentPayment);

        let active = new_active_model(tenant_id, entry);
        assert_eq!(active.tenant_id, Set(tenant_id.into_inner()));
        assert_eq!(active.debit_amount, Set(Decimal::ZERO));
        assert_eq!(active.credit_amount, Set(dec!(1200)));
        assert_eq!(active.balance, Set(Decimal::ZERO));
        assert_eq!(active.category, Set("rent_payment".to_string()));
        assert!(active.id.is_not_set());
    }

    #[test]
    fn test_generic_db_errors_map_to_store_errors() {
        let err = store_error(DbErr::Custom("connection reset".to_string()));
        assert!(matches!(err, LedgerError::Store(ref msg) if msg.contains("connection reset")));
        assert!(!err.is_retryable());

        let err = store_error(DbErr::RecordNotFound("tenant_ledgers".to_string()));
        assert!(matches!(err, LedgerError::Store(_)));
    }
}
