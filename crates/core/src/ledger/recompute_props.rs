//! Property-based tests for balance recomputation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tenantbook_shared::RecomputeStrategy;
use tenantbook_shared::types::TenantId;

use super::balance::verify_chain;
use super::entry::{EntryChanges, LedgerEntry, NewLedgerEntry, Posting};
use super::memory::MemoryLedgerStore;
use super::recompute::RecomputeEngine;
use super::store::{LedgerScope, LedgerStore};

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
struct Draft {
    day: u32,
    cents: i64,
    is_debit: bool,
}

impl Draft {
    fn posting(&self) -> Posting {
        let amount = Decimal::new(self.cents, 2);
        if self.is_debit {
            Posting::debit(amount).unwrap()
        } else {
            Posting::credit(amount).unwrap()
        }
    }

    fn date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, self.day).unwrap()
    }

    fn entry(&self, reference_no: String) -> NewLedgerEntry {
        NewLedgerEntry::new(self.date(), self.posting(), reference_no.clone(), "System")
            .with_reference(reference_no)
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Draft),
    Amend { pick: usize, draft: Draft },
    Delete { pick: usize },
}

fn draft_strategy() -> impl Strategy<Value = Draft> {
    (1u32..=28, 1i64..1_000_000, any::<bool>()).prop_map(|(day, cents, is_debit)| Draft {
        day,
        cents,
        is_debit,
    })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => draft_strategy().prop_map(Op::Insert),
        1 => (any::<usize>(), draft_strategy()).prop_map(|(pick, draft)| Op::Amend { pick, draft }),
        1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
    ]
}

fn strategy_strategy() -> impl Strategy<Value = RecomputeStrategy> {
    prop_oneof![Just(RecomputeStrategy::Cascade), Just(RecomputeStrategy::Full)]
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

/// Replays operations on a fresh tenant and returns the settled ledger.
async fn replay(engine: RecomputeEngine, ops: &[Op]) -> Vec<LedgerEntry> {
    let store = MemoryLedgerStore::new();
    let mut scope = store.begin(TenantId::new()).await.unwrap();
    for (n, op) in ops.iter().enumerate() {
        let live = scope.list(None).await.unwrap();
        match op {
            Op::Insert(draft) => {
                engine.insert(&mut scope, draft.entry(format!("REF-{n}"))).await.unwrap();
            }
            Op::Amend { pick, draft } if !live.is_empty() => {
                let target = &live[pick % live.len()];
                let changes = EntryChanges {
                    posting: Some(draft.posting()),
                    transaction_date: Some(draft.date()),
                    ..EntryChanges::default()
                };
                engine.amend(&mut scope, target.id, changes).await.unwrap();
            }
            Op::Delete { pick } if !live.is_empty() => {
                let target = live[pick % live.len()].id;
                engine.remove(&mut scope, target).await.unwrap();
            }
            Op::Amend { .. } | Op::Delete { .. } => {}
        }
    }
    scope.list(None).await.unwrap()
}

/// Inserts drafts in the given order and returns (reference, balance) pairs in
/// canonical order.
async fn insert_all(drafts: &[(String, Draft)]) -> Vec<(String, Decimal)> {
    let engine = RecomputeEngine::default();
    let store = MemoryLedgerStore::new();
    let mut scope = store.begin(TenantId::new()).await.unwrap();
    for (reference_no, draft) in drafts {
        engine.insert(&mut scope, draft.entry(reference_no.clone())).await.unwrap();
    }
    scope
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| (entry.reference_no.unwrap_or_default(), entry.balance))
        .collect()
}

// ============================================================================
// Property 1: Running Balance
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 1.1: Any mutation sequence settles into a valid chain**
    ///
    /// *For any* sequence of inserts, amendments and deletes, every entry's
    /// balance SHALL equal the previous balance plus its debit minus its
    /// credit, starting from zero.
    #[test]
    fn prop_mutations_settle_into_valid_chain(
        ops in prop::collection::vec(op_strategy(), 0..25),
        strategy in strategy_strategy(),
    ) {
        let entries = block_on(replay(RecomputeEngine::new(strategy, true), &ops));
        let tenant_id = entries.first().map_or_else(TenantId::new, |e| e.tenant_id);
        let last = verify_chain(tenant_id, Decimal::ZERO, &entries);
        prop_assert!(last.is_ok(), "chain broken: {:?}", last);

        let sum: Decimal = entries.iter().map(|e| e.posting.balance_change()).sum();
        prop_assert_eq!(last.unwrap(), sum);
    }

    /// **Property 1.2: Cascade and full recompute agree**
    #[test]
    fn prop_cascade_matches_full(
        ops in prop::collection::vec(op_strategy(), 0..25),
    ) {
        let cascade = block_on(replay(RecomputeEngine::new(RecomputeStrategy::Cascade, true), &ops));
        let full = block_on(replay(RecomputeEngine::new(RecomputeStrategy::Full, true), &ops));

        let balances = |entries: &[LedgerEntry]| -> Vec<(Option<String>, Decimal)> {
            entries.iter().map(|e| (e.reference_no.clone(), e.balance)).collect()
        };
        prop_assert_eq!(balances(&cascade), balances(&full));
    }
}

// ============================================================================
// Property 3: Recompute Idempotence
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 3.1: A second full recompute changes nothing**
    #[test]
    fn prop_full_recompute_is_idempotent(
        drafts in prop::collection::vec(draft_strategy(), 0..20),
    ) {
        let (first, second, before, after) = block_on(async {
            let engine = RecomputeEngine::default();
            let store = MemoryLedgerStore::new();
            let mut scope = store.begin(TenantId::new()).await.unwrap();
            for (n, draft) in drafts.iter().enumerate() {
                engine.insert(&mut scope, draft.entry(format!("REF-{n}"))).await.unwrap();
            }
            let before = scope.list(None).await.unwrap();
            let first = engine.full(&mut scope).await.unwrap();
            let second = engine.full(&mut scope).await.unwrap();
            let after = scope.list(None).await.unwrap();
            (first, second, before, after)
        });

        prop_assert!(first.is_clean());
        prop_assert!(second.is_clean());
        prop_assert_eq!(before, after);
    }
}

// ============================================================================
// Property 4: Order Independence
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 4.1: Insertion order does not change final balances**
    ///
    /// *For any* set of entries with distinct dates, inserting them in any
    /// order SHALL yield the same balances as inserting them in date order.
    #[test]
    fn prop_insertion_order_independent(
        drafts in prop::collection::btree_map(1u32..=28, (1i64..1_000_000, any::<bool>()), 1..10),
        seed in any::<u64>(),
    ) {
        let in_order: Vec<(String, Draft)> = drafts
            .iter()
            .map(|(day, (cents, is_debit))| {
                (format!("REF-{day}"), Draft { day: *day, cents: *cents, is_debit: *is_debit })
            })
            .collect();

        // Deterministic shuffle driven by the seed.
        let mut shuffled = in_order.clone();
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let j = usize::try_from(state >> 33).unwrap() % (i + 1);
            shuffled.swap(i, j);
        }

        let expected = block_on(insert_all(&in_order));
        let actual = block_on(insert_all(&shuffled));
        prop_assert_eq!(expected, actual);
    }
}

// ============================================================================
// Property 5: Delete Reverses Create
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 5.1: Creating then deleting an entry leaves the ledger as before**
    #[test]
    fn prop_delete_reverses_create(
        drafts in prop::collection::vec(draft_strategy(), 0..15),
        extra in draft_strategy(),
        strategy in strategy_strategy(),
    ) {
        let (before, after) = block_on(async {
            let engine = RecomputeEngine::new(strategy, true);
            let store = MemoryLedgerStore::new();
            let mut scope = store.begin(TenantId::new()).await.unwrap();
            for (n, draft) in drafts.iter().enumerate() {
                engine.insert(&mut scope, draft.entry(format!("REF-{n}"))).await.unwrap();
            }
            let before = scope.list(None).await.unwrap();

            let created = engine
                .insert(&mut scope, extra.entry("EXTRA".to_string()))
                .await
                .unwrap();
            engine.remove(&mut scope, created.id).await.unwrap();
            let after = scope.list(None).await.unwrap();
            (before, after)
        });

        prop_assert_eq!(before, after);
    }
}
