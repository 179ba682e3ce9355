//! Versioned in-process store
//!
//! Canonical state lives behind a single mutex and is only ever changed
//! through a [`Tx`]. Reads record the version of every row they observe
//! (including observing that a row is absent); writes are buffered in the
//! transaction. [`Tx::commit`] takes the lock once, re-validates every
//! observed version and applies all buffered writes together, or applies
//! nothing and reports [`CommitError::Conflict`]. Dropping a transaction
//! discards it.
//!
//! [`with_retry`] drives a closure over fresh transactions with jittered
//! exponential backoff until a commit lands or the attempt budget in
//! [`RetryPolicy`] is spent.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    fulfillment::records::{OrderRecord, OrderUuid},
    ids::CustomerUuid,
    ledger::records::{ProductRecord, ProductUuid, StockMovementRecord},
    promotions::records::{GiftRuleRecord, GiftRuleUuid, VoucherRecord, VoucherUuid},
};

/// Handle to the shared store. Cheap to clone; all clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction with empty read and write sets.
    pub(crate) fn begin(&self) -> Tx {
        Tx {
            store: self.clone(),
            reads: FxHashMap::default(),
            products: FxHashMap::default(),
            orders: FxHashMap::default(),
            gift_rules: FxHashMap::default(),
            vouchers: FxHashMap::default(),
            grant_increments: FxHashMap::default(),
            movements: Vec::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned mutex only means another thread panicked mid-read; the
        // data itself is only ever mutated by `commit` while holding the lock.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct Inner {
    products: FxHashMap<ProductUuid, Row<ProductRecord>>,
    orders: FxHashMap<OrderUuid, Row<OrderRecord>>,
    gift_rules: FxHashMap<GiftRuleUuid, Row<GiftRuleRecord>>,
    vouchers: FxHashMap<VoucherUuid, Row<VoucherRecord>>,
    voucher_codes: FxHashMap<String, VoucherUuid>,
    gift_grants: FxHashMap<(GiftRuleUuid, CustomerUuid), u64>,
    movements: Vec<StockMovementRecord>,
}

impl Inner {
    fn version_of(&self, key: &RowKey) -> Option<u64> {
        match key {
            RowKey::Product(uuid) => self.products.get(uuid).map(|row| row.version),
            RowKey::Order(uuid) => self.orders.get(uuid).map(|row| row.version),
            RowKey::GiftRule(uuid) => self.gift_rules.get(uuid).map(|row| row.version),
            RowKey::Voucher(uuid) => self.vouchers.get(uuid).map(|row| row.version),
            RowKey::VoucherCode(code) => self
                .voucher_codes
                .get(code)
                .and_then(|uuid| self.vouchers.get(uuid))
                .map(|row| row.version),
        }
    }
}

#[derive(Debug)]
struct Row<T> {
    version: u64,
    value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Product(ProductUuid),
    Order(OrderUuid),
    GiftRule(GiftRuleUuid),
    Voucher(VoucherUuid),
    VoucherCode(String),
}

/// Commit failure. The transaction applied nothing.
#[derive(Debug, Error)]
pub(crate) enum CommitError {
    #[error("transaction conflict")]
    Conflict,
}

/// An optimistic transaction over the store.
///
/// Reads return the buffered write when one exists, otherwise the current
/// store value, and pin the version seen for commit-time validation. A row
/// written without having been read is treated as an insert and must still
/// be absent at commit.
#[derive(Debug)]
pub(crate) struct Tx {
    store: Store,
    reads: FxHashMap<RowKey, Option<u64>>,
    products: FxHashMap<ProductUuid, ProductRecord>,
    orders: FxHashMap<OrderUuid, OrderRecord>,
    gift_rules: FxHashMap<GiftRuleUuid, GiftRuleRecord>,
    vouchers: FxHashMap<VoucherUuid, VoucherRecord>,
    grant_increments: FxHashMap<(GiftRuleUuid, CustomerUuid), u64>,
    movements: Vec<StockMovementRecord>,
}

impl Tx {
    pub(crate) fn product(&mut self, uuid: ProductUuid) -> Option<ProductRecord> {
        if let Some(buffered) = self.products.get(&uuid) {
            return Some(buffered.clone());
        }

        let found = {
            let inner = self.store.lock();
            inner
                .products
                .get(&uuid)
                .map(|row| (row.version, row.value.clone()))
        };

        self.observe(RowKey::Product(uuid), found.as_ref().map(|(version, _)| *version));
        found.map(|(_, value)| value)
    }

    /// Every product, with buffered writes overlaid. Read for audit sweeps.
    pub(crate) fn all_products(&mut self) -> Vec<ProductRecord> {
        let snapshot: Vec<(ProductUuid, u64, ProductRecord)> = {
            let inner = self.store.lock();
            inner
                .products
                .iter()
                .map(|(uuid, row)| (*uuid, row.version, row.value.clone()))
                .collect()
        };

        let mut merged: FxHashMap<ProductUuid, ProductRecord> = FxHashMap::default();
        for (uuid, version, value) in snapshot {
            self.observe(RowKey::Product(uuid), Some(version));
            merged.insert(uuid, value);
        }
        for (uuid, value) in &self.products {
            merged.insert(*uuid, value.clone());
        }

        let mut products: Vec<ProductRecord> = merged.into_values().collect();
        products.sort_by_key(|product| product.uuid);
        products
    }

    pub(crate) fn order(&mut self, uuid: OrderUuid) -> Option<OrderRecord> {
        if let Some(buffered) = self.orders.get(&uuid) {
            return Some(buffered.clone());
        }

        let found = {
            let inner = self.store.lock();
            inner
                .orders
                .get(&uuid)
                .map(|row| (row.version, row.value.clone()))
        };

        self.observe(RowKey::Order(uuid), found.as_ref().map(|(version, _)| *version));
        found.map(|(_, value)| value)
    }

    pub(crate) fn gift_rule(&mut self, uuid: GiftRuleUuid) -> Option<GiftRuleRecord> {
        if let Some(buffered) = self.gift_rules.get(&uuid) {
            return Some(buffered.clone());
        }

        let found = {
            let inner = self.store.lock();
            inner
                .gift_rules
                .get(&uuid)
                .map(|row| (row.version, row.value.clone()))
        };

        self.observe(RowKey::GiftRule(uuid), found.as_ref().map(|(version, _)| *version));
        found.map(|(_, value)| value)
    }

    /// Every gift rule, with buffered writes overlaid.
    pub(crate) fn gift_rules(&mut self) -> Vec<GiftRuleRecord> {
        let snapshot: Vec<(GiftRuleUuid, u64, GiftRuleRecord)> = {
            let inner = self.store.lock();
            inner
                .gift_rules
                .iter()
                .map(|(uuid, row)| (*uuid, row.version, row.value.clone()))
                .collect()
        };

        let mut merged: FxHashMap<GiftRuleUuid, GiftRuleRecord> = FxHashMap::default();
        for (uuid, version, value) in snapshot {
            self.observe(RowKey::GiftRule(uuid), Some(version));
            merged.insert(uuid, value);
        }
        for (uuid, value) in &self.gift_rules {
            merged.insert(*uuid, value.clone());
        }

        merged.into_values().collect()
    }

    pub(crate) fn voucher(&mut self, uuid: VoucherUuid) -> Option<VoucherRecord> {
        if let Some(buffered) = self.vouchers.get(&uuid) {
            return Some(buffered.clone());
        }

        let found = {
            let inner = self.store.lock();
            inner
                .vouchers
                .get(&uuid)
                .map(|row| (row.version, row.value.clone()))
        };

        self.observe(RowKey::Voucher(uuid), found.as_ref().map(|(version, _)| *version));
        found.map(|(_, value)| value)
    }

    /// Resolves a voucher by its public code. Pins both the code binding and
    /// the voucher row, so a concurrent registration of the same code or a
    /// concurrent redemption both surface as conflicts.
    pub(crate) fn voucher_by_code(&mut self, code: &str) -> Option<VoucherRecord> {
        if let Some(buffered) = self.vouchers.values().find(|voucher| voucher.code == code) {
            return Some(buffered.clone());
        }

        let found = {
            let inner = self.store.lock();
            inner.voucher_codes.get(code).and_then(|uuid| {
                inner
                    .vouchers
                    .get(uuid)
                    .map(|row| (*uuid, row.version, row.value.clone()))
            })
        };

        match found {
            Some((uuid, version, value)) => {
                self.observe(RowKey::VoucherCode(code.to_owned()), Some(version));
                self.observe(RowKey::Voucher(uuid), Some(version));
                Some(value)
            }
            None => {
                self.observe(RowKey::VoucherCode(code.to_owned()), None);
                None
            }
        }
    }

    /// Times this customer has been granted this rule, pending grants included.
    pub(crate) fn gift_grant_count(&mut self, rule: GiftRuleUuid, customer: CustomerUuid) -> u64 {
        let committed = {
            let inner = self.store.lock();
            inner.gift_grants.get(&(rule, customer)).copied().unwrap_or(0)
        };

        committed + self.grant_increments.get(&(rule, customer)).copied().unwrap_or(0)
    }

    /// Movement log for one product, oldest first, pending appends included.
    pub(crate) fn movements(&mut self, product: ProductUuid) -> Vec<StockMovementRecord> {
        let mut movements: Vec<StockMovementRecord> = {
            let inner = self.store.lock();
            inner
                .movements
                .iter()
                .filter(|movement| movement.product_uuid == product)
                .cloned()
                .collect()
        };

        movements.extend(
            self.movements
                .iter()
                .filter(|movement| movement.product_uuid == product)
                .cloned(),
        );
        movements
    }

    pub(crate) fn put_product(&mut self, product: ProductRecord) {
        self.products.insert(product.uuid, product);
    }

    pub(crate) fn put_order(&mut self, order: OrderRecord) {
        self.orders.insert(order.uuid, order);
    }

    pub(crate) fn put_gift_rule(&mut self, rule: GiftRuleRecord) {
        self.gift_rules.insert(rule.uuid, rule);
    }

    pub(crate) fn put_voucher(&mut self, voucher: VoucherRecord) {
        self.vouchers.insert(voucher.uuid, voucher);
    }

    /// Buffers one grant of `rule` to `customer`. Callers are expected to
    /// have read (and rewritten) the rule row in the same transaction, which
    /// is what serialises competing grants.
    pub(crate) fn record_gift_grant(&mut self, rule: GiftRuleUuid, customer: CustomerUuid) {
        *self.grant_increments.entry((rule, customer)).or_insert(0) += 1;
    }

    /// Appends to the movement log. The log is append-only; nothing in the
    /// store mutates or removes movements once committed.
    pub(crate) fn append_movement(&mut self, movement: StockMovementRecord) {
        self.movements.push(movement);
    }

    fn observe(&mut self, key: RowKey, version: Option<u64>) {
        self.reads.entry(key).or_insert(version);
    }

    /// Validates every observed version and applies the write set, all or
    /// nothing.
    pub(crate) fn commit(self) -> Result<(), CommitError> {
        let Tx {
            store,
            reads,
            products,
            orders,
            gift_rules,
            vouchers,
            grant_increments,
            movements,
        } = self;

        let mut inner = store.lock();

        for (key, observed) in &reads {
            if inner.version_of(key) != *observed {
                debug!(?key, "row changed since it was read");
                return Err(CommitError::Conflict);
            }
        }

        let inserts = products
            .keys()
            .map(|uuid| RowKey::Product(*uuid))
            .chain(orders.keys().map(|uuid| RowKey::Order(*uuid)))
            .chain(gift_rules.keys().map(|uuid| RowKey::GiftRule(*uuid)))
            .chain(vouchers.keys().map(|uuid| RowKey::Voucher(*uuid)));
        for key in inserts {
            if !reads.contains_key(&key) && inner.version_of(&key).is_some() {
                debug!(?key, "row created since the transaction began");
                return Err(CommitError::Conflict);
            }
        }

        for (uuid, value) in products {
            let version = inner.products.get(&uuid).map_or(1, |row| row.version + 1);
            inner.products.insert(uuid, Row { version, value });
        }
        for (uuid, value) in orders {
            let version = inner.orders.get(&uuid).map_or(1, |row| row.version + 1);
            inner.orders.insert(uuid, Row { version, value });
        }
        for (uuid, value) in gift_rules {
            let version = inner.gift_rules.get(&uuid).map_or(1, |row| row.version + 1);
            inner.gift_rules.insert(uuid, Row { version, value });
        }
        for (uuid, value) in vouchers {
            let version = inner.vouchers.get(&uuid).map_or(1, |row| row.version + 1);
            inner.voucher_codes.insert(value.code.clone(), uuid);
            inner.vouchers.insert(uuid, Row { version, value });
        }
        for ((rule, customer), count) in grant_increments {
            *inner.gift_grants.entry((rule, customer)).or_insert(0) += count;
        }
        inner.movements.extend(movements);

        Ok(())
    }
}

/// Bounded-retry configuration for optimistic transactions.
///
/// `max_attempts` counts total tries. Backoff before retry `n` is a random
/// delay up to `min(base_delay_ms * 2^(n-1), max_delay_ms)` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2,
            max_delay_ms: 40,
        }
    }
}

impl RetryPolicy {
    fn delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let cap = self
            .base_delay_ms
            .saturating_mul(1_u64 << shift)
            .min(self.max_delay_ms);
        let jittered = rand::thread_rng().gen_range(0..=cap);
        Duration::from_millis(jittered)
    }
}

/// Runs `op` against fresh transactions until one commits.
///
/// Domain errors from `op` abort immediately with nothing applied. Commit
/// conflicts retry with jittered backoff; once `policy.max_attempts` tries
/// are spent the caller's `exhausted` error is returned.
pub(crate) async fn with_retry<T, E, F>(
    store: &Store,
    policy: &RetryPolicy,
    exhausted: impl Fn() -> E,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(&mut Tx) -> Result<T, E>,
{
    let mut conflicts = 0_u32;

    loop {
        let mut tx = store.begin();
        let value = op(&mut tx)?;

        match tx.commit() {
            Ok(()) => return Ok(value),
            Err(CommitError::Conflict) => {
                conflicts += 1;
                if conflicts >= policy.max_attempts {
                    warn!(attempts = conflicts, "transaction retries exhausted");
                    return Err(exhausted());
                }

                debug!(attempt = conflicts, "transaction conflict, backing off");
                let delay = policy.delay(conflicts);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
