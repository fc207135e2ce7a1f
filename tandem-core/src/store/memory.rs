//! In-memory reference implementation of [`DocumentStore`].
//!
//! Used by tests and by embedders that have no hosted backend. Documents
//! live in per-collection ordered maps; live subscriptions re-run their
//! query after every mutation of the watched collection and fan the full
//! result set out over unbounded channels. Watchers whose receiver has
//! been dropped are pruned on the next delivery attempt.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    Document, DocumentStore, Fields, Filter, FilterOp, OrderBy, StoreError, Subscription,
    SubscriptionId,
};

struct Watcher {
    collection: String,
    filters: Vec<Filter>,
    tx: mpsc::UnboundedSender<Vec<Document>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    watchers: HashMap<u64, Watcher>,
    next_watcher: u64,
}

/// In-memory document store with live-query fan-out.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    write_fault: AtomicBool,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a backend error, for
    /// exercising degraded-path behavior in tests.
    pub fn set_write_fault(&self, enabled: bool) {
        self.write_fault.store(enabled, AtomicOrdering::SeqCst);
    }

    /// Number of documents currently held in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Whether a collection holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.write_fault.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::backend("injected write fault"));
        }
        Ok(())
    }

    fn run_query(
        inner: &Inner,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
    ) -> Vec<Document> {
        let Some(docs) = inner.collections.get(collection) else {
            return Vec::new();
        };
        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, fields)| filters.iter().all(|f| matches_filter(fields, f)))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();
        if let Some(order) = order {
            // Stable sort over the id-ordered map keeps ties id-ascending.
            matched.sort_by(|a, b| {
                let lhs = a.fields.get(&order.field).unwrap_or(&Value::Null);
                let rhs = b.fields.get(&order.field).unwrap_or(&Value::Null);
                let ord = compare_values(lhs, rhs).unwrap_or(std::cmp::Ordering::Equal);
                if order.descending { ord.reverse() } else { ord }
            });
        }
        matched
    }

    /// Re-runs every watcher query on the collection and delivers the
    /// result set; watchers with a dropped receiver are removed.
    fn notify(inner: &mut Inner, collection: &str) {
        let deliveries: Vec<(u64, Vec<Document>)> = inner
            .watchers
            .iter()
            .filter(|(_, w)| w.collection == collection)
            .map(|(id, w)| (*id, Self::run_query(inner, collection, &w.filters, None)))
            .collect();
        for (id, docs) in deliveries {
            let closed = inner
                .watchers
                .get(&id)
                .is_some_and(|w| w.tx.send(docs).is_err());
            if closed {
                inner.watchers.remove(&id);
            }
        }
    }
}

fn matches_filter(fields: &Fields, filter: &Filter) -> bool {
    let value = fields.get(&filter.field).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => *value == filter.value,
        FilterOp::Ge => {
            compare_values(value, &filter.value).is_some_and(std::cmp::Ordering::is_ge)
        }
        FilterOp::Le => {
            compare_values(value, &filter.value).is_some_and(std::cmp::Ordering::is_le)
        }
        FilterOp::Contains => value
            .as_array()
            .is_some_and(|items| items.contains(&filter.value)),
    }
}

fn compare_values(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(std::cmp::Ordering::Equal),
        _ => None,
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read();
        Ok(Self::run_query(&inner, collection, filters, order))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.inner.write();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.inner.write();
        let doc = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        for (key, value) in fields {
            doc.insert(key, value);
        }
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.inner.write();
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            Self::notify(&mut inner, collection);
        }
        Ok(())
    }

    async fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut inner = self.inner.write();
        let doc = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
        doc.insert(field.to_string(), Value::from(current + delta));
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn subscribe(&self, collection: &str, filters: Vec<Filter>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write();
        let id = inner.next_watcher;
        inner.next_watcher += 1;
        // Initial snapshot delivery, then one per mutation.
        let initial = Self::run_query(&inner, collection, &filters, None);
        let _ = tx.send(initial);
        inner.watchers.insert(
            id,
            Watcher {
                collection: collection.to_string(),
                filters,
                tx,
            },
        );
        Subscription {
            id: SubscriptionId(id),
            rx,
        }
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.write().watchers.remove(&id.0);
    }
}
