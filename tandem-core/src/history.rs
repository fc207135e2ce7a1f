//! Per-user completion-history ledger.
//!
//! Every completion toggle writes one `+1`/`-1` through the store's
//! atomic increment against a `(user, day)` counter document. Counters
//! are never read-modify-written, so concurrent toggles from several
//! devices cannot lose updates. A per-user client-side cache holds the
//! most recently fetched range for presentation; fetched values win over
//! cached ones per day key.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tandem_types::{DayKey, UserId};
use tracing::warn;

use crate::Error;
use crate::store::{DocumentStore, Fields, Filter, collections, from_document};

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    day: DayKey,
    #[serde(default)]
    count: i64,
}

/// Ledger of how many completions each user logged per calendar day.
pub struct CompletionLedger<S> {
    store: Arc<S>,
    cache: RwLock<HashMap<UserId, BTreeMap<DayKey, u32>>>,
}

impl<S: DocumentStore> CompletionLedger<S> {
    /// Creates a ledger over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn doc_id(user: &UserId, day: DayKey) -> String {
        format!("{user}:{day}")
    }

    fn tag_fields(user: &UserId, day: DayKey) -> Fields {
        let mut fields = Fields::new();
        fields.insert("userId".to_string(), Value::from(user.as_str()));
        fields.insert("day".to_string(), Value::from(day.to_string()));
        fields
    }

    /// Records one completion for the user on the given day.
    ///
    /// # Errors
    ///
    /// Propagates store failures; the cache is only updated after the
    /// counter write succeeded.
    pub async fn increment(&self, user: &UserId, day: DayKey) -> Result<(), Error> {
        self.apply(user, day, 1).await
    }

    /// Removes one completion for the user on the given day.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn decrement(&self, user: &UserId, day: DayKey) -> Result<(), Error> {
        self.apply(user, day, -1).await
    }

    async fn apply(&self, user: &UserId, day: DayKey, delta: i64) -> Result<(), Error> {
        let id = Self::doc_id(user, day);
        self.store
            .atomic_increment(collections::COMPLETION_HISTORY, &id, "count", delta)
            .await?;
        // Tag fields make the document addressable by range query; the
        // merge never touches the counter.
        self.store
            .update(collections::COMPLETION_HISTORY, &id, Self::tag_fields(user, day))
            .await?;

        let mut cache = self.cache.write();
        let days = cache.entry(user.clone()).or_default();
        let entry = days.entry(day).or_insert(0);
        *entry = if delta >= 0 {
            entry.saturating_add(1)
        } else {
            entry.saturating_sub(1)
        };
        Ok(())
    }

    /// Fetches the user's counters from the first day of the month
    /// `months_back` months before `now`, merging them into the cache.
    ///
    /// Documents that fail to decode are logged and skipped; negative
    /// stored counts clamp to zero at the merge layer.
    ///
    /// # Errors
    ///
    /// Propagates store query failures.
    pub async fn fetch_range(
        &self,
        user: &UserId,
        months_back: u32,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<DayKey, u32>, Error> {
        let start = range_start(now, months_back)?;
        let docs = self
            .store
            .query(
                collections::COMPLETION_HISTORY,
                &[
                    Filter::eq("userId", user.as_str()),
                    Filter::ge("day", start.to_string()),
                ],
                None,
            )
            .await?;

        let mut fetched = BTreeMap::new();
        for doc in &docs {
            match from_document::<HistoryEntry>(doc) {
                Ok(entry) => {
                    let count = u32::try_from(entry.count.max(0)).unwrap_or(u32::MAX);
                    fetched.insert(entry.day, count);
                }
                Err(e) => {
                    warn!(doc = %doc.id, error = %e, "skipping undecodable history entry");
                }
            }
        }

        let mut cache = self.cache.write();
        let days = cache.entry(user.clone()).or_default();
        for (&day, &count) in &fetched {
            days.insert(day, count);
        }
        Ok(fetched)
    }

    /// The cached counters for a user, as of the last fetch or toggle.
    #[must_use]
    pub fn cached(&self, user: &UserId) -> BTreeMap<DayKey, u32> {
        self.cache.read().get(user).cloned().unwrap_or_default()
    }
}

/// First day of the month `months_back` months before `now`, in UTC.
fn range_start(now: DateTime<Utc>, months_back: u32) -> Result<DayKey, Error> {
    let today = DayKey::from_datetime(now);
    let index = today.month_index() - i64::from(months_back);
    let year = i32::try_from(index.div_euclid(12))
        .map_err(|_| Error::validation("history range out of calendar bounds"))?;
    let month0 = index.rem_euclid(12);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1)
        .map(DayKey::new)
        .ok_or_else(|| Error::validation("history range out of calendar bounds"))
}
