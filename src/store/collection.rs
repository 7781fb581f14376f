use crate::event::{DeltaAction, DomainRecord};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// What a delta actually did to a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliedAction {
    /// New record prepended
    Created,
    /// Existing record replaced in place
    Updated,
    /// Record removed
    Deleted,
}

/// Ordered collection of records for one domain.
///
/// Newest-first for creates; updates never move a record. Readers get an
/// `Arc` of the record list, so a snapshot handed out stays frozen while the
/// collection moves on (writes clone-on-write when a snapshot is alive).
#[derive(Clone, Debug, Default)]
pub struct DomainCollection {
    records: Arc<Vec<DomainRecord>>,
    last_update: Option<DateTime<Utc>>,
}

impl DomainCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action.
    ///
    /// - create: prepend, or replace in place if the id already exists
    /// - update: replace in place, or prepend if the id is missing
    /// - delete: remove; absent id is a no-op and returns `None`
    pub fn apply(
        &mut self,
        action: DeltaAction,
        record: DomainRecord,
        now: DateTime<Utc>,
    ) -> Option<(AppliedAction, DomainRecord)> {
        let position = self.position(&record.id);

        let applied = match (action, position) {
            (DeltaAction::Create | DeltaAction::Update, Some(pos)) => {
                Arc::make_mut(&mut self.records)[pos] = record.clone();
                (AppliedAction::Updated, record)
            }
            (DeltaAction::Create | DeltaAction::Update, None) => {
                Arc::make_mut(&mut self.records).insert(0, record.clone());
                (AppliedAction::Created, record)
            }
            (DeltaAction::Delete, Some(pos)) => {
                let removed = Arc::make_mut(&mut self.records).remove(pos);
                (AppliedAction::Deleted, removed)
            }
            (DeltaAction::Delete, None) => return None,
        };

        self.last_update = Some(now);
        Some(applied)
    }

    /// Swap in a whole new record list.
    ///
    /// Later duplicates of an id are dropped. Returns the number of records kept.
    pub fn replace_all(&mut self, records: Vec<DomainRecord>, now: DateTime<Utc>) -> usize {
        let mut seen = HashSet::with_capacity(records.len());
        let deduped: Vec<DomainRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();

        let count = deduped.len();
        self.records = Arc::new(deduped);
        self.last_update = Some(now);
        count
    }

    /// Empty the collection and forget the last update time
    pub fn clear(&mut self) {
        self.records = Arc::new(Vec::new());
        self.last_update = None;
    }

    pub fn snapshot(&self) -> Arc<Vec<DomainRecord>> {
        Arc::clone(&self.records)
    }

    pub fn get(&self, id: &str) -> Option<&DomainRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }
}
