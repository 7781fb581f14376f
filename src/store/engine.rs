use crate::bus::{ClientEvent, EventBus};
use crate::event::{DeltaAction, Domain, DomainRecord};
use crate::store::collection::{AppliedAction, DomainCollection};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Notification payload for one applied delta
#[derive(Clone, Debug)]
pub struct AppliedChange {
    pub domain: Domain,
    /// Action as sent by the server
    pub requested: DeltaAction,
    /// Action as applied (a create may land as an update and vice versa)
    pub applied: AppliedAction,
    /// The record written, or the record removed for deletes
    pub record: DomainRecord,
    /// Collection contents after the change
    pub records: Arc<Vec<DomainRecord>>,
    /// Local processing time, also written to the collection's `last_update`
    pub applied_at: DateTime<Utc>,
    /// Sender-assigned time, if the delta carried one
    pub emitted_at: Option<DateTime<Utc>>,
}

/// Notification payload for a full replace
#[derive(Clone, Debug)]
pub struct ResyncSummary {
    pub domain: Domain,
    pub count: usize,
    pub records: Arc<Vec<DomainRecord>>,
    pub applied_at: DateTime<Utc>,
}

/// In-memory live state: one collection per domain.
///
/// Each collection sits behind its own lock, so a `set_all` and an
/// `apply_delta` on the same domain never interleave. Notifications go out
/// after the lock is released, so listeners may read the store.
pub struct LiveStore {
    collections: Vec<RwLock<DomainCollection>>,
    bus: Arc<EventBus>,
}

impl LiveStore {
    /// Create empty store publishing to `bus`
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            collections: Domain::ALL
                .iter()
                .map(|_| RwLock::new(DomainCollection::new()))
                .collect(),
            bus,
        }
    }

    /// Apply a create/update/delete to one domain.
    ///
    /// Returns `None` (and notifies nobody) when nothing changed, which only
    /// happens for a delete of an absent id.
    pub fn apply_delta(
        &self,
        domain: Domain,
        action: DeltaAction,
        record: DomainRecord,
        emitted_at: Option<DateTime<Utc>>,
    ) -> Option<AppliedChange> {
        let now = Utc::now();
        let id = record.id.clone();

        let change = {
            let mut collection = self.write(domain);
            let (applied, record) = match collection.apply(action, record, now) {
                Some(result) => result,
                None => {
                    debug!(domain = %domain, id = %id, "Delete for absent record, ignoring");
                    return None;
                }
            };

            AppliedChange {
                domain,
                requested: action,
                applied,
                record,
                records: collection.snapshot(),
                applied_at: now,
                emitted_at,
            }
        };

        debug!(
            domain = %domain,
            id = %id,
            requested = %action,
            applied = ?change.applied,
            "Delta applied"
        );

        self.bus.emit(&ClientEvent::LiveUpdate(change.clone()));
        Some(change)
    }

    /// Replace one domain's contents (bulk fetch / resync)
    pub fn set_all(&self, domain: Domain, records: Vec<DomainRecord>) -> ResyncSummary {
        let now = Utc::now();
        let received = records.len();

        let summary = {
            let mut collection = self.write(domain);
            let count = collection.replace_all(records, now);
            ResyncSummary {
                domain,
                count,
                records: collection.snapshot(),
                applied_at: now,
            }
        };

        info!(
            domain = %domain,
            records = summary.count,
            dropped_duplicates = received - summary.count,
            "Collection resynced"
        );

        self.bus.emit(&ClientEvent::Resync(summary.clone()));
        summary
    }

    /// Load several collections at once (snapshot restore).
    ///
    /// Takes every affected write lock before swapping, so no reader sees a
    /// half-restored store. One `Resync` per loaded domain follows once every
    /// lock is released; no per-record events.
    pub(crate) fn load_collections(&self, collections: BTreeMap<Domain, Vec<DomainRecord>>) {
        let now = Utc::now();
        let summaries: Vec<ResyncSummary> = {
            let mut guards: Vec<(Domain, RwLockWriteGuard<'_, DomainCollection>)> = collections
                .keys()
                .map(|domain| (*domain, self.write(*domain)))
                .collect();

            guards
                .iter_mut()
                .zip(collections)
                .map(|((domain, guard), (_, records))| {
                    let count = guard.replace_all(records, now);
                    ResyncSummary {
                        domain: *domain,
                        count,
                        records: guard.snapshot(),
                        applied_at: now,
                    }
                })
                .collect()
        };

        info!(domains = summaries.len(), "Collections loaded from snapshot");
        for summary in summaries {
            self.bus.emit(&ClientEvent::Resync(summary));
        }
    }

    /// Clear every collection (logout / teardown).
    ///
    /// Subscribers get one empty `Resync` per domain once all are cleared.
    pub fn reset(&self) {
        let now = Utc::now();
        let summaries: Vec<ResyncSummary> = Domain::ALL
            .into_iter()
            .map(|domain| {
                let mut collection = self.write(domain);
                collection.clear();
                ResyncSummary {
                    domain,
                    count: 0,
                    records: collection.snapshot(),
                    applied_at: now,
                }
            })
            .collect();

        info!("Live store reset");
        for summary in summaries {
            self.bus.emit(&ClientEvent::Resync(summary));
        }
    }

    /// Immutable view of one domain's records, newest first
    pub fn records(&self, domain: Domain) -> Arc<Vec<DomainRecord>> {
        self.read(domain).snapshot()
    }

    pub fn get(&self, domain: Domain, id: &str) -> Option<DomainRecord> {
        self.read(domain).get(id).cloned()
    }

    pub fn len(&self, domain: Domain) -> usize {
        self.read(domain).len()
    }

    pub fn last_update(&self, domain: Domain) -> Option<DateTime<Utc>> {
        self.read(domain).last_update()
    }

    /// Most recent update across all domains
    pub fn last_update_any(&self) -> Option<DateTime<Utc>> {
        Domain::ALL
            .iter()
            .filter_map(|d| self.last_update(*d))
            .max()
    }

    /// Copy of every collection, keyed by domain
    pub fn export(&self) -> BTreeMap<Domain, Vec<DomainRecord>> {
        Domain::ALL
            .iter()
            .map(|d| (*d, self.records(*d).as_ref().clone()))
            .collect()
    }

    fn read(&self, domain: Domain) -> RwLockReadGuard<'_, DomainCollection> {
        self.collections[domain.index()]
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, domain: Domain) -> RwLockWriteGuard<'_, DomainCollection> {
        self.collections[domain.index()]
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }
}
