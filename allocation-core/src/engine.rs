//! Main allocation orchestration layer
//!
//! This module ties together the holder registry, inventory, request queues
//! and the persistence collaborator into the admission / drain / cancel API.
//!
//! # Example
//!
//! ```no_run
//! use allocation_core::{AllocationEngine, ClassCounts, Config, HolderId, MemoryStore, Sha256Hasher};
//! use std::sync::Arc;
//!
//! fn main() -> allocation_core::Result<()> {
//!     let mut engine = AllocationEngine::open(
//!         Config::default(),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(Sha256Hasher),
//!     )?;
//!
//!     let alice = HolderId::new("alice");
//!     engine.register(&alice, "correct horse")?;
//!     engine.submit(&alice, ClassCounts::new(1, 2))?;
//!     engine.drain(&alice)?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    config::DrainScope,
    crypto::CredentialHasher,
    inventory::Inventory,
    metrics::Metrics,
    queue::RequestQueue,
    registry::HolderRegistry,
    storage::Store,
    types::{
        ClassCounts, ClassTag, DrainReport, HolderId, Outcome, PendingRequest, ResourceClass,
        SalesSummary, SubmitReceipt, TransactionRecord,
    },
    Config, Error, Result,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Single-pool allocation engine
///
/// Sole mutator of inventory, holdings and the request queues. Callers that
/// share an engine across tasks go through [`crate::actor`].
pub struct AllocationEngine {
    /// Holders and their holdings
    registry: HolderRegistry,

    /// Per-class stock
    inventory: Inventory,

    /// Pending requests
    queue: RequestQueue,

    /// Persistence and audit collaborator
    store: Arc<dyn Store>,

    /// Prometheus collectors
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl AllocationEngine {
    /// Open engine, restoring holders and inventory from the store
    pub fn open(
        config: Config,
        store: Arc<dyn Store>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = HolderRegistry::with_holders(store.load_holders()?, hasher);
        let capacity = config.inventory.capacity();
        let inventory = match store.load_inventory()? {
            Some(available) => Inventory::restore(available, capacity, config.policy.release),
            None => {
                info!(%capacity, "No stored availability, starting from capacity");
                store.save_inventory(&capacity)?;
                Inventory::new(capacity, config.policy.release)
            }
        };

        info!(
            holders = registry.len(),
            available = %inventory.snapshot(),
            cap = config.limits.holder_cap,
            scope = ?config.policy.drain_scope,
            "Allocation engine opened"
        );

        let metrics = Metrics::new()?;
        metrics.set_available(&inventory.snapshot());

        Ok(Self {
            registry,
            inventory,
            queue: RequestQueue::new(),
            store,
            metrics,
            config,
        })
    }

    /// Per-holder cap
    pub fn cap(&self) -> u32 {
        self.config.limits.holder_cap
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collectors
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Holder registry

    /// Register a new holder
    pub fn register(&mut self, id: &HolderId, credential: &str) -> Result<()> {
        let holder = self.registry.prepare(id, credential)?;
        self.store.save_holder(&holder)?;
        self.registry.insert(holder);
        info!(holder = %id, "Holder registered");
        Ok(())
    }

    /// Check a credential
    pub fn authenticate(&self, id: &HolderId, credential: &str) -> bool {
        self.registry.authenticate(id, credential)
    }

    /// Like [`authenticate`](Self::authenticate), but as a `Result`
    pub fn authorize(&self, id: &HolderId, credential: &str) -> Result<()> {
        if self.authenticate(id, credential) {
            Ok(())
        } else {
            warn!(holder = %id, "Authentication failed");
            Err(Error::Unauthorized(id.to_string()))
        }
    }

    /// Committed holdings of a holder
    pub fn holdings_of(&self, id: &HolderId) -> Result<ClassCounts> {
        self.registry.holdings_of(id)
    }

    // Admission

    /// Enqueue requested units, VIP first
    ///
    /// Fails with `CapExceeded` (and enqueues nothing) if the holder is
    /// already at the cap. Otherwise enqueues units until the cap would be
    /// reached; a class whose inventory is empty is denied and its remaining
    /// units are dropped. Inventory is not touched here.
    pub fn submit(&mut self, id: &HolderId, requested: ClassCounts) -> Result<SubmitReceipt> {
        let cap = self.cap();
        let mut current = self.registry.holdings_of(id)?.total();

        if current >= cap {
            self.record(TransactionRecord::new(
                id.clone(),
                ClassTag::Combined,
                Outcome::MaxLimitReached,
            ))?;
            warn!(holder = %id, held = current, cap, "Submission refused, holder at cap");
            return Err(Error::CapExceeded {
                holder: id.to_string(),
                held: current,
                cap,
            });
        }

        let mut receipt = SubmitReceipt::default();
        let mut staged = Vec::new();

        for class in ResourceClass::ALL {
            let mut remaining = requested[class];

            while remaining > 0 && current < cap {
                if self.inventory.available(class) == 0 {
                    self.record(TransactionRecord::new(id.clone(), class, Outcome::Denied))?;
                    warn!(holder = %id, %class, dropped = remaining, "Class exhausted at submission");
                    receipt.exhausted.push(class);
                    remaining = 0;
                    break;
                }

                staged.push(PendingRequest::new(id.clone(), class));
                remaining -= 1;
                current += 1;
                receipt.enqueued[class] += 1;
            }

            receipt.over_cap[class] = remaining;
        }

        // Queue only once every denial is recorded
        for request in staged {
            self.queue.push(request);
        }
        for class in ResourceClass::ALL {
            self.metrics.set_queue_depth(class, self.queue.len(class));
        }

        debug!(
            holder = %id,
            enqueued = %receipt.enqueued,
            over_cap = %receipt.over_cap,
            "Request submitted"
        );

        Ok(receipt)
    }

    // Drain

    /// Process queued requests, VIP queue first
    ///
    /// Before each request the triggering holder's cap is re-checked; if it
    /// is reached the drain stops with `CapExceeded`, leaving already
    /// committed requests committed and the rest queued.
    pub fn drain(&mut self, triggering: &HolderId) -> Result<DrainReport> {
        let started = Instant::now();
        let cap = self.cap();
        self.registry.get(triggering)?;

        let mut report = DrainReport::default();
        let result = self.drain_classes(triggering, cap, &mut report);

        for class in ResourceClass::ALL {
            self.metrics.set_queue_depth(class, self.queue.len(class));
        }
        self.metrics.set_available(&self.inventory.snapshot());
        self.metrics
            .record_drain_duration(started.elapsed().as_secs_f64());

        result?;

        if !report.is_empty() {
            info!(
                triggering = %triggering,
                approved = %report.approved,
                denied = %report.denied,
                "Drain completed"
            );
        }
        Ok(report)
    }

    fn drain_classes(
        &mut self,
        triggering: &HolderId,
        cap: u32,
        report: &mut DrainReport,
    ) -> Result<()> {
        for class in ResourceClass::ALL {
            loop {
                let next = match self.config.policy.drain_scope {
                    DrainScope::Global => self.queue.front(class).map(|_| 0),
                    DrainScope::OwnEntries => self.queue.position_of(class, triggering),
                };
                let Some(index) = next else { break };

                let held = self.registry.holdings_of(triggering)?.total();
                if held >= cap {
                    self.record(TransactionRecord::new(
                        triggering.clone(),
                        class,
                        Outcome::Denied,
                    ))?;
                    warn!(
                        triggering = %triggering,
                        held,
                        cap,
                        remaining = self.queue.len(class),
                        "Drain aborted, triggering holder at cap"
                    );
                    return Err(Error::CapExceeded {
                        holder: triggering.to_string(),
                        held,
                        cap,
                    });
                }

                let Some(request) = self.queue.get(class, index).cloned() else {
                    break;
                };
                self.settle(&request, cap, report)?;
                self.queue.remove_at(class, index);
            }
        }
        Ok(())
    }

    /// Commit or reject one queued request
    ///
    /// Nothing in memory changes unless the store accepted the write, so a
    /// failed write leaves the request queued for the next drain.
    fn settle(&mut self, request: &PendingRequest, cap: u32, report: &mut DrainReport) -> Result<()> {
        let class = request.class;
        let mut holder = self.registry.get(&request.holder)?.clone();
        let owner_held = holder.holdings.total();

        // Requests from several submissions can outnumber the owner's headroom
        if owner_held >= cap {
            self.record(TransactionRecord::new(request.holder.clone(), class, Outcome::Denied))?;
            warn!(
                owner = %request.holder,
                %class,
                held = owner_held,
                cap,
                "Queued request rejected, owner at cap"
            );
            report.denied[class] += 1;
            return Ok(());
        }

        // Availability seen at submission is advisory
        let mut inventory = self.inventory.clone();
        if inventory.reserve(class).is_err() {
            self.record(TransactionRecord::new(request.holder.clone(), class, Outcome::Denied))?;
            warn!(
                owner = %request.holder,
                %class,
                request_id = %request.request_id,
                "Queued request rejected, class exhausted"
            );
            report.denied[class] += 1;
            return Ok(());
        }

        holder.holdings[class] += 1;
        let record = TransactionRecord::new(request.holder.clone(), class, Outcome::Approved);
        self.store.commit(&holder, &inventory.snapshot(), &record)?;

        info!(
            owner = %record.holder,
            %class,
            held = %holder.holdings,
            available = inventory.available(class),
            "Allocation approved"
        );

        self.inventory = inventory;
        *self.registry.get_mut(&request.holder)? = holder;
        self.metrics.record_decision(Outcome::Approved);
        report.approved[class] += 1;
        Ok(())
    }

    // Cancellation

    /// Return held units to inventory, VIP first
    ///
    /// Stops with `InsufficientHoldings` at the first unit the holder does not
    /// hold; cancellations applied before that point stay applied. Holder
    /// state is persisted before returning either way.
    pub fn cancel(&mut self, id: &HolderId, requested: ClassCounts) -> Result<()> {
        let result = self.cancel_units(id, requested);
        self.metrics.set_available(&self.inventory.snapshot());
        result?;

        let snapshot = self.registry.get(id)?.clone();
        self.store.save_holder(&snapshot)?;

        info!(holder = %id, cancelled = %requested, held = %snapshot.holdings, "Cancellation applied");
        Ok(())
    }

    fn cancel_units(&mut self, id: &HolderId, requested: ClassCounts) -> Result<()> {
        for class in ResourceClass::ALL {
            for _ in 0..requested[class] {
                let mut holder = self.registry.get(id)?.clone();

                if holder.holdings[class] == 0 {
                    self.store.save_holder(&holder)?;
                    warn!(holder = %id, %class, held = %holder.holdings, "Cancellation exceeds holdings");
                    return Err(Error::InsufficientHoldings {
                        holder: id.to_string(),
                        class,
                        remaining: holder.holdings,
                    });
                }

                holder.holdings[class] -= 1;
                let mut inventory = self.inventory.clone();
                inventory.release(class);

                let record = TransactionRecord::new(id.clone(), class, Outcome::Cancelled);
                self.store.commit(&holder, &inventory.snapshot(), &record)?;

                self.inventory = inventory;
                *self.registry.get_mut(id)? = holder;
                self.metrics.record_decision(Outcome::Cancelled);
            }
        }
        Ok(())
    }

    // Queries

    /// Availability per class
    pub fn availability(&self) -> ClassCounts {
        self.inventory.snapshot()
    }

    /// Queued requests of a class
    pub fn pending(&self, class: ResourceClass) -> usize {
        self.queue.len(class)
    }

    /// Queued units per class for one holder
    pub fn pending_for(&self, id: &HolderId) -> ClassCounts {
        self.queue.pending_for(id)
    }

    /// Full audit trail in append order
    pub fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.store.load_transactions()
    }

    /// Audit records concerning one holder
    pub fn transactions_for(&self, id: &HolderId) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .transactions()?
            .into_iter()
            .filter(|r| &r.holder == id)
            .collect())
    }

    /// Units sold and available per class
    pub fn sales_summary(&self) -> SalesSummary {
        self.inventory.summary()
    }

    /// Sum of holdings across all holders
    pub fn total_held(&self) -> ClassCounts {
        self.registry.total_held()
    }

    /// Flush the store (shutdown)
    pub fn flush(&self) -> Result<()> {
        if !self.queue.is_empty() {
            warn!(
                vip = self.queue.len(ResourceClass::Vip),
                regular = self.queue.len(ResourceClass::Regular),
                "Flushing with requests still queued; they are not persisted"
            );
        }
        self.store.flush()
    }

    fn record(&mut self, record: TransactionRecord) -> Result<()> {
        self.store.append_transaction(&record)?;
        self.metrics.record_decision(record.outcome);
        Ok(())
    }
}

impl std::fmt::Debug for AllocationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationEngine")
            .field("registry", &self.registry)
            .field("inventory", &self.inventory)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleasePolicy;
    use crate::crypto::Sha256Hasher;
    use crate::storage::MemoryStore;

    fn create_test_engine(vip: u32, regular: u32) -> (AllocationEngine, MemoryStore) {
        let mut config = Config::default();
        config.inventory.vip = vip;
        config.inventory.regular = regular;

        let store = MemoryStore::new();
        let engine =
            AllocationEngine::open(config, Arc::new(store.clone()), Arc::new(Sha256Hasher)).unwrap();
        (engine, store)
    }

    fn registered(engine: &mut AllocationEngine, name: &str) -> HolderId {
        let id = HolderId::new(name);
        engine.register(&id, "pw").unwrap();
        id
    }

    fn outcomes(engine: &AllocationEngine) -> Vec<(String, String, Outcome)> {
        engine
            .transactions()
            .unwrap()
            .into_iter()
            .map(|r| (r.holder.to_string(), r.tag.to_string(), r.outcome))
            .collect()
    }

    #[test]
    fn test_open_persists_initial_inventory() {
        let (engine, store) = create_test_engine(30, 200);
        assert_eq!(engine.availability(), ClassCounts::new(30, 200));
        assert_eq!(store.load_inventory().unwrap(), Some(ClassCounts::new(30, 200)));
    }

    #[test]
    fn test_reopen_restores_state() {
        let (mut engine, store) = create_test_engine(5, 5);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(2, 1)).unwrap();
        engine.drain(&alice).unwrap();

        let mut config = Config::default();
        config.inventory.vip = 5;
        config.inventory.regular = 5;
        let reopened =
            AllocationEngine::open(config, Arc::new(store), Arc::new(Sha256Hasher)).unwrap();

        assert_eq!(reopened.availability(), ClassCounts::new(3, 4));
        assert_eq!(reopened.holdings_of(&alice).unwrap(), ClassCounts::new(2, 1));
        assert!(reopened.authenticate(&alice, "pw"));
        assert_eq!(reopened.pending(ResourceClass::Vip), 0);
    }

    #[test]
    fn test_register_duplicate() {
        let (mut engine, _) = create_test_engine(1, 1);
        let alice = registered(&mut engine, "alice");
        assert!(matches!(
            engine.register(&alice, "other"),
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            engine.authorize(&alice, "other"),
            Err(Error::Unauthorized(_))
        ));
        assert!(engine.authorize(&alice, "pw").is_ok());
    }

    #[test]
    fn test_submit_unknown_holder() {
        let (mut engine, _) = create_test_engine(1, 1);
        let err = engine
            .submit(&HolderId::new("ghost"), ClassCounts::new(1, 0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(engine.pending(ResourceClass::Vip), 0);
    }

    #[test]
    fn test_submit_vip_then_regular_up_to_cap() {
        let (mut engine, _) = create_test_engine(30, 200);
        let alice = registered(&mut engine, "alice");

        let receipt = engine.submit(&alice, ClassCounts::new(4, 9)).unwrap();
        assert_eq!(receipt.enqueued, ClassCounts::new(4, 6));
        assert_eq!(receipt.over_cap, ClassCounts::new(0, 3));
        assert!(receipt.exhausted.is_empty());

        // Nothing reserved until drain
        assert_eq!(engine.availability(), ClassCounts::new(30, 200));
        assert_eq!(engine.pending_for(&alice), ClassCounts::new(4, 6));
    }

    #[test]
    fn test_submit_exhausted_class_drops_rest() {
        let (mut engine, _) = create_test_engine(0, 5);
        let alice = registered(&mut engine, "alice");

        let receipt = engine.submit(&alice, ClassCounts::new(3, 2)).unwrap();
        assert_eq!(receipt.enqueued, ClassCounts::new(0, 2));
        assert_eq!(receipt.exhausted, vec![ResourceClass::Vip]);
        assert_eq!(receipt.over_cap, ClassCounts::zero());

        assert_eq!(
            outcomes(&engine),
            vec![("alice".into(), "VIP".into(), Outcome::Denied)]
        );
    }

    #[test]
    fn test_drain_is_global_fifo() {
        let (mut engine, _) = create_test_engine(10, 10);
        let alice = registered(&mut engine, "alice");
        let bob = registered(&mut engine, "bob");

        engine.submit(&alice, ClassCounts::new(0, 1)).unwrap();
        engine.submit(&bob, ClassCounts::new(1, 1)).unwrap();

        let report = engine.drain(&alice).unwrap();
        assert_eq!(report.approved, ClassCounts::new(1, 2));
        assert_eq!(engine.holdings_of(&bob).unwrap(), ClassCounts::new(1, 1));
        assert_eq!(engine.holdings_of(&alice).unwrap(), ClassCounts::new(0, 1));

        // VIP queue drains before Regular, Regular in submission order
        let approved: Vec<_> = outcomes(&engine)
            .into_iter()
            .map(|(holder, tag, _)| format!("{}:{}", holder, tag))
            .collect();
        assert_eq!(approved, vec!["bob:VIP", "alice:Regular", "bob:Regular"]);
    }

    #[test]
    fn test_drain_own_entries_scope() {
        let (mut engine, _) = create_test_engine(10, 10);
        engine.config.policy.drain_scope = DrainScope::OwnEntries;
        let alice = registered(&mut engine, "alice");
        let bob = registered(&mut engine, "bob");

        engine.submit(&bob, ClassCounts::new(1, 0)).unwrap();
        engine.submit(&alice, ClassCounts::new(1, 0)).unwrap();

        let report = engine.drain(&alice).unwrap();
        assert_eq!(report.approved, ClassCounts::new(1, 0));
        assert_eq!(engine.holdings_of(&bob).unwrap(), ClassCounts::zero());
        assert_eq!(engine.pending_for(&bob), ClassCounts::new(1, 0));
    }

    #[test]
    fn test_drain_aborts_when_trigger_at_cap() {
        let (mut engine, _) = create_test_engine(30, 200);
        engine.config.limits.holder_cap = 2;
        let alice = registered(&mut engine, "alice");
        let bob = registered(&mut engine, "bob");

        engine.submit(&alice, ClassCounts::new(2, 0)).unwrap();
        engine.drain(&alice).unwrap();
        engine.submit(&bob, ClassCounts::new(1, 1)).unwrap();

        let err = engine.drain(&alice).unwrap_err();
        assert!(matches!(err, Error::CapExceeded { held: 2, cap: 2, .. }));

        // Bob's requests stay queued for a future drain
        assert_eq!(engine.pending_for(&bob), ClassCounts::new(1, 1));
        assert_eq!(
            outcomes(&engine).last().unwrap(),
            &("alice".to_string(), "VIP".to_string(), Outcome::Denied)
        );

        engine.drain(&bob).unwrap();
        assert_eq!(engine.holdings_of(&bob).unwrap(), ClassCounts::new(1, 1));
    }

    #[test]
    fn test_drain_partial_commit_then_abort() {
        let (mut engine, _) = create_test_engine(30, 200);
        engine.config.limits.holder_cap = 3;
        let alice = registered(&mut engine, "alice");

        engine.submit(&alice, ClassCounts::new(2, 0)).unwrap();
        engine.submit(&alice, ClassCounts::new(0, 2)).unwrap();

        // Third commit fills alice's cap; the fourth request is where the drain stops
        let err = engine.drain(&alice).unwrap_err();
        assert!(matches!(err, Error::CapExceeded { .. }));
        assert_eq!(engine.holdings_of(&alice).unwrap(), ClassCounts::new(2, 1));
        assert_eq!(engine.pending(ResourceClass::Regular), 1);
        assert_eq!(engine.availability(), ClassCounts::new(28, 199));
    }

    #[test]
    fn test_drain_rejects_owner_over_cap() {
        let (mut engine, _) = create_test_engine(30, 200);
        engine.config.limits.holder_cap = 2;
        let alice = registered(&mut engine, "alice");
        let bob = registered(&mut engine, "bob");

        // Two submissions before any drain queue more than alice's headroom
        engine.submit(&alice, ClassCounts::new(2, 0)).unwrap();
        engine.submit(&alice, ClassCounts::new(0, 2)).unwrap();

        let report = engine.drain(&bob).unwrap();
        assert_eq!(report.approved, ClassCounts::new(2, 0));
        assert_eq!(report.denied, ClassCounts::new(0, 2));
        assert_eq!(engine.holdings_of(&alice).unwrap().total(), 2);
        assert_eq!(engine.availability(), ClassCounts::new(28, 200));
    }

    #[test]
    fn test_drain_rejects_when_inventory_ran_out() {
        let (mut engine, _) = create_test_engine(1, 0);
        let alice = registered(&mut engine, "alice");
        let bob = registered(&mut engine, "bob");

        engine.submit(&alice, ClassCounts::new(1, 0)).unwrap();
        engine.submit(&bob, ClassCounts::new(1, 0)).unwrap();

        let report = engine.drain(&bob).unwrap();
        assert_eq!(report.approved, ClassCounts::new(1, 0));
        assert_eq!(report.denied, ClassCounts::new(1, 0));
        assert_eq!(engine.availability(), ClassCounts::zero());
        assert_eq!(engine.holdings_of(&bob).unwrap(), ClassCounts::zero());
        assert_eq!(engine.pending(ResourceClass::Vip), 0);
    }

    #[test]
    fn test_cancel_success() {
        let (mut engine, _) = create_test_engine(5, 5);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(2, 2)).unwrap();
        engine.drain(&alice).unwrap();

        engine.cancel(&alice, ClassCounts::new(1, 2)).unwrap();
        assert_eq!(engine.holdings_of(&alice).unwrap(), ClassCounts::new(1, 0));
        assert_eq!(engine.availability(), ClassCounts::new(4, 5));

        let cancelled = outcomes(&engine)
            .into_iter()
            .filter(|(_, _, o)| *o == Outcome::Cancelled)
            .count();
        assert_eq!(cancelled, 3);
    }

    #[test]
    fn test_cancel_clamped_release() {
        let (mut engine, store) = create_test_engine(1, 1);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(1, 0)).unwrap();
        engine.drain(&alice).unwrap();

        let mut config = engine.config().clone();
        config.policy.release = ReleasePolicy::ClampToCapacity;
        config.inventory.vip = 0;
        let mut engine =
            AllocationEngine::open(config, Arc::new(store), Arc::new(Sha256Hasher)).unwrap();

        engine.cancel(&alice, ClassCounts::new(1, 0)).unwrap();
        assert_eq!(engine.availability(), ClassCounts::new(0, 1));
    }

    #[test]
    fn test_failed_drain_leaves_state_untouched() {
        let (mut engine, store) = create_test_engine(5, 5);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(1, 0)).unwrap();

        store.fail_writes(true);
        let err = engine.drain(&alice).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!err.is_recoverable());

        assert_eq!(engine.holdings_of(&alice).unwrap(), ClassCounts::zero());
        assert_eq!(engine.availability(), ClassCounts::new(5, 5));
        assert_eq!(engine.pending_for(&alice), ClassCounts::new(1, 0));

        // Request is still queued once the store recovers
        store.fail_writes(false);
        let report = engine.drain(&alice).unwrap();
        assert_eq!(report.approved, ClassCounts::new(1, 0));
        assert_eq!(store.load_inventory().unwrap(), Some(ClassCounts::new(4, 5)));
    }

    #[test]
    fn test_failed_register_can_be_retried() {
        let (mut engine, store) = create_test_engine(5, 5);
        let alice = HolderId::new("alice");

        store.fail_writes(true);
        assert!(matches!(engine.register(&alice, "pw"), Err(Error::Storage(_))));
        assert!(!engine.authenticate(&alice, "pw"));
        assert!(matches!(engine.holdings_of(&alice), Err(Error::NotFound(_))));

        store.fail_writes(false);
        engine.register(&alice, "pw").unwrap();
        assert_eq!(store.load_holders().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_cancel_leaves_state_untouched() {
        let (mut engine, store) = create_test_engine(5, 5);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(2, 0)).unwrap();
        engine.drain(&alice).unwrap();

        store.fail_writes(true);
        let err = engine.cancel(&alice, ClassCounts::new(1, 0)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(engine.holdings_of(&alice).unwrap(), ClassCounts::new(2, 0));
        assert_eq!(engine.availability(), ClassCounts::new(3, 5));
    }

    #[test]
    fn test_failed_submit_queues_nothing() {
        let (mut engine, store) = create_test_engine(5, 0);
        let alice = registered(&mut engine, "alice");

        // Regular denial cannot be recorded, so the VIP units are not queued either
        store.fail_writes(true);
        let err = engine.submit(&alice, ClassCounts::new(2, 1)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(engine.pending_for(&alice), ClassCounts::zero());
    }

    #[test]
    fn test_partial_cancel_refreshes_gauge() {
        let (mut engine, _) = create_test_engine(5, 5);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(2, 0)).unwrap();
        engine.drain(&alice).unwrap();

        let err = engine.cancel(&alice, ClassCounts::new(1, 1)).unwrap_err();
        assert!(matches!(err, Error::InsufficientHoldings { .. }));

        let gauge = engine.metrics().available.with_label_values(&["VIP"]).get();
        assert_eq!(gauge, 4);
        assert_eq!(engine.availability().vip, 4);
    }

    #[test]
    fn test_sales_summary() {
        let (mut engine, _) = create_test_engine(30, 200);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(3, 4)).unwrap();
        engine.drain(&alice).unwrap();

        let summary = engine.sales_summary();
        assert_eq!(summary.sold, ClassCounts::new(3, 4));
        assert_eq!(summary.available, ClassCounts::new(27, 196));
        assert_eq!(summary.total_sold(), 7);
    }

    #[test]
    fn test_metrics_follow_decisions() {
        let (mut engine, _) = create_test_engine(1, 1);
        let alice = registered(&mut engine, "alice");
        engine.submit(&alice, ClassCounts::new(1, 1)).unwrap();
        engine.drain(&alice).unwrap();
        engine.submit(&alice, ClassCounts::new(1, 0)).unwrap();

        assert_eq!(engine.metrics().decision_count(Outcome::Approved), 2);
        assert_eq!(engine.metrics().decision_count(Outcome::Denied), 1);
    }
}
