//! Per-class ticket stock

use crate::{
    config::ReleasePolicy,
    types::{ClassCounts, ResourceClass, SalesSummary},
    Error, Result,
};

/// Countable stock per class
///
/// `capacity` is fixed at construction; `available` moves by one unit per
/// committed allocation or cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    available: ClassCounts,
    capacity: ClassCounts,
    release_policy: ReleasePolicy,
}

impl Inventory {
    /// Fresh inventory with everything available
    pub fn new(capacity: ClassCounts, release_policy: ReleasePolicy) -> Self {
        Self::restore(capacity, capacity, release_policy)
    }

    /// Inventory restored from a persisted availability snapshot
    pub fn restore(
        available: ClassCounts,
        capacity: ClassCounts,
        release_policy: ReleasePolicy,
    ) -> Self {
        Self {
            available,
            capacity,
            release_policy,
        }
    }

    /// Units currently available
    pub fn available(&self, class: ResourceClass) -> u32 {
        self.available[class]
    }

    /// Availability snapshot for every class
    pub fn snapshot(&self) -> ClassCounts {
        self.available
    }

    /// Original stock of a class
    pub fn capacity(&self, class: ResourceClass) -> u32 {
        self.capacity[class]
    }

    /// Units sold (capacity minus available, floored at zero)
    pub fn sold(&self, class: ResourceClass) -> u32 {
        self.capacity[class].saturating_sub(self.available[class])
    }

    /// Sold, available and capacity per class
    pub fn summary(&self) -> SalesSummary {
        let mut sold = ClassCounts::zero();
        let mut capacity = ClassCounts::zero();
        for class in ResourceClass::ALL {
            sold[class] = self.sold(class);
            capacity[class] = self.capacity(class);
        }
        SalesSummary {
            sold,
            available: self.available,
            capacity,
        }
    }

    /// Take one unit, failing without change if none are left
    pub fn reserve(&mut self, class: ResourceClass) -> Result<()> {
        match self.available[class].checked_sub(1) {
            Some(left) => {
                self.available[class] = left;
                Ok(())
            }
            None => Err(Error::Exhausted(class)),
        }
    }

    /// Return one unit
    ///
    /// Returns `false` when the clamp policy swallowed the unit.
    pub fn release(&mut self, class: ResourceClass) -> bool {
        let next = self.available[class].saturating_add(1);
        match self.release_policy {
            ReleasePolicy::ClampToCapacity if next > self.capacity[class] => {
                tracing::warn!(
                    class = %class,
                    capacity = self.capacity[class],
                    "Release would exceed capacity, clamped"
                );
                false
            }
            _ => {
                self.available[class] = next;
                true
            }
        }
    }
}
