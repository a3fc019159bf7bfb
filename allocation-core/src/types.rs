//! Core types for the allocation engine
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exhaustive matching over the closed set of resource classes
//! - Unsigned counts, so inventory and holdings can never go negative

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use uuid::Uuid;

/// Holder identifier (login name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolderId(String);

impl HolderId {
    /// Create new holder ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HolderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Allocatable ticket class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceClass {
    /// VIP tickets, always considered first
    Vip = 1,
    /// Regular tickets
    Regular = 2,
}

impl ResourceClass {
    /// Every class, in admission and drain priority order
    pub const ALL: [ResourceClass; 2] = [ResourceClass::Vip, ResourceClass::Regular];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            ResourceClass::Vip => "VIP",
            ResourceClass::Regular => "Regular",
        }
    }

    /// Parse from label (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vip" => Some(ResourceClass::Vip),
            "regular" => Some(ResourceClass::Regular),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A count per resource class
///
/// Used for holdings, availability and request/cancel batches alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassCounts {
    /// VIP count
    pub vip: u32,
    /// Regular count
    pub regular: u32,
}

impl ClassCounts {
    /// Create from explicit counts
    pub const fn new(vip: u32, regular: u32) -> Self {
        Self { vip, regular }
    }

    /// All-zero counts
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Sum across classes
    pub fn total(&self) -> u32 {
        self.vip.saturating_add(self.regular)
    }

    /// True if every class is zero
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Iterate `(class, count)` in priority order
    pub fn iter(&self) -> impl Iterator<Item = (ResourceClass, u32)> + '_ {
        ResourceClass::ALL.into_iter().map(move |class| (class, self[class]))
    }
}

impl Index<ResourceClass> for ClassCounts {
    type Output = u32;

    fn index(&self, class: ResourceClass) -> &u32 {
        match class {
            ResourceClass::Vip => &self.vip,
            ResourceClass::Regular => &self.regular,
        }
    }
}

impl IndexMut<ResourceClass> for ClassCounts {
    fn index_mut(&mut self, class: ResourceClass) -> &mut u32 {
        match class {
            ResourceClass::Vip => &mut self.vip,
            ResourceClass::Regular => &mut self.regular,
        }
    }
}

impl fmt::Display for ClassCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VIP:{} Regular:{}", self.vip, self.regular)
    }
}

/// Registered holder record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    /// Unique identity
    pub id: HolderId,

    /// Opaque credential hash produced by the hasher
    pub credential_hash: String,

    /// Committed holdings per class
    pub holdings: ClassCounts,

    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
}

impl Holder {
    /// Create a holder with no holdings
    pub fn new(id: HolderId, credential_hash: String) -> Self {
        Self {
            id,
            credential_hash,
            holdings: ClassCounts::zero(),
            registered_at: Utc::now(),
        }
    }
}

/// A queued, not yet committed, request for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Request ID (UUIDv7 for time-ordering)
    pub request_id: Uuid,

    /// Holder the unit is for
    pub holder: HolderId,

    /// Requested class
    pub class: ResourceClass,

    /// Submission timestamp
    pub created_at: DateTime<Utc>,
}

impl PendingRequest {
    /// Create a request stamped now
    pub fn new(holder: HolderId, class: ResourceClass) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            holder,
            class,
            created_at: Utc::now(),
        }
    }
}

/// Class tag recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassTag {
    /// A single class
    Class(ResourceClass),
    /// Both classes at once ("VIP/Regular")
    Combined,
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassTag::Class(class) => write!(f, "{}", class),
            ClassTag::Combined => write!(f, "VIP/Regular"),
        }
    }
}

impl From<ResourceClass> for ClassTag {
    fn from(class: ResourceClass) -> Self {
        ClassTag::Class(class)
    }
}

/// Outcome of a recorded decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Outcome {
    /// Unit committed to the holder
    Approved = 1,
    /// Unit refused (exhausted inventory or cap hit during drain)
    Denied = 2,
    /// Unit returned to inventory
    Cancelled = 3,
    /// Submission refused because the holder is at the cap
    MaxLimitReached = 4,
}

impl Outcome {
    /// Audit label
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Approved => "approved",
            Outcome::Denied => "denied",
            Outcome::Cancelled => "cancelled",
            Outcome::MaxLimitReached => "max-limit-reached",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Record ID (UUIDv7 for time-ordering)
    pub record_id: Uuid,

    /// Holder the decision concerns
    pub holder: HolderId,

    /// Class or combined tag
    pub tag: ClassTag,

    /// Decision
    pub outcome: Outcome,

    /// Decision timestamp
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a record stamped now
    pub fn new(holder: HolderId, tag: impl Into<ClassTag>, outcome: Outcome) -> Self {
        Self {
            record_id: Uuid::now_v7(),
            holder,
            tag: tag.into(),
            outcome,
            timestamp: Utc::now(),
        }
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Units enqueued per class
    pub enqueued: ClassCounts,

    /// Classes whose remaining units were dropped because inventory was empty
    pub exhausted: Vec<ResourceClass>,

    /// Units dropped because the holder would exceed the cap
    pub over_cap: ClassCounts,
}

/// Result of a completed drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Units committed per class
    pub approved: ClassCounts,

    /// Units rejected because inventory ran out after admission
    pub denied: ClassCounts,
}

impl DrainReport {
    /// True if nothing was dequeued
    pub fn is_empty(&self) -> bool {
        self.approved.is_empty() && self.denied.is_empty()
    }
}

/// Snapshot of sales per class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// Units sold (capacity minus available)
    pub sold: ClassCounts,

    /// Units still available
    pub available: ClassCounts,

    /// Configured capacity
    pub capacity: ClassCounts,
}

impl SalesSummary {
    /// Units sold across classes
    pub fn total_sold(&self) -> u32 {
        self.sold.total()
    }
}
