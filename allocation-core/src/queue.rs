//! FIFO queues of pending requests, one per class

use crate::types::{ClassCounts, HolderId, PendingRequest, ResourceClass};
use std::collections::VecDeque;

/// Pending requests per class, in submission order across all holders
#[derive(Debug, Default)]
pub struct RequestQueue {
    vip: VecDeque<PendingRequest>,
    regular: VecDeque<PendingRequest>,
}

impl RequestQueue {
    /// Create empty queues
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, class: ResourceClass) -> &VecDeque<PendingRequest> {
        match class {
            ResourceClass::Vip => &self.vip,
            ResourceClass::Regular => &self.regular,
        }
    }

    fn lane_mut(&mut self, class: ResourceClass) -> &mut VecDeque<PendingRequest> {
        match class {
            ResourceClass::Vip => &mut self.vip,
            ResourceClass::Regular => &mut self.regular,
        }
    }

    /// Append a request to its class queue
    pub fn push(&mut self, request: PendingRequest) {
        self.lane_mut(request.class).push_back(request);
    }

    /// Oldest request of a class
    pub fn front(&self, class: ResourceClass) -> Option<&PendingRequest> {
        self.lane(class).front()
    }

    /// Request at `index` of a class queue
    pub fn get(&self, class: ResourceClass, index: usize) -> Option<&PendingRequest> {
        self.lane(class).get(index)
    }

    /// Position of the oldest request of a class owned by `holder`
    pub fn position_of(&self, class: ResourceClass, holder: &HolderId) -> Option<usize> {
        self.lane(class).iter().position(|r| &r.holder == holder)
    }

    /// Remove the request at `index`, keeping the rest in order
    pub fn remove_at(&mut self, class: ResourceClass, index: usize) -> Option<PendingRequest> {
        self.lane_mut(class).remove(index)
    }

    /// Number of queued requests of a class
    pub fn len(&self, class: ResourceClass) -> usize {
        self.lane(class).len()
    }

    /// True if every class queue is empty
    pub fn is_empty(&self) -> bool {
        self.vip.is_empty() && self.regular.is_empty()
    }

    /// Queued units per class belonging to `holder`
    pub fn pending_for(&self, holder: &HolderId) -> ClassCounts {
        let mut counts = ClassCounts::zero();
        for class in ResourceClass::ALL {
            counts[class] = self
                .lane(class)
                .iter()
                .filter(|r| &r.holder == holder)
                .count() as u32;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_per_class() {
        let mut queue = RequestQueue::new();
        let alice = HolderId::new("alice");
        let bob = HolderId::new("bob");

        queue.push(PendingRequest::new(alice.clone(), ResourceClass::Regular));
        queue.push(PendingRequest::new(bob.clone(), ResourceClass::Regular));
        queue.push(PendingRequest::new(bob.clone(), ResourceClass::Vip));

        assert_eq!(queue.len(ResourceClass::Regular), 2);
        assert_eq!(queue.len(ResourceClass::Vip), 1);

        assert_eq!(queue.front(ResourceClass::Regular).unwrap().holder, alice);
        assert_eq!(queue.get(ResourceClass::Regular, 1).unwrap().holder, bob);
        assert!(queue.get(ResourceClass::Regular, 2).is_none());

        queue.remove_at(ResourceClass::Regular, 0);
        assert_eq!(queue.front(ResourceClass::Regular).unwrap().holder, bob);
        assert!(!queue.is_empty());
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = RequestQueue::new();
        for name in ["a", "b", "a", "c"] {
            queue.push(PendingRequest::new(HolderId::new(name), ResourceClass::Vip));
        }

        let b = HolderId::new("b");
        let idx = queue.position_of(ResourceClass::Vip, &b).unwrap();
        assert_eq!(idx, 1);
        queue.remove_at(ResourceClass::Vip, idx);

        let order: Vec<_> = (0..queue.len(ResourceClass::Vip))
            .filter_map(|i| queue.get(ResourceClass::Vip, i))
            .map(|r| r.holder.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["a", "a", "c"]);
        assert_eq!(queue.pending_for(&HolderId::new("a")), ClassCounts::new(2, 0));
    }
}
