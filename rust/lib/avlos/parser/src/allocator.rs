use avlos_ir::{EndpointId, HASH_ENDPOINT_ID};

/// Hands out endpoint IDs during a single build.
///
/// One allocator per build; it is never shared, so rebuilding the same
/// document always reproduces the same IDs.
#[derive(Debug, Clone)]
pub struct EndpointAllocator {
    next: u32,
}

impl EndpointAllocator {
    /// Fresh allocator. ID 0 is taken by the hash accessor.
    pub fn new() -> Self {
        Self {
            next: u32::from(HASH_ENDPOINT_ID) + 1,
        }
    }

    /// Next ID, or `None` once the ID space is exhausted.
    pub fn next_id(&mut self) -> Option<EndpointId> {
        let id = EndpointId::try_from(self.next).ok()?;
        self.next += 1;
        Some(id)
    }

    /// Number of IDs handed out, including the reserved one.
    pub fn count(&self) -> u32 {
        self.next
    }
}

impl Default for EndpointAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_after_hash_endpoint() {
        let mut alloc = EndpointAllocator::new();
        assert_eq!(alloc.next_id(), Some(1));
        assert_eq!(alloc.next_id(), Some(2));
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn independent_allocators() {
        let mut a = EndpointAllocator::new();
        let mut b = EndpointAllocator::new();
        a.next_id();
        a.next_id();
        assert_eq!(b.next_id(), Some(1));
    }

    #[test]
    fn exhaustion() {
        let mut alloc = EndpointAllocator {
            next: u32::from(EndpointId::MAX),
        };
        assert_eq!(alloc.next_id(), Some(EndpointId::MAX));
        assert_eq!(alloc.next_id(), None);
    }
}
