//! Mutually-exclusive resources and the fixed resource table.

use crate::queue::ProcQueue;
use crate::types::{Pid, ResourceId};

/// One mutually-exclusive resource.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    /// Process currently holding the resource.
    pub owner: Option<Pid>,
    /// Processes blocked on this resource, in arrival order.
    pub waitqueue: ProcQueue,
}

impl Resource {
    pub fn new(id: ResourceId) -> Self {
        Resource {
            id,
            owner: None,
            waitqueue: ProcQueue::new(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }
}

/// Fixed-size table of resources indexed by [`ResourceId`].
///
/// The table never grows or shrinks during a run; only ownership and
/// wait-set membership change.
#[derive(Debug, Clone)]
pub struct ResourceTable {
    resources: Vec<Resource>,
}

impl ResourceTable {
    /// Create `nr` unowned resources with empty wait-sets.
    pub fn new(nr: usize) -> Self {
        ResourceTable {
            resources: (0..nr).map(|i| Resource::new(ResourceId(i))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.0)
    }

    /// Look up a resource for a protocol call.
    ///
    /// # Panics
    /// Panics if `id` is outside the table.
    pub fn resource_mut(&mut self, id: ResourceId) -> &mut Resource {
        let nr = self.resources.len();
        self.resources
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("resource {id} out of range (table has {nr})"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Owner of `id`, if any. Out-of-range ids have no owner.
    pub fn owner(&self, id: ResourceId) -> Option<Pid> {
        self.get(id).and_then(|r| r.owner)
    }

    /// Resources currently held by `pid`.
    pub fn owned_by(&self, pid: Pid) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.owner == Some(pid))
            .map(|r| r.id)
            .collect()
    }

    /// The resource whose wait-set holds `pid`, if any.
    pub fn waiting_on(&self, pid: Pid) -> Option<ResourceId> {
        self.resources
            .iter()
            .find(|r| r.waitqueue.contains(pid))
            .map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_unowned() {
        let table = ResourceTable::new(4);
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|r| r.is_free() && r.waitqueue.is_empty()));
        assert_eq!(table.get(ResourceId(3)).map(|r| r.id), Some(ResourceId(3)));
        assert!(table.get(ResourceId(4)).is_none());
    }

    #[test]
    fn test_ownership_queries() {
        let mut table = ResourceTable::new(3);
        table.resource_mut(ResourceId(0)).owner = Some(Pid(7));
        table.resource_mut(ResourceId(2)).owner = Some(Pid(7));
        table.resource_mut(ResourceId(1)).waitqueue.push_back(Pid(9));

        assert_eq!(table.owned_by(Pid(7)), vec![ResourceId(0), ResourceId(2)]);
        assert_eq!(table.owner(ResourceId(1)), None);
        assert_eq!(table.waiting_on(Pid(9)), Some(ResourceId(1)));
        assert_eq!(table.waiting_on(Pid(7)), None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_lookup_panics() {
        let mut table = ResourceTable::new(2);
        table.resource_mut(ResourceId(2));
    }
}
