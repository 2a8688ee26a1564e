//! Resource inventory and requirement models.
//!
//! The plan inventory lists concrete units (cameras, coaches, props) as
//! *plan items*. Each plan item points back to a catalog item and a
//! resource type. Tasks state what they need against the catalog and the
//! types; the solver turns that into concrete plan-item ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plan item identifier (the unit that is actually assigned).
pub type PlanItemId = u64;

/// A concrete resource unit available to the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceItem {
    /// Plan item id (what `assignedResources` refers to).
    pub id: PlanItemId,
    /// Catalog item id (what `byItem` / `anyOf` refer to).
    pub resource_item_id: u64,
    /// Resource type id (what `byType` refers to).
    pub type_id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Whether the unit can be assigned at all.
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

impl ResourceItem {
    /// Creates an available unit.
    pub fn new(id: PlanItemId, resource_item_id: u64, type_id: u64) -> Self {
        Self {
            id,
            resource_item_id,
            type_id,
            name: String::new(),
            is_available: true,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the unit as unavailable.
    pub fn unavailable(mut self) -> Self {
        self.is_available = false;
        self
    }
}

/// "At least `quantity` units from this catalog set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyOfRequirement {
    /// Units needed from the set.
    pub quantity: u32,
    /// Candidate catalog item ids.
    pub resource_item_ids: Vec<u64>,
}

/// Normalized resource requirements of a task.
///
/// All three parts must be satisfied simultaneously, without assigning the
/// same plan item twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Resource type id → quantity.
    #[serde(default)]
    pub by_type: BTreeMap<u64, u32>,
    /// Catalog item id → quantity.
    #[serde(default)]
    pub by_item: BTreeMap<u64, u32>,
    /// Alternatives; each entry must be fully satisfied.
    #[serde(default)]
    pub any_of: Vec<AnyOfRequirement>,
}

impl ResourceRequirements {
    /// Creates an empty requirement set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `quantity` units of a resource type.
    pub fn with_type(mut self, type_id: u64, quantity: u32) -> Self {
        self.by_type.insert(type_id, quantity);
        self
    }

    /// Requires `quantity` units of a specific catalog item.
    pub fn with_item(mut self, resource_item_id: u64, quantity: u32) -> Self {
        self.by_item.insert(resource_item_id, quantity);
        self
    }

    /// Requires `quantity` units from any of the given catalog items.
    pub fn with_any_of(mut self, quantity: u32, resource_item_ids: Vec<u64>) -> Self {
        self.any_of.push(AnyOfRequirement {
            quantity,
            resource_item_ids,
        });
        self
    }

    /// Whether nothing is required.
    pub fn is_empty(&self) -> bool {
        self.by_type.values().all(|&q| q == 0)
            && self.by_item.values().all(|&q| q == 0)
            && self.any_of.iter().all(|a| a.quantity == 0)
    }

    /// Picks plan items satisfying every part of the requirement.
    ///
    /// `free` must already exclude units that are busy or unavailable.
    /// Parts are served most-specific first (`byItem`, `anyOf`, `byType`)
    /// and each part takes the lowest free plan-item ids, so the result is
    /// deterministic. Returns `None` when any part cannot be met.
    pub fn allocate(&self, free: &[&ResourceItem]) -> Option<Vec<PlanItemId>> {
        self.allocate_ranked(free, |_| 0)
    }

    /// Like [`allocate`](Self::allocate), but each part takes units with
    /// the lowest `rank` first and falls back to higher ranks.
    pub fn allocate_ranked<R>(&self, free: &[&ResourceItem], rank: R) -> Option<Vec<PlanItemId>>
    where
        R: Fn(&ResourceItem) -> u8,
    {
        let mut pool: Vec<&ResourceItem> = free.to_vec();
        pool.sort_by_key(|r| (rank(r), r.id));
        let mut taken: Vec<PlanItemId> = Vec::new();

        for (&item_id, &quantity) in &self.by_item {
            if !take_matching(&mut pool, &mut taken, quantity, |r| {
                r.resource_item_id == item_id
            }) {
                return None;
            }
        }
        for alt in &self.any_of {
            if !take_matching(&mut pool, &mut taken, alt.quantity, |r| {
                alt.resource_item_ids.contains(&r.resource_item_id)
            }) {
                return None;
            }
        }
        for (&type_id, &quantity) in &self.by_type {
            if !take_matching(&mut pool, &mut taken, quantity, |r| r.type_id == type_id) {
                return None;
            }
        }

        taken.sort_unstable();
        Some(taken)
    }
}

/// Moves up to `quantity` accepted units from `pool` into `taken`.
fn take_matching<F>(
    pool: &mut Vec<&ResourceItem>,
    taken: &mut Vec<PlanItemId>,
    quantity: u32,
    accept: F,
) -> bool
where
    F: Fn(&ResourceItem) -> bool,
{
    let mut remaining = quantity;
    let mut i = 0;
    while remaining > 0 && i < pool.len() {
        if accept(pool[i]) {
            taken.push(pool.remove(i).id);
            remaining -= 1;
        } else {
            i += 1;
        }
    }
    remaining == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Vec<ResourceItem> {
        vec![
            ResourceItem::new(1, 100, 10).with_name("Camera A"),
            ResourceItem::new(2, 100, 10).with_name("Camera B"),
            ResourceItem::new(3, 200, 20).with_name("Coach Ana"),
            ResourceItem::new(4, 201, 20).with_name("Coach Luis"),
            ResourceItem::new(5, 300, 30).with_name("Drone").unavailable(),
        ]
    }

    #[test]
    fn test_empty_requirements() {
        let req = ResourceRequirements::new();
        assert!(req.is_empty());
        let inv = inventory();
        let free: Vec<&ResourceItem> = inv.iter().collect();
        assert_eq!(req.allocate(&free), Some(vec![]));
    }

    #[test]
    fn test_allocate_by_type() {
        let inv = inventory();
        let free: Vec<&ResourceItem> = inv.iter().collect();
        let req = ResourceRequirements::new().with_type(10, 2);
        assert_eq!(req.allocate(&free), Some(vec![1, 2]));

        let too_many = ResourceRequirements::new().with_type(10, 3);
        assert_eq!(too_many.allocate(&free), None);
    }

    #[test]
    fn test_specific_item_served_before_type() {
        let inv = inventory();
        let free: Vec<&ResourceItem> = inv.iter().collect();
        // Coach Luis is named explicitly; the generic coach must then be Ana.
        let req = ResourceRequirements::new()
            .with_item(201, 1)
            .with_type(20, 1);
        assert_eq!(req.allocate(&free), Some(vec![3, 4]));
    }

    #[test]
    fn test_any_of_alternatives() {
        let inv = inventory();
        let free: Vec<&ResourceItem> = inv.iter().filter(|r| r.id != 3).collect();
        let req = ResourceRequirements::new().with_any_of(1, vec![200, 201]);
        assert_eq!(req.allocate(&free), Some(vec![4]));

        let none_left: Vec<&ResourceItem> = inv.iter().filter(|r| r.type_id != 20).collect();
        assert_eq!(req.allocate(&none_left), None);
    }

    #[test]
    fn test_no_unit_used_twice() {
        let inv = inventory();
        let free: Vec<&ResourceItem> = inv.iter().collect();
        let req = ResourceRequirements::new()
            .with_item(100, 1)
            .with_type(10, 2);
        assert_eq!(req.allocate(&free), None);
    }

    #[test]
    fn test_ranked_pool_preferred() {
        let inv = inventory();
        let free: Vec<&ResourceItem> = inv.iter().collect();
        let req = ResourceRequirements::new().with_type(20, 1);
        assert_eq!(req.allocate(&free), Some(vec![3]));
        // Coach Luis is anchored; Ana is only a fallback.
        let anchored = |r: &ResourceItem| if r.id == 4 { 0 } else { 2 };
        assert_eq!(req.allocate_ranked(&free, anchored), Some(vec![4]));

        let both = ResourceRequirements::new().with_type(20, 2);
        assert_eq!(both.allocate_ranked(&free, anchored), Some(vec![3, 4]));
    }

    #[test]
    fn test_wire_shape() {
        let json = r#"{"byType":{"10":1},"anyOf":[{"quantity":1,"resourceItemIds":[200,201]}]}"#;
        let req: ResourceRequirements = serde_json::from_str(json).unwrap();
        assert_eq!(req.by_type.get(&10), Some(&1));
        assert!(req.by_item.is_empty());
        assert_eq!(req.any_of[0].resource_item_ids, vec![200, 201]);
    }
}
