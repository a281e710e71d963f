use hashbrown::HashSet;
use smlogic_game::{EnemyIdx, FlagIdx, Item, ResourceCount, StratIdx, TechIdx};

use crate::InGameState;

/// Outcome of a successful execution: the resulting state plus what the execution touched
/// and what it cost, measured against the state it started from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub state: InGameState,
    pub items_involved: HashSet<Item>,
    pub flags_involved: HashSet<FlagIdx>,
    pub tech_used: HashSet<TechIdx>,
    pub strats_used: HashSet<StratIdx>,
    pub obstacles_involved: HashSet<String>,
    // In kill order, with repeats:
    pub enemies_killed: Vec<EnemyIdx>,
    pub resource_variation: ResourceCount,
    pub resource_maximum_variation: ResourceCount,
}

impl ExecutionResult {
    /// A result that changed nothing.
    pub fn new(state: InGameState) -> Self {
        ExecutionResult {
            state,
            items_involved: HashSet::new(),
            flags_involved: HashSet::new(),
            tech_used: HashSet::new(),
            strats_used: HashSet::new(),
            obstacles_involved: HashSet::new(),
            enemies_killed: vec![],
            resource_variation: ResourceCount::new(),
            resource_maximum_variation: ResourceCount::new(),
        }
    }

    /// A result going from `before` to `after`, with the variations derived from the two states.
    pub fn from_transition(before: &InGameState, after: InGameState) -> Self {
        let resource_variation = after.resources - before.resources;
        let resource_maximum_variation = after.resource_maximums() - before.resource_maximums();
        ExecutionResult {
            resource_variation,
            resource_maximum_variation,
            ..Self::new(after)
        }
    }

    /// Chains `next`, which must have been executed against this result's state.
    #[must_use]
    pub fn and_then(mut self, next: ExecutionResult) -> ExecutionResult {
        self.state = next.state;
        self.items_involved.extend(next.items_involved);
        self.flags_involved.extend(next.flags_involved);
        self.tech_used.extend(next.tech_used);
        self.strats_used.extend(next.strats_used);
        self.obstacles_involved.extend(next.obstacles_involved);
        self.enemies_killed.extend(next.enemies_killed);
        self.resource_variation += next.resource_variation;
        self.resource_maximum_variation += next.resource_maximum_variation;
        self
    }

    pub fn is_free(&self) -> bool {
        self.resource_variation.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemInventory, RoomState};
    use smlogic_game::RechargeableResource;

    fn spend(state: &InGameState, resource: RechargeableResource, amt: i16) -> ExecutionResult {
        let mut after = state.clone();
        assert!(after.use_resource(resource, amt));
        ExecutionResult::from_transition(state, after)
    }

    #[test]
    fn test_and_then_is_associative() {
        let inventory =
            ItemInventory::from_items(&[Item::Missile, Item::Missile, Item::Super, Item::ETank]);
        let start = InGameState::new(inventory, RoomState::new(1, 1));

        let mut a = spend(&start, RechargeableResource::Missile, 3);
        a.items_involved.insert(Item::Missile);
        a.enemies_killed.push(4);
        let mut b = spend(&a.state, RechargeableResource::Super, 2);
        b.tech_used.insert(7);
        b.enemies_killed.push(2);
        let mut c = spend(&b.state, RechargeableResource::RegularEnergy, 50);
        c.flags_involved.insert(1);
        c.enemies_killed.push(4);

        let left = a.clone().and_then(b.clone()).and_then(c.clone());
        let right = a.and_then(b.and_then(c));
        assert_eq!(left, right);
        assert_eq!(left.enemies_killed, vec![4, 2, 4]);
        assert_eq!(left.resource_variation, left.state.resources - start.resources);
    }

    #[test]
    fn test_maximum_variation() {
        let start = InGameState::new(ItemInventory::new(), RoomState::new(1, 1));
        let after = start.clone().with_item(Item::ETank);
        let result = ExecutionResult::from_transition(&start, after);
        assert_eq!(
            result.resource_maximum_variation,
            ResourceCount::of(RechargeableResource::RegularEnergy, 100)
        );
        assert!(result.is_free());
    }
}
