pub mod energy;
pub mod helpers;
pub mod result;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use smlogic_game::{
    Capacity, ConsumableResource, FlagIdx, Item, NodeId, RechargeableResource, ResourceCount,
    RoomId,
};
use strum::{EnumCount, IntoEnumIterator};

pub use energy::{DamageLeniency, EnergyPools, PunctualDamage};
pub use result::ExecutionResult;

pub const BASE_MAX_ENERGY: Capacity = 99;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInventory {
    pub items: Vec<bool>,
    // Number of copies collected, per item; only meaningful for expansions.
    pub counts: Vec<Capacity>,
    pub base_maximums: ResourceCount,
}

impl Default for ItemInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemInventory {
    pub fn new() -> Self {
        ItemInventory {
            items: vec![false; Item::COUNT],
            counts: vec![0; Item::COUNT],
            base_maximums: ResourceCount::of(RechargeableResource::RegularEnergy, BASE_MAX_ENERGY),
        }
    }

    pub fn from_items(items: &[Item]) -> Self {
        items
            .iter()
            .fold(Self::new(), |inventory, &item| inventory.with_item(item))
    }

    pub fn has(&self, item: Item) -> bool {
        self.items[item as usize]
    }

    /// Owned items, in item order.
    pub fn owned_items(&self) -> impl Iterator<Item = Item> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter(|&(_, &owned)| owned)
            .filter_map(|(i, _)| Item::try_from(i).ok())
    }

    pub fn count(&self, item: Item) -> Capacity {
        self.counts[item as usize]
    }

    #[must_use]
    pub fn with_item(&self, item: Item) -> Self {
        let mut out = self.clone();
        out.items[item as usize] = true;
        out.counts[item as usize] += 1;
        out
    }

    /// Removes one copy of `item`; the item stays owned while other copies remain.
    #[must_use]
    pub fn without_item(&self, item: Item) -> Self {
        let mut out = self.clone();
        let count = &mut out.counts[item as usize];
        *count = Capacity::max(0, *count - 1);
        out.items[item as usize] = *count > 0;
        out
    }

    pub fn resource_maximums(&self) -> ResourceCount {
        let mut out = self.base_maximums;
        for resource in RechargeableResource::iter() {
            let item = Item::expanding(resource);
            if let Some((_, per_pack)) = item.expansion() {
                out.set(resource, out.get(resource) + self.count(item) * per_pack);
            }
        }
        out
    }

    pub fn maximum(&self, resource: RechargeableResource) -> Capacity {
        self.resource_maximums().get(resource)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    pub room_id: RoomId,
    pub node_id: NodeId,
    pub previous_node_id: Option<NodeId>,
    pub obstacles_cleared: HashSet<String>,
}

impl RoomState {
    pub fn new(room_id: RoomId, node_id: NodeId) -> Self {
        RoomState {
            room_id,
            node_id,
            ..Default::default()
        }
    }
}

/// The state requirements execute against: owned by the caller and cloned, never shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InGameState {
    pub inventory: ItemInventory,
    // Absolute amounts, always within `[0, inventory.resource_maximums()]`:
    pub resources: ResourceCount,
    pub flags: HashSet<FlagIdx>,
    pub room: RoomState,
    pub previous_room: Option<RoomState>,
}

impl InGameState {
    /// A state with every resource filled to its maximum.
    pub fn new(inventory: ItemInventory, room: RoomState) -> Self {
        let resources = inventory.resource_maximums();
        InGameState {
            inventory,
            resources,
            flags: HashSet::new(),
            room,
            previous_room: None,
        }
    }

    pub fn resource_maximums(&self) -> ResourceCount {
        self.inventory.resource_maximums()
    }

    pub fn get(&self, resource: RechargeableResource) -> Capacity {
        self.resources.get(resource)
    }

    pub fn consumable_available(&self, resource: ConsumableResource) -> Capacity {
        self.resources.consumable_amount(resource)
    }

    pub fn has_flag(&self, flag_idx: FlagIdx) -> bool {
        self.flags.contains(&flag_idx)
    }

    #[must_use]
    pub fn with_resources(mut self, resources: ResourceCount) -> Self {
        self.resources = resources.clamped_to(&self.resource_maximums());
        self
    }

    #[must_use]
    pub fn with_item(mut self, item: Item) -> Self {
        self.inventory = self.inventory.with_item(item);
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag_idx: FlagIdx) -> Self {
        self.flags.insert(flag_idx);
        self
    }

    /// Spends `amt` of a resource from a single pool. Fails, leaving the state unchanged,
    /// if not enough is left.
    #[must_use]
    pub fn use_resource(&mut self, resource: RechargeableResource, amt: Capacity) -> bool {
        let x = self.resources.get(resource);
        if amt < 0 || amt > x {
            return false;
        }
        self.resources.set(resource, x - amt);
        true
    }

    /// Spends up to `amt` of a resource, stopping at zero.
    pub fn drain_resource(&mut self, resource: RechargeableResource, amt: Capacity) {
        if amt <= 0 {
            return;
        }
        let x = self.resources.get(resource);
        self.resources.set(resource, Capacity::max(0, x - amt));
    }

    pub fn refill_resource(&mut self, resource: RechargeableResource, amt: Capacity) {
        if amt <= 0 {
            return;
        }
        let max = self.inventory.maximum(resource);
        let x = self.resources.get(resource);
        self.resources.set(resource, Capacity::min(max, x.saturating_add(amt)));
    }

    pub fn refill_to_maximum(&mut self, resource: RechargeableResource) {
        let max = self.inventory.maximum(resource);
        self.resources.set(resource, max);
    }

    /// Applies a resource variation, failing if any pool would leave `[0, maximum]`.
    #[must_use]
    pub fn apply_variation(&mut self, variation: &ResourceCount) -> bool {
        let new_resources = self.resources + *variation;
        if !new_resources.is_within(&self.resource_maximums()) {
            return false;
        }
        self.resources = new_resources;
        true
    }

    pub fn energy_pools(&self) -> EnergyPools {
        let maximums = self.resource_maximums();
        EnergyPools {
            regular: self.get(RechargeableResource::RegularEnergy),
            max_regular: maximums.get(RechargeableResource::RegularEnergy),
            reserve: self.get(RechargeableResource::ReserveEnergy),
            max_reserve: maximums.get(RechargeableResource::ReserveEnergy),
        }
    }

    /// The room that room-local checks look at.
    pub fn room_for(&self, use_previous_room: bool) -> Option<&RoomState> {
        if use_previous_room {
            self.previous_room.as_ref()
        } else {
            Some(&self.room)
        }
    }

    pub fn enter_room(&mut self, room: RoomState) {
        let previous = std::mem::replace(&mut self.room, room);
        self.previous_room = Some(previous);
    }
}
