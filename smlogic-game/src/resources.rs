use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{EnumCount, EnumIter, EnumString, VariantNames};

use crate::Capacity;

/// Resources as they are stored in the game state: energy comes in two pools that
/// refill and drain by different rules.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    VariantNames,
    EnumCount,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum RechargeableResource {
    RegularEnergy,
    ReserveEnergy,
    Missile,
    Super,
    PowerBomb,
}

/// Resources as they are spent: energy is a single consumable drawn from both pools.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    VariantNames,
    EnumCount,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ConsumableResource {
    Energy,
    Missile,
    Super,
    PowerBomb,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    VariantNames,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum AmmoType {
    Missile,
    Super,
    PowerBomb,
}

impl RechargeableResource {
    pub fn consumable(self) -> ConsumableResource {
        match self {
            RechargeableResource::RegularEnergy | RechargeableResource::ReserveEnergy => {
                ConsumableResource::Energy
            }
            RechargeableResource::Missile => ConsumableResource::Missile,
            RechargeableResource::Super => ConsumableResource::Super,
            RechargeableResource::PowerBomb => ConsumableResource::PowerBomb,
        }
    }
}

impl ConsumableResource {
    pub fn rechargeables(self) -> &'static [RechargeableResource] {
        match self {
            ConsumableResource::Energy => &[
                RechargeableResource::RegularEnergy,
                RechargeableResource::ReserveEnergy,
            ],
            ConsumableResource::Missile => &[RechargeableResource::Missile],
            ConsumableResource::Super => &[RechargeableResource::Super],
            ConsumableResource::PowerBomb => &[RechargeableResource::PowerBomb],
        }
    }
}

impl AmmoType {
    pub fn resource(self) -> RechargeableResource {
        match self {
            AmmoType::Missile => RechargeableResource::Missile,
            AmmoType::Super => RechargeableResource::Super,
            AmmoType::PowerBomb => RechargeableResource::PowerBomb,
        }
    }
}

impl From<AmmoType> for RechargeableResource {
    fn from(value: AmmoType) -> Self {
        value.resource()
    }
}

impl From<AmmoType> for ConsumableResource {
    fn from(value: AmmoType) -> Self {
        value.resource().consumable()
    }
}

/// An amount per rechargeable resource.
///
/// Used both for absolute snapshots (current amounts, maxima), which never go negative,
/// and for variations, where a negative amount records a drain.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceCount {
    amounts: [Capacity; RechargeableResource::COUNT],
}

impl ResourceCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(resource: RechargeableResource, amount: Capacity) -> Self {
        Self::new().with(resource, amount)
    }

    pub fn from_pairs(pairs: &[(RechargeableResource, Capacity)]) -> Self {
        let mut out = Self::new();
        for &(resource, amount) in pairs {
            out.amounts[resource as usize] += amount;
        }
        out
    }

    pub fn get(&self, resource: RechargeableResource) -> Capacity {
        self.amounts[resource as usize]
    }

    pub fn set(&mut self, resource: RechargeableResource, amount: Capacity) {
        self.amounts[resource as usize] = amount;
    }

    #[must_use]
    pub fn with(mut self, resource: RechargeableResource, amount: Capacity) -> Self {
        self.set(resource, amount);
        self
    }

    /// Total amount available of a consumable, summed over the pools it draws from.
    pub fn consumable_amount(&self, resource: ConsumableResource) -> Capacity {
        resource.rechargeables().iter().map(|&r| self.get(r)).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.amounts.iter().all(|&x| x == 0)
    }

    pub fn is_within(&self, maximums: &ResourceCount) -> bool {
        RechargeableResource::iter().all(|r| self.get(r) >= 0 && self.get(r) <= maximums.get(r))
    }

    #[must_use]
    pub fn clamped_to(&self, maximums: &ResourceCount) -> Self {
        let mut out = *self;
        for r in RechargeableResource::iter() {
            out.set(r, self.get(r).clamp(0, Capacity::max(0, maximums.get(r))));
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (RechargeableResource, Capacity)> + '_ {
        RechargeableResource::iter().map(move |r| (r, self.get(r)))
    }
}

impl Add for ResourceCount {
    type Output = ResourceCount;

    fn add(mut self, rhs: ResourceCount) -> ResourceCount {
        self += rhs;
        self
    }
}

impl AddAssign for ResourceCount {
    fn add_assign(&mut self, rhs: ResourceCount) {
        for i in 0..RechargeableResource::COUNT {
            self.amounts[i] += rhs.amounts[i];
        }
    }
}

impl Sub for ResourceCount {
    type Output = ResourceCount;

    fn sub(mut self, rhs: ResourceCount) -> ResourceCount {
        self -= rhs;
        self
    }
}

impl SubAssign for ResourceCount {
    fn sub_assign(&mut self, rhs: ResourceCount) {
        for i in 0..RechargeableResource::COUNT {
            self.amounts[i] -= rhs.amounts[i];
        }
    }
}

impl Neg for ResourceCount {
    type Output = ResourceCount;

    fn neg(self) -> ResourceCount {
        ResourceCount::new() - self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_is_split_into_two_pools() {
        let count = ResourceCount::from_pairs(&[
            (RechargeableResource::RegularEnergy, 50),
            (RechargeableResource::ReserveEnergy, 30),
            (RechargeableResource::Missile, 7),
        ]);
        assert_eq!(count.consumable_amount(ConsumableResource::Energy), 80);
        assert_eq!(count.consumable_amount(ConsumableResource::Missile), 7);
        for c in ConsumableResource::iter() {
            for &r in c.rechargeables() {
                assert_eq!(r.consumable(), c);
            }
        }
    }

    #[test]
    fn test_variation_arithmetic() {
        let a = ResourceCount::of(RechargeableResource::RegularEnergy, -20);
        let b = ResourceCount::from_pairs(&[
            (RechargeableResource::RegularEnergy, 17),
            (RechargeableResource::ReserveEnergy, -37),
        ]);
        let c = ResourceCount::of(RechargeableResource::Super, -1);
        assert_eq!((a + b) + c, a + (b + c));
        assert_eq!(a + b, b + a);
        assert_eq!((a + b).get(RechargeableResource::RegularEnergy), -3);
        assert_eq!(-(a - a), ResourceCount::new());
        assert!((a - a).is_zero());
    }

    #[test]
    fn test_clamp_absolute_snapshot() {
        let maximums = ResourceCount::from_pairs(&[
            (RechargeableResource::RegularEnergy, 99),
            (RechargeableResource::Missile, 10),
        ]);
        let snapshot = ResourceCount::from_pairs(&[
            (RechargeableResource::RegularEnergy, 150),
            (RechargeableResource::Missile, -3),
        ]);
        assert!(!snapshot.is_within(&maximums));
        let clamped = snapshot.clamped_to(&maximums);
        assert!(clamped.is_within(&maximums));
        assert_eq!(clamped.get(RechargeableResource::RegularEnergy), 99);
        assert_eq!(clamped.get(RechargeableResource::Missile), 0);
    }
}
