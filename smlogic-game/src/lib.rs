// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod builder;
pub mod requirement;
pub mod resources;

use hashbrown::HashMap;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use strum_macros::{EnumCount, EnumIter, EnumString, VariantNames};

pub use builder::LogicModelBuilder;
pub use requirement::{Requirement, RequirementId};
pub use resources::{AmmoType, ConsumableResource, RechargeableResource, ResourceCount};

pub type TechIdx = usize; // Index into LogicModel.tech_isv.keys: distinct tech names
pub type HelperIdx = usize; // Index into LogicModel.helper_isv.keys: distinct helper names
pub type StratIdx = usize; // Index into LogicModel.strat_isv.keys: distinct (room_id, strat name) pairs
pub type FlagIdx = usize; // Index into LogicModel.flag_isv.keys: distinct game flag names
pub type EnemyIdx = usize; // Index into LogicModel.enemy_isv.keys: distinct enemy names
pub type WeaponIdx = usize; // Index into LogicModel.weapon_isv.keys: distinct weapon names
pub type RoomId = usize; // Room ID from the room data (opaque to the logic)
pub type NodeId = usize; // Node ID (only unique within a room)
pub type WeaponMask = usize; // Bitmask where `i`th bit indicates availability of (or vulnerability to) `i`th weapon.
pub type Capacity = i16; // Data type used to represent quantities of energy, ammo, etc.

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
    EnumCount,
    EnumIter,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    PartialOrd,
    Ord,
)]
#[repr(usize)]
pub enum Item {
    ETank,        // 0
    Missile,      // 1
    Super,        // 2
    PowerBomb,    // 3
    Bombs,        // 4
    Charge,       // 5
    Ice,          // 6
    HiJump,       // 7
    SpeedBooster, // 8
    Wave,         // 9
    Spazer,       // 10
    SpringBall,   // 11
    Varia,        // 12
    Gravity,      // 13
    XRayScope,    // 14
    Plasma,       // 15
    Grapple,      // 16
    SpaceJump,    // 17
    ScrewAttack,  // 18
    Morph,        // 19
    ReserveTank,  // 20
    WallJump,     // 21
}

impl Item {
    /// The resource maximum raised by collecting one copy of this item, if it is an expansion.
    pub fn expansion(self) -> Option<(RechargeableResource, Capacity)> {
        match self {
            Item::ETank => Some((RechargeableResource::RegularEnergy, 100)),
            Item::ReserveTank => Some((RechargeableResource::ReserveEnergy, 100)),
            Item::Missile => Some((RechargeableResource::Missile, 5)),
            Item::Super => Some((RechargeableResource::Super, 5)),
            Item::PowerBomb => Some((RechargeableResource::PowerBomb, 5)),
            _ => None,
        }
    }

    /// The expansion item raising the maximum of the given resource.
    pub fn expanding(resource: RechargeableResource) -> Item {
        match resource {
            RechargeableResource::RegularEnergy => Item::ETank,
            RechargeableResource::ReserveEnergy => Item::ReserveTank,
            RechargeableResource::Missile => Item::Missile,
            RechargeableResource::Super => Item::Super,
            RechargeableResource::PowerBomb => Item::PowerBomb,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyVulnerabilities {
    pub hp: Capacity,
    pub non_ammo_vulnerabilities: WeaponMask,
    pub missile_damage: Capacity,
    pub super_damage: Capacity,
    pub power_bomb_damage: Capacity,
}

#[derive(Clone, Debug)]
pub struct EnemyAttack {
    pub name: String,
    pub base_damage: Capacity,
}

#[derive(Clone, Debug)]
pub struct EnemyInfo {
    pub name: String,
    pub attacks: Vec<EnemyAttack>,
    pub vul: EnemyVulnerabilities,
}

#[derive(Clone, Debug)]
pub struct WeaponInfo {
    pub name: String,
    pub use_requires: RequirementId,
}

#[derive(Clone, Debug)]
pub struct TechInfo {
    pub name: String,
    pub requires: RequirementId,
    pub root: RequirementId,
}

#[derive(Clone, Debug)]
pub struct HelperInfo {
    pub name: String,
    pub requires: RequirementId,
    pub root: RequirementId,
}

#[derive(Clone, Debug)]
pub struct StratInfo {
    pub room_id: RoomId,
    pub name: String,
    pub notable: bool,
    pub requires: RequirementId,
    // The `Strat` node wrapping `requires`, which is what callers execute:
    pub root: RequirementId,
}

/// Fully resolved symbol tables and requirement arena.
///
/// Every requirement node lives in `requirements`; a node's children always have
/// smaller ids than the node itself, so a single pass in id order visits children first.
#[derive(Clone, Debug)]
pub struct LogicModel {
    pub requirements: Vec<Requirement>,
    pub free_req: RequirementId,
    pub never_req: RequirementId,
    pub tech_isv: IndexedVec<String>,
    pub tech: Vec<TechInfo>,
    pub helper_isv: IndexedVec<String>,
    pub helpers: Vec<HelperInfo>,
    pub strat_isv: IndexedVec<(RoomId, String)>,
    pub strats: Vec<StratInfo>,
    pub flag_isv: IndexedVec<String>,
    pub enemy_isv: IndexedVec<String>,
    pub enemies: Vec<EnemyInfo>,
    pub weapon_isv: IndexedVec<String>,
    pub weapons: Vec<WeaponInfo>,
}

impl LogicModel {
    pub fn requirement(&self, id: RequirementId) -> &Requirement {
        &self.requirements[id]
    }

    pub fn num_requirements(&self) -> usize {
        self.requirements.len()
    }

    pub fn tech_idx(&self, name: &str) -> Option<TechIdx> {
        self.tech_isv.index_by_key.get(name).copied()
    }

    pub fn helper_idx(&self, name: &str) -> Option<HelperIdx> {
        self.helper_isv.index_by_key.get(name).copied()
    }

    pub fn flag_idx(&self, name: &str) -> Option<FlagIdx> {
        self.flag_isv.index_by_key.get(name).copied()
    }

    pub fn strat_idx(&self, room_id: RoomId, name: &str) -> Option<StratIdx> {
        self.strat_isv
            .index_by_key
            .get(&(room_id, name.to_string()))
            .copied()
    }

    pub fn enemy_idx(&self, name: &str) -> Option<EnemyIdx> {
        self.enemy_isv.index_by_key.get(name).copied()
    }

    pub fn weapon_idx(&self, name: &str) -> Option<WeaponIdx> {
        self.weapon_isv.index_by_key.get(name).copied()
    }

    pub fn tech_root(&self, tech_idx: TechIdx) -> RequirementId {
        self.tech[tech_idx].root
    }

    pub fn helper_root(&self, helper_idx: HelperIdx) -> RequirementId {
        self.helpers[helper_idx].root
    }

    pub fn strat_root(&self, strat_idx: StratIdx) -> RequirementId {
        self.strats[strat_idx].root
    }

    /// The ids of the nodes a node depends on, in source order. For an enemy kill, these are the
    /// requirements of the weapons the enemy is vulnerable to.
    pub fn children(&self, id: RequirementId) -> Vec<RequirementId> {
        match &self.requirements[id] {
            Requirement::And(reqs) | Requirement::Or(reqs) => reqs.clone(),
            &Requirement::Not(req) => vec![req],
            &Requirement::Tech(tech_idx) => vec![self.tech[tech_idx].requires],
            &Requirement::Helper(helper_idx) => vec![self.helpers[helper_idx].requires],
            &Requirement::Strat(strat_idx) => vec![self.strats[strat_idx].requires],
            Requirement::EnemyKill { vul, .. } => self
                .weapons
                .iter()
                .enumerate()
                .filter(|(i, _)| vul.non_ammo_vulnerabilities & (1 << i) != 0)
                .map(|(_, weapon)| weapon.use_requires)
                .collect(),
            _ => vec![],
        }
    }
}
