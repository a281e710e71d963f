use serde::{Deserialize, Serialize};

use crate::{
    AmmoType, Capacity, ConsumableResource, EnemyIdx, EnemyVulnerabilities, FlagIdx, HelperIdx,
    Item, NodeId, RechargeableResource, StratIdx, TechIdx,
};

pub type RequirementId = usize; // Index into LogicModel.requirements

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Requirement {
    Free,
    Never,
    And(Vec<RequirementId>),
    Or(Vec<RequirementId>),
    Not(RequirementId),
    Tech(TechIdx),
    Helper(HelperIdx),
    Strat(StratIdx),
    Item(Item),
    Flag(FlagIdx),
    Ammo {
        ammo: AmmoType,
        count: Capacity,
    },
    AmmoDrain {
        ammo: AmmoType,
        count: Capacity,
    },
    EnemyKill {
        enemy: EnemyIdx,
        count: Capacity,
        // Vulnerabilities already restricted to the weapons allowed for this kill:
        vul: EnemyVulnerabilities,
    },
    EnemyDamage {
        // `None` for environmental hazards (spikes, thorns) that still hit like an enemy.
        enemy: Option<EnemyIdx>,
        damage: Capacity,
        hits: Capacity,
        can_act_before_first_hit: bool,
    },
    ResourceCapacity {
        resource: RechargeableResource,
        count: Capacity,
    },
    ResourceAvailable {
        resource: ConsumableResource,
        count: Capacity,
    },
    ResourceConsumed {
        resource: ConsumableResource,
        count: Capacity,
    },
    Refill(Vec<RechargeableResource>),
    Farm(Vec<RechargeableResource>),
    HeatFrames(Capacity),
    LavaFrames(Capacity),
    AcidFrames(Capacity),
    CanShineCharge {
        used_tiles: f32,
        open_end: f32,
    },
    PreviousNode(NodeId),
    ObstaclesCleared(Vec<String>),
    ObstaclesNotCleared(Vec<String>),
}

impl Requirement {
    /// Whether any count, hit number, damage or frame number carried by the node is negative.
    pub fn has_negative_amount(&self) -> bool {
        match self {
            &Requirement::Ammo { count, .. }
            | &Requirement::AmmoDrain { count, .. }
            | &Requirement::ResourceCapacity { count, .. }
            | &Requirement::ResourceAvailable { count, .. }
            | &Requirement::ResourceConsumed { count, .. } => count < 0,
            &Requirement::EnemyKill { count, ref vul, .. } => {
                count < 0
                    || vul.hp < 0
                    || vul.missile_damage < 0
                    || vul.super_damage < 0
                    || vul.power_bomb_damage < 0
            }
            &Requirement::EnemyDamage { damage, hits, .. } => damage < 0 || hits < 0,
            &Requirement::HeatFrames(frames)
            | &Requirement::LavaFrames(frames)
            | &Requirement::AcidFrames(frames) => frames < 0,
            _ => false,
        }
    }

    pub fn child_ids(&self) -> &[RequirementId] {
        match self {
            Requirement::And(reqs) | Requirement::Or(reqs) => reqs,
            Requirement::Not(req) => std::slice::from_ref(req),
            _ => &[],
        }
    }
}

pub fn get_effective_runway_length(used_tiles: f32, open_end: f32) -> f32 {
    used_tiles + open_end * 0.5
}
