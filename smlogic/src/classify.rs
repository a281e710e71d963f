use log::debug;
use smlogic_game::{
    AmmoType, ConsumableResource, EnemyVulnerabilities, Item, LogicModel, RechargeableResource,
    Requirement, RequirementId, requirement::get_effective_runway_length,
};
use smlogic_logic::ItemInventory;

use crate::options::{LogicSettings, LogicalOptions, OptionsVersion};

/// What can be known about a requirement without looking at any particular state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Relevance {
    // Fails in every state:
    pub never: bool,
    // Succeeds in every state:
    pub always: bool,
    // Costs no resources whenever it succeeds:
    pub free: bool,
}

impl Relevance {
    const NEVER: Relevance = Relevance {
        never: true,
        always: false,
        free: false,
    };
    const ALWAYS_FREE: Relevance = Relevance {
        never: false,
        always: true,
        free: true,
    };
    const ALWAYS: Relevance = Relevance {
        never: false,
        always: true,
        free: false,
    };
    const FREE: Relevance = Relevance {
        never: false,
        always: false,
        free: true,
    };
    const UNKNOWN: Relevance = Relevance {
        never: false,
        always: false,
        free: false,
    };
}

/// Relevance of every node of a model, for one version of the options.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    version: OptionsVersion,
    relevance: Vec<Relevance>,
}

impl Classification {
    pub fn version(&self) -> OptionsVersion {
        self.version
    }

    pub fn get(&self, id: RequirementId) -> Relevance {
        self.relevance[id]
    }

    pub fn len(&self) -> usize {
        self.relevance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relevance.is_empty()
    }
}

fn can_never_have(settings: &LogicSettings, item: Item) -> bool {
    settings.is_item_removed(item)
}

fn capacity_unreachable(
    settings: &LogicSettings,
    resource: RechargeableResource,
    count: i32,
) -> bool {
    let base = ItemInventory::new().base_maximums.get(resource) as i32;
    count > base && can_never_have(settings, Item::expanding(resource))
}

fn classify_and(children: &[Relevance]) -> Relevance {
    Relevance {
        never: children.iter().any(|r| r.never),
        always: children.iter().all(|r| r.always),
        free: children.iter().all(|r| r.free),
    }
}

fn classify_or(children: &[Relevance]) -> Relevance {
    Relevance {
        never: children.iter().all(|r| r.never),
        always: children.iter().any(|r| r.always),
        free: children.iter().any(|r| r.always && r.free)
            || children.iter().filter(|r| !r.never).all(|r| r.free),
    }
}

fn classify_not(child: Relevance) -> Relevance {
    Relevance {
        never: child.always,
        always: child.never,
        free: child.never,
    }
}

fn classify_enemy_kill(
    model: &LogicModel,
    settings: &LogicSettings,
    relevance: &[Relevance],
    vul: &EnemyVulnerabilities,
) -> Relevance {
    if vul.hp <= 0 {
        return Relevance::ALWAYS_FREE;
    }
    let mut any_weapon_possible = false;
    for (i, weapon) in model.weapons.iter().enumerate() {
        if vul.non_ammo_vulnerabilities & (1 << i) == 0 {
            continue;
        }
        let r = relevance[weapon.use_requires];
        if r.always {
            return Relevance::ALWAYS_FREE;
        }
        any_weapon_possible |= !r.never;
    }
    let ammo_possible = |ammo: AmmoType, damage: i16| {
        damage > 0 && !can_never_have(settings, Item::expanding(ammo.resource()))
    };
    any_weapon_possible |= ammo_possible(AmmoType::Missile, vul.missile_damage);
    any_weapon_possible |= ammo_possible(AmmoType::Super, vul.super_damage);
    any_weapon_possible |= ammo_possible(AmmoType::PowerBomb, vul.power_bomb_damage)
        && !can_never_have(settings, Item::Morph);
    if any_weapon_possible {
        Relevance::UNKNOWN
    } else {
        Relevance::NEVER
    }
}

fn classify_node(
    model: &LogicModel,
    settings: &LogicSettings,
    relevance: &[Relevance],
    req: &Requirement,
) -> Relevance {
    match req {
        Requirement::Free => Relevance::ALWAYS_FREE,
        Requirement::Never => Relevance::NEVER,
        Requirement::And(reqs) => {
            let children: Vec<Relevance> = reqs.iter().map(|&c| relevance[c]).collect();
            classify_and(&children)
        }
        Requirement::Or(reqs) => {
            let children: Vec<Relevance> = reqs.iter().map(|&c| relevance[c]).collect();
            classify_or(&children)
        }
        &Requirement::Not(c) => classify_not(relevance[c]),
        &Requirement::Tech(tech_idx) => {
            if !settings.tech[tech_idx] {
                Relevance::NEVER
            } else {
                relevance[model.tech[tech_idx].requires]
            }
        }
        &Requirement::Helper(helper_idx) => relevance[model.helpers[helper_idx].requires],
        &Requirement::Strat(strat_idx) => {
            if !settings.strats[strat_idx] {
                Relevance::NEVER
            } else {
                relevance[model.strats[strat_idx].requires]
            }
        }
        &Requirement::Item(item) => {
            if can_never_have(settings, item) {
                Relevance::NEVER
            } else {
                Relevance::FREE
            }
        }
        &Requirement::Flag(flag_idx) => {
            if settings.removed_flags.contains(&flag_idx) {
                Relevance::NEVER
            } else {
                Relevance::FREE
            }
        }
        &Requirement::Ammo { ammo, count } => {
            if count <= 0 {
                Relevance::ALWAYS_FREE
            } else if can_never_have(settings, Item::expanding(ammo.resource())) {
                Relevance::NEVER
            } else {
                Relevance::UNKNOWN
            }
        }
        &Requirement::AmmoDrain { count, .. } => {
            if count <= 0 {
                Relevance::ALWAYS_FREE
            } else {
                Relevance::ALWAYS
            }
        }
        Requirement::EnemyKill { vul, .. } => classify_enemy_kill(model, settings, relevance, vul),
        &Requirement::EnemyDamage { damage, hits, .. } => {
            if damage <= 0 || hits <= 0 {
                Relevance::ALWAYS_FREE
            } else {
                Relevance::UNKNOWN
            }
        }
        &Requirement::ResourceCapacity { resource, count } => {
            if count <= 0 {
                Relevance::ALWAYS_FREE
            } else if capacity_unreachable(settings, resource, count as i32) {
                Relevance::NEVER
            } else {
                Relevance::FREE
            }
        }
        &Requirement::ResourceAvailable { resource, count } => {
            let reachable = resource.rechargeables().iter().any(|&r| {
                !can_never_have(settings, Item::expanding(r))
            });
            let base: i32 = resource
                .rechargeables()
                .iter()
                .map(|&r| ItemInventory::new().base_maximums.get(r) as i32)
                .sum();
            if count <= 0 {
                Relevance::ALWAYS_FREE
            } else if !reachable && count as i32 > base {
                Relevance::NEVER
            } else {
                Relevance::FREE
            }
        }
        &Requirement::ResourceConsumed { resource, count } => {
            if count <= 0 {
                Relevance::ALWAYS_FREE
            } else if resource != ConsumableResource::Energy
                && resource
                    .rechargeables()
                    .iter()
                    .all(|&r| can_never_have(settings, Item::expanding(r)))
            {
                Relevance::NEVER
            } else {
                Relevance::UNKNOWN
            }
        }
        Requirement::Refill(_) | Requirement::Farm(_) => Relevance::ALWAYS,
        &Requirement::HeatFrames(frames)
        | &Requirement::LavaFrames(frames)
        | &Requirement::AcidFrames(frames) => {
            if frames <= 0 {
                Relevance::ALWAYS_FREE
            } else {
                Relevance::UNKNOWN
            }
        }
        &Requirement::CanShineCharge {
            used_tiles,
            open_end,
        } => {
            if can_never_have(settings, Item::SpeedBooster)
                || get_effective_runway_length(used_tiles, open_end)
                    < settings.min_shine_charge_tiles()
            {
                Relevance::NEVER
            } else {
                Relevance::FREE
            }
        }
        Requirement::ObstaclesCleared(obstacles) | Requirement::ObstaclesNotCleared(obstacles)
            if obstacles.is_empty() =>
        {
            Relevance::ALWAYS_FREE
        }
        Requirement::PreviousNode(_)
        | Requirement::ObstaclesCleared(_)
        | Requirement::ObstaclesNotCleared(_) => Relevance::FREE,
    }
}

/// Computes the relevance of every node in one pass over the arena. Children always come
/// before their parents, so each node only looks at already-classified nodes.
pub fn classify(model: &LogicModel, options: &LogicalOptions) -> Classification {
    let settings = options.settings();
    let mut relevance: Vec<Relevance> = Vec::with_capacity(model.num_requirements());
    for req in &model.requirements {
        let r = classify_node(model, settings, &relevance, req);
        relevance.push(r);
    }
    debug!(
        "Classified {} requirement nodes for options version {}",
        relevance.len(),
        options.version()
    );
    Classification {
        version: options.version(),
        relevance,
    }
}

/// Holds the classification for the most recently seen options version.
#[derive(Clone, Debug, Default)]
pub struct ClassificationCache {
    current: Option<Classification>,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, model: &LogicModel, options: &LogicalOptions) -> &Classification {
        let stale = self
            .current
            .as_ref()
            .is_none_or(|c| c.version() != options.version());
        if stale {
            self.current = None;
        }
        self.current.get_or_insert_with(|| classify(model, options))
    }
}
