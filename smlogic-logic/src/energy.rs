//! Energy accounting for hits and for damage taken over time.
//!
//! Energy is split between a regular pool, which kills Samus when it reaches zero, and a
//! reserve pool that can be emptied into the regular pool, either manually or automatically
//! once regular energy runs out. All functions here are pure and return the resulting
//! variation of both pools, or `None` if the damage cannot be survived.

use log::trace;
use serde::{Deserialize, Serialize};
use smlogic_game::{Capacity, RechargeableResource, ResourceCount};

/// Invincibility frames granted by a hit. Reserve refill happens during these frames,
/// at one unit of energy per frame.
pub const HIT_INVINCIBILITY_FRAMES: Capacity = 100;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageLeniency {
    // Overshoot tolerance when filling regular energy from reserves by hand:
    pub reserve_refill_leeway: Capacity,
    pub iframes_to_avoid_double_hit: Capacity,
    pub can_use_partial_reserves: bool,
}

impl Default for DamageLeniency {
    fn default() -> Self {
        DamageLeniency {
            reserve_refill_leeway: 20,
            iframes_to_avoid_double_hit: 60,
            can_use_partial_reserves: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPools {
    pub regular: Capacity,
    pub max_regular: Capacity,
    pub reserve: Capacity,
    pub max_reserve: Capacity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PunctualDamage {
    // Damage of one hit, after suit reduction:
    pub damage_per_hit: Capacity,
    pub hits: Capacity,
    pub can_act_before_first_hit: bool,
}

fn pools_variation(before: &EnergyPools, after: &EnergyPools) -> ResourceCount {
    ResourceCount::from_pairs(&[
        (RechargeableResource::RegularEnergy, after.regular - before.regular),
        (RechargeableResource::ReserveEnergy, after.reserve - before.reserve),
    ])
}

/// Pools after the player manually empties reserves ahead of a hit needing `needed` regular
/// energy to survive, assuming the worst case of the imprecise timing.
fn manual_reserve_trigger(
    needed: Capacity,
    pools: &EnergyPools,
    leniency: &DamageLeniency,
) -> Option<EnergyPools> {
    let reachable = Capacity::min(pools.max_regular, pools.regular + pools.reserve);
    if reachable < needed {
        // Not worth doing by hand; auto-reserve will have a go at it.
        return None;
    }
    if !leniency.can_use_partial_reserves {
        // The whole reserve is dumped and anything above the maximum is lost.
        return Some(EnergyPools {
            regular: reachable,
            reserve: 0,
            ..*pools
        });
    }
    // Aiming for `needed + leeway` may land anywhere up to that level. When that would overflow,
    // the player aims for `max - leeway` instead and may overshoot to the maximum. Either way,
    // the worst case is the higher of the two levels, capped by what the reserves can give:
    let level = Capacity::min(needed + leniency.reserve_refill_leeway, reachable);
    if level <= pools.regular {
        return None;
    }
    Some(EnergyPools {
        regular: level,
        reserve: pools.reserve - (level - pools.regular),
        ..*pools
    })
}

/// Resolves a sequence of identical hits against the energy pools.
///
/// Returns the net variation of regular and reserve energy, or `None` if Samus dies.
pub fn punctual_damage(
    damage: &PunctualDamage,
    pools: &EnergyPools,
    leniency: &DamageLeniency,
) -> Option<ResourceCount> {
    let dmg = damage.damage_per_hit;
    let mut current = *pools;
    for hit in 0..damage.hits {
        if hit == 0
            && damage.can_act_before_first_hit
            && current.regular - dmg <= 0
            && current.reserve > 0
        {
            if let Some(refilled) = manual_reserve_trigger(dmg + 1, &current, leniency) {
                trace!(
                    "manual reserve trigger: {} -> {} regular energy",
                    current.regular, refilled.regular
                );
                current = refilled;
            }
        }

        current.regular -= dmg;

        while current.regular <= 0 {
            if current.reserve == 0 {
                return None;
            }
            let drained = current.reserve;
            current.reserve = 0;
            current.regular = Capacity::min(drained, current.max_regular);
            let iframes_left = HIT_INVINCIBILITY_FRAMES - drained;
            trace!(
                "auto reserve trigger: {} drained, {} i-frames left",
                drained, iframes_left
            );
            if iframes_left < leniency.iframes_to_avoid_double_hit {
                current.regular -= dmg;
            } else {
                break;
            }
        }
    }
    Some(pools_variation(pools, &current))
}

/// Resolves continuous damage (heat, lava, acid, direct energy costs) against the energy pools.
///
/// With partial reserves, the player moves just enough reserve energy over to stay alive at
/// 1 energy. Otherwise reserves auto-trigger once regular energy runs out, emptying entirely.
pub fn over_time_damage(
    amount: Capacity,
    pools: &EnergyPools,
    leniency: &DamageLeniency,
) -> Option<ResourceCount> {
    let mut current = *pools;
    if amount <= 0 {
        return Some(ResourceCount::new());
    }
    if current.regular > amount {
        current.regular -= amount;
    } else if leniency.can_use_partial_reserves {
        let reserves_needed = amount - current.regular + 1;
        if reserves_needed > current.reserve {
            return None;
        }
        current.regular = 1;
        current.reserve -= reserves_needed;
    } else {
        let remaining = amount - current.regular;
        if current.reserve == 0 {
            return None;
        }
        current.regular = Capacity::min(current.reserve, current.max_regular) - remaining;
        current.reserve = 0;
        if current.regular <= 0 {
            return None;
        }
    }
    Some(pools_variation(pools, &current))
}
