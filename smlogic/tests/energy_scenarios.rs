use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use smlogic_game::{Capacity, RechargeableResource, ResourceCount};
use smlogic_logic::{DamageLeniency, EnergyPools, PunctualDamage, energy::punctual_damage};

#[derive(Debug, Deserialize)]
struct ScenariosList {
    scenarios: Vec<Scenario>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    name: String,
    damage_per_hit: Capacity,
    hits: Capacity,
    can_act_before_first_hit: bool,
    regular: Capacity,
    #[serde(default = "default_max_regular")]
    max_regular: Capacity,
    reserve: Capacity,
    #[serde(default = "default_max_reserve")]
    max_reserve: Capacity,
    reserve_refill_leeway: Option<Capacity>,
    iframes_to_avoid_double_hit: Option<Capacity>,
    can_use_partial_reserves: Option<bool>,
    // `None` when the hits are lethal:
    expected: Option<ExpectedDelta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpectedDelta {
    regular_energy: Capacity,
    reserve_energy: Capacity,
}

fn default_max_regular() -> Capacity {
    99
}

fn default_max_reserve() -> Capacity {
    100
}

fn test_scenario(scenario: &Scenario) -> Result<()> {
    let defaults = DamageLeniency::default();
    let leniency = DamageLeniency {
        reserve_refill_leeway: scenario
            .reserve_refill_leeway
            .unwrap_or(defaults.reserve_refill_leeway),
        iframes_to_avoid_double_hit: scenario
            .iframes_to_avoid_double_hit
            .unwrap_or(defaults.iframes_to_avoid_double_hit),
        can_use_partial_reserves: scenario
            .can_use_partial_reserves
            .unwrap_or(defaults.can_use_partial_reserves),
    };
    let pools = EnergyPools {
        regular: scenario.regular,
        max_regular: scenario.max_regular,
        reserve: scenario.reserve,
        max_reserve: scenario.max_reserve,
    };
    let damage = PunctualDamage {
        damage_per_hit: scenario.damage_per_hit,
        hits: scenario.hits,
        can_act_before_first_hit: scenario.can_act_before_first_hit,
    };
    let result = punctual_damage(&damage, &pools, &leniency);
    match (&scenario.expected, result) {
        (None, None) => Ok(()),
        (None, Some(delta)) => bail!("Death expected, but survived with delta {:?}", delta),
        (Some(_), None) => bail!("Survival expected, but the hits are lethal"),
        (Some(expected), Some(delta)) => {
            let expected_delta = ResourceCount::from_pairs(&[
                (RechargeableResource::RegularEnergy, expected.regular_energy),
                (RechargeableResource::ReserveEnergy, expected.reserve_energy),
            ]);
            if delta != expected_delta {
                bail!("Expected delta {:?}, got {:?}", expected_delta, delta);
            }
            Ok(())
        }
    }
}

#[test]
fn test_energy_scenarios() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/energy_scenarios.json");
    let scenarios_str =
        std::fs::read_to_string(&path).context(format!("loading {}", path.display()))?;
    let scenarios_list: ScenariosList =
        serde_json::from_str(&scenarios_str).context(format!("parsing {}", path.display()))?;
    for scenario in &scenarios_list.scenarios {
        println!("Scenario: {}", scenario.name);
        test_scenario(scenario).with_context(|| format!("scenario '{}'", scenario.name))?;
    }
    Ok(())
}
