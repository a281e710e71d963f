use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use hashbrown::HashSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use smlogic_game::{Capacity, FlagIdx, Item, LogicModel, RechargeableResource, RoomId};
use smlogic_logic::{DamageLeniency, InGameState};

pub type OptionsVersion = u64;

// Shared by every `LogicalOptions`, so that two option sets never carry the same version.
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> OptionsVersion {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Relative value of each resource, used to decide which of several ways of satisfying an
/// `or` leaves the player better off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InGameResourceEvaluator {
    pub regular_energy_weight: f32,
    pub reserve_energy_weight: f32,
    pub missile_weight: f32,
    pub super_weight: f32,
    pub power_bomb_weight: f32,
}

impl Default for InGameResourceEvaluator {
    fn default() -> Self {
        InGameResourceEvaluator {
            regular_energy_weight: 1.0 / 1500.0,
            reserve_energy_weight: 1.0 / 400.0,
            missile_weight: 1.0 / 500.0,
            super_weight: 1.0 / 100.0,
            power_bomb_weight: 1.0 / 100.0,
        }
    }
}

impl InGameResourceEvaluator {
    pub fn weight(&self, resource: RechargeableResource) -> f32 {
        match resource {
            RechargeableResource::RegularEnergy => self.regular_energy_weight,
            RechargeableResource::ReserveEnergy => self.reserve_energy_weight,
            RechargeableResource::Missile => self.missile_weight,
            RechargeableResource::Super => self.super_weight,
            RechargeableResource::PowerBomb => self.power_bomb_weight,
        }
    }

    /// Weighted amount of resources missing from the state. Lower is better.
    pub fn cost(&self, state: &InGameState) -> f32 {
        let maximums = state.resource_maximums();
        state
            .resources
            .iter()
            .map(|(resource, amount)| {
                (maximums.get(resource) - amount) as f32 * self.weight(resource)
            })
            .sum()
    }
}

/// The player capabilities the logic assumes. Indexed the same way as the model tables.
#[derive(Clone, Debug, PartialEq)]
pub struct LogicSettings {
    pub tech: Vec<bool>,
    pub strats: Vec<bool>,
    pub removed_items: HashSet<Item>,
    pub removed_flags: HashSet<FlagIdx>,
    pub tech_tries: Vec<Capacity>,
    pub helper_tries: Vec<Capacity>,
    pub strat_tries: Vec<Capacity>,
    pub heat_leniency_multiplier: f32,
    pub lava_leniency_multiplier: f32,
    pub acid_leniency_multiplier: f32,
    pub reserve_refill_leeway: Capacity,
    pub iframes_to_avoid_double_hit: Capacity,
    pub can_use_partial_reserves: bool,
    pub tiles_to_shine_charge: f32,
    pub tiles_saved_with_stutter: f32,
    // Fraction of the maximum a farm is assumed to bring each resource back up to:
    pub farm_threshold: f32,
    pub resource_evaluator: InGameResourceEvaluator,
}

impl LogicSettings {
    /// Everything enabled, nothing removed, no leniency.
    pub fn new(model: &LogicModel) -> Self {
        LogicSettings {
            tech: vec![true; model.tech.len()],
            strats: vec![true; model.strats.len()],
            removed_items: HashSet::new(),
            removed_flags: HashSet::new(),
            tech_tries: vec![1; model.tech.len()],
            helper_tries: vec![1; model.helpers.len()],
            strat_tries: vec![1; model.strats.len()],
            heat_leniency_multiplier: 1.0,
            lava_leniency_multiplier: 1.0,
            acid_leniency_multiplier: 1.0,
            reserve_refill_leeway: 20,
            iframes_to_avoid_double_hit: 60,
            can_use_partial_reserves: true,
            tiles_to_shine_charge: 32.0,
            tiles_saved_with_stutter: 0.0,
            farm_threshold: 1.0,
            resource_evaluator: InGameResourceEvaluator::default(),
        }
    }

    pub fn damage_leniency(&self) -> DamageLeniency {
        DamageLeniency {
            reserve_refill_leeway: self.reserve_refill_leeway,
            iframes_to_avoid_double_hit: self.iframes_to_avoid_double_hit,
            can_use_partial_reserves: self.can_use_partial_reserves,
        }
    }

    pub fn is_item_removed(&self, item: Item) -> bool {
        self.removed_items.contains(&item)
    }

    pub fn min_shine_charge_tiles(&self) -> f32 {
        self.tiles_to_shine_charge - self.tiles_saved_with_stutter
    }
}

/// Versioned logic settings.
///
/// Settings can only be changed through `update`, which gives the result a fresh version;
/// anything derived from the settings (such as a classification) is tied to the version it
/// was computed for.
#[derive(Clone, Debug)]
pub struct LogicalOptions {
    version: OptionsVersion,
    settings: LogicSettings,
}

impl LogicalOptions {
    pub fn new(settings: LogicSettings) -> Self {
        LogicalOptions {
            version: next_version(),
            settings,
        }
    }

    pub fn permissive(model: &LogicModel) -> Self {
        Self::new(LogicSettings::new(model))
    }

    pub fn version(&self) -> OptionsVersion {
        self.version
    }

    pub fn settings(&self) -> &LogicSettings {
        &self.settings
    }

    pub fn update<F: FnOnce(&mut LogicSettings)>(&mut self, f: F) {
        f(&mut self.settings);
        self.version = next_version();
        debug!("Logical options updated to version {}", self.version);
    }

    /// Parses a serialized `OptionsPreset` and resolves it against the model.
    pub fn from_preset_json(preset_str: &str, model: &LogicModel) -> Result<Self> {
        let preset: OptionsPreset =
            serde_json::from_str(preset_str).context("parsing options preset")?;
        Self::from_preset(&preset, model)
    }

    pub fn from_preset(preset: &OptionsPreset, model: &LogicModel) -> Result<Self> {
        let mut settings = LogicSettings::new(model);
        settings.tech = vec![false; model.tech.len()];
        for tech_setting in &preset.tech_settings {
            let tech_idx = model
                .tech_idx(&tech_setting.name)
                .with_context(|| format!("Unknown tech '{}' in preset", tech_setting.name))?;
            settings.tech[tech_idx] = tech_setting.enabled;
        }
        // Notable strats are opt-in; other strats are always available.
        for (strat_idx, strat) in model.strats.iter().enumerate() {
            settings.strats[strat_idx] = !strat.notable;
        }
        for strat_setting in &preset.strat_settings {
            let strat_idx = model
                .strat_idx(strat_setting.room_id, &strat_setting.name)
                .with_context(|| {
                    format!(
                        "Unknown strat '{}' (room {}) in preset",
                        strat_setting.name, strat_setting.room_id
                    )
                })?;
            settings.strats[strat_idx] = strat_setting.enabled;
        }
        settings.removed_items = preset.removed_items.iter().copied().collect();
        for flag in &preset.removed_flags {
            let flag_idx = model
                .flag_idx(flag)
                .with_context(|| format!("Unknown flag '{flag}' in preset"))?;
            settings.removed_flags.insert(flag_idx);
        }
        for tries in &preset.tech_tries {
            let tech_idx = model
                .tech_idx(&tries.name)
                .with_context(|| format!("Unknown tech '{}' in preset tries", tries.name))?;
            settings.tech_tries[tech_idx] = tries.tries;
        }
        for tries in &preset.helper_tries {
            let helper_idx = model
                .helper_idx(&tries.name)
                .with_context(|| format!("Unknown helper '{}' in preset tries", tries.name))?;
            settings.helper_tries[helper_idx] = tries.tries;
        }
        for tries in &preset.strat_tries {
            let strat_idx = model
                .strat_idx(tries.room_id, &tries.name)
                .with_context(|| format!("Unknown strat '{}' in preset tries", tries.name))?;
            settings.strat_tries[strat_idx] = tries.tries;
        }
        settings.heat_leniency_multiplier = preset.heat_leniency_multiplier;
        settings.lava_leniency_multiplier = preset.lava_leniency_multiplier;
        settings.acid_leniency_multiplier = preset.acid_leniency_multiplier;
        settings.reserve_refill_leeway = preset.reserve_refill_leeway;
        settings.iframes_to_avoid_double_hit = preset.iframes_to_avoid_double_hit;
        settings.can_use_partial_reserves = preset.can_use_partial_reserves;
        settings.tiles_to_shine_charge = preset.tiles_to_shine_charge;
        settings.tiles_saved_with_stutter = preset.tiles_saved_with_stutter;
        settings.farm_threshold = preset.farm_threshold;
        settings.resource_evaluator = preset.resource_evaluator.clone();

        info!(
            "Loaded options preset {}: {} of {} tech enabled",
            preset.preset.as_deref().unwrap_or("(unnamed)"),
            settings.tech.iter().filter(|&&x| x).count(),
            settings.tech.len()
        );
        Ok(Self::new(settings))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TechSetting {
    pub name: String,
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StratSetting {
    pub room_id: RoomId,
    pub name: String,
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TriesSetting {
    pub name: String,
    pub tries: Capacity,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StratTriesSetting {
    pub room_id: RoomId,
    pub name: String,
    pub tries: Capacity,
}

fn default_multiplier() -> f32 {
    1.0
}

fn default_reserve_refill_leeway() -> Capacity {
    20
}

fn default_iframes_to_avoid_double_hit() -> Capacity {
    60
}

fn default_true() -> bool {
    true
}

fn default_tiles_to_shine_charge() -> f32 {
    32.0
}

/// Serialized form of the logic settings, with entities referred to by name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OptionsPreset {
    pub preset: Option<String>,
    #[serde(default)]
    pub tech_settings: Vec<TechSetting>,
    #[serde(default)]
    pub strat_settings: Vec<StratSetting>,
    #[serde(default)]
    pub removed_items: Vec<Item>,
    #[serde(default)]
    pub removed_flags: Vec<String>,
    #[serde(default)]
    pub tech_tries: Vec<TriesSetting>,
    #[serde(default)]
    pub helper_tries: Vec<TriesSetting>,
    #[serde(default)]
    pub strat_tries: Vec<StratTriesSetting>,
    #[serde(default = "default_multiplier")]
    pub heat_leniency_multiplier: f32,
    #[serde(default = "default_multiplier")]
    pub lava_leniency_multiplier: f32,
    #[serde(default = "default_multiplier")]
    pub acid_leniency_multiplier: f32,
    #[serde(default = "default_reserve_refill_leeway")]
    pub reserve_refill_leeway: Capacity,
    #[serde(default = "default_iframes_to_avoid_double_hit")]
    pub iframes_to_avoid_double_hit: Capacity,
    #[serde(default = "default_true")]
    pub can_use_partial_reserves: bool,
    #[serde(default = "default_tiles_to_shine_charge")]
    pub tiles_to_shine_charge: f32,
    #[serde(default)]
    pub tiles_saved_with_stutter: f32,
    #[serde(default = "default_multiplier")]
    pub farm_threshold: f32,
    #[serde(default)]
    pub resource_evaluator: InGameResourceEvaluator,
}
