use std::str::FromStr;

use anyhow::{Context, Result, bail, ensure};
use hashbrown::HashMap;
use json::JsonValue;
use log::{debug, info};

use crate::{
    AmmoType, Capacity, ConsumableResource, EnemyAttack, EnemyInfo, EnemyVulnerabilities,
    HelperIdx, HelperInfo, IndexedVec, Item, LogicModel, RechargeableResource, Requirement,
    RequirementId, RoomId, StratIdx, StratInfo, TechIdx, TechInfo, WeaponInfo, WeaponMask,
};

const SPIKE_HIT_DAMAGE: Capacity = 60;
const THORN_HIT_DAMAGE: Capacity = 16;
const ELECTRICITY_HIT_DAMAGE: Capacity = 30;

/// Single-pass assembly of a `LogicModel`.
///
/// All names (items, flags, techs, helpers, weapons, enemies, strats) are declared first;
/// requirements are then parsed against those tables, resolving every name as it is
/// encountered. Tech, helper and weapon requirements are parsed on demand the first time they
/// are referenced, so a referenced subtree is always pushed before the node referencing it.
pub struct LogicModelBuilder {
    requirements: Vec<Requirement>,
    free_req: RequirementId,
    never_req: RequirementId,
    declarations_sealed: bool,
    tech_isv: IndexedVec<String>,
    tech_json_map: HashMap<String, JsonValue>,
    tech_requirement: HashMap<TechIdx, Option<RequirementId>>,
    tech_root: HashMap<TechIdx, RequirementId>,
    helper_isv: IndexedVec<String>,
    helper_json_map: HashMap<String, JsonValue>,
    helper_requirement: HashMap<HelperIdx, Option<RequirementId>>,
    helper_root: HashMap<HelperIdx, RequirementId>,
    strat_isv: IndexedVec<(RoomId, String)>,
    strat_json: Vec<JsonValue>,
    strats: HashMap<StratIdx, StratInfo>,
    flag_isv: IndexedVec<String>,
    weapon_isv: IndexedVec<String>,
    weapon_json_map: HashMap<String, JsonValue>,
    weapon_categories: HashMap<String, Vec<String>>, // map from weapon category to specific weapons with that category
    weapon_requirement: HashMap<String, Option<RequirementId>>,
    enemy_isv: IndexedVec<String>,
    enemy_json_map: HashMap<String, JsonValue>,
    enemy_info: HashMap<String, EnemyInfo>,
}

impl Default for LogicModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn json_str<'a>(value: &'a JsonValue, what: &str) -> Result<&'a str> {
    value
        .as_str()
        .with_context(|| format!("missing/invalid {what} in {value}"))
}

fn json_capacity(value: &JsonValue, what: &str) -> Result<Capacity> {
    let x = value
        .as_i32()
        .with_context(|| format!("missing/invalid {what} in {value}"))?;
    ensure!(x >= 0, "{what} must not be negative: {x}");
    ensure!(x <= Capacity::MAX as i32, "{what} out of range: {x}");
    Ok(x as Capacity)
}

fn json_f32(value: &JsonValue, what: &str) -> Result<f32> {
    value
        .as_f32()
        .with_context(|| format!("missing/invalid {what} in {value}"))
}

fn parse_rechargeable_list(value: &JsonValue) -> Result<Vec<RechargeableResource>> {
    ensure!(value.is_array(), "expected array of resource types: {value}");
    let mut out: Vec<RechargeableResource> = vec![];
    for resource_json in value.members() {
        let resource_type = json_str(resource_json, "resource type")?;
        if resource_type == "Energy" {
            out.push(RechargeableResource::RegularEnergy);
            out.push(RechargeableResource::ReserveEnergy);
        } else {
            let resource = RechargeableResource::from_str(resource_type)
                .with_context(|| format!("Unrecognized resource type: {resource_type}"))?;
            out.push(resource);
        }
    }
    Ok(out)
}

impl LogicModelBuilder {
    pub fn new() -> Self {
        let mut builder = LogicModelBuilder {
            requirements: vec![],
            free_req: 0,
            never_req: 0,
            declarations_sealed: false,
            tech_isv: IndexedVec::default(),
            tech_json_map: HashMap::new(),
            tech_requirement: HashMap::new(),
            tech_root: HashMap::new(),
            helper_isv: IndexedVec::default(),
            helper_json_map: HashMap::new(),
            helper_requirement: HashMap::new(),
            helper_root: HashMap::new(),
            strat_isv: IndexedVec::default(),
            strat_json: vec![],
            strats: HashMap::new(),
            flag_isv: IndexedVec::default(),
            weapon_isv: IndexedVec::default(),
            weapon_json_map: HashMap::new(),
            weapon_categories: HashMap::new(),
            weapon_requirement: HashMap::new(),
            enemy_isv: IndexedVec::default(),
            enemy_json_map: HashMap::new(),
            enemy_info: HashMap::new(),
        };
        builder.free_req = builder.push(Requirement::Free);
        builder.never_req = builder.push(Requirement::Never);
        builder
    }

    pub fn free_req(&self) -> RequirementId {
        self.free_req
    }

    pub fn never_req(&self) -> RequirementId {
        self.never_req
    }

    fn push(&mut self, req: Requirement) -> RequirementId {
        let id = self.requirements.len();
        debug_assert!(req.child_ids().iter().all(|&c| c < id));
        self.requirements.push(req);
        id
    }

    /// Adds an already-resolved node as-is, without the simplification done by `make_and`/`make_or`.
    pub fn push_requirement(&mut self, req: Requirement) -> Result<RequirementId> {
        let id = self.requirements.len();
        for &child in req.child_ids() {
            ensure!(
                child < id,
                "Requirement child {child} does not refer to an existing node"
            );
        }
        ensure!(
            !req.has_negative_amount(),
            "Negative amount in requirement {req:?}"
        );
        Ok(self.push(req))
    }

    fn ensure_declarations_open(&self, what: &str) -> Result<()> {
        if self.declarations_sealed {
            bail!("Cannot declare {what} after requirement parsing has started");
        }
        Ok(())
    }

    pub fn add_flag(&mut self, name: &str) -> Result<()> {
        self.ensure_declarations_open("flag")?;
        if self.flag_isv.index_by_key.contains_key(name) {
            bail!("Duplicate flag definition: {}", name);
        }
        self.flag_isv.add(name);
        Ok(())
    }

    pub fn add_tech_json(&mut self, tech_json: &JsonValue) -> Result<TechIdx> {
        self.ensure_declarations_open("tech")?;
        let name = json_str(&tech_json["name"], "tech name")?;
        if self.tech_json_map.contains_key(name) {
            bail!("Duplicate tech definition: {}", name);
        }
        self.tech_json_map.insert(name.to_owned(), tech_json.clone());
        Ok(self.tech_isv.add(name))
    }

    pub fn add_helper_json(&mut self, helper_json: &JsonValue) -> Result<HelperIdx> {
        self.ensure_declarations_open("helper")?;
        let name = json_str(&helper_json["name"], "helper name")?;
        if self.helper_json_map.contains_key(name) {
            bail!("Duplicate helper definition: {}", name);
        }
        ensure!(
            helper_json["requires"].is_array(),
            "Helper {name} is missing its requires list"
        );
        self.helper_json_map.insert(name.to_owned(), helper_json.clone());
        Ok(self.helper_isv.add(name))
    }

    pub fn add_weapon_json(&mut self, weapon_json: &JsonValue) -> Result<()> {
        self.ensure_declarations_open("weapon")?;
        let name = json_str(&weapon_json["name"], "weapon name")?;
        if self.weapon_json_map.contains_key(name) {
            bail!("Duplicate weapon definition: {}", name);
        }
        ensure!(
            self.weapon_isv.len() < WeaponMask::BITS as usize,
            "Too many weapons: {name} would exceed {} weapon slots",
            WeaponMask::BITS - 1
        );
        let mut categories: Vec<String> = vec![];
        if weapon_json.has_key("categories") {
            ensure!(weapon_json["categories"].is_array());
            for category in weapon_json["categories"].members() {
                categories.push(json_str(category, "weapon category")?.to_string());
            }
        }
        categories.push(name.to_string());
        for category in categories {
            self.weapon_categories
                .entry(category)
                .or_default()
                .push(name.to_string());
        }
        self.weapon_json_map.insert(name.to_string(), weapon_json.clone());
        self.weapon_isv.add(name);
        Ok(())
    }

    pub fn add_enemy_json(&mut self, enemy_json: &JsonValue) -> Result<()> {
        self.ensure_declarations_open("enemy")?;
        let name = json_str(&enemy_json["name"], "enemy name")?;
        if self.enemy_json_map.contains_key(name) {
            bail!("Duplicate enemy definition: {}", name);
        }
        self.enemy_json_map.insert(name.to_string(), enemy_json.clone());
        self.enemy_isv.add(name);
        Ok(())
    }

    pub fn add_strat_json(&mut self, room_id: RoomId, strat_json: &JsonValue) -> Result<StratIdx> {
        self.ensure_declarations_open("strat")?;
        let name = json_str(&strat_json["name"], "strat name")?;
        let key = (room_id, name.to_string());
        if self.strat_isv.index_by_key.contains_key(&key) {
            bail!("Duplicate strat definition: {} (room {})", name, room_id);
        }
        ensure!(
            strat_json["requires"].is_array(),
            "Strat {name} is missing its requires list"
        );
        self.strat_json.push(strat_json.clone());
        Ok(self.strat_isv.add(&key))
    }

    /// Declares everything listed in a model document and builds the model.
    ///
    /// The document is an object with optional arrays `flags` (names), `techs`, `helpers`,
    /// `weapons`, `enemies` and `strats` (each strat carrying its `roomId`).
    pub fn from_json(model_json: &JsonValue) -> Result<LogicModel> {
        let mut builder = LogicModelBuilder::new();
        for flag in model_json["flags"].members() {
            builder.add_flag(json_str(flag, "flag name")?)?;
        }
        for tech_json in model_json["techs"].members() {
            builder.add_tech_json(tech_json)?;
        }
        for helper_json in model_json["helpers"].members() {
            builder.add_helper_json(helper_json)?;
        }
        for weapon_json in model_json["weapons"].members() {
            builder.add_weapon_json(weapon_json)?;
        }
        for enemy_json in model_json["enemies"].members() {
            builder.add_enemy_json(enemy_json)?;
        }
        for strat_json in model_json["strats"].members() {
            let room_id = strat_json["roomId"]
                .as_usize()
                .with_context(|| format!("missing/invalid roomId in strat {strat_json}"))?;
            builder.add_strat_json(room_id, strat_json)?;
        }
        builder.build()
    }

    fn seal_declarations(&mut self) {
        if !self.declarations_sealed {
            debug!(
                "Declarations complete: {} tech, {} helpers, {} flags, {} weapons, {} enemies, {} strats",
                self.tech_isv.len(),
                self.helper_isv.len(),
                self.flag_isv.len(),
                self.weapon_isv.len(),
                self.enemy_isv.len(),
                self.strat_isv.len()
            );
            self.declarations_sealed = true;
        }
    }

    pub fn make_and(&mut self, reqs: Vec<RequirementId>) -> RequirementId {
        let mut out_reqs: Vec<RequirementId> = vec![];
        for req in reqs {
            match &self.requirements[req] {
                Requirement::Never => return self.never_req,
                Requirement::Free => continue,
                Requirement::And(and_reqs) => out_reqs.extend(and_reqs.iter().copied()),
                _ => out_reqs.push(req),
            }
        }
        if out_reqs.is_empty() {
            self.free_req
        } else if out_reqs.len() == 1 {
            out_reqs[0]
        } else {
            self.push(Requirement::And(out_reqs))
        }
    }

    pub fn make_or(&mut self, reqs: Vec<RequirementId>) -> RequirementId {
        let mut out_reqs: Vec<RequirementId> = vec![];
        for req in reqs {
            match &self.requirements[req] {
                Requirement::Never => continue,
                Requirement::Free => return self.free_req,
                Requirement::Or(or_reqs) => out_reqs.extend(or_reqs.iter().copied()),
                _ => out_reqs.push(req),
            }
        }
        if out_reqs.is_empty() {
            self.never_req
        } else if out_reqs.len() == 1 {
            out_reqs[0]
        } else {
            self.push(Requirement::Or(out_reqs))
        }
    }

    fn make_not(&mut self, req: RequirementId) -> RequirementId {
        match self.requirements[req] {
            Requirement::Free => self.never_req,
            Requirement::Never => self.free_req,
            _ => self.push(Requirement::Not(req)),
        }
    }

    fn get_tech_root(&mut self, tech_idx: TechIdx) -> Result<RequirementId> {
        if let Some(&root) = self.tech_root.get(&tech_idx) {
            return Ok(root);
        }
        let requires = self.get_tech_requirement(tech_idx)?;
        let root = self.push(Requirement::Tech(tech_idx));
        debug_assert!(requires < root);
        self.tech_root.insert(tech_idx, root);
        Ok(root)
    }

    fn get_tech_requirement(&mut self, tech_idx: TechIdx) -> Result<RequirementId> {
        let tech_name = self.tech_isv.keys[tech_idx].clone();
        if let Some(req_opt) = self.tech_requirement.get(&tech_idx) {
            if let Some(req) = req_opt {
                return Ok(*req);
            } else {
                bail!("Circular dependence in tech: {}", tech_name);
            }
        }

        // Temporarily insert a None value to act as a sentinel for detecting circular dependencies:
        self.tech_requirement.insert(tech_idx, None);

        let tech_json = self
            .tech_json_map
            .get(&tech_name)
            .context(format!("Tech not found: {tech_name}"))?
            .clone();
        let mut reqs: Vec<RequirementId> = vec![];
        if tech_json.has_key("techRequires") {
            ensure!(tech_json["techRequires"].is_array());
            for req in tech_json["techRequires"].members() {
                let name = json_str(req, "tech name in techRequires")?;
                let dep_idx = *self
                    .tech_isv
                    .index_by_key
                    .get(name)
                    .with_context(|| {
                        format!("Unknown tech '{name}' in techRequires of {tech_name}")
                    })?;
                reqs.push(
                    self.get_tech_root(dep_idx)
                        .context(format!("Parsing tech requirement '{req}'"))?,
                );
            }
        }
        if tech_json.has_key("otherRequires") {
            ensure!(tech_json["otherRequires"].is_array());
            reqs.extend(self.parse_requires_list(tech_json["otherRequires"].members().as_slice())?);
        }
        let combined_req = self.make_and(reqs);
        self.tech_requirement.insert(tech_idx, Some(combined_req));
        Ok(combined_req)
    }

    fn get_helper_root(&mut self, helper_idx: HelperIdx) -> Result<RequirementId> {
        if let Some(&root) = self.helper_root.get(&helper_idx) {
            return Ok(root);
        }
        let requires = self.get_helper(helper_idx)?;
        let root = self.push(Requirement::Helper(helper_idx));
        debug_assert!(requires < root);
        self.helper_root.insert(helper_idx, root);
        Ok(root)
    }

    fn get_helper(&mut self, helper_idx: HelperIdx) -> Result<RequirementId> {
        let name = self.helper_isv.keys[helper_idx].clone();
        if let Some(req_opt) = self.helper_requirement.get(&helper_idx) {
            if let Some(req) = req_opt {
                return Ok(*req);
            }
            bail!("Circular dependence in helper {}", name);
        }
        self.helper_requirement.insert(helper_idx, None);
        let json_value = self.helper_json_map[&name].clone();
        let reqs = self
            .parse_requires_list(json_value["requires"].members().as_slice())
            .with_context(|| format!("Parsing helper {name}"))?;
        let req = self.make_and(reqs);
        self.helper_requirement.insert(helper_idx, Some(req));
        Ok(req)
    }

    fn get_weapon_requirement(&mut self, name: &str) -> Result<RequirementId> {
        if let Some(req_opt) = self.weapon_requirement.get(name) {
            if let Some(req) = req_opt {
                return Ok(*req);
            }
            bail!("Circular dependence in weapon {}", name);
        }
        self.weapon_requirement.insert(name.to_string(), None);
        let weapon_json = self.weapon_json_map[name].clone();
        let reqs = if weapon_json.has_key("useRequires") {
            ensure!(weapon_json["useRequires"].is_array());
            self.parse_requires_list(weapon_json["useRequires"].members().as_slice())
                .with_context(|| format!("Parsing useRequires of weapon {name}"))?
        } else {
            vec![]
        };
        let req = self.make_and(reqs);
        self.weapon_requirement.insert(name.to_string(), Some(req));
        Ok(req)
    }

    fn get_weapon_ammo(&self, name: &str) -> Result<Option<AmmoType>> {
        let weapon_json = &self.weapon_json_map[name];
        if weapon_json.has_key("ammo") {
            let ammo_type = json_str(&weapon_json["ammo"], "weapon ammo type")?;
            let ammo = AmmoType::from_str(ammo_type)
                .with_context(|| format!("Unexpected ammo type for weapon {name}: {ammo_type}"))?;
            Ok(Some(ammo))
        } else {
            Ok(None)
        }
    }

    fn non_ammo_weapon_mask(&self) -> Result<WeaponMask> {
        let mut mask = 0;
        for (i, weapon) in self.weapon_isv.keys.iter().enumerate() {
            if self.get_weapon_ammo(weapon)?.is_none() {
                mask |= 1 << i;
            }
        }
        Ok(mask)
    }

    fn get_weapon_mask(&self, names: &JsonValue) -> Result<WeaponMask> {
        ensure!(names.is_array(), "expected array of weapons: {names}");
        let mut weapon_mask = 0;
        for name_json in names.members() {
            let name = json_str(name_json, "weapon name")?;
            let weapons = self
                .weapon_categories
                .get(name)
                .with_context(|| format!("Unknown weapon or weapon category: {name}"))?;
            for weapon in weapons {
                weapon_mask |= 1 << self.weapon_isv.index_by_key[weapon];
            }
        }
        Ok(weapon_mask)
    }

    fn get_enemy(&mut self, name: &str) -> Result<EnemyInfo> {
        if let Some(info) = self.enemy_info.get(name) {
            return Ok(info.clone());
        }
        let enemy_json = self
            .enemy_json_map
            .get(name)
            .with_context(|| format!("Unknown enemy: {name}"))?
            .clone();
        let mut attacks: Vec<EnemyAttack> = vec![];
        if enemy_json.has_key("attacks") {
            ensure!(enemy_json["attacks"].is_array());
            for attack in enemy_json["attacks"].members() {
                attacks.push(EnemyAttack {
                    name: json_str(&attack["name"], "attack name")?.to_string(),
                    base_damage: json_capacity(&attack["baseDamage"], "attack baseDamage")?,
                });
            }
        }
        let non_ammo_vulnerabilities = if enemy_json.has_key("vulnerableWeapons") {
            self.get_weapon_mask(&enemy_json["vulnerableWeapons"])? & self.non_ammo_weapon_mask()?
        } else {
            0
        };
        let optional_damage = |key: &str| -> Result<Capacity> {
            if enemy_json.has_key(key) {
                json_capacity(&enemy_json[key], key)
            } else {
                Ok(0)
            }
        };
        let vul = EnemyVulnerabilities {
            hp: json_capacity(&enemy_json["hp"], "enemy hp")?,
            non_ammo_vulnerabilities,
            missile_damage: optional_damage("missileDamage")?,
            super_damage: optional_damage("superDamage")?,
            power_bomb_damage: optional_damage("powerBombDamage")?,
        };
        let info = EnemyInfo {
            name: name.to_string(),
            attacks,
            vul,
        };
        self.enemy_info.insert(name.to_string(), info.clone());
        Ok(info)
    }

    fn ammo_weapon_allowed(&self, ammo: AmmoType, allowed_weapons: WeaponMask) -> Result<bool> {
        for (i, weapon) in self.weapon_isv.keys.iter().enumerate() {
            if allowed_weapons & (1 << i) != 0 && self.get_weapon_ammo(weapon)? == Some(ammo) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn parse_enemy_kill(&mut self, value: &JsonValue) -> Result<RequirementId> {
        let mut enemy_list: Vec<(String, Capacity)> = Vec::new();
        ensure!(value["enemies"].is_array());
        for enemy_group in value["enemies"].members() {
            ensure!(enemy_group.is_array());
            let mut last_enemy_name: Option<String> = None;
            let mut cnt = 0;
            for enemy in enemy_group.members() {
                let enemy_name = json_str(enemy, "enemy name")?.to_string();
                if Some(&enemy_name) == last_enemy_name.as_ref() {
                    cnt += 1;
                } else {
                    if let Some(last) = last_enemy_name.take() {
                        enemy_list.push((last, cnt));
                    }
                    last_enemy_name = Some(enemy_name);
                    cnt = 1;
                }
            }
            if let Some(last) = last_enemy_name {
                enemy_list.push((last, cnt));
            }
        }

        let all_weapons: WeaponMask = (1 << self.weapon_isv.keys.len()) - 1;
        let mut allowed_weapons: WeaponMask = if value.has_key("explicitWeapons") {
            self.get_weapon_mask(&value["explicitWeapons"])?
        } else {
            all_weapons
        };
        if value.has_key("excludedWeapons") {
            allowed_weapons &= !self.get_weapon_mask(&value["excludedWeapons"])?;
        }
        let mut reqs: Vec<RequirementId> = Vec::new();
        for (enemy_name, count) in &enemy_list {
            let enemy = self.get_enemy(enemy_name)?;
            let mut vul = enemy.vul.clone();
            vul.non_ammo_vulnerabilities &= allowed_weapons;
            if !self.ammo_weapon_allowed(AmmoType::Missile, allowed_weapons)? {
                vul.missile_damage = 0;
            }
            if !self.ammo_weapon_allowed(AmmoType::Super, allowed_weapons)? {
                vul.super_damage = 0;
            }
            if !self.ammo_weapon_allowed(AmmoType::PowerBomb, allowed_weapons)? {
                vul.power_bomb_damage = 0;
            }
            // Weapon requirements are consulted when classifying the kill, so they must come first:
            let weapon_names = self.weapon_isv.keys.clone();
            for (i, weapon_name) in weapon_names.iter().enumerate() {
                if vul.non_ammo_vulnerabilities & (1 << i) != 0 {
                    self.get_weapon_requirement(weapon_name)?;
                }
            }
            let enemy_idx = self.enemy_isv.index_by_key[enemy_name];
            reqs.push(self.push(Requirement::EnemyKill {
                enemy: enemy_idx,
                count: *count,
                vul,
            }));
        }
        Ok(self.make_and(reqs))
    }

    fn parse_enemy_damage(&mut self, value: &JsonValue) -> Result<RequirementId> {
        let enemy_name = json_str(&value["enemy"], "enemy name")?.to_string();
        let attack_name = json_str(&value["type"], "attack type")?.to_string();
        let hits = json_capacity(&value["hits"], "hits")?;
        let enemy = self.get_enemy(&enemy_name)?;
        let base_damage = enemy
            .attacks
            .iter()
            .find(|a| a.name == attack_name)
            .map(|a| a.base_damage)
            .with_context(|| {
                format!("Missing enemy attack damage for {enemy_name} - {attack_name}")
            })?;
        let can_act_before_first_hit = value["canActBeforeFirstHit"].as_bool().unwrap_or(true);
        Ok(self.push(Requirement::EnemyDamage {
            enemy: Some(self.enemy_isv.index_by_key[&enemy_name]),
            damage: base_damage,
            hits,
            can_act_before_first_hit,
        }))
    }

    fn parse_resource_list(
        &mut self,
        req_json: &JsonValue,
        value: &JsonValue,
        make_req: fn(ConsumableResource, Capacity) -> Requirement,
    ) -> Result<RequirementId> {
        ensure!(value.is_array(), "Expected array in {req_json}");
        let mut reqs: Vec<RequirementId> = vec![];
        for value0 in value.members() {
            let resource_type = json_str(&value0["type"], "resource type")?;
            let count = json_capacity(&value0["count"], "resource count")?;
            let resource = ConsumableResource::from_str(resource_type)
                .with_context(|| format!("Unexpected resource type in {req_json}"))?;
            reqs.push(self.push(make_req(resource, count)));
        }
        Ok(self.make_and(reqs))
    }

    pub fn parse_requires_list(&mut self, req_jsons: &[JsonValue]) -> Result<Vec<RequirementId>> {
        let mut reqs: Vec<RequirementId> = Vec::new();
        for req_json in req_jsons {
            reqs.push(
                self.parse_requirement(req_json)
                    .with_context(|| format!("Processing requirement {req_json}"))?,
            );
        }
        Ok(reqs)
    }

    pub fn parse_requirement(&mut self, req_json: &JsonValue) -> Result<RequirementId> {
        self.seal_declarations();
        if let Some(value) = req_json.as_str() {
            if value == "never" {
                return Ok(self.never_req);
            } else if value == "free" {
                return Ok(self.free_req);
            } else if let Ok(item) = Item::from_str(value) {
                return Ok(self.push(Requirement::Item(item)));
            } else if let Some(&flag_idx) = self.flag_isv.index_by_key.get(value) {
                return Ok(self.push(Requirement::Flag(flag_idx)));
            } else if let Some(&tech_idx) = self.tech_isv.index_by_key.get(value) {
                return self.get_tech_root(tech_idx);
            } else if let Some(&helper_idx) = self.helper_isv.index_by_key.get(value) {
                return self.get_helper_root(helper_idx);
            }
            bail!("Unresolved reference in requirement: {}", value);
        } else if req_json.is_array() {
            let reqs = self.parse_requires_list(req_json.members().as_slice())?;
            return Ok(self.make_and(reqs));
        } else if req_json.is_object() && req_json.len() == 1 {
            let Some((key, value)) = req_json.entries().next() else {
                bail!("Unable to parse requirement: {}", req_json);
            };
            if key == "or" {
                ensure!(value.is_array());
                let reqs = self.parse_requires_list(value.members().as_slice())?;
                return Ok(self.make_or(reqs));
            } else if key == "and" {
                ensure!(value.is_array());
                let reqs = self.parse_requires_list(value.members().as_slice())?;
                return Ok(self.make_and(reqs));
            } else if key == "not" {
                let req = self.parse_requirement(value)?;
                return Ok(self.make_not(req));
            } else if key == "ammo" || key == "ammoDrain" {
                let ammo_type = json_str(&value["type"], "ammo type")?;
                let count = json_capacity(&value["count"], "ammo count")?;
                let ammo = AmmoType::from_str(ammo_type)
                    .with_context(|| format!("Unexpected ammo type in {req_json}"))?;
                let req = if key == "ammo" {
                    Requirement::Ammo { ammo, count }
                } else {
                    Requirement::AmmoDrain { ammo, count }
                };
                return Ok(self.push(req));
            } else if key == "resourceCapacity" {
                ensure!(value.is_array());
                let mut reqs: Vec<RequirementId> = vec![];
                for value0 in value.members() {
                    let resource_type = json_str(&value0["type"], "resource type")?;
                    let count = json_capacity(&value0["count"], "resource count")?;
                    let resource = RechargeableResource::from_str(resource_type)
                        .with_context(|| format!("Unexpected resource type in {req_json}"))?;
                    reqs.push(self.push(Requirement::ResourceCapacity { resource, count }));
                }
                return Ok(self.make_and(reqs));
            } else if key == "resourceAvailable" {
                return self.parse_resource_list(req_json, value, |resource, count| {
                    Requirement::ResourceAvailable { resource, count }
                });
            } else if key == "resourceConsumed" {
                return self.parse_resource_list(req_json, value, |resource, count| {
                    Requirement::ResourceConsumed { resource, count }
                });
            } else if key == "refill" {
                let resources = parse_rechargeable_list(value)?;
                return Ok(self.push(Requirement::Refill(resources)));
            } else if key == "farm" {
                let resources = parse_rechargeable_list(value)?;
                return Ok(self.push(Requirement::Farm(resources)));
            } else if key == "heatFrames" {
                let frames = json_capacity(value, "heatFrames")?;
                return Ok(self.push(Requirement::HeatFrames(frames)));
            } else if key == "lavaFrames" {
                let frames = json_capacity(value, "lavaFrames")?;
                return Ok(self.push(Requirement::LavaFrames(frames)));
            } else if key == "acidFrames" {
                let frames = json_capacity(value, "acidFrames")?;
                return Ok(self.push(Requirement::AcidFrames(frames)));
            } else if key == "enemyKill" {
                return self.parse_enemy_kill(value);
            } else if key == "enemyDamage" {
                return self.parse_enemy_damage(value);
            } else if key == "spikeHits" || key == "thornHits" || key == "electricityHits" {
                let hits = json_capacity(value, key)?;
                let damage = match key {
                    "spikeHits" => SPIKE_HIT_DAMAGE,
                    "thornHits" => THORN_HIT_DAMAGE,
                    _ => ELECTRICITY_HIT_DAMAGE,
                };
                // Environmental hits come without warning, so reserves cannot be managed in advance.
                return Ok(self.push(Requirement::EnemyDamage {
                    enemy: None,
                    damage,
                    hits,
                    can_act_before_first_hit: false,
                }));
            } else if key == "canShineCharge" {
                let used_tiles = json_f32(&value["usedTiles"], "usedTiles")?;
                let open_end = if value.has_key("openEnd") {
                    json_f32(&value["openEnd"], "openEnd")?
                } else {
                    0.0
                };
                return Ok(self.push(Requirement::CanShineCharge {
                    used_tiles,
                    open_end,
                }));
            } else if key == "previousNode" {
                let node_id = value
                    .as_usize()
                    .with_context(|| format!("invalid previousNode in {req_json}"))?;
                return Ok(self.push(Requirement::PreviousNode(node_id)));
            } else if key == "obstaclesCleared" || key == "obstaclesNotCleared" {
                ensure!(value.is_array());
                let mut obstacles: Vec<String> = vec![];
                for obstacle in value.members() {
                    obstacles.push(json_str(obstacle, "obstacle name")?.to_string());
                }
                let req = if key == "obstaclesCleared" {
                    Requirement::ObstaclesCleared(obstacles)
                } else {
                    Requirement::ObstaclesNotCleared(obstacles)
                };
                return Ok(self.push(req));
            }
        }
        bail!("Unable to parse requirement: {}", req_json);
    }

    fn build_strat(&mut self, strat_idx: StratIdx) -> Result<()> {
        let (room_id, name) = self.strat_isv.keys[strat_idx].clone();
        let strat_json = self.strat_json[strat_idx].clone();
        let reqs = self
            .parse_requires_list(strat_json["requires"].members().as_slice())
            .with_context(|| format!("Parsing strat {name} (room {room_id})"))?;
        let requires = self.make_and(reqs);
        let root = self.push(Requirement::Strat(strat_idx));
        self.strats.insert(
            strat_idx,
            StratInfo {
                room_id,
                name,
                notable: strat_json["notable"].as_bool().unwrap_or(false),
                requires,
                root,
            },
        );
        Ok(())
    }

    /// Resolves every declared entity and freezes the arena.
    ///
    /// Any unresolved name anywhere in the declared data aborts assembly here, before any
    /// requirement could be executed.
    pub fn build(mut self) -> Result<LogicModel> {
        self.seal_declarations();
        for tech_idx in 0..self.tech_isv.len() {
            self.get_tech_root(tech_idx)?;
        }
        for helper_idx in 0..self.helper_isv.len() {
            self.get_helper_root(helper_idx)?;
        }
        let weapon_names = self.weapon_isv.keys.clone();
        let mut weapons: Vec<WeaponInfo> = vec![];
        for name in &weapon_names {
            let use_requires = self.get_weapon_requirement(name)?;
            weapons.push(WeaponInfo {
                name: name.clone(),
                use_requires,
            });
        }
        let enemy_names = self.enemy_isv.keys.clone();
        let mut enemies: Vec<EnemyInfo> = vec![];
        for name in &enemy_names {
            enemies.push(self.get_enemy(name)?);
        }
        for strat_idx in 0..self.strat_isv.len() {
            self.build_strat(strat_idx)?;
        }

        let tech = (0..self.tech_isv.len())
            .map(|i| TechInfo {
                name: self.tech_isv.keys[i].clone(),
                requires: self.tech_requirement[&i].unwrap_or(self.never_req),
                root: self.tech_root[&i],
            })
            .collect();
        let helpers = (0..self.helper_isv.len())
            .map(|i| HelperInfo {
                name: self.helper_isv.keys[i].clone(),
                requires: self.helper_requirement[&i].unwrap_or(self.never_req),
                root: self.helper_root[&i],
            })
            .collect();
        let mut strats: Vec<StratInfo> = vec![];
        for i in 0..self.strat_isv.len() {
            strats.push(
                self.strats
                    .remove(&i)
                    .with_context(|| format!("Strat {i} was not built"))?,
            );
        }

        info!(
            "Built logic model: {} requirement nodes, {} tech, {} helpers, {} strats",
            self.requirements.len(),
            self.tech_isv.len(),
            self.helper_isv.len(),
            self.strat_isv.len()
        );
        Ok(LogicModel {
            requirements: self.requirements,
            free_req: self.free_req,
            never_req: self.never_req,
            tech_isv: self.tech_isv,
            tech,
            helper_isv: self.helper_isv,
            helpers,
            strat_isv: self.strat_isv,
            strats,
            flag_isv: self.flag_isv,
            enemy_isv: self.enemy_isv,
            enemies,
            weapon_isv: self.weapon_isv,
            weapons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> Result<LogicModelBuilder> {
        let mut builder = LogicModelBuilder::new();
        builder.add_flag("f_DefeatedKraid")?;
        builder.add_tech_json(&json::object! {
            "name": "canWalljump",
        })?;
        builder.add_tech_json(&json::object! {
            "name": "canHeatRun",
            "techRequires": [],
            "otherRequires": [],
        })?;
        builder.add_tech_json(&json::object! {
            "name": "canDelayedWalljump",
            "techRequires": ["canWalljump"],
            "otherRequires": [],
        })?;
        builder.add_helper_json(&json::object! {
            "name": "h_canUsePowerBombs",
            "requires": ["Morph", {"ammo": {"type": "PowerBomb", "count": 1}}],
        })?;
        builder.add_weapon_json(&json::object! {
            "name": "Wave",
            "categories": ["Beam"],
            "useRequires": ["Wave"],
        })?;
        builder.add_weapon_json(&json::object! {
            "name": "Missile",
            "ammo": "Missile",
            "useRequires": [],
        })?;
        builder.add_enemy_json(&json::object! {
            "name": "Geemer",
            "hp": 100,
            "attacks": [{"name": "contact", "baseDamage": 20}],
            "vulnerableWeapons": ["Beam", "Missile"],
            "missileDamage": 100,
        })?;
        Ok(builder)
    }

    #[test]
    fn test_children_precede_parents() -> Result<()> {
        let mut builder = base_builder()?;
        builder.add_strat_json(
            1,
            &json::object! {
                "name": "Base",
                "requires": [
                    "canDelayedWalljump",
                    {"or": ["h_canUsePowerBombs", {"enemyKill": {"enemies": [["Geemer", "Geemer"]]}}]},
                    {"not": "f_DefeatedKraid"},
                ],
            },
        )?;
        let model = builder.build()?;
        for id in 0..model.num_requirements() {
            for child in model.children(id) {
                assert!(child < id, "child {child} of {id} is not earlier in the arena");
            }
        }
        assert_eq!(model.strats.len(), 1);
        assert!(matches!(
            model.requirement(model.strat_root(0)),
            Requirement::Strat(0)
        ));
        Ok(())
    }

    #[test]
    fn test_unresolved_reference_fails_fast() -> Result<()> {
        let mut builder = base_builder()?;
        builder.add_helper_json(&json::object! {
            "name": "h_broken",
            "requires": ["canFlyWithoutWings"],
        })?;
        let err = builder.build().unwrap_err();
        assert!(format!("{err:#}").contains("canFlyWithoutWings"));
        Ok(())
    }

    #[test]
    fn test_circular_helpers_are_rejected() -> Result<()> {
        let mut builder = LogicModelBuilder::new();
        builder.add_helper_json(&json::object! {"name": "h_a", "requires": ["h_b"]})?;
        builder.add_helper_json(&json::object! {"name": "h_b", "requires": ["h_a"]})?;
        let err = builder.build().unwrap_err();
        assert!(format!("{err:#}").contains("Circular dependence"));
        Ok(())
    }

    #[test]
    fn test_duplicate_and_late_declarations() -> Result<()> {
        let mut builder = base_builder()?;
        assert!(builder.add_flag("f_DefeatedKraid").is_err());
        builder.parse_requirement(&JsonValue::from("free"))?;
        assert!(builder.add_flag("f_DefeatedRidley").is_err());
        Ok(())
    }

    #[test]
    fn test_make_and_or_simplification() -> Result<()> {
        let mut builder = base_builder()?;
        let free = builder.free_req();
        let never = builder.never_req();
        let item = builder.parse_requirement(&JsonValue::from("Varia"))?;
        assert_eq!(builder.make_and(vec![free, item]), item);
        assert_eq!(builder.make_and(vec![item, never]), never);
        assert_eq!(builder.make_or(vec![never, item]), item);
        assert_eq!(builder.make_or(vec![item, free]), free);
        assert_eq!(builder.make_and(vec![]), free);
        assert_eq!(builder.make_or(vec![]), never);
        Ok(())
    }

    #[test]
    fn test_enemy_kill_restricted_weapons() -> Result<()> {
        let mut builder = base_builder()?;
        let req = builder.parse_requirement(&json::object! {
            "enemyKill": {
                "enemies": [["Geemer"]],
                "excludedWeapons": ["Missile"],
            }
        })?;
        let model = builder.build()?;
        match model.requirement(req) {
            Requirement::EnemyKill { count, vul, .. } => {
                assert_eq!(*count, 1);
                assert_eq!(vul.missile_damage, 0);
                assert_eq!(vul.non_ammo_vulnerabilities, 1 << model.weapon_idx("Wave").unwrap());
            }
            other => panic!("unexpected requirement {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_negative_amounts_are_rejected() -> Result<()> {
        let mut builder = base_builder()?;
        for req in [
            json::object! {"ammo": {"type": "Missile", "count": -1}},
            json::object! {"ammoDrain": {"type": "Super", "count": -3}},
            json::object! {"resourceConsumed": [{"type": "Energy", "count": -20}]},
            json::object! {"resourceCapacity": [{"type": "Missile", "count": -5}]},
            json::object! {"heatFrames": -60},
            json::object! {"lavaFrames": -1},
            json::object! {"acidFrames": -1},
        ] {
            let err = builder.parse_requirement(&req).unwrap_err();
            assert!(format!("{err:#}").contains("must not be negative"), "{req}");
        }
        let err = builder
            .push_requirement(Requirement::Ammo {
                ammo: AmmoType::Missile,
                count: -1,
            })
            .unwrap_err();
        assert!(format!("{err:#}").contains("Negative amount"));
        assert!(builder.push_requirement(Requirement::HeatFrames(0)).is_ok());
        Ok(())
    }

    #[test]
    fn test_weapon_count_fits_mask() -> Result<()> {
        let mut builder = LogicModelBuilder::new();
        let max_weapons = WeaponMask::BITS as usize - 1;
        for i in 0..max_weapons {
            let mut weapon_json = JsonValue::new_object();
            weapon_json["name"] = format!("Weapon{i}").into();
            builder.add_weapon_json(&weapon_json)?;
        }
        let err = builder
            .add_weapon_json(&json::object! {"name": "OneTooMany"})
            .unwrap_err();
        assert!(format!("{err:#}").contains("Too many weapons"));
        let model = builder.build()?;
        assert_eq!(model.weapons.len(), max_weapons);
        Ok(())
    }
}
