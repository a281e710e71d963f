// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod classify;
pub mod execute;
pub mod options;

use log::{debug, info};
use smlogic_game::{Capacity, LogicModel, RequirementId};
use smlogic_logic::{ExecutionResult, InGameState};

use crate::{
    classify::{Classification, ClassificationCache, Relevance},
    execute::{ExecutionContext, execute},
    options::{LogicSettings, LogicalOptions},
};

/// A model together with the options it is evaluated under.
///
/// The classification is recomputed lazily, the first time it is needed after the options change.
pub struct Logic {
    model: LogicModel,
    options: LogicalOptions,
    cache: ClassificationCache,
}

impl Logic {
    pub fn new(model: LogicModel, options: LogicalOptions) -> Self {
        info!(
            "Logic ready with {} requirement nodes (options version {})",
            model.num_requirements(),
            options.version()
        );
        Logic {
            model,
            options,
            cache: ClassificationCache::new(),
        }
    }

    pub fn model(&self) -> &LogicModel {
        &self.model
    }

    pub fn options(&self) -> &LogicalOptions {
        &self.options
    }

    pub fn update_options<F: FnOnce(&mut LogicSettings)>(&mut self, f: F) {
        self.options.update(f);
    }

    pub fn classification(&mut self) -> &Classification {
        self.cache.get(&self.model, &self.options)
    }

    pub fn relevance(&mut self, req: RequirementId) -> Relevance {
        self.classification().get(req)
    }

    /// Executes `req` against `state`, which is left untouched. `None` means the requirement
    /// cannot be satisfied from this state.
    pub fn execute(
        &mut self,
        req: RequirementId,
        state: &InGameState,
        times: Capacity,
        use_previous_room: bool,
    ) -> Option<ExecutionResult> {
        let classification = self.cache.get(&self.model, &self.options);
        let cx = ExecutionContext {
            model: &self.model,
            options: &self.options,
            classification,
            use_previous_room,
        };
        let result = execute(&cx, req, state, times);
        if result.is_none() {
            debug!(
                "Requirement {req} not satisfiable with items {:?} and resources {:?}",
                state.inventory.owned_items().collect::<Vec<_>>(),
                state.resources
            );
        }
        result
    }
}
