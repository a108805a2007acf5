use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::plan::CompiledPlan;

/// Runtime type pair a plan was compiled for.
pub type TypePairKey = (TypeId, TypeId);

/// Concurrent plan store.
///
/// Entries are published whole and replaced whole; a build race between two
/// threads is benign because both build behaviorally equivalent plans and
/// the last write wins. In-flight calls keep executing the `Arc` they
/// already hold.
#[derive(Default)]
pub struct PlanCache {
    plans: DashMap<TypePairKey, Arc<CompiledPlan>, FxBuildHasher>,
}

impl PlanCache {
    pub fn get(&self, key: &TypePairKey) -> Option<Arc<CompiledPlan>> {
        self.plans.get(key).map(|e| Arc::clone(e.value()))
    }

    pub fn publish(&self, key: TypePairKey, plan: Arc<CompiledPlan>) {
        self.plans.insert(key, plan);
    }

    pub fn clear(&self) {
        self.plans.clear();
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
