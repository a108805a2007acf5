//! The engine: plan cache ownership, the step executor, and the public
//! mapping/configuration surface.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use morph_api::convert::{convert_builtin, convert_enum};
use morph_api::descriptor::{PropertyDescriptor, TypeSchema};
use morph_api::error::MapError;
use morph_api::object::{ObjMut, ObjRef, Reach, Reflect, ReflectSchema, ReflectSeq, Slot};
use morph_api::bag::PropertyBag;
use morph_api::tabular::{snapshot_row, RowCursor};
use morph_api::value::{OpaqueValue, Value};

use crate::cache::PlanCache;
use crate::collection::CollectionMapMode;
use crate::context::{Enter, MappingContext};
use crate::plan::{
    self, Access, BuiltinTarget, CompiledPlan, ConverterKey, NestedKind, PropertyStep, StepAction,
};
use crate::post::{PostAction, PostActionBinding};
use crate::rules::{self, KeyedSourceRule, MatchRule, NameMatchRule, TypeFilter};

type Converter = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Failure inside plan execution, wrapped into [`MapError`] once at the
/// top level with the type names of the outermost pair.
enum ExecError {
    Recursion { max: usize },
    Fault(String),
}

impl ExecError {
    fn finish(self, source_type: &'static str, target_type: &'static str) -> MapError {
        match self {
            ExecError::Recursion { max } => MapError::RecursionLimit { max },
            ExecError::Fault(msg) => MapError::PlanFault {
                source_type,
                target_type,
                cause: msg.into(),
            },
        }
    }
}

/// Object-graph transformation engine.
///
/// Owns the rule chain, the custom-converter table, the post-action list
/// and the plan cache. Configuration methods take `&mut self`, mapping
/// takes `&self`: the borrow checker is what enforces configure-then-freeze.
pub struct Engine {
    rules: Vec<Box<dyn MatchRule>>,
    converters: DashMap<ConverterKey, Converter, FxBuildHasher>,
    post_actions: Vec<PostActionBinding>,
    plans: PlanCache,
    max_depth: usize,
    collection_mode: CollectionMapMode,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(NameMatchRule::new()),
                Box::new(KeyedSourceRule::new()),
            ],
            converters: DashMap::default(),
            post_actions: Vec::new(),
            plans: PlanCache::default(),
            max_depth: 100,
            collection_mode: CollectionMapMode::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Append a matching rule. Earlier rules claim target properties first,
    /// so the defaults registered at construction keep priority.
    pub fn add_rule(&mut self, rule: impl MatchRule + 'static) {
        self.rules.push(Box::new(rule));
        self.plans.clear();
    }

    /// Register (or replace) the custom converter for an opaque target
    /// type `T`.
    pub fn add_converter<T, F>(&mut self, convert: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Value) -> Option<T> + Send + Sync + 'static,
    {
        let wrapped: Converter =
            Arc::new(move |v| convert(v).map(|t| Value::Opaque(OpaqueValue::new(t))));
        self.converters
            .insert(ConverterKey::Type(TypeId::of::<T>()), wrapped);
    }

    /// Register (or replace) the custom converter for a catalog value kind.
    /// The converter runs after the built-in tier declines and must return
    /// a value of the target kind.
    pub fn add_converter_for<F>(&mut self, kind: morph_api::value::ValueKind, convert: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.converters
            .insert(ConverterKey::Kind(kind), Arc::new(convert));
    }

    /// Invoke the custom converter registered for `T` directly.
    pub fn convert<T: Any + Send + Sync + Clone>(&self, value: &Value) -> Option<T> {
        let entry = self.converters.get(&ConverterKey::Type(TypeId::of::<T>()))?;
        match (entry.value())(value)? {
            Value::Opaque(o) => o.downcast_ref::<T>().cloned(),
            _ => None,
        }
    }

    /// Post action for the exact pair `(S, T)`, run after the pair's plan
    /// completes.
    pub fn add_post_action<S, T, F>(&mut self, action: F)
    where
        S: ReflectSchema,
        T: ReflectSchema,
        F: Fn(&S, &mut T) + Send + Sync + 'static,
    {
        let wrapped: PostAction = Arc::new(move |s: &dyn Reflect, t: &mut dyn Reflect| {
            if let (Some(s), Some(t)) = (s.downcast_ref::<S>(), t.downcast_mut::<T>()) {
                action(s, t);
            }
        });
        self.post_actions.push(PostActionBinding {
            source: Some(TypeFilter::exact::<S>()),
            target: Some(TypeFilter::exact::<T>()),
            action: wrapped,
        });
    }

    /// Post action with explicit type filters; `None` accepts any type.
    pub fn add_post_action_filtered<F>(
        &mut self,
        source: Option<TypeFilter>,
        target: Option<TypeFilter>,
        action: F,
    ) where
        F: Fn(&dyn Reflect, &mut dyn Reflect) + Send + Sync + 'static,
    {
        self.post_actions.push(PostActionBinding {
            source,
            target,
            action: Arc::new(action),
        });
    }

    /// Drop every correspondence of the pair `(S, T)` whose target
    /// descriptor matches `selector`, then rebuild and replace the cached
    /// plan. In-flight calls holding the old plan finish with the old
    /// behavior.
    pub fn remove_property_map<S, T, P>(&mut self, selector: P)
    where
        S: ReflectSchema,
        T: ReflectSchema,
        P: Fn(&PropertyDescriptor) -> bool,
    {
        let source = S::type_schema();
        let target = T::type_schema();
        let pairs: Vec<_> = rules::resolve(source, target, &self.rules)
            .into_iter()
            .filter(|pair| !selector(&pair.target))
            .collect();
        let plan = Arc::new(plan::build(source, target, &pairs, self.collection_mode));
        tracing::debug!(
            source = source.name,
            target = target.name,
            steps = plan.steps.len(),
            "replaced mapping plan"
        );
        self.plans.publish((source.id, target.id), plan);
    }

    /// [`Engine::remove_property_map`] plus a post action installed in the
    /// same step, the usual shape for "drop the default and do it by hand".
    pub fn remove_property_map_then<S, T, P, F>(&mut self, selector: P, post: F)
    where
        S: ReflectSchema,
        T: ReflectSchema,
        P: Fn(&PropertyDescriptor) -> bool,
        F: Fn(&S, &mut T) + Send + Sync + 'static,
    {
        self.remove_property_map::<S, T, P>(selector);
        self.add_post_action(post);
    }

    pub fn set_max_depth(&mut self, max: usize) {
        self.max_depth = max;
    }

    /// Switch the collection mapper mode. Compiled plans bake the mode in,
    /// so the cache is dropped.
    pub fn set_collection_map_mode(&mut self, mode: CollectionMapMode) {
        if self.collection_mode != mode {
            self.collection_mode = mode;
            self.plans.clear();
        }
    }

    /// Fresh context carrying the engine's configured depth limit.
    pub fn new_context(&self) -> MappingContext {
        MappingContext::new(self.max_depth)
    }

    // -----------------------------------------------------------------------
    // Mapping operations
    // -----------------------------------------------------------------------

    /// Map the source object's readable properties into the target.
    pub fn map<S: Reflect, T: Reflect>(&self, source: &S, target: &mut T) -> Result<(), MapError> {
        let mut ctx = self.new_context();
        self.map_with(source, target, &mut ctx)
    }

    /// Context-carrying overload for callers that stitch several top-level
    /// calls into one cycle-sharing unit.
    pub fn map_with<S: Reflect, T: Reflect>(
        &self,
        source: &S,
        target: &mut T,
        ctx: &mut MappingContext,
    ) -> Result<(), MapError> {
        let names = (source.schema().name, target.schema().name);
        self.map_into(ObjRef::Inline(source), ObjMut::Inline(target), ctx)
            .map_err(|e| e.finish(names.0, names.1))
    }

    /// Optional-source variant: `None` stays `None`, `Some` maps into a
    /// target built by `make`.
    pub fn map_or_null<T: Reflect>(
        &self,
        source: Option<&dyn Reflect>,
        make: impl FnOnce() -> T,
    ) -> Result<Option<T>, MapError> {
        let Some(source) = source else {
            return Ok(None);
        };
        let mut target = make();
        let names = (source.schema().name, target.schema().name);
        let mut ctx = self.new_context();
        self.map_into(ObjRef::Inline(source), ObjMut::Inline(&mut target), &mut ctx)
            .map_err(|e| e.finish(names.0, names.1))?;
        Ok(Some(target))
    }

    /// Append one default-constructed, mapped target element per source
    /// element.
    pub fn map_collection(
        &self,
        source: &dyn ReflectSeq,
        target: &mut dyn ReflectSeq,
    ) -> Result<(), MapError> {
        let names = (source.elem_schema().name, target.elem_schema().name);
        self.map_seq(source, target, CollectionMapMode::Construct)
            .map_err(|e| e.finish(names.0, names.1))
    }

    /// Like [`Engine::map_collection`] with an explicit element factory.
    pub fn map_collection_with<T: Reflect>(
        &self,
        source: &dyn ReflectSeq,
        target: &mut dyn ReflectSeq,
        make: impl Fn() -> T,
    ) -> Result<(), MapError> {
        let names = (source.elem_schema().name, target.elem_schema().name);
        for i in 0..source.len() {
            let mut element = Box::new(make());
            let mut ctx = self.new_context();
            self.map_into(source.element(i), ObjMut::Inline(&mut *element), &mut ctx)
                .map_err(|e| e.finish(names.0, names.1))?;
            target.push_boxed(element);
        }
        Ok(())
    }

    /// Append clones of the source elements; no per-element mapping.
    pub fn map_collection_refs(
        &self,
        source: &dyn ReflectSeq,
        target: &mut dyn ReflectSeq,
    ) -> Result<(), MapError> {
        let names = (source.elem_schema().name, target.elem_schema().name);
        self.map_seq(source, target, CollectionMapMode::Reference)
            .map_err(|e| e.finish(names.0, names.1))
    }

    /// Tabular adapter: snapshot the cursor's current row into a property
    /// bag and map the bag.
    pub fn map_row<T: Reflect>(
        &self,
        cursor: &dyn RowCursor,
        target: &mut T,
    ) -> Result<(), MapError> {
        let row = snapshot_row(cursor);
        self.map(&row, target)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    fn plan_for(&self, source: &TypeSchema, target: &TypeSchema) -> Arc<CompiledPlan> {
        let key = (source.id, target.id);
        if let Some(plan) = self.plans.get(&key) {
            tracing::trace!(source = source.name, target = target.name, "plan cache hit");
            return plan;
        }
        let pairs = rules::resolve(source, target, &self.rules);
        let plan = Arc::new(plan::build(source, target, &pairs, self.collection_mode));
        tracing::debug!(
            source = source.name,
            target = target.name,
            steps = plan.steps.len(),
            "compiled mapping plan"
        );
        self.plans.publish(key, Arc::clone(&plan));
        plan
    }

    fn map_into(
        &self,
        source: ObjRef<'_>,
        target: ObjMut<'_>,
        ctx: &mut MappingContext,
    ) -> Result<(), ExecError> {
        match ctx.enter(source.identity(), target.identity()) {
            Enter::AlreadyMapped => {
                tracing::trace!("identity pair already mapped, skipping");
                return Ok(());
            }
            Enter::DepthExceeded => {
                return Err(ExecError::Recursion {
                    max: ctx.max_depth(),
                })
            }
            Enter::Fresh => {}
        }

        let result = match (source, target) {
            (ObjRef::Inline(s), ObjMut::Inline(t)) => self.run_plan(s, t, ctx),
            (ObjRef::Inline(s), ObjMut::Shared(h)) => match h.try_borrow_mut() {
                Ok(mut t) => self.run_plan(s, &mut *t, ctx),
                Err(_) => Err(ExecError::Fault(
                    "target object is already borrowed elsewhere in the graph".into(),
                )),
            },
            (ObjRef::Shared(h), ObjMut::Inline(t)) => match h.try_borrow() {
                Ok(s) => self.run_plan(&*s, t, ctx),
                Err(_) => Err(ExecError::Fault(
                    "source object is already mutably borrowed elsewhere in the graph".into(),
                )),
            },
            (ObjRef::Shared(sh), ObjMut::Shared(th)) => match sh.try_borrow() {
                Ok(s) => match th.try_borrow_mut() {
                    Ok(mut t) => self.run_plan(&*s, &mut *t, ctx),
                    Err(_) => Err(ExecError::Fault(
                        "target object is already borrowed elsewhere in the graph".into(),
                    )),
                },
                Err(_) => Err(ExecError::Fault(
                    "source object is already mutably borrowed elsewhere in the graph".into(),
                )),
            },
        };
        ctx.leave();
        result
    }

    fn run_plan(
        &self,
        source: &dyn Reflect,
        target: &mut dyn Reflect,
        ctx: &mut MappingContext,
    ) -> Result<(), ExecError> {
        let plan = self.plan_for(source.schema(), target.schema());
        for step in &plan.steps {
            self.run_step(step, source, target, ctx)?;
        }

        if !self.post_actions.is_empty() {
            let applicable: Vec<&PostActionBinding> = {
                let (ss, ts) = (source.schema(), target.schema());
                self.post_actions
                    .iter()
                    .filter(|b| b.applies(ss, ts))
                    .collect()
            };
            for binding in applicable {
                (binding.action)(source, &mut *target);
            }
        }
        Ok(())
    }

    fn run_step(
        &self,
        step: &PropertyStep,
        source: &dyn Reflect,
        target: &mut dyn Reflect,
        ctx: &mut MappingContext,
    ) -> Result<(), ExecError> {
        if matches!(step.action, StepAction::Skip) {
            return Ok(());
        }

        let slot = match &step.source {
            Access::Named(name) => source.read(name),
            Access::Key(key) => {
                // absent key: skip with no side effect, unlike a null value
                if !source.has_key(key) {
                    return Ok(());
                }
                match source.read_key(key) {
                    Some(v) => Slot::Value(v),
                    None => Slot::Absent,
                }
            }
        };
        // a null snapshot and an absent property behave the same downstream
        let slot = match slot {
            Slot::Value(v) if v.is_null() => Slot::Absent,
            other => other,
        };

        match (&step.action, slot) {
            (_, Slot::Missing) => Ok(()),

            (StepAction::KeyedStore, Slot::Value(v)) => {
                target.write_key(step.target.name(), v);
                Ok(())
            }
            (StepAction::KeyedStore, Slot::Absent) => {
                target.write_key(step.target.name(), Value::Null);
                Ok(())
            }
            (StepAction::KeyedStore, _) => Ok(()),

            (StepAction::Direct, Slot::Value(v)) => {
                target.write(step.target.name(), v);
                Ok(())
            }
            (StepAction::Tiers { direct_kind, opaque, builtin, custom }, Slot::Value(v)) => {
                let name = step.target.name();
                if direct_kind.is_some_and(|k| v.kind() == k) {
                    target.write(name, v);
                    return Ok(());
                }
                if let Some(id) = opaque
                    && let Value::Opaque(o) = &v
                    && o.value_type_id() == *id
                {
                    target.write(name, v);
                    return Ok(());
                }
                if let Some(tier) = builtin {
                    let converted = match tier {
                        BuiltinTarget::Kind(k) => convert_builtin(*k, &v),
                        BuiltinTarget::Enum(variants) => convert_enum(variants, &v),
                    };
                    if let Some(cv) = converted {
                        target.write(name, cv);
                        return Ok(());
                    }
                }
                if let Some(key) = custom
                    && let Some(entry) = self.converters.get(key)
                    && let Some(cv) = (entry.value())(&v)
                {
                    target.write(name, cv);
                }
                Ok(())
            }

            // absent source: assign absent when the target can hold it,
            // otherwise leave the target untouched
            (StepAction::Direct | StepAction::Tiers { .. }, Slot::Absent) => {
                if step.target_optional {
                    target.write(step.target.name(), Value::Null);
                }
                Ok(())
            }

            (StepAction::Nested(NestedKind::Object), Slot::Object(obj)) => {
                match target.reach(step.target.name()) {
                    Reach::Object(dst) => self.map_into(obj, dst, ctx),
                    _ => Ok(()),
                }
            }
            // a map-shaped value (a nested dictionary behind a keyed read)
            // feeds an object target through a temporary bag
            (StepAction::Nested(NestedKind::Object), Slot::Value(Value::Map(entries))) => {
                match target.reach(step.target.name()) {
                    Reach::Object(dst) => {
                        let bag: PropertyBag = entries.into_iter().collect();
                        self.map_into(ObjRef::Inline(&bag), dst, ctx)
                    }
                    _ => Ok(()),
                }
            }
            (StepAction::Nested(NestedKind::Collection(mode)), Slot::Seq(seq)) => {
                match target.reach(step.target.name()) {
                    Reach::Seq(dst) => self.map_seq(seq, dst, *mode),
                    _ => Ok(()),
                }
            }

            _ => Ok(()),
        }
    }

    /// Map a source collection into a target collection. Each element gets
    /// its own context: elements are independent top-level-like pairings.
    fn map_seq(
        &self,
        source: &dyn ReflectSeq,
        target: &mut dyn ReflectSeq,
        mode: CollectionMapMode,
    ) -> Result<(), ExecError> {
        match mode {
            CollectionMapMode::None => Ok(()),
            CollectionMapMode::Construct => {
                for i in 0..source.len() {
                    let Some(element) = target.push_default() else {
                        return Ok(());
                    };
                    let mut ctx = MappingContext::new(self.max_depth);
                    self.map_into(source.element(i), ObjMut::Inline(element), &mut ctx)?;
                }
                Ok(())
            }
            CollectionMapMode::Reference => {
                for i in 0..source.len() {
                    match source.element(i) {
                        ObjRef::Inline(e) => {
                            target.push_cloned(e);
                        }
                        ObjRef::Shared(h) => match h.try_borrow() {
                            Ok(e) => {
                                target.push_cloned(&*e);
                            }
                            Err(_) => {
                                return Err(ExecError::Fault(
                                    "collection element is already mutably borrowed".into(),
                                ))
                            }
                        },
                    }
                }
                Ok(())
            }
        }
    }
}
