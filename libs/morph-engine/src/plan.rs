//! Plan compiler.
//!
//! A compiled plan is the per-type-pair artifact: one step per resolved
//! correspondence, with every type-shape branch of the conversion pipeline
//! decided here, once, from the descriptor pair. The executor only follows
//! the baked-in action.

use std::any::TypeId;

use morph_api::descriptor::{PropertyDescriptor, PropertyKind, TypeSchema};
use morph_api::value::ValueKind;

use crate::collection::CollectionMapMode;
use crate::rules::Correspondence;

/// Custom-converter table key: the target property's effective type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConverterKey {
    Kind(ValueKind),
    Type(TypeId),
}

/// How a step reads its source or writes its target.
#[derive(Debug, Clone)]
pub enum Access {
    /// Named accessor on the reflection facade.
    Named(String),
    /// String-keyed indexed access bound to a fixed key literal.
    Key(String),
}

impl Access {
    pub fn name(&self) -> &str {
        match self {
            Access::Named(n) => n,
            Access::Key(k) => k,
        }
    }
}

/// Built-in tier resolved for a step.
#[derive(Debug, Clone, Copy)]
pub enum BuiltinTarget {
    Kind(ValueKind),
    Enum(&'static [&'static str]),
}

/// Nested step flavor.
#[derive(Debug, Clone, Copy)]
pub enum NestedKind {
    /// Recurse the whole map operation into the target property's object.
    Object,
    /// Run the collection mapper in the given mode.
    Collection(CollectionMapMode),
}

/// The executable action of one step, fully resolved at build time.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// No applicable tier; the step has no effect and is never read.
    Skip,
    /// Same effective kind on both sides: assign unchanged.
    Direct,
    /// Tiered fallback for value-shaped targets. Fields are the tiers that
    /// survived build-time resolution, tried in order.
    Tiers {
        /// Runtime kind-equality check (sources whose kind is only known
        /// at runtime).
        direct_kind: Option<ValueKind>,
        /// Runtime opaque-type check for opaque targets.
        opaque: Option<TypeId>,
        builtin: Option<BuiltinTarget>,
        custom: Option<ConverterKey>,
    },
    Nested(NestedKind),
    /// Store the raw value under the target's fixed key (object-to-map
    /// fallback).
    KeyedStore,
}

/// One property step.
#[derive(Debug, Clone)]
pub struct PropertyStep {
    pub source: Access,
    pub target: Access,
    pub action: StepAction,
    pub target_optional: bool,
}

/// Immutable per-type-pair plan. Replaced, never mutated, on rule edits.
#[derive(Debug)]
pub struct CompiledPlan {
    pub steps: Vec<PropertyStep>,
}

/// Resolve correspondences into a plan.
pub fn build(
    _source: &TypeSchema,
    _target: &TypeSchema,
    pairs: &[Correspondence],
    mode: CollectionMapMode,
) -> CompiledPlan {
    let steps = pairs
        .iter()
        .map(|pair| PropertyStep {
            source: access_of(&pair.source),
            target: access_of(&pair.target),
            action: resolve_action(&pair.source, &pair.target, mode),
            target_optional: pair.target.optional,
        })
        .collect();
    CompiledPlan { steps }
}

fn access_of(desc: &PropertyDescriptor) -> Access {
    match &desc.key {
        Some(key) => Access::Key(key.clone()),
        None => Access::Named(desc.name.clone()),
    }
}

/// Decide the pipeline branches for one descriptor pair.
fn resolve_action(
    source: &PropertyDescriptor,
    target: &PropertyDescriptor,
    mode: CollectionMapMode,
) -> StepAction {
    if target.key.is_some() {
        // Keyed stores carry plain values; object-shaped sources have no
        // value snapshot to store.
        return match source.kind {
            PropertyKind::Object { .. } | PropertyKind::ObjectSeq { .. } => StepAction::Skip,
            _ => StepAction::KeyedStore,
        };
    }

    match &target.kind {
        PropertyKind::Scalar(tk) => {
            if !target.writable {
                return StepAction::Skip;
            }
            match &source.kind {
                PropertyKind::Scalar(sk) if sk == tk => StepAction::Direct,
                PropertyKind::Object { .. } | PropertyKind::ObjectSeq { .. } => StepAction::Skip,
                PropertyKind::Dynamic => StepAction::Tiers {
                    direct_kind: Some(*tk),
                    opaque: None,
                    builtin: builtin_for(*tk),
                    custom: Some(ConverterKey::Kind(*tk)),
                },
                _ => StepAction::Tiers {
                    direct_kind: None,
                    opaque: None,
                    builtin: builtin_for(*tk),
                    custom: Some(ConverterKey::Kind(*tk)),
                },
            }
        }
        PropertyKind::Enum { variants } => {
            if !target.writable {
                return StepAction::Skip;
            }
            match &source.kind {
                // Same static variant table means the same enum type.
                PropertyKind::Enum { variants: sv }
                    if sv.as_ptr() == variants.as_ptr() && sv.len() == variants.len() =>
                {
                    StepAction::Direct
                }
                PropertyKind::Object { .. } | PropertyKind::ObjectSeq { .. } => StepAction::Skip,
                _ => StepAction::Tiers {
                    direct_kind: None,
                    opaque: None,
                    builtin: Some(BuiltinTarget::Enum(variants)),
                    custom: None,
                },
            }
        }
        PropertyKind::Opaque { id, .. } => {
            if !target.writable {
                return StepAction::Skip;
            }
            match &source.kind {
                PropertyKind::Opaque { id: sid, .. } if sid == id => StepAction::Direct,
                PropertyKind::Object { .. } | PropertyKind::ObjectSeq { .. } => StepAction::Skip,
                _ => StepAction::Tiers {
                    direct_kind: None,
                    opaque: Some(*id),
                    builtin: None,
                    custom: Some(ConverterKey::Type(*id)),
                },
            }
        }
        PropertyKind::ValueList => {
            if !target.writable {
                return StepAction::Skip;
            }
            match &source.kind {
                PropertyKind::ValueList => StepAction::Direct,
                PropertyKind::Dynamic => StepAction::Tiers {
                    direct_kind: Some(ValueKind::List),
                    opaque: None,
                    builtin: None,
                    custom: None,
                },
                _ => StepAction::Skip,
            }
        }
        PropertyKind::ValueMap => {
            if !target.writable {
                return StepAction::Skip;
            }
            match &source.kind {
                PropertyKind::ValueMap => StepAction::Direct,
                PropertyKind::Dynamic => StepAction::Tiers {
                    direct_kind: Some(ValueKind::Map),
                    opaque: None,
                    builtin: None,
                    custom: None,
                },
                _ => StepAction::Skip,
            }
        }
        // The runtime slot decides whether there is an object to recurse
        // into; non-object slots fall out silently.
        PropertyKind::Object { .. } => StepAction::Nested(NestedKind::Object),
        PropertyKind::ObjectSeq { elem, elem_default, .. } => match &source.kind {
            PropertyKind::ObjectSeq { elem: s_elem, .. } => match mode {
                CollectionMapMode::None => StepAction::Skip,
                CollectionMapMode::Construct if *elem_default => {
                    StepAction::Nested(NestedKind::Collection(CollectionMapMode::Construct))
                }
                CollectionMapMode::Reference if s_elem == elem => {
                    StepAction::Nested(NestedKind::Collection(CollectionMapMode::Reference))
                }
                _ => StepAction::Skip,
            },
            _ => StepAction::Skip,
        },
        PropertyKind::Dynamic => StepAction::Skip,
    }
}

fn builtin_for(kind: ValueKind) -> Option<BuiltinTarget> {
    kind.in_catalog().then_some(BuiltinTarget::Kind(kind))
}
