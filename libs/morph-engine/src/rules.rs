//! Property matching rules.
//!
//! Rules pair target properties with source properties; the plan compiler
//! turns each pairing into an executable step. Rules run in registration
//! order and each target property belongs to the first rule that claims it.

use std::any::{Any, TypeId};

use morph_api::descriptor::{PropertyDescriptor, TypeSchema};

// ---------------------------------------------------------------------------
// Type filters
// ---------------------------------------------------------------------------

/// How a [`TypeFilter`] compares against a runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilterCondition {
    /// The concrete type only.
    Exact,
    /// The type or anything carrying it as a facet tag.
    Inherit,
}

/// Type predicate used by rule conditions and post-action bindings.
#[derive(Debug, Clone, Copy)]
pub struct TypeFilter {
    pub id: TypeId,
    pub condition: TypeFilterCondition,
}

impl TypeFilter {
    pub fn exact<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            condition: TypeFilterCondition::Exact,
        }
    }

    pub fn inherit<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            condition: TypeFilterCondition::Inherit,
        }
    }

    pub fn accepts(&self, schema: &TypeSchema) -> bool {
        match self.condition {
            TypeFilterCondition::Exact => schema.id == self.id,
            TypeFilterCondition::Inherit => schema.conforms_to(self.id),
        }
    }
}

/// Pair of optional type filters gating a rule. `None` accepts any type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchCondition {
    pub source: Option<TypeFilter>,
    pub target: Option<TypeFilter>,
}

impl MatchCondition {
    pub fn accepts(&self, source: &TypeSchema, target: &TypeSchema) -> bool {
        self.source.is_none_or(|f| f.accepts(source))
            && self.target.is_none_or(|f| f.accepts(target))
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// One matching strategy. `bind` answers, for a single target property,
/// with the source-side descriptor the step should read through, or `None`
/// to leave the target for a later rule.
pub trait MatchRule: Send + Sync {
    fn condition(&self) -> &MatchCondition;

    fn bind(
        &self,
        source: &TypeSchema,
        candidates: &[PropertyDescriptor],
        target: &PropertyDescriptor,
    ) -> Option<PropertyDescriptor>;
}

/// Case-insensitive property-name equality. The default rule for any pair.
pub struct NameMatchRule {
    condition: MatchCondition,
}

impl NameMatchRule {
    pub fn new() -> Self {
        Self {
            condition: MatchCondition::default(),
        }
    }
}

impl Default for NameMatchRule {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchRule for NameMatchRule {
    fn condition(&self) -> &MatchCondition {
        &self.condition
    }

    fn bind(
        &self,
        _source: &TypeSchema,
        candidates: &[PropertyDescriptor],
        target: &PropertyDescriptor,
    ) -> Option<PropertyDescriptor> {
        candidates
            .iter()
            .find(|s| s.readable && s.name.eq_ignore_ascii_case(&target.name))
            .cloned()
    }
}

/// String-keyed source types feed every target property from an indexed
/// read bound to the target property's name.
pub struct KeyedSourceRule {
    condition: MatchCondition,
}

impl KeyedSourceRule {
    pub fn new() -> Self {
        Self {
            condition: MatchCondition::default(),
        }
    }
}

impl Default for KeyedSourceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchRule for KeyedSourceRule {
    fn condition(&self) -> &MatchCondition {
        &self.condition
    }

    fn bind(
        &self,
        source: &TypeSchema,
        _candidates: &[PropertyDescriptor],
        target: &PropertyDescriptor,
    ) -> Option<PropertyDescriptor> {
        if !source.keyed {
            return None;
        }
        Some(PropertyDescriptor::keyed_read(target.name.clone()))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A matched (source descriptor, target descriptor) pair.
#[derive(Debug, Clone)]
pub struct Correspondence {
    pub source: PropertyDescriptor,
    pub target: PropertyDescriptor,
}

/// Run the rule chain for a type pair.
///
/// Each rule sees only the target properties earlier rules left unclaimed.
/// Afterwards, when the target type is string-keyed, every readable source
/// property additionally lands as an indexed write under its own name (the
/// object-to-map fallback).
pub fn resolve(
    source: &TypeSchema,
    target: &TypeSchema,
    rules: &[Box<dyn MatchRule>],
) -> Vec<Correspondence> {
    let mut claimed = vec![false; target.properties.len()];
    let mut out = Vec::new();

    for rule in rules {
        if !rule.condition().accepts(source, target) {
            continue;
        }
        for (i, t) in target.properties.iter().enumerate() {
            if claimed[i] {
                continue;
            }
            if let Some(s) = rule.bind(source, &source.properties, t) {
                claimed[i] = true;
                out.push(Correspondence {
                    source: s,
                    target: t.clone(),
                });
            }
        }
    }

    if target.keyed {
        for s in &source.properties {
            if !s.readable {
                continue;
            }
            out.push(Correspondence {
                source: s.clone(),
                target: PropertyDescriptor::keyed_write(s.name.clone()),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_api::value::ValueKind;

    struct Src;
    struct Dst;

    fn source_schema() -> TypeSchema {
        TypeSchema::of::<Src>(
            "Src",
            vec![
                PropertyDescriptor::scalar("Name", ValueKind::Str),
                PropertyDescriptor::scalar("age", ValueKind::I32),
                PropertyDescriptor::scalar("hidden", ValueKind::Str).read_only(),
            ],
        )
    }

    fn default_rules() -> Vec<Box<dyn MatchRule>> {
        vec![Box::new(NameMatchRule::new()), Box::new(KeyedSourceRule::new())]
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let source = source_schema();
        let target = TypeSchema::of::<Dst>(
            "Dst",
            vec![
                PropertyDescriptor::scalar("name", ValueKind::Str),
                PropertyDescriptor::scalar("AGE", ValueKind::I64),
                PropertyDescriptor::scalar("other", ValueKind::Str),
            ],
        );

        let pairs = resolve(&source, &target, &default_rules());
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source.name, "Name");
        assert_eq!(pairs[0].target.name, "name");
        assert_eq!(pairs[1].source.name, "age");
    }

    #[test]
    fn read_only_flag_on_descriptor_not_matched_as_writable_source() {
        // "hidden" has no write accessor on the source side but is still a
        // perfectly good read; writability only matters on the target side.
        let source = source_schema();
        let target = TypeSchema::of::<Dst>(
            "Dst",
            vec![PropertyDescriptor::scalar("Hidden", ValueKind::Str)],
        );
        let pairs = resolve(&source, &target, &default_rules());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source.name, "hidden");
    }

    #[test]
    fn earlier_rule_claims_the_target_first() {
        struct ConstRule(MatchCondition);
        impl MatchRule for ConstRule {
            fn condition(&self) -> &MatchCondition {
                &self.0
            }
            fn bind(
                &self,
                _source: &TypeSchema,
                candidates: &[PropertyDescriptor],
                _target: &PropertyDescriptor,
            ) -> Option<PropertyDescriptor> {
                candidates.first().cloned()
            }
        }

        let source = source_schema();
        let target = TypeSchema::of::<Dst>(
            "Dst",
            vec![PropertyDescriptor::scalar("age", ValueKind::I32)],
        );

        let rules: Vec<Box<dyn MatchRule>> = vec![
            Box::new(ConstRule(MatchCondition::default())),
            Box::new(NameMatchRule::new()),
        ];
        let pairs = resolve(&source, &target, &rules);
        assert_eq!(pairs.len(), 1);
        // the constant rule ran first, so "age" got bound to "Name"
        assert_eq!(pairs[0].source.name, "Name");
    }

    #[test]
    fn keyed_source_binds_every_target_property() {
        let source = TypeSchema::keyed_of::<Src>("Bag");
        let target = TypeSchema::of::<Dst>(
            "Dst",
            vec![
                PropertyDescriptor::scalar("name", ValueKind::Str),
                PropertyDescriptor::scalar("age", ValueKind::I32),
            ],
        );
        let pairs = resolve(&source, &target, &default_rules());
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source.key.as_deref(), Some("name"));
        assert_eq!(pairs[1].source.key.as_deref(), Some("age"));
    }

    #[test]
    fn keyed_target_collects_all_readable_source_properties() {
        let source = source_schema();
        let target = TypeSchema::keyed_of::<Dst>("Bag");
        let pairs = resolve(&source, &target, &default_rules());
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|p| p.target.key.is_some()));
        assert_eq!(pairs[0].target.key.as_deref(), Some("Name"));
    }

    #[test]
    fn inherit_filter_consults_facets() {
        struct Base;
        let schema = TypeSchema::of::<Src>("Src", Vec::new()).with_facet::<Base>();
        assert!(TypeFilter::inherit::<Base>().accepts(&schema));
        assert!(!TypeFilter::exact::<Base>().accepts(&schema));
        assert!(TypeFilter::exact::<Src>().accepts(&schema));
    }
}
