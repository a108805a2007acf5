use std::sync::Arc;

use morph_api::descriptor::TypeSchema;
use morph_api::object::Reflect;

use crate::rules::TypeFilter;

pub(crate) type PostAction = Arc<dyn Fn(&dyn Reflect, &mut dyn Reflect) + Send + Sync>;

/// One registered post action: run after a pairing's plan completes when
/// both filters accept the runtime types. Bindings run in registration
/// order and are skipped entirely for guard-short-circuited pairs.
pub struct PostActionBinding {
    pub(crate) source: Option<TypeFilter>,
    pub(crate) target: Option<TypeFilter>,
    pub(crate) action: PostAction,
}

impl PostActionBinding {
    pub(crate) fn applies(&self, source: &TypeSchema, target: &TypeSchema) -> bool {
        self.source.is_none_or(|f| f.accepts(source))
            && self.target.is_none_or(|f| f.accepts(target))
    }
}
