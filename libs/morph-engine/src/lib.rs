pub mod cache;
pub mod collection;
pub mod context;
pub mod engine;
pub mod plan;
pub mod post;
pub mod rules;

pub use collection::CollectionMapMode;
pub use context::MappingContext;
pub use engine::Engine;
pub use rules::{Correspondence, MatchCondition, MatchRule, TypeFilter, TypeFilterCondition};
