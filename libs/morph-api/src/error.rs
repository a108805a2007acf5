/// Fatal mapping failures. Conversion misses and unsupported property
/// shapes are not errors; they leave the target untouched.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Call depth passed the configured maximum: a likely unbounded chain
    /// of always-distinct objects the visited-pair guard cannot catch.
    #[error("map recursion exceeded {max} levels")]
    RecursionLimit { max: usize },

    /// A failure raised inside a compiled mapping plan, wrapped once at
    /// the top level with the concrete type names of the pair.
    #[error("mapping plan failed for {source_type} -> {target_type}")]
    PlanFault {
        source_type: &'static str,
        target_type: &'static str,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}
