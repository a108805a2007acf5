/// How object-collection pairs are mapped.
///
/// Eligibility is decided at plan-build time: `Construct` needs a
/// default-constructible target element type, `Reference` needs element-type
/// equality. Ineligible pairs, and all pairs under `None`, resolve to a
/// no-op step. Collection mapping is strictly additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionMapMode {
    /// Collection mapping disabled.
    None,
    /// Default-construct a fresh target element and map into it.
    #[default]
    Construct,
    /// Append clones of the source elements directly.
    Reference,
}
