use rustc_hash::FxHashSet;

/// Outcome of trying to enter a (source, target) identity pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enter {
    Fresh,
    /// The pair was already mapped in this call tree; run nothing for it.
    AlreadyMapped,
    /// The depth counter hit the configured maximum.
    DepthExceeded,
}

/// Per-top-level-call recursion guard: the set of object identity pairs
/// already mapped plus a depth counter for chains of always-distinct
/// objects the visited set cannot catch.
///
/// Never shared across threads; every top-level operation creates its own.
pub struct MappingContext {
    visited: FxHashSet<(usize, usize)>,
    depth: usize,
    max_depth: usize,
}

impl MappingContext {
    pub fn new(max_depth: usize) -> Self {
        Self {
            visited: FxHashSet::default(),
            depth: 0,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn enter(&mut self, source_id: usize, target_id: usize) -> Enter {
        if !self.visited.insert((source_id, target_id)) {
            return Enter::AlreadyMapped;
        }
        if self.depth >= self.max_depth {
            return Enter::DepthExceeded;
        }
        self.depth += 1;
        Enter::Fresh
    }

    pub fn leave(&mut self) {
        self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_pair_is_not_reentered() {
        let mut ctx = MappingContext::new(4);
        assert_eq!(ctx.enter(1, 2), Enter::Fresh);
        assert_eq!(ctx.enter(1, 2), Enter::AlreadyMapped);
        // a different pairing of the same source is fresh
        assert_eq!(ctx.enter(1, 3), Enter::Fresh);
    }

    #[test]
    fn depth_limit_trips_on_distinct_pairs() {
        let mut ctx = MappingContext::new(2);
        assert_eq!(ctx.enter(1, 10), Enter::Fresh);
        assert_eq!(ctx.enter(2, 20), Enter::Fresh);
        assert_eq!(ctx.enter(3, 30), Enter::DepthExceeded);
        ctx.leave();
        assert_eq!(ctx.enter(4, 40), Enter::Fresh);
    }
}
