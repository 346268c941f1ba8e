//! Labelled index variables (spec.md section 3, "Index").
//!
//! Indices are value-typed: two `Index`es are identical iff their ids
//! match. There is no way to mutate an existing `Index` in place;
//! renumbering always produces a new one via [`Index::renumber`].

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Orbital subspace tag. Ordering follows the fixed priority `c < x < a`
/// used when deciding which index of a delta-pair survives during
/// canonicalization; `General` is permissive and compares equal to
/// whichever concrete space it is paired against (see [`Space::matches`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    Closed,
    Active,
    Virtual,
    General,
    Ci,
}

impl Space {
    /// Fixed priority used by delta-pair canonicalization: lower survives.
    /// `General` sorts after the concrete spaces since it never drives the
    /// canonical choice on its own.
    pub fn priority(&self) -> u8 {
        match self {
            Space::Closed => 0,
            Space::Active => 1,
            Space::Virtual => 2,
            Space::Ci => 3,
            Space::General => 4,
        }
    }

    /// Whether two spaces may be joined by a contraction delta. `General`
    /// matches anything; otherwise spaces must agree exactly (c-c, a-a,
    /// x-x, i-i).
    pub fn matches(&self, other: &Space) -> bool {
        matches!(self, Space::General) || matches!(other, Space::General) || self == other
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Space::Closed => "c",
            Space::Active => "x",
            Space::Virtual => "a",
            Space::General => "g",
            Space::Ci => "i",
        }
    }
}

/// A single labelled index: a unique id, its orbital space, and whether it
/// appears dagger-side (creation) in the operator it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Index {
    id: u64,
    space: Space,
    dagger: bool,
}

impl Index {
    /// Allocates a fresh index with a new, globally unique id.
    pub fn new(space: Space, dagger: bool) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Index { id, space, dagger }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }

    pub fn is_active(&self) -> bool {
        matches!(self.space, Space::Active)
    }

    /// Produces a new index sharing this one's space and dagger flag but
    /// with a fresh id — used when renaming dummy indices to their
    /// canonical minimal form.
    pub fn renumber(&self) -> Self {
        Index::new(self.space, self.dagger)
    }

    /// Variable name used in emitted source, e.g. `x3` for an active index
    /// with id 3.
    pub fn str_gen(&self) -> String {
        format!("{}{}", self.space.letter(), self.id)
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.space.letter(), self.id, if self.dagger { "+" } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_indices_have_distinct_ids() {
        let a = Index::new(Space::Active, false);
        let b = Index::new(Space::Active, false);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn renumber_keeps_space_but_changes_id() {
        let a = Index::new(Space::Closed, true);
        let b = a.renumber();
        assert_eq!(a.space(), b.space());
        assert_eq!(a.dagger(), b.dagger());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn space_priority_orders_closed_before_active_before_virtual() {
        assert!(Space::Closed.priority() < Space::Active.priority());
        assert!(Space::Active.priority() < Space::Virtual.priority());
    }

    #[test]
    fn general_space_matches_any_concrete_space() {
        assert!(Space::General.matches(&Space::Active));
        assert!(Space::Closed.matches(&Space::General));
        assert!(!Space::Closed.matches(&Space::Active));
    }
}
