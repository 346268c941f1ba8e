mod fmt;
mod node;

pub use fmt::PrintTree;
pub use node::{BinaryContraction, Tree};

impl std::fmt::Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_tree("", f)
    }
}
