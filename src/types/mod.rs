mod commit;
mod diff;
mod tree;

pub use commit::Commit;
pub use diff::{ChangeKind, DiffEntry};
pub use tree::{NodeKind, Tree, TreeEntry};
