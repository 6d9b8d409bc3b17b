//! Closure-table hierarchies for SeaORM entities.
//!
//! A side table stores one `(parent, child, depth)` row for every
//! ancestor/descendant pair of a tree, including a `(node, node, 0)` self row
//! per node. Reads become plain joins ([`TreeQuery`]); structural changes are
//! set-based statements that keep the table consistent
//! ([`ClosureTreeRepository`]). PostgreSQL and SQLite connections are supported.

pub mod config;
pub mod error;
pub mod node;
pub mod query;
pub mod repository;
pub mod traits;
pub mod transaction;

#[cfg(test)]
mod fixtures;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{ClosureTreeConfig, ClosureTreeOptions};
    pub use crate::node::ClosureTreeNode;
    pub use crate::query::{TreeNode, TreeQuery};
    pub use crate::traits::ClosureTreeModel;
    pub use closure_table_macros::ClosureTreeModel;
}

pub use closure_table_macros::ClosureTreeModel as ClosureTreeModelDerive;
#[doc(hidden)]
pub use closure_table_macros::ClosureTreeModel;
pub use config::{ClosureTreeConfig, ClosureTreeOptions};
pub use error::ClosureTreeError;
pub use node::ClosureTreeNode;
pub use query::{TreeNode, TreeQuery};
pub use repository::ClosureTreeRepository;
pub use traits::ClosureTreeModel;
pub use transaction::ScopedTransaction;

#[doc(hidden)]
pub mod __private {
    pub use once_cell;
}
