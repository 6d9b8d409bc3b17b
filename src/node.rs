use async_trait::async_trait;
use sea_orm::{ConnectionTrait, TransactionTrait};

use crate::error::ClosureTreeError;
use crate::query::TreeQuery;
use crate::repository::ClosureTreeRepository;
use crate::traits::ClosureTreeModel;

/// Tree operations scoped to a fetched model.
///
/// Blanket-implemented for every [`ClosureTreeModel`]; the model's own key is
/// used wherever the repository API takes an explicit id.
#[async_trait]
pub trait ClosureTreeNode: ClosureTreeModel {
    /// Tree query whose current node is `self`.
    fn tree(&self) -> TreeQuery<Self> {
        TreeQuery::scoped_to(self)
    }

    fn descendants(&self, depth: Option<u32>) -> TreeQuery<Self> {
        self.tree().descendants(depth)
    }

    fn children(&self) -> TreeQuery<Self> {
        self.tree().children()
    }

    fn ancestors(&self, depth: Option<u32>) -> TreeQuery<Self> {
        self.tree().ancestors(depth)
    }

    fn parent(&self) -> TreeQuery<Self> {
        self.tree().parent()
    }

    fn path(&self) -> TreeQuery<Self> {
        self.tree().path()
    }

    fn full_path(&self) -> TreeQuery<Self> {
        self.tree().full_path()
    }

    async fn mark_as_root<C>(&self, conn: &C) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        ClosureTreeRepository::<Self>::new()
            .mark_as_root(conn, &self.id())
            .await
    }

    /// Append `self` under `target`; fails with
    /// [`ClosureTreeError::TargetNotInTree`] when nothing was inserted.
    async fn append_to<C>(&self, conn: &C, target: &Self::Id) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let inserted = ClosureTreeRepository::<Self>::new()
            .append_to(conn, target, &self.id())
            .await?;
        if inserted == 0 {
            return Err(ClosureTreeError::TargetNotInTree);
        }
        Ok(inserted)
    }

    /// Append `child` under `self`.
    async fn append<C>(&self, conn: &C, child: &Self) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        child.append_to(conn, &self.id()).await
    }

    async fn move_to<C>(&self, conn: &C, target: &Self::Id) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        ClosureTreeRepository::<Self>::new()
            .move_to(conn, target, &self.id())
            .await
    }

    /// Delete `self` and its subtree; returns the number of entity rows removed.
    async fn delete_node<C>(&self, conn: &C) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        ClosureTreeRepository::<Self>::new()
            .delete_node(conn, &self.id())
            .await
    }
}

impl<M> ClosureTreeNode for M where M: ClosureTreeModel {}
