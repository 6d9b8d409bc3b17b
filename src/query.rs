//! Composable tree scopes over a SeaORM `Select`.
//!
//! Each scope joins the closure table under its own alias and narrows the
//! entity query to a view of the tree (descendants, ancestors, path, ...).
//! Scopes consume and return the builder, so they chain and accumulate:
//! joins add up, conditions are conjunctive.

use sea_orm::sea_query::{
    Alias, Condition, Expr, Func, IntoColumnRef, IntoCondition, JoinType, Order, SelectStatement,
    SimpleExpr,
};
use sea_orm::{
    ConnectionTrait, DbErr, EntityTrait, FromQueryResult, QueryResult, QueryTrait, Select,
};
use serde::Serialize;

use crate::error::ClosureTreeError;
use crate::traits::ClosureTreeModel;

/// Tree query builder for the entity behind `M`.
pub struct TreeQuery<M>
where
    M: ClosureTreeModel,
{
    select: Select<M::Entity>,
    current: Option<M::Id>,
    joins: usize,
    leaf: bool,
    depth_order: Vec<Alias>,
}

impl<M> Clone for TreeQuery<M>
where
    M: ClosureTreeModel,
{
    fn clone(&self) -> Self {
        Self {
            select: self.select.clone(),
            current: self.current.clone(),
            joins: self.joins,
            leaf: self.leaf,
            depth_order: self.depth_order.clone(),
        }
    }
}

impl<M> Default for TreeQuery<M>
where
    M: ClosureTreeModel,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TreeQuery<M>
where
    M: ClosureTreeModel,
{
    /// Start from `Entity::find()` with no current node.
    pub fn new() -> Self {
        Self::from_select(M::Entity::find())
    }

    /// Start from an existing, possibly already filtered, select.
    pub fn from_select(select: Select<M::Entity>) -> Self {
        Self {
            select,
            current: None,
            joins: 0,
            leaf: false,
            depth_order: Vec::new(),
        }
    }

    /// Use `model` as the current node for the zero-argument scopes.
    pub fn scoped_to(model: &M) -> Self {
        Self::new().with_current(model.id())
    }

    /// Use `id` as the current node for the zero-argument scopes.
    pub fn for_id(id: M::Id) -> Self {
        Self::new().with_current(id)
    }

    pub fn with_current(mut self, id: M::Id) -> Self {
        self.current = Some(id);
        self
    }

    pub fn current(&self) -> Option<&M::Id> {
        self.current.as_ref()
    }

    /// Nodes below `id`. Without `depth` every descendant is returned; with
    /// `depth` only those between 1 and `depth` levels down.
    pub fn descendants_of(mut self, id: &M::Id, depth: Option<u32>) -> Self {
        let config = M::closure_tree_config();
        let closure = self.next_alias();
        let on = Expr::col((closure.clone(), config.child_iden())).equals(Self::pk_ref());
        self.join(JoinType::InnerJoin, closure.clone(), on);
        self.statement()
            .and_where(Expr::col((closure.clone(), config.parent_iden())).eq(M::id_to_value(id)));
        self.restrict_depth(closure, depth)
    }

    pub fn descendants(self, depth: Option<u32>) -> Self {
        self.on_current(|query, id| query.descendants_of(id, depth))
    }

    pub fn children_of(self, id: &M::Id) -> Self {
        self.descendants_of(id, Some(1))
    }

    pub fn children(self) -> Self {
        self.descendants(Some(1))
    }

    /// Nodes above `id`, with the same depth rule as [`Self::descendants_of`].
    pub fn ancestors_of(mut self, id: &M::Id, depth: Option<u32>) -> Self {
        let closure = self.join_path(id);
        self.restrict_depth(closure, depth)
    }

    pub fn ancestors(self, depth: Option<u32>) -> Self {
        self.on_current(|query, id| query.ancestors_of(id, depth))
    }

    pub fn parent_of(self, id: &M::Id) -> Self {
        self.ancestors_of(id, Some(1))
    }

    pub fn parent(self) -> Self {
        self.ancestors(Some(1))
    }

    /// `id` and all of its ancestors, in no particular order.
    pub fn unordered_path_of(mut self, id: &M::Id) -> Self {
        self.join_path(id);
        self
    }

    pub fn unordered_path(self) -> Self {
        self.on_current(|query, id| query.unordered_path_of(id))
    }

    /// Root-to-node chain ending with `id` itself.
    pub fn path_of(mut self, id: &M::Id) -> Self {
        let closure = self.join_path(id);
        self.order_by_depth_desc(closure);
        self
    }

    pub fn path(self) -> Self {
        self.on_current(|query, id| query.path_of(id))
    }

    /// Direct children of `id` and of every ancestor of `id`, ordered from the
    /// root level down. The root itself is never part of the result.
    pub fn full_path_of(mut self, id: &M::Id) -> Self {
        let config = M::closure_tree_config();
        let sibling = self.next_alias();
        let on = Condition::all()
            .add(Expr::col((sibling.clone(), config.child_iden())).equals(Self::pk_ref()))
            .add(Expr::col((sibling.clone(), config.depth_iden())).eq(1));
        self.join(JoinType::InnerJoin, sibling.clone(), on);

        let path = self.next_alias();
        let on = Expr::col((path.clone(), config.parent_iden()))
            .equals((sibling, config.parent_iden()));
        self.join(JoinType::InnerJoin, path.clone(), on);
        self.statement()
            .and_where(Expr::col((path.clone(), config.child_iden())).eq(M::id_to_value(id)));
        self.order_by_depth_desc(path);
        self
    }

    pub fn full_path(self) -> Self {
        self.on_current(|query, id| query.full_path_of(id))
    }

    /// Select the derived leaf flag alongside the entity columns.
    ///
    /// Rows are grouped by primary key, so read them back with
    /// [`Self::all_with_leaf`] / [`Self::one_with_leaf`].
    pub fn leaf(mut self) -> Self {
        let config = M::closure_tree_config();
        let closure = self.next_alias();
        let on = Condition::all()
            .add(Expr::col((closure.clone(), config.parent_iden())).equals(Self::pk_ref()))
            .add(
                Expr::col((closure.clone(), config.parent_iden()))
                    .ne(Expr::col((closure.clone(), config.child_iden()))),
            );
        self.join(JoinType::LeftJoin, closure.clone(), on);

        let is_leaf: SimpleExpr =
            Expr::expr(Func::count(Expr::col((closure, config.parent_iden())))).eq(0);
        self.statement().expr_as(is_leaf, config.leaf_iden());
        self.leaf = true;
        self
    }

    /// Materialize the accumulated scopes into a SeaORM select.
    pub fn into_select(mut self) -> Select<M::Entity> {
        if self.leaf {
            let pk = Self::pk_ref();
            let depth = M::closure_tree_config().depth_iden();
            let order = std::mem::take(&mut self.depth_order);
            let statement = self.statement();
            statement.group_by_col(pk);
            for closure in order {
                statement.group_by_col((closure, depth.clone()));
            }
        }
        self.select
    }

    pub async fn all<C>(self, conn: &C) -> Result<Vec<M>, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        Ok(self.into_select().all(conn).await?)
    }

    pub async fn one<C>(self, conn: &C) -> Result<Option<M>, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        Ok(self.into_select().one(conn).await?)
    }

    pub async fn all_with_leaf<C>(self, conn: &C) -> Result<Vec<TreeNode<M>>, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        Ok(self
            .into_select()
            .into_model::<TreeNode<M>>()
            .all(conn)
            .await?)
    }

    pub async fn one_with_leaf<C>(self, conn: &C) -> Result<Option<TreeNode<M>>, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        Ok(self
            .into_select()
            .into_model::<TreeNode<M>>()
            .one(conn)
            .await?)
    }

    fn pk_ref() -> impl IntoColumnRef {
        (M::Entity::default(), M::id_column())
    }

    fn statement(&mut self) -> &mut SelectStatement {
        QueryTrait::query(&mut self.select)
    }

    fn next_alias(&mut self) -> Alias {
        let alias = Alias::new(format!(
            "{}_{}",
            M::closure_tree_config().closure_table(),
            self.joins
        ));
        self.joins += 1;
        alias
    }

    fn join<C>(&mut self, join: JoinType, alias: Alias, on: C)
    where
        C: IntoCondition,
    {
        let table = M::closure_tree_config().table_iden();
        self.statement().join_as(join, table, alias, on);
    }

    /// Join closure rows whose ancestor is the entity and whose descendant is `id`.
    fn join_path(&mut self, id: &M::Id) -> Alias {
        let config = M::closure_tree_config();
        let closure = self.next_alias();
        let on = Expr::col((closure.clone(), config.parent_iden())).equals(Self::pk_ref());
        self.join(JoinType::InnerJoin, closure.clone(), on);
        self.statement()
            .and_where(Expr::col((closure.clone(), config.child_iden())).eq(M::id_to_value(id)));
        closure
    }

    fn restrict_depth(mut self, closure: Alias, depth: Option<u32>) -> Self {
        let config = M::closure_tree_config();
        let condition = match depth {
            None => Expr::col((closure.clone(), config.child_iden()))
                .ne(Expr::col((closure, config.parent_iden()))),
            Some(depth) => Expr::col((closure, config.depth_iden())).between(1, i64::from(depth)),
        };
        self.statement().and_where(condition);
        self
    }

    fn order_by_depth_desc(&mut self, closure: Alias) {
        let depth = M::closure_tree_config().depth_iden();
        self.statement().order_by((closure.clone(), depth), Order::Desc);
        self.depth_order.push(closure);
    }

    fn on_current(self, scope: impl FnOnce(Self, &M::Id) -> Self) -> Self {
        match self.current.clone() {
            Some(id) => scope(self, &id),
            None => {
                let mut query = self;
                query.statement().and_where(Expr::cust("1 = 0"));
                query
            }
        }
    }
}

/// A model fetched together with the leaf flag selected by [`TreeQuery::leaf`].
///
/// `leaf_parameter` only names the SQL column the flag is read from. Serialized
/// output always carries the model's fields plus a `"leaf"` key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode<M> {
    #[serde(flatten)]
    pub model: M,
    leaf: Option<bool>,
}

impl<M> TreeNode<M> {
    /// Whether the node had no children when it was fetched. `false` when the
    /// query did not select the leaf flag.
    pub fn is_leaf(&self) -> bool {
        self.leaf.unwrap_or(false)
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M> FromQueryResult for TreeNode<M>
where
    M: ClosureTreeModel,
{
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        let model = M::from_query_result(res, pre)?;
        let column = M::closure_tree_config().leaf_parameter();
        // SQLite reports the comparison as an integer.
        let leaf = res
            .try_get::<bool>(pre, column)
            .ok()
            .or_else(|| res.try_get::<i64>(pre, column).ok().map(|v| v != 0));
        Ok(Self { model, leaf })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, QueryTrait};

    use super::TreeQuery;
    use crate::fixtures::folder;

    fn sql(query: TreeQuery<folder::Model>) -> String {
        query.into_select().build(DbBackend::Postgres).to_string()
    }

    #[test]
    fn descendants_exclude_the_self_row_without_depth() {
        let sql = sql(TreeQuery::new().descendants_of(&1, None));
        assert!(sql.contains(
            r#"INNER JOIN "folder_tree" AS "folder_tree_0" ON "folder_tree_0"."child" = "folders"."id""#
        ));
        assert!(sql.contains(r#""folder_tree_0"."parent" = 1"#));
        assert!(sql.contains(r#""folder_tree_0"."child" <> "folder_tree_0"."parent""#));
        assert!(!sql.contains("BETWEEN"));
    }

    #[test]
    fn children_bound_depth_to_one() {
        let sql = sql(TreeQuery::new().children_of(&4));
        assert!(sql.contains(r#""folder_tree_0"."depth" BETWEEN 1 AND 1"#));
        assert!(!sql.contains("<>"));
    }

    #[test]
    fn ancestors_join_on_the_parent_column() {
        let sql = sql(TreeQuery::new().ancestors_of(&6, None));
        assert!(sql.contains(r#"ON "folder_tree_0"."parent" = "folders"."id""#));
        assert!(sql.contains(r#""folder_tree_0"."child" = 6"#));
    }

    #[test]
    fn path_orders_root_first() {
        let sql = sql(TreeQuery::new().path_of(&7));
        assert!(sql.contains(r#"ORDER BY "folder_tree_0"."depth" DESC"#));
    }

    #[test]
    fn chained_scopes_use_distinct_aliases() {
        let sql = sql(TreeQuery::new().leaf().children_of(&4));
        assert!(sql.contains(r#"LEFT JOIN "folder_tree" AS "folder_tree_0""#));
        assert!(sql.contains(r#"INNER JOIN "folder_tree" AS "folder_tree_1""#));
        assert!(sql.contains(r#"COUNT("folder_tree_0"."parent") = 0 AS "leaf""#));
        assert!(sql.contains(r#"GROUP BY "folders"."id""#));
    }

    #[test]
    fn leaf_groups_by_ordered_depth_columns() {
        let sql = sql(TreeQuery::new().path_of(&7).leaf());
        assert!(sql.contains(r#"GROUP BY "folders"."id", "folder_tree_0"."depth""#));
    }

    #[test]
    fn unscoped_zero_argument_variants_match_nothing() {
        let unscoped = sql(TreeQuery::new().children());
        assert!(unscoped.contains("1 = 0"));
        assert!(!unscoped.contains("JOIN"));

        let scoped = sql(TreeQuery::for_id(1).children());
        assert!(scoped.contains(r#""folder_tree_0"."parent" = 1"#));
    }
}
