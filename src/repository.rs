use std::marker::PhantomData;

use sea_orm::sea_query::{Alias, Expr, JoinType, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityName, EntityTrait,
    IdenStatic, QueryFilter, Statement, TransactionTrait, Value,
};
use tracing::{debug, instrument, warn};

use crate::config::ClosureTreeConfig;
use crate::error::ClosureTreeError;
use crate::query::TreeQuery;
use crate::traits::ClosureTreeModel;
use crate::transaction::ScopedTransaction;

/// Repository exposing the structural closure-table operations for a given model.
///
/// Single-statement operations run on whatever connection they are handed.
/// Multi-statement operations open a [`ScopedTransaction`] on it, which nests
/// as a savepoint when the caller already holds a transaction.
#[derive(Debug, Default)]
pub struct ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    _marker: PhantomData<M>,
}

impl<M> ClosureTreeRepository<M>
where
    M: ClosureTreeModel,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    fn config(&self) -> &'static ClosureTreeConfig {
        M::closure_tree_config()
    }

    fn ensure_supported(conn: &impl ConnectionTrait) -> Result<DbBackend, ClosureTreeError> {
        match conn.get_database_backend() {
            backend @ (DbBackend::Postgres | DbBackend::Sqlite) => Ok(backend),
            _ => Err(ClosureTreeError::UnsupportedBackend),
        }
    }

    /// Empty tree query for this model.
    pub fn query(&self) -> TreeQuery<M> {
        TreeQuery::new()
    }

    /// Insert the self row `(id, id, 0)`, making `id` the root of a new tree.
    #[instrument(skip_all, fields(table = %self.config().closure_table(), node = ?id))]
    pub async fn mark_as_root<C>(&self, conn: &C, id: &M::Id) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let config = self.config();
        let mut insert = Query::insert();
        insert
            .into_table(config.table_iden())
            .columns([config.parent_iden(), config.child_iden(), config.depth_iden()])
            .values([
                M::id_to_value(id).into(),
                M::id_to_value(id).into(),
                Expr::val(0).into(),
            ])?;
        let inserted = conn.execute(backend.build(&insert)).await?.rows_affected();
        if inserted != 1 {
            return Err(ClosureTreeError::invariant(format!(
                "self row insert affected {inserted} rows"
            )));
        }
        debug!("marked node as root");
        Ok(())
    }

    /// Insert a new entity and mark it as a root, atomically.
    ///
    /// A save rejected by the model's `before_save` hook yields
    /// [`ClosureTreeError::Validation`] and leaves the closure table untouched.
    #[instrument(skip_all, fields(table = %self.config().closure_table()))]
    pub async fn save_node_as_root<C>(
        &self,
        conn: &C,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        Self::ensure_supported(conn)?;
        let scope = ScopedTransaction::begin(conn).await?;
        let result = self.save_node_as_root_on(scope.connection(), active).await;
        scope.finish(result).await
    }

    async fn save_node_as_root_on<C>(
        &self,
        conn: &C,
        active: M::ActiveModel,
    ) -> Result<M, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let model = active
            .insert(conn)
            .await
            .map_err(ClosureTreeError::from_save)?;
        self.mark_as_root(conn, &model.id()).await?;
        Ok(model)
    }

    /// Make `node` a new child of `target`.
    ///
    /// `node` inherits every ancestor row of `target` one level deeper, plus
    /// its own self row. Returns the number of closure rows inserted; `0`
    /// means `target` is not part of any tree.
    #[instrument(skip_all, fields(table = %self.config().closure_table(), target = ?target, node = ?node))]
    pub async fn append_to<C>(
        &self,
        conn: &C,
        target: &M::Id,
        node: &M::Id,
    ) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let config = self.config();
        let table = quote(config.closure_table());
        let parent = quote(config.parent_attribute());
        let child = quote(config.child_attribute());
        let depth = quote(config.depth_attribute());
        let node_param = placeholder(backend, 1);
        let target_param = placeholder(backend, 2);

        let sql = format!(
            "INSERT INTO {table} ({parent}, {child}, {depth}) \
             SELECT {parent}, {node_param}, {depth} + 1 FROM {table} WHERE {child} = {target_param} \
             UNION ALL \
             SELECT {node_param}, {node_param}, 0 WHERE EXISTS \
             (SELECT 1 FROM {table} WHERE {parent} = {target_param} AND {child} = {target_param})"
        );
        let result = conn
            .execute(Statement::from_sql_and_values(
                backend,
                sql,
                vec![M::id_to_value(node), M::id_to_value(target)],
            ))
            .await?;

        let inserted = result.rows_affected();
        if inserted == 0 {
            warn!("append target has no closure rows");
        } else {
            debug!(inserted, "appended node");
        }
        Ok(inserted)
    }

    /// Append `child` under `parent`; the mirror image of [`Self::append_to`].
    pub async fn append<C>(
        &self,
        conn: &C,
        parent: &M::Id,
        child: &M::Id,
    ) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        self.append_to(conn, parent, child).await
    }

    /// Re-parent the subtree rooted at `node` under `target`.
    ///
    /// Rows inside the subtree keep their depths; rows linking the subtree to
    /// its former ancestors are replaced by rows linking it to `target` and
    /// every ancestor of `target`.
    ///
    /// `node` may be a root: it has no external links to sever, and the whole
    /// tree is grafted under `target`. Only a node without a self row fails
    /// with [`ClosureTreeError::NodeNotInTree`].
    #[instrument(skip_all, fields(table = %self.config().closure_table(), target = ?target, node = ?node))]
    pub async fn move_to<C>(
        &self,
        conn: &C,
        target: &M::Id,
        node: &M::Id,
    ) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        Self::ensure_supported(conn)?;
        let scope = ScopedTransaction::begin(conn).await?;
        let result = self.move_to_on(scope.connection(), target, node).await;
        if let Err(err) = &result {
            warn!(error = %err, "move rejected");
        }
        scope.finish(result).await
    }

    async fn move_to_on<C>(
        &self,
        conn: &C,
        target: &M::Id,
        node: &M::Id,
    ) -> Result<(), ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let backend = conn.get_database_backend();
        let config = self.config();

        if !self.contains(conn, node).await? {
            return Err(ClosureTreeError::NodeNotInTree);
        }
        if self.is_descendant_of(conn, node, target).await? {
            return Err(ClosureTreeError::CyclicMove);
        }

        let subtree = self.subtree_of(node);
        let sever = Query::delete()
            .from_table(config.table_iden())
            .and_where(Expr::col(config.child_iden()).in_subquery(subtree.clone()))
            .and_where(Expr::col(config.parent_iden()).not_in_subquery(subtree))
            .to_owned();
        let severed = conn.execute(backend.build(&sever)).await?.rows_affected();
        debug!(severed, "detached subtree from former ancestors");

        let upper = Alias::new("u");
        let below = Alias::new("b");
        let links = Query::select()
            .column((upper.clone(), config.parent_iden()))
            .column((below.clone(), config.child_iden()))
            .expr(
                Expr::col((upper.clone(), config.depth_iden()))
                    .add(Expr::col((below.clone(), config.depth_iden())).add(1)),
            )
            .from_as(config.table_iden(), upper.clone())
            .join_as(
                JoinType::InnerJoin,
                config.table_iden(),
                below.clone(),
                Expr::col((below, config.parent_iden())).eq(M::id_to_value(node)),
            )
            .and_where(Expr::col((upper, config.child_iden())).eq(M::id_to_value(target)))
            .to_owned();
        let mut reattach = Query::insert();
        reattach
            .into_table(config.table_iden())
            .columns([config.parent_iden(), config.child_iden(), config.depth_iden()])
            .select_from(links)?;
        let attached = conn.execute(backend.build(&reattach)).await?.rows_affected();
        if attached == 0 {
            return Err(ClosureTreeError::TargetNotInTree);
        }
        debug!(attached, "attached subtree under target");
        Ok(())
    }

    /// Delete `id` and its whole subtree, closure rows and entity rows alike.
    ///
    /// Returns the number of entity rows deleted, `0` when `id` is not in a tree.
    #[instrument(skip_all, fields(table = %self.config().closure_table(), node = ?id))]
    pub async fn delete_node<C>(&self, conn: &C, id: &M::Id) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let deleted = match Self::ensure_supported(conn)? {
            DbBackend::Postgres => self.delete_node_postgres(conn, id).await?,
            _ => {
                let scope = ScopedTransaction::begin(conn).await?;
                let result = self.delete_node_in_steps(scope.connection(), id).await;
                scope.finish(result).await?
            }
        };
        debug!(deleted, "deleted subtree");
        Ok(deleted)
    }

    /// One statement: the closure delete feeds the entity delete through a CTE.
    async fn delete_node_postgres<C>(&self, conn: &C, id: &M::Id) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let config = self.config();
        let table = quote(config.closure_table());
        let parent = quote(config.parent_attribute());
        let child = quote(config.child_attribute());
        let entity = entity_table::<M>();
        let pk = quote(M::id_column().as_str());

        let sql = format!(
            "WITH doomed AS (\
             DELETE FROM {table} WHERE {child} IN (SELECT {child} FROM {table} WHERE {parent} = $1) \
             RETURNING {child}) \
             DELETE FROM {entity} WHERE {pk} IN (SELECT {child} FROM doomed)"
        );
        let result = conn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                vec![M::id_to_value(id)],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    /// Members are collected while the closure rows still describe the
    /// subtree. Closure rows go before entity rows so closure columns that
    /// reference the entity table without `ON DELETE CASCADE` never dangle.
    async fn delete_node_in_steps<C>(&self, conn: &C, id: &M::Id) -> Result<u64, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let backend = conn.get_database_backend();
        let config = self.config();

        let members: Vec<Value> = M::Entity::find()
            .filter(M::id_column().in_subquery(self.subtree_of(id)))
            .all(conn)
            .await?
            .iter()
            .map(|model| M::id_to_value(&model.id()))
            .collect();

        let closure = Query::delete()
            .from_table(config.table_iden())
            .and_where(Expr::col(config.child_iden()).in_subquery(self.subtree_of(id)))
            .to_owned();
        let severed = conn.execute(backend.build(&closure)).await?.rows_affected();
        debug!(severed, members = members.len(), "removed subtree closure rows");

        if members.is_empty() {
            return Ok(0);
        }
        let entities = M::Entity::delete_many()
            .filter(M::id_column().is_in(members))
            .exec(conn)
            .await?
            .rows_affected;
        Ok(entities)
    }

    /// Whether `id` has its self row, i.e. belongs to a tree.
    pub async fn contains<C>(&self, conn: &C, id: &M::Id) -> Result<bool, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        self.is_descendant_of(conn, id, id).await
    }

    /// Whether a closure row `(ancestor, node, *)` exists. A node counts as its
    /// own descendant.
    pub async fn is_descendant_of<C>(
        &self,
        conn: &C,
        ancestor: &M::Id,
        node: &M::Id,
    ) -> Result<bool, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let config = self.config();
        let probe = Query::select()
            .expr(Expr::val(1))
            .from(config.table_iden())
            .and_where(Expr::col(config.parent_iden()).eq(M::id_to_value(ancestor)))
            .and_where(Expr::col(config.child_iden()).eq(M::id_to_value(node)))
            .limit(1)
            .to_owned();
        Ok(conn.query_one(backend.build(&probe)).await?.is_some())
    }

    /// Whether `id` currently has no children.
    pub async fn is_leaf<C>(&self, conn: &C, id: &M::Id) -> Result<bool, ClosureTreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let config = self.config();
        let probe = Query::select()
            .expr(Expr::val(1))
            .from(config.table_iden())
            .and_where(Expr::col(config.parent_iden()).eq(M::id_to_value(id)))
            .and_where(Expr::col(config.child_iden()).ne(M::id_to_value(id)))
            .limit(1)
            .to_owned();
        Ok(conn.query_one(backend.build(&probe)).await?.is_none())
    }

    /// `SELECT child FROM closure WHERE parent = id`: the subtree rooted at `id`.
    fn subtree_of(&self, id: &M::Id) -> SelectStatement {
        let config = self.config();
        Query::select()
            .column(config.child_iden())
            .from(config.table_iden())
            .and_where(Expr::col(config.parent_iden()).eq(M::id_to_value(id)))
            .to_owned()
    }
}

/// Double-quoted identifier, valid for both PostgreSQL and SQLite.
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn placeholder(backend: DbBackend, index: usize) -> String {
    match backend {
        DbBackend::Postgres => format!("${index}"),
        _ => format!("?{index}"),
    }
}

fn entity_table<M: ClosureTreeModel>() -> String {
    let entity = M::Entity::default();
    match entity.schema_name() {
        Some(schema) => format!("{}.{}", quote(schema), quote(entity.table_name())),
        None => quote(entity.table_name()),
    }
}
