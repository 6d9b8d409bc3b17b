use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, EntityTrait, FromQueryResult, IntoActiveModel, Value,
};

use crate::config::ClosureTreeConfig;

/// Trait implemented by SeaORM `Model` types whose rows are organised as a
/// tree through a closure table.
///
/// Implementations are normally provided by the `#[derive(ClosureTreeModel)]` macro.
pub trait ClosureTreeModel:
    Clone + Send + Sync + 'static + IntoActiveModel<Self::ActiveModel> + FromQueryResult
{
    type Entity: EntityTrait<Model = Self>;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send;
    type Id: Clone + Send + Sync + std::fmt::Debug + 'static;

    fn closure_tree_config() -> &'static ClosureTreeConfig;

    fn id(&self) -> Self::Id;
    fn id_to_value(id: &Self::Id) -> Value;

    /// Primary-key column of the entity table, joined against the closure columns.
    fn id_column() -> <Self::Entity as EntityTrait>::Column;
}
