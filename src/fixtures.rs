//! Entities shared by the unit tests.

pub mod folder {
    use once_cell::sync::Lazy;
    use sea_orm::entity::prelude::*;

    use crate::{ClosureTreeConfig, ClosureTreeModel};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "folders")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl ClosureTreeModel for Model {
        type Entity = Entity;
        type ActiveModel = ActiveModel;
        type Id = i32;

        fn closure_tree_config() -> &'static ClosureTreeConfig {
            static CONFIG: Lazy<ClosureTreeConfig> =
                Lazy::new(|| ClosureTreeConfig::new("Folder", "folder_tree"));
            &CONFIG
        }

        fn id(&self) -> i32 {
            self.id
        }

        fn id_to_value(id: &i32) -> Value {
            Value::from(*id)
        }

        fn id_column() -> Column {
            Column::Id
        }
    }
}
