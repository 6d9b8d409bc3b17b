use closure_table::{ClosureTreeError, ClosureTreeNode, ClosureTreeRepository, TreeQuery};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

mod entity {
    pub mod node {
        use closure_table::ClosureTreeModelDerive as ClosureTreeModel;
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel, ClosureTreeModel)]
        #[sea_orm(table_name = "nodes")]
        #[closure_tree(
            closure_table = "node_hierarchies",
            parent_attribute = "ancestor_id",
            child_attribute = "descendant_id",
            depth_attribute = "generations",
            leaf_parameter = "is_leaf"
        )]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub name: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::node;

type Repo = ClosureTreeRepository<node::Model>;

#[tokio::test]
async fn closure_operations_against_postgres() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = setup_database().await? else {
        eprintln!("skipping: CLOSURE_TREE_TEST_DATABASE_URL / DATABASE_URL not set");
        return Ok(());
    };
    reset_tables(&db).await?;

    let repo = Repo::new();
    let root = repo.save_node_as_root(&db, named("root")).await?;
    let child = named("child").insert(&db).await?;
    let leaf = named("leaf").insert(&db).await?;
    let sibling = named("sibling").insert(&db).await?;
    root.append(&db, &child).await?;
    child.append(&db, &leaf).await?;
    root.append(&db, &sibling).await?;

    let path: Vec<String> = leaf.path().all(&db).await?.into_iter().map(|n| n.name).collect();
    assert_eq!(path, vec!["root", "child", "leaf"]);

    let mut flags: Vec<(String, bool)> = TreeQuery::<node::Model>::new()
        .leaf()
        .children_of(&root.id)
        .all_with_leaf(&db)
        .await?
        .into_iter()
        .map(|n| (n.model.name.clone(), n.is_leaf()))
        .collect();
    flags.sort();
    assert_eq!(
        flags,
        vec![("child".to_string(), false), ("sibling".to_string(), true)]
    );

    let path_with_leaf = TreeQuery::<node::Model>::new()
        .path_of(&leaf.id)
        .leaf()
        .all_with_leaf(&db)
        .await?;
    assert_eq!(path_with_leaf.len(), 3);
    assert!(path_with_leaf[2].is_leaf());

    assert!(matches!(
        repo.move_to(&db, &leaf.id, &child.id).await,
        Err(ClosureTreeError::CyclicMove)
    ));
    child.move_to(&db, &sibling.id).await?;
    let path: Vec<i32> = leaf.path().all(&db).await?.into_iter().map(|n| n.id).collect();
    assert_eq!(path, vec![root.id, sibling.id, child.id, leaf.id]);

    assert_eq!(sibling.delete_node(&db).await?, 3);
    let remaining: Vec<i32> = node::Entity::find()
        .all(&db)
        .await?
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(remaining, vec![root.id]);
    assert!(repo.is_leaf(&db, &root.id).await?);

    Ok(())
}

fn named(name: &str) -> node::ActiveModel {
    node::ActiveModel {
        name: ActiveValue::Set(name.to_owned()),
        ..Default::default()
    }
}

async fn setup_database() -> Result<Option<DatabaseConnection>, sea_orm::DbErr> {
    let url = match std::env::var("CLOSURE_TREE_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => return Ok(None),
    };

    Database::connect(url).await.map(Some)
}

async fn reset_tables(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    db.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL
        );
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
        CREATE TABLE IF NOT EXISTS node_hierarchies (
            ancestor_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            descendant_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            generations INTEGER NOT NULL,
            PRIMARY KEY (ancestor_id, descendant_id)
        );
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "TRUNCATE TABLE node_hierarchies, nodes RESTART IDENTITY CASCADE;",
    ))
    .await?;

    Ok(())
}
