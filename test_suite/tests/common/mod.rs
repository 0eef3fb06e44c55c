use axum::Router;
use changelist::{
    Field, FieldKind, ListConfiguration, ListOptions, ModelAdmin, Paginator, Relation, Requester,
    changelist_router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Schema, Select,
    Set,
};
use sea_orm_migration::prelude::*;

pub mod models;

use models::{band, band_genre, child, genre, group, membership, musician, parent};

// Helper function to get database URL from environment or default to SQLite
fn get_test_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Persistent databases keep tables between runs
async fn cleanup_test_tables(db: &DatabaseConnection) {
    for table in MIGRATED_TABLES.iter().chain(["seaql_migrations"].iter()) {
        let _ = db
            .execute_unprepared(&format!("DROP TABLE IF EXISTS {table}"))
            .await;
    }
}

#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let database_url = get_test_database_url();
    let db = Database::connect(&database_url).await?;

    if !database_url.starts_with("sqlite::memory:") {
        cleanup_test_tables(&db).await;
    }

    Migrator::up(&db, None).await?;
    Ok(db)
}

// Dependents first, so drops never trip a foreign key
const MIGRATED_TABLES: [&str; 8] = [
    "membership",
    "music_group",
    "musician",
    "band_genre",
    "band",
    "genre",
    "child",
    "parent",
];

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateChangelistTables)]
    }
}

pub struct CreateChangelistTables;

impl MigrationName for CreateChangelistTables {
    fn name(&self) -> &'static str {
        "m20250101_000001_create_changelist_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateChangelistTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        // Referenced tables first
        manager.create_table(schema.create_table_from_entity(parent::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(child::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(genre::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(band::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(band_genre::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(musician::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(group::Entity)).await?;
        manager.create_table(schema.create_table_from_entity(membership::Entity)).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in MIGRATED_TABLES {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

#[allow(dead_code)]
pub async fn create_parent(db: &DatabaseConnection, name: &str) -> parent::Model {
    parent::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert parent")
}

#[allow(dead_code)]
pub async fn create_child(
    db: &DatabaseConnection,
    parent_id: Option<i32>,
    name: &str,
    age: Option<i32>,
) -> child::Model {
    child::ActiveModel {
        parent_id: Set(parent_id),
        name: Set(name.to_string()),
        age: Set(age),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert child")
}

#[allow(dead_code)]
pub async fn create_genre(db: &DatabaseConnection, name: &str) -> genre::Model {
    genre::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert genre")
}

#[allow(dead_code)]
pub async fn create_band(db: &DatabaseConnection, name: &str, nr_of_members: i32) -> band::Model {
    band::ActiveModel {
        name: Set(name.to_string()),
        nr_of_members: Set(nr_of_members),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert band")
}

#[allow(dead_code)]
pub async fn add_band_genre(db: &DatabaseConnection, band_id: i32, genre_id: i32) {
    band_genre::ActiveModel {
        band_id: Set(band_id),
        genre_id: Set(genre_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert band genre");
}

#[allow(dead_code)]
pub async fn create_group(db: &DatabaseConnection, name: &str) -> group::Model {
    group::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert group")
}

#[allow(dead_code)]
pub async fn create_musician(db: &DatabaseConnection, name: &str) -> musician::Model {
    musician::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert musician")
}

#[allow(dead_code)]
pub async fn add_membership(db: &DatabaseConnection, group_id: i32, music_id: i32, role: &str) {
    membership::ActiveModel {
        group_id: Set(group_id),
        music_id: Set(music_id),
        role: Set(Some(role.to_string())),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert membership");
}

/// Split an unencoded `a=1&b=2` query into pairs.
#[allow(dead_code)]
pub fn pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

// =============================================================================
// CONFIGURATIONS
// =============================================================================

#[allow(dead_code)]
pub fn parent_config(options: ListOptions) -> ListConfiguration {
    ListConfiguration::builder("parent", "id", FieldKind::Integer)
        .relation(Relation::one_to_many("child", "child").via(|| parent::Relation::Child.def()))
        .field(Field::column("name", FieldKind::Text))
        .field(Field::related_column("child__name", "child", "name", FieldKind::Text))
        .field(Field::related_column("child__age", "child", "age", FieldKind::Integer).nullable())
        .options(options)
        .build()
        .expect("Invalid parent configuration")
}

#[allow(dead_code)]
pub fn child_config(options: ListOptions) -> ListConfiguration {
    ListConfiguration::builder("child", "id", FieldKind::Integer)
        .relation(
            Relation::many_to_one("parent", "parent")
                .via(|| child::Relation::Parent.def())
                .label("name")
                .nullable(),
        )
        .field(Field::column("name", FieldKind::Text))
        .field(Field::column("age", FieldKind::Integer).nullable())
        .field(Field::relation("parent", "parent"))
        .field(Field::related_column("parent__name", "parent", "name", FieldKind::Text).nullable())
        .options(options)
        .build()
        .expect("Invalid child configuration")
}

#[allow(dead_code)]
pub fn band_config(options: ListOptions) -> ListConfiguration {
    ListConfiguration::builder("band", "id", FieldKind::Integer)
        .relation(
            Relation::many_to_many("genres", "genre")
                .via(|| band::Relation::BandGenre.def())
                .via(|| band_genre::Relation::Genre.def())
                .label("name"),
        )
        .field(Field::column("name", FieldKind::Text))
        .field(Field::column("nr_of_members", FieldKind::Integer))
        .field(Field::relation("genres", "genres"))
        .field(Field::related_column("genres__name", "genres", "name", FieldKind::Text))
        .options(options)
        .build()
        .expect("Invalid band configuration")
}

#[allow(dead_code)]
pub fn group_config(options: ListOptions) -> ListConfiguration {
    ListConfiguration::builder("music_group", "id", FieldKind::Integer)
        .relation(
            Relation::many_to_many("members", "musician")
                .via(|| group::Relation::Membership.def())
                .via(|| membership::Relation::Musician.def())
                .label("name"),
        )
        .field(Field::column("name", FieldKind::Text))
        .field(Field::relation("members", "members"))
        .field(Field::related_column("members__name", "members", "name", FieldKind::Text))
        .options(options)
        .build()
        .expect("Invalid group configuration")
}

// =============================================================================
// ADMINS
// =============================================================================

pub struct ParentAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl ParentAdmin {
    pub fn new() -> Self {
        Self {
            config: parent_config(ListOptions {
                list_filter: vec!["child__name".into()],
                search_fields: vec!["child__name".into()],
                ..Default::default()
            }),
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for ParentAdmin {
    type EntityType = parent::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "parents";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }
}

pub struct ChildAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl ChildAdmin {
    pub fn new() -> Self {
        Self::with_options(ListOptions {
            list_display: vec!["name".into(), "parent".into()],
            list_filter: vec!["parent".into(), "age".into()],
            search_fields: vec!["name".into(), "parent__name".into()],
            list_per_page: 10,
            ..Default::default()
        })
    }

    pub fn with_options(options: ListOptions) -> Self {
        Self {
            config: child_config(options),
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for ChildAdmin {
    type EntityType = child::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "children";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }
}

/// Only lists children whose name contains "filtered".
pub struct FilteredChildAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl FilteredChildAdmin {
    pub fn new() -> Self {
        Self {
            config: ChildAdmin::new().config,
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for FilteredChildAdmin {
    type EntityType = child::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "children";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }

    fn queryset(&self, _requester: &Requester) -> Select<child::Entity> {
        child::Entity::find().filter(child::Column::Name.contains("filtered"))
    }
}

/// Base queryset that joins `parent` itself, hides one family and carries
/// its own ordering.
pub struct JoinedQuerysetChildAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl JoinedQuerysetChildAdmin {
    pub fn new() -> Self {
        Self {
            config: ChildAdmin::new().config,
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for JoinedQuerysetChildAdmin {
    type EntityType = child::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "children";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }

    fn queryset(&self, _requester: &Requester) -> Select<child::Entity> {
        child::Entity::find()
            .join(JoinType::LeftJoin, child::Relation::Parent.def())
            .filter(parent::Column::Name.ne("Hidden"))
            .order_by_asc(child::Column::Id)
    }
}

/// Five rows per page, folding a last page of two rows or fewer.
pub struct CustomPaginationAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl CustomPaginationAdmin {
    pub fn new() -> Self {
        Self {
            config: ChildAdmin::new().config,
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for CustomPaginationAdmin {
    type EntityType = child::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "children";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }

    fn get_paginator(&self, config: &ListConfiguration) -> Paginator {
        Paginator {
            per_page: 5,
            orphans: 2,
            allow_empty_first_page: true,
            show_all_threshold: config.show_all_threshold(),
        }
    }
}

/// Hides the parent column from the "noparents" user.
pub struct DynamicListDisplayChildAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl DynamicListDisplayChildAdmin {
    pub fn new() -> Self {
        Self {
            config: ChildAdmin::new().config,
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for DynamicListDisplayChildAdmin {
    type EntityType = child::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "children";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }

    fn get_list_display(&self, requester: &Requester) -> Vec<String> {
        let mut display = self.config.display_names();
        if requester.username == "noparents" {
            display.retain(|name| name != "parent");
        }
        display
    }
}

/// Reorders the display columns and links the age column.
pub struct DynamicListDisplayLinksChildAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl DynamicListDisplayLinksChildAdmin {
    pub fn new() -> Self {
        Self {
            config: ChildAdmin::new().config,
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for DynamicListDisplayLinksChildAdmin {
    type EntityType = child::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "children";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }

    fn get_list_display(&self, _requester: &Requester) -> Vec<String> {
        vec!["parent".into(), "name".into(), "age".into()]
    }

    fn get_list_display_links(&self, _requester: &Requester, _list_display: &[String]) -> Vec<String> {
        vec!["age".into()]
    }
}

pub struct BandAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl BandAdmin {
    pub fn new() -> Self {
        Self {
            config: band_config(ListOptions {
                list_display: vec!["name".into(), "nr_of_members".into()],
                list_filter: vec!["genres".into()],
                search_fields: vec!["name".into(), "genres__name".into()],
                ..Default::default()
            }),
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for BandAdmin {
    type EntityType = band::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "bands";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }
}

pub struct GroupAdmin {
    pub config: ListConfiguration,
}

#[allow(dead_code)]
impl GroupAdmin {
    pub fn new() -> Self {
        Self {
            config: group_config(ListOptions {
                list_filter: vec!["members".into()],
                search_fields: vec!["members__name".into()],
                ..Default::default()
            }),
        }
    }
}

#[async_trait::async_trait]
impl ModelAdmin for GroupAdmin {
    type EntityType = group::Entity;
    const RESOURCE_NAME_PLURAL: &'static str = "groups";

    fn list_config(&self) -> &ListConfiguration {
        &self.config
    }
}

#[allow(dead_code)]
pub fn setup_test_app(db: &DatabaseConnection) -> Router {
    Router::new()
        .nest("/children", changelist_router(db.clone(), ChildAdmin::new()))
        .nest("/bands", changelist_router(db.clone(), BandAdmin::new()))
        .nest(
            "/filtered_children",
            changelist_router(db.clone(), FilteredChildAdmin::new()),
        )
}

#[allow(dead_code)]
pub fn requester(username: &str) -> Requester {
    Requester::user(username)
}
