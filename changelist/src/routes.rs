use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::HeaderMap,
    routing::get,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use url::form_urlencoded;

use crate::config::{DisplayColumn, OrderTerm};
use crate::core::{ChangeList, ModelAdmin, Requester};
use crate::errors::ChangeListError;
use crate::filtering::{FilterSpec, QuerySummary};

/// Shared state of one admin's routes.
pub struct AdminState<A> {
    pub db: DatabaseConnection,
    pub admin: Arc<A>,
}

impl<A> Clone for AdminState<A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            admin: Arc::clone(&self.admin),
        }
    }
}

/// JSON body of a changelist page.
#[derive(Debug, Serialize)]
pub struct ChangeListResponse<M> {
    pub results: Vec<M>,
    pub count: u64,
    pub full_count: u64,
    pub page: u64,
    pub num_pages: u64,
    pub page_range: Vec<u64>,
    pub show_all: bool,
    pub can_show_all: bool,
    pub multi_page: bool,
    pub search_term: String,
    pub columns: Vec<DisplayColumn>,
    pub links: Vec<String>,
    pub editable: Vec<String>,
    pub ordering: Vec<OrderTerm>,
    pub filters: Vec<FilterSpec>,
    pub query: QuerySummary,
}

impl<M> From<ChangeList<M>> for ChangeListResponse<M> {
    fn from(cl: ChangeList<M>) -> Self {
        Self {
            count: cl.page.total_count,
            full_count: cl.full_result_count,
            page: cl.page.current_page,
            num_pages: cl.page.num_pages,
            page_range: cl.page.page_range,
            show_all: cl.page.show_all,
            can_show_all: cl.page.can_show_all,
            multi_page: cl.page.multi_page,
            results: cl.page.items,
            search_term: cl.params.search_term,
            columns: cl.config.display_columns().to_vec(),
            links: cl.config.display_links().to_vec(),
            editable: cl.config.editable_columns().to_vec(),
            ordering: cl.ordering,
            filters: cl.filter_specs,
            query: cl.query,
        }
    }
}

/// Router serving the changelist of `admin` at `GET /`.
///
/// Insert a [`Requester`] into the request extensions (for example from an
/// authentication layer) to run the per-user hooks; requests without one
/// are anonymous.
pub fn changelist_router<A>(db: DatabaseConnection, admin: A) -> Router
where
    A: ModelAdmin + 'static,
    <A::EntityType as EntityTrait>::Model: Serialize,
{
    Router::new()
        .route("/", get(changelist_handler::<A>))
        .with_state(AdminState {
            db,
            admin: Arc::new(admin),
        })
}

/// Run the changelist for the request's query string.
///
/// # Errors
///
/// Any pipeline error, rendered through [`ChangeListError`]'s `IntoResponse`.
pub async fn changelist_handler<A>(
    State(state): State<AdminState<A>>,
    request: Request,
) -> Result<(HeaderMap, Json<ChangeListResponse<<A::EntityType as EntityTrait>::Model>>), ChangeListError>
where
    A: ModelAdmin + 'static,
    <A::EntityType as EntityTrait>::Model: Serialize,
{
    let requester = request
        .extensions()
        .get::<Requester>()
        .cloned()
        .unwrap_or_default();
    let pairs: Vec<(String, String)> = request
        .uri()
        .query()
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let cl = state.admin.changelist(&state.db, &requester, pairs).await?;
    let headers = cl.page.content_range(A::RESOURCE_NAME_PLURAL);
    Ok((headers, Json(ChangeListResponse::from(cl))))
}
