use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use serde::{Deserialize, Serialize};

use super::traits::ModelAdmin;
use crate::config::{Direction, ListConfiguration, OrderTerm};
use crate::errors::ChangeListError;
use crate::filtering::{
    FilterSpec, PageResult, Paginator, QuerySummary, build_filter_specs, compose, paginate,
    resolve_request_ordering,
};
use crate::lookup::RequestParameters;

/// Who is asking for the changelist.
///
/// Authentication is someone else's job; routes read this from the request
/// extensions and fall back to [`Requester::anonymous`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub username: String,
    pub is_superuser: bool,
}

impl Requester {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_superuser: false,
        }
    }

    #[must_use]
    pub fn superuser(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_superuser: true,
        }
    }
}

/// Everything one changelist request produced.
#[derive(Debug, Clone)]
pub struct ChangeList<M> {
    /// Configuration after the per-requester display hooks
    pub config: ListConfiguration,
    pub params: RequestParameters,
    pub filter_specs: Vec<FilterSpec>,
    pub ordering: Vec<OrderTerm>,
    pub query: QuerySummary,
    pub paginator: Paginator,
    pub page: PageResult<M>,
    /// Rows in the base queryset, ignoring request filters and search
    pub full_result_count: u64,
}

impl<M> ChangeList<M> {
    /// Query string for a link from this changelist; see
    /// [`RequestParameters::get_query_string`].
    #[must_use]
    pub fn get_query_string(&self, new: &[(&str, Option<&str>)], remove: &[&str]) -> String {
        self.params.get_query_string(new, remove)
    }

    /// Sort direction of each ordered display column, by column index.
    #[must_use]
    pub fn ordering_field_columns(&self) -> Vec<(usize, Direction)> {
        let mut columns = Vec::new();
        for term in &self.ordering {
            let index = self
                .config
                .display_columns()
                .iter()
                .position(|c| c.order_field.as_deref() == Some(term.field.as_str()));
            if let Some(index) = index {
                if !columns.iter().any(|(i, _)| *i == index) {
                    columns.push((index, term.direction));
                }
            }
        }
        columns
    }
}

/// Parse, build filter specs, compose and paginate, in that order.
///
/// The first failing stage aborts the request.
///
/// # Errors
///
/// `ImproperlyConfigured` from the display hooks, `InvalidLookup` from the
/// filter specs, `IncorrectLookupParameters` from composition or pagination,
/// and `Database` from any query.
pub async fn run_changelist<A>(
    admin: &A,
    db: &DatabaseConnection,
    requester: &Requester,
    pairs: Vec<(String, String)>,
) -> Result<ChangeList<<A::EntityType as EntityTrait>::Model>, ChangeListError>
where
    A: ModelAdmin + ?Sized,
{
    let config = admin.effective_config(requester)?;
    let params = RequestParameters::parse(pairs, &config);
    tracing::debug!(
        resource = A::RESOURCE_NAME_PLURAL,
        user = %requester.username,
        filters = params.active_filters.len(),
        search = %params.search_term,
        page = ?params.requested_page,
        show_all = params.show_all,
        "Changelist request parsed"
    );

    let base = admin.queryset(requester);
    let filter_specs = build_filter_specs(db, &base, &config, &params).await?;

    let requested_ordering =
        resolve_request_ordering(&config, params.order.as_deref(), params.order_type.as_deref())?;
    let composed = compose(
        base.clone(),
        &config,
        &params.active_filters,
        &params.search_term,
        requested_ordering,
    )?;

    let paginator = admin.get_paginator(&config);
    let page = paginate(
        db,
        &composed.select,
        &paginator,
        &params.requested_page,
        params.show_all,
    )
    .await?;

    let full_result_count = if composed.filtered {
        base.count(db).await?
    } else {
        page.total_count
    };
    tracing::debug!(
        resource = A::RESOURCE_NAME_PLURAL,
        total_count = page.total_count,
        full_result_count,
        current_page = page.current_page,
        distinct = composed.distinct,
        "Changelist page ready"
    );

    Ok(ChangeList {
        query: composed.summary(),
        ordering: composed.ordering,
        config,
        params,
        filter_specs,
        paginator,
        page,
        full_result_count,
    })
}
