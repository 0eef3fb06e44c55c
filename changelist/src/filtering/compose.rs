use sea_orm::{EntityTrait, QueryFilter, QuerySelect, QueryTrait, Select, sea_query::SimpleExpr};
use serde::Serialize;

use super::conditions::{apply_filters, apply_joins, field_expr, relations_for};
use super::search::{build_search_condition, search_relations};
use super::sort::{apply_ordering, effective_ordering, ordering_relations};
use crate::config::{Cardinality, ListConfiguration, OrderTerm};
use crate::errors::ChangeListError;
use crate::lookup::ActiveFilter;

/// A filtered, searched, ordered and (when needed) deduplicated record set.
///
/// Nothing has been executed yet; the paginator counts and slices `select`.
#[derive(Debug, Clone)]
pub struct ComposedQuery<E: EntityTrait> {
    pub select: Select<E>,
    /// `SELECT DISTINCT` was applied
    pub distinct: bool,
    pub ordering: Vec<OrderTerm>,
    /// Relations joined, in join order
    pub joins: Vec<String>,
    /// A filter or a search term narrowed the set
    pub filtered: bool,
}

/// Summary of a composed query, without the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySummary {
    pub distinct: bool,
    pub ordering: Vec<OrderTerm>,
    pub joins: Vec<String>,
    pub filtered: bool,
}

impl<E: EntityTrait> ComposedQuery<E> {
    #[must_use]
    pub fn summary(&self) -> QuerySummary {
        QuerySummary {
            distinct: self.distinct,
            ordering: self.ordering.clone(),
            joins: self.joins.clone(),
            filtered: self.filtered,
        }
    }
}

/// Compose the changelist query over `base`.
///
/// Filters are ANDed, then the search term narrows further, then DISTINCT is
/// applied if either crosses a one-to-many or many-to-many relation, then the
/// ordering is applied. Each relation is LEFT JOINed at most once, under its
/// own aliases. Any ORDER BY already on `base` is replaced.
///
/// # Errors
///
/// Returns `IncorrectLookupParameters` if a filter refers to a field outside
/// `list_filter` or carries a value its field cannot hold.
pub fn compose<E: EntityTrait>(
    mut base: Select<E>,
    config: &ListConfiguration,
    active_filters: &[ActiveFilter],
    search_term: &str,
    requested_ordering: Option<OrderTerm>,
) -> Result<ComposedQuery<E>, ChangeListError> {
    let condition = apply_filters(config, active_filters)?;
    let search = build_search_condition(config, search_term);

    let mut relation_names: Vec<&str> = active_filters
        .iter()
        .filter_map(|filter| config.field(&filter.field))
        .filter_map(|field| field.relation_name())
        .collect();
    if search.is_some() {
        relation_names.extend(search_relations(config));
    }
    let distinct = relation_names
        .iter()
        .filter_map(|name| config.relation(name))
        .any(|relation| relation.cardinality.needs_distinct());

    let ordering = effective_ordering(config, requested_ordering);
    relation_names.extend(ordering_relations(config, &ordering));
    let relations = relations_for(config, &relation_names);

    QueryTrait::query(&mut base).clear_order_by();
    let mut select = apply_joins(base, &relations).filter(condition);
    let filtered = !active_filters.is_empty() || search.is_some();
    if let Some(search) = search {
        select = select.filter(search);
    }
    if distinct {
        select = select.distinct();
        // DISTINCT needs every ORDER BY expression in the select list
        for (index, term) in ordering.iter().enumerate() {
            let Some(field) = config.field(&term.field) else {
                continue;
            };
            let joined = config
                .relation_of(field)
                .is_some_and(|r| r.cardinality == Cardinality::ManyToOne);
            if joined {
                let expr: SimpleExpr = field_expr(config, field).into();
                select = select.column_as(expr, format!("order_{index}"));
            }
        }
    }
    let select = apply_ordering(select, config, &ordering);

    let joins: Vec<String> = relations.iter().map(|r| r.name.clone()).collect();
    tracing::debug!(
        joins = ?joins,
        distinct,
        filtered,
        ordering = ?ordering,
        "Composed changelist query"
    );

    Ok(ComposedQuery {
        select,
        distinct,
        ordering,
        joins,
        filtered,
    })
}
