use sea_orm::{EntityTrait, QueryOrder, Select, sea_query::SimpleExpr};

use super::conditions::field_expr;
use crate::config::{Direction, ListConfiguration, OrderTerm};
use crate::errors::ChangeListError;

/// Resolve the request's `o` / `ot` values to an ordering term.
///
/// `o` is the zero-based index of a display column. The column must be a
/// sortable field, or a computed column with an order field. `ot` defaults
/// to ascending.
///
/// # Errors
///
/// Returns `IncorrectLookupParameters` for a non-numeric or out-of-range
/// index, an unsortable column, or an order type other than `asc`/`desc`.
pub fn resolve_request_ordering(
    config: &ListConfiguration,
    order: Option<&str>,
    order_type: Option<&str>,
) -> Result<Option<OrderTerm>, ChangeListError> {
    let direction = match order_type {
        None => Direction::Asc,
        Some(raw) => Direction::parse(raw).ok_or_else(|| {
            ChangeListError::incorrect_lookup(format!("Invalid order type '{raw}'"))
        })?,
    };
    let Some(raw) = order else {
        return Ok(None);
    };

    let column = raw
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|index| config.display_columns().get(index))
        .ok_or_else(|| ChangeListError::incorrect_lookup(format!("Invalid order column '{raw}'")))?;

    let field = column
        .order_field
        .as_deref()
        .and_then(|name| config.field(name))
        .filter(|field| config.is_sortable(field))
        .ok_or_else(|| {
            ChangeListError::incorrect_lookup(format!("Column '{}' is not sortable", column.name))
        })?;

    Ok(Some(OrderTerm {
        field: field.name.clone(),
        direction,
    }))
}

/// The ordering actually applied to the query.
///
/// A requested ordering replaces the configured default; without either the
/// newest primary keys come first. A primary-key ascending term is appended
/// unless the primary key already orders the set, so pages never overlap.
#[must_use]
pub fn effective_ordering(config: &ListConfiguration, requested: Option<OrderTerm>) -> Vec<OrderTerm> {
    let mut ordering = match requested {
        Some(term) => vec![term],
        None if config.ordering_default().is_empty() => vec![OrderTerm::desc(config.pk())],
        None => config.ordering_default().to_vec(),
    };
    if !ordering.iter().any(|term| term.field == config.pk()) {
        ordering.push(OrderTerm::asc(config.pk()));
    }
    ordering
}

/// Relations that ordering terms join across.
pub(crate) fn ordering_relations<'a>(config: &'a ListConfiguration, ordering: &[OrderTerm]) -> Vec<&'a str> {
    ordering
        .iter()
        .filter_map(|term| config.field(&term.field))
        .filter_map(|field| field.relation_name())
        .collect()
}

/// Apply ORDER BY for each term, in order.
pub(crate) fn apply_ordering<E: EntityTrait>(
    mut select: Select<E>,
    config: &ListConfiguration,
    ordering: &[OrderTerm],
) -> Select<E> {
    for term in ordering {
        if let Some(field) = config.field(&term.field) {
            let expr: SimpleExpr = field_expr(config, field).into();
            select = select.order_by(expr, term.direction.into());
        }
    }
    select
}
