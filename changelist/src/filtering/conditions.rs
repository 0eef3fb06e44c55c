use sea_orm::{
    Condition, EntityTrait, JoinType, QuerySelect, Select,
    sea_query::{Alias, Expr, SimpleExpr},
};

use crate::config::{Field, FieldSource, ListConfiguration, Relation, parse_bool};
use crate::errors::ChangeListError;
use crate::lookup::{ActiveFilter, Lookup};

// Basic safety limits
const MAX_FIELD_VALUE_LENGTH: usize = 10_000;
const MAX_IN_VALUES: usize = 1_000;

/// Qualified column expression for a field, e.g. `"genres_1"."id"`.
///
/// Related columns are addressed through the relation's join alias.
pub(crate) fn field_expr(config: &ListConfiguration, field: &Field) -> Expr {
    match (&field.source, config.relation_of(field)) {
        (FieldSource::Column { column, .. }, Some(relation)) => {
            Expr::col((Alias::new(relation.alias()), Alias::new(column)))
        }
        (FieldSource::Column { column, .. }, None) => {
            Expr::col((Alias::new(config.table()), Alias::new(column)))
        }
        (FieldSource::Related { .. }, Some(relation)) => {
            Expr::col((Alias::new(relation.alias()), Alias::new(&relation.pk)))
        }
        (FieldSource::Related { .. }, None) => {
            Expr::col((Alias::new(config.table()), Alias::new(&field.name)))
        }
    }
}

/// LEFT JOIN each relation once, following its hops in order.
///
/// Every hop joins under the relation's own alias and each hop after the
/// first starts from the previous alias.
pub(crate) fn apply_joins<E: EntityTrait>(mut select: Select<E>, relations: &[&Relation]) -> Select<E> {
    for relation in relations {
        for (index, hop) in relation.hops.iter().enumerate() {
            let mut def = hop();
            if index > 0 {
                def.from_tbl = def.from_tbl.alias(Alias::new(relation.hop_alias(index - 1)));
            }
            select = select.join_as(JoinType::LeftJoin, def, Alias::new(relation.hop_alias(index)));
        }
    }
    select
}

/// Relations referenced by `names`, deduplicated, in registration order.
pub(crate) fn relations_for<'a>(
    config: &'a ListConfiguration,
    names: &[&str],
) -> Vec<&'a Relation> {
    config
        .relations()
        .iter()
        .filter(|relation| names.contains(&relation.name.as_str()))
        .collect()
}

fn parse_lookup_value(field: &Field, raw: &str) -> Result<sea_orm::Value, ChangeListError> {
    if raw.len() > MAX_FIELD_VALUE_LENGTH {
        return Err(ChangeListError::incorrect_lookup(format!(
            "Value for '{}' is too long",
            field.name
        )));
    }
    field.kind.parse_value(raw).ok_or_else(|| {
        ChangeListError::incorrect_lookup(format!(
            "'{raw}' is not a valid value for '{}'",
            field.name
        ))
    })
}

/// Build the expression for one active filter.
///
/// # Errors
///
/// Returns `IncorrectLookupParameters` if the field is not a `list_filter`
/// field or a value does not parse for the field's kind.
pub fn build_filter_expr(
    config: &ListConfiguration,
    filter: &ActiveFilter,
) -> Result<SimpleExpr, ChangeListError> {
    let field = config
        .filter_fields()
        .find(|f| f.name == filter.field)
        .ok_or_else(|| {
            ChangeListError::incorrect_lookup(format!("Cannot filter on '{}'", filter.param))
        })?;
    let column = field_expr(config, field);

    match &filter.lookup {
        Lookup::Exact(raw) => Ok(column.eq(parse_lookup_value(field, raw)?)),
        Lookup::In(raws) => {
            if raws.is_empty() || raws.len() > MAX_IN_VALUES {
                return Err(ChangeListError::incorrect_lookup(format!(
                    "'{}' needs between 1 and {MAX_IN_VALUES} values",
                    filter.param
                )));
            }
            let values = raws
                .iter()
                .map(|raw| parse_lookup_value(field, raw))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(column.is_in(values))
        }
        Lookup::IsNull(raw) => match parse_bool(raw) {
            Some(true) => Ok(column.is_null()),
            Some(false) => Ok(column.is_not_null()),
            None => Err(ChangeListError::incorrect_lookup(format!(
                "'{raw}' is not a valid value for '{}'",
                filter.param
            ))),
        },
    }
}

/// AND together every active filter.
///
/// # Errors
///
/// Propagates the first error from [`build_filter_expr`].
pub fn apply_filters(
    config: &ListConfiguration,
    filters: &[ActiveFilter],
) -> Result<Condition, ChangeListError> {
    filters
        .iter()
        .try_fold(Condition::all(), |condition, filter| {
            Ok(condition.add(build_filter_expr(config, filter)?))
        })
}
