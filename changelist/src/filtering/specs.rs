//! Filter specs: the choices shown for each `list_filter` field.
//!
//! Boolean fields and fields with static choices are answered from the
//! configuration alone. Relation fields and plain columns issue one
//! `SELECT DISTINCT` against the admin's base queryset, so the sidebar only
//! offers values that can actually match.
//!
//! Building the specs is also where filter values are validated: a value
//! that none of the choices offers fails with
//! [`ChangeListError::InvalidLookup`] instead of silently producing an empty
//! page.

use sea_orm::{
    ConnectionTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, Select, TryGetable,
    sea_query::{Alias, Expr, SimpleExpr},
};
use serde::Serialize;
use uuid::Uuid;

use super::conditions::{apply_joins, field_expr};
use crate::config::{Cardinality, Field, FieldKind, FieldSource, ListConfiguration, parse_bool};
use crate::errors::ChangeListError;
use crate::lookup::{ActiveFilter, Lookup, RequestParameters};

const VALUE_ALIAS: &str = "filter_value";
const LABEL_ALIAS: &str = "filter_label";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Yes / No (/ Unknown)
    Boolean,
    /// Static choices declared on the field
    Choices,
    /// Related rows referenced by the base queryset
    Related,
    /// Distinct stored values of a column
    AllValues,
}

/// What selecting a choice filters on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ChoiceValue {
    /// No filter on this field
    All,
    /// Canonical form of the value
    Exact(String),
    /// The field is null
    IsNull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChoice {
    pub value: ChoiceValue,
    pub display: String,
    pub selected: bool,
    /// Link that applies this choice, keeping the rest of the request
    pub query_string: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub field: String,
    pub title: String,
    pub kind: FilterKind,
    /// "All" first, then the field's values
    pub choices: Vec<FilterChoice>,
}

impl FilterSpec {
    /// The selected choice, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&FilterChoice> {
        self.choices.iter().find(|c| c.selected)
    }
}

/// Build one spec per `list_filter` field, in configuration order.
///
/// `base` is the admin's base queryset; values are enumerated from it before
/// any request filter or search is applied.
///
/// # Errors
///
/// Returns `InvalidLookup` when an active lookup matches none of its field's
/// choices, and `Database` if enumerating values fails.
pub async fn build_filter_specs<E>(
    db: &DatabaseConnection,
    base: &Select<E>,
    config: &ListConfiguration,
    params: &RequestParameters,
) -> Result<Vec<FilterSpec>, ChangeListError>
where
    E: EntityTrait,
{
    let mut specs = Vec::with_capacity(config.filter_specs().len());
    for field in config.filter_fields() {
        let lookups: Vec<&ActiveFilter> = params.filters_for(&field.name).collect();
        let lookup = match lookups.as_slice() {
            [] => None,
            [single] => Some(*single),
            _ => {
                let keys: Vec<&str> = lookups.iter().map(|f| f.param.as_str()).collect();
                tracing::debug!(field = %field.name, keys = ?keys, "Conflicting filter lookups");
                return Err(ChangeListError::invalid_lookup(&field.name, keys.join(", ")));
            }
        };

        let (kind, options) = field_options(db, base, config, field).await?;
        tracing::debug!(field = %field.name, kind = ?kind, options = options.len(), "Built filter options");
        specs.push(build_spec(config, field, kind, options, lookup, params)?);
    }
    Ok(specs)
}

/// One enumerated value of a field: canonical value, or `None` for the null choice.
#[derive(Debug, Clone)]
struct FilterOption {
    value: Option<String>,
    display: String,
}

impl FilterOption {
    fn value(value: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            display: display.into(),
        }
    }

    fn null(display: &str) -> Self {
        Self {
            value: None,
            display: display.to_string(),
        }
    }
}

async fn field_options<E: EntityTrait>(
    db: &DatabaseConnection,
    base: &Select<E>,
    config: &ListConfiguration,
    field: &Field,
) -> Result<(FilterKind, Vec<FilterOption>), ChangeListError> {
    if field.kind == FieldKind::Boolean {
        let mut options = vec![FilterOption::value("1", "Yes"), FilterOption::value("0", "No")];
        if field.nullable {
            options.push(FilterOption::null("Unknown"));
        }
        return Ok((FilterKind::Boolean, options));
    }

    if !field.choices.is_empty() {
        let mut options: Vec<FilterOption> = field
            .choices
            .iter()
            .map(|(value, label)| {
                let value = field.kind.canonical(value).unwrap_or_else(|| value.clone());
                FilterOption::value(value, label)
            })
            .collect();
        if field.nullable {
            options.push(FilterOption::null("(None)"));
        }
        return Ok((FilterKind::Choices, options));
    }

    let relation = config.relation_of(field);
    let mut select = base.clone();
    // The choices are ordered by value and label only
    QueryTrait::query(&mut select).clear_order_by();
    if let Some(relation) = relation {
        select = apply_joins(select, &[relation]);
    }

    let value_expr = field_expr(config, field);
    let value_col: SimpleExpr = value_expr.clone().into();
    let value_sel: SimpleExpr = match field.kind.cast_target(db.get_database_backend()) {
        Some(target) => value_expr.cast_as(Alias::new(target)),
        None => value_col.clone(),
    };
    let label_col: Option<SimpleExpr> = match (&field.source, relation) {
        (FieldSource::Related { .. }, Some(relation)) => relation
            .label_column
            .as_ref()
            .map(|column| Expr::col((Alias::new(relation.alias()), Alias::new(column))).into()),
        _ => None,
    };

    let mut select = select
        .select_only()
        .column_as(value_sel, VALUE_ALIAS)
        .filter(Expr::expr(value_col).is_not_null())
        .distinct();
    if let Some(label_col) = &label_col {
        let by_label: SimpleExpr = Expr::col(Alias::new(LABEL_ALIAS)).into();
        select = select
            .column_as(label_col.clone(), LABEL_ALIAS)
            .order_by(by_label, Order::Asc);
    }
    let by_value: SimpleExpr = Expr::col(Alias::new(VALUE_ALIAS)).into();
    let select = select.order_by(by_value, Order::Asc);

    let has_label = label_col.is_some();
    let rows = match field.kind {
        FieldKind::Integer => fetch_distinct::<E, i64>(db, select, has_label).await?,
        FieldKind::Uuid => fetch_distinct::<E, Uuid>(db, select, has_label).await?,
        FieldKind::Text | FieldKind::Boolean => fetch_distinct::<E, String>(db, select, has_label).await?,
    };

    let mut options: Vec<FilterOption> = rows
        .into_iter()
        .map(|(value, label)| {
            let display = label.unwrap_or_else(|| value.clone());
            FilterOption::value(value, display)
        })
        .collect();

    let kind = if matches!(field.source, FieldSource::Related { .. }) {
        if relation.is_some_and(|r| r.cardinality == Cardinality::ManyToOne && r.nullable) {
            options.push(FilterOption::null("(None)"));
        }
        FilterKind::Related
    } else {
        if field.nullable {
            options.push(FilterOption::null("(None)"));
        }
        FilterKind::AllValues
    };
    Ok((kind, options))
}

/// Run the distinct-values query, decoding values as `T`.
async fn fetch_distinct<E, T>(
    db: &DatabaseConnection,
    select: Select<E>,
    has_label: bool,
) -> Result<Vec<(String, Option<String>)>, ChangeListError>
where
    E: EntityTrait,
    T: TryGetable + ToString + Send,
{
    let rows = if has_label {
        select
            .into_tuple::<(Option<T>, Option<String>)>()
            .all(db)
            .await?
            .into_iter()
            .filter_map(|(value, label)| value.map(|v| (v.to_string(), label)))
            .collect()
    } else {
        select
            .into_tuple::<Option<T>>()
            .all(db)
            .await?
            .into_iter()
            .flatten()
            .map(|v| (v.to_string(), None))
            .collect()
    };
    Ok(rows)
}

fn lookup_keys(config: &ListConfiguration, field: &Field) -> (String, String) {
    let exact = match (&field.source, config.relation_of(field)) {
        (FieldSource::Related { .. }, Some(relation)) => {
            format!("{}__{}__exact", field.name, relation.pk)
        }
        _ => format!("{}__exact", field.name),
    };
    (exact, format!("{}__isnull", field.name))
}

/// The option an active lookup selects, after checking it is one of `options`.
fn selected_option(
    field: &Field,
    options: &[FilterOption],
    lookup: &ActiveFilter,
) -> Result<Option<Option<String>>, ChangeListError> {
    let invalid = |value: &str| ChangeListError::invalid_lookup(&lookup.param, value);
    let offered = |canonical: &str| options.iter().any(|o| o.value.as_deref() == Some(canonical));

    match &lookup.lookup {
        Lookup::Exact(raw) => {
            let canonical = field.kind.canonical(raw).ok_or_else(|| invalid(raw))?;
            if !offered(&canonical) {
                return Err(invalid(raw));
            }
            Ok(Some(Some(canonical)))
        }
        Lookup::In(raws) => {
            if raws.is_empty() {
                return Err(invalid(""));
            }
            for raw in raws {
                let canonical = field.kind.canonical(raw).ok_or_else(|| invalid(raw))?;
                if !offered(&canonical) {
                    return Err(invalid(raw));
                }
            }
            Ok(None)
        }
        Lookup::IsNull(raw) => {
            let is_null = parse_bool(raw).ok_or_else(|| invalid(raw))?;
            // `isnull=False` always holds on a non-nullable field
            if is_null && !field.nullable {
                return Err(invalid(raw));
            }
            Ok(is_null.then_some(None))
        }
    }
}

fn build_spec(
    config: &ListConfiguration,
    field: &Field,
    kind: FilterKind,
    options: Vec<FilterOption>,
    lookup: Option<&ActiveFilter>,
    params: &RequestParameters,
) -> Result<FilterSpec, ChangeListError> {
    let selected = match lookup {
        Some(lookup) => selected_option(field, &options, lookup)?,
        None => None,
    };
    let (exact_key, isnull_key) = lookup_keys(config, field);
    let remove: Vec<&str> = lookup.map(|l| l.param.as_str()).into_iter().collect();

    let mut choices = Vec::with_capacity(options.len() + 1);
    choices.push(FilterChoice {
        value: ChoiceValue::All,
        display: "All".to_string(),
        selected: lookup.is_none(),
        query_string: params.get_query_string(
            &[(exact_key.as_str(), None), (isnull_key.as_str(), None)],
            &remove,
        ),
    });

    for option in options {
        let is_selected = selected.as_ref() == Some(&option.value);
        let (value, query_string) = match option.value {
            Some(value) => {
                let query_string = params.get_query_string(
                    &[(exact_key.as_str(), Some(value.as_str())), (isnull_key.as_str(), None)],
                    &remove,
                );
                (ChoiceValue::Exact(value), query_string)
            }
            None => {
                let query_string = params.get_query_string(
                    &[(isnull_key.as_str(), Some("True")), (exact_key.as_str(), None)],
                    &remove,
                );
                (ChoiceValue::IsNull, query_string)
            }
        };
        choices.push(FilterChoice {
            value,
            display: option.display,
            selected: is_selected,
            query_string,
        });
    }

    Ok(FilterSpec {
        field: field.name.clone(),
        title: field.label.clone(),
        kind,
        choices,
    })
}
