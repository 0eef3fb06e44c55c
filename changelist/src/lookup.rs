//! Query-string parsing for the changelist.
//!
//! [`RequestParameters::parse`] turns raw `key=value` pairs into the page,
//! show-all flag, search term, ordering and active filter lookups. It never
//! fails: unknown keys are ignored and a malformed page number is kept as
//! [`PageRequest::Malformed`] for the paginator to reject.
//!
//! Filter keys follow the lookup syntax of admin list filters:
//!
//! ```text
//! genres=3                  exact
//! genres__exact=3           exact
//! members__id__exact=3      exact, spelled with the related primary key
//! genres__in=1,2            membership
//! parent__isnull=True       null test
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use url::form_urlencoded;

use crate::config::ListConfiguration;

const EXACT_SUFFIX: &str = "__exact";
const IN_SUFFIX: &str = "__in";
const ISNULL_SUFFIX: &str = "__isnull";

/// The comparison a filter key asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Lookup {
    Exact(String),
    In(Vec<String>),
    /// Raw value; parsed as a boolean when filter specs are built
    IsNull(String),
}

/// One filter key of the request, resolved to its `list_filter` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveFilter {
    /// Field name from `list_filter`
    pub field: String,
    /// The query-string key as supplied
    pub param: String,
    pub lookup: Lookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PageRequest {
    Number(i64),
    Malformed(String),
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::Number(1)
    }
}

impl PageRequest {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map_or_else(|_| Self::Malformed(raw.to_string()), Self::Number)
    }
}

/// Parsed, immutable view of one changelist request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestParameters {
    /// Every key as supplied, with all of its values
    pub raw_query_params: BTreeMap<String, Vec<String>>,
    pub requested_page: PageRequest,
    pub show_all: bool,
    pub search_term: String,
    /// Raw order value (display column index)
    pub order: Option<String>,
    /// Raw order type (`asc` / `desc`)
    pub order_type: Option<String>,
    /// Filter lookups in key order
    pub active_filters: Vec<ActiveFilter>,
    #[serde(skip)]
    page_key: String,
}

impl RequestParameters {
    /// Parse key/value pairs against the permitted filter fields of `config`.
    pub fn parse<I, K, V>(pairs: I, config: &ListConfiguration) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw_query_params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            raw_query_params
                .entry(key.into())
                .or_default()
                .push(value.into());
        }

        let names = config.params();
        let last = |key: &str| {
            raw_query_params
                .get(key)
                .and_then(|values| values.last())
                .cloned()
        };

        let requested_page = last(&names.page)
            .map(|raw| PageRequest::parse(&raw))
            .unwrap_or_default();
        let show_all = raw_query_params.contains_key(&names.show_all);
        let search_term = last(&names.search).unwrap_or_default();
        let order = last(&names.order);
        let order_type = last(&names.order_type);

        let mut active_filters = Vec::new();
        for (key, values) in &raw_query_params {
            if names.is_reserved(key) {
                continue;
            }
            let Some(value) = values.last() else {
                continue;
            };
            if let Some(filter) = parse_filter_key(key, value, config) {
                active_filters.push(filter);
            }
        }

        Self {
            raw_query_params,
            requested_page,
            show_all,
            search_term,
            order,
            order_type,
            active_filters,
            page_key: names.page.clone(),
        }
    }

    /// Parse a raw (percent-encoded) query string, with or without the leading `?`.
    #[must_use]
    pub fn from_query_string(query: &str, config: &ListConfiguration) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::parse(form_urlencoded::parse(query.as_bytes()).into_owned(), config)
    }

    /// Lookups that target one `list_filter` field.
    pub fn filters_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ActiveFilter> + 'a {
        self.active_filters.iter().filter(move |f| f.field == field)
    }

    /// Whether any filter lookup or search term narrows the result set.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        !self.active_filters.is_empty() || !self.search_term.trim().is_empty()
    }

    /// Rebuild the query string with `new` applied and keys removed.
    ///
    /// The page key is always dropped so links land on the first page. A `None`
    /// value in `new` removes that key; every key equal to an entry of `remove`,
    /// or starting with that entry followed by `__`, is removed too.
    #[must_use]
    pub fn get_query_string(&self, new: &[(&str, Option<&str>)], remove: &[&str]) -> String {
        let mut params: BTreeMap<&str, Vec<&str>> = self
            .raw_query_params
            .iter()
            .filter(|(key, _)| **key != self.page_key)
            .filter(|(key, _)| !remove.iter().any(|prefix| matches_prefix(key, prefix)))
            .map(|(key, values)| (key.as_str(), values.iter().map(String::as_str).collect()))
            .collect();

        for (key, value) in new {
            match value {
                Some(value) => {
                    params.insert(*key, vec![*value]);
                }
                None => {
                    params.remove(*key);
                }
            }
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &params {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        format!("?{}", serializer.finish())
    }
}

fn matches_prefix(key: &str, prefix: &str) -> bool {
    key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with("__"))
}

/// Split a filter key into its field path and lookup, then resolve the field.
fn parse_filter_key(key: &str, value: &str, config: &ListConfiguration) -> Option<ActiveFilter> {
    let (path, lookup) = if let Some(path) = key.strip_suffix(IN_SUFFIX) {
        let values = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        (path, Lookup::In(values))
    } else if let Some(path) = key.strip_suffix(ISNULL_SUFFIX) {
        (path, Lookup::IsNull(value.to_string()))
    } else {
        let path = key.strip_suffix(EXACT_SUFFIX).unwrap_or(key);
        (path, Lookup::Exact(value.to_string()))
    };

    let field = config.filter_field_for_path(path)?;
    Some(ActiveFilter {
        field: field.name.clone(),
        param: key.to_string(),
        lookup,
    })
}
