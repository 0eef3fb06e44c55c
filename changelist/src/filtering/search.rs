use sea_orm::{
    Condition,
    sea_query::{Expr, Func, LikeExpr, SimpleExpr},
};

use super::conditions::field_expr;
use crate::config::{ListConfiguration, SearchField, SearchMode};

// Basic safety limits
const MAX_SEARCH_QUERY_LENGTH: usize = 10_000;
const MAX_SEARCH_WORDS: usize = 32;

/// Escape LIKE wildcards to prevent wildcard injection attacks
/// Escapes: % (match any) and _ (match single char)
fn escape_like_wildcards(input: &str) -> String {
    input.replace('\\', "\\\\")  // Escape backslash first
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Split a search term into the words that must each match.
///
/// Over-long terms are truncated on a character boundary before splitting.
#[must_use]
pub fn search_words(term: &str) -> Vec<&str> {
    let end = term
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= MAX_SEARCH_QUERY_LENGTH)
        .last()
        .unwrap_or(0);
    term[..end].split_whitespace().take(MAX_SEARCH_WORDS).collect()
}

/// `UPPER(column) LIKE 'PATTERN' ESCAPE '\'` for one field and one word.
fn build_like_condition(config: &ListConfiguration, search: &SearchField, word: &str) -> Option<SimpleExpr> {
    let field = config.field(&search.field)?;
    let escaped = escape_like_wildcards(&word.to_uppercase());
    let pattern = match search.mode {
        SearchMode::Contains | SearchMode::FullText => format!("%{escaped}%"),
        SearchMode::StartsWith => format!("{escaped}%"),
        SearchMode::Exact => escaped,
    };

    let column = field_expr(config, field);
    Some(Expr::expr(Func::upper(column)).like(LikeExpr::new(pattern).escape('\\')))
}

/// Build the search condition: every word must match at least one search field.
///
/// Returns `None` when there is nothing to search for.
#[must_use]
pub fn build_search_condition(config: &ListConfiguration, term: &str) -> Option<Condition> {
    if config.search_fields().is_empty() {
        return None;
    }
    let words = search_words(term);
    if words.is_empty() {
        return None;
    }

    let condition = words.iter().fold(Condition::all(), |all, word| {
        let any = config
            .search_fields()
            .iter()
            .filter_map(|search| build_like_condition(config, search, word))
            .fold(Condition::any(), Condition::add);
        all.add(any)
    });
    Some(condition)
}

/// Relations the search condition joins across.
pub(crate) fn search_relations(config: &ListConfiguration) -> Vec<&str> {
    config
        .search_fields()
        .iter()
        .filter_map(|search| config.field(&search.field))
        .filter_map(|field| field.relation_name())
        .collect()
}
