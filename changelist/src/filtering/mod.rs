//! # Filtering, Search, Ordering & Pagination
//!
//! Turns parsed request parameters into one Sea-ORM `Select` and slices it
//! into a page.
//!
//! ## Main Components
//!
//! - **[`build_filter_specs`]**: the sidebar choices of every `list_filter`
//!   field, and validation of the active filter values against them
//! - **[`compose`]**: filters, search, deduplication and ordering, in that order
//! - **[`Paginator`] / [`paginate`]**: counting, page validation and slicing
//!
//! ## Query Parameter Examples
//!
//! ```text
//! GET /bands?genres=3                     bands in genre 3 (DISTINCT, many-to-many)
//! GET /bands?genres__in=3,4&q=king        either genre, name matching "king"
//! GET /children?parent__isnull=True       children without a parent
//! GET /children?o=0&ot=desc&p=2           second page, first display column descending
//! GET /children?all=                      every row, if under list_max_show_all
//! ```
//!
//! ## Deduplication
//!
//! Filtering or searching across a one-to-many or many-to-many relation
//! joins several rows per record. The composed query is then `SELECT
//! DISTINCT`, and counting wraps it in a subquery, so `total_count` counts
//! records rather than joined rows.

pub mod compose;
pub mod conditions;
pub mod pagination;
pub mod search;
pub mod sort;
pub mod specs;

// Re-export commonly used items
pub use compose::{ComposedQuery, QuerySummary, compose};
pub use conditions::{apply_filters, build_filter_expr};
pub use pagination::{PageResult, Paginator, calculate_content_range, paginate};
pub use search::{build_search_condition, search_words};
pub use sort::{effective_ordering, resolve_request_ordering};
pub use specs::{ChoiceValue, FilterChoice, FilterKind, FilterSpec, build_filter_specs};
