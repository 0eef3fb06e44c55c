use axum::http::{HeaderValue, header::HeaderMap};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect, Select};
use serde::Serialize;

use crate::config::ListConfiguration;
use crate::errors::ChangeListError;
use crate::lookup::PageRequest;

/// Page arithmetic for one changelist.
///
/// Pages are numbered from 1. A final page holding `orphans` rows or fewer is
/// folded into the page before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginator {
    pub per_page: u64,
    pub orphans: u64,
    pub allow_empty_first_page: bool,
    pub show_all_threshold: u64,
}

impl Paginator {
    #[must_use]
    pub fn from_config(config: &ListConfiguration) -> Self {
        Self {
            per_page: config.page_size(),
            orphans: config.orphans(),
            allow_empty_first_page: config.allow_empty_first_page(),
            show_all_threshold: config.show_all_threshold(),
        }
    }

    /// Number of pages for `count` rows.
    #[must_use]
    pub fn num_pages(&self, count: u64) -> u64 {
        if count == 0 && !self.allow_empty_first_page {
            return 0;
        }
        let hits = count.saturating_sub(self.orphans).max(1);
        hits.div_ceil(self.per_page.max(1))
    }

    #[must_use]
    pub fn page_range(&self, count: u64) -> Vec<u64> {
        (1..=self.num_pages(count)).collect()
    }

    /// Check a requested page against the page range; never clamps.
    ///
    /// # Errors
    ///
    /// Returns `IncorrectLookupParameters` for a non-integer page or one
    /// outside `1..=num_pages`.
    pub fn validate_number(&self, requested: &PageRequest, count: u64) -> Result<u64, ChangeListError> {
        let number = match requested {
            PageRequest::Number(number) => *number,
            PageRequest::Malformed(raw) => {
                return Err(ChangeListError::incorrect_lookup(format!(
                    "Invalid page ('{raw}'): not an integer"
                )));
            }
        };
        let num_pages = self.num_pages(count);
        match u64::try_from(number) {
            Ok(page) if page >= 1 && page <= num_pages => Ok(page),
            _ => Err(ChangeListError::incorrect_lookup(format!(
                "Invalid page ({number}): expected a page between 1 and {num_pages}"
            ))),
        }
    }

    /// `(offset, limit)` of a validated page.
    #[must_use]
    pub fn page_bounds(&self, number: u64, count: u64) -> (u64, u64) {
        let bottom = number.saturating_sub(1) * self.per_page;
        let mut top = bottom + self.per_page;
        if top + self.orphans >= count {
            top = count;
        }
        (bottom, top.saturating_sub(bottom))
    }

    /// Whether show-all may return `count` rows at once.
    #[must_use]
    pub fn can_show_all(&self, count: u64) -> bool {
        count <= self.show_all_threshold
    }
}

/// One page of a changelist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<M> {
    pub items: Vec<M>,
    pub total_count: u64,
    pub page_range: Vec<u64>,
    pub current_page: u64,
    pub num_pages: u64,
    /// Row offset of the first item
    pub offset: u64,
    pub can_show_all: bool,
    /// Show-all was requested and honored
    pub show_all: bool,
    /// More rows than fit on one page
    pub multi_page: bool,
}

impl<M> PageResult<M> {
    #[must_use]
    pub fn content_range(&self, resource_name: &str) -> HeaderMap {
        calculate_content_range(self.offset, self.items.len() as u64, self.total_count, resource_name)
    }
}

/// Count `select`, then fetch the requested page (or everything, for show-all).
///
/// # Errors
///
/// Returns `IncorrectLookupParameters` for an invalid page and `Database` if
/// counting or fetching fails.
pub async fn paginate<E>(
    db: &DatabaseConnection,
    select: &Select<E>,
    paginator: &Paginator,
    requested_page: &PageRequest,
    show_all: bool,
) -> Result<PageResult<E::Model>, ChangeListError>
where
    E: EntityTrait,
    E::Model: Send + Sync,
{
    let total_count = select.clone().count(db).await?;
    let can_show_all = paginator.can_show_all(total_count);
    let multi_page = total_count > paginator.per_page;

    if show_all && can_show_all {
        tracing::debug!(total_count, "Returning all rows");
        let items = select.clone().all(db).await?;
        return Ok(PageResult {
            items,
            total_count,
            page_range: vec![1],
            current_page: 1,
            num_pages: 1,
            offset: 0,
            can_show_all,
            show_all: true,
            multi_page,
        });
    }

    let current_page = paginator.validate_number(requested_page, total_count)?;
    let (offset, limit) = paginator.page_bounds(current_page, total_count);
    tracing::debug!(total_count, current_page, offset, limit, "Fetching page");

    let items = if limit == 0 {
        Vec::new()
    } else {
        select.clone().offset(offset).limit(limit).all(db).await?
    };

    Ok(PageResult {
        items,
        total_count,
        page_range: paginator.page_range(total_count),
        current_page,
        num_pages: paginator.num_pages(total_count),
        offset,
        can_show_all,
        show_all: false,
        multi_page,
    })
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// Build the Content-Range header for a page.
///
/// # Arguments
///
/// * `offset` - Row offset of the first item.
/// * `len` - Number of items on the page.
/// * `total_count` - Rows in the whole changelist.
/// * `resource_name` - The name of the resource being paginated.
///
/// An empty page is reported as `name */total`.
#[must_use]
pub fn calculate_content_range(offset: u64, len: u64, total_count: u64, resource_name: &str) -> HeaderMap {
    // Sanitize resource name to prevent header injection
    let safe_name = sanitize_resource_name(resource_name);

    let range = if len == 0 {
        "*".to_string()
    } else {
        format!("{offset}-{}", offset + len - 1)
    };
    let content_range = format!("{safe_name} {range}/{total_count}");

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&content_range)
        .or_else(|_| HeaderValue::from_str(&format!("items {range}/{total_count}")))
        .unwrap_or_else(|_| HeaderValue::from_static("items */0"));
    headers.insert("Content-Range", value);
    headers
}
