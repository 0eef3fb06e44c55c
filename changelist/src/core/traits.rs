use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, Select};

use super::changelist::{ChangeList, Requester, run_changelist};
use crate::config::ListConfiguration;
use crate::errors::ChangeListError;
use crate::filtering::Paginator;

/// An admin registration: a record type plus its list options.
///
/// Only [`list_config`](ModelAdmin::list_config) is required. The other hooks
/// customise one request at a time and default to the static configuration.
///
/// ```rust,ignore
/// struct ChildAdmin { config: ListConfiguration }
///
/// #[async_trait]
/// impl ModelAdmin for ChildAdmin {
///     type EntityType = child::Entity;
///     const RESOURCE_NAME_PLURAL: &'static str = "children";
///
///     fn list_config(&self) -> &ListConfiguration {
///         &self.config
///     }
///
///     fn queryset(&self, _requester: &Requester) -> Select<child::Entity> {
///         child::Entity::find().filter(child::Column::Name.contains("filtered"))
///     }
/// }
/// ```
#[async_trait]
pub trait ModelAdmin: Send + Sync {
    type EntityType: EntityTrait<Model: Send + Sync> + Sync;

    const RESOURCE_NAME_PLURAL: &'static str;

    /// The validated, static list configuration.
    fn list_config(&self) -> &ListConfiguration;

    /// Base queryset for the requester, before any request filter.
    ///
    /// Overrides may filter, join and order. The changelist joins its own
    /// relations under separate aliases and replaces any ORDER BY.
    fn queryset(&self, requester: &Requester) -> Select<Self::EntityType> {
        let _ = requester;
        Self::EntityType::find()
    }

    /// Display columns for this requester.
    fn get_list_display(&self, requester: &Requester) -> Vec<String> {
        let _ = requester;
        self.list_config().display_names()
    }

    /// Link columns for this requester, given its display columns.
    ///
    /// Configured links that are still displayed are kept; otherwise the first
    /// display column links.
    fn get_list_display_links(&self, requester: &Requester, list_display: &[String]) -> Vec<String> {
        let _ = requester;
        let links: Vec<String> = self
            .list_config()
            .display_links()
            .iter()
            .filter(|link| list_display.contains(link))
            .cloned()
            .collect();
        if links.is_empty() {
            list_display.iter().take(1).cloned().collect()
        } else {
            links
        }
    }

    /// Paginator for a request's effective configuration.
    fn get_paginator(&self, config: &ListConfiguration) -> Paginator {
        Paginator::from_config(config)
    }

    /// The configuration one request runs with.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` if the hooks name columns the
    /// configuration cannot display.
    fn effective_config(&self, requester: &Requester) -> Result<ListConfiguration, ChangeListError> {
        let list_display = self.get_list_display(requester);
        let list_display_links = self.get_list_display_links(requester, &list_display);
        self.list_config().with_display(&list_display, &list_display_links)
    }

    /// Run the changelist pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; see [`ChangeListError`].
    async fn changelist(
        &self,
        db: &DatabaseConnection,
        requester: &Requester,
        pairs: Vec<(String, String)>,
    ) -> Result<ChangeList<<Self::EntityType as EntityTrait>::Model>, ChangeListError> {
        run_changelist(self, db, requester, pairs).await
    }
}
