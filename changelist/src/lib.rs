//! # changelist
//!
//! The list view of an admin site, over Sea-ORM: given a registration's list
//! options and one request's query string, build the filter sidebar, compose
//! a filtered, searched, ordered and deduplicated query, and return one page
//! of it.
//!
//! ```rust,ignore
//! use changelist::{ListConfiguration, ListOptions, Field, FieldKind, Relation, ModelAdmin};
//!
//! let config = ListConfiguration::builder("band", "id", FieldKind::Integer)
//!     .relation(
//!         Relation::many_to_many("genres", "genre")
//!             .via(|| band::Relation::BandGenre.def())
//!             .via(|| band_genre::Relation::Genre.def())
//!             .label("name"),
//!     )
//!     .field(Field::column("name", FieldKind::Text))
//!     .field(Field::relation("genres", "genres"))
//!     .options(ListOptions {
//!         list_filter: vec!["genres".into()],
//!         search_fields: vec!["name".into()],
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! let app = Router::new().nest("/bands", changelist_router(db, BandAdmin { config }));
//! ```
//!
//! `GET /bands?genres=3&q=king&p=2` then lists the second page of bands in
//! genre 3 whose name contains "king", each band once.

pub mod config;
pub mod core;
pub mod errors;
pub mod filtering;
pub mod lookup;
pub mod routes;

pub use config::{
    Cardinality, Direction, DisplayColumn, Field, FieldKind, FieldSource, ListConfiguration,
    ListConfigurationBuilder, ListOptions, OrderTerm, ParamNames, Relation, SearchField,
    SearchMode,
};
pub use crate::core::{ChangeList, ModelAdmin, Requester};
pub use errors::ChangeListError;
pub use filtering::{FilterSpec, PageResult, Paginator};
pub use lookup::{ActiveFilter, Lookup, PageRequest, RequestParameters};
pub use routes::changelist_router;
