//! # List Configuration
//!
//! An admin registration describes its changelist with a [`ListConfiguration`]:
//! a registry of typed [`Field`]s and [`Relation`]s plus the [`ListOptions`]
//! that say which of them are displayed, filtered, searched and ordered.
//!
//! Options are plain data (and deserialize from JSON); fields and relations are
//! registered in code because relations carry Sea-ORM [`RelationDef`]s.
//! Everything is validated once by [`ListConfigurationBuilder::build`], after
//! which the configuration is read-only and shared across requests.
//!
//! ```rust,ignore
//! let config = ListConfiguration::builder("bands", "id", FieldKind::Integer)
//!     .relation(
//!         Relation::many_to_many("genres", "genres")
//!             .via(|| band::Relation::BandGenres.def())
//!             .via(|| band_genre::Relation::Genre.def())
//!             .label("name"),
//!     )
//!     .field(Field::column("name", FieldKind::Text))
//!     .field(Field::relation("genres", "genres"))
//!     .options(ListOptions {
//!         list_display: vec!["name".into()],
//!         list_filter: vec!["genres".into()],
//!         search_fields: vec!["^name".into()],
//!         ..Default::default()
//!     })
//!     .build()?;
//! ```

use std::collections::HashSet;

use sea_orm::{DatabaseBackend, RelationDef, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ChangeListError;

const DEFAULT_LIST_PER_PAGE: u64 = 100;
const DEFAULT_LIST_MAX_SHOW_ALL: u64 = 200;

/// Storage type of a field, used to parse lookup values and decode choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Uuid,
}

impl FieldKind {
    /// Parse a raw query-string value into a bindable value.
    #[must_use]
    pub fn parse_value(self, raw: &str) -> Option<Value> {
        match self {
            Self::Text => Some(Value::from(raw.to_string())),
            Self::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Boolean => parse_bool(raw).map(Value::from),
            Self::Uuid => Uuid::parse_str(raw.trim()).ok().map(Value::from),
        }
    }

    /// Normalise a raw value to the form filter choices are stored in,
    /// so `"03"` matches the choice `"3"` and `"true"` matches `"1"`.
    #[must_use]
    pub fn canonical(self, raw: &str) -> Option<String> {
        match self {
            Self::Text => Some(raw.to_string()),
            Self::Integer => raw.trim().parse::<i64>().ok().map(|v| v.to_string()),
            Self::Boolean => parse_bool(raw).map(|v| if v { "1" } else { "0" }.to_string()),
            Self::Uuid => Uuid::parse_str(raw.trim()).ok().map(|v| v.to_string()),
        }
    }

    /// SQL type to cast to before decoding distinct values, if any.
    pub(crate) fn cast_target(self, backend: DatabaseBackend) -> Option<&'static str> {
        match (self, backend) {
            (Self::Integer, DatabaseBackend::MySql) => Some("SIGNED"),
            (Self::Integer, _) => Some("BIGINT"),
            _ => None,
        }
    }
}

/// Lenient boolean parsing for `__exact` and `__isnull` lookups.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "True" | "TRUE" => Some(true),
        "0" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// How many rows of the related table one main row can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Foreign key on the main table (at most one related row)
    ManyToOne,
    /// Reverse foreign key (related rows point at the main row)
    OneToMany,
    /// Through a junction table
    ManyToMany,
}

impl Cardinality {
    /// Joining across this relation can repeat main rows.
    #[must_use]
    pub fn needs_distinct(self) -> bool {
        !matches!(self, Self::ManyToOne)
    }
}

/// A relation the changelist may join across.
///
/// `hops` is the chain of Sea-ORM relation definitions leading from the main
/// table to `table`; a many-to-many relation has two (main → junction →
/// target). Each relation is joined at most once per query, under aliases of
/// its own, so relations may share tables with each other and with joins the
/// admin queryset already carries.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub cardinality: Cardinality,
    pub hops: Vec<fn() -> RelationDef>,
    /// Target table name
    pub table: String,
    /// Target primary key column
    pub pk: String,
    pub pk_kind: FieldKind,
    /// Column used to label related rows in filter choices
    pub label_column: Option<String>,
    /// Main rows may have no related row (nullable foreign key)
    pub nullable: bool,
}

impl Relation {
    pub fn new(name: impl Into<String>, cardinality: Cardinality, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality,
            hops: Vec::new(),
            table: table.into(),
            pk: "id".to_string(),
            pk_kind: FieldKind::Integer,
            label_column: None,
            nullable: false,
        }
    }

    pub fn many_to_one(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(name, Cardinality::ManyToOne, table)
    }

    pub fn one_to_many(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(name, Cardinality::OneToMany, table)
    }

    pub fn many_to_many(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(name, Cardinality::ManyToMany, table)
    }

    /// Append a join hop, e.g. `.via(|| band::Relation::BandGenres.def())`.
    #[must_use]
    pub fn via(mut self, hop: fn() -> RelationDef) -> Self {
        self.hops.push(hop);
        self
    }

    #[must_use]
    pub fn pk(mut self, column: impl Into<String>, kind: FieldKind) -> Self {
        self.pk = column.into();
        self.pk_kind = kind;
        self
    }

    #[must_use]
    pub fn label(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Alias the table of hop `index` is joined under.
    pub(crate) fn hop_alias(&self, index: usize) -> String {
        format!("{}_{index}", self.name)
    }

    /// Alias of the target table.
    pub(crate) fn alias(&self) -> String {
        self.hop_alias(self.hops.len().saturating_sub(1))
    }
}

/// Where a field's value lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// A column on the main table, or on a related table when `relation` is set
    Column {
        relation: Option<String>,
        column: String,
    },
    /// The identity (primary key) of the related row
    Related { relation: String },
}

/// A named, typed field that list options can refer to.
#[derive(Debug, Clone)]
pub struct Field {
    /// Lookup path, e.g. `name`, `child__name`, `genres`
    pub name: String,
    pub label: String,
    pub source: FieldSource,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Static `(value, label)` choices
    pub choices: Vec<(String, String)>,
}

impl Field {
    /// A column on the main table whose column name equals the field name.
    pub fn column(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: default_label(&name),
            source: FieldSource::Column {
                relation: None,
                column: name.clone(),
            },
            name,
            kind,
            nullable: false,
            choices: Vec::new(),
        }
    }

    /// A column on a related table, e.g. `Field::related_column("child__name", "child", "name", FieldKind::Text)`.
    pub fn related_column(
        name: impl Into<String>,
        relation: impl Into<String>,
        column: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        let name = name.into();
        Self {
            label: default_label(&name),
            source: FieldSource::Column {
                relation: Some(relation.into()),
                column: column.into(),
            },
            name,
            kind,
            nullable: false,
            choices: Vec::new(),
        }
    }

    /// The related row itself. Kind and nullability come from the relation.
    pub fn relation(name: impl Into<String>, relation: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: default_label(&name),
            source: FieldSource::Related {
                relation: relation.into(),
            },
            name,
            kind: FieldKind::Integer,
            nullable: false,
            choices: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn choices<I, V, L>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        self.choices = choices
            .into_iter()
            .map(|(value, label)| (value.into(), label.into()))
            .collect();
        self
    }

    /// Name of the relation this field traverses, if any.
    #[must_use]
    pub fn relation_name(&self) -> Option<&str> {
        match &self.source {
            FieldSource::Column { relation, .. } => relation.as_deref(),
            FieldSource::Related { relation } => Some(relation),
        }
    }
}

fn default_label(name: &str) -> String {
    name.rsplit("__").next().unwrap_or(name).replace('_', " ")
}

/// A column of the changelist table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayColumn {
    pub name: String,
    pub label: String,
    /// Field to order by when this column header is clicked
    pub order_field: Option<String>,
}

impl DisplayColumn {
    /// A column computed by the result formatter rather than read from a field.
    pub fn computed(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            order_field: None,
        }
    }

    #[must_use]
    pub fn order_field(mut self, field: impl Into<String>) -> Self {
        self.order_field = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Parse the order-type query value (`asc` / `desc`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl From<Direction> for sea_orm::Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Self::Asc,
            Direction::Desc => Self::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTerm {
    pub field: String,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Parse `name` / `-name`.
    #[must_use]
    pub fn parse(term: &str) -> Self {
        term.strip_prefix('-')
            .map_or_else(|| Self::asc(term), Self::desc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Case-insensitive substring (no prefix)
    Contains,
    /// Case-insensitive prefix (`^field`)
    StartsWith,
    /// Case-insensitive equality (`=field`)
    Exact,
    /// `@field`; matched as a substring since no full-text index is assumed
    FullText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchField {
    pub field: String,
    pub mode: SearchMode,
}

impl SearchField {
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let (mode, field) = match spec.chars().next() {
            Some('^') => (SearchMode::StartsWith, &spec[1..]),
            Some('=') => (SearchMode::Exact, &spec[1..]),
            Some('@') => (SearchMode::FullText, &spec[1..]),
            _ => (SearchMode::Contains, spec),
        };
        Self {
            field: field.to_string(),
            mode,
        }
    }
}

/// Query-string keys reserved by the changelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamNames {
    pub page: String,
    pub show_all: String,
    pub search: String,
    pub order: String,
    pub order_type: String,
}

impl Default for ParamNames {
    fn default() -> Self {
        Self {
            page: "p".to_string(),
            show_all: "all".to_string(),
            search: "q".to_string(),
            order: "o".to_string(),
            order_type: "ot".to_string(),
        }
    }
}

impl ParamNames {
    #[must_use]
    pub fn is_reserved(&self, key: &str) -> bool {
        [&self.page, &self.show_all, &self.search, &self.order, &self.order_type]
            .iter()
            .any(|name| name.as_str() == key)
    }
}

/// Raw list options as an admin author writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub list_display: Vec<String>,
    pub list_display_links: Vec<String>,
    pub list_filter: Vec<String>,
    /// Field names, optionally prefixed with `^`, `=` or `@`
    pub search_fields: Vec<String>,
    /// `name` or `-name`; `pk` stands for the primary key
    pub ordering: Vec<String>,
    pub list_per_page: u64,
    pub list_max_show_all: u64,
    pub list_editable: Vec<String>,
    /// A last page with this many rows or fewer folds into the previous page
    pub orphans: u64,
    pub allow_empty_first_page: bool,
    pub params: ParamNames,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            list_display: Vec::new(),
            list_display_links: Vec::new(),
            list_filter: Vec::new(),
            search_fields: Vec::new(),
            ordering: Vec::new(),
            list_per_page: DEFAULT_LIST_PER_PAGE,
            list_max_show_all: DEFAULT_LIST_MAX_SHOW_ALL,
            list_editable: Vec::new(),
            orphans: 0,
            allow_empty_first_page: true,
            params: ParamNames::default(),
        }
    }
}

impl ListOptions {
    /// Load options from JSON; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` if the JSON does not describe list options.
    pub fn from_json(json: &str) -> Result<Self, ChangeListError> {
        serde_json::from_str(json)
            .map_err(|e| ChangeListError::improperly_configured(format!("invalid list options: {e}")))
    }
}

/// Validated, read-only changelist configuration.
#[derive(Debug, Clone)]
pub struct ListConfiguration {
    table: String,
    pk: String,
    pk_kind: FieldKind,
    fields: Vec<Field>,
    relations: Vec<Relation>,
    computed: Vec<DisplayColumn>,
    display_columns: Vec<DisplayColumn>,
    display_links: Vec<String>,
    filter_specs: Vec<String>,
    search_fields: Vec<SearchField>,
    ordering_default: Vec<OrderTerm>,
    page_size: u64,
    show_all_threshold: u64,
    editable_columns: Vec<String>,
    orphans: u64,
    allow_empty_first_page: bool,
    params: ParamNames,
}

pub struct ListConfigurationBuilder {
    table: String,
    pk: String,
    pk_kind: FieldKind,
    fields: Vec<Field>,
    relations: Vec<Relation>,
    computed: Vec<DisplayColumn>,
    options: ListOptions,
}

impl ListConfiguration {
    pub fn builder(
        table: impl Into<String>,
        pk: impl Into<String>,
        pk_kind: FieldKind,
    ) -> ListConfigurationBuilder {
        ListConfigurationBuilder {
            table: table.into(),
            pk: pk.into(),
            pk_kind,
            fields: Vec::new(),
            relations: Vec::new(),
            computed: Vec::new(),
            options: ListOptions::default(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn pk(&self) -> &str {
        &self.pk
    }

    #[must_use]
    pub fn pk_kind(&self) -> FieldKind {
        self.pk_kind
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// The relation a field traverses, if any.
    #[must_use]
    pub fn relation_of(&self, field: &Field) -> Option<&Relation> {
        field.relation_name().and_then(|name| self.relation(name))
    }

    #[must_use]
    pub fn display_columns(&self) -> &[DisplayColumn] {
        &self.display_columns
    }

    #[must_use]
    pub fn display_links(&self) -> &[String] {
        &self.display_links
    }

    /// Names of the `list_filter` fields, in configuration order.
    #[must_use]
    pub fn filter_specs(&self) -> &[String] {
        &self.filter_specs
    }

    /// Resolved `list_filter` fields, in configuration order.
    pub fn filter_fields(&self) -> impl Iterator<Item = &Field> {
        self.filter_specs.iter().filter_map(|name| self.field(name))
    }

    #[must_use]
    pub fn search_fields(&self) -> &[SearchField] {
        &self.search_fields
    }

    #[must_use]
    pub fn ordering_default(&self) -> &[OrderTerm] {
        &self.ordering_default
    }

    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    #[must_use]
    pub fn show_all_threshold(&self) -> u64 {
        self.show_all_threshold
    }

    #[must_use]
    pub fn editable_columns(&self) -> &[String] {
        &self.editable_columns
    }

    #[must_use]
    pub fn orphans(&self) -> u64 {
        self.orphans
    }

    #[must_use]
    pub fn allow_empty_first_page(&self) -> bool {
        self.allow_empty_first_page
    }

    #[must_use]
    pub fn params(&self) -> &ParamNames {
        &self.params
    }

    /// Names of the display columns, in order.
    #[must_use]
    pub fn display_names(&self) -> Vec<String> {
        self.display_columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Whether ORDER BY may use this field.
    ///
    /// Columns reached through one-to-many or many-to-many relations have no
    /// single value per row and are not sortable.
    #[must_use]
    pub fn is_sortable(&self, field: &Field) -> bool {
        match &field.source {
            FieldSource::Column { relation: None, .. } => true,
            FieldSource::Column {
                relation: Some(_), ..
            } => self
                .relation_of(field)
                .is_some_and(|r| r.cardinality == Cardinality::ManyToOne),
            FieldSource::Related { .. } => false,
        }
    }

    /// The `list_filter` field a query-string path refers to.
    ///
    /// Accepts the field name itself and, for relation fields, the
    /// `<field>__<target pk>` spelling (`members__id`).
    #[must_use]
    pub fn filter_field_for_path(&self, path: &str) -> Option<&Field> {
        self.filter_fields().find(|field| {
            if field.name == path {
                return true;
            }
            match (&field.source, self.relation_of(field)) {
                (FieldSource::Related { .. }, Some(relation)) => path
                    .strip_prefix(field.name.as_str())
                    .and_then(|rest| rest.strip_prefix("__"))
                    .is_some_and(|rest| rest == relation.pk),
                _ => false,
            }
        })
    }

    /// Re-derive the display columns for one request.
    ///
    /// Editable columns that the new display no longer contains are dropped.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` when a column is unknown or a link is not displayed.
    pub fn with_display(
        &self,
        list_display: &[String],
        list_display_links: &[String],
    ) -> Result<Self, ChangeListError> {
        let editable: Vec<String> = self
            .editable_columns
            .iter()
            .filter(|name| list_display.contains(name))
            .cloned()
            .collect();
        let (display_columns, display_links, editable_columns) =
            self.resolve_display(list_display, list_display_links, &editable)?;

        Ok(Self {
            display_columns,
            display_links,
            editable_columns,
            ..self.clone()
        })
    }

    fn resolve_display(
        &self,
        list_display: &[String],
        list_display_links: &[String],
        list_editable: &[String],
    ) -> Result<(Vec<DisplayColumn>, Vec<String>, Vec<String>), ChangeListError> {
        let names: Vec<String> = if list_display.is_empty() {
            vec![self.pk.clone()]
        } else {
            list_display.to_vec()
        };

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_display contains '{name}' more than once"
                )));
            }
            let column = if let Some(field) = self.field(name) {
                DisplayColumn {
                    name: field.name.clone(),
                    label: field.label.clone(),
                    order_field: self.is_sortable(field).then(|| field.name.clone()),
                }
            } else if let Some(computed) = self.computed.iter().find(|c| &c.name == name) {
                computed.clone()
            } else {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_display refers to '{name}', which is neither a field nor a computed column"
                )));
            };
            columns.push(column);
        }

        let links: Vec<String> = if list_display_links.is_empty() {
            names.iter().take(1).cloned().collect()
        } else {
            list_display_links.to_vec()
        };
        if let Some(missing) = links.iter().find(|link| !names.contains(link)) {
            return Err(ChangeListError::improperly_configured(format!(
                "list_display_links refers to '{missing}', which is not in list_display"
            )));
        }

        for name in list_editable {
            if !names.contains(name) {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_editable refers to '{name}', which is not in list_display"
                )));
            }
            if links.contains(name) {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_editable refers to '{name}', which is also a list_display_links column"
                )));
            }
            let local = self.field(name).is_some_and(|f| {
                matches!(f.source, FieldSource::Column { relation: None, .. })
            });
            if !local {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_editable refers to '{name}', which is not a column of '{}'",
                    self.table
                )));
            }
        }

        Ok((columns, links, list_editable.to_vec()))
    }
}

impl ListConfigurationBuilder {
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    #[must_use]
    pub fn computed_column(mut self, column: DisplayColumn) -> Self {
        self.computed.push(column);
        self
    }

    #[must_use]
    pub fn options(mut self, options: ListOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate everything and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` naming the first option that does not
    /// resolve against the registered fields and relations.
    pub fn build(self) -> Result<ListConfiguration, ChangeListError> {
        let Self {
            table,
            pk,
            pk_kind,
            mut fields,
            relations,
            computed,
            options,
        } = self;

        if options.list_per_page == 0 {
            return Err(ChangeListError::improperly_configured(
                "list_per_page must be greater than zero",
            ));
        }

        let mut relation_names = HashSet::new();
        for relation in &relations {
            if !relation_names.insert(relation.name.as_str()) {
                return Err(ChangeListError::improperly_configured(format!(
                    "relation '{}' is registered more than once",
                    relation.name
                )));
            }
            if relation.hops.is_empty() {
                return Err(ChangeListError::improperly_configured(format!(
                    "relation '{}' has no join path",
                    relation.name
                )));
            }
        }

        if !fields.iter().any(|f| f.name == pk) {
            fields.insert(0, Field::column(pk.clone(), pk_kind));
        }

        let mut field_names = HashSet::new();
        for field in &mut fields {
            if !field_names.insert(field.name.clone()) {
                return Err(ChangeListError::improperly_configured(format!(
                    "field '{}' is registered more than once",
                    field.name
                )));
            }
            let Some(relation_name) = field.relation_name() else {
                continue;
            };
            let Some(relation) = relations.iter().find(|r| r.name == relation_name) else {
                return Err(ChangeListError::improperly_configured(format!(
                    "field '{}' refers to unknown relation '{relation_name}'",
                    field.name
                )));
            };
            if matches!(field.source, FieldSource::Related { .. }) {
                field.kind = relation.pk_kind;
                field.nullable = relation.nullable;
            }
        }

        let mut config = ListConfiguration {
            table,
            pk,
            pk_kind,
            fields,
            relations,
            computed,
            display_columns: Vec::new(),
            display_links: Vec::new(),
            filter_specs: Vec::new(),
            search_fields: Vec::new(),
            ordering_default: Vec::new(),
            page_size: options.list_per_page,
            show_all_threshold: options.list_max_show_all,
            editable_columns: Vec::new(),
            orphans: options.orphans,
            allow_empty_first_page: options.allow_empty_first_page,
            params: options.params,
        };

        let mut seen = HashSet::new();
        for name in &options.list_filter {
            if config.field(name).is_none() {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_filter refers to unknown field '{name}'"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ChangeListError::improperly_configured(format!(
                    "list_filter contains '{name}' more than once"
                )));
            }
        }
        config.filter_specs = options.list_filter;

        for spec in &options.search_fields {
            let search = SearchField::parse(spec);
            let searchable = config.field(&search.field).is_some_and(|f| {
                matches!(f.source, FieldSource::Column { .. }) && f.kind == FieldKind::Text
            });
            if !searchable {
                return Err(ChangeListError::improperly_configured(format!(
                    "search_fields refers to '{}', which is not a text column",
                    search.field
                )));
            }
            config.search_fields.push(search);
        }

        for term in &options.ordering {
            let mut term = OrderTerm::parse(term);
            if term.field == "pk" {
                term.field.clone_from(&config.pk);
            }
            let sortable = config
                .field(&term.field)
                .is_some_and(|f| config.is_sortable(f));
            if !sortable {
                return Err(ChangeListError::improperly_configured(format!(
                    "ordering refers to '{}', which is not a sortable field",
                    term.field
                )));
            }
            config.ordering_default.push(term);
        }

        for column in &config.computed {
            if let Some(order_field) = &column.order_field {
                let sortable = config
                    .field(order_field)
                    .is_some_and(|f| config.is_sortable(f));
                if !sortable {
                    return Err(ChangeListError::improperly_configured(format!(
                        "computed column '{}' orders by '{order_field}', which is not a sortable field",
                        column.name
                    )));
                }
            }
        }

        let (display_columns, display_links, editable_columns) = config.resolve_display(
            &options.list_display,
            &options.list_display_links,
            &options.list_editable,
        )?;
        config.display_columns = display_columns;
        config.display_links = display_links;
        config.editable_columns = editable_columns;

        Ok(config)
    }
}
