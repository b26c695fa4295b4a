//! Entity metadata as reported by the record store.

use serde::Deserialize;

use crate::types::SortDir;

/// Fields every entity carries whether or not its schema lists them.
pub const STANDARD_FIELDS: &[(&str, FieldType)] = &[
    ("name", FieldType::Data),
    ("owner", FieldType::Data),
    ("creation", FieldType::Datetime),
    ("modified", FieldType::Datetime),
    ("modified_by", FieldType::Data),
    ("docstatus", FieldType::Int),
    ("idx", FieldType::Int),
    ("parent", FieldType::Data),
    ("parentfield", FieldType::Data),
    ("parenttype", FieldType::Data),
];

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[non_exhaustive]
pub enum FieldType {
    /// Short text
    Data,
    /// Name of a record in another entity
    Link,
    /// One of a fixed set of strings
    Select,
    /// Long text
    Text,
    /// Integer
    Int,
    /// 0/1 flag
    Check,
    /// Floating point
    Float,
    /// Decimal amount
    Currency,
    /// Calendar date
    Date,
    /// Date and time of day
    Datetime,
    /// Time of day
    Time,
}

impl FieldType {
    /// Integer-valued types.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Check)
    }

    /// Any numeric type.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Check | Self::Float | Self::Currency)
    }

    /// String-valued types, where an empty string counts as unset.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Data | Self::Link | Self::Select | Self::Text)
    }

    /// `Date` or `Datetime`.
    pub const fn is_date(self) -> bool {
        matches!(self, Self::Date | Self::Datetime)
    }

    /// Literal used in place of NULL when a negative comparison must include
    /// rows without a value.
    pub const fn null_fallback(self) -> &'static str {
        match self {
            Self::Int | Self::Check | Self::Float | Self::Currency => "0",
            Self::Date => "'0001-01-01'",
            Self::Datetime => "'0001-01-01 00:00:00.000000'",
            Self::Time => "'00:00:00'",
            Self::Data | Self::Link | Self::Select | Self::Text => "''",
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub field_type: FieldType,
    /// Link target entity for `Link` fields.
    #[serde(default)]
    pub options: Option<String>,
}

impl FieldDef {
    /// Field without options.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            options: None,
        }
    }

    /// `Link` field pointing at `target`.
    pub fn link(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Link,
            options: Some(target.into()),
        }
    }
}

/// Schema of a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntitySchema {
    /// Entity name, without the table prefix.
    pub name: String,
    /// Declared fields; standard fields are implied.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Child-table entities are stored with `parent`/`parenttype` back-references
    /// and may be joined into queries on their parent.
    #[serde(default)]
    pub is_child: bool,
    /// Default ORDER BY column.
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    /// Default ORDER BY direction.
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Serde-friendly default sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Newest or largest first.
    #[default]
    Desc,
}

impl From<SortOrder> for SortDir {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Self::Asc,
            SortOrder::Desc => Self::Desc,
        }
    }
}

fn default_sort_field() -> String {
    "modified".to_string()
}

impl EntitySchema {
    /// Schema with no declared fields, sorted by `modified desc`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            is_child: false,
            sort_field: default_sort_field(),
            sort_order: SortOrder::Desc,
        }
    }

    /// Add a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Mark as a child table.
    pub const fn child(mut self) -> Self {
        self.is_child = true;
        self
    }

    /// Override the default sort.
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = field.into();
        self.sort_order = order;
        self
    }

    /// Look up a declared or standard field.
    pub fn get(&self, field: &str) -> Option<FieldLookup<'_>> {
        if let Some(def) = self.fields.iter().find(|f| f.name == field) {
            return Some(FieldLookup {
                name: &def.name,
                field_type: def.field_type,
                options: def.options.as_deref(),
            });
        }
        STANDARD_FIELDS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(name, field_type)| FieldLookup {
                name,
                field_type: *field_type,
                options: None,
            })
    }

    /// Whether `field` is declared or standard.
    pub fn has_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Every column, standard fields first, without duplicates.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = STANDARD_FIELDS.iter().map(|(name, _)| *name).collect();
        for def in &self.fields {
            if !columns.contains(&def.name.as_str()) {
                columns.push(&def.name);
            }
        }
        columns
    }
}

/// Borrowed view of a resolved field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLookup<'a> {
    /// Column name.
    pub name: &'a str,
    /// Storage type.
    pub field_type: FieldType,
    /// Link target, for `Link` fields.
    pub options: Option<&'a str>,
}
