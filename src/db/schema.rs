//! Schema description types.
//!
//! Represents the queryable tables of one schema namespace as an ordered
//! mapping from fully-qualified table name to its columns, plus the foreign
//! keys between them, and renders it for the model prompt.

use serde::{Deserialize, Serialize};

/// Ordered description of the tables in one schema namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaDescription {
    /// Schema namespace the tables belong to.
    pub namespace: String,

    /// Tables in catalog order.
    pub tables: Vec<Table>,

    /// Foreign key relationships between tables of the namespace.
    pub foreign_keys: Vec<ForeignKey>,
}

impl SchemaDescription {
    /// Creates an empty description for a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Builds a description from catalog rows of `(table, column, type)`.
    ///
    /// Rows must already be ordered by table and ordinal position; columns are
    /// grouped under their table in the order they arrive.
    pub fn from_catalog_rows<I>(namespace: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut description = Self::new(namespace);

        for (table, column, data_type) in rows {
            let column = Column::new(column, data_type);
            // Search from the back: grouped rows always hit the last table.
            match description.tables.iter_mut().rev().find(|t| t.name == table) {
                Some(existing) => existing.columns.push(column),
                None => description.tables.push(Table {
                    name: table,
                    columns: vec![column],
                }),
            }
        }

        description
    }

    /// Adds foreign keys to the description.
    pub fn with_foreign_keys(mut self, foreign_keys: Vec<ForeignKey>) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    /// Returns true if no tables were found.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns the fully-qualified name of a table.
    pub fn qualified_name(&self, table: &Table) -> String {
        if self.namespace.is_empty() {
            table.name.clone()
        } else {
            format!("{}.{}", self.namespace, table.name)
        }
    }

    /// Looks up a table by its unqualified name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Formats the schema for inclusion in the system prompt.
    ///
    /// One line per table: `ns.table: col (type), col (type)`, followed by a
    /// foreign key section when any exist.
    pub fn format_for_llm(&self) -> String {
        let table_lines = self
            .tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.data_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", self.qualified_name(table), columns)
            })
            .collect::<Vec<_>>()
            .join("\n");

        if self.foreign_keys.is_empty() {
            return table_lines;
        }

        let fk_lines = self
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "  - {}.{}({}) -> {}.{}({})",
                    self.namespace,
                    fk.from_table,
                    fk.from_columns.join(", "),
                    self.namespace,
                    fk.to_table,
                    fk.to_columns.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!("{table_lines}\n\nForeign keys:\n{fk_lines}")
    }
}

/// A table and its columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Table {
    /// Unqualified table name.
    pub name: String,

    /// Columns in ordinal order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a table with the given columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// A column with its declared type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared data type, as reported by the catalog.
    pub data_type: String,
}

impl Column {
    /// Creates a column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A foreign key relationship between two tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing table.
    pub from_table: String,

    /// Referencing columns.
    pub from_columns: Vec<String>,

    /// Referenced table.
    pub to_table: String,

    /// Referenced columns.
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a foreign key.
    pub fn new(
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}
