//! Model schema description and its resolved metadata (mappings, primary key, SQL templates).

use crate::error::SchemaError;
use crate::orm::field::Field;
use std::collections::{HashMap, HashSet};

/// Attribute names reserved for model metadata; fields with these names are not mapped.
pub const RESERVED_NAMES: &[&str] = &[
    "__table__",
    "__mappings__",
    "__primary_key__",
    "__fields__",
    "__select__",
    "__insert__",
    "__update__",
    "__delete__",
];

/// Declarative description of one model: its name, optional table and ordered fields.
#[derive(Clone, Debug)]
pub struct ModelSchema {
    pub name: String,
    pub table: Option<String>,
    pub fields: Vec<(String, Field)>,
}

impl ModelSchema {
    pub fn new(name: &str) -> Self {
        ModelSchema {
            name: name.to_string(),
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn field(mut self, attr: &str, field: Field) -> Self {
        self.fields.push((attr.to_string(), field));
        self
    }
}

/// Resolved model metadata. Computed once per model and shared by every instance.
#[derive(Clone, Debug)]
pub struct ModelMeta {
    pub model_name: String,
    pub table_name: String,
    pub mappings: HashMap<String, Field>,
    pub primary_key: String,
    /// Non-key attribute names in declaration order.
    pub fields: Vec<String>,
    pub select_sql: String,
    pub insert_sql: String,
    pub update_sql: String,
    pub delete_sql: String,
}

impl ModelMeta {
    pub fn field(&self, attr: &str) -> Option<&Field> {
        self.mappings.get(attr)
    }

    /// Column name of an attribute (override or attribute name).
    pub fn column<'a>(&'a self, attr: &'a str) -> &'a str {
        self.mappings.get(attr).map(|f| f.column(attr)).unwrap_or(attr)
    }

    /// Primary key first, then the other fields in declaration order.
    pub fn all_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_key.as_str()).chain(self.fields.iter().map(String::as_str))
    }
}

/// Quote identifier for PostgreSQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Select-list entry for an attribute; aliases the column back to the attribute when they differ.
fn select_entry(attr: &str, field: &Field) -> String {
    let column = field.column(attr);
    if column == attr {
        quoted(column)
    } else {
        format!("{} AS {}", quoted(column), quoted(attr))
    }
}

/// Build model metadata from a schema description.
/// Fails when no field, or more than one, is marked as primary key.
pub fn resolve(schema: &ModelSchema) -> Result<ModelMeta, SchemaError> {
    let table_name = schema.table.clone().unwrap_or_else(|| schema.name.clone());
    tracing::info!(model = %schema.name, table = %table_name, "found model");

    let mut mappings = HashMap::new();
    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    let mut primary_key: Option<String> = None;

    for (attr, field) in &schema.fields {
        if RESERVED_NAMES.contains(&attr.as_str()) {
            tracing::warn!(model = %schema.name, field = %attr, "reserved name, field not mapped");
            continue;
        }
        if !seen.insert(attr.as_str()) {
            return Err(SchemaError::DuplicateField {
                model: schema.name.clone(),
                field: attr.clone(),
            });
        }
        tracing::debug!(model = %schema.name, "found mapping {} => {}", attr, field);
        if field.primary_key {
            if primary_key.is_some() {
                return Err(SchemaError::DuplicatePrimaryKey {
                    model: schema.name.clone(),
                    field: attr.clone(),
                });
            }
            primary_key = Some(attr.clone());
        } else {
            fields.push(attr.clone());
        }
        mappings.insert(attr.clone(), field.clone());
    }

    let primary_key = primary_key.ok_or_else(|| SchemaError::MissingPrimaryKey {
        model: schema.name.clone(),
    })?;

    let table = quoted(&table_name);
    let pk_field = &mappings[&primary_key];
    let pk_column = quoted(pk_field.column(&primary_key));
    let columns: Vec<String> = fields
        .iter()
        .map(|f| quoted(mappings[f].column(f)))
        .collect();

    let mut select_list = vec![select_entry(&primary_key, pk_field)];
    select_list.extend(fields.iter().map(|f| select_entry(f, &mappings[f])));

    let mut insert_columns = columns.clone();
    insert_columns.push(pk_column.clone());

    let select_sql = format!("select {} from {}", select_list.join(", "), table);
    let insert_sql = format!(
        "insert into {} ({}) values ({})",
        table,
        insert_columns.join(", "),
        placeholders(insert_columns.len())
    );
    let update_sql = format!(
        "update {} set {} where {} = ?",
        table,
        columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", "),
        pk_column
    );
    let delete_sql = format!("delete from {} where {} = ?", table, pk_column);

    Ok(ModelMeta {
        model_name: schema.name.clone(),
        table_name,
        mappings,
        primary_key,
        fields,
        select_sql,
        insert_sql,
        update_sql,
        delete_sql,
    })
}
