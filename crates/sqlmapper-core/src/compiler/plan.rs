//! Compiled mapping plan: column layout and SQL text for one entity

use super::affinity::{Affinity, BindOp, DecodeOp};
use crate::model::{Cardinality, SemanticType};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnPlan {
    pub field: String,
    pub column: String,
    pub semantic: SemanticType,
    pub affinity: Affinity,
    pub bind: BindOp,
    pub decode: DecodeOp,
    pub primary_key: bool,
    pub index: bool,
}

impl ColumnPlan {
    /// `<col> <AFFINITY>`, as used by both create and alter statements
    pub fn definition(&self) -> String {
        format!("{} {}", self.column, self.affinity.as_sql())
    }

    /// Name of the secondary index for this column
    pub fn index_name(&self, table: &str) -> String {
        format!("{}_{}_idx", table, self.column)
    }
}

/// Resolution procedure for one relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationStrategy {
    /// One batched fetch; first matching target attached per row
    BatchedSingle,
    /// One batched fetch; every matching target appended per row
    BatchedCollection,
    /// Per row: parse the comma-joined key text and fetch
    CommaJoined,
}

impl RelationStrategy {
    pub fn select(cardinality: Cardinality, link_type: SemanticType) -> Self {
        match (cardinality, link_type) {
            (_, SemanticType::Text) => RelationStrategy::CommaJoined,
            (Cardinality::Single, _) => RelationStrategy::BatchedSingle,
            (Cardinality::List | Cardinality::Set, _) => RelationStrategy::BatchedCollection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationPlan {
    pub name: String,
    pub cardinality: Cardinality,
    pub strategy: RelationStrategy,
    pub link_field: String,
    pub target: String,
}

/// Everything the mapper needs to run statements for one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingPlan {
    pub entity: String,
    pub table: String,
    pub tag: String,
    pub columns: Vec<ColumnPlan>,
    pub primary_key: usize,
    pub relations: Vec<RelationPlan>,
    pub create_table_sql: String,
    pub create_index_sql: Vec<String>,
    pub insert_sql: String,
    pub delete_sql: String,
    pub get_sql: String,
    /// `col, col, ...` in column order
    pub select_fields: String,
}

impl MappingPlan {
    pub fn pk_column(&self) -> &ColumnPlan {
        &self.columns[self.primary_key]
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }

    pub fn column_for_field(&self, field: &str) -> Option<&ColumnPlan> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn indexed_columns(&self) -> impl Iterator<Item = &ColumnPlan> {
        self.columns.iter().filter(|c| c.index)
    }

    fn select_from(&self) -> String {
        format!("select {} from {}", self.select_fields, self.table)
    }

    /// `... where <pk> in (?, ?, ...)` for `n` keys
    pub fn gets_sql(&self, n: usize) -> String {
        let marks = vec!["?"; n].join(", ");
        format!(
            "{} where {} in ({})",
            self.select_from(),
            self.pk_column().column,
            marks
        )
    }

    /// All rows ordered by primary key
    pub fn select_sql(&self) -> String {
        self.select_ordered_sql(&self.pk_column().column)
    }

    pub fn select_ordered_sql(&self, order: &str) -> String {
        format!("{} order by {}", self.select_from(), order)
    }

    /// Two trailing parameters: limit, offset
    pub fn select_limit_sql(&self, order: &str) -> String {
        format!("{} limit ? offset ?", self.select_ordered_sql(order))
    }

    /// Filtered rows, newest primary key first
    pub fn select_where_sql(&self, predicate: &str) -> String {
        self.select_where_ordered_sql(predicate, &format!("{} desc", self.pk_column().column))
    }

    pub fn select_where_ordered_sql(&self, predicate: &str, order: &str) -> String {
        format!(
            "{} where {} order by {}",
            self.select_from(),
            predicate,
            order
        )
    }

    /// Two trailing parameters: limit, offset
    pub fn select_where_limit_sql(&self, predicate: &str, order: &str) -> String {
        format!(
            "{} limit ? offset ?",
            self.select_where_ordered_sql(predicate, order)
        )
    }

    pub fn count_sql(&self, predicate: Option<&str>, group_by: Option<&str>) -> String {
        self.aggregate_sql("count (1)", predicate, group_by)
    }

    pub fn sum_sql(&self, field: &str, predicate: &str, group_by: Option<&str>) -> String {
        self.aggregate_sql(&format!("sum ({})", field), Some(predicate), group_by)
    }

    fn aggregate_sql(&self, expr: &str, predicate: Option<&str>, group_by: Option<&str>) -> String {
        let mut sql = format!("select {} from {}", expr, self.table);
        if let Some(predicate) = predicate {
            sql.push_str(" where ");
            sql.push_str(predicate);
        }
        if let Some(group_by) = group_by {
            sql.push_str(" group by ");
            sql.push_str(group_by);
        }
        sql
    }

    pub fn delete_where_sql(&self, predicate: &str) -> String {
        format!("delete from {} where {}", self.table, predicate)
    }

    pub fn update_where_sql(&self, assignments: &str, predicate: &str) -> String {
        format!("update {} set {} where {}", self.table, assignments, predicate)
    }

    pub fn add_column_sql(&self, column: &ColumnPlan) -> String {
        format!("alter table {} add column {}", self.table, column.definition())
    }

    pub fn index_sql(&self, column: &ColumnPlan) -> String {
        format!(
            "create index if not exists {} on {}({})",
            column.index_name(&self.table),
            self.table,
            column.column
        )
    }
}
