//! Mapping compiler: `EntitySchema` -> `MappingPlan`

pub mod affinity;
pub mod codec;
pub mod entity;
pub mod plan;
pub mod relation;

pub use affinity::{Affinity, BindOp, DecodeOp};
pub use codec::StoredValue;
pub use entity::CompiledEntity;
pub use plan::{ColumnPlan, MappingPlan, RelationPlan, RelationStrategy};
pub use relation::{related_store, RelatedLookup, RelatedStore, RelationBinding};

use crate::catalog::schema::EntitySchema;

/// Derive the mapping plan for a validated schema
pub fn compile(schema: &EntitySchema) -> MappingPlan {
    let columns: Vec<ColumnPlan> = schema
        .fields
        .iter()
        .map(|f| ColumnPlan {
            field: f.name.clone(),
            column: f.column.clone(),
            semantic: f.semantic,
            affinity: Affinity::of(f.semantic),
            bind: BindOp::of(f.semantic),
            decode: DecodeOp::of(f.semantic),
            primary_key: f.primary_key,
            index: f.index,
        })
        .collect();
    let primary_key = schema.primary_key_index();
    let table = schema.table.as_str();
    let pk_column = columns[primary_key].column.clone();

    let definitions: Vec<String> = columns
        .iter()
        .map(|c| {
            if c.primary_key {
                format!("{} PRIMARY KEY", c.definition())
            } else {
                c.definition()
            }
        })
        .collect();
    let create_table_sql = format!(
        "create table if not exists {}( {} ) WITHOUT ROWID ;",
        table,
        definitions.join(", ")
    );

    let names: Vec<&str> = columns.iter().map(|c| c.column.as_str()).collect();
    let select_fields = names.join(", ");
    let insert_sql = format!(
        "REPLACE into {}({})values({})",
        table,
        select_fields,
        vec!["?"; names.len()].join(", ")
    );
    let delete_sql = format!("delete from {} where {} = ?", table, pk_column);
    let get_sql = format!(
        "select {} from {} where {} = ?",
        select_fields, table, pk_column
    );

    let mut plan = MappingPlan {
        entity: schema.qualified_name.clone(),
        table: schema.table.clone(),
        tag: schema.tag.clone(),
        columns,
        primary_key,
        relations: schema.relations.iter().map(relation::relation_plan).collect(),
        create_table_sql,
        create_index_sql: Vec::new(),
        insert_sql,
        delete_sql,
        get_sql,
        select_fields,
    };
    plan.create_index_sql = plan.indexed_columns().map(|c| plan.index_sql(c)).collect();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::FieldSpec;
    use crate::model::SemanticType;

    fn field(name: &str, semantic: SemanticType, pk: bool, index: bool) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            column: name.to_string(),
            semantic,
            primary_key: pk,
            index,
            accessor: String::new(),
            mutator: String::new(),
        }
    }

    fn person() -> EntitySchema {
        EntitySchema {
            qualified_name: "app::Person".to_string(),
            table: "ts_person".to_string(),
            tag: "default".to_string(),
            fields: vec![
                field("id", SemanticType::Int32, true, false),
                field("name", SemanticType::Text, false, true),
                field("birthday", SemanticType::Timestamp, false, false),
            ],
            primary_key: "id".to_string(),
            relations: Vec::new(),
        }
    }

    #[test]
    fn test_create_table_ddl_is_exact() {
        let plan = compile(&person());
        assert_eq!(
            plan.create_table_sql,
            "create table if not exists ts_person( id INTEGER PRIMARY KEY, name TEXT, birthday INTEGER ) WITHOUT ROWID ;"
        );
    }

    #[test]
    fn test_statement_texts() {
        let plan = compile(&person());
        assert_eq!(
            plan.insert_sql,
            "REPLACE into ts_person(id, name, birthday)values(?, ?, ?)"
        );
        assert_eq!(plan.delete_sql, "delete from ts_person where id = ?");
        assert_eq!(
            plan.get_sql,
            "select id, name, birthday from ts_person where id = ?"
        );
        assert_eq!(
            plan.gets_sql(3),
            "select id, name, birthday from ts_person where id in (?, ?, ?)"
        );
    }

    #[test]
    fn test_index_ddl_for_flagged_columns() {
        let plan = compile(&person());
        assert_eq!(
            plan.create_index_sql,
            vec!["create index if not exists ts_person_name_idx on ts_person(name)".to_string()]
        );
    }

    #[test]
    fn test_select_family_ordering() {
        let plan = compile(&person());
        assert_eq!(
            plan.select_sql(),
            "select id, name, birthday from ts_person order by id"
        );
        assert_eq!(
            plan.select_where_sql("name = ?"),
            "select id, name, birthday from ts_person where name = ? order by id desc"
        );
        assert_eq!(
            plan.select_limit_sql("name"),
            "select id, name, birthday from ts_person order by name limit ? offset ?"
        );
    }

    #[test]
    fn test_aggregate_and_migration_texts() {
        let plan = compile(&person());
        assert_eq!(plan.count_sql(None, None), "select count (1) from ts_person");
        assert_eq!(
            plan.count_sql(Some("id > ?"), Some("name")),
            "select count (1) from ts_person where id > ? group by name"
        );
        assert_eq!(
            plan.sum_sql("id", "name = ?", None),
            "select sum (id) from ts_person where name = ?"
        );
        assert_eq!(
            plan.add_column_sql(&plan.columns[2]),
            "alter table ts_person add column birthday INTEGER"
        );
    }

    #[test]
    fn test_column_name_override() {
        let mut schema = person();
        schema.fields[1].column = "full_name".to_string();
        let plan = compile(&schema);
        assert_eq!(plan.column_for_field("name").map(|c| c.column.as_str()), Some("full_name"));
        assert!(plan.insert_sql.contains("full_name"));
    }
}
