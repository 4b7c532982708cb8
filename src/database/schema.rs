use sqlx::PgPool;
use tracing::info;

use crate::database::store::StoreError;
use crate::filter::filter_where::FilterWhere;
use crate::models::Collection;

/// DDL for every collection table and its reference indexes. Idempotent.
///
/// Equality filters compile to jsonb containment (`doc->'post' @> $1`), so
/// reference fields get GIN `jsonb_path_ops` indexes on that expression.
pub fn ddl_statements() -> Vec<String> {
    let mut statements = Vec::new();
    for collection in Collection::ALL {
        let table = collection.table_name();
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (id uuid PRIMARY KEY, doc jsonb NOT NULL)",
            table
        ));
        for field in collection.reference_fields() {
            let index = to_snake_case(field);
            // Earlier schemas had btree indexes on the text value
            statements.push(format!("DROP INDEX IF EXISTS \"{}_{}_idx\"", table, index));
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS \"{table}_{index}_ref_idx\" ON \"{table}\" USING GIN (({expr}) jsonb_path_ops)",
                table = table,
                index = index,
                expr = FilterWhere::field_expr(field)
            ));
        }
    }
    statements
}

pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    for statement in ddl_statements() {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Schema migrated for {} collections", Collection::ALL.len());
    Ok(())
}

fn to_snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::filter::{Filter, FilterData};

    #[test]
    fn creates_a_table_per_collection() {
        let ddl = ddl_statements();
        for collection in Collection::ALL {
            let create = format!("CREATE TABLE IF NOT EXISTS \"{}\"", collection.table_name());
            assert!(ddl.iter().any(|s| s.starts_with(&create)));
        }
    }

    #[test]
    fn indexes_reference_fields() {
        let ddl = ddl_statements();
        assert!(ddl.contains(
            &"CREATE INDEX IF NOT EXISTS \"posts_author_ref_idx\" ON \"posts\" USING GIN ((doc->'author') jsonb_path_ops)"
                .to_string()
        ));
        assert!(ddl.iter().any(|s| s.contains("\"comments_parent_comment_ref_idx\"")));
        assert!(ddl.contains(&"DROP INDEX IF EXISTS \"comments_post_idx\"".to_string()));
    }

    #[test]
    fn reference_lookups_use_the_indexed_expression() {
        let ddl = ddl_statements();
        let id = Uuid::new_v4().to_string();
        for collection in Collection::ALL {
            for field in collection.reference_fields() {
                let filter = Filter::from_data(collection.table_name(), &FilterData::new(json!({ *field: id })), None).unwrap();
                let sql = filter.to_delete_sql().query;

                let predicate = format!("{} @> $1", FilterWhere::field_expr(field));
                assert!(sql.contains(&predicate), "{} does not use {}", sql, predicate);

                let index = format!("USING GIN (({}) jsonb_path_ops)", FilterWhere::field_expr(field));
                let table = format!("ON \"{}\"", collection.table_name());
                assert!(
                    ddl.iter().any(|s| s.contains(&index) && s.contains(&table)),
                    "no containment index for {}.{}",
                    collection.table_name(),
                    field
                );
            }
        }
    }
}
