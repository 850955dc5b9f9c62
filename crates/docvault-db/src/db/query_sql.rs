//! Translation of [`DocumentQuery`] into PostgreSQL.
//!
//! Column names come from a closed enum and are pushed as SQL text; every
//! caller-supplied value (types, metadata keys, patterns, paging) is bound.

use docvault_core::{DocumentQuery, Predicate, SortTarget};
use sqlx::{Postgres, QueryBuilder};

/// Escape LIKE wildcards so a caller's value only matches literally.
pub fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_where(builder: &mut QueryBuilder<'static, Postgres>, query: &DocumentQuery) {
    builder.push(" WHERE deleted_at IS NULL");

    for predicate in query.predicates() {
        match predicate {
            Predicate::TypeIn(types) => {
                let names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
                builder.push(" AND document_type::text = ANY(");
                builder.push_bind(names);
                builder.push(")");
            }
            Predicate::MetadataContains { key, value } => {
                builder.push(" AND jsonb_typeof(metadata -> ");
                builder.push_bind(key.clone());
                builder.push(") = 'string' AND metadata ->> ");
                builder.push_bind(key.clone());
                builder.push(" ILIKE ");
                builder.push_bind(format!("%{}%", escape_like(value)));
            }
        }
    }
}

fn push_order_by(builder: &mut QueryBuilder<'static, Postgres>, query: &DocumentQuery) {
    builder.push(" ORDER BY ");
    let mut separated = builder.separated(", ");
    for key in query.sort_keys() {
        let column = match key.target {
            SortTarget::Field(field) => field.column(),
            SortTarget::Id => "id",
        };
        separated.push(format!("{} {}", column, key.direction.as_sql()));
    }
}

/// `SELECT *` for one page of matching active documents.
pub fn build_select(query: &DocumentQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM documents");
    push_where(&mut builder, query);
    push_order_by(&mut builder, query);
    builder.push(" LIMIT ");
    builder.push_bind(i64::from(query.page_size()));
    builder.push(" OFFSET ");
    builder.push_bind(query.offset());
    builder
}

/// `COUNT(*)` of every matching active document, ignoring paging.
pub fn build_count(query: &DocumentQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM documents");
    push_where(&mut builder, query);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_core::models::{DocumentType, SortDirection, SortField};

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_select_sql() {
        let query = DocumentQuery::new()
            .type_in([DocumentType::Invoice, DocumentType::Contract])
            .metadata_contains("customer", "acme")
            .order_by(SortField::Filename, SortDirection::Asc)
            .paginate(2, 10);

        let builder = build_select(&query);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM documents WHERE deleted_at IS NULL \
             AND document_type::text = ANY($1) \
             AND jsonb_typeof(metadata -> $2) = 'string' AND metadata ->> $3 ILIKE $4 \
             ORDER BY filename ASC, created_at DESC, id DESC LIMIT $5 OFFSET $6"
        );
    }

    #[test]
    fn test_count_sql_has_no_paging() {
        let query = DocumentQuery::new()
            .metadata_contains("customer", "acme")
            .paginate(3, 5);
        let builder = build_count(&query);
        let sql = builder.sql();
        assert!(sql.starts_with("SELECT COUNT(*) FROM documents WHERE deleted_at IS NULL"));
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_created_at_not_duplicated() {
        let query = DocumentQuery::new().order_by(SortField::CreatedAt, SortDirection::Asc);
        let builder = build_select(&query);
        assert!(builder.sql().contains("ORDER BY created_at ASC, id DESC LIMIT"));
    }
}
