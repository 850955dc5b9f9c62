//! Role-based gating of document types.
//!
//! A caller may act on a document type when the type requires no roles, or
//! when the caller holds at least one of the roles the type lists. The check
//! runs before any operation that mutates or reveals document state.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{policy, DocumentType};

/// Document types the given grants unlock.
pub fn authorized_types(role_grants: &HashSet<String>) -> BTreeSet<DocumentType> {
    DocumentType::ALL
        .into_iter()
        .filter(|document_type| {
            let required = policy(*document_type).required_roles;
            required.is_empty() || required.iter().any(|role| role_grants.contains(*role))
        })
        .collect()
}

/// Determine the effective type of a request.
///
/// When a UUID is supplied its stored type (soft-deleted rows included) wins
/// over the literal type sent alongside it. Falls back to the literal when
/// there is no UUID or the UUID is unbound.
pub async fn resolve_type<F, Fut>(
    uuid: Option<Uuid>,
    literal: Option<DocumentType>,
    lookup: F,
) -> Result<Option<DocumentType>, AppError>
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = Result<Option<DocumentType>, AppError>>,
{
    if let Some(uuid) = uuid {
        if let Some(stored) = lookup(uuid).await? {
            return Ok(Some(stored));
        }
    }
    Ok(literal)
}

/// Reject a type the caller is not authorized for. `None` always passes.
pub fn authorize(
    document_type: Option<DocumentType>,
    authorized: &BTreeSet<DocumentType>,
) -> Result<(), AppError> {
    match document_type {
        Some(document_type) if !authorized.contains(&document_type) => {
            tracing::warn!(
                document_type = %document_type,
                "Access denied for document type"
            );
            Err(AppError::AccessDenied(format!(
                "Not authorized for document type '{}'",
                document_type
            )))
        }
        _ => Ok(()),
    }
}
