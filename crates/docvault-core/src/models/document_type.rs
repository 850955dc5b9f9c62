use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Closed set of document categories.
///
/// The type itself carries no behavior; bucket routing and role requirements
/// live in [`DOCUMENT_TYPE_POLICIES`] and are looked up through [`policy`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "document_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Attachment,
    Invoice,
    Contract,
    IdentityDocument,
    MedicalCertificate,
    PayrollStatement,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Attachment,
        DocumentType::Invoice,
        DocumentType::Contract,
        DocumentType::IdentityDocument,
        DocumentType::MedicalCertificate,
        DocumentType::PayrollStatement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Attachment => "attachment",
            DocumentType::Invoice => "invoice",
            DocumentType::Contract => "contract",
            DocumentType::IdentityDocument => "identity_document",
            DocumentType::MedicalCertificate => "medical_certificate",
            DocumentType::PayrollStatement => "payroll_statement",
        }
    }

    /// Bucket holding the bytes of documents of this type.
    pub fn bucket(&self) -> &'static str {
        policy(*self).bucket
    }

    pub fn required_roles(&self) -> &'static [&'static str] {
        policy(*self).required_roles
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Invalid document type: {}", s))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentTypePolicy {
    pub document_type: DocumentType,
    pub bucket: &'static str,
    /// Any one of these roles grants access. Empty means unrestricted.
    pub required_roles: &'static [&'static str],
}

pub const ROLE_CONTRACTS: &str = "documents:contracts";
pub const ROLE_IDENTITY: &str = "documents:identity";
pub const ROLE_MEDICAL: &str = "documents:medical";
pub const ROLE_PAYROLL: &str = "documents:payroll";
pub const ROLE_SENSITIVE: &str = "documents:sensitive";

pub static DOCUMENT_TYPE_POLICIES: [DocumentTypePolicy; 6] = [
    DocumentTypePolicy {
        document_type: DocumentType::Attachment,
        bucket: "docvault-attachments",
        required_roles: &[],
    },
    DocumentTypePolicy {
        document_type: DocumentType::Invoice,
        bucket: "docvault-invoices",
        required_roles: &[],
    },
    DocumentTypePolicy {
        document_type: DocumentType::Contract,
        bucket: "docvault-contracts",
        required_roles: &[ROLE_CONTRACTS],
    },
    DocumentTypePolicy {
        document_type: DocumentType::IdentityDocument,
        bucket: "docvault-identity",
        required_roles: &[ROLE_IDENTITY, ROLE_SENSITIVE],
    },
    DocumentTypePolicy {
        document_type: DocumentType::MedicalCertificate,
        bucket: "docvault-medical",
        required_roles: &[ROLE_MEDICAL, ROLE_SENSITIVE],
    },
    DocumentTypePolicy {
        document_type: DocumentType::PayrollStatement,
        bucket: "docvault-payroll",
        required_roles: &[ROLE_PAYROLL],
    },
];

/// Policy entry for a document type.
pub fn policy(document_type: DocumentType) -> &'static DocumentTypePolicy {
    // Table order matches `DocumentType::ALL`
    &DOCUMENT_TYPE_POLICIES[document_type as usize]
}

/// Every bucket referenced by the policy table, deduplicated.
pub fn all_buckets() -> BTreeSet<&'static str> {
    DOCUMENT_TYPE_POLICIES.iter().map(|p| p.bucket).collect()
}
