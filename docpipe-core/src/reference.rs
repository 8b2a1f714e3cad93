//! Database identity and collection/document references.
//!
//! Every reference carries the [`DatabaseId`] it was created from so that builders can
//! reject references that point into another database.

use std::fmt;

use crate::error::{PipelineError, PipelineResult};

/// Identifies one logical database: a project plus a database name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseId {
    project_id: String,
    database_id: String,
}

impl DatabaseId {
    pub const DEFAULT_DATABASE: &'static str = "(default)";

    pub fn new(project_id: &str, database_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            database_id: database_id.to_string(),
        }
    }

    /// The `(default)` database of a project.
    pub fn default_database(project_id: &str) -> Self {
        Self::new(project_id, Self::DEFAULT_DATABASE)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// `projects/{project}/databases/{database}`
    pub fn resource_name(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database_id)
    }

    /// Root under which document resource names live.
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.resource_name())
    }

    pub fn collection(&self, path: &str) -> PipelineResult<CollectionReference> {
        CollectionReference::new(self.clone(), path)
    }

    pub fn doc(&self, path: &str) -> PipelineResult<DocumentReference> {
        DocumentReference::new(self.clone(), path)
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_name())
    }
}

/// Fails with [`PipelineError::DatabaseMismatch`] naming both databases.
pub(crate) fn ensure_same_database(expected: &DatabaseId, actual: &DatabaseId) -> PipelineResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::DatabaseMismatch {
            expected: expected.resource_name(),
            actual: actual.resource_name(),
        })
    }
}

/// Splits a slash separated path, tolerating one leading/trailing slash.
fn split_path(path: &str) -> PipelineResult<Vec<String>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidArgument(
            "path must not be empty".to_string(),
        ));
    }
    let segments: Vec<String> = trimmed.split('/').map(|s| s.to_string()).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PipelineError::InvalidArgument(format!(
            "path '{}' contains an empty segment",
            path
        )));
    }
    Ok(segments)
}

/// A collection at an odd-length path, e.g. `books` or `books/b1/reviews`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionReference {
    database: DatabaseId,
    path: String,
}

impl CollectionReference {
    pub fn new(database: DatabaseId, path: &str) -> PipelineResult<Self> {
        let segments = split_path(path)?;
        if segments.len() % 2 == 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "'{}' is a document path, not a collection path",
                path
            )));
        }
        Ok(Self {
            database,
            path: segments.join("/"),
        })
    }

    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Document that owns this subcollection, if any.
    pub fn parent(&self) -> Option<DocumentReference> {
        let (parent, _) = self.path.rsplit_once('/')?;
        Some(DocumentReference {
            database: self.database.clone(),
            path: parent.to_string(),
        })
    }

    pub fn doc(&self, id: &str) -> PipelineResult<DocumentReference> {
        DocumentReference::new(self.database.clone(), &format!("{}/{}", self.path, id))
    }
}

/// A document at an even-length path, e.g. `books/b1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    database: DatabaseId,
    path: String,
}

impl DocumentReference {
    pub fn new(database: DatabaseId, path: &str) -> PipelineResult<Self> {
        let segments = split_path(path)?;
        if segments.len() % 2 != 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "'{}' is a collection path, not a document path",
                path
            )));
        }
        Ok(Self {
            database,
            path: segments.join("/"),
        })
    }

    /// Parses `projects/{p}/databases/{d}/documents/{path}`.
    pub fn from_resource_name(name: &str) -> PipelineResult<Self> {
        let invalid = || PipelineError::InvalidArgument(format!("invalid document resource name '{}'", name));

        let rest = name.strip_prefix("projects/").ok_or_else(invalid)?;
        let (project, rest) = rest.split_once("/databases/").ok_or_else(invalid)?;
        let (database, path) = rest.split_once("/documents/").ok_or_else(invalid)?;
        if project.is_empty() || database.is_empty() {
            return Err(invalid());
        }
        Self::new(DatabaseId::new(project, database), path)
    }

    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn parent(&self) -> CollectionReference {
        let parent = self
            .path
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or_default();
        CollectionReference {
            database: self.database.clone(),
            path: parent.to_string(),
        }
    }

    pub fn collection(&self, id: &str) -> PipelineResult<CollectionReference> {
        CollectionReference::new(self.database.clone(), &format!("{}/{}", self.path, id))
    }

    /// Fully qualified name used for reference literals.
    pub fn resource_name(&self) -> String {
        format!("{}/{}", self.database.documents_root(), self.path)
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> DatabaseId {
        DatabaseId::default_database("test-project")
    }

    #[test]
    fn test_database_resource_name() {
        assert_eq!(db().resource_name(), "projects/test-project/databases/(default)");
        assert_eq!(
            DatabaseId::new("p", "other").documents_root(),
            "projects/p/databases/other/documents"
        );
    }

    #[test]
    fn test_collection_paths() {
        let books = db().collection("/books/").unwrap();
        assert_eq!(books.path(), "books");
        assert_eq!(books.id(), "books");
        assert!(books.parent().is_none());

        let reviews = db().collection("books/b1/reviews").unwrap();
        assert_eq!(reviews.id(), "reviews");
        assert_eq!(reviews.parent().unwrap().path(), "books/b1");

        assert!(db().collection("books/b1").is_err());
        assert!(db().collection("").is_err());
        assert!(db().collection("books//reviews").is_err());
    }

    #[test]
    fn test_document_paths() {
        let doc = db().doc("books/b1").unwrap();
        assert_eq!(doc.id(), "b1");
        assert_eq!(doc.parent().path(), "books");
        assert_eq!(
            doc.resource_name(),
            "projects/test-project/databases/(default)/documents/books/b1"
        );
        assert!(db().doc("books").is_err());

        let nested = doc.collection("reviews").unwrap().doc("r1").unwrap();
        assert_eq!(nested.path(), "books/b1/reviews/r1");
    }

    #[test]
    fn test_from_resource_name() {
        let doc = DocumentReference::from_resource_name(
            "projects/p/databases/other/documents/books/b1",
        )
        .unwrap();
        assert_eq!(doc.database(), &DatabaseId::new("p", "other"));
        assert_eq!(doc.path(), "books/b1");

        assert!(DocumentReference::from_resource_name("books/b1").is_err());
        assert!(DocumentReference::from_resource_name("projects/p/databases/d/documents/books").is_err());
    }

    #[test]
    fn test_ensure_same_database() {
        assert!(ensure_same_database(&db(), &db()).is_ok());

        let err = ensure_same_database(&db(), &DatabaseId::new("test-project", "other")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("projects/test-project/databases/(default)"));
        assert!(message.contains("projects/test-project/databases/other"));
    }
}
