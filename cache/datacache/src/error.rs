//! Error types for cache operations.
//!
//! Misses are not errors: lookups report absence through `Option`. These
//! variants cover caller mistakes and refusals.

use crate::client::ClientTag;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// An item with this tag is already cached in the section and the
    /// section rejects duplicates.
    #[error("client tag {0} already cached")]
    DuplicateTag(ClientTag),

    /// The item is locked and the operation was not forced past locks.
    #[error("item is locked")]
    Locked,

    /// The handle is the invalid sentinel, stale, or belongs to another
    /// section.
    #[error("invalid handle")]
    InvalidHandle,

    /// A section with this name is already registered.
    #[error("section '{0}' already exists")]
    DuplicateSection(String),

    /// The section was removed from its cache.
    #[error("section removed")]
    SectionRemoved,

    /// The handle table cannot hold more items.
    #[error("handle table full")]
    TableFull,

    /// The client factory declined to build the resource.
    #[error("client failed to create resource")]
    CreateFailed,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        assert_eq!(
            format!("{}", CacheError::DuplicateTag(ClientTag::new(42))),
            "client tag 42 already cached"
        );
        assert_eq!(format!("{}", CacheError::Locked), "item is locked");
        assert_eq!(format!("{}", CacheError::InvalidHandle), "invalid handle");
        assert_eq!(
            format!("{}", CacheError::DuplicateSection("ModelMesh".into())),
            "section 'ModelMesh' already exists"
        );
        assert_eq!(format!("{}", CacheError::SectionRemoved), "section removed");
        assert_eq!(format!("{}", CacheError::TableFull), "handle table full");
        assert_eq!(
            format!("{}", CacheError::CreateFailed),
            "client failed to create resource"
        );
    }

    #[test]
    fn test_error_is_error_trait() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<CacheError>();
    }

    #[test]
    fn test_cache_result_err() {
        let result: CacheResult<()> = Err(CacheError::Locked);
        assert!(matches!(result, Err(CacheError::Locked)));
    }
}
