use crate::db::store::StoreError;

/// Collection names under `public/data` that cannot double as sentence book ids.
const RESERVED_SEGMENTS: &[&str] = &["users", "sentences"];

/// Builds collection paths for one app id (`artifacts/{app_id}/...`).
#[derive(Debug, Clone)]
pub(crate) struct CollectionPaths {
    app_id: String,
}

impl CollectionPaths {
    pub(crate) fn new(app_id: impl Into<String>) -> Self {
        Self { app_id: app_id.into() }
    }

    pub(crate) fn users(&self) -> String {
        format!("artifacts/{}/public/data/users", self.app_id)
    }

    pub(crate) fn sentence_catalog(&self) -> String {
        format!("artifacts/{}/public/data/sentences", self.app_id)
    }

    pub(crate) fn sentence_items(&self, dataset_id: &str) -> String {
        format!("artifacts/{}/public/data/{dataset_id}", self.app_id)
    }

    pub(crate) fn vocabulary(&self, user: &str) -> String {
        format!("artifacts/{}/users/{user}/vocabulary", self.app_id)
    }

    pub(crate) fn sentence_progress(&self, user: &str) -> String {
        format!("artifacts/{}/users/{user}/sentence_progress", self.app_id)
    }
}

/// A document id or path component: non-empty, no slashes, not `.`/`..`.
pub(crate) fn validate_segment(value: &str) -> Result<(), StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed != value || value.contains('/') || value == "." || value == ".."
    {
        return Err(StoreError::InvalidPath(value.to_string()));
    }
    Ok(())
}

/// Dataset ids also key `sentence_stats` through dotted update paths, so no dots.
pub(crate) fn validate_dataset_id(value: &str) -> Result<(), StoreError> {
    validate_segment(value)?;
    if RESERVED_SEGMENTS.contains(&value) || value.contains('.') {
        return Err(StoreError::InvalidPath(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_artifact_layout() {
        let paths = CollectionPaths::new("flashcard-pro-v1");
        assert_eq!(paths.users(), "artifacts/flashcard-pro-v1/public/data/users");
        assert_eq!(paths.sentence_catalog(), "artifacts/flashcard-pro-v1/public/data/sentences");
        assert_eq!(paths.sentence_items("junior_100"), "artifacts/flashcard-pro-v1/public/data/junior_100");
        assert_eq!(paths.vocabulary("Neo"), "artifacts/flashcard-pro-v1/users/Neo/vocabulary");
        assert_eq!(
            paths.sentence_progress("Neo"),
            "artifacts/flashcard-pro-v1/users/Neo/sentence_progress"
        );
    }

    #[test]
    fn segments_reject_separators() {
        assert!(validate_segment("Neo").is_ok());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("").is_err());
        assert!(validate_segment(" Neo").is_err());
        assert!(validate_segment("..").is_err());
    }

    #[test]
    fn dataset_ids_cannot_shadow_shared_collections() {
        assert!(validate_dataset_id("junior_100").is_ok());
        assert!(validate_dataset_id("users").is_err());
        assert!(validate_dataset_id("sentences").is_err());
        assert!(validate_dataset_id("book.v2").is_err());
    }
}
