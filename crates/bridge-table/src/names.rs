use crate::error::{Result, TableError};

pub const DEFAULT_SEGMENT_NAME: &str = "/sop-shmem";
pub const DEFAULT_SEMAPHORE_NAME: &str = "/sop-shmem-sem";

const POSIX_NAME_MAX: usize = 255;

/// Names of the shared segment and of the semaphore guarding its creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub segment: String,
    pub semaphore: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            segment: DEFAULT_SEGMENT_NAME.to_string(),
            semaphore: DEFAULT_SEMAPHORE_NAME.to_string(),
        }
    }
}

impl TableNames {
    pub fn new(segment: impl Into<String>, semaphore: impl Into<String>) -> Result<Self> {
        let names = Self {
            segment: segment.into(),
            semaphore: semaphore.into(),
        };
        validate_name(&names.segment)?;
        validate_name(&names.semaphore)?;
        Ok(names)
    }

    /// Default names with `-{tag}` appended, for running several tables side by side.
    pub fn tagged(tag: &str) -> Result<Self> {
        Self::new(
            format!("{DEFAULT_SEGMENT_NAME}-{tag}"),
            format!("{DEFAULT_SEMAPHORE_NAME}-{tag}"),
        )
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(TableError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if !name.starts_with('/') {
        return invalid("name must start with '/'");
    }
    if name.len() == 1 {
        return invalid("name must not be empty after '/'");
    }
    if name[1..].contains('/') {
        return invalid("name must not contain additional '/' characters");
    }
    if name.contains('\0') {
        return invalid("name must not contain NUL bytes");
    }
    if name.len() > POSIX_NAME_MAX {
        return invalid("name length must be <= 255 bytes");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{TableNames, validate_name};
    use crate::error::TableError;

    fn reason(name: &str) -> &'static str {
        match validate_name(name) {
            Err(TableError::InvalidName { reason, .. }) => reason,
            other => panic!("expected InvalidName for {name:?}, got {other:?}"),
        }
    }

    #[test]
    fn accepts_plain_names() {
        assert!(validate_name("/sop-shmem").is_ok());
        assert!(validate_name("/valid_name_123").is_ok());
        assert!(validate_name(&format!("/{}", "a".repeat(254))).is_ok());
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(reason("no-slash"), "name must start with '/'");
        assert_eq!(reason("/"), "name must not be empty after '/'");
        assert_eq!(
            reason("/foo/bar"),
            "name must not contain additional '/' characters"
        );
        assert_eq!(reason("/nul\0byte"), "name must not contain NUL bytes");
        assert_eq!(
            reason(&format!("/{}", "a".repeat(255))),
            "name length must be <= 255 bytes"
        );
    }

    #[test]
    fn tagged_names_keep_defaults_as_prefix() {
        let names = TableNames::tagged("t1").unwrap();
        assert_eq!(names.segment, "/sop-shmem-t1");
        assert_eq!(names.semaphore, "/sop-shmem-sem-t1");
        assert!(TableNames::tagged("a/b").is_err());
        assert_eq!(TableNames::default().segment, "/sop-shmem");
    }
}
