//! Construct paths and logical id allocation

use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the hash suffix appended to logical ids
const HASH_SUFFIX_LEN: usize = 8;

/// Maximum length of the human readable part of a logical id
const MAX_HUMAN_LEN: usize = 240;

/// Position of a construct in the stack tree
///
/// The first segment is the stack itself and never contributes to
/// logical ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    pub fn stack(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        Self { segments }
    }

    /// Last path segment
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Stable, template-safe id for the construct at this path.
    ///
    /// Alphanumeric path components (consecutive duplicates removed) followed
    /// by an uppercase hash of the full path below the stack.
    pub fn logical_id(&self) -> String {
        let components = &self.segments[1.min(self.segments.len())..];

        let mut human = String::new();
        let mut previous: Option<&str> = None;
        for component in components {
            if previous == Some(component.as_str()) {
                continue;
            }
            human.extend(component.chars().filter(char::is_ascii_alphanumeric));
            previous = Some(component);
        }
        human.truncate(MAX_HUMAN_LEN);

        let digest = Sha256::digest(components.join("/").as_bytes());
        let suffix = hex::encode_upper(digest);
        format!("{}{}", human, &suffix[..HASH_SUFFIX_LEN])
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_is_stable() {
        let a = Scope::stack("AirflowOnFargateStack").child("VPC");
        let b = Scope::stack("AirflowOnFargateStack").child("VPC");
        assert_eq!(a.logical_id(), b.logical_id());
        assert!(a.logical_id().starts_with("VPC"));
        assert_eq!(a.logical_id().len(), "VPC".len() + HASH_SUFFIX_LEN);
    }

    #[test]
    fn test_logical_id_strips_punctuation() {
        let scope = Scope::stack("Stack").child("RDS-PostgreSQL").child("AirflowDB");
        let id = scope.logical_id();
        assert!(id.starts_with("RDSPostgreSQLAirflowDB"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_logical_id_distinguishes_paths_with_same_characters() {
        let a = Scope::stack("Stack").child("A-B").child("C");
        let b = Scope::stack("Stack").child("AB").child("C");
        assert_ne!(a.logical_id(), b.logical_id());
    }

    #[test]
    fn test_consecutive_duplicates_are_collapsed() {
        let scope = Scope::stack("Stack")
            .child("AirflowService")
            .child("AirflowService");
        assert!(scope.logical_id().starts_with("AirflowService"));
        assert!(!scope.logical_id().starts_with("AirflowServiceAirflowService"));
    }

    #[test]
    fn test_path_and_id() {
        let scope = Scope::stack("Stack").child("DagTasks").child("FileSystem");
        assert_eq!(scope.path(), "Stack/DagTasks/FileSystem");
        assert_eq!(scope.id(), "FileSystem");
        assert_eq!(scope.to_string(), "Stack/DagTasks/FileSystem");
    }
}
