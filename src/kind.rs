use std::fmt;
use std::str::FromStr;

/// The closed set of operation kinds.
///
/// Each kind has a stable name used in the `action_type` column of the change
/// journal, a human-readable label, and a reversibility flag that tells
/// rollback whether an entry can be undone.
///
/// # Examples
///
/// ```
/// use refile::kind::OperationKind;
///
/// let kind: OperationKind = "search_organize".parse().unwrap();
/// assert_eq!(kind, OperationKind::SearchOrganize);
/// assert!(kind.is_reversible());
/// assert!(!OperationKind::DuplicateDelete.is_reversible());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    /// Rename files from an explicit original/new mapping.
    Rename,
    /// Prepend a prefix to files whose name starts with a mapped base name.
    RenamePrefix,
    /// Split names on a delimiter into nested folders.
    Organize,
    /// Find and replace text in file names or extensions.
    Replace,
    /// Move every file in a subtree up to its root.
    Collapse,
    /// Bucket files into folders named after matching search terms.
    SearchOrganize,
    /// Delete redundant members of duplicate groups.
    DuplicateDelete,
}

impl OperationKind {
    /// Every kind, in registry order.
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Rename,
        OperationKind::RenamePrefix,
        OperationKind::Organize,
        OperationKind::Replace,
        OperationKind::Collapse,
        OperationKind::SearchOrganize,
        OperationKind::DuplicateDelete,
    ];

    /// Returns the name written to the journal's `action_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Rename => "rename",
            OperationKind::RenamePrefix => "rename_prefix",
            OperationKind::Organize => "organize",
            OperationKind::Replace => "replace",
            OperationKind::Collapse => "collapse",
            OperationKind::SearchOrganize => "search_organize",
            OperationKind::DuplicateDelete => "duplicate_delete",
        }
    }

    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Rename => "Rename",
            OperationKind::RenamePrefix => "Rename Prefix",
            OperationKind::Organize => "Organize",
            OperationKind::Replace => "Replace",
            OperationKind::Collapse => "Collapse",
            OperationKind::SearchOrganize => "Search & Organize",
            OperationKind::DuplicateDelete => "Delete Duplicates",
        }
    }

    /// Returns true if rollback can undo entries of this kind.
    pub fn is_reversible(&self) -> bool {
        !matches!(self, OperationKind::DuplicateDelete)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a journal row names an unknown kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for OperationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Older journals spell the deletion kind the other way round.
        if s == "delete_duplicate" {
            return Ok(OperationKind::DuplicateDelete);
        }
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_legacy_delete_name_is_accepted() {
        assert_eq!(
            "delete_duplicate".parse::<OperationKind>(),
            Ok(OperationKind::DuplicateDelete)
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = "shred".parse::<OperationKind>().unwrap_err();
        assert_eq!(err, UnknownKind("shred".to_string()));
    }

    #[test]
    fn test_only_duplicate_delete_is_irreversible() {
        let irreversible: Vec<_> = OperationKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_reversible())
            .collect();
        assert_eq!(irreversible, vec![OperationKind::DuplicateDelete]);
    }
}
