//! Category-based access restriction

use videoseek_common::CategoryId;

/// The set of categories a requester may search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryAccess {
    /// No restriction: any category is permitted
    Unrestricted,
    /// Only the listed categories; an empty list means zero access
    Restricted(Vec<CategoryId>),
}

impl CategoryAccess {
    /// True when the requester can see nothing at all.
    #[must_use]
    pub fn denies_everything(&self) -> bool {
        matches!(self, Self::Restricted(ids) if ids.is_empty())
    }

    /// Whether an explicitly requested category must be rejected.
    ///
    /// Unrestricted access always permits an explicit request; a restricted
    /// but empty set defers to the zero-access short-circuit instead of
    /// rejecting.
    #[must_use]
    pub fn rejects(&self, requested: CategoryId) -> bool {
        match self {
            Self::Unrestricted => false,
            Self::Restricted(ids) => !ids.is_empty() && !ids.contains(&requested),
        }
    }

    /// The explicit id set, when restricted and non-empty.
    #[must_use]
    pub fn allowed_ids(&self) -> Option<&[CategoryId]> {
        match self {
            Self::Unrestricted => None,
            Self::Restricted(ids) if ids.is_empty() => None,
            Self::Restricted(ids) => Some(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_permits_any_request() {
        let access = CategoryAccess::Unrestricted;
        assert!(!access.rejects(3));
        assert!(!access.denies_everything());
        assert!(access.allowed_ids().is_none());
    }

    #[test]
    fn test_restricted_set_rejects_outside_category() {
        let access = CategoryAccess::Restricted(vec![1, 2]);
        assert!(access.rejects(3));
        assert!(!access.rejects(1));
        assert_eq!(access.allowed_ids(), Some(&[1, 2][..]));
    }

    #[test]
    fn test_empty_set_denies_everything_but_does_not_reject() {
        let access = CategoryAccess::Restricted(vec![]);
        assert!(access.denies_everything());
        // The empty set short-circuits to an empty result before any
        // per-category rejection applies.
        assert!(!access.rejects(3));
        assert!(access.allowed_ids().is_none());
    }
}
