// # EA Differ
//
// Decides whether observed attributes match desired ones once they have
// passed through the authority's lossy storage, and computes the patch that
// closes the gap.
//
// ## Equivalence
//
// For each desired key:
//
// - a scalar or one-element list matches an observed scalar or one-element
//   list holding the same element (the authority collapses `[v]` to `v`)
// - a list of two or more elements matches an observed list with the same
//   elements and multiplicities, in any order
// - an empty value matches an absent or empty observed value
//
// Observed keys the desired map does not mention are ignored in
// [`DiffMode::Managed`] and count as drift in [`DiffMode::Exclusive`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::value::{AttributeMap, AttributeValue, Scalar};

/// How observed attributes outside the desired map are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// Only declared attributes are managed
    #[default]
    Managed,
    /// The desired map is authoritative; extra attributes are removed
    Exclusive,
}

/// Changes needed to bring observed attributes to the desired state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePatch {
    /// Attributes to write, each with its full desired value
    pub to_set: AttributeMap,
    /// Attributes to delete
    pub to_remove: BTreeSet<String>,
}

impl AttributePatch {
    /// True when nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.to_set.is_empty() && self.to_remove.is_empty()
    }
}

/// Compares attribute maps under the collapse-tolerant equivalence
#[derive(Debug, Clone, Default)]
pub struct AttributeDiffer {
    mode: DiffMode,
    retained: BTreeSet<String>,
}

impl AttributeDiffer {
    /// Create a differ for the given mode
    pub fn new(mode: DiffMode) -> Self {
        Self {
            mode,
            retained: BTreeSet::new(),
        }
    }

    /// Attributes owned outside this resource
    ///
    /// Retained attributes are never removed unless the desired map
    /// explicitly clears them, and never count as drift in exclusive mode.
    pub fn with_retained<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retained = names.into_iter().map(Into::into).collect();
        self
    }

    /// The configured mode
    pub fn mode(&self) -> DiffMode {
        self.mode
    }

    /// Whether `observed` satisfies `desired`
    pub fn is_equivalent(&self, desired: &AttributeMap, observed: &AttributeMap) -> bool {
        let declared_match = desired
            .iter()
            .all(|(name, value)| values_equivalent(value, observed.get(name)));

        declared_match
            && match self.mode {
                DiffMode::Managed => true,
                DiffMode::Exclusive => observed
                    .keys()
                    .all(|name| desired.contains_key(name) || self.retained.contains(name)),
            }
    }

    /// Compute the changes that make `observed` equivalent to `desired`
    ///
    /// `cleared` names attributes the caller used to manage and no longer
    /// declares; they are removed when still present remotely.
    pub fn patch(
        &self,
        desired: &AttributeMap,
        observed: &AttributeMap,
        cleared: &BTreeSet<String>,
    ) -> AttributePatch {
        let mut patch = AttributePatch::default();

        for (name, value) in desired {
            let current = observed.get(name);
            if value.is_empty() {
                if current.is_some_and(|v| !v.is_empty()) {
                    patch.to_remove.insert(name.clone());
                }
            } else if !values_equivalent(value, current) {
                patch.to_set.insert(name.clone(), value.clone());
            }
        }

        let removable = |name: &String| {
            !desired.contains_key(name)
                && !self.retained.contains(name)
                && observed.get(name).is_some_and(|v| !v.is_empty())
        };

        patch
            .to_remove
            .extend(cleared.iter().filter(|name| removable(name)).cloned());

        if self.mode == DiffMode::Exclusive {
            patch
                .to_remove
                .extend(observed.keys().filter(|name| removable(name)).cloned());
        }

        patch
    }
}

/// [`AttributeDiffer::is_equivalent`] in managed mode
pub fn is_equivalent(desired: &AttributeMap, observed: &AttributeMap) -> bool {
    AttributeDiffer::default().is_equivalent(desired, observed)
}

/// [`AttributeDiffer::patch`] in managed mode with nothing to clear
pub fn patch(desired: &AttributeMap, observed: &AttributeMap) -> AttributePatch {
    AttributeDiffer::default().patch(desired, observed, &BTreeSet::new())
}

/// Collapse-tolerant comparison of one attribute
pub fn values_equivalent(desired: &AttributeValue, observed: Option<&AttributeValue>) -> bool {
    if desired.is_empty() {
        return observed.is_none_or(AttributeValue::is_empty);
    }

    let Some(observed) = observed else {
        return false;
    };

    if let Some(expected) = desired.single() {
        return observed.single() == Some(expected);
    }

    match (desired, observed) {
        (AttributeValue::List(want), AttributeValue::List(have)) => same_multiset(want, have),
        _ => false,
    }
}

fn same_multiset(a: &[Scalar], b: &[Scalar]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, AttributeValue)]) -> AttributeMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_element_list_matches_collapsed_scalar() {
        let desired = AttributeValue::list(["text3"]);
        assert!(values_equivalent(&desired, Some(&"text3".into())));
        assert!(values_equivalent(&desired, Some(&AttributeValue::list(["text3"]))));
        assert!(!values_equivalent(&desired, Some(&"text4".into())));

        let desired = AttributeValue::from(7);
        assert!(values_equivalent(&desired, Some(&AttributeValue::list([7]))));
    }

    #[test]
    fn test_multi_element_list_is_unordered_multiset() {
        let desired = AttributeValue::list([4, 5]);
        assert!(values_equivalent(&desired, Some(&AttributeValue::list([5, 4]))));
        assert!(!values_equivalent(&desired, Some(&AttributeValue::list([4, 5, 5]))));
        assert!(!values_equivalent(&desired, Some(&AttributeValue::list([4]))));
        assert!(!values_equivalent(&desired, Some(&4.into())));

        let desired = AttributeValue::list(["a", "a", "b"]);
        assert!(!values_equivalent(&desired, Some(&AttributeValue::list(["a", "b", "b"]))));
    }

    #[test]
    fn test_no_numeric_string_coercion() {
        assert!(!values_equivalent(&7.into(), Some(&"7".into())));
    }

    #[test]
    fn test_empty_desired_matches_absent() {
        assert!(values_equivalent(&"".into(), None));
        assert!(values_equivalent(&AttributeValue::List(Vec::new()), None));
        assert!(!values_equivalent(&"".into(), Some(&"x".into())));
    }

    #[test]
    fn test_extra_observed_keys_by_mode() {
        let desired = map(&[("Site", "Test site".into())]);
        let observed = map(&[("Site", "Test site".into()), ("Other", "x".into())]);

        assert!(AttributeDiffer::new(DiffMode::Managed).is_equivalent(&desired, &observed));
        assert!(!AttributeDiffer::new(DiffMode::Exclusive).is_equivalent(&desired, &observed));
        assert!(
            AttributeDiffer::new(DiffMode::Exclusive)
                .with_retained(["Other"])
                .is_equivalent(&desired, &observed)
        );
    }

    #[test]
    fn test_empty_desired_map() {
        let empty = AttributeMap::new();
        let observed = map(&[("Site", "Test site".into())]);

        assert!(is_equivalent(&empty, &observed));
        assert!(!AttributeDiffer::new(DiffMode::Exclusive).is_equivalent(&empty, &observed));
        assert!(AttributeDiffer::new(DiffMode::Exclusive).is_equivalent(&empty, &empty));
    }

    #[test]
    fn test_patch_sets_full_values() {
        let desired = map(&[
            ("Location", "Test loc. 2".into()),
            ("TestEA1", AttributeValue::list(["text1", "text2", "text9"])),
            ("Site", "Test site".into()),
        ]);
        let observed = map(&[
            ("Location", "Test loc.".into()),
            ("TestEA1", AttributeValue::list(["text1", "text2"])),
            ("Site", "Test site".into()),
        ]);

        let patch = patch(&desired, &observed);
        assert_eq!(patch.to_set.len(), 2);
        assert_eq!(
            patch.to_set["TestEA1"],
            AttributeValue::list(["text1", "text2", "text9"])
        );
        assert!(patch.to_remove.is_empty());
    }

    #[test]
    fn test_patch_removes_cleared_but_keeps_retained() {
        let desired = AttributeMap::new();
        let observed = map(&[
            ("Tenant ID", "terraform_test_tenant".into()),
            ("Location", "Test loc. 2".into()),
            ("TestEA1", "text3".into()),
        ]);
        let cleared = names(&["Location", "TestEA1", "TestEA2", "Tenant ID"]);

        let differ = AttributeDiffer::new(DiffMode::Managed).with_retained(["Tenant ID"]);
        let patch = differ.patch(&desired, &observed, &cleared);

        assert!(patch.to_set.is_empty());
        assert_eq!(patch.to_remove, names(&["Location", "TestEA1"]));
    }

    #[test]
    fn test_patch_explicit_empty_value_removes() {
        let desired = map(&[("Site", "".into()), ("Gone", "".into())]);
        let observed = map(&[("Site", "Test site".into())]);

        let patch = patch(&desired, &observed);
        assert_eq!(patch.to_remove, names(&["Site"]));
    }

    #[test]
    fn test_patch_exclusive_removes_unknown_keys() {
        let desired = map(&[("Site", "Test site".into())]);
        let observed = map(&[
            ("Site", "Test site".into()),
            ("Stray", "x".into()),
            ("Tenant ID", "t".into()),
        ]);

        let differ = AttributeDiffer::new(DiffMode::Exclusive).with_retained(["Tenant ID"]);
        let patch = differ.patch(&desired, &observed, &BTreeSet::new());
        assert_eq!(patch.to_remove, names(&["Stray"]));
    }

    #[test]
    fn test_equivalent_maps_produce_empty_patch() {
        let desired = map(&[
            ("TestEA1", AttributeValue::list(["text3"])),
            ("TestEA2", 7.into()),
        ]);
        let observed = map(&[("TestEA1", "text3".into()), ("TestEA2", 7.into())]);

        assert!(is_equivalent(&desired, &observed));
        assert!(patch(&desired, &observed).is_empty());
    }
}
