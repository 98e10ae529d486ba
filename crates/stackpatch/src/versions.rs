//! Versioned resources.
//!
//! A resource that cannot be changed in place is replaced by a copy with a
//! higher version suffix: `CustomAMI`, `CustomAMIv1`, `CustomAMIv2`, ...
//! Resources that share a base name form a [`Family`]. The member with the
//! highest ordinal is the current one.
//!
//! [`add_version`] copies the current member, lets the caller update the
//! copy, inserts it under the next name and moves references over to it.
//! [`prune`] then drops the oldest members.

use indexmap::IndexMap;
use log::{debug, info, warn};

use stackpatch_core::{Document, Entry, Node};

use crate::references;

/// A resource name split into base name and ordinal.
///
/// `Name` has ordinal 0, `Namev3` has ordinal 3. A suffix with a leading
/// zero (`Namev0`, `Namev01`) is not a version suffix; such names are base
/// names in their own right.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedName {
    base: String,
    ordinal: u32,
}

impl VersionedName {
    /// Splits `name` at its last `v<digits>` suffix.
    pub fn parse(name: &str) -> Self {
        let split = name.rfind('v').and_then(|idx| {
            let (base, digits) = (&name[..idx], &name[idx + 1..]);
            let canonical = !base.is_empty()
                && !digits.starts_with('0')
                && !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit());
            if !canonical {
                return None;
            }
            digits.parse::<u32>().ok().map(|ordinal| (base, ordinal))
        });

        match split {
            Some((base, ordinal)) => Self {
                base: base.to_string(),
                ordinal,
            },
            None => Self {
                base: name.to_string(),
                ordinal: 0,
            },
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Returns the name of the following version.
    pub fn next(&self) -> VersionedName {
        VersionedName {
            base: self.base.clone(),
            ordinal: self.ordinal.saturating_add(1),
        }
    }

    /// Returns the resource name.
    pub fn name(&self) -> String {
        match self.ordinal {
            0 => self.base.clone(),
            ordinal => format!("{}v{ordinal}", self.base),
        }
    }
}

/// Resources sharing a base name, ordered by ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    base: String,
    members: Vec<(u32, String)>,
}

impl Family {
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Member names from oldest to newest.
    pub fn members(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.members.iter().map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Name of the member with the highest ordinal.
    pub fn current(&self) -> Option<&str> {
        self.members.last().map(|(_, name)| name.as_str())
    }

    /// Name for a new member, one past the highest ordinal.
    pub fn next_name(&self) -> String {
        let ordinal = self.members.last().map_or(0, |(ordinal, _)| *ordinal);
        VersionedName {
            base: self.base.clone(),
            ordinal,
        }
        .next()
        .name()
    }

    fn push(&mut self, name: String) {
        let ordinal = VersionedName::parse(&name).ordinal();
        self.members.push((ordinal, name));
        self.members.sort_by_key(|(ordinal, _)| *ordinal);
    }
}

/// Groups names into families, in order of first appearance.
pub fn families<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Family> {
    let mut groups: IndexMap<String, Vec<(u32, String)>> = IndexMap::new();
    for name in names {
        let parsed = VersionedName::parse(name);
        groups
            .entry(parsed.base)
            .or_default()
            .push((parsed.ordinal, name.to_string()));
    }

    groups
        .into_iter()
        .map(|(base, mut members)| {
            members.sort_by_key(|(ordinal, _)| *ordinal);
            Family { base, members }
        })
        .collect()
}

/// Adds a new version of the current member of `family`.
///
/// `update` receives a copy of the current resource and returns whether it
/// changed the copy. Only a changed copy is inserted, under
/// [`Family::next_name`] and directly after the current member. References
/// are then moved to the new name: the old members are tried from newest to
/// oldest and the first one that has references is retargeted.
///
/// Returns the new name, or `None` if nothing was added.
pub fn add_version<F>(doc: &mut Document, family: &mut Family, update: F) -> Option<String>
where
    F: FnOnce(&mut Node) -> bool,
{
    let current = family.current()?.to_string();
    let resources = doc.resources_mut()?;
    let source = resources.get_entry(&current)?;
    let mut copy = source.node.clone();
    let decor = source.decor.spacing_only();

    if !update(&mut copy) {
        debug!(resource = current.as_str(); "Resource is up to date");
        return None;
    }

    let new_name = family.next_name();
    if !resources.insert_after(&current, new_name.clone(), Entry::with_decor(copy, decor)) {
        warn!(resource = new_name.as_str(); "Resource already exists, not adding a new version");
        return None;
    }
    info!(resource = current.as_str(), version = new_name.as_str(); "Added new version");
    doc.mark_dirty();

    let retargeted = family
        .members()
        .rev()
        .find(|old| references::rewrite(doc.root_mut(), old, &new_name))
        .map(str::to_string);
    match retargeted {
        Some(old) => info!(from = old.as_str(), to = new_name.as_str(); "Moved references"),
        None => debug!(resource = new_name.as_str(); "No references to move"),
    }

    family.push(new_name.clone());
    Some(new_name)
}

/// Removes the oldest members of `family` until at most `keep` remain.
///
/// `keep` is raised to at least one. Returns the removed names.
pub fn prune(doc: &mut Document, family: &mut Family, keep: usize) -> Vec<String> {
    let keep = keep.max(1);
    let excess = family.len().saturating_sub(keep);
    let removed: Vec<String> = family
        .members
        .drain(..excess)
        .map(|(_, name)| name)
        .collect();

    if let Some(resources) = doc.resources_mut() {
        for name in &removed {
            if resources.remove(name).is_some() {
                info!(resource = name.as_str(); "Removed old version");
            }
        }
    }
    if !removed.is_empty() {
        doc.mark_dirty();
    }
    removed
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use stackpatch_core::Scalar;

    use super::*;
    use crate::test_utils::{load_yaml, resource_str, write_yaml};

    fn parsed(name: &str) -> (String, u32) {
        let parsed = VersionedName::parse(name);
        (parsed.base().to_string(), parsed.ordinal())
    }

    #[test]
    fn test_parse() {
        assert_eq!(parsed("CustomAMI"), ("CustomAMI".to_string(), 0));
        assert_eq!(parsed("CustomAMIv2"), ("CustomAMI".to_string(), 2));
        assert_eq!(
            parsed("WhatEv1rBaseAMIv3"),
            ("WhatEv1rBaseAMI".to_string(), 3)
        );
        assert_eq!(parsed("Restv2Api"), ("Restv2Api".to_string(), 0));
        assert_eq!(parsed("Basev0"), ("Basev0".to_string(), 0));
        assert_eq!(parsed("Basev01"), ("Basev01".to_string(), 0));
        assert_eq!(parsed("v3"), ("v3".to_string(), 0));
        assert_eq!(parsed("Basev"), ("Basev".to_string(), 0));
    }

    #[test]
    fn test_next_name() {
        let next = |name: &str| VersionedName::parse(name).next().name();
        assert_eq!(next("RestAPI"), "RestAPIv1");
        assert_eq!(next("RestAPIv1"), "RestAPIv2");
        assert_eq!(next("Restv2Apiv3"), "Restv2Apiv4");
    }

    #[test]
    fn test_families() {
        let groups = families(["Bv1", "A", "Av2", "B", "C", "Av10"]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].base(), "B");
        assert_eq!(groups[0].members().collect::<Vec<_>>(), ["B", "Bv1"]);
        assert_eq!(
            groups[1].members().collect::<Vec<_>>(),
            ["A", "Av2", "Av10"]
        );
        assert_eq!(groups[1].current(), Some("Av10"));
        assert_eq!(groups[1].next_name(), "Av11");
        assert_eq!(groups[2].next_name(), "Cv1");
    }

    const AMIS: &str = r#"Resources:
  CustomAMI:
    Type: Custom::AMI
    Properties:
      Filters:
        name: ami-a

  CustomAMIv2:
    Type: Custom::AMI
    Properties:
      Filters:
        name: ami-b

  Instance:
    Properties:
      ImageId: !Ref CustomAMIv2
      Old: !GetAtt CustomAMI.ImageId
Outputs:
  AMI:
    Value: !Ref CustomAMIv2
"#;

    fn set_name(value: &'static str) -> impl FnOnce(&mut Node) -> bool {
        move |node| {
            let Some(name) = node
                .get_path_mut(&["Properties", "Filters", "name"])
                .and_then(Node::as_scalar_mut)
            else {
                return false;
            };
            if name.value() == value {
                return false;
            }
            name.set_value(value);
            true
        }
    }

    #[test]
    fn test_add_version_inserts_after_current_and_retargets() {
        let mut doc = load_yaml(AMIS);
        let names: Vec<String> = doc
            .resources()
            .expect("resources")
            .keys()
            .filter(|name| name.starts_with("CustomAMI"))
            .map(str::to_string)
            .collect();
        let mut family = families(names.iter().map(String::as_str)).remove(0);

        let added = add_version(&mut doc, &mut family, set_name("ami-c"));

        assert_eq!(added.as_deref(), Some("CustomAMIv3"));
        assert!(doc.is_dirty());
        assert_eq!(family.current(), Some("CustomAMIv3"));
        assert_eq!(
            write_yaml(&doc),
            r#"Resources:
  CustomAMI:
    Type: Custom::AMI
    Properties:
      Filters:
        name: ami-a

  CustomAMIv2:
    Type: Custom::AMI
    Properties:
      Filters:
        name: ami-b

  CustomAMIv3:
    Type: Custom::AMI
    Properties:
      Filters:
        name: ami-c

  Instance:
    Properties:
      ImageId: !Ref CustomAMIv3
      Old: !GetAtt CustomAMI.ImageId
Outputs:
  AMI:
    Value: !Ref CustomAMIv3
"#
        );
    }

    #[test]
    fn test_add_version_falls_back_to_older_references() {
        let mut doc = load_yaml(
            "Resources:\n  Base:\n    Value: 1\nOutputs:\n  X:\n    Value: !Ref Base\n",
        );
        let mut family = families(["Base"]).remove(0);

        let added = add_version(&mut doc, &mut family, |node| {
            node.get_mut("Value")
                .and_then(Node::as_scalar_mut)
                .map(|value| value.set_value("2"))
                .is_some()
        });

        assert_eq!(added.as_deref(), Some("Basev1"));
        assert_eq!(resource_str(&doc, &["Base", "Value"]), Some("1"));
        assert_eq!(resource_str(&doc, &["Basev1", "Value"]), Some("2"));
        assert_eq!(
            doc.root()
                .get_path(&["Outputs", "X", "Value"])
                .and_then(Node::as_scalar)
                .map(Scalar::value),
            Some("Basev1")
        );
    }

    #[test]
    fn test_add_version_without_change() {
        let mut doc = load_yaml(AMIS);
        let mut family = families(["CustomAMI", "CustomAMIv2"]).remove(0);

        assert_eq!(add_version(&mut doc, &mut family, set_name("ami-b")), None);
        assert!(!doc.is_dirty());
        assert_eq!(write_yaml(&doc), AMIS);
        assert_eq!(family.len(), 2);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let mut doc = load_yaml(
            "Resources:\n  R: {}\n  Rv2: {}\n  Rv3: {}\n  Deployment:\n    Ref: Rv3\n",
        );
        let mut family = families(["R", "Rv2", "Rv3"]).remove(0);

        let added = add_version(&mut doc, &mut family, |_| true);
        assert_eq!(added.as_deref(), Some("Rv4"));
        assert_eq!(prune(&mut doc, &mut family, 2), ["R", "Rv2"]);

        let keys: Vec<&str> = doc.resources().expect("resources").keys().collect();
        assert_eq!(keys, ["Rv3", "Rv4", "Deployment"]);
        assert_eq!(resource_str(&doc, &["Deployment", "Ref"]), Some("Rv4"));
        assert_eq!(family.members().collect::<Vec<_>>(), ["Rv3", "Rv4"]);
    }

    #[test]
    fn test_prune_clamps_keep() {
        let mut doc = load_yaml("Resources:\n  R: {}\n  Rv1: {}\n");
        let mut family = families(["R", "Rv1"]).remove(0);

        assert_eq!(prune(&mut doc, &mut family, 0), ["R"]);
        assert_eq!(prune(&mut doc, &mut family, 1), Vec::<String>::new());
    }

    proptest! {
        /// The next name always parses back into the same family with an
        /// ordinal above every existing member.
        #[test]
        fn next_name_is_monotonic(
            base in "[A-Za-z][A-Za-z0-9]{0,10}[A-Za-uw-z]",
            ordinals in prop::collection::btree_set(1u32..500, 0..6),
            include_base in any::<bool>(),
        ) {
            let mut names: Vec<String> = ordinals.iter().map(|n| format!("{base}v{n}")).collect();
            if include_base {
                names.push(base.clone());
            }
            prop_assume!(!names.is_empty());

            let groups = families(names.iter().map(String::as_str));
            prop_assert_eq!(groups.len(), 1);
            let next = VersionedName::parse(&groups[0].next_name());
            prop_assert_eq!(next.base(), base.as_str());
            let max = ordinals.iter().copied().max().unwrap_or(0);
            prop_assert_eq!(next.ordinal(), max + 1);
        }
    }
}
