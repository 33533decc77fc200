//! Policy tree-based certificate policy processing
//!
//! The valid_policy_tree described in [RFC 5280 Section 6.1.2] is represented as an arena of
//! [`PolicyNode`] values addressed by index. Each node owns the indices of its children and each
//! depth of the tree is tracked as a row of live node indices. Nodes do not refer to their parents.
//!
//! [RFC 5280 Section 6.1.2]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.2>

use alloc::collections::BTreeMap;
use alloc::{format, vec, vec::Vec};

use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::{
    ID_CE_CERTIFICATE_POLICIES, ID_CE_INHIBIT_ANY_POLICY, ID_CE_POLICY_CONSTRAINTS,
    ID_CE_POLICY_MAPPINGS,
};
use der::{asn1::ObjectIdentifier, Encode};
use log::debug;
use x509_cert::ext::pkix::{CertificatePolicies, PolicyMappings};

use crate::{
    path_settings::ObjectIdentifierSet, pdv_certificate::PDVCertificate, pdv_extension::*,
    util::error::*, util::pdv_utilities::is_self_issued, validator_state::ValidatorState,
};

/// `PolicyNode` is a node in the valid_policy_tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PolicyNode {
    /// A single policy OID representing a valid policy for the path at this depth
    pub valid_policy: ObjectIdentifier,
    /// Encoded policy qualifiers associated with the valid policy, if any
    pub qualifiers: Option<Vec<u8>>,
    /// Policy OIDs that would satisfy this policy in the certificate at the next depth
    pub expected_policy_set: ObjectIdentifierSet,
    /// Indices of child nodes
    pub children: Vec<usize>,
    /// Position in the certification path at which the node was created
    pub depth: usize,
}

/// `PolicyTree` is an arena-allocated valid_policy_tree. An empty tree corresponds to NULL.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PolicyTree {
    nodes: Vec<PolicyNode>,
    rows: Vec<Vec<usize>>,
}

impl Default for PolicyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyTree {
    /// Creates a tree with a single anyPolicy node at depth zero.
    pub fn new() -> Self {
        let root = PolicyNode {
            valid_policy: ANY_POLICY,
            qualifiers: None,
            expected_policy_set: ObjectIdentifierSet::from([ANY_POLICY]),
            children: vec![],
            depth: 0,
        };
        PolicyTree {
            nodes: vec![root],
            rows: vec![vec![0]],
        }
    }

    /// Returns true if no nodes remain, i.e., the tree is NULL.
    pub fn is_empty(&self) -> bool {
        self.rows.first().map_or(true, |r| r.is_empty())
    }

    /// Depth of the deepest row in the tree
    pub fn depth(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Returns the node with the given index, if it is still part of the tree.
    pub fn node(&self, index: usize) -> Option<&PolicyNode> {
        let node = self.nodes.get(index)?;
        if self.rows.get(node.depth)?.contains(&index) {
            Some(node)
        } else {
            None
        }
    }

    /// Returns the nodes at the given depth in the order they were added.
    pub fn nodes_at_depth(&self, depth: usize) -> Vec<&PolicyNode> {
        match self.rows.get(depth) {
            Some(row) => row.iter().filter_map(|i| self.nodes.get(*i)).collect(),
            None => vec![],
        }
    }

    /// Returns the valid_policy values of the nodes at the given depth, without duplicates.
    pub fn policies_at_depth(&self, depth: usize) -> Vec<ObjectIdentifier> {
        let mut retval = vec![];
        for n in self.nodes_at_depth(depth) {
            if !retval.contains(&n.valid_policy) {
                retval.push(n.valid_policy);
            }
        }
        retval
    }

    fn ensure_row(&mut self, depth: usize) {
        while self.rows.len() <= depth {
            self.rows.push(vec![]);
        }
    }

    fn add_node(
        &mut self,
        parent: usize,
        valid_policy: ObjectIdentifier,
        qualifiers: Option<Vec<u8>>,
        expected_policy_set: ObjectIdentifierSet,
    ) -> usize {
        let depth = self.nodes[parent].depth + 1;
        self.ensure_row(depth);
        let index = self.nodes.len();
        self.nodes.push(PolicyNode {
            valid_policy,
            qualifiers,
            expected_policy_set,
            children: vec![],
            depth,
        });
        self.nodes[parent].children.push(index);
        self.rows[depth].push(index);
        index
    }

    fn find_parent(&self, index: usize) -> Option<usize> {
        let depth = self.nodes.get(index)?.depth;
        if depth == 0 {
            return None;
        }
        self.rows[depth - 1]
            .iter()
            .copied()
            .find(|p| self.nodes[*p].children.contains(&index))
    }

    fn find_in_row(&self, depth: usize, policy: &ObjectIdentifier) -> Option<usize> {
        self.rows
            .get(depth)?
            .iter()
            .copied()
            .find(|i| self.nodes[*i].valid_policy == *policy)
    }

    /// Deletes the node with the given index along with all of its descendants.
    fn remove_subtree(&mut self, index: usize) {
        if let Some(parent) = self.find_parent(index) {
            self.nodes[parent].children.retain(|c| *c != index);
        }
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            let depth = self.nodes[i].depth;
            if let Some(row) = self.rows.get_mut(depth) {
                row.retain(|n| *n != i);
            }
            stack.extend(self.nodes[i].children.drain(..));
        }
    }

    /// `prune` deletes nodes above the given depth that have no children, working upward from
    /// depth - 1 to the root.
    pub fn prune(&mut self, depth: usize) {
        for d in (0..depth.min(self.rows.len())).rev() {
            let childless: Vec<usize> = self.rows[d]
                .iter()
                .copied()
                .filter(|i| self.nodes[*i].children.is_empty())
                .collect();
            for i in childless {
                self.remove_subtree(i);
            }
        }
    }

    /// `process_policies` adds nodes at the given depth for the policies asserted in a certificate as
    /// described in steps (d)(1) and (d)(2) of RFC 5280 Section 6.1.3, then prunes the tree. Nodes
    /// for anyPolicy are added only when any_policy_permitted is true.
    pub fn process_policies(
        &mut self,
        cps: &CertificatePolicies,
        depth: usize,
        any_policy_permitted: bool,
    ) {
        if depth == 0 {
            return;
        }
        self.ensure_row(depth);
        let parents: Vec<usize> = match self.rows.get(depth - 1) {
            Some(r) => r.clone(),
            None => vec![],
        };

        let mut any_policy_qualifiers = None;
        let mut has_any_policy = false;
        for pi in &cps.0 {
            let qualifiers = pi.policy_qualifiers.as_ref().and_then(|q| q.to_der().ok());
            if pi.policy_identifier == ANY_POLICY {
                has_any_policy = true;
                any_policy_qualifiers = qualifiers;
                continue;
            }

            let p_oid = pi.policy_identifier;
            let mut matched: Vec<usize> = parents
                .iter()
                .copied()
                .filter(|p| self.nodes[*p].expected_policy_set.contains(&p_oid))
                .collect();
            if matched.is_empty() {
                if let Some(any) = parents
                    .iter()
                    .copied()
                    .find(|p| self.nodes[*p].valid_policy == ANY_POLICY)
                {
                    matched.push(any);
                }
            }
            for p in matched {
                self.add_node(
                    p,
                    p_oid,
                    qualifiers.clone(),
                    ObjectIdentifierSet::from([p_oid]),
                );
            }
        }

        if has_any_policy && any_policy_permitted {
            for p in parents {
                let expected: Vec<ObjectIdentifier> =
                    self.nodes[p].expected_policy_set.iter().copied().collect();
                for ep in expected {
                    let present = self.nodes[p]
                        .children
                        .iter()
                        .any(|c| self.nodes[*c].valid_policy == ep);
                    if !present {
                        self.add_node(
                            p,
                            ep,
                            any_policy_qualifiers.clone(),
                            ObjectIdentifierSet::from([ep]),
                        );
                    }
                }
            }
        }

        self.prune(depth);
    }

    /// `process_mappings` applies the policy mappings from the certificate at the given depth as
    /// described in step (b) of RFC 5280 Section 6.1.4. When mapping_permitted is false, nodes for
    /// mapped issuerDomainPolicy values are deleted instead.
    pub fn process_mappings(
        &mut self,
        mappings: &PolicyMappings,
        depth: usize,
        mapping_permitted: bool,
        any_policy_qualifiers: Option<Vec<u8>>,
    ) {
        let mut mapped: BTreeMap<ObjectIdentifier, ObjectIdentifierSet> = BTreeMap::new();
        for m in &mappings.0 {
            mapped
                .entry(m.issuer_domain_policy)
                .or_default()
                .insert(m.subject_domain_policy);
        }

        for (idp, sdps) in mapped {
            let matching: Vec<usize> = match self.rows.get(depth) {
                Some(row) => row
                    .iter()
                    .copied()
                    .filter(|i| self.nodes[*i].valid_policy == idp)
                    .collect(),
                None => vec![],
            };

            if mapping_permitted {
                if !matching.is_empty() {
                    for i in matching {
                        self.nodes[i].expected_policy_set = sdps.clone();
                    }
                } else if let Some(any) = self.find_in_row(depth, &ANY_POLICY) {
                    if let Some(parent) = self.find_parent(any) {
                        self.add_node(parent, idp, any_policy_qualifiers.clone(), sdps);
                    }
                }
            } else {
                for i in matching {
                    self.remove_subtree(i);
                }
                self.prune(depth);
            }
        }
    }

    /// `intersect_with` calculates the intersection of the tree with the user-initial-policy-set as
    /// described in step (g)(iii) of RFC 5280 Section 6.1.5. The depth parameter is the depth of
    /// the final certificate.
    pub fn intersect_with(&mut self, initial_policy_set: &ObjectIdentifierSet, depth: usize) {
        if initial_policy_set.contains(&ANY_POLICY) {
            return;
        }
        self.ensure_row(depth);

        // valid_policy_node_set: nodes whose parent is an anyPolicy node
        let mut node_set: Vec<usize> = vec![];
        for d in 0..depth {
            for p in self.rows[d].clone() {
                if self.nodes[p].valid_policy == ANY_POLICY {
                    node_set.extend(self.nodes[p].children.iter().copied());
                }
            }
        }

        for i in &node_set {
            let vp = self.nodes[*i].valid_policy;
            if vp != ANY_POLICY && !initial_policy_set.contains(&vp) {
                self.remove_subtree(*i);
            }
        }

        if let Some(any) = self.find_in_row(depth, &ANY_POLICY) {
            let present: Vec<ObjectIdentifier> = node_set
                .iter()
                .filter(|i| self.node(**i).is_some())
                .map(|i| self.nodes[*i].valid_policy)
                .collect();
            if let Some(parent) = self.find_parent(any) {
                let qualifiers = self.nodes[any].qualifiers.clone();
                for p in initial_policy_set {
                    if !present.contains(p) {
                        self.add_node(
                            parent,
                            *p,
                            qualifiers.clone(),
                            ObjectIdentifierSet::from([*p]),
                        );
                    }
                }
            }
            self.remove_subtree(any);
        }

        self.prune(depth);
    }

    /// `process_certificate` performs certificate policy processing for the certificate at
    /// position `state.index` in a certification path, updating the valid_policy_tree and the
    /// explicit_policy, policy_mapping and inhibit_any_policy counters in state.
    ///
    /// For certificates other than the final certificate this covers steps (d), (e) and (f) of
    /// RFC 5280 Section 6.1.3 and steps (a), (b), (h), (i) and (j) of Section 6.1.4. For the final
    /// certificate it covers steps (d), (e) and (f) of Section 6.1.3 and steps (a), (b) and (g) of
    /// Section 6.1.5.
    pub fn process_certificate(
        state: &mut ValidatorState,
        cert: &PDVCertificate,
        is_final: bool,
    ) -> Result<()> {
        let i = state.index;
        let self_issued = is_self_issued(&cert.decoded_cert);

        let mut tree = state.valid_policy_tree.take();
        match cert.get_extension(&ID_CE_CERTIFICATE_POLICIES) {
            Some(PDVExtension::CertificatePolicies(cps)) => {
                if let Some(t) = tree.as_mut() {
                    let any_policy_permitted =
                        state.inhibit_any_policy > 0 || (!is_final && self_issued);
                    t.process_policies(cps, i, any_policy_permitted);
                }
            }
            _ => {
                if tree.is_some() {
                    debug!("No certificate policies extension at certificate #{}; valid_policy_tree is NULL", i);
                }
                tree = None;
            }
        }
        tree = tree.filter(|t| !t.is_empty());

        if !is_final {
            if 0 == state.explicit_policy && tree.is_none() {
                return Err(Error::path(
                    PathValidationStatus::PolicyRequiredButNoneValid,
                    i,
                    "valid_policy_tree is NULL and explicit_policy is 0",
                ));
            }

            if let Some(PDVExtension::PolicyMappings(pm)) =
                cert.get_extension(&ID_CE_POLICY_MAPPINGS)
            {
                for m in &pm.0 {
                    if m.issuer_domain_policy == ANY_POLICY || m.subject_domain_policy == ANY_POLICY
                    {
                        return Err(Error::path(
                            PathValidationStatus::InvalidPolicyMapping,
                            i,
                            format!(
                                "anyPolicy appears in mapping {} -> {}",
                                m.issuer_domain_policy, m.subject_domain_policy
                            ),
                        ));
                    }
                }
                if let Some(t) = tree.as_mut() {
                    t.process_mappings(
                        pm,
                        i,
                        state.policy_mapping > 0,
                        any_policy_qualifiers(cert),
                    );
                }
                tree = tree.filter(|t| !t.is_empty());
            }

            if !self_issued {
                state.explicit_policy = state.explicit_policy.saturating_sub(1);
                state.policy_mapping = state.policy_mapping.saturating_sub(1);
                state.inhibit_any_policy = state.inhibit_any_policy.saturating_sub(1);
            }

            if let Some(PDVExtension::PolicyConstraints(pc)) =
                cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)
            {
                if let Some(rep) = pc.require_explicit_policy {
                    state.explicit_policy = state.explicit_policy.min(rep);
                }
                if let Some(ipm) = pc.inhibit_policy_mapping {
                    state.policy_mapping = state.policy_mapping.min(ipm);
                }
            }

            if let Some(PDVExtension::InhibitAnyPolicy(iap)) =
                cert.get_extension(&ID_CE_INHIBIT_ANY_POLICY)
            {
                state.inhibit_any_policy = state.inhibit_any_policy.min(iap.0);
            }
        } else {
            state.explicit_policy = state.explicit_policy.saturating_sub(1);
            if let Some(PDVExtension::PolicyConstraints(pc)) =
                cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)
            {
                if Some(0) == pc.require_explicit_policy {
                    state.explicit_policy = 0;
                }
            }

            if let Some(t) = tree.as_mut() {
                t.intersect_with(&state.initial_policy_set, i);
            }
            tree = tree.filter(|t| !t.is_empty());

            if 0 == state.explicit_policy && tree.is_none() {
                return Err(Error::path(
                    PathValidationStatus::PolicyRequiredButNoneValid,
                    i,
                    "explicit policy is required but no acceptable policy remains",
                ));
            }
        }

        state.valid_policy_tree = tree;
        Ok(())
    }
}

fn any_policy_qualifiers(cert: &PDVCertificate) -> Option<Vec<u8>> {
    match cert.get_extension(&ID_CE_CERTIFICATE_POLICIES) {
        Some(PDVExtension::CertificatePolicies(cps)) => cps
            .0
            .iter()
            .find(|pi| pi.policy_identifier == ANY_POLICY)
            .and_then(|pi| pi.policy_qualifiers.as_ref())
            .and_then(|q| q.to_der().ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_cert::ext::pkix::{certpolicy::PolicyInformation, PolicyMapping};

    const P1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.3.1");
    const P2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.3.2");
    const P3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.3.3");

    fn policies(oids: &[ObjectIdentifier]) -> CertificatePolicies {
        CertificatePolicies(
            oids.iter()
                .map(|o| PolicyInformation {
                    policy_identifier: *o,
                    policy_qualifiers: None,
                })
                .collect(),
        )
    }

    #[test]
    fn any_policy_expands_to_expected_set() {
        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[ANY_POLICY]), 1, true);
        assert_eq!(vec![ANY_POLICY], tree.policies_at_depth(1));

        tree.process_policies(&policies(&[P1, P2]), 2, true);
        assert_eq!(vec![P1, P2], tree.policies_at_depth(2));
        assert_eq!(2, tree.depth());
    }

    #[test]
    fn inhibited_any_policy_prunes() {
        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[ANY_POLICY]), 1, false);
        assert!(tree.is_empty());
    }

    #[test]
    fn unmatched_policy_prunes_branch() {
        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[P1]), 1, true);
        tree.process_policies(&policies(&[P2]), 2, true);
        assert!(tree.is_empty());
    }

    #[test]
    fn mapping_from_any_policy() {
        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[ANY_POLICY]), 1, true);
        let pm = PolicyMappings(vec![PolicyMapping {
            issuer_domain_policy: P1,
            subject_domain_policy: P2,
        }]);
        tree.process_mappings(&pm, 1, true, None);
        assert_eq!(vec![ANY_POLICY, P1], tree.policies_at_depth(1));

        tree.process_policies(&policies(&[P2]), 2, true);
        assert_eq!(vec![P2], tree.policies_at_depth(2));
        assert_eq!(vec![P1], tree.policies_at_depth(1));
    }

    #[test]
    fn inhibited_mapping_deletes_nodes() {
        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[P1, P3]), 1, true);
        let pm = PolicyMappings(vec![PolicyMapping {
            issuer_domain_policy: P1,
            subject_domain_policy: P2,
        }]);
        tree.process_mappings(&pm, 1, false, None);
        assert_eq!(vec![P3], tree.policies_at_depth(1));
    }

    #[test]
    fn intersection_with_initial_set() {
        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[ANY_POLICY]), 1, true);
        tree.process_policies(&policies(&[P1, P2]), 2, true);
        tree.intersect_with(&ObjectIdentifierSet::from([P2]), 2);
        assert_eq!(vec![P2], tree.policies_at_depth(2));

        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[ANY_POLICY]), 1, true);
        tree.intersect_with(&ObjectIdentifierSet::from([P3]), 1);
        assert_eq!(vec![P3], tree.policies_at_depth(1));

        let mut tree = PolicyTree::new();
        tree.process_policies(&policies(&[P1]), 1, true);
        tree.intersect_with(&ObjectIdentifierSet::from([P2]), 1);
        assert!(tree.is_empty());
    }
}
