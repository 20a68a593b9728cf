// Copyright (c) 2026 Oleksandr Melnychenko, Ukraine
// Ecliptix Security — Verifiable Key Backup (PVE)
// Licensed under the MIT License

//! Access structures and the secret-sharing capability over them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::curve::Scalar;
use crate::drbg::Drbg;
use crate::types::{PveError, PveResult};

/// One node of a monotone policy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessNode {
    And { children: Vec<AccessNode> },
    Or { children: Vec<AccessNode> },
    Threshold { k: usize, children: Vec<AccessNode> },
    Leaf { name: String },
}

impl AccessNode {
    pub fn and(children: Vec<AccessNode>) -> Self {
        AccessNode::And { children }
    }

    pub fn or(children: Vec<AccessNode>) -> Self {
        AccessNode::Or { children }
    }

    pub fn threshold(k: usize, children: Vec<AccessNode>) -> Self {
        AccessNode::Threshold { k, children }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        AccessNode::Leaf { name: name.into() }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            AccessNode::Leaf { name } => out.push(name),
            AccessNode::And { children }
            | AccessNode::Or { children }
            | AccessNode::Threshold { children, .. } => {
                children.iter().for_each(|child| child.collect_leaves(out))
            }
        }
    }

    fn validate_shape(&self) -> PveResult<()> {
        match self {
            AccessNode::Leaf { name } if name.is_empty() => Err(PveError::InvalidArgument),
            AccessNode::Leaf { .. } => Ok(()),
            AccessNode::And { children } | AccessNode::Or { children } => {
                if children.is_empty() {
                    return Err(PveError::InvalidArgument);
                }
                children.iter().try_for_each(AccessNode::validate_shape)
            }
            AccessNode::Threshold { k, children } => {
                if *k == 0 || *k > children.len() {
                    return Err(PveError::InvalidArgument);
                }
                children.iter().try_for_each(AccessNode::validate_shape)
            }
        }
    }

    fn satisfied_by(&self, names: &BTreeSet<&str>) -> bool {
        match self {
            AccessNode::Leaf { name } => names.contains(name.as_str()),
            AccessNode::And { children } => children.iter().all(|c| c.satisfied_by(names)),
            AccessNode::Or { children } => children.iter().any(|c| c.satisfied_by(names)),
            AccessNode::Threshold { k, children } => {
                children.iter().filter(|c| c.satisfied_by(names)).count() >= *k
            }
        }
    }
}

/// A validated access structure: non-empty, unique leaf names and well-formed
/// thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AccessNode", into = "AccessNode")]
pub struct AccessStructure {
    root: AccessNode,
}

impl AccessStructure {
    /// # Errors
    ///
    /// Returns [`PveError::InvalidArgument`] on an empty composite node, a
    /// threshold outside `1..=children`, an empty leaf name or a duplicate leaf.
    pub fn new(root: AccessNode) -> PveResult<Self> {
        root.validate_shape()?;
        let mut leaves = Vec::new();
        root.collect_leaves(&mut leaves);
        let unique: BTreeSet<&str> = leaves.iter().copied().collect();
        if unique.len() != leaves.len() {
            return Err(PveError::InvalidArgument);
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &AccessNode {
        &self.root
    }

    /// Leaf names in ascending order.
    pub fn leaf_names(&self) -> Vec<String> {
        let mut leaves = Vec::new();
        self.root.collect_leaves(&mut leaves);
        let sorted: BTreeSet<&str> = leaves.into_iter().collect();
        sorted.into_iter().map(str::to_owned).collect()
    }

    pub fn is_quorum<S: AsRef<str>>(&self, names: &[S]) -> bool {
        let names: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
        self.root.satisfied_by(&names)
    }

    pub fn enough_for_quorum<V>(&self, available: &BTreeMap<String, V>) -> bool {
        let names: BTreeSet<&str> = available.keys().map(String::as_str).collect();
        self.root.satisfied_by(&names)
    }
}

impl TryFrom<AccessNode> for AccessStructure {
    type Error = PveError;

    fn try_from(root: AccessNode) -> PveResult<Self> {
        Self::new(root)
    }
}

impl From<AccessStructure> for AccessNode {
    fn from(ac: AccessStructure) -> Self {
        ac.root
    }
}

/// Splits a scalar over the leaves of an access structure and recombines a
/// quorum's shares.
///
/// `split` draws all its randomness from `drbg`, so a verifier holding the
/// same seed reproduces the exact shares.
pub trait SecretSharing: Send + Sync {
    fn split(
        &self,
        ac: &AccessStructure,
        secret: &Scalar,
        drbg: &mut Drbg,
    ) -> PveResult<BTreeMap<String, Scalar>>;

    /// # Errors
    ///
    /// Returns [`PveError::ReconstructionFailed`] if `shares` does not cover a quorum.
    fn reconstruct(
        &self,
        ac: &AccessStructure,
        shares: &BTreeMap<String, Scalar>,
    ) -> PveResult<Scalar>;
}

/// Recursive composition: AND splits additively, OR replicates, and
/// THRESHOLD(k) evaluates a degree `k-1` polynomial at child indices `1..=n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShamirTreeSharing;

impl ShamirTreeSharing {
    fn split_node(
        node: &AccessNode,
        secret: &Scalar,
        drbg: &mut Drbg,
        out: &mut BTreeMap<String, Scalar>,
    ) -> PveResult<()> {
        let curve = secret.curve();
        match node {
            AccessNode::Leaf { name } => {
                out.insert(name.clone(), secret.clone());
            }
            AccessNode::Or { children } => {
                for child in children {
                    Self::split_node(child, secret, drbg, out)?;
                }
            }
            AccessNode::And { children } => {
                let mut remainder = secret.clone();
                for (i, child) in children.iter().enumerate() {
                    if i + 1 == children.len() {
                        Self::split_node(child, &remainder, drbg, out)?;
                    } else {
                        let share = drbg.gen_scalar(curve);
                        remainder = remainder.sub(&share)?;
                        Self::split_node(child, &share, drbg, out)?;
                    }
                }
            }
            AccessNode::Threshold { k, children } => {
                let coefficients = drbg.gen_scalars(curve, k - 1);
                for (i, child) in children.iter().enumerate() {
                    let x = Scalar::from_u64(curve, i as u64 + 1);
                    // Horner: f(x) = secret + a1*x + ... + a_{k-1}*x^{k-1}
                    let mut value = Scalar::zero(curve);
                    for coefficient in coefficients.iter().rev() {
                        value = value.add(coefficient)?.mul(&x)?;
                    }
                    let value = value.add(secret)?;
                    Self::split_node(child, &value, drbg, out)?;
                }
            }
        }
        Ok(())
    }

    fn reconstruct_node(
        node: &AccessNode,
        shares: &BTreeMap<String, Scalar>,
    ) -> PveResult<Option<Scalar>> {
        match node {
            AccessNode::Leaf { name } => Ok(shares.get(name).cloned()),
            AccessNode::Or { children } => {
                for child in children {
                    if let Some(value) = Self::reconstruct_node(child, shares)? {
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            }
            AccessNode::And { children } => {
                let mut sum: Option<Scalar> = None;
                for child in children {
                    let Some(value) = Self::reconstruct_node(child, shares)? else {
                        return Ok(None);
                    };
                    sum = Some(match sum {
                        Some(acc) => acc.add(&value)?,
                        None => value,
                    });
                }
                Ok(sum)
            }
            AccessNode::Threshold { k, children } => {
                let mut points = Vec::with_capacity(*k);
                for (i, child) in children.iter().enumerate() {
                    if points.len() == *k {
                        break;
                    }
                    if let Some(value) = Self::reconstruct_node(child, shares)? {
                        points.push((i as u64 + 1, value));
                    }
                }
                if points.len() < *k {
                    return Ok(None);
                }
                Self::interpolate_at_zero(&points).map(Some)
            }
        }
    }

    fn interpolate_at_zero(points: &[(u64, Scalar)]) -> PveResult<Scalar> {
        let curve = points.first().map(|(_, v)| v.curve()).ok_or(PveError::ReconstructionFailed)?;
        let mut result = Scalar::zero(curve);
        for (i, (xi, yi)) in points.iter().enumerate() {
            let xi_s = Scalar::from_u64(curve, *xi);
            let mut numerator = Scalar::from_u64(curve, 1);
            let mut denominator = Scalar::from_u64(curve, 1);
            for (j, (xj, _)) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                let xj_s = Scalar::from_u64(curve, *xj);
                numerator = numerator.mul(&xj_s)?;
                denominator = denominator.mul(&xj_s.sub(&xi_s)?)?;
            }
            let lambda = numerator.mul(&denominator.invert()?)?;
            result = result.add(&lambda.mul(yi)?)?;
        }
        Ok(result)
    }
}

impl SecretSharing for ShamirTreeSharing {
    fn split(
        &self,
        ac: &AccessStructure,
        secret: &Scalar,
        drbg: &mut Drbg,
    ) -> PveResult<BTreeMap<String, Scalar>> {
        let mut out = BTreeMap::new();
        Self::split_node(ac.root(), secret, drbg, &mut out)?;
        Ok(out)
    }

    fn reconstruct(
        &self,
        ac: &AccessStructure,
        shares: &BTreeMap<String, Scalar>,
    ) -> PveResult<Scalar> {
        Self::reconstruct_node(ac.root(), shares)?.ok_or(PveError::ReconstructionFailed)
    }
}
