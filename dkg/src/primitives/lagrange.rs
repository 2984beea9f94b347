//! Lagrange coefficients for interpolation at `x = 0`.
//!
//! Every share index `i` maps to the evaluation point `x = i + 1`. The
//! coefficient of an index only depends on the *set* of indices it is combined
//! with, never on the order in which they were supplied.

use crate::primitives::{
    group::{Element, Scalar},
    Error,
};
use std::collections::{BTreeMap, BTreeSet};

/// Deduplicates `indices`, failing on the first repeated index.
fn distinct(indices: &[u32]) -> Result<BTreeSet<u32>, Error> {
    if indices.is_empty() {
        return Err(Error::NoEvaluations);
    }
    let mut set = BTreeSet::new();
    for &index in indices {
        if !set.insert(index) {
            return Err(Error::DuplicateEval(index));
        }
    }
    Ok(set)
}

/// Computes `l_i(0) = Π_{j != i} x_j / (x_j - x_i)` over a deduplicated set.
fn basis(index: u32, set: &BTreeSet<u32>) -> Result<Scalar, Error> {
    let xi = Scalar::from_index(index);
    let (mut num, mut den) = (Scalar::one(), Scalar::one());
    for &j in set {
        if j == index {
            continue;
        }
        let xj = Scalar::from_index(j);

        // Numerator: product of all xj (since we're evaluating at x=0)
        num.mul(&xj);

        // Denominator: product of all (xj - xi)
        let mut diff = xj;
        diff.sub(&xi);
        den.mul(&diff);
    }
    let inv = den.inverse().ok_or(Error::NoInverse)?;
    num.mul(&inv);
    Ok(num)
}

/// Computes the Lagrange coefficient at `x = 0` of every index in `indices`.
///
/// Fails if `indices` is empty or contains a duplicate.
pub fn coefficients(indices: &[u32]) -> Result<BTreeMap<u32, Scalar>, Error> {
    let set = distinct(indices)?;
    set.iter()
        .map(|&index| Ok((index, basis(index, &set)?)))
        .collect()
}

/// Computes the Lagrange coefficient at `x = 0` of `index` within `indices`.
pub fn coefficient(index: u32, indices: &[u32]) -> Result<Scalar, Error> {
    let set = distinct(indices)?;
    if !set.contains(&index) {
        return Err(Error::MissingEval(index));
    }
    basis(index, &set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&[0, 1, 2]; "prefix")]
    #[test_case(&[1, 3, 5]; "sparse")]
    #[test_case(&[6, 2, 4, 0]; "unsorted")]
    fn coefficients_sum_to_one(indices: &[u32]) {
        // Interpolating the constant polynomial 1 must yield 1.
        let weights = coefficients(indices).unwrap();
        let mut sum = Scalar::zero();
        for weight in weights.values() {
            sum.add(weight);
        }
        assert_eq!(sum, Scalar::one());
    }

    #[test]
    fn order_independent() {
        let a = coefficients(&[4, 1, 3]).unwrap();
        let b = coefficients(&[1, 3, 4]).unwrap();
        assert_eq!(a, b);
        assert_eq!(coefficient(3, &[3, 4, 1]).unwrap(), a[&3]);
    }

    #[test]
    fn rejects_bad_sets() {
        assert_eq!(coefficients(&[]), Err(Error::NoEvaluations));
        assert_eq!(coefficients(&[1, 2, 1]), Err(Error::DuplicateEval(1)));
        assert_eq!(coefficient(5, &[1, 2]), Err(Error::MissingEval(5)));
    }

    #[test]
    fn single_index_is_one() {
        assert_eq!(coefficient(7, &[7]).unwrap(), Scalar::one());
    }
}
