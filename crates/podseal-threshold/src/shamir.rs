//! Shamir secret sharing over GF(256).
//!
//! Each byte of a 32-byte secret gets its own random polynomial of degree
//! `threshold - 1`. Share `x` holds the evaluation of every polynomial at
//! `x`; any `threshold` distinct shares recover the secret by Lagrange
//! interpolation at zero.

use rand::RngCore;

use crate::error::{Result, ThresholdError};

/// Secret length in bytes.
pub const SECRET_LEN: usize = 32;

/// One share of a secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Share {
    /// Evaluation point, never zero.
    pub index: u8,
    /// Polynomial values at `index`.
    pub value: [u8; SECRET_LEN],
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Share({})", self.index)
    }
}

/// Multiply in GF(256) with the AES polynomial x^8 + x^4 + x^3 + x + 1.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse, `a^254`. Zero maps to zero.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluate a polynomial (constant term first) at `x` with Horner's rule.
fn eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Split `secret` into shares `1..=total`, any `threshold` of which recover it.
pub fn split(secret: &[u8; SECRET_LEN], threshold: u8, total: u8) -> Result<Vec<Share>> {
    if threshold == 0 || threshold > total {
        return Err(ThresholdError::InvalidThreshold {
            threshold: threshold.into(),
            total: total.into(),
        });
    }

    let mut rng = rand::thread_rng();
    let mut coefficients = vec![0u8; threshold as usize];
    let mut shares: Vec<Share> = (1..=total)
        .map(|index| Share {
            index,
            value: [0u8; SECRET_LEN],
        })
        .collect();

    for (byte, &s) in secret.iter().enumerate() {
        coefficients[0] = s;
        rng.fill_bytes(&mut coefficients[1..]);
        for share in shares.iter_mut() {
            share.value[byte] = eval(&coefficients, share.index);
        }
    }

    Ok(shares)
}

/// Recover the secret from distinct shares.
///
/// The result is only meaningful if at least `threshold` consistent shares
/// are supplied; the caller is responsible for that.
pub fn combine(shares: &[Share]) -> Result<[u8; SECRET_LEN]> {
    if shares.is_empty() {
        return Err(ThresholdError::MalformedShare("no shares".into()));
    }
    for (i, share) in shares.iter().enumerate() {
        if share.index == 0 {
            return Err(ThresholdError::MalformedShare("share index 0".into()));
        }
        if shares[..i].iter().any(|s| s.index == share.index) {
            return Err(ThresholdError::MalformedShare(format!(
                "duplicate share index {}",
                share.index
            )));
        }
    }

    // Lagrange basis at zero: l_i = prod_{j != i} x_j / (x_j - x_i); subtraction is xor.
    let basis: Vec<u8> = shares
        .iter()
        .map(|si| {
            shares
                .iter()
                .filter(|sj| sj.index != si.index)
                .fold(1u8, |acc, sj| {
                    gf_mul(acc, gf_mul(sj.index, gf_inv(sj.index ^ si.index)))
                })
        })
        .collect();

    let mut secret = [0u8; SECRET_LEN];
    for (byte, out) in secret.iter_mut().enumerate() {
        *out = shares
            .iter()
            .zip(&basis)
            .fold(0u8, |acc, (share, &l)| acc ^ gf_mul(share.value[byte], l));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_field_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse of {a}");
        }
    }

    #[test]
    fn test_single_share_threshold_is_the_secret() {
        let secret = [9u8; SECRET_LEN];
        let shares = split(&secret, 1, 3).unwrap();
        for share in shares {
            assert_eq!(share.value, secret);
        }
    }

    #[test]
    fn test_invalid_thresholds() {
        let secret = [0u8; SECRET_LEN];
        assert!(split(&secret, 0, 3).is_err());
        assert!(split(&secret, 4, 3).is_err());
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let secret = [1u8; SECRET_LEN];
        let shares = split(&secret, 2, 3).unwrap();
        assert!(combine(&[shares[0], shares[0]]).is_err());
    }

    #[test]
    fn test_too_few_shares_do_not_recover() {
        let secret = [0x5a; SECRET_LEN];
        let shares = split(&secret, 3, 5).unwrap();
        // With overwhelming probability two shares of a degree-2 polynomial miss.
        assert_ne!(combine(&shares[..2]).unwrap(), secret);
    }

    proptest! {
        #[test]
        fn prop_any_threshold_subset_recovers(
            secret in any::<[u8; SECRET_LEN]>(),
            threshold in 1u8..6,
            extra in 0u8..4,
            rotate in 0usize..10,
        ) {
            let total = threshold + extra;
            let mut shares = split(&secret, threshold, total).unwrap();
            let len = shares.len();
            shares.rotate_left(rotate % len);

            let recovered = combine(&shares[..threshold as usize]).unwrap();
            prop_assert_eq!(recovered, secret);
        }
    }
}
