//! Referral code generation and normalisation.

use std::fmt::Debug;

use rand::{Rng, seq::SliceRandom};

/// Every generated code starts with this prefix.
pub const REFERRAL_CODE_PREFIX: &str = "PRO";

/// Number of random characters following the prefix.
pub const REFERRAL_CODE_RANDOM_CHARS: usize = 5;

/// Collisions tolerated before registration gives up.
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Longest input considered a plausible code.
const MAX_CODE_LEN: usize = 32;

const REFERRAL_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of candidate referral codes.
pub trait ReferralCodeGenerator: Debug + Send + Sync {
    /// Produce a candidate code. Uniqueness is checked by the caller.
    fn generate(&self) -> String;
}

/// Codes sampled from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReferralCodes;

impl ReferralCodeGenerator for RandomReferralCodes {
    fn generate(&self) -> String {
        generate_referral_code(&mut rand::thread_rng())
    }
}

/// Sample a `PRO`-prefixed code from the upper-case alphanumeric alphabet.
pub fn generate_referral_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(REFERRAL_CODE_PREFIX.len() + REFERRAL_CODE_RANDOM_CHARS);

    code.push_str(REFERRAL_CODE_PREFIX);

    code.extend(
        (0..REFERRAL_CODE_RANDOM_CHARS)
            .filter_map(|_| REFERRAL_CODE_ALPHABET.choose(&mut *rng))
            .map(|byte| char::from(*byte)),
    );

    code
}

/// Canonical form used for lookups: trimmed and upper-cased.
///
/// Returns `None` for input that can never match a stored code, so callers
/// can skip the database round trip.
#[must_use]
pub fn normalize_referral_code(code: &str) -> Option<String> {
    let code = code.trim();

    if code.is_empty()
        || code.len() > MAX_CODE_LEN
        || !code.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }

    Some(code.to_ascii_uppercase())
}
