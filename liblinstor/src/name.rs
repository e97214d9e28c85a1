//! LINSTOR resource naming.
//!
//! LINSTOR resource names must match `^[A-Za-z_][A-Za-z0-9\-_]{1,47}$`,
//! contain at least one ASCII letter and must not be the reserved word
//! `all`. [`canonicalize`] maps arbitrary volume names onto that grammar.
//!
//! The mapping is deterministic but neither injective (`a.b` and `a_b`
//! collide) nor promised to be stable across releases: persist the output,
//! never recompute it. Callers that need uniqueness layer
//! [`fallback_name`] on top.

use std::sync::LazyLock;

use rand::RngCore;
use regex::Regex;

use crate::error::LinstorError;

/// Prefix tried when substitution alone does not yield a legal name.
pub const CANONICAL_PREFIX: &str = "LS_";

/// Name LINSTOR reserves for "every resource".
const RESERVED_NAME: &str = "all";

static NAME_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9\-_]{1,47}$").expect("resource name grammar is a valid regex")
});

static ILLEGAL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9\-_]").expect("illegal character class is a valid regex")
});

/// Check `name` against the LINSTOR naming grammar.
pub fn validate(name: &str) -> Result<(), LinstorError> {
    let invalid = |reason: &str| LinstorError::InvalidName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if name == RESERVED_NAME {
        return Err(invalid("'all' is reserved"));
    }
    if !name.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("must contain at least one alphabetic (A-Za-z) character"));
    }
    if !NAME_GRAMMAR.is_match(name) {
        return Err(invalid(&format!("must match '{}'", NAME_GRAMMAR.as_str())));
    }
    Ok(())
}

/// `true` when `name` can be used as a LINSTOR resource name as-is.
pub fn is_valid(name: &str) -> bool {
    validate(name).is_ok()
}

/// Derive a legal LINSTOR resource name from `name`.
///
/// Tries, in order: the name itself, the name with every illegal character
/// replaced by `_`, and that result prefixed with [`CANONICAL_PREFIX`].
/// A legal name is always returned unchanged, so the function is idempotent.
/// The empty string and the reserved word are rejected outright.
pub fn canonicalize(name: &str) -> Result<String, LinstorError> {
    if name.is_empty() || name == RESERVED_NAME {
        return Err(LinstorError::InvalidName {
            name: name.to_owned(),
            reason: "empty and reserved names are never rewritten".to_owned(),
        });
    }

    if is_valid(name) {
        return Ok(name.to_owned());
    }

    let substituted = ILLEGAL_CHARS.replace_all(name, "_").into_owned();
    if is_valid(&substituted) {
        return Ok(substituted);
    }

    let prefixed = format!("{CANONICAL_PREFIX}{substituted}");
    if is_valid(&prefixed) {
        return Ok(prefixed);
    }

    Err(LinstorError::InvalidName {
        name: name.to_owned(),
        reason: "no legal form after substitution and prefixing".to_owned(),
    })
}

/// A fresh random resource name: `prefix` followed by a v4 UUID.
///
/// The randomness source is injected so the result is reproducible under a
/// seeded generator.
pub fn fallback_name<R: RngCore + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
    format!("{prefix}{id}")
}
