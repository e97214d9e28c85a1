//! Capacity arithmetic.
//!
//! LINSTOR sizes volumes in KiB. Two conversions live here and they
//! deliberately stay separate:
//!
//! * [`allocation_size_kib`] reconciles a CSI `required`/`limit` byte range
//!   with the KiB granularity, rounding up and enforcing the limit.
//! * [`deployment_size_kib`] is the unconditional conversion applied when a
//!   volume is turned into a deployment configuration.

use crate::error::LinstorError;

/// Allocation granularity in bytes.
pub const KIB: i64 = 1024;

/// Smallest volume LINSTOR will allocate, in bytes.
pub const MIN_VOLUME_BYTES: i64 = 4096;

/// Smallest number of KiB that can hold `required_bytes` without exceeding
/// `limit_bytes`.
///
/// A `limit_bytes` of `0` means unlimited. Requests below
/// [`MIN_VOLUME_BYTES`] are raised to it, and partial KiB are rounded up
/// (5000 bytes need 5 KiB, not 4). When the rounded allocation does not fit,
/// the returned [`LinstorError::CapacityExceeded`] carries it.
pub fn allocation_size_kib(required_bytes: i64, limit_bytes: i64) -> Result<i64, LinstorError> {
    let unlimited = limit_bytes == 0;
    if MIN_VOLUME_BYTES > limit_bytes && !unlimited {
        return Err(LinstorError::MinimumExceedsLimit {
            minimum_bytes: MIN_VOLUME_BYTES,
            limit_bytes,
        });
    }

    let requested = required_bytes.max(MIN_VOLUME_BYTES);
    let allocated_kib = div_ceil(requested, KIB);

    if !unlimited && allocated_kib.saturating_mul(KIB) > limit_bytes {
        return Err(LinstorError::CapacityExceeded {
            required_bytes,
            allocated_kib,
            limit_bytes,
        });
    }
    Ok(allocated_kib)
}

/// KiB size written into a deployment configuration for a volume of
/// `size_bytes`.
///
/// Always one KiB above the truncated quotient, so an exact multiple of
/// 1024 still gains a KiB. Negative sizes are treated as zero.
pub fn deployment_size_kib(size_bytes: i64) -> u64 {
    size_bytes.max(0) as u64 / KIB as u64 + 1
}

fn div_ceil(value: i64, unit: i64) -> i64 {
    value / unit + i64::from(value % unit != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_minimum_is_raised() {
        assert_eq!(allocation_size_kib(100, 4096).unwrap(), 4);
        assert_eq!(allocation_size_kib(0, 0).unwrap(), 4);
        assert_eq!(allocation_size_kib(-5, 0).unwrap(), 4);
        assert_eq!(allocation_size_kib(1025, 0).unwrap(), 4);
    }

    #[test]
    fn partial_kib_rounds_up() {
        assert_eq!(allocation_size_kib(4097, 0).unwrap(), 5);
        assert_eq!(allocation_size_kib(5000, 0).unwrap(), 5);
        assert_eq!(allocation_size_kib(8192, 0).unwrap(), 8);
        assert_eq!(allocation_size_kib(1024 * 1024 + 1, 0).unwrap(), 1025);
    }

    #[test]
    fn exact_fit_within_limit() {
        assert_eq!(allocation_size_kib(8192, 8192).unwrap(), 8);
        assert_eq!(allocation_size_kib(4096, 4096).unwrap(), 4);
    }

    #[test]
    fn rounded_allocation_over_limit_fails() {
        let err = allocation_size_kib(5000, 4096).unwrap_err();
        assert_eq!(
            err,
            LinstorError::CapacityExceeded {
                required_bytes: 5000,
                allocated_kib: 5,
                limit_bytes: 4096,
            }
        );
        assert_eq!(err.allocated_kib(), Some(5));

        // Rounding alone pushes 5121 bytes past a 5121 byte limit.
        let err = allocation_size_kib(5121, 5121).unwrap_err();
        assert_eq!(err.allocated_kib(), Some(6));
    }

    #[test]
    fn minimum_over_limit_fails() {
        let err = allocation_size_kib(1, 4095).unwrap_err();
        assert!(matches!(
            err,
            LinstorError::MinimumExceedsLimit {
                minimum_bytes: 4096,
                limit_bytes: 4095
            }
        ));
    }

    #[test]
    fn never_under_allocates() {
        for required in [1, 1023, 1024, 1025, 4095, 4096, 4097, 10_000, 1 << 30] {
            let kib = allocation_size_kib(required, 0).unwrap();
            assert!(kib * KIB >= required);
            assert!(kib * KIB >= MIN_VOLUME_BYTES);
            // Never more than one unit of slack above the request.
            assert!(kib * KIB - required.max(MIN_VOLUME_BYTES) < KIB);
        }
    }

    #[test]
    fn deployment_size_always_adds_a_kib() {
        assert_eq!(deployment_size_kib(0), 1);
        assert_eq!(deployment_size_kib(1), 1);
        assert_eq!(deployment_size_kib(1023), 1);
        assert_eq!(deployment_size_kib(1024), 2);
        assert_eq!(deployment_size_kib(1025), 2);
        assert_eq!(deployment_size_kib(-1), 1);
        assert_eq!(deployment_size_kib(1 << 30), (1 << 20) + 1);
    }
}
