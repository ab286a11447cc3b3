//! Relative-to-absolute index resolution for slice operations.

use crate::{StorageError, StorageResult};

/// Resolves a possibly-relative `[from, to)` interval against `len`.
///
/// Negative indices count back from `len + 1`, so `-1` resolves to `len`
/// itself and `-(len as i64 + 1)` resolves to `0`. After resolution the
/// bounds must satisfy `0 <= from <= to <= len`.
///
/// # Errors
///
/// [`StorageError::Range`] when the resolved bounds are negative,
/// inverted, or past the end.
pub fn resolve(from: i64, to: i64, len: u64) -> StorageResult<(u64, u64)> {
    let err = |op| StorageError::Range { op, from, to, len };

    let resolved_from = if from < 0 { len as i64 + 1 + from } else { from };
    let resolved_to = if to < 0 { len as i64 + 1 + to } else { to };

    if resolved_from < 0 || resolved_to < 0 {
        return Err(err("resolve"));
    }
    let (resolved_from, resolved_to) = (resolved_from as u64, resolved_to as u64);
    if resolved_from > resolved_to {
        return Err(err("resolve"));
    }
    if resolved_to > len {
        return Err(err("resolve"));
    }
    Ok((resolved_from, resolved_to))
}

/// Validates an absolute `[from, to)` range against `len`.
///
/// # Errors
///
/// [`StorageError::Range`] when the range is inverted or past the end.
pub fn check(op: &'static str, from: u64, to: u64, len: u64) -> StorageResult<()> {
    if from > to || to > len {
        return Err(StorageError::Range { op, from: from as i64, to: to as i64, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_ranges_pass_through() {
        assert_eq!(resolve(1, 3, 4).unwrap(), (1, 3));
        assert_eq!(resolve(0, 0, 0).unwrap(), (0, 0));
        assert_eq!(resolve(4, 4, 4).unwrap(), (4, 4));
    }

    #[test]
    fn negative_one_means_len() {
        assert_eq!(resolve(1, -1, 4).unwrap(), (1, 4));
        assert_eq!(resolve(-1, -1, 4).unwrap(), (4, 4));
        assert_eq!(resolve(-5, -1, 4).unwrap(), (0, 4));
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        assert!(resolve(0, 5, 4).is_err());
        assert!(resolve(5, 5, 4).is_err());
        assert!(resolve(3, 1, 4).is_err());
        assert!(resolve(-6, -1, 4).is_err());
    }

    #[test]
    fn check_validates_absolute_bounds() {
        assert!(check("read", 0, 4, 4).is_ok());
        assert!(check("read", 2, 1, 4).is_err());
        assert!(check("read", 0, 5, 4).is_err());
    }
}
