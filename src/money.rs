//! Amounts are integer cents in `i64`.

use crate::error::AppError;

/// Largest amount accepted from a client (ten billion in major units).
/// Totals over many such amounts stay far below `i64::MAX`.
pub const MAX_CENTS: i64 = 1_000_000_000_000;

/// Strictly positive and at most [`MAX_CENTS`].
pub fn ensure_positive(what: &str, cents: i64) -> Result<(), AppError> {
    if cents <= 0 {
        return Err(AppError::BadRequest(format!("{what} must be positive")));
    }
    ensure_within_limit(what, cents)
}

/// Zero or more and at most [`MAX_CENTS`].
pub fn ensure_non_negative(what: &str, cents: i64) -> Result<(), AppError> {
    if cents < 0 {
        return Err(AppError::BadRequest(format!("{what} cannot be negative")));
    }
    ensure_within_limit(what, cents)
}

fn ensure_within_limit(what: &str, cents: i64) -> Result<(), AppError> {
    if cents > MAX_CENTS {
        return Err(AppError::BadRequest(format!(
            "{what} cannot exceed {MAX_CENTS} cents"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        ensure_positive("Amount", 1).unwrap();
        ensure_positive("Amount", MAX_CENTS).unwrap();
        assert!(ensure_positive("Amount", 0).is_err());
        assert!(ensure_positive("Amount", MAX_CENTS + 1).is_err());
        assert!(ensure_positive("Amount", i64::MAX).is_err());

        ensure_non_negative("Price", 0).unwrap();
        assert!(ensure_non_negative("Price", -1).is_err());
        assert!(ensure_non_negative("Price", i64::MAX).is_err());
    }
}
