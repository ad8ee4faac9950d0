use crate::{MlErr, Result};

/// Checks that `value` is a finite number.
///
/// # Arguments
/// * `value` - The value to check, usually a loss.
/// * `msg` - The message attached to the error when the check fails.
///
/// # Returns
/// The same value, or `MlErr::NonFinite` if it's `NaN` or infinite.
pub fn check_numerics(value: f32, msg: &'static str) -> Result<f32> {
    if value.is_finite() {
        return Ok(value);
    }

    Err(MlErr::NonFinite { msg, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_values_pass_through() {
        assert_eq!(check_numerics(0.25, "loss is nan"), Ok(0.25));
    }

    #[test]
    fn nan_and_infinities_are_rejected() {
        for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = check_numerics(value, "loss is nan").unwrap_err();
            assert!(matches!(err, MlErr::NonFinite { msg: "loss is nan", .. }));
        }
    }
}
