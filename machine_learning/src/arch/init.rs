use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result};

/// Fills `out` with samples of a Xavier uniform distribution.
///
/// # Arguments
/// * `rng` - A random number generator.
/// * `fan_in` - The number of input units in the weight tensor.
/// * `fan_out` - The number of output units in the weight tensor.
/// * `out` - The buffer to fill.
///
/// # Returns
/// An error if the calculated range is invalid.
pub fn xavier_uniform<R: Rng>(
    rng: &mut R,
    fan_in: usize,
    fan_out: usize,
    out: &mut [f32],
) -> Result<()> {
    let range = (6. / (fan_in + fan_out) as f32).sqrt();
    let distribution =
        Uniform::new(-range, range).map_err(|e| MlErr::InvalidInit(e.to_string()))?;

    for w in out.iter_mut() {
        *w = distribution.sample(rng);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn samples_stay_within_the_xavier_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = [0.; 64];
        xavier_uniform(&mut rng, 4, 2, &mut out).unwrap();

        let range = 1.0f32;
        assert!(out.iter().all(|w| (-range..range).contains(w)));
        assert!(out.iter().any(|&w| w != 0.));
    }

    #[test]
    fn zero_fans_are_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = [0.; 4];
        assert!(xavier_uniform(&mut rng, 0, 0, &mut out).is_err());
    }
}
