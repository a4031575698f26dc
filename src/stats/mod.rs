//! Sample moments (count, sum, mean, sample variance) of a sequence
//! of measurements, as needed for z-scores and group means.

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("no inputs given")]
    NoInputs,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub num_values: usize,
    pub sum: f64,
    pub mean: f64,
    /// Sum of squared differences from the mean divided by
    /// `num_values - 1`; NaN for a single value.
    pub sample_variance: f64,
}

impl Moments {
    /// Single pass (Welford's method), so that `vals` can be an
    /// iterator over a subset of a column.
    pub fn from_values(vals: impl IntoIterator<Item = f64>) -> Result<Self, StatsError> {
        let mut num_values: usize = 0;
        let mut sum = 0.;
        let mut mean = 0.;
        let mut m2 = 0.;
        for val in vals {
            num_values += 1;
            sum += val;
            let delta = val - mean;
            mean += delta / num_values as f64;
            m2 += delta * (val - mean);
        }
        if num_values == 0 {
            return Err(StatsError::NoInputs);
        }
        let sample_variance = if num_values < 2 {
            f64::NAN
        } else {
            m2 / (num_values - 1) as f64
        };
        Ok(Moments {
            num_values,
            sum,
            mean,
            sample_variance,
        })
    }

    pub fn sample_standard_deviation(&self) -> f64 {
        self.sample_variance.sqrt()
    }

    /// NaN if the sample has fewer than 2 values or no spread.
    pub fn z_score(&self, val: f64) -> f64 {
        let sd = self.sample_standard_deviation();
        if sd == 0. {
            f64::NAN
        } else {
            (val - self.mean) / sd
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn t_moments() -> Result<()> {
        let m = Moments::from_values([23., 4., 8., 30., 7.])?;
        assert_eq!(m.num_values, 5);
        assert_abs_diff_eq!(m.sum, 72., epsilon = 1e-9);
        assert_abs_diff_eq!(m.mean, 14.4, epsilon = 1e-9);
        // population variance would be 104.24
        assert_abs_diff_eq!(m.sample_variance, 130.3, epsilon = 1e-9);
        assert_abs_diff_eq!(m.sample_standard_deviation(), 11.414902, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn t_z_score() -> Result<()> {
        let m = Moments::from_values([500., 520., 480.])?;
        assert_abs_diff_eq!(m.mean, 500.);
        assert_abs_diff_eq!(m.sample_standard_deviation(), 20.);
        assert_abs_diff_eq!(m.z_score(520.), 1.);
        assert_abs_diff_eq!(m.z_score(470.), -1.5);
        Ok(())
    }

    #[test]
    fn t_degenerate() -> Result<()> {
        assert_eq!(Moments::from_values([]), Err(StatsError::NoInputs));

        let single = Moments::from_values([3.5])?;
        assert_abs_diff_eq!(single.mean, 3.5);
        assert!(single.sample_variance.is_nan());
        assert!(single.z_score(3.5).is_nan());

        let constant = Moments::from_values([2., 2., 2.])?;
        assert_abs_diff_eq!(constant.sample_variance, 0.);
        assert!(constant.z_score(2.).is_nan());
        Ok(())
    }
}
