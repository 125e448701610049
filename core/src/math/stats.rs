pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f32>() / samples.len() as f32
    }

    pub fn std_dev(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(samples);
        let variance =
            samples.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / samples.len() as f32;
        variance.sqrt()
    }

    pub fn max(samples: &[f32]) -> f32 {
        samples.iter().copied().fold(0.0_f32, f32::max)
    }
}
