use anyhow::Context;
use serde::{Deserialize, Serialize};
use somacore::prelude::{default_pool_size, DetectionConfig, DetectionThresholds};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::generator::volume::VolumeConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub volume: VolumeConfig,
    pub window_depth: usize,
    /// 0 selects the machine default (cores minus a reserved margin).
    pub pool_size: usize,
    pub stall_timeout_secs: u64,
    pub thresholds: DetectionThresholds,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            volume: VolumeConfig::default(),
            window_depth: 3,
            pool_size: 0,
            stall_timeout_secs: 30,
            thresholds: DetectionThresholds::default(),
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading run config {}", path_ref.display()))?;
        let config: RunConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing run config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_detection_config(&self) -> DetectionConfig {
        let pool_size = if self.pool_size == 0 {
            default_pool_size()
        } else {
            self.pool_size
        };
        DetectionConfig {
            plane_start: 0,
            plane_end: self.volume.planes as u64,
            window_depth: self.window_depth,
            pool_size,
            thresholds: self.thresholds.clone(),
            stall_timeout: Duration::from_secs(self.stall_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn detection_config_covers_the_whole_volume() {
        let config = RunConfig::default();
        let detection = config.to_detection_config();
        assert_eq!(detection.plane_start, 0);
        assert_eq!(detection.plane_end, config.volume.planes as u64);
        assert!(detection.pool_size >= 1);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"window_depth: 5\npool_size: 2\nvolume:\n  planes: 20\n  seed: 7\n")
            .unwrap();
        let path = temp.into_temp_path();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.window_depth, 5);
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.volume.planes, 20);
        assert_eq!(config.volume.seed, 7);
        assert_eq!(config.volume.width, VolumeConfig::default().width);
    }
}
