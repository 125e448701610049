use log::{debug, warn};

use crate::math::stats::StatsHelper;
use crate::prelude::{CalibrationParams, DetectError, DetectResult, DetectionThresholds};
use crate::stack::Plane;

/// Computes the per-run clipping and threshold values from the first plane.
///
/// Runs exactly once, before any worker starts; the result is never
/// recomputed mid-run.
pub fn calibrate(
    plane: &Plane,
    thresholds: &DetectionThresholds,
) -> DetectResult<CalibrationParams> {
    let pixels = plane.as_slice();
    if pixels.is_empty() {
        return Err(DetectError::Calibration(format!(
            "plane {} has no pixel data",
            plane.index
        )));
    }

    let mean = StatsHelper::mean(pixels);
    let std_dev = StatsHelper::std_dev(pixels);
    let max = StatsHelper::max(pixels);

    let threshold_value = mean + thresholds.n_sds_above_mean * std_dev;
    let mut clipping_value = max * thresholds.clip_fraction;
    if clipping_value < threshold_value {
        warn!(
            "clipping value {:.4} below threshold {:.4}; raising it to the threshold",
            clipping_value, threshold_value
        );
        clipping_value = threshold_value;
    }

    debug!(
        "calibrated from plane {}: clipping {:.4}, threshold {:.4}",
        plane.index, clipping_value, threshold_value
    );

    Ok(CalibrationParams {
        clipping_value,
        threshold_value,
    })
}
