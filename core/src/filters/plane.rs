use crate::prelude::{CalibrationParams, DetectError, DetectResult, PlaneFilter};
use crate::records::PlaneCandidate;
use crate::stack::Plane;

/// First-stage filter: clips and thresholds pixel intensities, then groups
/// 4-connected bright pixels into per-plane candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityPlaneFilter;

impl IntensityPlaneFilter {
    pub fn new() -> Self {
        Self
    }
}

impl PlaneFilter for IntensityPlaneFilter {
    fn filter_plane(
        &self,
        plane: &Plane,
        calibration: &CalibrationParams,
    ) -> DetectResult<Vec<PlaneCandidate>> {
        let (height, width) = plane.pixels.dim();
        if height == 0 || width == 0 {
            return Err(DetectError::PlaneFilter {
                plane: plane.index,
                message: "plane has no pixel data".to_string(),
            });
        }

        let mut visited = vec![false; width * height];
        let mut frontier: Vec<(usize, usize)> = Vec::new();
        let mut candidates = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let start = y * width + x;
                if visited[start] {
                    continue;
                }
                visited[start] = true;
                if plane.pixels[[y, x]] <= calibration.threshold_value {
                    continue;
                }

                frontier.clear();
                frontier.push((y, x));
                let mut sum_x = 0.0_f64;
                let mut sum_y = 0.0_f64;
                let mut peak = 0.0_f32;
                let mut pixel_count = 0_usize;

                while let Some((cy, cx)) = frontier.pop() {
                    let value = plane.pixels[[cy, cx]].min(calibration.clipping_value);
                    peak = peak.max(value);
                    sum_x += cx as f64;
                    sum_y += cy as f64;
                    pixel_count += 1;

                    let neighbours = [
                        (cy.wrapping_sub(1), cx),
                        (cy + 1, cx),
                        (cy, cx.wrapping_sub(1)),
                        (cy, cx + 1),
                    ];
                    for (ny, nx) in neighbours {
                        if ny >= height || nx >= width {
                            continue;
                        }
                        let slot = ny * width + nx;
                        if visited[slot] {
                            continue;
                        }
                        visited[slot] = true;
                        if plane.pixels[[ny, nx]] > calibration.threshold_value {
                            frontier.push((ny, nx));
                        }
                    }
                }

                candidates.push(PlaneCandidate {
                    x: (sum_x / pixel_count as f64) as f32,
                    y: (sum_y / pixel_count as f64) as f32,
                    peak_intensity: peak,
                    pixel_count,
                });
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn calibration() -> CalibrationParams {
        CalibrationParams {
            clipping_value: 0.8,
            threshold_value: 0.5,
        }
    }

    fn plane_with_spots(spots: &[(usize, usize)]) -> Plane {
        let mut pixels = Array2::from_elem((16, 16), 0.1_f32);
        for &(y, x) in spots {
            pixels[[y, x]] = 1.0;
        }
        Plane::new(0, pixels)
    }

    #[test]
    fn connected_bright_pixels_form_one_candidate() {
        let plane = plane_with_spots(&[(4, 4), (4, 5), (5, 4), (5, 5)]);
        let candidates = IntensityPlaneFilter::new()
            .filter_plane(&plane, &calibration())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].pixel_count, 4);
        assert!((candidates[0].x - 4.5).abs() < 1e-6);
        assert!((candidates[0].y - 4.5).abs() < 1e-6);
    }

    #[test]
    fn separated_regions_form_separate_candidates() {
        let plane = plane_with_spots(&[(2, 2), (12, 12)]);
        let candidates = IntensityPlaneFilter::new()
            .filter_plane(&plane, &calibration())
            .unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn peaks_are_clipped_at_the_clipping_value() {
        let plane = plane_with_spots(&[(3, 3)]);
        let candidates = IntensityPlaneFilter::new()
            .filter_plane(&plane, &calibration())
            .unwrap();
        assert_eq!(candidates[0].peak_intensity, 0.8);
    }

    #[test]
    fn quiet_plane_yields_no_candidates() {
        let plane = plane_with_spots(&[]);
        let candidates = IntensityPlaneFilter::new()
            .filter_plane(&plane, &calibration())
            .unwrap();
        assert!(candidates.is_empty());
    }
}
