use ndarray::Array2;

use crate::prelude::{DetectError, DetectResult, PlaneSource};
use crate::stack::plane::Plane;

/// Plane source backed by pre-loaded pixel data.
///
/// Reads clone the stored plane, so the stack can be shared read-only across
/// the whole worker pool.
pub struct InMemoryStack {
    first_index: u64,
    planes: Vec<Array2<f32>>,
}

impl InMemoryStack {
    pub fn new(first_index: u64, planes: Vec<Array2<f32>>) -> Self {
        Self {
            first_index,
            planes,
        }
    }

    /// Builds a stack from row-major pixel buffers, one per plane.
    pub fn from_raw_planes(
        first_index: u64,
        width: usize,
        height: usize,
        planes: Vec<Vec<f32>>,
    ) -> DetectResult<Self> {
        let mut built = Vec::with_capacity(planes.len());
        for (offset, pixels) in planes.into_iter().enumerate() {
            let plane_index = first_index + offset as u64;
            let pixels = Array2::from_shape_vec((height, width), pixels).map_err(|error| {
                DetectError::PlaneRead {
                    plane: plane_index,
                    message: format!("pixel buffer does not match {}x{}: {}", width, height, error),
                }
            })?;
            built.push(pixels);
        }
        Ok(Self::new(first_index, built))
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
}

impl PlaneSource for InMemoryStack {
    fn plane_range(&self) -> (u64, u64) {
        (self.first_index, self.first_index + self.planes.len() as u64)
    }

    fn read_plane(&self, index: u64) -> DetectResult<Plane> {
        let offset = index
            .checked_sub(self.first_index)
            .map(|offset| offset as usize)
            .filter(|&offset| offset < self.planes.len())
            .ok_or_else(|| DetectError::PlaneRead {
                plane: index,
                message: "index outside the loaded stack".to_string(),
            })?;
        Ok(Plane::new(index, self.planes[offset].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_serves_planes_by_absolute_index() {
        let stack = InMemoryStack::new(10, vec![Array2::zeros((2, 2)), Array2::ones((2, 2))]);
        assert_eq!(stack.plane_range(), (10, 12));
        let plane = stack.read_plane(11).unwrap();
        assert_eq!(plane.index, 11);
        assert_eq!(plane.as_slice(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn read_outside_the_stack_fails() {
        let stack = InMemoryStack::new(0, vec![Array2::zeros((2, 2))]);
        assert!(matches!(
            stack.read_plane(5),
            Err(DetectError::PlaneRead { plane: 5, .. })
        ));
    }

    #[test]
    fn raw_planes_must_match_the_declared_shape() {
        let result = InMemoryStack::from_raw_planes(0, 3, 3, vec![vec![0.0; 8]]);
        assert!(matches!(result, Err(DetectError::PlaneRead { plane: 0, .. })));
    }
}
