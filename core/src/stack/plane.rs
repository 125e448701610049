use ndarray::Array2;

/// One 2D slice of the input volume, indexed by its position along the z axis.
#[derive(Debug, Clone)]
pub struct Plane {
    pub index: u64,
    pub pixels: Array2<f32>,
}

impl Plane {
    pub fn new(index: u64, pixels: Array2<f32>) -> Self {
        Self { index, pixels }
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// Pixel values in row-major order; empty for a degenerate plane.
    pub fn as_slice(&self) -> &[f32] {
        self.pixels.as_slice().unwrap_or(&[])
    }
}
