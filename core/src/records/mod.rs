pub mod candidate;
pub mod cell;

pub use candidate::PlaneCandidate;
pub use cell::CellDetection;
