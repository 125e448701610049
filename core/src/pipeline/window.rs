use std::collections::VecDeque;

use crate::pipeline::message::PlaneResult;
use crate::prelude::{DetectError, DetectResult};

/// Contiguous buffer of the most recent plane results, owned solely by the
/// volumetric consumer.
///
/// Indices must arrive gap-free and increasing; the buffer holds at most
/// `depth` planes, evicting the oldest on overflow.
pub struct RollingWindow {
    depth: usize,
    planes: VecDeque<PlaneResult>,
}

impl RollingWindow {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            planes: VecDeque::with_capacity(depth),
        }
    }

    pub fn push(&mut self, result: PlaneResult) -> DetectResult<()> {
        if let Some(last) = self.planes.back() {
            let expected = last.plane_index + 1;
            if result.plane_index != expected {
                return Err(DetectError::WindowGap {
                    expected,
                    received: result.plane_index,
                });
            }
        }
        self.planes.push_back(result);
        if self.planes.len() > self.depth {
            self.planes.pop_front();
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.planes.len() == self.depth
    }

    /// Centre plane; the plane a full-window volumetric pass reports on.
    pub fn centre(&self) -> Option<&PlaneResult> {
        self.planes.get(self.planes.len() / 2)
    }

    pub fn planes(&self) -> impl Iterator<Item = &PlaneResult> {
        self.planes.iter()
    }

    pub fn first_index(&self) -> Option<u64> {
        self.planes.front().map(|plane| plane.plane_index)
    }

    pub fn last_index(&self) -> Option<u64> {
        self.planes.back().map(|plane| plane.plane_index)
    }
}
