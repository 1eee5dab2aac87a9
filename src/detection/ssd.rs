//! Anchor (prior) generation for Single Shot MultiBox Detectors.
//!
//! Only the fixed-size anchor layout used by the MediaPipe networks is supported: every feature
//! map cell gets `boxes_per_cell` anchors, all centered in the cell.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network, with normalized center coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
pub struct LayerInfo {
    boxes_per_cell: u32,
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// - `boxes_per_cell`: the number of anchors associated with each cell in this feature map.
    /// - `width`/`height`: size of this layer's feature map, in cells.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

pub struct AnchorParams<'a> {
    /// Output layers, in the order the network emits them.
    pub layers: &'a [LayerInfo],
}

pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(params: &AnchorParams<'_>) -> Self {
        let mut anchors = Vec::new();

        for layer in params.layers {
            let height = layer.resolution.height();
            let width = layer.resolution.width();

            for y in 0..height {
                for x in 0..width {
                    let x_center = (x as f32 + 0.5) / width as f32;
                    let y_center = (y as f32 + 0.5) / height as f32;
                    for _ in 0..layer.boxes_per_cell {
                        anchors.push(Anchor { x_center, y_center });
                    }
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_counts() {
        let palm = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)],
        });
        assert_eq!(palm.anchor_count(), 2016);

        let face_short = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 16, 16), LayerInfo::new(6, 8, 8)],
        });
        assert_eq!(face_short.anchor_count(), 896);

        let face_full = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(1, 48, 48)],
        });
        assert_eq!(face_full.anchor_count(), 2304);
    }

    #[test]
    fn anchor_positions() {
        let anchors = Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 2, 2), LayerInfo::new(1, 1, 1)],
        });
        assert_eq!(anchors.anchor_count(), 9);

        let centers = (0..anchors.anchor_count())
            .map(|i| (anchors[i].x_center(), anchors[i].y_center()))
            .collect::<Vec<_>>();
        assert_eq!(
            centers,
            [
                (0.25, 0.25),
                (0.25, 0.25),
                (0.75, 0.25),
                (0.75, 0.25),
                (0.25, 0.75),
                (0.25, 0.75),
                (0.75, 0.75),
                (0.75, 0.75),
                (0.5, 0.5),
            ]
        );
    }

    #[test]
    #[should_panic]
    fn rejects_empty_cells() {
        LayerInfo::new(0, 4, 4);
    }
}
