//! Palm detection.

use std::sync::OnceLock;

use nalgebra::{Rotation2, Vector2};

use crate::detection::{
    ssd::{Anchor, AnchorParams, Anchors, LayerInfo},
    Detection, Detections, Network,
};
use crate::image::Resolution;
use crate::nn::{self, Cnn, CnnInputShape, ColorMapper, Outputs};
use crate::num::sigmoid;
use crate::rect::{Rect, RotatedRect, Vec2};

use super::ModelComplexity;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const BOX_PARAMS: usize = 4 + 2 * NUM_KEYPOINTS;

/// Size of the hand region relative to the longer side of the palm box.
pub const HAND_ROI_SCALE: f32 = 2.6;

/// The BlazePalm detection network, in its lite or full variant.
///
/// Both variants take a 192x192 RGB image with channel values in `0.0..=1.0`.
pub struct PalmNetwork {
    cnn: Cnn,
}

impl PalmNetwork {
    /// Loads the palm detection model from the model directory.
    pub fn load(complexity: ModelComplexity) -> anyhow::Result<Self> {
        let file = match complexity {
            ModelComplexity::Lite => "palm_detection_lite.onnx",
            ModelComplexity::Full => "palm_detection_full.onnx",
        };
        let cnn = Cnn::new(
            nn::model_file(file)?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for PalmNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Detections) {
        extract_outputs(self.cnn.input_resolution(), outputs, threshold, detections);
    }
}

fn anchors() -> &'static Anchors {
    static ANCHORS: OnceLock<Anchors> = OnceLock::new();
    ANCHORS.get_or_init(|| {
        Anchors::calculate(&AnchorParams {
            layers: &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)],
        })
    })
}

/// Decodes the raw network outputs: boxes of shape `[1, N, 18]` and scores of shape `[1, N, 1]`.
pub(crate) fn extract_outputs(
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Detections,
) {
    let anchors = anchors();
    let num_anchors = anchors.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];

    assert_eq!(boxes.shape(), &[1, num_anchors, BOX_PARAMS]);
    assert_eq!(confidences.shape(), &[1, num_anchors, 1]);

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let box_params = boxes.index([0, index]).as_slice();
        detections.push(extract_detection(
            &anchors[index],
            input_res,
            box_params,
            conf,
        ));
    }
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let ax = anchor.x_center() * input_res.width() as f32;
    let ay = anchor.y_center() * input_res.height() as f32;

    let rect = Rect::from_center(
        box_params[0] + ax,
        box_params[1] + ay,
        box_params[2],
        box_params[3],
    );
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| crate::detection::Keypoint::new(xy[0] + ax, xy[1] + ay))
        .collect();

    let mut det = Detection::with_keypoints(confidence, rect, keypoints);
    det.set_angle(palm_angle(&det));
    det
}

/// Clockwise rotation of the palm, 0 when the fingers point up.
fn palm_angle(det: &Detection) -> f32 {
    let finger = det.keypoints()[Keypoint::MiddleFingerMcp as usize].pos();
    let wrist = det.keypoints()[Keypoint::Wrist as usize].pos();
    Rotation2::rotation_between(&Vector2::y(), &(wrist - finger)).angle()
}

/// Computes the rotated hand region a landmark network is run on from a palm detection.
///
/// The region is a square with side [`HAND_ROI_SCALE`] times the longer side of the palm box,
/// rotated like the palm and shifted by half the palm height toward the fingers.
pub fn hand_roi(palm: &Detection) -> RotatedRect {
    let rect = palm.bounding_rect();
    let angle = palm.angle();
    let shift = Rotation2::new(angle) * Vec2::new(0.0, -0.5 * rect.height());
    let center = rect.center() + shift;
    let side = rect.width().max(rect.height()) * HAND_ROI_SCALE;
    RotatedRect::new(Rect::from_center(center.x, center.y, side, side), angle)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use approx::assert_relative_eq;

    use super::*;
    use crate::detection::nms::NonMaxSuppression;
    use crate::nn::Tensor;

    const INPUT: Resolution = Resolution::new(192, 192);

    fn outputs(hits: &[(usize, f32, [f32; BOX_PARAMS])]) -> Outputs {
        let n = anchors().anchor_count();
        let mut boxes = vec![0.0; n * BOX_PARAMS];
        let mut scores = vec![-10.0; n];
        for (index, logit, params) in hits {
            boxes[index * BOX_PARAMS..(index + 1) * BOX_PARAMS].copy_from_slice(params);
            scores[*index] = *logit;
        }
        [
            Tensor::from_iter(&[1, n, BOX_PARAMS], boxes),
            Tensor::from_iter(&[1, n, 1], scores),
        ]
        .into_iter()
        .collect()
    }

    fn upright_palm() -> [f32; BOX_PARAMS] {
        let mut params = [0.0; BOX_PARAMS];
        params[2] = 40.0;
        params[3] = 40.0;
        // wrist below, middle finger MCP above the center
        params[4 + 2 * Keypoint::Wrist as usize + 1] = 20.0;
        params[4 + 2 * Keypoint::MiddleFingerMcp as usize + 1] = -20.0;
        params
    }

    #[test]
    fn decodes_boxes_relative_to_anchor() {
        let mut dets = Detections::new();
        extract_outputs(INPUT, &outputs(&[(0, 5.0, upright_palm())]), 0.5, &mut dets);
        assert_eq!(dets.len(), 1);

        let det = dets.iter().next().unwrap();
        // first anchor of the 24x24 layer is centered at (4, 4) pixels
        assert_relative_eq!(det.bounding_rect().center(), Vec2::new(4.0, 4.0));
        assert_relative_eq!(det.bounding_rect().width(), 40.0);
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_relative_eq!(det.keypoints()[0].y(), 24.0);
        assert_relative_eq!(det.confidence(), sigmoid(5.0));
        assert_relative_eq!(det.angle(), 0.0);
    }

    #[test]
    fn threshold_filters_scores() {
        let mut dets = Detections::new();
        let out = outputs(&[(3, 0.1, upright_palm()), (100, 2.0, upright_palm())]);
        extract_outputs(INPUT, &out, 0.6, &mut dets);
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets.iter().next().unwrap().confidence(), sigmoid(2.0));
    }

    #[test]
    fn rotated_palm_angle() {
        let mut params = upright_palm();
        // fingers pointing right: the wrist is left of the middle finger
        params[4..].fill(0.0);
        params[4 + 2 * Keypoint::Wrist as usize] = -20.0;
        params[4 + 2 * Keypoint::MiddleFingerMcp as usize] = 20.0;

        let mut dets = Detections::new();
        extract_outputs(INPUT, &outputs(&[(0, 5.0, params)]), 0.5, &mut dets);
        let det = dets.iter().next().unwrap();
        assert_relative_eq!(det.angle(), FRAC_PI_2, epsilon = 1e-5);

        let roi = hand_roi(det);
        assert_relative_eq!(roi.rect().width(), 40.0 * HAND_ROI_SCALE);
        // shifted toward the fingers, to the right of the palm
        assert_relative_eq!(roi.center(), Vec2::new(24.0, 4.0), epsilon = 1e-4);
    }

    #[test]
    fn upright_roi_is_shifted_up() {
        let mut det = Detection::new(1.0, Rect::from_center(100.0, 100.0, 20.0, 30.0));
        det.set_angle(0.0);
        let roi = hand_roi(&det);
        assert_relative_eq!(roi.center(), Vec2::new(100.0, 85.0));
        assert_relative_eq!(roi.rect().width(), 78.0);
        assert_relative_eq!(roi.rect().height(), 78.0);
    }

    #[test]
    fn downward_palm_survives_averaging() {
        let rect = Rect::from_center(100.0, 100.0, 40.0, 40.0);
        let mut a = Detection::new(0.9, rect);
        a.set_angle(PI - 0.05);
        let mut b = Detection::new(0.9, rect);
        b.set_angle(-PI + 0.05);

        let merged = NonMaxSuppression::new()
            .process(&mut vec![a, b])
            .collect::<Vec<_>>();
        assert_eq!(merged.len(), 1);

        // fingers point down, so the hand region moves down from the palm
        let roi = hand_roi(&merged[0]);
        assert_relative_eq!(roi.center(), Vec2::new(100.0, 120.0), epsilon = 1e-3);
    }
}
