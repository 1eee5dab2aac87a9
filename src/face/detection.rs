//! BlazeFace face detection networks.

use std::sync::OnceLock;

use nalgebra::{Rotation2, Vector2};

use crate::detection::{
    ssd::{Anchor, AnchorParams, Anchors, LayerInfo},
    Detection, Detections, Keypoint as DetectionKeypoint, Network,
};
use crate::image::Resolution;
use crate::nn::{self, Cnn, CnnInputShape, ColorMapper, Outputs};
use crate::num::sigmoid;
use crate::rect::Rect;

/// A keypoint of a face [`Detection`], named from the viewer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    LeftEye = 0,
    RightEye = 1,
    NoseTip = 2,
    Mouth = 3,
    LeftEarTragion = 4,
    RightEarTragion = 5,
}

pub const NUM_KEYPOINTS: usize = 6;
const BOX_PARAMS: usize = 4 + 2 * NUM_KEYPOINTS;

/// Selects the face detection network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceModel {
    /// Small and fast, for faces within about 2m of the camera (128x128 input).
    #[default]
    ShortRange,
    /// For faces up to about 5m away (192x192 input), several times slower.
    FullRange,
}

impl FaceModel {
    fn file_name(self) -> &'static str {
        match self {
            FaceModel::ShortRange => "face_detection_short_range.onnx",
            FaceModel::FullRange => "face_detection_full_range.onnx",
        }
    }

    fn anchors(self) -> &'static Anchors {
        static SHORT: OnceLock<Anchors> = OnceLock::new();
        static FULL: OnceLock<Anchors> = OnceLock::new();
        match self {
            FaceModel::ShortRange => SHORT.get_or_init(|| {
                Anchors::calculate(&AnchorParams {
                    layers: &[LayerInfo::new(2, 16, 16), LayerInfo::new(6, 8, 8)],
                })
            }),
            FaceModel::FullRange => FULL.get_or_init(|| {
                Anchors::calculate(&AnchorParams {
                    layers: &[LayerInfo::new(1, 48, 48)],
                })
            }),
        }
    }
}

/// A loaded BlazeFace network.
pub struct FaceNetwork {
    model: FaceModel,
    cnn: Cnn,
}

impl FaceNetwork {
    pub fn load(model: FaceModel) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            nn::model_file(model.file_name())?,
            CnnInputShape::NCHW,
            ColorMapper::linear(-1.0..=1.0),
        )?;
        Ok(Self { model, cnn })
    }

    pub fn model(&self) -> FaceModel {
        self.model
    }
}

impl Network for FaceNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, thresh: f32, detections: &mut Detections) {
        extract_outputs(
            self.cnn.input_resolution(),
            self.model.anchors(),
            outputs,
            thresh,
            detections,
        );
    }
}

fn extract_outputs(
    input_res: Resolution,
    anchors: &Anchors,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Detections,
) {
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

    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| DetectionKeypoint::new(xy[0] + ax, xy[1] + ay))
        .collect();
    let mut det = Detection::with_keypoints(
        confidence,
        Rect::from_center(
            box_params[0] + ax,
            box_params[1] + ay,
            box_params[2],
            box_params[3],
        ),
        keypoints,
    );

    let left_eye = det.keypoints()[Keypoint::LeftEye as usize].pos();
    let right_eye = det.keypoints()[Keypoint::RightEye as usize].pos();
    let angle = Rotation2::rotation_between(&Vector2::x(), &(right_eye - left_eye)).angle();
    det.set_angle(angle);

    det
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::nn::Tensor;
    use crate::rect::Vec2;

    fn outputs(model: FaceModel, hits: &[(usize, f32)]) -> Outputs {
        let n = model.anchors().anchor_count();
        let mut boxes = vec![0.0; n * BOX_PARAMS];
        let mut scores = vec![-8.0; n];
        for &(index, logit) in hits {
            let params = &mut boxes[index * BOX_PARAMS..(index + 1) * BOX_PARAMS];
            params[2] = 30.0;
            params[3] = 36.0;
            // eyes level, 20px apart
            params[4] = -10.0;
            params[6] = 10.0;
            scores[index] = logit;
        }
        [
            Tensor::from_iter(&[1, n, BOX_PARAMS], boxes),
            Tensor::from_iter(&[1, n, 1], scores),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn short_range_decoding() {
        let model = FaceModel::ShortRange;
        let mut dets = Detections::new();
        // index 512 is the first anchor of the 8x8 layer, centered at (8, 8) in a 128x128 input
        extract_outputs(
            Resolution::new(128, 128),
            model.anchors(),
            &outputs(model, &[(512, 3.0)]),
            0.5,
            &mut dets,
        );
        assert_eq!(dets.len(), 1);
        let det = dets.iter().next().unwrap();
        assert_relative_eq!(det.bounding_rect().center(), Vec2::new(8.0, 8.0));
        assert_relative_eq!(det.bounding_rect().height(), 36.0);
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_relative_eq!(det.keypoints()[Keypoint::RightEye as usize].x(), 18.0);
        assert_relative_eq!(det.angle(), 0.0);
        assert_relative_eq!(det.confidence(), sigmoid(3.0));
    }

    #[test]
    fn full_range_threshold() {
        let model = FaceModel::FullRange;
        let mut dets = Detections::new();
        extract_outputs(
            Resolution::new(192, 192),
            model.anchors(),
            &outputs(model, &[(0, 1.0), (1000, -1.0)]),
            0.5,
            &mut dets,
        );
        assert_eq!(dets.len(), 1);
        // first anchor of the 48x48 layer sits at (2, 2)
        assert_relative_eq!(
            dets.iter().next().unwrap().bounding_rect().center(),
            Vec2::new(2.0, 2.0)
        );
    }
}
