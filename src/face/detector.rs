//! The [`FaceDetector`] wrapper: face boxes in pixels of a resized output frame.

use crate::detection::{Detections, Detector};
use crate::image::{draw, AsImageViewMut, Color, Image, ImageViewMut, Resolution};
use crate::num::to_pixel;
use crate::rect::Rect;

use super::detection::{FaceModel, FaceNetwork, NUM_KEYPOINTS};

/// Options of a [`FaceDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetectorOptions {
    min_detection_confidence: f32,
    model: FaceModel,
    output_resolution: Option<Resolution>,
}

impl Default for FaceDetectorOptions {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            model: FaceModel::ShortRange,
            output_resolution: Some(Resolution::SVGA),
        }
    }
}

impl FaceDetectorOptions {
    /// Minimum confidence of a reported face (default 0.5).
    pub fn min_detection_confidence(mut self, confidence: f32) -> Self {
        self.min_detection_confidence = confidence;
        self
    }

    pub fn model(mut self, model: FaceModel) -> Self {
        self.model = model;
        self
    }

    /// Size the frame is resized to after detection (default 800x600). [`None`] keeps the input
    /// size.
    pub fn output_resolution(mut self, res: Option<Resolution>) -> Self {
        self.output_resolution = res;
        self
    }
}

/// A face box in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeBoundingBox {
    /// Converts to pixels of an image of size `res`, truncating toward zero.
    pub fn to_pixels(&self, res: Resolution) -> BoundingBox {
        BoundingBox {
            x: to_pixel(self.xmin, res.width()),
            y: to_pixel(self.ymin, res.height()),
            width: to_pixel(self.width, res.width()),
            height: to_pixel(self.height, res.height()),
        }
    }
}

/// A face box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    bbox: RelativeBoundingBox,
    score: f32,
    keypoints: [[f32; 2]; NUM_KEYPOINTS],
}

impl FaceDetection {
    pub fn new(bbox: RelativeBoundingBox, score: f32, keypoints: [[f32; 2]; NUM_KEYPOINTS]) -> Self {
        Self {
            bbox,
            score,
            keypoints,
        }
    }

    pub fn bounding_box(&self) -> RelativeBoundingBox {
        self.bbox
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    /// Normalized keypoints, indexed by [`super::detection::Keypoint`].
    pub fn keypoints(&self) -> &[[f32; 2]; NUM_KEYPOINTS] {
        &self.keypoints
    }
}

/// A face box with its index and score, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub id: usize,
    pub bbox: BoundingBox,
    pub score: f32,
}

/// The faces found in the last frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceResult {
    detections: Vec<FaceDetection>,
}

impl FaceResult {
    pub fn new(detections: Vec<FaceDetection>) -> Self {
        Self { detections }
    }

    pub fn detections(&self) -> &[FaceDetection] {
        &self.detections
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Converts all faces to pixel boxes of an image of size `res`.
    pub fn boxes(&self, res: Resolution) -> Vec<FaceBox> {
        self.detections
            .iter()
            .enumerate()
            .map(|(id, det)| FaceBox {
                id,
                bbox: det.bbox.to_pixels(res),
                score: det.score,
            })
            .collect()
    }
}

const BOX_COLOR: Color = Color::MAGENTA;

/// Draws a thin box outline with thick strokes along its corners.
///
/// `thickness` is the width of the corner strokes, `rect_thickness` the width of the outline and
/// `line_length` the length of each corner stroke.
pub fn fancy_draw<I: AsImageViewMut>(
    image: &mut I,
    bbox: BoundingBox,
    thickness: u32,
    rect_thickness: u32,
    line_length: i32,
) {
    fancy_draw_impl(
        &mut image.as_view_mut(),
        bbox,
        thickness,
        rect_thickness,
        line_length,
    );
}

fn fancy_draw_impl(
    image: &mut ImageViewMut<'_>,
    bbox: BoundingBox,
    t: u32,
    rt: u32,
    l: i32,
) {
    let BoundingBox {
        x,
        y,
        width,
        height,
    } = bbox;
    let (x1, y1) = (x + width, y + height);

    draw::rect(
        image,
        Rect::from_top_left(x as f32, y as f32, width as f32, height as f32),
    )
    .color(BOX_COLOR)
    .stroke_width(rt);

    let strokes = [
        (x, y, x + l, y),
        (x, y, x, y + l),
        (x1, y, x1 - l, y),
        (x1, y, x1, y + l),
        (x, y1, x + l, y1),
        (x, y1, x, y1 - l),
        (x1, y1, x1 - l, y1),
        (x1, y1, x1, y1 - l),
    ];
    for (sx, sy, ex, ey) in strokes {
        draw::line(image, sx, sy, ex, ey)
            .color(BOX_COLOR)
            .stroke_width(t);
    }
}

/// Draws the `"{score}%"` label 20 pixels above a face box.
pub fn draw_score<I: AsImageViewMut>(image: &mut I, bbox: BoundingBox, score: f32) {
    draw::text(image, bbox.x, bbox.y - 20, &score_label(score))
        .color(BOX_COLOR)
        .align_left()
        .align_baseline();
}

/// Formats a score as a whole percentage, truncated.
pub fn score_label(score: f32) -> String {
    format!("{}%", (score * 100.0) as i32)
}

/// Detects faces and reports them in pixels of a resized output frame.
pub struct FaceDetector {
    options: FaceDetectorOptions,
    detector: Detector,
    results: FaceResult,
}

impl FaceDetector {
    /// Creates a face detector, loading the selected network from the model directory.
    pub fn new(options: FaceDetectorOptions) -> anyhow::Result<Self> {
        let mut detector = Detector::new(FaceNetwork::load(options.model)?);
        detector.set_threshold(options.min_detection_confidence);
        log::debug!("face detector initialized with {:?}", options);
        Ok(Self {
            options,
            detector,
            results: FaceResult::default(),
        })
    }

    pub fn options(&self) -> &FaceDetectorOptions {
        &self.options
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Detects faces on `image`, then resizes it to the output resolution.
    ///
    /// Returns the resized frame and one [`FaceBox`] per face in its pixel coordinates. With
    /// `draw` set, each box is drawn with [`fancy_draw`] and labeled with its score.
    pub fn find_faces(
        &mut self,
        image: &Image,
        draw: bool,
    ) -> anyhow::Result<(Image, Vec<FaceBox>)> {
        self.detect(image)?;

        let mut out = match self.options.output_resolution {
            Some(res) if res != image.resolution() => image.resize(res),
            _ => image.clone(),
        };

        let boxes = self.results.boxes(out.resolution());
        if draw {
            for face in &boxes {
                fancy_draw(&mut out, face.bbox, 7, 1, 20);
                draw_score(&mut out, face.bbox, face.score);
            }
        }

        Ok((out, boxes))
    }

    /// Runs detection and returns the faces in coordinates normalized to `image`.
    ///
    /// The result is also kept as [`FaceDetector::results`].
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<&FaceResult> {
        let detections = self.detector.detect(image)?;
        self.results = relative_faces(detections, image.resolution());
        Ok(&self.results)
    }

    /// The result of the last [`FaceDetector::detect`] or [`FaceDetector::find_faces`] call.
    pub fn results(&self) -> &FaceResult {
        &self.results
    }
}

/// Scales pixel detections on a frame of size `res` down to `0.0..=1.0`.
fn relative_faces(detections: &Detections, res: Resolution) -> FaceResult {
    let (w, h) = (res.width() as f32, res.height() as f32);
    let faces = detections
        .iter()
        .map(|det| {
            let rect = det.bounding_rect();
            let mut keypoints = [[0.0; 2]; NUM_KEYPOINTS];
            for (out, kp) in keypoints.iter_mut().zip(det.keypoints()) {
                *out = [kp.x() / w, kp.y() / h];
            }
            FaceDetection::new(
                RelativeBoundingBox {
                    xmin: rect.x() / w,
                    ymin: rect.y() / h,
                    width: rect.width() / w,
                    height: rect.height() / h,
                },
                det.confidence(),
                keypoints,
            )
        })
        .collect();
    FaceResult::new(faces)
}
