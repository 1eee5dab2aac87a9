//! Minimal face detection on a video file, drawing plain boxes and scores.
//!
//! Usage: `face_detection_min <video file | camera index>`

use std::time::Duration;

use perceptor::{
    face::detector::{draw_score, FaceDetector, FaceDetectorOptions},
    gui,
    image::{draw, Color, Resolution},
    rect::Rect,
    timer::{FpsCounter, FrameRate},
    video::{VideoCapture, VideoSource},
};

fn main() {
    perceptor::init_logger!();
    perceptor::run(app);
}

fn app() -> anyhow::Result<()> {
    let mut capture = VideoCapture::open(&VideoSource::from_args())?;
    let mut detector = FaceDetector::new(FaceDetectorOptions::default())?;
    let mut frame_rate = FrameRate::new();
    let mut fps_counter = FpsCounter::new("face_detection_min");

    loop {
        let image = match capture.read() {
            Ok(Some(image)) => image,
            Ok(None) => break,
            Err(e) => {
                log::error!("failed to read frame: {e:#}");
                break;
            }
        };

        let result = detector.detect(&image)?;
        println!("{:?}", result);

        let mut image = image.resize(Resolution::SVGA);
        for face in result.boxes(image.resolution()) {
            let b = face.bbox;
            let rect = Rect::from_top_left(b.x as f32, b.y as f32, b.width as f32, b.height as f32);
            draw::rect(&mut image, rect)
                .color(Color::MAGENTA)
                .stroke_width(2);
            draw_score(&mut image, b, face.score);
        }

        let fps = frame_rate.tick();
        draw::text(&mut image, 20, 70, &format!("fps:{}", fps as i32))
            .color(Color::GREEN)
            .scale(2)
            .align_left()
            .align_baseline();

        gui::show_image("Image", &image)?;
        fps_counter.tick_with(
            capture
                .timers()
                .into_iter()
                .chain(detector.detector().timers()),
        );
        if gui::wait_key(Duration::from_millis(1)) == Some(gui::KEY_ESCAPE) {
            break;
        }
    }

    Ok(())
}
