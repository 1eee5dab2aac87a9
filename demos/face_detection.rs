//! Face detection through [`FaceDetector`], with corner-marked boxes. Press `q` to quit.
//!
//! Usage: `face_detection [camera index | /dev/videoN | video file]`

use std::time::Duration;

use perceptor::{
    face::detector::{FaceDetector, FaceDetectorOptions},
    gui,
    image::{draw, Color},
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
    let mut fps_counter = FpsCounter::new("face_detection");

    loop {
        let image = match capture.read() {
            Ok(Some(image)) => image,
            Ok(None) => break,
            Err(e) => {
                log::error!("failed to read frame: {e:#}");
                break;
            }
        };

        let (mut image, boxes) = detector.find_faces(&image, true)?;
        println!("{:?}", boxes);

        let fps = frame_rate.tick();
        draw::text(&mut image, 20, 70, &format!("FPS: {}", fps as i32))
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
        match gui::wait_key(Duration::from_millis(1)) {
            Some('q' | gui::KEY_ESCAPE) => break,
            _ => {}
        }
    }

    Ok(())
}
