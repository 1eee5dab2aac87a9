//! Hand tracking through [`HandDetector`], printing the thumb tip of the first hand.
//!
//! Usage: `hand_tracking [camera index | /dev/videoN | video file]`

use std::time::Duration;

use perceptor::{
    gui,
    hand::{
        detector::{HandDetector, HandDetectorOptions},
        landmark::LandmarkIdx,
    },
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
    let mut detector = HandDetector::new(HandDetectorOptions::default())?;
    let mut frame_rate = FrameRate::new();
    let mut fps_counter = FpsCounter::new("hand_tracking");

    loop {
        let mut image = match capture.read() {
            Ok(Some(image)) => image,
            Ok(None) => break,
            Err(e) => {
                log::error!("failed to read frame: {e:#}");
                break;
            }
        };

        detector.find_hands(&mut image, true)?;
        let positions = detector.find_position(&mut image, 0, true);
        if let Some(thumb_tip) = positions.get(LandmarkIdx::ThumbTip as usize) {
            println!("{:?}", [thumb_tip.id as i32, thumb_tip.x, thumb_tip.y]);
        }

        let fps = frame_rate.tick();
        draw::text(&mut image, 10, 70, &(fps as i32).to_string())
            .color(Color::MAGENTA)
            .scale(3)
            .align_left()
            .align_baseline();

        gui::show_image("Image", &image)?;
        fps_counter.tick_with(
            capture
                .timers()
                .into_iter()
                .chain(detector.tracker().timers()),
        );
        if gui::wait_key(Duration::from_millis(1)) == Some(gui::KEY_ESCAPE) {
            break;
        }
    }

    Ok(())
}
