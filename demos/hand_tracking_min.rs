//! Minimal hand tracking: prints every landmark of every hand and marks it on the frame.
//!
//! Usage: `hand_tracking_min [camera index | /dev/videoN | video file]`

use std::time::Duration;

use perceptor::{
    gui,
    hand::{
        detector::{draw_landmarks, HandLandmarks},
        tracking::{HandTracker, TrackerParams},
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
    let mut tracker = HandTracker::new(TrackerParams::default())?;
    let mut frame_rate = FrameRate::new();
    let mut fps_counter = FpsCounter::new("hand_tracking_min");

    loop {
        let mut image = match capture.read() {
            Ok(Some(image)) => image,
            Ok(None) => break,
            Err(e) => {
                log::error!("failed to read frame: {e:#}");
                break;
            }
        };

        let res = image.resolution();
        for hand in tracker.process(&image)? {
            let hand = HandLandmarks::from_hand(&hand, res);
            for pos in hand.positions(res) {
                println!("{} {} {}", pos.id, pos.x, pos.y);
                draw::circle(&mut image, pos.x, pos.y, 31)
                    .color(Color::MAGENTA)
                    .filled();
            }
            draw_landmarks(&mut image, &hand);
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
                .chain(tracker.timers()),
        );
        if gui::wait_key(Duration::from_millis(1)) == Some(gui::KEY_ESCAPE) {
            break;
        }
    }

    Ok(())
}
