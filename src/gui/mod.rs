//! A simple, high-level debug GUI.
//!
//! Windows are keyed by name; showing an image under a new key opens a new window.

mod renderer;

use std::{
    collections::HashMap,
    iter,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, Sender},
        Mutex, OnceLock,
    },
    time::Duration,
};

use anyhow::anyhow;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer, Window};

/// Key reported by [`wait_key`] when a window is closed.
pub const KEY_ESCAPE: char = '\u{1b}';

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    keys: Sender<char>,
}

impl Gui {
    fn new(gpu: Gpu, keys: Sender<char>) -> Self {
        Self {
            gpu: Rc::new(gpu),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
            keys,
        }
    }

    fn get_renderer_mut(&mut self, win: WindowId) -> Option<&mut Renderer> {
        let key = self.win_id_to_key.get(&win)?;
        self.windows.get_mut(key)
    }

    fn show(
        &mut self,
        target: &winit::event_loop::EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: Vec<u8>,
    ) -> anyhow::Result<()> {
        if !self.windows.contains_key(&key) {
            log::debug!("creating window for image '{key}' at {res}");

            let win = Window::open(target, &key, res)?;
            let win_id = win.win.id();
            let renderer = Renderer::new(win, self.gpu.clone())?;

            self.win_id_to_key.insert(win_id, key.clone());
            self.windows.insert(key.clone(), renderer);
        }

        if let Some(renderer) = self.windows.get_mut(&key) {
            renderer.update_texture(res, &data);
            renderer.window().request_redraw();
        }
        Ok(())
    }

    fn close(&mut self, win: WindowId) {
        if let Some(key) = self.win_id_to_key.remove(&win) {
            log::debug!("closing window '{key}'");
            self.windows.remove(&key);
        }
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    if let Err(e) = self.show(target, key, res, data) {
                        log::error!("failed to display image: {e:#}");
                    }
                }
                Event::WindowEvent { window_id, event } => match event {
                    WindowEvent::ReceivedCharacter(c) => {
                        // The application may have exited its loop already.
                        self.keys.send(c).ok();
                    }
                    WindowEvent::CloseRequested => {
                        self.close(window_id);
                        self.keys.send(KEY_ESCAPE).ok();
                    }
                    _ => {}
                },
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self.get_renderer_mut(window) {
                        renderer.redraw();
                    }
                }
                _ => {}
            }
        });
    }
}

#[derive(Debug)]
enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
}

/// The application thread's connection to the GUI thread.
struct Display {
    proxy: Mutex<EventLoopProxy<Msg>>,
    keys: Mutex<Receiver<char>>,
}

static DISPLAY: OnceLock<Display> = OnceLock::new();

fn display() -> anyhow::Result<&'static Display> {
    DISPLAY.get().ok_or_else(|| {
        anyhow!("GUI not initialized (the application must be started with `perceptor::run`)")
    })
}

fn send(msg: Msg) -> anyhow::Result<()> {
    display()?
        .proxy
        .lock()
        .map_err(|_| anyhow!("GUI connection poisoned"))?
        .send_event(msg)
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

pub(crate) fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (key_tx, key_rx) = mpsc::channel();
    let display = Display {
        proxy: Mutex::new(event_loop.create_proxy()),
        keys: Mutex::new(key_rx),
    };
    if DISPLAY.set(display).is_err() {
        eprintln!("perceptor: GUI already initialized");
        process::exit(1);
    }

    let gpu = match pollster::block_on(Gpu::open()) {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("perceptor: failed to initialize GPU: {e:#}");
            process::exit(1);
        }
    };

    // Library is now initialized; spawn another thread to run the application code.
    std::thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(cb));
        match result {
            Ok(r) => {
                if r.is_success() {
                    process::exit(0);
                } else {
                    r.report(); // may print the error message
                    process::exit(1);
                }
            }
            Err(_payload) => {
                // The panic hook has already printed the message; 101 matches libstd.
                process::exit(101);
            }
        }
    });

    Gui::new(gpu, key_tx).run(event_loop);
}

/// Displays an image in the window named `key`.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    // Image data is RGBA8 internally so that no conversion before GPU upload is needed.
    send(Msg::Image {
        key: key.into(),
        res: image.resolution(),
        data: image.data().to_vec(),
    })
}

/// Waits up to `timeout` for a key press in any window.
///
/// Of the keys typed since the last call, returns [`KEY_ESCAPE`] (also sent when a window is
/// closed) if there was one, else `q`, else the most recent key. Returns `None` if nothing was
/// pressed.
pub fn wait_key(timeout: Duration) -> Option<char> {
    let keys = display().ok()?.keys.lock().ok()?;
    let first = keys.recv_timeout(timeout).ok()?;
    pick_key(iter::once(first).chain(keys.try_iter()))
}

/// Picks the key [`wait_key`] reports out of everything typed since the last poll.
fn pick_key(keys: impl IntoIterator<Item = char>) -> Option<char> {
    fn rank(key: char) -> u8 {
        match key {
            KEY_ESCAPE => 2,
            'q' => 1,
            _ => 0,
        }
    }
    keys.into_iter()
        .reduce(|picked, key| if rank(key) >= rank(picked) { key } else { picked })
}
