//! Wall-clock gate runtime
//!
//! Drives a [`GateController`] from real time. The controller lives behind
//! `Arc<Mutex<_>>`; a background thread advances it to the elapsed
//! milliseconds once per frame, and [`GateHandle`]s post route changes and
//! mounts from anywhere. Every mutation happens under the one lock, so
//! transitions are serialized exactly as UI-thread callbacks would be.
//!
//! Surface callbacks run under that lock too. A surface must not call back
//! into a [`GateHandle`] or [`GateRuntime::with_controller`]; hand the work
//! to another thread (or the wake callback) instead.
//!
//! ```ignore
//! let mut runtime = GateRuntime::new(GateController::new(profiles, surface)?);
//! runtime.start_background(); // 120fps
//!
//! let gate = runtime.handle();
//! gate.mounted()?;
//! gate.route_changed("/about")?;
//! ```

use crate::controller::{GateController, GateCycle, GateState};
use crate::error::{GateError, Result};
use crate::surface::PresentationSurface;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Frame rate of the background thread unless configured otherwise
pub const DEFAULT_FRAME_RATE: u32 = 120;

/// Callback invoked from the runtime thread after a frame fired transitions
///
/// Use it to wake an event loop that should redraw the gate.
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

struct RuntimeInner<S: PresentationSurface> {
    controller: GateController<S>,
    epoch: Instant,
}

impl<S: PresentationSurface> RuntimeInner<S> {
    fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Bring the controller's clock up to wall-clock time
    fn sync(&mut self) -> Result<usize> {
        let now = self.elapsed_ms().max(self.controller.now_ms());
        self.controller.advance_to(now)
    }
}

/// Owns a controller and the thread that advances it
pub struct GateRuntime<S: PresentationSurface + Send + 'static> {
    inner: Arc<Mutex<RuntimeInner<S>>>,
    /// Stop signal for background thread
    stop_flag: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    frame_rate: u32,
    wake_callback: Option<WakeCallback>,
}

impl<S: PresentationSurface + Send + 'static> GateRuntime<S> {
    /// Wrap `controller`; wall-clock time 0 is now
    pub fn new(controller: GateController<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RuntimeInner {
                controller,
                epoch: Instant::now(),
            })),
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            frame_rate: DEFAULT_FRAME_RATE,
            wake_callback: None,
        }
    }

    /// Set the background tick rate (clamped to at least 1fps)
    pub fn set_frame_rate(&mut self, fps: u32) {
        self.frame_rate = fps.max(1);
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Set a callback run after any frame that fired a transition
    pub fn set_wake_callback<F>(&mut self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.wake_callback = Some(Arc::new(callback));
    }

    /// Start advancing the controller on a background thread
    pub fn start_background(&mut self) {
        if self.thread_handle.is_some() {
            return; // Already running
        }

        let inner = Arc::clone(&self.inner);
        let stop_flag = Arc::clone(&self.stop_flag);
        let wake_callback = self.wake_callback.clone();
        let frame_duration = Duration::from_micros(1_000_000 / u64::from(self.frame_rate));

        tracing::debug!("GateRuntime: starting background thread at {}fps", self.frame_rate);

        self.thread_handle = Some(thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                let start = Instant::now();

                let fired = {
                    let mut inner = inner.lock().unwrap();
                    match inner.sync() {
                        Ok(fired) => fired,
                        Err(err) => {
                            tracing::warn!("GateRuntime: tick failed: {}", err);
                            0
                        }
                    }
                };

                if fired > 0 {
                    if let Some(ref callback) = wake_callback {
                        callback();
                    }
                }

                // Sleep for remaining frame time
                let elapsed = start.elapsed();
                if elapsed < frame_duration {
                    thread::sleep(frame_duration - elapsed);
                }
            }
        }));
    }

    /// Stop the background thread and wait for it
    pub fn stop_background(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_background_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Advance the controller to wall-clock time on the calling thread
    ///
    /// Returns the number of transitions fired.
    pub fn tick(&self) -> Result<usize> {
        self.inner.lock().unwrap().sync()
    }

    /// Milliseconds since the runtime was created
    pub fn elapsed_ms(&self) -> u64 {
        self.inner.lock().unwrap().elapsed_ms()
    }

    /// Get a handle for posting events to this runtime
    pub fn handle(&self) -> GateHandle<S> {
        GateHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run `f` against the controller under the runtime lock
    pub fn with_controller<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut GateController<S>) -> R,
    {
        f(&mut self.inner.lock().unwrap().controller)
    }
}

impl<S: PresentationSurface + Send + 'static> Drop for GateRuntime<S> {
    fn drop(&mut self) {
        self.stop_background();
    }
}

/// A weak handle to a [`GateRuntime`]
///
/// Won't keep the runtime alive. Event methods return
/// [`GateError::RuntimeGone`] once it has been dropped; queries return `None`.
pub struct GateHandle<S: PresentationSurface> {
    inner: Weak<Mutex<RuntimeInner<S>>>,
}

impl<S: PresentationSurface> Clone for GateHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S: PresentationSurface> GateHandle<S> {
    /// Catch the controller up to wall-clock time, then apply `f`
    fn post<R>(&self, f: impl FnOnce(&mut GateController<S>) -> R) -> Result<R> {
        let inner = self.inner.upgrade().ok_or(GateError::RuntimeGone)?;
        let mut guard = inner.lock().unwrap();
        guard.sync()?;
        Ok(f(&mut guard.controller))
    }

    /// Deliver the application-mounted event
    pub fn mounted(&self) -> Result<bool> {
        self.post(|gate| gate.on_application_mounted())
    }

    /// Deliver a route change
    pub fn route_changed(&self, path: impl Into<String>) -> Result<bool> {
        let path = path.into();
        self.post(move |gate| gate.on_route_changed(path))
    }

    /// Cancel the cycle in flight
    pub fn teardown(&self) -> Result<bool> {
        self.post(|gate| gate.teardown())
    }

    pub fn state(&self) -> Option<GateState> {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().unwrap().controller.state())
    }

    pub fn current_cycle(&self) -> Option<GateCycle> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.lock().unwrap().controller.current_cycle())
    }

    /// Check if the runtime is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}
