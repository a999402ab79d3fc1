//! Background task protocol.
//!
//! The engine does not schedule anything itself. A host runs a
//! [`BackgroundTask`] on whatever thread it likes, usually through
//! [`run_task`], and receives progress and errors through a
//! [`TaskListener`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

#[allow(unused_imports)]
use tracing::{debug, error, info, trace};

use crate::backend::BackendDevice;
use crate::collection::FilterCollection;
use crate::filter::Filter;
use crate::filters::{CascadedSharpen, FilmGrain};
use crate::image::Image;
use crate::layer::SharedLayer;

/// Receives task notifications.
pub trait TaskListener: Send + Sync {
    /// Progress in percent (0..=100).
    fn report_progress(&self, _task: &str, _percent: u8) {}

    /// A task failed.
    fn report_error(&self, task: &str, message: &str);

    /// A task is about to start.
    fn on_start(&self, _task: &str) {}

    /// A task has ended, successfully or not.
    fn on_finish(&self, _task: &str) {}
}

/// Listener forwarding everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl TaskListener for LogListener {
    fn report_progress(&self, task: &str, percent: u8) {
        debug!(task, percent, "task progress");
    }

    fn report_error(&self, task: &str, message: &str) {
        error!(task, message, "task failed");
    }

    fn on_start(&self, task: &str) {
        info!(task, "task started");
    }

    fn on_finish(&self, task: &str) {
        info!(task, "task finished");
    }
}

/// State a task works on.
#[derive(Clone)]
pub struct Session {
    /// Device tasks render on.
    pub device: Arc<dyn BackendDevice>,
    /// Filters of the session.
    pub filters: Arc<Mutex<FilterCollection>>,
    /// Original image, if one is loaded.
    pub image: Option<Arc<RwLock<Image>>>,
}

impl Session {
    /// Session over `filters` without an image.
    pub fn new(device: Arc<dyn BackendDevice>, filters: FilterCollection) -> Self {
        Self {
            device,
            filters: Arc::new(Mutex::new(filters)),
            image: None,
        }
    }

    /// Builder-style image assignment.
    pub fn with_image(mut self, image: Image) -> Self {
        self.image = Some(Arc::new(RwLock::new(image)));
        self
    }

    /// Top layer of the original image.
    pub fn top_layer(&self) -> Option<SharedLayer> {
        self.image.as_ref()?.read().ok()?.top_layer()
    }
}

/// Unit of background work.
pub trait BackgroundTask: Send {
    /// Task name used in notifications.
    fn name(&self) -> &str;

    /// Captures what the task needs; false refuses to run.
    fn on_start(&mut self, session: &mut Session) -> bool;

    /// Does the work, reporting through `listener`. Returns false on failure
    /// (after reporting the error).
    fn run(&mut self, listener: &dyn TaskListener) -> bool;
}

/// Starts and runs `task`, wrapping it in start/finish notifications.
pub fn run_task(task: &mut dyn BackgroundTask, session: &mut Session, listener: &dyn TaskListener) -> bool {
    let name = task.name().to_string();
    listener.on_start(&name);
    let ok = if task.on_start(session) {
        task.run(listener)
    } else {
        listener.report_error(&name, "task could not start");
        false
    };
    listener.on_finish(&name);
    ok
}

// ============================================================================
// Filter preparation tasks
// ============================================================================

/// Runs `work` on the named filter with the session's top layer.
fn with_filter_and_layer<F: Filter>(
    task: &str,
    session: Option<&Session>,
    filter_name: &str,
    listener: &dyn TaskListener,
    work: impl FnOnce(&mut F, &Arc<dyn BackendDevice>, &crate::layer::ImageLayer) -> bool,
) -> bool {
    let Some(session) = session else {
        listener.report_error(task, "task was not started");
        return false;
    };
    let Some(layer) = session.top_layer() else {
        listener.report_error(task, "no image loaded");
        return false;
    };
    let Ok(layer) = layer.read() else {
        listener.report_error(task, "image layer is poisoned");
        return false;
    };
    if !layer.contains_data_for_backend(session.device.backend_id()) {
        listener.report_error(task, "image holds no data for the session backend");
        return false;
    }
    let Ok(mut filters) = session.filters.lock() else {
        listener.report_error(task, "filter collection is poisoned");
        return false;
    };
    let Some(filter) = filters.get_mut::<F>(filter_name) else {
        listener.report_error(task, &format!("session has no {filter_name} filter"));
        return false;
    };
    if !work(filter, &session.device, &layer) {
        listener.report_error(task, &format!("{filter_name} preparation failed"));
        return false;
    }
    true
}

/// Rebuilds the blur buffers of the session's [`CascadedSharpen`].
#[derive(Clone)]
pub struct PrepareSharpenTask {
    radii: Vec<f32>,
    session: Option<Session>,
}

impl PrepareSharpenTask {
    /// Task name.
    pub const NAME: &'static str = "PrepareSharpen";

    /// Task generating cascades with `radii`.
    pub fn new(radii: Vec<f32>) -> Self {
        Self { radii, session: None }
    }
}

impl BackgroundTask for PrepareSharpenTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_start(&mut self, session: &mut Session) -> bool {
        self.session = Some(session.clone());
        true
    }

    fn run(&mut self, listener: &dyn TaskListener) -> bool {
        listener.report_progress(Self::NAME, 0);
        let radii = &self.radii;
        let ok = with_filter_and_layer::<CascadedSharpen>(
            Self::NAME,
            self.session.as_ref(),
            CascadedSharpen::NAME,
            listener,
            |filter, device, layer| filter.generate_cascades(radii, device, layer),
        );
        if ok {
            listener.report_progress(Self::NAME, 100);
        }
        ok
    }
}

/// Rolls new noise for the session's [`FilmGrain`].
#[derive(Clone, Default)]
pub struct RenderGrainTask {
    session: Option<Session>,
}

impl RenderGrainTask {
    /// Task name.
    pub const NAME: &'static str = "RenderGrain";

    /// New task.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackgroundTask for RenderGrainTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_start(&mut self, session: &mut Session) -> bool {
        self.session = Some(session.clone());
        true
    }

    fn run(&mut self, listener: &dyn TaskListener) -> bool {
        listener.report_progress(Self::NAME, 0);
        let ok = with_filter_and_layer::<FilmGrain>(
            Self::NAME,
            self.session.as_ref(),
            FilmGrain::NAME,
            listener,
            |filter, device, layer| filter.reset_grain(device, layer.format(), layer.width(), layer.height()),
        );
        if ok {
            listener.report_progress(Self::NAME, 100);
        }
        ok
    }
}

// ============================================================================
// Running flag
// ============================================================================

/// Wraps a task with a shared flag telling whether it is running.
pub struct AsyncTask<T> {
    task: T,
    running: Arc<AtomicBool>,
}

impl<T: BackgroundTask> AsyncTask<T> {
    /// Wraps `task`.
    pub fn new(task: T) -> Self {
        Self {
            task,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while [`run`](BackgroundTask::run) executes.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Flag for observers on other threads.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Wrapped task.
    pub fn inner(&self) -> &T {
        &self.task
    }
}

impl<T: BackgroundTask> BackgroundTask for AsyncTask<T> {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn on_start(&mut self, session: &mut Session) -> bool {
        self.task.on_start(session)
    }

    fn run(&mut self, listener: &dyn TaskListener) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            listener.report_error(self.task.name(), "task is already running");
            return false;
        }
        let ok = self.task.run(listener);
        self.running.store(false, Ordering::Release);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use crate::filters::create_filter;
    use crate::layer::ImageLayer;
    use blacksilk_core::PixelFormat;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl TaskListener for Recorder {
        fn report_progress(&self, task: &str, percent: u8) {
            self.0.lock().unwrap().push(format!("{task}:{percent}"));
        }
        fn report_error(&self, task: &str, message: &str) {
            self.0.lock().unwrap().push(format!("{task}:error:{message}"));
        }
        fn on_start(&self, task: &str) {
            self.0.lock().unwrap().push(format!("{task}:start"));
        }
        fn on_finish(&self, task: &str) {
            self.0.lock().unwrap().push(format!("{task}:finish"));
        }
    }

    fn session(with_image: bool) -> Session {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let mut filters = FilterCollection::new();
        filters.add(create_filter(CascadedSharpen::NAME, device.clone()).unwrap());
        filters.add(create_filter(FilmGrain::NAME, device.clone()).unwrap());
        let session = Session::new(device.clone(), filters);
        if with_image {
            let layer = ImageLayer::new(&device, PixelFormat::Rgb8, 4, 4).unwrap();
            session.with_image(Image::from_layer(layer))
        } else {
            session
        }
    }

    #[test]
    fn test_prepare_sharpen() {
        let mut session = session(true);
        let recorder = Recorder::default();
        let mut task = PrepareSharpenTask::new(vec![1.0, 2.0, 4.0]);
        assert!(run_task(&mut task, &mut session, &recorder));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            ["PrepareSharpen:start", "PrepareSharpen:0", "PrepareSharpen:100", "PrepareSharpen:finish"]
        );
        let mut filters = session.filters.lock().unwrap();
        let sharpen = filters.get_mut::<CascadedSharpen>(CascadedSharpen::NAME).unwrap();
        assert_eq!(sharpen.cascade_count(), 3);
        assert!(sharpen.cascade_blur_buffer(2).is_some());
    }

    #[test]
    fn test_render_grain_without_image_reports_error() {
        let mut session = session(false);
        let recorder = Recorder::default();
        let mut task = RenderGrainTask::new();
        assert!(!run_task(&mut task, &mut session, &recorder));
        let events = recorder.0.lock().unwrap();
        assert_eq!(events[2], "RenderGrain:error:no image loaded");
        assert_eq!(events.last().unwrap(), "RenderGrain:finish");
    }

    #[test]
    fn test_render_grain_and_running_flag() {
        let mut session = session(true);
        let mut task = AsyncTask::new(RenderGrainTask::new());
        assert!(!task.is_running());
        assert!(run_task(&mut task, &mut session, &LogListener));
        assert!(!task.is_running());
        let mut filters = session.filters.lock().unwrap();
        let grain = filters.get_mut::<FilmGrain>(FilmGrain::NAME).unwrap();
        assert_eq!(grain.grain().unwrap().width(), 4);
    }
}
