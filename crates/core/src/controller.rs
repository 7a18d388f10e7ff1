//! Sequencing of the capture-analyze cycle.
//!
//! [`AppController`] lives on the UI thread. A triggered capture walks
//! through the session phases:
//!
//! ```text
//! Idle --trigger--> Selecting --selection--> Capturing --image--> Analyzing --result--> Idle
//!                       \--cancelled--> Idle       \--capture error--> Idle
//! ```
//!
//! The screen stays claimed through `Capturing`: the UI must keep its own
//! windows out of the way until [`AppController::screen_in_use`] drops.
//!
//! Capture and analysis run on one background thread per request. The
//! thread reports back over a channel that [`AppController::poll`] drains on
//! the UI thread, so the presenter is never touched from anywhere else.
//! Only one request can be in flight; a trigger while busy is rejected with
//! a notice.

use crate::capture::RegionCapturer;
use crate::diagnostics::DiagnosticLog;
use crate::error::{AnalysisErrorKind, CaptureError};
use crate::presenter::ResultPresenter;
use crate::selection::{SelectionOutcome, SelectionRectangle};
use crate::vision::{AnalysisResult, DEFAULT_ANALYSIS_PROMPT, VisionClient};
use chrono::{DateTime, Local};
use image::DynamicImage;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Duration;

/// Time given to the compositor to remove the overlay before sampling.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

pub const BUSY_NOTICE: &str = "A capture is already in progress";
pub const CANCELLED_NOTICE: &str = "Selection cancelled";

#[derive(Clone, Debug)]
pub struct ControllerOptions {
    pub prompt: String,
    pub settle_delay: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_ANALYSIS_PROMPT.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// One captured image on its way to the vision API.
pub struct CaptureRequest {
    pub id: u64,
    pub image: DynamicImage,
    pub captured_at: DateTime<Local>,
}

impl CaptureRequest {
    fn new(id: u64, image: DynamicImage) -> Self {
        Self {
            id,
            image,
            captured_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Selecting,
    /// Waiting for the settle delay and the screen grab.
    Capturing { request_id: u64 },
    Analyzing { request_id: u64 },
}

/// Process-wide state, owned by the controller.
#[derive(Debug)]
struct AppSession {
    phase: SessionPhase,
    next_request_id: u64,
}

impl AppSession {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            next_request_id: 1,
        }
    }

    fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }
}

enum JobEvent {
    Captured {
        request_id: u64,
        image: DynamicImage,
    },
    CaptureFailed {
        request_id: u64,
        error: CaptureError,
    },
    Finished {
        request_id: u64,
        result: AnalysisResult,
    },
}

impl JobEvent {
    fn request_id(&self) -> u64 {
        match self {
            Self::Captured { request_id, .. }
            | Self::CaptureFailed { request_id, .. }
            | Self::Finished { request_id, .. } => *request_id,
        }
    }
}

type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct AppController<P: ResultPresenter> {
    capturer: Arc<RegionCapturer>,
    vision: Arc<dyn VisionClient>,
    log: Arc<DiagnosticLog>,
    presenter: P,
    options: ControllerOptions,
    session: AppSession,
    tx: Sender<JobEvent>,
    rx: Receiver<JobEvent>,
    waker: Waker,
}

impl<P: ResultPresenter> AppController<P> {
    pub fn new(
        capturer: Arc<RegionCapturer>,
        vision: Arc<dyn VisionClient>,
        log: Arc<DiagnosticLog>,
        presenter: P,
        options: ControllerOptions,
    ) -> Self {
        let (tx, rx) = channel();
        Self {
            capturer,
            vision,
            log,
            presenter,
            options,
            session: AppSession::new(),
            tx,
            rx,
            waker: Arc::new(|| {}),
        }
    }

    /// Called from the background thread after each event it sends, so the
    /// UI can schedule a frame and [`poll`](Self::poll).
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Arc::new(waker);
        self
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    pub fn is_busy(&self) -> bool {
        self.session.phase != SessionPhase::Idle
    }

    /// True from the trigger until the job has sampled the screen.
    pub fn screen_in_use(&self) -> bool {
        matches!(
            self.session.phase,
            SessionPhase::Selecting | SessionPhase::Capturing { .. }
        )
    }

    pub fn is_selecting(&self) -> bool {
        self.session.phase == SessionPhase::Selecting
    }

    /// Replaces the vision client used by the next request.
    pub fn set_vision_client(&mut self, vision: Arc<dyn VisionClient>) {
        self.vision = vision;
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.options.prompt = prompt.into();
    }

    /// Starts a selection unless a cycle is already running.
    pub fn trigger_capture(&mut self) -> TriggerOutcome {
        if self.is_busy() {
            log::info!(
                "[CONTROLLER] trigger rejected, session is {:?}",
                self.session.phase
            );
            self.presenter.show_notice(BUSY_NOTICE);
            return TriggerOutcome::Rejected;
        }

        log::info!("[CONTROLLER] selection started");
        self.session.phase = SessionPhase::Selecting;
        TriggerOutcome::Started
    }

    /// Consumes the overlay's outcome. A valid rectangle starts the
    /// background capture and analysis.
    pub fn complete_selection(&mut self, outcome: SelectionOutcome, dpi_scale: f64) {
        if !self.is_selecting() {
            log::warn!(
                "[CONTROLLER] selection outcome ignored, session is {:?}",
                self.session.phase
            );
            return;
        }

        let rect = match outcome {
            SelectionOutcome::Selected(rect) => rect,
            SelectionOutcome::Cancelled => {
                log::info!("[CONTROLLER] selection cancelled");
                self.session.phase = SessionPhase::Idle;
                self.presenter.show_notice(CANCELLED_NOTICE);
                return;
            }
        };

        let request_id = self.session.allocate_request_id();
        self.session.phase = SessionPhase::Capturing { request_id };
        self.presenter.set_busy(true);

        if let Err(e) = self.spawn_job(request_id, rect, dpi_scale) {
            log::error!("[CONTROLLER] failed to start background job: {}", e);
            self.session.phase = SessionPhase::Idle;
            self.presenter.set_busy(false);
            self.presenter
                .show_error(&format!("Failed to start capture: {}", e));
        }
    }

    fn spawn_job(
        &self,
        request_id: u64,
        rect: SelectionRectangle,
        dpi_scale: f64,
    ) -> std::io::Result<()> {
        let capturer = self.capturer.clone();
        let vision = self.vision.clone();
        let log = self.log.clone();
        let tx = self.tx.clone();
        let waker = self.waker.clone();
        let prompt = self.options.prompt.clone();
        let settle_delay = self.options.settle_delay;

        log::info!(
            "[CONTROLLER] request {} started for {:?} at scale {}",
            request_id,
            rect,
            dpi_scale
        );

        thread::Builder::new()
            .name(format!("capture-{}", request_id))
            .spawn(move || {
                // A closed receiver means the app has moved on; the send
                // results are dropped on purpose.
                let send = |event: JobEvent| {
                    if tx.send(event).is_ok() {
                        waker();
                    }
                };

                if !settle_delay.is_zero() {
                    thread::sleep(settle_delay);
                }

                let image = match capturer.capture(rect, dpi_scale) {
                    Ok(image) => image,
                    Err(error) => {
                        log::warn!("[CONTROLLER] capture {} failed: {}", request_id, error);
                        send(JobEvent::CaptureFailed { request_id, error });
                        return;
                    }
                };

                let request = CaptureRequest::new(request_id, image);
                send(JobEvent::Captured {
                    request_id,
                    image: request.image.clone(),
                });

                let result = run_analysis(vision.as_ref(), &request, &prompt);
                drop(request);

                if let Err(e) = log.record(&result) {
                    log::warn!(
                        "[CONTROLLER] failed to write {}: {}",
                        log.path().display(),
                        e
                    );
                }

                send(JobEvent::Finished { request_id, result });
            })
            .map(|_| ())
    }

    /// Applies everything the background job reported since the last call.
    /// Must run on the UI thread; returns whether anything was applied.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            changed |= self.apply(event);
        }
        changed
    }

    fn apply(&mut self, event: JobEvent) -> bool {
        let current = match self.session.phase {
            SessionPhase::Capturing { request_id } | SessionPhase::Analyzing { request_id } => {
                Some(request_id)
            }
            _ => None,
        };
        if current != Some(event.request_id()) {
            log::debug!(
                "[CONTROLLER] discarding stale event for request {}",
                event.request_id()
            );
            return false;
        }

        match event {
            JobEvent::Captured { request_id, image } => {
                self.session.phase = SessionPhase::Analyzing { request_id };
                self.presenter.show_capture(&image);
            }
            JobEvent::CaptureFailed { error, .. } => {
                self.finish();
                self.presenter
                    .show_error(&format!("Error capturing image: {}", error));
            }
            JobEvent::Finished { request_id, result } => {
                log::info!(
                    "[CONTROLLER] request {} finished (success: {})",
                    request_id,
                    result.is_success()
                );
                self.finish();
                self.presenter.show_result(&result);
            }
        }
        true
    }

    fn finish(&mut self) {
        self.session.phase = SessionPhase::Idle;
        self.presenter.set_busy(false);
    }
}

/// Drives one async analysis to completion on the calling thread.
fn run_analysis(vision: &dyn VisionClient, request: &CaptureRequest, prompt: &str) -> AnalysisResult {
    log::debug!(
        "[CONTROLLER] analysing request {} captured at {}",
        request.id,
        request.captured_at.format("%H:%M:%S%.3f")
    );

    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(vision.analyze(&request.image, prompt)),
        Err(e) => AnalysisResult::Failure {
            kind: AnalysisErrorKind::Network,
            message: format!("Failed to create async runtime: {}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ScreenGrabber;
    use crate::selection::PhysicalRegion;
    use async_trait::async_trait;
    use image::RgbaImage;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingPresenter {
        captures: Vec<(u32, u32)>,
        results: Vec<AnalysisResult>,
        errors: Vec<String>,
        notices: Vec<String>,
        busy: bool,
    }

    impl ResultPresenter for RecordingPresenter {
        fn show_capture(&mut self, image: &DynamicImage) {
            self.captures.push((image.width(), image.height()));
        }

        fn show_result(&mut self, result: &AnalysisResult) {
            self.results.push(result.clone());
        }

        fn show_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }

        fn show_notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }

        fn set_busy(&mut self, busy: bool) {
            self.busy = busy;
        }
    }

    /// Returns a blank image of exactly the requested physical size.
    struct BlankGrabber;

    impl ScreenGrabber for BlankGrabber {
        fn grab(&self, region: PhysicalRegion) -> Result<DynamicImage, CaptureError> {
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(region.width, region.height)))
        }
    }

    struct FailingGrabber;

    impl ScreenGrabber for FailingGrabber {
        fn grab(&self, _region: PhysicalRegion) -> Result<DynamicImage, CaptureError> {
            Err(CaptureError::display("no screen"))
        }
    }

    /// Blocks each grab until the test lets it through.
    struct GatedGrabber {
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl ScreenGrabber for GatedGrabber {
        fn grab(&self, region: PhysicalRegion) -> Result<DynamicImage, CaptureError> {
            let _ = self.gate.lock().unwrap().recv_timeout(Duration::from_secs(5));
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(region.width, region.height)))
        }
    }

    /// Scripted vision client that counts calls and concurrent requests.
    /// When gated, each call blocks until the test releases it.
    struct ScriptedVision {
        result: AnalysisResult,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl ScriptedVision {
        fn new(result: AnalysisResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                gate: Mutex::new(None),
            })
        }

        fn gated(result: AnalysisResult) -> (Arc<Self>, std::sync::mpsc::Sender<()>) {
            let (release, gate) = std::sync::mpsc::channel();
            let vision = Self::new(result);
            *vision.gate.lock().unwrap() = Some(gate);
            (vision, release)
        }
    }

    #[async_trait]
    impl VisionClient for ScriptedVision {
        async fn analyze(&self, _image: &DynamicImage, _prompt: &str) -> AnalysisResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = self.gate.lock().unwrap().as_ref() {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct Harness {
        controller: AppController<RecordingPresenter>,
        log_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn harness(grabber: Box<dyn ScreenGrabber>, vision: Arc<dyn VisionClient>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("vision.log");
        let capturer = Arc::new(RegionCapturer::new(
            grabber,
            Some(dir.path().join("debug_capture.png")),
        ));
        let controller = AppController::new(
            capturer,
            vision,
            Arc::new(DiagnosticLog::new(log_path.clone())),
            RecordingPresenter::default(),
            ControllerOptions {
                prompt: "test prompt".to_string(),
                settle_delay: Duration::ZERO,
            },
        );
        Harness {
            controller,
            log_path,
            _dir: dir,
        }
    }

    fn pump_until_idle(controller: &mut AppController<RecordingPresenter>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            controller.poll();
            if !controller.is_busy() {
                return;
            }
            assert!(Instant::now() < deadline, "request did not finish in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn drag(from: (i32, i32), to: (i32, i32)) -> SelectionOutcome {
        SelectionOutcome::Selected(SelectionRectangle::from_corners(from, to))
    }

    fn log_lines(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn capture_to_result_end_to_end() {
        let vision = ScriptedVision::new(AnalysisResult::Success("42".into()));
        let mut h = harness(Box::new(BlankGrabber), vision.clone());

        assert_eq!(h.controller.trigger_capture(), TriggerOutcome::Started);
        assert_eq!(h.controller.phase(), SessionPhase::Selecting);
        h.controller.complete_selection(drag((50, 50), (250, 150)), 1.0);
        assert!(h.controller.presenter().busy);
        assert!(matches!(
            h.controller.phase(),
            SessionPhase::Capturing { request_id: 1 }
        ));

        pump_until_idle(&mut h.controller);
        assert_eq!(h.controller.phase(), SessionPhase::Idle);

        let presenter = h.controller.presenter();
        assert_eq!(presenter.captures, vec![(200, 100)]);
        assert_eq!(
            presenter.results,
            vec![AnalysisResult::Success("42".to_string())]
        );
        assert!(presenter.errors.is_empty());
        assert!(!presenter.busy);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);

        let lines = log_lines(&h.log_path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" - SUCCESS - 42"));
    }

    #[test]
    fn second_trigger_is_rejected_while_selecting() {
        let vision = ScriptedVision::new(AnalysisResult::Success("ok".into()));
        let mut h = harness(Box::new(BlankGrabber), vision);

        assert_eq!(h.controller.trigger_capture(), TriggerOutcome::Started);
        assert_eq!(h.controller.trigger_capture(), TriggerOutcome::Rejected);
        assert_eq!(h.controller.presenter().notices, vec![BUSY_NOTICE.to_string()]);
        assert!(h.controller.is_selecting());
    }

    #[test]
    fn only_one_request_is_in_flight() {
        let (vision, release) = ScriptedVision::gated(AnalysisResult::Success("done".into()));
        let mut h = harness(Box::new(BlankGrabber), vision.clone());

        h.controller.trigger_capture();
        h.controller.complete_selection(drag((0, 0), (20, 20)), 1.0);

        for _ in 0..3 {
            assert_eq!(h.controller.trigger_capture(), TriggerOutcome::Rejected);
            // A stray outcome while processing must not start another job.
            h.controller.complete_selection(drag((0, 0), (30, 30)), 1.0);
        }

        release.send(()).unwrap();
        pump_until_idle(&mut h.controller);

        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
        assert_eq!(vision.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.presenter().results.len(), 1);

        // The session is usable again afterwards.
        assert_eq!(h.controller.trigger_capture(), TriggerOutcome::Started);
    }

    #[test]
    fn auth_failure_reaches_presenter_as_failure() {
        let vision = ScriptedVision::new(AnalysisResult::Failure {
            kind: AnalysisErrorKind::Auth,
            message: "HTTP 401: Incorrect API key provided".into(),
        });
        let mut h = harness(Box::new(BlankGrabber), vision);

        h.controller.trigger_capture();
        h.controller.complete_selection(drag((10, 10), (60, 60)), 1.0);
        pump_until_idle(&mut h.controller);

        let results = &h.controller.presenter().results;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].failure_kind(), Some(AnalysisErrorKind::Auth));

        let lines = log_lines(&h.log_path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" - AUTH_ERROR - HTTP 401"));
    }

    #[test]
    fn cancelled_selection_returns_to_idle_without_capturing() {
        let vision = ScriptedVision::new(AnalysisResult::Success("unused".into()));
        let mut h = harness(Box::new(BlankGrabber), vision.clone());

        h.controller.trigger_capture();
        h.controller.complete_selection(SelectionOutcome::Cancelled, 1.0);

        assert!(!h.controller.is_busy());
        assert_eq!(
            h.controller.presenter().notices,
            vec![CANCELLED_NOTICE.to_string()]
        );
        assert!(!h.controller.poll());
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
        assert!(log_lines(&h.log_path).is_empty());
    }

    #[test]
    fn capture_failure_is_shown_and_session_recovers() {
        let vision = ScriptedVision::new(AnalysisResult::Success("unused".into()));
        let mut h = harness(Box::new(FailingGrabber), vision.clone());

        h.controller.trigger_capture();
        h.controller.complete_selection(drag((0, 0), (40, 40)), 1.0);
        pump_until_idle(&mut h.controller);

        let presenter = h.controller.presenter();
        assert_eq!(presenter.errors.len(), 1);
        assert!(presenter.errors[0].contains("no screen"));
        assert!(presenter.results.is_empty());
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
        assert!(log_lines(&h.log_path).is_empty());
        assert!(!h.controller.screen_in_use());

        assert_eq!(h.controller.trigger_capture(), TriggerOutcome::Started);
    }

    #[test]
    fn screen_is_released_only_once_the_capture_is_applied() {
        let (release_grab, gate) = std::sync::mpsc::channel();
        let (vision, release_vision) =
            ScriptedVision::gated(AnalysisResult::Success("ok".into()));
        let grabber = GatedGrabber {
            gate: Mutex::new(gate),
        };
        let mut h = harness(Box::new(grabber), vision);

        assert!(!h.controller.screen_in_use());
        h.controller.trigger_capture();
        assert!(h.controller.screen_in_use());

        h.controller.complete_selection(drag((0, 0), (30, 30)), 1.0);
        thread::sleep(Duration::from_millis(20));
        h.controller.poll();
        assert!(h.controller.screen_in_use());
        assert!(matches!(
            h.controller.phase(),
            SessionPhase::Capturing { .. }
        ));

        release_grab.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.controller.screen_in_use() {
            // Still claimed means the image has not reached the presenter.
            assert!(h.controller.presenter().captures.is_empty());
            assert!(Instant::now() < deadline, "capture did not finish in time");
            thread::sleep(Duration::from_millis(5));
            h.controller.poll();
        }

        assert_eq!(h.controller.presenter().captures, vec![(30, 30)]);
        assert!(matches!(
            h.controller.phase(),
            SessionPhase::Analyzing { request_id: 1 }
        ));
        assert!(h.controller.is_busy());

        release_vision.send(()).unwrap();
        pump_until_idle(&mut h.controller);
        assert!(!h.controller.screen_in_use());
    }

    #[test]
    fn cancelling_releases_the_screen() {
        let vision = ScriptedVision::new(AnalysisResult::Success("unused".into()));
        let mut h = harness(Box::new(BlankGrabber), vision);

        h.controller.trigger_capture();
        h.controller.complete_selection(SelectionOutcome::Cancelled, 1.0);
        assert!(!h.controller.screen_in_use());
    }

    #[test]
    fn waker_fires_for_each_event() {
        let vision = ScriptedVision::new(AnalysisResult::Success("ok".into()));
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        let h = harness(Box::new(BlankGrabber), vision);
        let mut controller = h.controller.with_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        controller.trigger_capture();
        controller.complete_selection(drag((0, 0), (10, 10)), 2.0);
        pump_until_idle(&mut controller);

        assert_eq!(controller.presenter().captures, vec![(20, 20)]);

        // The job wakes the UI right after its final send, which can land
        // just after the poll that consumed it.
        let deadline = Instant::now() + Duration::from_secs(5);
        while wakes.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }
}
