//! The narrow interface the controller uses to show things to the user.

use crate::vision::AnalysisResult;
use image::DynamicImage;

/// Receives the captured image, the analysis outcome and status messages.
///
/// Only ever called from the UI thread.
pub trait ResultPresenter {
    /// A new capture succeeded; clears any previous result.
    fn show_capture(&mut self, image: &DynamicImage);

    fn show_result(&mut self, result: &AnalysisResult);

    /// A failure that happened before a request existed (e.g. capture).
    fn show_error(&mut self, message: &str);

    /// Informational status, such as a rejected trigger or a cancelled
    /// selection.
    fn show_notice(&mut self, message: &str);

    fn set_busy(&mut self, busy: bool);
}
