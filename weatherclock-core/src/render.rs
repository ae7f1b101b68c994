use crate::model::ForecastWindow;
use crate::retry::RetryInfo;

/// Display surface driven by the event loop.
///
/// All calls happen on the loop task, one at a time.
pub trait Renderer: Send {
    fn render_clock(&mut self, time: &str, date: &str);

    fn render_forecast(&mut self, window: &ForecastWindow);

    /// `retry` is set when a retry timer has been armed for this failure.
    fn render_error(&mut self, message: &str, retry: Option<&RetryInfo>);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render_clock(&mut self, time: &str, date: &str) {
        (**self).render_clock(time, date);
    }

    fn render_forecast(&mut self, window: &ForecastWindow) {
        (**self).render_forecast(window);
    }

    fn render_error(&mut self, message: &str, retry: Option<&RetryInfo>) {
        (**self).render_error(message, retry);
    }
}
