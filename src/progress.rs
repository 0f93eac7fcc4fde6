//! Progress bar rendering for a single fetch.

use drivefetch_core::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};

/// Percentage bar fed by the fetch progress callback.
///
/// Hidden when disabled, so callers can report unconditionally.
pub(crate) struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub(crate) fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub(crate) fn report(&self, event: &ProgressEvent) {
        if self.bar.message().is_empty() {
            self.bar.set_message(event.display_name.clone());
        }
        self.bar.set_position(u64::from(event.percent.min(100)));
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}
