#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporting handle, does nothing unless enabled
#[derive(Debug, Clone, Default)]
pub(crate) struct Progress {
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl Progress {
    /// A bar sized to `length`, or a byte counter when the length is unknown
    #[cfg(feature = "progress")]
    pub(crate) fn new(enabled: bool, length: Option<u64>) -> Self {
        if !enabled {
            return Self::default();
        }
        let bar = match length {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner().template("{spinner:.green} {bytes} ({bytes_per_sec})"),
                );
                bar
            }
        };
        Self { bar: Some(bar) }
    }

    #[cfg(not(feature = "progress"))]
    pub(crate) fn new(_enabled: bool, _length: Option<u64>) -> Self {
        Self::default()
    }

    pub(crate) fn inc(&self, _n: u64) {
        #[cfg(feature = "progress")]
        if let Some(bar) = &self.bar {
            bar.inc(_n);
        }
    }

    pub(crate) fn finish(&self) {
        #[cfg(feature = "progress")]
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
