use indicatif::{MultiProgress, ProgressBar, ProgressState, ProgressStyle};

use crate::shared_types::ByteCount;
use crate::splitter::PartFile;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta}) ({msg})";

/// Tracks how many bytes of the source have been moved into part files.
pub(crate) struct ProgressReporter {
    pb: ProgressBar,
}

impl ProgressReporter {
    pub(crate) fn new(total_size: ByteCount, multi: &MultiProgress) -> Self {
        let pb = multi.add(ProgressBar::new(total_size));
        pb.set_style(bar_style());
        Self { pb }
    }

    #[cfg(test)]
    pub(crate) fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub(crate) fn set_total(&self, total_size: ByteCount) {
        self.pb.set_length(total_size);
    }

    pub(crate) fn part_written(&self, part: &PartFile) {
        self.pb.inc(part.len);
        self.pb.set_message(part.path.display().to_string());
    }

    pub(crate) fn finish(&self, parts_written: usize) {
        let elapsed = self.pb.elapsed().as_secs_f64();
        let message = if elapsed > 0.0 {
            let (speed, unit) = format_speed(self.pb.position() as f64 / elapsed);
            format!("{parts_written} parts, {speed:.1} {unit}")
        } else {
            format!("{parts_written} parts")
        };
        self.pb.finish_with_message(message);
    }

    /// Drops the bar from the terminal, used when the split fails.
    pub(crate) fn clear(&self) {
        self.pb.finish_and_clear();
    }

    pub(crate) fn position(&self) -> ByteCount {
        self.pb.position()
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                write!(w, "{:.1}s", state.eta().as_secs_f64()).ok();
            },
        )
        .progress_chars("#>-")
}

fn format_speed(bytes_per_sec: f64) -> (f64, &'static str) {
    if bytes_per_sec > 1024.0 * 1024.0 {
        (bytes_per_sec / (1024.0 * 1024.0), "MB/s")
    } else {
        (bytes_per_sec / 1024.0, "kB/s")
    }
}
