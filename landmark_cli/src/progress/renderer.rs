//! Draws recognition progress with indicatif
//!
//! Stage and attempt updates drive a spinner; batch updates drive a bar.

use super::utils::format_duration;
use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use landmark_core::progress::{ProgressUpdate, Stage};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Render progress updates until the channel closes
pub async fn render_progress(mut rx: mpsc::Receiver<ProgressUpdate>) {
    let mut renderer = ProgressRenderer::new();

    while let Some(update) = rx.recv().await {
        renderer.handle_update(update);
    }

    renderer.finish();
}

pub struct ProgressRenderer {
    spinner: Option<ProgressBar>,
    batch_bar: Option<ProgressBar>,
    last_stage: Option<Stage>,
    attempt: Option<(u32, u32)>,
    hidden: bool,
    start_time: Instant,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self {
            spinner: None,
            batch_bar: None,
            last_stage: None,
            attempt: None,
            hidden: false,
            start_time: Instant::now(),
        }
    }

    /// A renderer that tracks state without drawing
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::new()
        }
    }

    pub fn last_stage(&self) -> Option<Stage> {
        self.last_stage
    }

    /// Current attempt and the maximum, once recognition has started
    pub fn attempt(&self) -> Option<(u32, u32)> {
        self.attempt
    }

    pub fn handle_update(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Stage { stage, message } => {
                self.last_stage = Some(stage);
                if stage == Stage::Done {
                    self.attempt = None;
                    if let Some(spinner) = self.spinner.take() {
                        spinner.finish_and_clear();
                    }
                    return;
                }
                let label = stage.to_string();
                self.spinner()
                    .set_message(format!("{}: {}", label.bold(), message));
            }

            ProgressUpdate::Attempt {
                attempt,
                max_attempts,
            } => {
                self.attempt = Some((attempt, max_attempts));
                if attempt > 1 {
                    self.spinner().set_message(format!(
                        "{}: attempt {attempt}/{max_attempts}",
                        Stage::Recognizing.to_string().bold()
                    ));
                }
            }

            ProgressUpdate::Batch {
                current,
                total,
                current_item,
            } => self.update_batch(current, total, current_item),

            ProgressUpdate::Status { message } => {
                if !self.hidden {
                    eprintln!("{} {}", "→".green(), message);
                }
            }
        }
    }

    fn spinner(&mut self) -> &ProgressBar {
        let hidden = self.hidden;
        self.spinner.get_or_insert_with(|| {
            let spinner = if hidden {
                ProgressBar::hidden()
            } else {
                ProgressBar::new_spinner()
            };
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .template("{spinner:.cyan} {msg}")
            {
                spinner.set_style(style);
            }
            if !hidden {
                spinner.enable_steady_tick(Duration::from_millis(100));
            }
            spinner
        })
    }

    fn update_batch(&mut self, current: usize, total: usize, current_item: Option<String>) {
        let hidden = self.hidden;
        let bar = self.batch_bar.get_or_insert_with(|| {
            let target = if hidden {
                ProgressDrawTarget::hidden()
            } else {
                ProgressDrawTarget::stderr()
            };
            let bar = ProgressBar::with_draw_target(Some(total as u64), target);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{msg}\n[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images")
            {
                bar.set_style(style.progress_chars("##-"));
            }
            bar
        });

        bar.set_length(total as u64);
        bar.set_position(current as u64);
        if let Some(item) = current_item {
            bar.set_message(format!("{}: {}", "Recognizing".bold(), item.cyan()));
        }
    }

    /// Current batch position, if a batch is running
    pub fn batch_position(&self) -> Option<(u64, u64)> {
        self.batch_bar
            .as_ref()
            .map(|bar| (bar.position(), bar.length().unwrap_or(0)))
    }

    pub fn finish(self) {
        if let Some(spinner) = self.spinner {
            spinner.finish_and_clear();
        }
        if let Some(bar) = self.batch_bar {
            bar.finish_with_message(format!(
                "{} in {}",
                "✓ Batch complete".green(),
                format_duration(self.start_time.elapsed())
            ));
        }
    }
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}
