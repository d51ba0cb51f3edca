//! Terminal rendering of progress events.

use std::io::{self, Write};

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

use codeforge_core::ProgressEvent;

const SPINNER_STYLE: &str = "{spinner:.blue} [{elapsed_precise}] {prefix:.cyan.bold} {wide_msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

static SPINNER_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let style = match ProgressStyle::with_template(SPINNER_STYLE) {
        Ok(style) => style.tick_chars(TICK),
        Err(_) => return None,
    };

    Some(style)
});

/// Prints events either as SSE frames or as human progress.
pub struct EventPrinter {
    sse: bool,
    spinner: Option<ProgressBar>,
}

impl EventPrinter {
    pub fn new(sse: bool) -> Self {
        let spinner = if sse {
            None
        } else {
            let pb = ProgressBar::new_spinner();
            if let Some(style) = SPINNER_TEMPLATE.clone() {
                pb.set_style(style);
            }
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(pb)
        };
        Self { sse, spinner }
    }

    pub fn print(&mut self, event: &ProgressEvent) -> anyhow::Result<()> {
        if self.sse {
            let mut stdout = io::stdout().lock();
            stdout.write_all(event.to_sse_frame()?.as_bytes())?;
            stdout.flush()?;
            return Ok(());
        }

        let Some(pb) = &self.spinner else {
            return Ok(());
        };

        match event {
            ProgressEvent::Progress { length, percentage } => {
                let prefix = match percentage {
                    Some(p) => format!("{} ({}%)", HumanBytes(*length as u64), p),
                    None => HumanBytes(*length as u64).to_string(),
                };
                pb.set_prefix(prefix);
            }
            other => {
                if let Some(line) = describe(other) {
                    if other.is_terminal() {
                        pb.finish_and_clear();
                        eprintln!("{}", line);
                    } else {
                        pb.println(line);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}

/// One-line description of an event, `None` for byte progress.
pub fn describe(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Status { message } => Some(message.clone()),
        ProgressEvent::ArtifactStarted { filename } => Some(format!("  + {}", filename)),
        ProgressEvent::Progress { .. } => None,
        ProgressEvent::ValidationFailed(finding) => Some(format!("Validation failed: {}", finding)),
        ProgressEvent::Completed {
            project_id,
            file_count,
            duration,
        } => Some(format!(
            "Generated {} file{} for project {} in {}",
            file_count,
            if *file_count == 1 { "" } else { "s" },
            project_id,
            duration
        )),
        ProgressEvent::Error { error, category } => Some(format!("Generation failed ({:?}): {}", category, error)),
    }
}
