//! Terminal spinner for conversion stages

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sketch2story::convert::{ConversionProgress, ConversionStage};

#[derive(Clone)]
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgress for Spinner {
    fn stage(&self, stage: ConversionStage) {
        let msg = match stage {
            ConversionStage::Rewriting => "Rewriting prompt against the sketch...".to_string(),
            ConversionStage::Generating => "Generating image...".to_string(),
            ConversionStage::Polling {
                attempt,
                max_attempts,
            } => format!("Waiting for image ({attempt}/{max_attempts})"),
        };
        self.bar.set_message(msg);
    }
}
