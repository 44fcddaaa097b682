//! Presenter configuration.
//!
use std::{ops::RangeInclusive, time::Duration};

use anyhow::{bail, Result};
use clap::ValueEnum;
use rand::Rng;
use serde::Serialize;

/// How diagnosis cycles are started.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One cycle per button press, after a short "thinking" pause.
    #[default]
    Interactive,
    /// Cycles back to back without thinking pause.
    Continuous,
}

#[derive(Clone, Debug)]
pub struct PresenterConfig {
    pub mode: Mode,
    /// Delay between two typed characters.
    pub typing_delay: Duration,
    /// Range of the artificial thinking pause in interactive mode.
    pub thinking: RangeInclusive<Duration>,
    /// How long the alert overlay stays visible.
    pub alert_duration: Duration,
    /// Case-insensitive substrings of labels that raise the alert.
    pub alert_keywords: Vec<String>,
    /// Pause after a finished cycle in continuous mode, so the text can be read.
    pub hold: Duration,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Interactive,
            typing_delay: Duration::from_millis(30),
            thinking: Duration::from_secs(3)..=Duration::from_secs(5),
            alert_duration: Duration::from_secs(5),
            alert_keywords: ["fall", "failure", "faliure"]
                .into_iter()
                .map(String::from)
                .collect(),
            hold: Duration::from_secs(3),
        }
    }
}

impl PresenterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.thinking.start() > self.thinking.end() {
            bail!(
                "thinking pause minimum {:?} exceeds maximum {:?}",
                self.thinking.start(),
                self.thinking.end()
            );
        }

        Ok(())
    }

    /// Pause before classification, random within `thinking` in interactive mode.
    pub fn thinking_delay(&self) -> Duration {
        match self.mode {
            Mode::Continuous => Duration::ZERO,
            Mode::Interactive => {
                let (min, max) = (self.thinking.start(), self.thinking.end());
                if min >= max {
                    return *min;
                }
                let millis = rand::thread_rng()
                    .gen_range(min.as_millis() as u64..=max.as_millis() as u64);
                Duration::from_millis(millis)
            }
        }
    }
}
