//! Diagnosis texts for the classes the model knows about.
//!
use std::collections::HashMap;

use common::protocol::{Segment, SegmentStyle};
use lazy_static::lazy_static;

/// Marks the start of the treatment section in a diagnosis text.
pub const TREATMENT_DELIMITER: &str = "Treatment:";

/// Text shown for a resolved label.
///
/// `text` holds the analysis followed by [`TREATMENT_DELIMITER`] and the treatment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosisEntry {
    pub headline: &'static str,
    pub text: &'static str,
}

impl DiagnosisEntry {
    pub fn analysis(&self) -> &'static str {
        split_treatment(self.text).0
    }

    pub fn treatment(&self) -> Option<&'static str> {
        split_treatment(self.text).1
    }

    /// Styled sections in display order. Empty sections are left out.
    pub fn segments(&self) -> Vec<Segment> {
        let (analysis, treatment) = split_treatment(self.text);

        [
            (SegmentStyle::Headline, self.headline.trim()),
            (SegmentStyle::Analysis, analysis),
            (SegmentStyle::Treatment, treatment.unwrap_or_default()),
        ]
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .map(|(style, text)| Segment::new(style, text))
        .collect()
    }
}

/// Split a diagnosis text at the first treatment delimiter.
///
/// Everything before the delimiter is the analysis, everything after it the treatment. The
/// delimiter itself belongs to neither part.
pub fn split_treatment(text: &str) -> (&str, Option<&str>) {
    match text.split_once(TREATMENT_DELIMITER) {
        Some((analysis, treatment)) => (analysis.trim(), Some(treatment.trim())),
        None => (text.trim(), None),
    }
}

/// Look up the diagnosis for a label, falling back to [`DEFAULT_ENTRY`] for unknown labels.
pub fn lookup(label: &str) -> &'static DiagnosisEntry {
    DIAGNOSES.get(label).unwrap_or(&DEFAULT_ENTRY)
}

pub static DEFAULT_ENTRY: DiagnosisEntry = DiagnosisEntry {
    headline: "Analyzing...",
    text: "No known condition matches this image. \
           Treatment: Improve the lighting or move closer to the camera and try again.",
};

lazy_static! {
    // Keys are the class names of the exported model, typos included.
    static ref DIAGNOSES: HashMap<&'static str, DiagnosisEntry> = HashMap::from([
        (
            "Falling accident",
            DiagnosisEntry {
                headline: "Detected: Falling accident.",
                text: "Posture and motion suggest a sudden fall. Impact injuries such as \
                       sprains, fractures or a head injury are possible. \
                       Treatment: Do not move the person if they report neck or back pain. \
                       Call emergency services and keep them still and warm until help arrives.",
            },
        ),
        (
            "Eye punch",
            DiagnosisEntry {
                headline: "Detected: Eye trauma.",
                text: "Swelling and bruising around the eye socket are consistent with blunt \
                       trauma. Watch for blurred vision or blood in the white of the eye. \
                       Treatment: Apply a cold compress for 15 minutes every hour without \
                       pressing on the eye. Seek urgent care if vision changes.",
            },
        ),
        (
            "Healty face",
            DiagnosisEntry {
                headline: "No injuries detected.",
                text: "Skin tone and facial symmetry look normal, with no visible swelling \
                       or redness. \
                       Treatment: No treatment needed. Stay hydrated and get enough sleep.",
            },
        ),
        (
            "Dermatitis",
            DiagnosisEntry {
                headline: "Possible dermatitis detected.",
                text: "Red, dry or flaking patches suggest inflamed skin, often triggered by \
                       irritants or allergens. \
                       Treatment: Wash with a mild fragrance-free cleanser, apply an emollient \
                       twice a day and avoid the suspected trigger. See a dermatologist if the \
                       rash spreads.",
            },
        ),
        (
            "Liver faliure",
            DiagnosisEntry {
                headline: "Signs associated with liver issues detected.",
                text: "Yellowing of the skin or eyes can indicate impaired liver function. \
                       Treatment: Seek medical evaluation promptly, blood tests are needed to \
                       confirm. Avoid alcohol and unprescribed medication in the meantime.",
            },
        ),
    ]);
}
