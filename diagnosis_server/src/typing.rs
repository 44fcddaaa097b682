//! Character-by-character typing animation.
//!
use std::time::Duration;

use common::protocol::{Segment, SurfaceMsg};

use crate::surface::Surface;

/// Type `segments` into `surface`, one character per `delay`.
///
/// Each section is wrapped in `SegmentStart`/`SegmentEnd`. Every character is preceded by a
/// suspension point, so other tasks keep running while the text is typed. Returns the number of
/// characters emitted.
pub async fn type_segments(segments: &[Segment], delay: Duration, surface: &dyn Surface) -> usize {
    let mut units = 0;

    for segment in segments {
        surface.emit(SurfaceMsg::SegmentStart(segment.style));
        for c in segment.text.chars() {
            pace(delay).await;
            surface.emit(SurfaceMsg::Char(c));
            units += 1;
        }
        surface.emit(SurfaceMsg::SegmentEnd);
    }

    units
}

async fn pace(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
