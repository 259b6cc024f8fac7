//! Detection filtering.
//!
//! Turns the raw rows of one frame into the detections that may raise an
//! alarm: the class must be in the monitored set and the confidence must be
//! strictly above the threshold. Qualifying detections are converted to
//! pixel-space rectangles, and one of them is picked as the frame's primary
//! detection according to `PrimaryPolicy`.
//!
//! The filter keeps no state between frames.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::detect::RawDetection;
use crate::model::ClassCatalog;

pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MONITORED: [&str; 4] = ["dog", "elephant", "bear", "cow"];

/// Class names eligible for an alarm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitoredSet {
    names: BTreeSet<String>,
}

impl MonitoredSet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(Into::into)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Err(anyhow!("monitored set must name at least one class"));
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for MonitoredSet {
    fn default() -> Self {
        Self {
            names: DEFAULT_MONITORED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// How the primary detection is chosen when several qualify in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum PrimaryPolicy {
    /// The last qualifying detection in model output order.
    #[default]
    LastMatch,
    /// The qualifying detection with the highest confidence; the earliest wins
    /// on ties.
    HighestConfidence,
}

impl FromStr for PrimaryPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "last" | "last-match" => Ok(Self::LastMatch),
            "highest" | "highest-confidence" => Ok(Self::HighestConfidence),
            other => Err(anyhow!(
                "unknown primary policy '{}' (expected 'last' or 'highest')",
                other
            )),
        }
    }
}

impl TryFrom<String> for PrimaryPolicy {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Pixel-space rectangle anchored at its top-left corner.
///
/// `x`/`y` may be negative when a box hangs off the frame edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    /// Convert normalized center/size geometry into a top-left rectangle on a
    /// `frame_w` x `frame_h` frame. Each intermediate value is truncated toward
    /// zero. Out-of-range model output is clamped so the box lies within one
    /// frame length of the frame on every side.
    pub fn from_normalized(det: &RawDetection, frame_w: u32, frame_h: u32) -> Self {
        let (fw, fh) = (frame_w as f32, frame_h as f32);
        let center_x = (det.center_x * fw).trunc();
        let center_y = (det.center_y * fh).trunc();
        let w = (det.width * fw).trunc();
        let h = (det.height * fh).trunc();
        Self {
            x: clamp_axis((center_x - w / 2.0).trunc(), -fw, 2.0 * fw) as i32,
            y: clamp_axis((center_y - h / 2.0).trunc(), -fh, 2.0 * fh) as i32,
            w: clamp_axis(w, 0.0, 3.0 * fw) as u32,
            h: clamp_axis(h, 0.0, 3.0 * fh) as u32,
        }
    }
}

/// NaN maps to zero.
fn clamp_axis(value: f32, min: f32, max: f32) -> f32 {
    const LIMIT: f32 = (i32::MAX / 4) as f32;
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(min.max(-LIMIT), max.min(LIMIT))
}

/// A raw detection that passed class and confidence filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct QualifyingDetection {
    pub animal_name: String,
    pub confidence: f32,
    pub rect: PixelRect,
}

/// Every qualifying detection of a frame plus the chosen primary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOutcome {
    pub qualifying: Vec<QualifyingDetection>,
    pub primary: Option<QualifyingDetection>,
}

pub struct DetectionFilter {
    catalog: Arc<ClassCatalog>,
    monitored: MonitoredSet,
    threshold: f32,
    policy: PrimaryPolicy,
}

impl DetectionFilter {
    pub fn new(
        catalog: Arc<ClassCatalog>,
        monitored: MonitoredSet,
        threshold: f32,
        policy: PrimaryPolicy,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1), got {}",
                threshold
            ));
        }
        for name in monitored.iter() {
            if catalog.position(name).is_none() {
                log::warn!("monitored class '{}' is not in the class catalog", name);
            }
        }
        Ok(Self {
            catalog,
            monitored,
            threshold,
            policy,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Filter one frame's detections.
    pub fn filter(&self, detections: &[RawDetection], frame_w: u32, frame_h: u32) -> FilterOutcome {
        let qualifying: Vec<QualifyingDetection> = detections
            .iter()
            .filter(|det| det.confidence > self.threshold)
            .filter_map(|det| {
                let name = self.catalog.name(det.class_id)?;
                if !self.monitored.contains(name) {
                    return None;
                }
                Some(QualifyingDetection {
                    animal_name: name.to_string(),
                    confidence: det.confidence,
                    rect: PixelRect::from_normalized(det, frame_w, frame_h),
                })
            })
            .collect();

        let primary = match self.policy {
            PrimaryPolicy::LastMatch => qualifying.last().cloned(),
            PrimaryPolicy::HighestConfidence => qualifying
                .iter()
                .fold(None::<&QualifyingDetection>, |best, det| match best {
                    Some(b) if b.confidence >= det.confidence => Some(b),
                    _ => Some(det),
                })
                .cloned(),
        };

        FilterOutcome {
            qualifying,
            primary,
        }
    }

    /// The primary detection of a frame, if any.
    pub fn primary(
        &self,
        detections: &[RawDetection],
        frame_w: u32,
        frame_h: u32,
    ) -> Option<QualifyingDetection> {
        self.filter(detections, frame_w, frame_h).primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: usize = 0;
    const DOG: usize = 1;
    const ELEPHANT: usize = 2;
    const BEAR: usize = 3;

    fn filter_with(policy: PrimaryPolicy) -> DetectionFilter {
        let catalog = Arc::new(ClassCatalog::from_names(["person", "dog", "elephant", "bear"]));
        DetectionFilter::new(catalog, MonitoredSet::default(), DEFAULT_THRESHOLD, policy)
            .expect("filter")
    }

    fn det(class_id: usize, confidence: f32) -> RawDetection {
        RawDetection::new(class_id, confidence, (0.5, 0.5), (0.2, 0.2))
    }

    #[test]
    fn threshold_is_strict() {
        let filter = filter_with(PrimaryPolicy::LastMatch);
        assert!(filter.primary(&[det(DOG, 0.5)], 100, 100).is_none());
        assert!(filter.primary(&[det(DOG, 0.2)], 100, 100).is_none());
        assert!(filter.primary(&[det(DOG, 0.500_001)], 100, 100).is_some());
    }

    #[test]
    fn unmonitored_classes_never_qualify() {
        let filter = filter_with(PrimaryPolicy::LastMatch);
        let outcome = filter.filter(&[det(PERSON, 0.99), det(PERSON, 1.0)], 100, 100);
        assert!(outcome.qualifying.is_empty());
        assert!(outcome.primary.is_none());
    }

    #[test]
    fn unknown_class_ids_are_ignored() {
        let filter = filter_with(PrimaryPolicy::LastMatch);
        assert!(filter.primary(&[det(42, 0.99)], 100, 100).is_none());
    }

    #[test]
    fn converts_center_box_to_top_left_pixels() {
        let filter = filter_with(PrimaryPolicy::LastMatch);
        let primary = filter.primary(&[det(DOG, 0.9)], 100, 100).expect("dog");
        assert_eq!(
            primary.rect,
            PixelRect {
                x: 40,
                y: 40,
                w: 20,
                h: 20
            }
        );
        assert_eq!(primary.animal_name, "dog");
    }

    #[test]
    fn box_conversion_uses_each_frame_axis() {
        let raw = RawDetection::new(DOG, 0.9, (0.25, 0.5), (0.1, 0.5));
        let rect = PixelRect::from_normalized(&raw, 640, 480);
        assert_eq!(rect, PixelRect { x: 128, y: 120, w: 64, h: 240 });
    }

    #[test]
    fn runaway_geometry_is_clamped_near_the_frame() {
        let far = RawDetection::new(DOG, 0.9, (1.0e12, -1.0e12), (0.2, 1.0e12));
        let rect = PixelRect::from_normalized(&far, 100, 100);
        assert_eq!(rect, PixelRect { x: 200, y: -100, w: 20, h: 300 });

        let nan = RawDetection::new(DOG, 0.9, (f32::NAN, 0.5), (f32::NAN, 0.2));
        let rect = PixelRect::from_normalized(&nan, 100, 100);
        assert_eq!((rect.x, rect.w), (0, 0));
    }

    #[test]
    fn last_match_wins_by_default() {
        let filter = filter_with(PrimaryPolicy::LastMatch);
        let outcome = filter.filter(
            &[det(ELEPHANT, 0.95), det(PERSON, 0.9), det(BEAR, 0.6)],
            100,
            100,
        );
        assert_eq!(outcome.qualifying.len(), 2);
        assert_eq!(outcome.primary.expect("primary").animal_name, "bear");
    }

    #[test]
    fn highest_confidence_policy_picks_strongest() {
        let filter = filter_with(PrimaryPolicy::HighestConfidence);
        let outcome = filter.filter(
            &[det(BEAR, 0.7), det(ELEPHANT, 0.95), det(DOG, 0.95)],
            100,
            100,
        );
        assert_eq!(outcome.qualifying.len(), 3);
        assert_eq!(outcome.primary.expect("primary").animal_name, "elephant");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let catalog = Arc::new(ClassCatalog::from_names(["dog"]));
        assert!(DetectionFilter::new(
            catalog.clone(),
            MonitoredSet::default(),
            1.0,
            PrimaryPolicy::LastMatch
        )
        .is_err());
        assert!(DetectionFilter::new(
            catalog,
            MonitoredSet::default(),
            -0.1,
            PrimaryPolicy::LastMatch
        )
        .is_err());
    }

    #[test]
    fn policy_parses_from_config_strings() -> Result<()> {
        assert_eq!("last".parse::<PrimaryPolicy>()?, PrimaryPolicy::LastMatch);
        assert_eq!(
            "Highest".parse::<PrimaryPolicy>()?,
            PrimaryPolicy::HighestConfidence
        );
        assert!("first".parse::<PrimaryPolicy>().is_err());
        Ok(())
    }

    #[test]
    fn monitored_set_rejects_empty() {
        assert!(MonitoredSet::new(Vec::<String>::new()).is_err());
        assert!(MonitoredSet::new([" "]).is_err());
        let set = MonitoredSet::new(["cat ", "dog"]).expect("set");
        assert!(set.contains("cat"));
    }
}
