//! Boundary filtering of detector output before it reaches the tracker

use ioutrack::{Detection, FrameGeometry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// COCO class names (80 classes)
const COCO_CLASSES: &[&str] = &[
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Human-readable name of a COCO class id
pub fn class_name(class_id: u32) -> String {
    COCO_CLASSES
        .get(class_id as usize)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class_{}", class_id))
}

/// Why a detection was kept away from the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LowConfidence,
    ExcludedClass,
    MalformedBox,
    OutOfFrame,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LowConfidence => "confidence at or below threshold",
            Self::ExcludedClass => "class not counted",
            Self::MalformedBox => "non-finite or empty box",
            Self::OutOfFrame => "box outside frame",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
    pub detection: Detection,
    pub reason: RejectReason,
}

/// Confidence and class gate applied to every frame of detections
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionFilter {
    /// Detections must score strictly above this
    pub min_confidence: f32,
    /// Counted class ids. Detections without a class id are always accepted.
    pub classes: Vec<u32>,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            // person, car, motorcycle, bus, truck
            classes: vec![0, 2, 3, 5, 7],
        }
    }
}

impl DetectionFilter {
    /// Check a single detection against the frame it was produced for
    pub fn check(&self, frame: FrameGeometry, detection: &Detection) -> Option<RejectReason> {
        let bbox = &detection.bbox;
        if !bbox.is_valid() {
            return Some(RejectReason::MalformedBox);
        }
        if !bbox.within(frame.width as f32, frame.height as f32) {
            return Some(RejectReason::OutOfFrame);
        }
        if detection.confidence.is_nan() || detection.confidence <= self.min_confidence {
            return Some(RejectReason::LowConfidence);
        }
        match detection.class_id {
            Some(class_id) if !self.classes.contains(&class_id) => {
                Some(RejectReason::ExcludedClass)
            }
            _ => None,
        }
    }

    /// Split a frame's detections into those handed to the tracker and those dropped
    pub fn apply(
        &self,
        frame: FrameGeometry,
        detections: &[Detection],
    ) -> (Vec<Detection>, Vec<Rejected>) {
        let mut accepted = Vec::with_capacity(detections.len());
        let mut rejected = Vec::new();

        for detection in detections {
            match self.check(frame, detection) {
                None => accepted.push(detection.clone()),
                Some(reason) => {
                    log::debug!("Dropping detection {}: {}", detection.bbox, reason);
                    rejected.push(Rejected {
                        detection: detection.clone(),
                        reason,
                    });
                }
            }
        }
        (accepted, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ioutrack::Bbox;

    const FRAME: FrameGeometry = FrameGeometry {
        width: 640,
        height: 480,
    };

    fn det(bbox: Bbox, confidence: f32, class_id: u32) -> Detection {
        Detection::new(bbox, confidence).with_class(class_id)
    }

    #[test]
    fn test_class_names() {
        assert_eq!(class_name(2), "car");
        assert_eq!(class_name(7), "truck");
        assert_eq!(class_name(79), "toothbrush");
        assert_eq!(class_name(80), "class_80");
    }

    #[test]
    fn test_accepts_counted_vehicle() {
        let filter = DetectionFilter::default();
        let car = det(Bbox::new(10.0, 10.0, 60.0, 40.0), 0.8, 2);
        assert_eq!(filter.check(FRAME, &car), None);
    }

    #[test]
    fn test_confidence_threshold_is_exclusive() {
        let filter = DetectionFilter::default();
        let bbox = Bbox::new(10.0, 10.0, 60.0, 40.0);
        assert_eq!(
            filter.check(FRAME, &det(bbox, 0.3, 2)),
            Some(RejectReason::LowConfidence)
        );
        assert_eq!(filter.check(FRAME, &det(bbox, 0.31, 2)), None);
    }

    #[test]
    fn test_rejection_reasons() {
        let filter = DetectionFilter::default();
        let good = Bbox::new(10.0, 10.0, 60.0, 40.0);

        assert_eq!(
            filter.check(FRAME, &det(good, 0.9, 15)),
            Some(RejectReason::ExcludedClass)
        );
        assert_eq!(
            filter.check(FRAME, &det(Bbox::new(f32::NAN, 0.0, 5.0, 5.0), 0.9, 2)),
            Some(RejectReason::MalformedBox)
        );
        assert_eq!(
            filter.check(FRAME, &det(Bbox::new(10.0, 10.0, 10.0, 40.0), 0.9, 2)),
            Some(RejectReason::MalformedBox)
        );
        assert_eq!(
            filter.check(FRAME, &det(Bbox::new(600.0, 400.0, 700.0, 470.0), 0.9, 2)),
            Some(RejectReason::OutOfFrame)
        );
    }

    #[test]
    fn test_unclassified_detections_pass_class_gate() {
        let filter = DetectionFilter::default();
        let d = Detection::new(Bbox::new(10.0, 10.0, 60.0, 40.0), 0.9);
        assert_eq!(filter.check(FRAME, &d), None);
    }

    #[test]
    fn test_apply_partitions_in_order() {
        let filter = DetectionFilter::default();
        let dets = vec![
            det(Bbox::new(10.0, 10.0, 60.0, 40.0), 0.9, 2),
            det(Bbox::new(10.0, 10.0, 60.0, 40.0), 0.1, 2),
            det(Bbox::new(100.0, 100.0, 160.0, 140.0), 0.7, 5),
        ];
        let (accepted, rejected) = filter.apply(FRAME, &dets);
        assert_eq!(accepted, vec![dets[0].clone(), dets[2].clone()]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].reason, RejectReason::LowConfidence);
    }
}
