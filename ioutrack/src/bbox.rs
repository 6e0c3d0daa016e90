//! Bounding box operations and IoU calculations

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.xmin + self.xmax) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.ymin + self.ymax) / 2.0
    }

    /// Finite coordinates with strictly positive width and height.
    ///
    /// Only boxes passing this check may seed or correct a motion model.
    pub fn is_valid(&self) -> bool {
        self.to_bounds().iter().all(|v| v.is_finite())
            && self.xmax > self.xmin
            && self.ymax > self.ymin
    }

    /// True if every corner lies inside `[0, width] x [0, height]`
    pub fn within(&self, width: f32, height: f32) -> bool {
        self.xmin >= 0.0 && self.ymin >= 0.0 && self.xmax <= width && self.ymax <= height
    }

    /// Convert to bounds array [xmin, ymin, xmax, ymax]
    pub fn to_bounds(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Measurement form [center_x, center_y, area, aspect_ratio] used by the motion model
    pub fn to_z(&self) -> [f32; 4] {
        let w = self.width();
        let h = self.height();
        let aspect_ratio = if h != 0.0 { w / h } else { 1.0 };
        [self.center_x(), self.center_y(), w * h, aspect_ratio]
    }

    /// Inverse of [`Bbox::to_z`]. Non-positive area or aspect ratio yields a
    /// non-finite box, which [`Bbox::is_valid`] rejects.
    pub fn from_z(z: &[f32; 4]) -> Self {
        let [center_x, center_y, area, aspect_ratio] = *z;

        let h = (area / aspect_ratio).sqrt();
        let w = aspect_ratio * h;

        Self {
            xmin: center_x - w / 2.0,
            ymin: center_y - h / 2.0,
            xmax: center_x + w / 2.0,
            ymax: center_y + h / 2.0,
        }
    }
}

impl From<[f32; 4]> for Bbox {
    fn from(b: [f32; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bbox({:.1}, {:.1}, {:.1}, {:.1})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Intersection-over-union of two boxes, in [0, 1].
/// Degenerate or non-finite boxes have zero overlap with everything.
pub fn calculate_iou(a: &Bbox, b: &Bbox) -> f32 {
    if !a.is_valid() || !b.is_valid() {
        return 0.0;
    }

    let x1 = a.xmin.max(b.xmin);
    let y1 = a.ymin.max(b.ymin);
    let x2 = a.xmax.min(b.xmax);
    let y2 = a.ymax.min(b.ymax);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Pairwise IoU matrix with shape (rows.len(), cols.len())
pub fn ious(rows: &[Bbox], cols: &[Bbox]) -> Array2<f32> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| {
        calculate_iou(&rows[i], &cols[j])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bbox_properties() {
        let bbox = Bbox::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.width(), 10.0);
        assert_eq!(bbox.height(), 5.0);
        assert_eq!(bbox.area(), 50.0);
        assert_eq!(bbox.center_x(), 5.0);
        assert_eq!(bbox.center_y(), 2.5);
    }

    #[test]
    fn test_validity() {
        assert!(Bbox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Bbox::new(5.0, 0.0, 5.0, 1.0).is_valid());
        assert!(!Bbox::new(0.0, 3.0, 1.0, 2.0).is_valid());
        assert!(!Bbox::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
        assert!(!Bbox::new(0.0, 0.0, f32::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn test_within_frame() {
        let bbox = Bbox::new(10.0, 10.0, 640.0, 480.0);
        assert!(bbox.within(640.0, 480.0));
        assert!(!bbox.within(639.0, 480.0));
        assert!(!Bbox::new(-1.0, 0.0, 10.0, 10.0).within(640.0, 480.0));
    }

    #[test]
    fn test_iou_calculation() {
        let bbox1 = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let bbox2 = Bbox::new(5.0, 5.0, 15.0, 15.0);
        assert_abs_diff_eq!(calculate_iou(&bbox1, &bbox2), 25.0 / 175.0, epsilon = 0.001);
        assert_abs_diff_eq!(calculate_iou(&bbox1, &bbox1), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_iou_disjoint_and_degenerate() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(calculate_iou(&a, &b), 0.0);

        let nan = Bbox::new(f32::NAN, 0.0, 10.0, 10.0);
        assert_eq!(calculate_iou(&a, &nan), 0.0);
    }

    #[test]
    fn test_iou_matrix_shape() {
        let rows = [Bbox::new(0.0, 0.0, 10.0, 10.0), Bbox::new(20.0, 20.0, 30.0, 30.0)];
        let cols = [Bbox::new(20.0, 20.0, 30.0, 30.0)];
        let m = ious(&rows, &cols);
        assert_eq!(m.dim(), (2, 1));
        assert_eq!(m[[0, 0]], 0.0);
        assert_abs_diff_eq!(m[[1, 0]], 1.0, epsilon = 1e-6);

        assert_eq!(ious(&[], &cols).dim(), (0, 1));
    }

    #[test]
    fn test_bbox_conversion() {
        let bbox = Bbox::new(10.0, 20.0, 30.0, 60.0);
        let bbox2 = Bbox::from_z(&bbox.to_z());

        assert_abs_diff_eq!(bbox.xmin, bbox2.xmin, epsilon = 0.001);
        assert_abs_diff_eq!(bbox.ymin, bbox2.ymin, epsilon = 0.001);
        assert_abs_diff_eq!(bbox.xmax, bbox2.xmax, epsilon = 0.001);
        assert_abs_diff_eq!(bbox.ymax, bbox2.ymax, epsilon = 0.001);
    }

    #[test]
    fn test_from_z_negative_area_is_invalid() {
        assert!(!Bbox::from_z(&[5.0, 5.0, -4.0, 1.0]).is_valid());
    }
}
