//! PFLD-style 68-point facial landmark extraction.
//!
//! The network takes a square crop centered on a detected face and emits 136 scalars: the `(x,
//! y)` coordinates of 68 landmarks, normalised to the crop. The 68 landmark indices are grouped,
//! in order, into the jaw line (0-16), eyebrows (17-26), nose (27-35), eyes (36-47), and mouth
//! (48-67).

use pivcard_image::{Image, Point2D, Rect};
use pivcard_nn::{Cnn, CnnInputShape, NeuralNetwork};
use pivcard_utils::timer::Timer;

const NUM_LANDMARKS: usize = 68;

const LEFT_EYE: std::ops::RangeInclusive<usize> = 36..=41;
const RIGHT_EYE: std::ops::RangeInclusive<usize> = 42..=47;

/// The 68 facial landmarks produced for one face, in source-image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkResult {
    points: [Point2D; NUM_LANDMARKS],
}

impl LandmarkResult {
    /// Builds a result directly from 68 points, bypassing the network. Used by fixed test
    /// doubles (see `crate::traits::testing`) and integration tests.
    pub fn new(points: [Point2D; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2D; NUM_LANDMARKS] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Point2D {
        self.points[index]
    }

    pub fn jaw(&self) -> &[Point2D] {
        &self.points[0..=16]
    }

    pub fn left_eyebrow(&self) -> &[Point2D] {
        &self.points[17..=21]
    }

    pub fn right_eyebrow(&self) -> &[Point2D] {
        &self.points[22..=26]
    }

    pub fn nose(&self) -> &[Point2D] {
        &self.points[27..=35]
    }

    pub fn left_eye(&self) -> &[Point2D] {
        &self.points[*LEFT_EYE.start()..=*LEFT_EYE.end()]
    }

    pub fn right_eye(&self) -> &[Point2D] {
        &self.points[*RIGHT_EYE.start()..=*RIGHT_EYE.end()]
    }

    pub fn mouth(&self) -> &[Point2D] {
        &self.points[48..=67]
    }

    /// The centroid of the left-eye landmarks, used to derive the alignment rotation angle.
    pub fn left_eye_center(&self) -> Point2D {
        centroid(self.left_eye())
    }

    /// The centroid of the right-eye landmarks, used to derive the alignment rotation angle.
    pub fn right_eye_center(&self) -> Point2D {
        centroid(self.right_eye())
    }
}

fn centroid(points: &[Point2D]) -> Point2D {
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let n = points.len() as f32;
    Point2D::new(sx / n, sy / n)
}

/// Runs the landmark network against a face crop.
pub struct Extractor {
    cnn: Cnn,
    t_crop: Timer,
    t_infer: Timer,
}

impl Extractor {
    pub fn new(nn: NeuralNetwork) -> anyhow::Result<Self> {
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, pivcard_nn::create_linear_color_mapper(0.0..=1.0))?;
        Ok(Self {
            cnn,
            t_crop: Timer::new("crop"),
            t_infer: Timer::new("infer"),
        })
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        [&self.t_crop, &self.t_infer].into_iter()
    }

    /// Extracts 68 landmarks from the face located at `face_rect` within `image`.
    pub fn compute(&mut self, image: &Image, face_rect: Rect) -> anyhow::Result<LandmarkResult> {
        let crop = self.t_crop.time(|| {
            let view = image.view(&face_rect);
            view.aspect_aware_resize(self.cnn.input_resolution())
        });

        let outputs = self.t_infer.time(|| self.cnn.estimate(&crop))?;
        anyhow::ensure!(
            !outputs.is_empty(),
            "landmark network produced no output tensors"
        );
        let raw = outputs[0].as_slice();
        anyhow::ensure!(
            raw.len() == NUM_LANDMARKS * 2,
            "landmark network must emit {} scalars, got {}",
            NUM_LANDMARKS * 2,
            raw.len(),
        );

        let mut points = [Point2D::new(0.0, 0.0); NUM_LANDMARKS];
        for i in 0..NUM_LANDMARKS {
            let x_norm = raw[i * 2];
            let y_norm = raw[i * 2 + 1];
            points[i] = Point2D::new(
                face_rect.x() as f32 + x_norm * face_rect.width() as f32,
                face_rect.y() as f32 + y_norm * face_rect.height() as f32,
            );
        }

        Ok(LandmarkResult { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_single_point_is_itself() {
        let p = Point2D::new(3.0, 4.0);
        assert_eq!(centroid(&[p]), p);
    }

    #[test]
    fn centroid_of_two_points_is_midpoint() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(10.0, 20.0);
        let c = centroid(&[a, b]);
        assert_eq!(c, Point2D::new(5.0, 10.0));
    }
}
