use crate::common::{Config, Result};
use crate::common::config::DetectorConfig;
use crate::core::session::build_session;
use ort::{Environment, Session, Value};
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

const NMS_IOU_THRESHOLD: f32 = 0.45;
const MAX_FACES: usize = 5;
const MIN_BOX_SIDE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// YOLO-style single-class face detector.
pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    config: DetectorConfig,
}

impl FaceDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let (environment, session) = build_session(
            "face_detector",
            &config.models.detector_path,
            config.performance.optimization_level,
        )?;

        Ok(Self {
            session,
            _environment: environment,
            config: config.detector.clone(),
        })
    }

    /// Faces in original image coordinates, most confident first.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let img_array = if image.width() == self.config.input_width
            && image.height() == self.config.input_height {
            self.image_to_array(image)
        } else {
            let resized = image.resize_exact(
                self.config.input_width,
                self.config.input_height,
                FilterType::Triangle,
            );
            self.image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let Some(output) = outputs.first() else {
            tracing::warn!("Detector produced no outputs");
            return Ok(Vec::new());
        };
        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();

        let candidates = decode_predictions(
            &data,
            &shape,
            self.config.input_width as f32,
            self.config.input_height as f32,
        );
        let mut faces = select_faces(candidates, self.config.detection_confidence);

        let scale_x = orig_width / self.config.input_width as f32;
        let scale_y = orig_height / self.config.input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        tracing::debug!("Detected {} face(s)", faces.len());
        Ok(faces)
    }

    fn image_to_array(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let mut array = Array4::<f32>::zeros((1, 3, height, width));

        let norm_factor = 1.0 / 255.0;
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            array[[0, 0, y, x]] = pixel[0] as f32 * norm_factor;
            array[[0, 1, y, x]] = pixel[1] as f32 * norm_factor;
            array[[0, 2, y, x]] = pixel[2] as f32 * norm_factor;
        }

        array
    }
}

/// Turn raw detector output into candidate boxes in input-image pixels.
///
/// Accepts `[1, N, 5+]`, the transposed `[1, 5+, N]`, and `[N, 5+]`, where each
/// prediction is `[x_center, y_center, width, height, confidence, ...]`.
pub(crate) fn decode_predictions(
    data: &[f32],
    shape: &[usize],
    input_width: f32,
    input_height: f32,
) -> Vec<FaceBox> {
    let (num_predictions, prediction_length, is_transposed) = match shape {
        [_, a, b] if (5..=10).contains(a) && b > a => (*b, *a, true),
        [_, a, b] => (*a, *b, false),
        [a, b] => (*a, *b, false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return Vec::new();
        }
    };

    if prediction_length < 5 || data.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too small for shape {:?}", shape);
        return Vec::new();
    }

    let at = |i: usize, field: usize| {
        if is_transposed {
            data[field * num_predictions + i]
        } else {
            data[i * prediction_length + field]
        }
    };

    let mut faces = Vec::new();
    for i in 0..num_predictions {
        let confidence = at(i, 4);
        if confidence <= 0.001 {
            continue;
        }

        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
        // Normalised coordinates are scaled up to pixels, per axis.
        let (sx, sy) = if cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0 {
            (1.0, 1.0)
        } else {
            (input_width, input_height)
        };
        let (cx, cy, w, h) = (cx * sx, cy * sy, w * sx, h * sy);

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        if x2 - x1 > MIN_BOX_SIDE && y2 - y1 > MIN_BOX_SIDE {
            faces.push(FaceBox { x1, y1, x2, y2, confidence });
        }
    }

    faces
}

/// NMS over every candidate, then the confidence cut, most confident first.
pub(crate) fn select_faces(candidates: Vec<FaceBox>, min_confidence: f32) -> Vec<FaceBox> {
    let mut faces = apply_nms(candidates, NMS_IOU_THRESHOLD);
    faces.retain(|face| face.confidence >= min_confidence);
    faces.truncate(MAX_FACES);
    faces
}

fn apply_nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| kept.iou(&candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2, confidence }
    }

    #[test]
    fn decodes_row_major_pixels() {
        // Two predictions of [cx, cy, w, h, conf].
        let data = [100.0, 100.0, 40.0, 60.0, 0.9, 300.0, 300.0, 5.0, 5.0, 0.9];
        let faces = decode_predictions(&data, &[1, 2, 5], 640.0, 640.0);

        // The second box is below the minimum size.
        assert_eq!(faces, vec![face(80.0, 70.0, 120.0, 130.0, 0.9)]);
    }

    #[test]
    fn decodes_transposed_normalised() {
        // Six predictions laid out field-major; only two carry confidence.
        let cx = [0.5, 0.1, 0.2, 0.0, 0.0, 0.0];
        let cy = [0.5, 0.1, 0.2, 0.0, 0.0, 0.0];
        let w = [0.25, 0.1, 0.2, 0.0, 0.0, 0.0];
        let h = [0.25, 0.1, 0.2, 0.0, 0.0, 0.0];
        let conf = [0.8, 0.0, 0.7, 0.0, 0.0, 0.0];
        let data: Vec<f32> = [cx, cy, w, h, conf].concat();

        let faces = decode_predictions(&data, &[1, 5, 6], 100.0, 100.0);

        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0], face(37.5, 37.5, 62.5, 62.5, 0.8));
        assert_eq!(faces[1].confidence, 0.7);
    }

    #[test]
    fn normalised_boxes_scale_each_axis_separately() {
        let data = [0.5, 0.5, 0.5, 0.5, 0.9];
        let faces = decode_predictions(&data, &[1, 1, 5], 200.0, 100.0);

        assert_eq!(faces, vec![face(50.0, 25.0, 150.0, 75.0, 0.9)]);
    }

    #[test]
    fn odd_shapes_yield_nothing() {
        assert!(decode_predictions(&[0.0; 4], &[4], 640.0, 640.0).is_empty());
        assert!(decode_predictions(&[0.0; 8], &[2, 4], 640.0, 640.0).is_empty());
        assert!(decode_predictions(&[0.0; 3], &[1, 1, 5], 640.0, 640.0).is_empty());
    }

    #[test]
    fn nms_keeps_most_confident_of_overlapping_boxes() {
        let faces = select_faces(
            vec![
                face(0.0, 0.0, 100.0, 100.0, 0.6),
                face(5.0, 5.0, 105.0, 105.0, 0.9),
                face(300.0, 300.0, 400.0, 400.0, 0.7),
            ],
            0.5,
        );

        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].confidence, 0.9);
        assert_eq!(faces[1].confidence, 0.7);
    }

    #[test]
    fn confidence_cut_applies_after_nms() {
        let faces = select_faces(
            vec![
                face(0.0, 0.0, 100.0, 100.0, 0.4),
                face(200.0, 200.0, 300.0, 300.0, 0.3),
            ],
            0.5,
        );
        assert!(faces.is_empty());
    }

    #[test]
    fn result_is_capped() {
        let candidates = (0..10)
            .map(|i| {
                let x = i as f32 * 200.0;
                face(x, 0.0, x + 100.0, 100.0, 0.9 - i as f32 * 0.01)
            })
            .collect();
        assert_eq!(select_faces(candidates, 0.5).len(), MAX_FACES);
    }
}
