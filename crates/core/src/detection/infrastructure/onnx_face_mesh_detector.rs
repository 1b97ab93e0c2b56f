/// Face-mesh landmark detector using ONNX Runtime via `ort`.
///
/// Runs a single-face mesh model over a square crop around the strongest
/// located face (or the whole frame when no locator is attached) and
/// converts the landmark tensor back into unit coordinates of the frame.
use std::path::Path;

use crate::detection::domain::face_locator::{FaceBox, FaceLocator};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::geometry::domain::landmark_set::RawLandmark;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 192;

/// Values per landmark in the output tensor (x, y, z).
const LANDMARK_STRIDE: usize = 3;

/// Crop side relative to the located face box's longer side.
const CROP_SCALE: f32 = 1.5;

/// Face-mesh detector backed by an ONNX Runtime session.
///
/// Output 0 carries the landmark triples in input-pixel units; output 1, when
/// present, carries the face presence logit.
pub struct OnnxFaceMeshDetector {
    session: ort::session::Session,
    input_size: u32,
    channels_first: bool,
    presence_threshold: f32,
    locator: Option<Box<dyn FaceLocator>>,
}

impl OnnxFaceMeshDetector {
    /// Load a face-mesh ONNX model.
    ///
    /// The tensor layout (NHWC or NCHW) and input size are read from the
    /// model's first input; NHWC at 192x192 is assumed when unreadable.
    pub fn new(
        model_path: &Path,
        presence_threshold: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let layout = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() != 4 {
                    None
                } else if shape[1] == 3 && shape[2] > 0 {
                    Some((shape[2] as u32, true))
                } else if shape[3] == 3 && shape[1] > 0 {
                    Some((shape[1] as u32, false))
                } else {
                    None
                }
            } else {
                None
            }
        });
        let (input_size, channels_first) = layout.unwrap_or((DEFAULT_INPUT_SIZE, false));
        log::info!(
            "Loaded face mesh model {} ({input_size}x{input_size}, {})",
            model_path.display(),
            if channels_first { "NCHW" } else { "NHWC" }
        );

        Ok(Self {
            session,
            input_size,
            channels_first,
            presence_threshold,
            locator: None,
        })
    }

    /// Crop the mesh input to faces found by `locator`.
    pub fn with_locator(mut self, locator: Box<dyn FaceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }
}

/// Square crop for the mesh model, or `None` when the locator saw no face.
fn crop_for(
    locator: Option<&mut (dyn FaceLocator + 'static)>,
    frame: &Frame,
) -> Result<Option<FaceBox>, Box<dyn std::error::Error>> {
    let Some(locator) = locator else {
        return Ok(Some(whole_frame(frame)));
    };
    let faces = locator.locate(frame)?;
    if faces.len() > 1 {
        log::debug!("{} faces located, cropping to the strongest", faces.len());
    }
    Ok(faces.first().map(|face| face.expanded_square(CROP_SCALE)))
}

fn whole_frame(frame: &Frame) -> FaceBox {
    FaceBox {
        x: 0,
        y: 0,
        width: frame.width() as i32,
        height: frame.height() as i32,
        score: 1.0,
    }
}

impl LandmarkDetector for OnnxFaceMeshDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<Vec<RawLandmark>>, Box<dyn std::error::Error>> {
        let Some(crop) = crop_for(self.locator.as_deref_mut(), frame)? else {
            return Ok(Vec::new());
        };
        let input = preprocess(frame, &crop, self.input_size, self.channels_first);
        let input_size = self.input_size;
        let threshold = self.presence_threshold;

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Face mesh model produced no outputs".into());
        }

        let landmarks = outputs[0].try_extract_array::<f32>()?;
        let coords: Vec<f32> = landmarks.iter().copied().collect();
        let presence_logit = if outputs.len() > 1 {
            let score = outputs[1].try_extract_array::<f32>()?;
            score.iter().next().copied()
        } else {
            None
        };

        parse_mesh(
            &coords,
            presence_logit,
            input_size,
            threshold,
            &crop,
            (frame.width(), frame.height()),
        )
    }
}

/// Nearest-neighbour resize of `crop` to `size` x `size`, scaled to
/// `[0, 1]`. Crop pixels outside the frame stay black.
fn preprocess(
    frame: &Frame,
    crop: &FaceBox,
    size: u32,
    channels_first: bool,
) -> ndarray::Array4<f32> {
    let s = size as usize;
    let mut tensor = if channels_first {
        ndarray::Array4::<f32>::zeros((1, 3, s, s))
    } else {
        ndarray::Array4::<f32>::zeros((1, s, s, 3))
    };

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as i64;
    let src_w = frame.width() as i64;
    if src_h == 0 || src_w == 0 || crop.width <= 0 || crop.height <= 0 {
        return tensor;
    }
    let sx = crop.width as f64 / s as f64;
    let sy = crop.height as f64 / s as f64;

    for y in 0..s {
        let src_y = crop.y as i64 + (y as f64 * sy) as i64;
        if !(0..src_h).contains(&src_y) {
            continue;
        }
        for x in 0..s {
            let src_x = crop.x as i64 + (x as f64 * sx) as i64;
            if !(0..src_w).contains(&src_x) {
                continue;
            }
            for c in 0..3 {
                let v = src[[src_y as usize, src_x as usize, c]] as f32 / 255.0;
                if channels_first {
                    tensor[[0, c, y, x]] = v;
                } else {
                    tensor[[0, y, x, c]] = v;
                }
            }
        }
    }

    tensor
}

/// Converts raw mesh output into at most one unit-coordinate landmark list.
fn parse_mesh(
    coords: &[f32],
    presence_logit: Option<f32>,
    input_size: u32,
    threshold: f32,
    crop: &FaceBox,
    (frame_w, frame_h): (u32, u32),
) -> Result<Vec<Vec<RawLandmark>>, Box<dyn std::error::Error>> {
    if let Some(logit) = presence_logit {
        let presence = sigmoid(logit);
        if presence < threshold {
            log::debug!("Face presence {presence:.2} below threshold {threshold:.2}");
            return Ok(Vec::new());
        }
    }

    if coords.is_empty() || coords.len() % LANDMARK_STRIDE != 0 {
        return Err(format!(
            "Unexpected face mesh output length {} (expected a multiple of {LANDMARK_STRIDE})",
            coords.len()
        )
        .into());
    }

    if frame_w == 0 || frame_h == 0 {
        return Err("Cannot map face mesh onto an empty frame".into());
    }
    let scale = input_size as f32;
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let face = coords
        .chunks_exact(LANDMARK_STRIDE)
        .map(|triple| {
            let x = crop.x as f32 + triple[0] / scale * crop.width as f32;
            let y = crop.y as f32 + triple[1] / scale * crop.height as f32;
            RawLandmark::new(x / fw, y / fh)
        })
        .collect();

    Ok(vec![face])
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    fn square(x: i32, y: i32, side: i32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: side,
            height: side,
            score: 1.0,
        }
    }

    const FULL: (u32, u32) = (192, 192);

    #[test]
    fn test_parse_mesh_scales_to_unit_coordinates() {
        let coords = [96.0, 48.0, 0.3, 192.0, 0.0, -1.0];
        let faces = parse_mesh(&coords, None, 192, 0.5, &square(0, 0, 192), FULL).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].len(), 2);
        assert_relative_eq!(faces[0][0].x, 0.5);
        assert_relative_eq!(faces[0][0].y, 0.25);
        assert_relative_eq!(faces[0][1].x, 1.0);
        assert_relative_eq!(faces[0][1].y, 0.0);
    }

    #[test]
    fn test_parse_mesh_low_presence_returns_no_faces() {
        let coords = [1.0, 2.0, 3.0];
        let faces = parse_mesh(&coords, Some(-4.0), 192, 0.5, &square(0, 0, 192), FULL).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_parse_mesh_high_presence_keeps_face() {
        let coords = [1.0, 2.0, 3.0];
        let faces = parse_mesh(&coords, Some(4.0), 192, 0.5, &square(0, 0, 192), FULL).unwrap();
        assert_eq!(faces.len(), 1);
    }

    #[test]
    fn test_parse_mesh_rejects_ragged_output() {
        let crop = square(0, 0, 192);
        assert!(parse_mesh(&[1.0, 2.0], None, 192, 0.5, &crop, FULL).is_err());
        assert!(parse_mesh(&[], None, 192, 0.5, &crop, FULL).is_err());
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
    }

    #[test]
    fn test_preprocess_nhwc_shape_and_range() {
        let frame = Frame::new(vec![255; 4 * 2 * 3], 4, 2, 3, 0);
        let tensor = preprocess(&frame, &whole_frame(&frame), 8, false);
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_preprocess_nchw_keeps_channels_apart() {
        // 1x1 frame with a distinct value per channel
        let frame = Frame::new(vec![0, 51, 255], 1, 1, 3, 0);
        let tensor = preprocess(&frame, &whole_frame(&frame), 2, true);
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert_relative_eq!(tensor[[0, 0, 1, 1]], 0.0);
        assert_relative_eq!(tensor[[0, 1, 0, 0]], 0.2);
        assert_relative_eq!(tensor[[0, 2, 1, 0]], 1.0);
    }

    #[test]
    fn test_parse_mesh_maps_crop_back_to_frame() {
        // 100 px crop at (200, 50) inside a 400x200 frame, model input 100
        let coords = [0.0, 0.0, 0.0, 50.0, 100.0, 0.0];
        let faces = parse_mesh(&coords, None, 100, 0.5, &square(200, 50, 100), (400, 200)).unwrap();
        assert_relative_eq!(faces[0][0].x, 0.5);
        assert_relative_eq!(faces[0][0].y, 0.25);
        assert_relative_eq!(faces[0][1].x, 0.625);
        assert_relative_eq!(faces[0][1].y, 0.75);
    }

    #[test]
    fn test_preprocess_crop_samples_region_and_pads_outside() {
        // 4x4 frame, red channel = column * 60
        let mut data = Vec::new();
        for _y in 0..4 {
            for x in 0..4u8 {
                data.extend_from_slice(&[x * 60, 0, 0]);
            }
        }
        let frame = Frame::new(data, 4, 4, 3, 0);
        // crop overhangs the right edge by two columns
        let tensor = preprocess(&frame, &square(2, 0, 4), 4, false);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 120.0 / 255.0);
        assert_relative_eq!(tensor[[0, 0, 1, 0]], 180.0 / 255.0);
        assert_relative_eq!(tensor[[0, 0, 2, 0]], 0.0);
        assert_relative_eq!(tensor[[0, 0, 3, 0]], 0.0);
    }

    struct FixedLocator {
        faces: Vec<FaceBox>,
        calls: Arc<Mutex<usize>>,
    }

    impl FaceLocator for FixedLocator {
        fn locate(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.faces.clone())
        }
    }

    #[test]
    fn test_crop_expands_strongest_face() {
        let frame = Frame::new(vec![0; 100 * 100 * 3], 100, 100, 3, 0);
        let calls = Arc::new(Mutex::new(0));
        let mut locator = FixedLocator {
            faces: vec![square(40, 40, 20), square(0, 0, 10)],
            calls: Arc::clone(&calls),
        };

        let crop = crop_for(Some(&mut locator), &frame).unwrap();

        assert_eq!(crop, Some(square(35, 35, 30)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_no_located_face_skips_mesh() {
        let frame = Frame::new(vec![0; 10 * 10 * 3], 10, 10, 3, 0);
        let mut locator = FixedLocator {
            faces: vec![],
            calls: Arc::new(Mutex::new(0)),
        };
        assert_eq!(crop_for(Some(&mut locator), &frame).unwrap(), None);
    }

    #[test]
    fn test_without_locator_crop_is_whole_frame() {
        let frame = Frame::new(vec![0; 6 * 3 * 3], 6, 3, 3, 0);
        let crop = crop_for(None, &frame).unwrap().unwrap();
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (0, 0, 6, 3));
    }
}
