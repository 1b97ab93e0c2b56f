/// Short-range BlazeFace locator using ONNX Runtime via `ort`.
///
/// Supplies the face box the mesh model is cropped to.
use std::path::Path;

use crate::detection::domain::face_locator::{FaceBox, FaceLocator};
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

const NUM_ANCHORS: usize = 896;

const NMS_IOU_THRESH: f32 = 0.3;

pub struct OnnxBlazefaceLocator {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceLocator {
    pub fn new(model_path: &Path, confidence: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        log::info!("Loaded face detector model {}", model_path.display());
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceLocator for OnnxBlazefaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let input = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() < 2 {
            return Err(
                format!("Face detector expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg: Vec<f32> = regressors.iter().copied().collect();
        let logits: Vec<f32> = scores.iter().copied().collect();

        let mut boxes = decode(
            &reg,
            &logits,
            &self.anchors,
            self.confidence,
            frame.width(),
            frame.height(),
        );
        Ok(nms(&mut boxes, NMS_IOU_THRESH))
    }
}

/// Center-sampled resize to `size` x `size`, NCHW, scaled to `[0, 1]`.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let s = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    if src_h == 0 || src_w == 0 {
        return tensor;
    }

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Two feature maps, 16x16 with 2 anchors per cell and 8x8 with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let layers = [(8usize, 2usize), (16, 6)];
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in layers {
        let grid = INPUT_SIZE as usize / stride;
        for y in 0..grid {
            for x in 0..grid {
                let center = [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ];
                anchors.extend(std::iter::repeat(center).take(per_cell));
            }
        }
    }
    anchors
}

/// Anchor-relative regressor output to frame-pixel boxes above `confidence`.
fn decode(
    regressors: &[f32],
    logits: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
    frame_w: u32,
    frame_h: u32,
) -> Vec<FaceBox> {
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let unit = INPUT_SIZE as f32;

    anchors
        .iter()
        .zip(logits)
        .enumerate()
        .filter_map(|(i, (anchor, &logit))| {
            let score = sigmoid(logit);
            let r = regressors.get(i * REGRESSOR_STRIDE..i * REGRESSOR_STRIDE + 4)?;
            if score < confidence {
                return None;
            }
            let cx = anchor[0] + r[0] / unit;
            let cy = anchor[1] + r[1] / unit;
            let (w, h) = (r[2] / unit, r[3] / unit);

            let x1 = ((cx - w / 2.0) * fw).max(0.0);
            let y1 = ((cy - h / 2.0) * fh).max(0.0);
            let x2 = ((cx + w / 2.0) * fw).min(fw);
            let y2 = ((cy + h / 2.0) * fh).min(fh);
            if x2 <= x1 || y2 <= y1 {
                return None;
            }
            Some(FaceBox {
                x: x1 as i32,
                y: y1 as i32,
                width: (x2 - x1).round() as i32,
                height: (y2 - y1).round() as i32,
                score,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression; survivors are sorted by score.
fn nms(boxes: &mut [FaceBox], iou_thresh: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep.iter().all(|k| iou(k, candidate) <= iou_thresh) {
            keep.push(*candidate);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);
    let inter = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f32;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.width * a.height) as f32;
    let area_b = (b.width * b.height) as f32;
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
