//! Decoding of raw YOLOv8-seg outputs.
//!
//! The exported model takes a letterboxed `[1, 3, S, S]` image and returns
//! `[1, 4 + nc + nm, N]` predictions (box centre/size, class scores, mask
//! coefficients per anchor) plus `[1, nm, mh, mw]` mask prototypes.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

use super::annotate::{BoundingBox, Detection};

pub const LETTERBOX_FILL: u8 = 114;

/// Scale and padding that map the original image into the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            size,
            width,
            height,
            scale,
            pad_x: ((size - new_w) / 2) as f32,
            pad_y: ((size - new_h) / 2) as f32,
        }
    }

    pub fn resized_dims(&self) -> (u32, u32) {
        (
            ((self.width as f32 * self.scale).round() as u32).clamp(1, self.size),
            ((self.height as f32 * self.scale).round() as u32).clamp(1, self.size),
        )
    }

    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }

    pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
    }
}

/// Letterboxes `image` and returns it as normalized CHW floats.
pub fn letterbox_tensor(image: &RgbImage, size: u32) -> (Vec<f32>, Letterbox) {
    let letterbox = Letterbox::new(image.width(), image.height(), size);
    let (new_w, new_h) = letterbox.resized_dims();
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    imageops::overlay(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }
    (data, letterbox)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    pub confidence: f32,
    pub iou: f32,
    pub max_detections: usize,
}

/// Borrowed, flattened model outputs.
pub struct RawOutput<'a> {
    pub preds: &'a [f32],
    pub channels: usize,
    pub anchors: usize,
    pub protos: &'a [f32],
    pub mask_dim: usize,
    pub proto_height: usize,
    pub proto_width: usize,
}

impl RawOutput<'_> {
    fn num_classes(&self) -> usize {
        self.channels.saturating_sub(4 + self.mask_dim)
    }

    fn has_masks(&self) -> bool {
        self.mask_dim > 0
            && self.proto_height > 0
            && self.proto_width > 0
            && self.protos.len() >= self.mask_dim * self.proto_height * self.proto_width
    }

    fn pred(&self, channel: usize, anchor: usize) -> f32 {
        self.preds[channel * self.anchors + anchor]
    }

    fn proto(&self, k: usize, y: usize, x: usize) -> f32 {
        self.protos[(k * self.proto_height + y) * self.proto_width + x]
    }
}

struct Candidate {
    class: usize,
    score: f32,
    bbox: BoundingBox,
    coeffs: Vec<f32>,
}

pub fn decode(raw: &RawOutput, letterbox: &Letterbox, params: &DecodeParams) -> Vec<Detection> {
    let num_classes = raw.num_classes();
    if num_classes == 0 || raw.preds.len() < raw.channels * raw.anchors {
        log::warn!(
            "Unexpected prediction layout: {} channels, {} anchors, {} values",
            raw.channels,
            raw.anchors,
            raw.preds.len()
        );
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for anchor in 0..raw.anchors {
        let (class, score) = (0..num_classes)
            .map(|c| (c, raw.pred(4 + c, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < params.confidence {
            continue;
        }
        let bbox = BoundingBox::from_center(
            raw.pred(0, anchor),
            raw.pred(1, anchor),
            raw.pred(2, anchor),
            raw.pred(3, anchor),
        );
        let coeffs = (0..raw.mask_dim)
            .map(|k| raw.pred(4 + num_classes + k, anchor))
            .collect();
        candidates.push(Candidate {
            class,
            score,
            bbox,
            coeffs,
        });
    }

    non_max_suppression(candidates, params.iou, params.max_detections)
        .into_iter()
        .map(|candidate| {
            let (x1, y1) = letterbox.to_original(candidate.bbox.x1, candidate.bbox.y1);
            let (x2, y2) = letterbox.to_original(candidate.bbox.x2, candidate.bbox.y2);
            let bbox = BoundingBox { x1, y1, x2, y2 }.clamp(letterbox.width, letterbox.height);
            let mask = raw
                .has_masks()
                .then(|| build_mask(raw, &candidate.coeffs, &bbox, letterbox));
            Detection {
                class: candidate.class,
                score: candidate.score,
                bbox,
                mask,
            }
        })
        .collect()
}

// Class-aware: boxes of different classes never suppress each other.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou: f32, max_detections: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class == candidate.class && k.bbox.iou(&candidate.bbox) > iou);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn build_mask(raw: &RawOutput, coeffs: &[f32], bbox: &BoundingBox, letterbox: &Letterbox) -> GrayImage {
    let mut mask = GrayImage::new(letterbox.width, letterbox.height);
    let proto_scale_x = raw.proto_width as f32 / letterbox.size as f32;
    let proto_scale_y = raw.proto_height as f32 / letterbox.size as f32;

    let (x_start, x_end) = (bbox.x1.floor() as u32, (bbox.x2.ceil() as u32).min(letterbox.width));
    let (y_start, y_end) = (bbox.y1.floor() as u32, (bbox.y2.ceil() as u32).min(letterbox.height));

    for y in y_start..y_end {
        for x in x_start..x_end {
            let (lx, ly) = letterbox.to_input(x as f32 + 0.5, y as f32 + 0.5);
            let px = ((lx * proto_scale_x) as usize).min(raw.proto_width - 1);
            let py = ((ly * proto_scale_y) as usize).min(raw.proto_height - 1);
            let logit: f32 = coeffs
                .iter()
                .enumerate()
                .map(|(k, c)| c * raw.proto(k, py, px))
                .sum();
            // sigmoid(logit) > 0.5
            if logit > 0.0 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}
