use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;

use super::InferenceError;

const MASK_ALPHA: f32 = 0.5;
const BOX_THICKNESS: u32 = 2;

// Same hues the Ultralytics plotter cycles through.
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }
        let intersection = (ix2 - ix1) * (iy2 - iy1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 { 0.0 } else { intersection / union }
    }

    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One segmented instance in original image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: usize,
    pub score: f32,
    pub bbox: BoundingBox,
    /// Full-size binary mask (255 = inside), if the model produced one.
    pub mask: Option<GrayImage>,
}

pub fn class_color(class: usize) -> Rgb<u8> {
    Rgb(PALETTE[class % PALETTE.len()])
}

/// Overlays masks and box outlines for every detection onto a copy of `image`.
pub fn annotate(image: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.clone();
    for detection in detections {
        let color = class_color(detection.class);
        if let Some(mask) = &detection.mask {
            blend_mask(&mut canvas, mask, color);
        }
        draw_box(&mut canvas, &detection.bbox, color);
    }
    canvas
}

pub fn save_annotated(image: &RgbImage, path: &Path) -> Result<(), InferenceError> {
    let format = ImageFormat::from_path(path)?;
    image.save_with_format(path, format)?;
    Ok(())
}

fn blend_mask(canvas: &mut RgbImage, mask: &GrayImage, color: Rgb<u8>) {
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 || x >= canvas.width() || y >= canvas.height() {
            continue;
        }
        let pixel = canvas.get_pixel_mut(x, y);
        for c in 0..3 {
            let blended = pixel[c] as f32 * (1.0 - MASK_ALPHA) + color[c] as f32 * MASK_ALPHA;
            pixel[c] = blended.round() as u8;
        }
    }
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let bbox = bbox.clamp(width - 1, height - 1);
    let (x1, y1, x2, y2) = (
        bbox.x1 as u32,
        bbox.y1 as u32,
        bbox.x2 as u32,
        bbox.y2 as u32,
    );
    for t in 0..BOX_THICKNESS {
        for x in x1..=x2 {
            put(canvas, x, y1.saturating_add(t), color);
            put(canvas, x, y2.saturating_sub(t), color);
        }
        for y in y1..=y2 {
            put(canvas, x1.saturating_add(t), y, color);
            put(canvas, x2.saturating_sub(t), y, color);
        }
    }
}

fn put(canvas: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, color);
    }
}
