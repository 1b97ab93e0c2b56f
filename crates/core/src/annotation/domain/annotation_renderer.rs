use crate::geometry::domain::bounding_rect::BoundingRect;
use crate::shared::constants::{LABEL_BAND_HEIGHT, LABEL_PREFIX};
use crate::shared::frame::Frame;

use super::bitmap_font::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

const BOX_COLOR: [u8; 3] = [0, 0, 0];
const BAND_COLOR: [u8; 3] = [0, 0, 0];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

const TEXT_SCALE: i32 = 2;
const TEXT_INSET_X: i32 = 5;
/// Gap between the text's bottom row and the box's top edge.
const TEXT_BASELINE_GAP: i32 = 4;

/// Draws the face box and emotion label onto a working copy of a frame.
#[derive(Clone, Debug)]
pub struct AnnotationRenderer {
    draw_bounding_box: bool,
}

impl AnnotationRenderer {
    pub fn new(draw_bounding_box: bool) -> Self {
        Self { draw_bounding_box }
    }

    /// Returns an annotated copy; `capture` itself is left untouched.
    pub fn annotate(&self, capture: &Frame, rect: &BoundingRect, label: &str) -> Frame {
        let mut working = capture.clone();
        self.draw_bounding_box(&mut working, rect);
        self.draw_label(&mut working, rect, label);
        working
    }

    /// 1px outline at the rect's corners. No-op when disabled.
    pub fn draw_bounding_box(&self, frame: &mut Frame, rect: &BoundingRect) {
        if !self.draw_bounding_box {
            return;
        }
        for x in rect.min_x..=rect.max_x {
            frame.put_pixel(x, rect.min_y, BOX_COLOR);
            frame.put_pixel(x, rect.max_y, BOX_COLOR);
        }
        for y in rect.min_y..=rect.max_y {
            frame.put_pixel(rect.min_x, y, BOX_COLOR);
            frame.put_pixel(rect.max_x, y, BOX_COLOR);
        }
    }

    /// Filled band directly above the box with the label text on top.
    ///
    /// An empty label draws the band only.
    pub fn draw_label(&self, frame: &mut Frame, rect: &BoundingRect, label: &str) {
        fill_rect(
            frame,
            rect.min_x,
            rect.min_y - LABEL_BAND_HEIGHT,
            rect.max_x,
            rect.min_y,
            BAND_COLOR,
        );

        if label.is_empty() {
            return;
        }
        let text = format!("{LABEL_PREFIX}{label}");
        let top = rect.min_y - TEXT_BASELINE_GAP - GLYPH_HEIGHT * TEXT_SCALE;
        draw_text(frame, rect.min_x + TEXT_INSET_X, top, &text, TEXT_COLOR);
    }
}

fn fill_rect(frame: &mut Frame, left: i32, top: i32, right: i32, bottom: i32, color: [u8; 3]) {
    let max_x = frame.width() as i32 - 1;
    let max_y = frame.height() as i32 - 1;
    let (left, right) = (left.max(0), right.min(max_x));
    let (top, bottom) = (top.max(0), bottom.min(max_y));
    for y in top..=bottom {
        for x in left..=right {
            frame.put_pixel(x, y, color);
        }
    }
}

fn draw_text(frame: &mut Frame, mut x: i32, top: i32, text: &str, color: [u8; 3]) {
    for ch in text.chars() {
        if let Some(rows) = bitmap_font::glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let px = x + col * TEXT_SCALE;
                    let py = top + row as i32 * TEXT_SCALE;
                    for dy in 0..TEXT_SCALE {
                        for dx in 0..TEXT_SCALE {
                            frame.put_pixel(px + dx, py + dy, color);
                        }
                    }
                }
            }
        }
        x += GLYPH_ADVANCE * TEXT_SCALE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAY: u8 = 128;

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![GRAY; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn rect(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> BoundingRect {
        BoundingRect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    fn count_color(frame: &Frame, color: [u8; 3]) -> usize {
        frame
            .data()
            .chunks_exact(3)
            .filter(|px| *px == color)
            .count()
    }

    #[test]
    fn test_box_outline_only() {
        let mut frame = gray_frame(50, 50);
        let r = rect(10, 30, 20, 40);
        AnnotationRenderer::new(true).draw_bounding_box(&mut frame, &r);

        assert_eq!(frame.pixel(10, 30), &BOX_COLOR);
        assert_eq!(frame.pixel(20, 40), &BOX_COLOR);
        assert_eq!(frame.pixel(15, 30), &BOX_COLOR);
        assert_eq!(frame.pixel(10, 35), &BOX_COLOR);
        // interior stays untouched
        assert_eq!(frame.pixel(15, 35), &[GRAY; 3]);
        // perimeter of an 11x11 box
        assert_eq!(count_color(&frame, BOX_COLOR), 40);
    }

    #[test]
    fn test_box_disabled_is_noop() {
        let mut frame = gray_frame(50, 50);
        let before = frame.data().to_vec();
        AnnotationRenderer::new(false).draw_bounding_box(&mut frame, &rect(10, 10, 20, 20));
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn test_label_band_sits_above_box() {
        let mut frame = gray_frame(200, 100);
        let r = rect(20, 50, 150, 90);
        AnnotationRenderer::new(true).draw_label(&mut frame, &r, "");

        // band spans [min_y - 22, min_y]
        assert_eq!(frame.pixel(20, 28), &BAND_COLOR);
        assert_eq!(frame.pixel(150, 50), &BAND_COLOR);
        assert_eq!(frame.pixel(20, 27), &[GRAY; 3]);
        assert_eq!(frame.pixel(151, 40), &[GRAY; 3]);
        assert_eq!(frame.pixel(60, 51), &[GRAY; 3]);
        // empty label: no text drawn
        assert_eq!(count_color(&frame, TEXT_COLOR), 0);
    }

    #[test]
    fn test_label_text_inside_band() {
        let mut frame = gray_frame(400, 100);
        let r = rect(10, 50, 390, 90);
        AnnotationRenderer::new(true).draw_label(&mut frame, &r, "Happy");

        assert!(count_color(&frame, TEXT_COLOR) > 0);
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                if frame.pixel(x, y) == TEXT_COLOR {
                    assert!((28..=50).contains(&(y as i32)), "text pixel at row {y}");
                    assert!(x as i32 >= 10 + TEXT_INSET_X);
                }
            }
        }
    }

    #[test]
    fn test_band_clipped_at_top_edge() {
        let mut frame = gray_frame(60, 60);
        let r = rect(5, 3, 40, 30);
        AnnotationRenderer::new(true).draw_label(&mut frame, &r, "Sad");
        assert_eq!(frame.pixel(5, 0), &BAND_COLOR);
        assert_eq!(frame.pixel(5, 4), &[GRAY; 3]);
    }

    #[test]
    fn test_annotate_leaves_capture_untouched() {
        let capture = gray_frame(100, 100);
        let annotated =
            AnnotationRenderer::new(true).annotate(&capture, &rect(10, 40, 80, 90), "Angry");
        assert!(capture.data().iter().all(|&v| v == GRAY));
        assert_ne!(annotated.data(), capture.data());
        assert_eq!(annotated.width(), capture.width());
    }
}
