//! Overlay drawing. Purely cosmetic: nothing here feeds back into the state.

pub mod glyphs;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

use crate::classifier::FrameState;
use crate::pipeline::Detection;

/// Gap between a lamp's rim and its label (pixels).
const LABEL_GAP: i32 = 10;
/// Banner inset from the top-right corner, and its padding around the text.
const BANNER_MARGIN: i32 = 20;
const BANNER_PADDING: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotateOptions {
    pub outline_thickness: u32,
    pub label_scale: u32,
    /// Draw the frame state in the top-right corner.
    pub show_state: bool,
    pub state_scale: u32,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            outline_thickness: 3,
            label_scale: 2,
            show_state: true,
            state_scale: 3,
        }
    }
}

/// Draw accepted regions (and optionally the state banner) on a copy of
/// `frame`. A detection with no lit lamp returns an identical copy.
pub fn annotate_frame(frame: &RgbImage, detection: &Detection, options: &AnnotateOptions) -> RgbImage {
    let _span = tracing::debug_span!("annotate").entered();

    let mut canvas = frame.clone();
    for verdict in &detection.verdicts {
        let Some(color) = verdict.dominant_color else {
            continue;
        };
        let region = verdict.region;
        let tint = color.tint();
        draw_ring(&mut canvas, region.center(), region.radius, options.outline_thickness, tint);

        let label = color.label();
        let (_, th) = glyphs::text_size(label, options.label_scale);
        let r = region.radius as i32;
        let mut ty = region.y - r - LABEL_GAP - th as i32;
        if ty < 0 {
            ty = region.y + r + LABEL_GAP;
        }
        glyphs::draw_text_mut(&mut canvas, label, region.x - r, ty, options.label_scale, tint);
    }

    if options.show_state && detection.state != FrameState::None {
        draw_state_banner(&mut canvas, detection.state, options.state_scale);
    }
    canvas
}

/// Circle outline `thickness` pixels wide, centred on `radius`.
fn draw_ring(canvas: &mut RgbImage, center: (i32, i32), radius: u32, thickness: u32, color: Rgb<u8>) {
    let thickness = thickness.max(1) as i32;
    let inner = radius as i32 - (thickness - 1) / 2;
    for r in inner..inner + thickness {
        if r >= 0 {
            draw_hollow_circle_mut(canvas, center, r, color);
        }
    }
}

fn draw_state_banner(canvas: &mut RgbImage, state: FrameState, scale: u32) {
    let text = state.as_str();
    let (tw, th) = glyphs::text_size(text, scale);
    let tx = canvas.width() as i32 - tw as i32 - BANNER_MARGIN;
    let ty = BANNER_MARGIN;
    let box_w = tw + 2 * BANNER_PADDING as u32;
    let box_h = th + 2 * BANNER_PADDING as u32;
    draw_filled_rect_mut(
        canvas,
        Rect::at(tx - BANNER_PADDING, ty - BANNER_PADDING).of_size(box_w, box_h),
        Rgb([0, 0, 0]),
    );
    glyphs::draw_text_mut(canvas, text, tx, ty, scale, Rgb([255, 255, 255]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ColorScores, LampColor, RegionVerdict};
    use crate::locator::CandidateRegion;

    fn detection(verdicts: Vec<RegionVerdict>) -> Detection {
        Detection::from_verdicts(verdicts)
    }

    fn lit(region: CandidateRegion, color: Option<LampColor>) -> RegionVerdict {
        RegionVerdict {
            region,
            dominant_color: color,
            confidence: if color.is_some() { 0.9 } else { 0.0 },
            scores: ColorScores::default(),
            disk_pixels: 1,
        }
    }

    #[test]
    fn nothing_lit_draws_nothing() {
        let frame = RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]));
        let unlit = detection(vec![lit(CandidateRegion::new(30, 20, 8), None)]);
        assert_eq!(annotate_frame(&frame, &unlit, &AnnotateOptions::default()), frame);
        assert_eq!(annotate_frame(&frame, &detection(vec![]), &AnnotateOptions::default()), frame);
    }

    #[test]
    fn outline_uses_lamp_tint_and_input_is_untouched() {
        let frame = RgbImage::from_pixel(120, 120, Rgb([0, 0, 0]));
        let det = detection(vec![lit(CandidateRegion::new(60, 70, 20), Some(LampColor::Green))]);
        let options = AnnotateOptions {
            show_state: false,
            ..AnnotateOptions::default()
        };
        let out = annotate_frame(&frame, &det, &options);
        assert_eq!(*out.get_pixel(80, 70), Rgb([0, 255, 0]));
        assert_eq!(*out.get_pixel(60, 70), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(80, 70), Rgb([0, 0, 0]));
    }

    #[test]
    fn banner_sits_in_top_right_corner() {
        let frame = RgbImage::from_pixel(200, 100, Rgb([90, 90, 90]));
        let det = detection(vec![lit(CandidateRegion::new(40, 60, 10), Some(LampColor::Red))]);
        let out = annotate_frame(&frame, &det, &AnnotateOptions::default());
        // Banner padding is black, just inside the box's top-right corner.
        assert_eq!(*out.get_pixel(200 - BANNER_MARGIN as u32 + 5, 12), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(5, 5), Rgb([90, 90, 90]));
    }
}
