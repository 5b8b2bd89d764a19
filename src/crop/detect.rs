use image::RgbaImage;

// Empirically tuned density thresholds. Kept as named constants so they
// can be retuned without touching the detection logic.

/// A channel at or above this value counts as white.
const WHITE_CHANNEL_MIN: u8 = 245;
/// Rows with at least this non-white fraction carry content.
const INK_ROW_MIN: f32 = 0.012;
/// Rows with at most this non-white fraction count as blank.
const WHITE_ROW_MAX: f32 = 0.004;
/// Blank rows needed below the header before the gap qualifies.
const HEADER_GAP_ROWS: u32 = 18;
/// The top scan never descends past this fraction of the image.
const TOP_SCAN_FRAC: f32 = 0.6;
/// A detected top beyond this fraction is discarded as implausible.
const TOP_SAFETY_FRAC: f32 = 0.55;
/// Fixed top offset used when gap detection fails.
const TOP_FALLBACK_PX: u32 = 140;
/// Ink fraction that identifies a horizontal separator rule.
const RULE_INK_MIN: f32 = 0.35;
/// Ink fraction that keeps absorbing rows of a multi-pixel rule.
const RULE_EXTEND_MIN: f32 = 0.22;
/// Gap kept above a footer rule found via the footer-likely hint.
const RULE_MARGIN_HINTED: u32 = 10;
/// Gap kept above a rule found only because the crop overran.
const RULE_MARGIN_UNHINTED: u32 = 6;
/// The footer rule search never rises above top + this offset.
const FOOTER_FLOOR_OFFSET: u32 = 220;
/// Nor above this fraction of the image.
const FOOTER_FLOOR_FRAC: f32 = 0.58;
/// A bottom beyond this fraction likely ran into the footer.
const BOTTOM_OVERRUN_FRAC: f32 = 0.88;
/// Subtracted from the anchor-derived target height.
const BOTTOM_TARGET_MARGIN: u32 = 15;
/// Smallest bottom a target height may produce.
const BOTTOM_TARGET_MIN: u32 = 120;
/// Margin added beyond the rightmost content pixel.
const RIGHT_MARGIN_PX: u32 = 14;
/// Minimum viable crop width and height.
pub const MIN_CROP_PX: u32 = 200;

/// Pixel offsets into a bitmap: rows `top..bottom`, columns `left..right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl CropBounds {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Locates the diagram region of a rendered page by row/column ink
/// density: the top bound sits below the header/logo gap, the bottom at
/// the anchor-derived target height (corrected past a footer rule when one
/// is found), the right bound just past the rightmost content column.
pub fn detect_bounds(
    image: &RgbaImage,
    target_height: Option<u32>,
    footer_likely: bool,
    fallback_height: u32,
) -> CropBounds {
    let (width, height) = image.dimensions();
    let fractions = row_ink_fractions(image);

    let top = detect_top(&fractions, height).min(height.saturating_sub(MIN_CROP_PX));

    let mut bottom = match target_height {
        Some(target) => target
            .saturating_sub(BOTTOM_TARGET_MARGIN)
            .clamp(BOTTOM_TARGET_MIN.min(height), height),
        None => fallback_height.min(height),
    };
    bottom = bottom.max(top + MIN_CROP_PX).min(height);

    let rule_margin = if footer_likely {
        Some(RULE_MARGIN_HINTED)
    } else if bottom as f32 > height as f32 * BOTTOM_OVERRUN_FRAC {
        Some(RULE_MARGIN_UNHINTED)
    } else {
        None
    };
    if let Some(margin) = rule_margin {
        if let Some(rule) = find_footer_rule(&fractions, top, bottom, height) {
            bottom = rule
                .saturating_sub(margin)
                .max(top + MIN_CROP_PX)
                .min(height);
        }
    }

    let right = detect_right(image, top, bottom)
        .clamp(MIN_CROP_PX.min(width), width);

    CropBounds {
        top,
        bottom,
        left: 0,
        right,
    }
}

fn is_white_pixel(pixel: &image::Rgba<u8>) -> bool {
    let [r, g, b, a] = pixel.0;
    a == 0 || (r >= WHITE_CHANNEL_MIN && g >= WHITE_CHANNEL_MIN && b >= WHITE_CHANNEL_MIN)
}

fn row_ink_fractions(image: &RgbaImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let mut fractions = Vec::with_capacity(height as usize);
    for y in 0..height {
        let mut ink = 0u32;
        for x in 0..width {
            if !is_white_pixel(image.get_pixel(x, y)) {
                ink += 1;
            }
        }
        fractions.push(ink as f32 / width.max(1) as f32);
    }
    fractions
}

/// Scans down for the first run of blank rows after the header ink. The
/// crop top lands at the start of that run, just below the header.
fn detect_top(fractions: &[f32], height: u32) -> u32 {
    let scan_end = ((height as f32 * TOP_SCAN_FRAC) as u32).min(height);
    let safety = (height as f32 * TOP_SAFETY_FRAC) as u32;
    let fallback = TOP_FALLBACK_PX.min(height.saturating_sub(1));

    let mut seen_ink = false;
    let mut white_run = 0u32;
    for y in 0..scan_end {
        let fraction = fractions[y as usize];
        if fraction >= INK_ROW_MIN {
            seen_ink = true;
        }
        if !seen_ink {
            continue;
        }
        if fraction <= WHITE_ROW_MAX {
            white_run += 1;
            if white_run >= HEADER_GAP_ROWS {
                let top = y + 1 - HEADER_GAP_ROWS;
                if top > safety {
                    return fallback;
                }
                return top;
            }
        } else {
            white_run = 0;
        }
    }
    fallback
}

/// Searches upward from the bottom bound for a horizontal separator rule,
/// absorbing the full thickness of multi-pixel rules. Returns the rule's
/// topmost row.
fn find_footer_rule(fractions: &[f32], top: u32, bottom: u32, height: u32) -> Option<u32> {
    let floor = ((height as f32 * FOOTER_FLOOR_FRAC) as u32).max(top + FOOTER_FLOOR_OFFSET);
    let start = bottom.min(height);
    if start <= floor {
        return None;
    }
    for y in (floor..start).rev() {
        if fractions[y as usize] >= RULE_INK_MIN {
            let mut rule = y;
            while rule > 0 && fractions[rule as usize - 1] >= RULE_EXTEND_MIN {
                rule -= 1;
            }
            return Some(rule);
        }
    }
    None
}

/// Rightmost non-white pixel across the cropped rows, plus a margin.
fn detect_right(image: &RgbaImage, top: u32, bottom: u32) -> u32 {
    let (width, height) = image.dimensions();
    let mut rightmost: Option<u32> = None;
    for y in top..bottom.min(height) {
        for x in (0..width).rev() {
            if rightmost.is_some_and(|value| x <= value) {
                break;
            }
            if !is_white_pixel(image.get_pixel(x, y)) {
                rightmost = Some(x);
                break;
            }
        }
    }
    match rightmost {
        Some(x) => (x + RIGHT_MARGIN_PX).min(width.saturating_sub(1)),
        None => width.saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, WHITE)
    }

    fn fill_rows(image: &mut RgbaImage, rows: std::ops::Range<u32>, pixel: Rgba<u8>) {
        for y in rows {
            for x in 0..image.width() {
                image.put_pixel(x, y, pixel);
            }
        }
    }

    fn assert_invariants(bounds: &CropBounds, width: u32, height: u32) {
        assert!(bounds.top < bounds.bottom);
        assert!(bounds.bottom <= height);
        assert!(bounds.left < bounds.right);
        assert!(bounds.right <= width);
        assert!(bounds.height() >= MIN_CROP_PX);
        assert!(bounds.width() >= MIN_CROP_PX);
    }

    #[test]
    fn top_lands_just_below_header_band() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 50..60, BLACK);
        let bounds = detect_bounds(&image, Some(800), false, 900);
        assert_eq!(bounds.top, 60);
        assert_invariants(&bounds, 400, 1000);
    }

    #[test]
    fn blank_page_falls_back_to_fixed_top() {
        let image = blank(400, 1000);
        let bounds = detect_bounds(&image, None, false, 900);
        assert_eq!(bounds.top, 140);
        assert_eq!(bounds.bottom, 900);
    }

    #[test]
    fn late_gap_triggers_safety_fallback() {
        let mut image = blank(400, 1000);
        // Ink almost everywhere; the only gap opens past 55% of the image.
        fill_rows(&mut image, 0..570, BLACK);
        let bounds = detect_bounds(&image, None, false, 900);
        assert_eq!(bounds.top, 140);
    }

    #[test]
    fn target_height_sets_bottom_with_margin() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 10..30, BLACK);
        let bounds = detect_bounds(&image, Some(700), false, 900);
        assert_eq!(bounds.bottom, 685);
    }

    #[test]
    fn footer_rule_pulls_bottom_up() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 10..30, BLACK);
        // Three-pixel separator rule at the footer boundary.
        fill_rows(&mut image, 800..803, BLACK);
        let bounds = detect_bounds(&image, Some(900), true, 900);
        assert_eq!(bounds.bottom, 790);
    }

    #[test]
    fn overrun_bottom_applies_smaller_rule_margin() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 10..30, BLACK);
        fill_rows(&mut image, 850..852, BLACK);
        let bounds = detect_bounds(&image, Some(950), false, 900);
        assert_eq!(bounds.bottom, 844);
    }

    #[test]
    fn missing_rule_keeps_bottom() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 10..30, BLACK);
        let bounds = detect_bounds(&image, Some(700), true, 900);
        assert_eq!(bounds.bottom, 685);
    }

    #[test]
    fn right_bound_hugs_content_with_margin() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 10..30, BLACK);
        for y in 200..400 {
            image.put_pixel(300, y, BLACK);
        }
        let bounds = detect_bounds(&image, Some(700), false, 900);
        assert_eq!(bounds.right, 314);
    }

    #[test]
    fn bottom_is_monotone_in_target_height() {
        let mut image = blank(400, 1000);
        fill_rows(&mut image, 10..30, BLACK);
        let mut previous = 0u32;
        for target in [100, 300, 500, 700, 900, 1100] {
            let bounds = detect_bounds(&image, Some(target), true, 900);
            assert!(bounds.bottom >= bounds.top + MIN_CROP_PX);
            assert!(bounds.bottom >= previous);
            previous = bounds.bottom;
        }
    }

    #[test]
    fn bounds_hold_for_minimal_bitmap() {
        let image = blank(200, 200);
        let bounds = detect_bounds(&image, Some(10), true, 900);
        assert_invariants(&bounds, 200, 200);
    }

    #[test]
    fn bounds_hold_for_noisy_bitmap() {
        let mut image = blank(640, 480);
        fill_rows(&mut image, 0..40, BLACK);
        fill_rows(&mut image, 100..110, BLACK);
        fill_rows(&mut image, 460..464, BLACK);
        for target in [None, Some(50), Some(400), Some(2000)] {
            for hint in [false, true] {
                let bounds = detect_bounds(&image, target, hint, 900);
                assert_invariants(&bounds, 640, 480);
            }
        }
    }
}
