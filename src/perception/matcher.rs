/// Normalised correlation-coefficient template matching.
///
/// `find_state` is first-acceptable-hit: templates then scales are tried in
/// the given order and the first score map with any pixel at or above the
/// threshold returns its first such location (row-major). `find_start_point`
/// instead keeps the single best score over a whole folder.
use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::errors::PilotResult;
use crate::perception::template_cache::TemplateCache;
use crate::perception::templates::{png_files, Template};
use crate::perception::types::Frame;

/// Per-pixel correlation scores; index `(x, y)` is the template's top-left offset.
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

type Integral = ImageBuffer<Luma<u64>, Vec<u64>>;

pub fn to_gray(frame: &Frame) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Sum over the `w`x`h` window at `(x, y)`; integral images carry a leading
/// zero row and column.
fn window_sum(integral: &Integral, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let at = |x: u32, y: u32| integral.get_pixel(x, y).0[0];
    (at(x + w, y + h) + at(x, y) - at(x + w, y) - at(x, y + h)) as f64
}

/// Zero-mean normalised correlation of `template` over `gray`, in [-1, 1].
///
/// Windows (or templates) with no variance carry no pattern and score NaN.
/// `None` when the template does not fit.
pub fn correlate(gray: &GrayImage, template: &GrayImage) -> Option<ScoreMap> {
    let (fw, fh) = gray.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > fw || th > fh {
        return None;
    }

    let n = (tw * th) as f64;
    let (t_sum, t_sq) = template.pixels().fold((0.0, 0.0), |(s, q), p| {
        let v = p.0[0] as f64;
        (s + v, q + v * v)
    });
    let t_var = n * t_sq - t_sum * t_sum;

    let cross = match_template(gray, template, MatchTemplateMethod::CrossCorrelation);
    let sums: Integral = integral_image::<_, u64>(gray);
    let squares: Integral = integral_squared_image::<_, u64>(gray);

    Some(ScoreMap::from_fn(cross.width(), cross.height(), |x, y| {
        let i_sum = window_sum(&sums, x, y, tw, th);
        let i_var = n * window_sum(&squares, x, y, tw, th) - i_sum * i_sum;
        if i_var <= 0.0 || t_var <= 0.0 {
            return Luma([f32::NAN]);
        }
        let numerator = n * cross.get_pixel(x, y).0[0] as f64 - i_sum * t_sum;
        Luma([(numerator / (i_var * t_var).sqrt()).clamp(-1.0, 1.0) as f32])
    }))
}

/// Highest finite score and its first (row-major) location.
pub fn best_score(scores: &ScoreMap) -> Option<(f32, u32, u32)> {
    let mut best: Option<(f32, u32, u32)> = None;
    for (x, y, s) in scores.enumerate_pixels() {
        let v = s.0[0];
        if v.is_finite() && best.map_or(true, |(b, _, _)| v > b) {
            best = Some((v, x, y));
        }
    }
    best
}

fn centre_of(x: u32, y: u32, template: &GrayImage) -> (i32, i32) {
    ((x + template.width() / 2) as i32, (y + template.height() / 2) as i32)
}

/// First template/scale whose score map clears `threshold`, as a centre point.
pub fn find_state(
    frame: &Frame,
    templates: &[Template],
    threshold: f32,
    scales: &[f32],
    cache: &mut TemplateCache,
) -> Option<(i32, i32)> {
    if templates.is_empty() {
        return None;
    }
    let gray = to_gray(frame);
    for template in templates {
        for &scale in scales {
            let resized = cache.resized(template, scale);
            let Some(scores) = correlate(&gray, &resized) else {
                continue;
            };
            if let Some((x, y, _)) = scores.enumerate_pixels().find(|(_, _, s)| s.0[0] >= threshold) {
                tracing::trace!(template = %template.name, scale, x, y, "state template hit");
                return Some(centre_of(x, y, &resized));
            }
        }
    }
    None
}

/// Best-scoring anchor over every `*.png` in `folder`, read fresh from disk.
pub fn find_start_point(frame: &Frame, folder: &Path, threshold: f32) -> PilotResult<Option<(i32, i32)>> {
    let gray = to_gray(frame);
    let mut best: Option<(f32, (i32, i32))> = None;

    for path in png_files(folder)? {
        let template = image::open(&path)?.to_luma8();
        let Some(scores) = correlate(&gray, &template) else {
            tracing::debug!(path = %path.display(), "anchor template larger than frame");
            continue;
        };
        let Some((score, x, y)) = best_score(&scores) else {
            continue;
        };
        if score < threshold {
            continue;
        }
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, centre_of(x, y, &template)));
        }
    }

    if let Some((score, point)) = best {
        tracing::debug!(score, x = point.0, y = point.1, "anchor located");
    }
    Ok(best.map(|(_, p)| p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::templates::{TemplateId, TemplateKind};
    use std::sync::Arc;

    /// 20x20 patch: bright 10x10 block in the top-left corner, dark elsewhere.
    fn block_patch(value: u8) -> GrayImage {
        GrayImage::from_fn(20, 20, |x, y| image::Luma([if x < 10 && y < 10 { value } else { 0 }]))
    }

    fn template(ordinal: usize, image: GrayImage) -> Template {
        Template {
            id: TemplateId { kind: TemplateKind::Confirm, ordinal },
            name: format!("{ordinal}.png"),
            image: Arc::new(image),
        }
    }

    /// Black frame with `patch` pasted at each position.
    fn frame_with(size: (u32, u32), patches: &[(&GrayImage, u32, u32)]) -> Frame {
        let mut frame = Frame::from_pixel(size.0, size.1, image::Rgba([0, 0, 0, 255]));
        for (patch, ox, oy) in patches {
            for (x, y, p) in patch.enumerate_pixels() {
                let v = p.0[0];
                frame.put_pixel(ox + x, oy + y, image::Rgba([v, v, v, 255]));
            }
        }
        frame
    }

    #[test]
    fn returns_centre_of_exact_match() {
        let patch = block_patch(255);
        let frame = frame_with((120, 90), &[(&patch, 40, 30)]);
        let mut cache = TemplateCache::new();

        let hit = find_state(&frame, &[template(0, patch)], 0.97, &[1.0], &mut cache);
        assert_eq!(hit, Some((50, 40)));
    }

    /// White 20x20 patch with a small dark glyph, like a light button label.
    fn glyph_patch() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, y| {
            image::Luma([if (8..12).contains(&x) && (7..12).contains(&y) { 0 } else { 255 }])
        })
    }

    #[test]
    fn bright_template_never_matches_a_flat_bright_frame() {
        let frame = Frame::from_pixel(215, 515, image::Rgba([255, 255, 255, 255]));
        let mut cache = TemplateCache::new();
        let templates = [template(0, glyph_patch())];

        assert_eq!(find_state(&frame, &templates, 0.8, &[0.95, 1.0, 1.05], &mut cache), None);
        let scores = correlate(&to_gray(&frame), &glyph_patch()).unwrap();
        assert_eq!(best_score(&scores), None);
    }

    #[test]
    fn bright_template_found_on_bright_frame() {
        let patch = glyph_patch();
        let mut frame = Frame::from_pixel(120, 90, image::Rgba([255, 255, 255, 255]));
        for (x, y, p) in patch.enumerate_pixels() {
            let v = p.0[0];
            frame.put_pixel(50 + x, 40 + y, image::Rgba([v, v, v, 255]));
        }
        let scores = correlate(&to_gray(&frame), &patch).unwrap();
        let (score, x, y) = best_score(&scores).unwrap();
        assert!((score - 1.0).abs() < 1e-3);
        assert_eq!((x, y), (50, 40));
    }

    #[test]
    fn coefficient_is_bounded_and_sign_aware() {
        let patch = block_patch(255);
        let inverted = GrayImage::from_fn(20, 20, |x, y| image::Luma([255 - patch.get_pixel(x, y).0[0]]));
        let scores = correlate(&inverted, &patch).unwrap();
        assert_eq!(scores.dimensions(), (1, 1));
        assert!((scores.get_pixel(0, 0).0[0] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn below_threshold_everywhere_returns_none() {
        let frame = Frame::from_pixel(80, 80, image::Rgba([128, 128, 128, 255]));
        let mut cache = TemplateCache::new();

        let hit = find_state(&frame, &[template(0, block_patch(255))], 0.8, &[1.0], &mut cache);
        assert_eq!(hit, None);
    }

    #[test]
    fn first_template_in_order_wins() {
        let a = block_patch(255);
        // Same footprint, a narrow vertical bar instead of a block.
        let b = GrayImage::from_fn(20, 20, |x, y| {
            image::Luma([if (12..17).contains(&x) && (2..18).contains(&y) { 255 } else { 0 }])
        });
        let frame = frame_with((200, 100), &[(&a, 10, 10), (&b, 150, 60)]);
        let mut cache = TemplateCache::new();

        let ab = find_state(&frame, &[template(0, a.clone()), template(1, b.clone())], 0.97, &[1.0], &mut cache);
        let ba = find_state(&frame, &[template(1, b), template(0, a)], 0.97, &[1.0], &mut cache);

        assert_eq!(ab, Some((20, 20)));
        assert_eq!(ba, Some((160, 70)));
    }

    #[test]
    fn scales_are_cached_across_calls() {
        let patch = block_patch(255);
        let frame = frame_with((120, 90), &[(&patch, 40, 30)]);
        let mut cache = TemplateCache::new();
        let templates = [template(0, patch)];

        find_state(&frame, &templates, 0.99, &[0.95, 1.0, 1.05], &mut cache);
        let after_first = cache.misses();
        find_state(&frame, &templates, 0.99, &[0.95, 1.0, 1.05], &mut cache);

        assert!(after_first >= 1);
        assert_eq!(cache.misses(), after_first);
    }

    #[test]
    fn oversized_template_is_skipped() {
        let frame = Frame::from_pixel(10, 10, image::Rgba([255, 255, 255, 255]));
        let mut cache = TemplateCache::new();
        assert_eq!(find_state(&frame, &[template(0, block_patch(255))], 0.5, &[1.0], &mut cache), None);
    }

    #[test]
    fn best_score_skips_non_finite() {
        let mut scores = ScoreMap::new(3, 2);
        scores.put_pixel(0, 0, image::Luma([f32::NAN]));
        scores.put_pixel(2, 0, image::Luma([0.5]));
        scores.put_pixel(1, 1, image::Luma([0.5]));
        assert_eq!(best_score(&scores), Some((0.5, 2, 0)));
    }

    #[test]
    fn start_point_keeps_best_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let exact = block_patch(255);
        // Sorts first but only partially present in the frame.
        let partial = GrayImage::from_fn(20, 20, |x, y| {
            image::Luma([if (x < 10 && y < 10) || (x >= 15 && y >= 15) { 255 } else { 0 }])
        });
        partial.save(dir.path().join("a_partial.png")).unwrap();
        exact.save(dir.path().join("b_exact.png")).unwrap();

        let frame = frame_with((160, 80), &[(&exact, 60, 20)]);
        let hit = find_start_point(&frame, dir.path(), 0.8).unwrap();
        assert_eq!(hit, Some((70, 30)));
    }

    #[test]
    fn start_point_none_when_nothing_clears_threshold() {
        let dir = tempfile::tempdir().unwrap();
        block_patch(255).save(dir.path().join("anchor.png")).unwrap();
        let frame = Frame::from_pixel(80, 80, image::Rgba([128, 128, 128, 255]));
        assert_eq!(find_start_point(&frame, dir.path(), 0.8).unwrap(), None);
    }
}
