use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::FilterType;
use image::GrayImage;

use crate::perception::templates::{Template, TemplateId};

/// Lazily populated resized copies of templates, keyed by (template, scale).
///
/// Keys are bounded by the fixed template set times the fixed scale list, so
/// entries are never evicted.
#[derive(Default)]
pub struct TemplateCache {
    entries: HashMap<(TemplateId, u32), Arc<GrayImage>>,
    misses: usize,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resized(&mut self, template: &Template, scale: f32) -> Arc<GrayImage> {
        let key = (template.id, scale.to_bits());
        if let Some(hit) = self.entries.get(&key) {
            return Arc::clone(hit);
        }
        self.misses += 1;
        let resized = Arc::new(resize(&template.image, scale));
        self.entries.insert(key, Arc::clone(&resized));
        resized
    }

    /// Number of resize computations performed so far.
    pub fn misses(&self) -> usize {
        self.misses
    }
}

/// Scale dimensions truncate towards zero.
fn resize(src: &GrayImage, scale: f32) -> GrayImage {
    if scale == 1.0 {
        return src.clone();
    }
    let w = (src.width() as f32 * scale) as u32;
    let h = (src.height() as f32 * scale) as u32;
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }
    image::imageops::resize(src, w, h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::templates::TemplateKind;

    fn template(kind: TemplateKind, ordinal: usize, w: u32, h: u32) -> Template {
        Template {
            id: TemplateId { kind, ordinal },
            name: format!("{ordinal}.png"),
            image: Arc::new(GrayImage::from_fn(w, h, |x, y| image::Luma([(x * 13 + y * 7) as u8]))),
        }
    }

    #[test]
    fn second_request_is_a_cache_hit() {
        let mut cache = TemplateCache::new();
        let t = template(TemplateKind::Green, 0, 40, 20);

        let first = cache.resized(&t, 0.95);
        let second = cache.resized(&t, 0.95);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(first.dimensions(), (38, 19));
    }

    #[test]
    fn same_shape_templates_do_not_alias() {
        let mut cache = TemplateCache::new();
        let a = template(TemplateKind::Pin, 0, 10, 10);
        let mut b = template(TemplateKind::Pin, 1, 10, 10);
        b.image = Arc::new(GrayImage::from_pixel(10, 10, image::Luma([200])));

        let ra = cache.resized(&a, 1.05);
        let rb = cache.resized(&b, 1.05);

        assert_ne!(*ra, *rb);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn unit_scale_keeps_pixels() {
        let mut cache = TemplateCache::new();
        let t = template(TemplateKind::Confirm, 0, 9, 5);
        assert_eq!(*cache.resized(&t, 1.0), *t.image);
        assert_eq!(cache.resized(&t, 1.05).dimensions(), (9, 5));
    }
}
