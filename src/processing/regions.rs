use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::edges::canny;
use imageproc::filter::bilateral_filter;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

use crate::models::BoundingBox;

const MAX_GEOMETRY_CONTOURS: usize = 30;
const POLYGON_EPSILON: f64 = 0.018;
const MIN_ASPECT: f64 = 1.5;
const MAX_ASPECT: f64 = 6.0;
const MIN_WIDTH: u32 = 60;
const MIN_HEIGHT: u32 = 20;
const PADDING: u32 = 10;
const OVERLAP_LIMIT: f64 = 0.5;

/// HSV ranges on the 8-bit scale (hue 0-180).
struct HsvRange {
    lower: [u8; 3],
    upper: [u8; 3],
}

const YELLOW_PLATE: HsvRange = HsvRange {
    lower: [15, 80, 80],
    upper: [35, 255, 255],
};

const WHITE_PLATE: HsvRange = HsvRange {
    lower: [0, 0, 180],
    upper: [180, 30, 255],
};

/// A sub-image hypothesized to hold a plate.
#[derive(Debug, Clone)]
pub struct RegionCandidate {
    pub image: DynamicImage,
    pub bbox: BoundingBox,
}

/// RegionDetector finds plate-shaped rectangles in a full photo.
///
/// Two passes feed one candidate list: edge contours approximated as
/// polygons, and contours of yellow or white plate-coloured masks. Nested
/// duplicates are dropped, the largest boxes come first, and when nothing
/// survives the whole photo is returned so OCR always has a region to read.
pub struct RegionDetector {
    max_regions: usize,
}

impl Default for RegionDetector {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RegionDetector {
    pub fn new(max_regions: usize) -> Self {
        Self {
            max_regions: max_regions.max(1),
        }
    }

    pub fn detect(&self, image: &DynamicImage) -> Vec<RegionCandidate> {
        let (width, height) = image.dimensions();

        let mut boxes = Self::geometry_candidates(image);
        if image.color().has_color() {
            boxes.extend(Self::color_candidates(image));
        }

        let kept = Self::remove_overlapping(boxes, self.max_regions);
        if kept.is_empty() {
            log::debug!("No plate-shaped regions, falling back to the full image");
            return vec![RegionCandidate {
                image: image.clone(),
                bbox: BoundingBox::new(0, 0, width, height),
            }];
        }

        kept.into_iter()
            .map(|bbox| RegionCandidate {
                image: image.crop_imm(bbox.x1, bbox.y1, bbox.width(), bbox.height()),
                bbox,
            })
            .collect()
    }

    /// Edge pass: denoise, detect edges, keep the largest 4-6 sided shapes.
    fn geometry_candidates(image: &DynamicImage) -> Vec<BoundingBox> {
        let (width, height) = image.dimensions();
        let gray = image.to_luma8();
        let filtered = bilateral_filter(&gray, 11, 17.0, 17.0);
        let edges = canny(&filtered, 30.0, 200.0);

        let mut contours: Vec<(f64, Contour<i32>)> = find_contours::<i32>(&edges)
            .into_iter()
            .map(|c| (polygon_area(&c.points), c))
            .collect();
        contours.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        contours
            .iter()
            .take(MAX_GEOMETRY_CONTOURS)
            .filter_map(|(_, contour)| {
                if contour.points.len() < 4 {
                    return None;
                }
                let perimeter = arc_length(&contour.points, true);
                let approx = approximate_polygon_dp(&contour.points, POLYGON_EPSILON * perimeter, true);
                if !(4..=6).contains(&approx.len()) {
                    return None;
                }
                plate_box(&approx, width, height)
            })
            .collect()
    }

    /// Colour pass: outer contours of yellow and white plate masks.
    fn color_candidates(image: &DynamicImage) -> Vec<BoundingBox> {
        let (width, height) = image.dimensions();
        let rgb = image.to_rgb8();

        [YELLOW_PLATE, WHITE_PLATE]
            .iter()
            .flat_map(|range| {
                let mask = hsv_mask(&rgb, range);
                find_contours::<i32>(&mask)
                    .into_iter()
                    .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
                    .filter_map(|c| plate_box(&c.points, width, height))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Drop boxes mostly covered by a larger kept box, largest first, capped.
    ///
    /// Equal areas are ordered top-left first.
    pub fn remove_overlapping(mut boxes: Vec<BoundingBox>, max_regions: usize) -> Vec<BoundingBox> {
        boxes.sort_by(|a, b| {
            b.area()
                .cmp(&a.area())
                .then(a.x1.cmp(&b.x1))
                .then(a.y1.cmp(&b.y1))
        });

        let mut kept: Vec<BoundingBox> = Vec::new();
        for candidate in boxes {
            if candidate.area() == 0 {
                continue;
            }
            let redundant = kept
                .iter()
                .any(|existing| candidate.overlap_ratio(existing) > OVERLAP_LIMIT);
            if !redundant {
                kept.push(candidate);
            }
        }

        kept.truncate(max_regions);
        kept
    }
}

/// Padded bounding box of `points` if it has plate proportions.
fn plate_box(points: &[Point<i32>], width: u32, height: u32) -> Option<BoundingBox> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;

    let w = (max_x - min_x + 1) as u32;
    let h = (max_y - min_y + 1) as u32;
    if !is_plate_shaped(w, h) {
        return None;
    }

    let x = min_x.max(0) as u32;
    let y = min_y.max(0) as u32;
    let bbox = BoundingBox::new(
        x.saturating_sub(PADDING),
        y.saturating_sub(PADDING),
        (x + w + PADDING).min(width),
        (y + h + PADDING).min(height),
    );
    (bbox.area() > 0).then_some(bbox)
}

pub fn is_plate_shaped(w: u32, h: u32) -> bool {
    if h == 0 {
        return false;
    }
    let aspect = w as f64 / h as f64;
    (MIN_ASPECT..=MAX_ASPECT).contains(&aspect) && w > MIN_WIDTH && h > MIN_HEIGHT
}

/// Shoelace area of a closed point sequence.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

fn hsv_mask(rgb: &RgbImage, range: &HsvRange) -> GrayImage {
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let hsv = rgb_to_hsv(rgb.get_pixel(x, y).0);
        let inside = (0..3).all(|i| hsv[i] >= range.lower[i] && hsv[i] <= range.upper[i]);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// 8-bit HSV with hue halved into 0-180.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let s = if max == 0.0 { 0.0 } else { 255.0 * diff / max };
    let mut h = if diff == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / diff
    } else if max == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    [(h / 2.0).round() as u8, s.round() as u8, max as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
    use imageproc::rect::Rect;

    fn scene(plate: Option<Rect>, fill: Rgb<u8>) -> DynamicImage {
        let mut img = RgbImage::from_pixel(400, 300, Rgb([30, 30, 30]));
        if let Some(rect) = plate {
            draw_filled_rect_mut(&mut img, rect, fill);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_blank_image_falls_back_to_whole_frame() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([128, 128, 128])));
        let regions = RegionDetector::default().detect(&img);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, BoundingBox::new(0, 0, 320, 240));
        assert_eq!(regions[0].image.dimensions(), (320, 240));
    }

    #[test]
    fn test_yellow_plate_is_found() {
        let plate = Rect::at(100, 120).of_size(200, 60);
        let img = scene(Some(plate), Rgb([230, 200, 20]));
        let regions = RegionDetector::default().detect(&img);

        let first = &regions[0];
        assert_ne!(first.bbox, BoundingBox::new(0, 0, 400, 300));
        assert!(first.bbox.x1 <= 100 && first.bbox.y1 <= 120);
        assert!(first.bbox.x2 >= 300 && first.bbox.y2 >= 180);
        assert_eq!(
            first.image.dimensions(),
            (first.bbox.width(), first.bbox.height())
        );
    }

    #[test]
    fn test_non_plate_shapes_are_ignored() {
        // too tall, then too small
        for rect in [Rect::at(150, 40).of_size(40, 200), Rect::at(150, 150).of_size(50, 15)] {
            let img = scene(Some(rect), Rgb([230, 200, 20]));
            let regions = RegionDetector::default().detect(&img);
            assert_eq!(regions.len(), 1);
            assert_eq!(regions[0].bbox, BoundingBox::new(0, 0, 400, 300));
        }
    }

    // Grey on grey: neither colour mask fires, only the edge pass can see it.
    fn grey_scene() -> RgbImage {
        RgbImage::from_pixel(400, 300, Rgb([70, 70, 70]))
    }

    #[test]
    fn test_grey_rectangle_found_by_edges() {
        let mut img = grey_scene();
        draw_filled_rect_mut(&mut img, Rect::at(100, 120).of_size(200, 60), Rgb([170, 170, 170]));
        let img = DynamicImage::ImageRgb8(img);
        assert!(RegionDetector::color_candidates(&img).is_empty());

        let regions = RegionDetector::default().detect(&img);
        let bbox = regions[0].bbox;
        let plate = BoundingBox::new(100, 120, 300, 180);
        assert_ne!(bbox, BoundingBox::new(0, 0, 400, 300));
        assert!(plate.overlap_ratio(&bbox) > 0.8, "{:?} misses the plate", bbox);
        assert!(bbox.width() <= 200 + 2 * PADDING + 4);
        assert!(bbox.height() <= 60 + 2 * PADDING + 4);
    }

    #[test]
    fn test_plate_sized_sawtooth_is_not_a_plate() {
        let mut img = grey_scene();
        let teeth = [
            Point::new(100, 180),
            Point::new(300, 180),
            Point::new(300, 120),
            Point::new(260, 150),
            Point::new(220, 120),
            Point::new(180, 150),
            Point::new(140, 120),
            Point::new(100, 150),
        ];
        draw_polygon_mut(&mut img, &teeth, Rgb([170, 170, 170]));
        let img = DynamicImage::ImageRgb8(img);

        let regions = RegionDetector::default().detect(&img);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, BoundingBox::new(0, 0, 400, 300));
    }

    #[test]
    fn test_padding_is_clipped_to_image() {
        let points = [
            Point::new(2, 3),
            Point::new(150, 3),
            Point::new(150, 50),
            Point::new(2, 50),
        ];
        let bbox = plate_box(&points, 155, 55).unwrap();
        assert_eq!(bbox, BoundingBox::new(0, 0, 155, 55));
    }

    #[test]
    fn test_nested_boxes_are_deduplicated() {
        let outer = BoundingBox::new(0, 0, 200, 100);
        let inner = BoundingBox::new(20, 20, 120, 70);
        let beside = BoundingBox::new(180, 0, 380, 100);
        let kept = RegionDetector::remove_overlapping(vec![inner, beside, outer], 5);
        assert_eq!(kept, vec![outer, beside]);
    }

    #[test]
    fn test_equal_areas_order_independent_of_input() {
        let left = BoundingBox::new(0, 0, 200, 100);
        let right = BoundingBox::new(180, 0, 380, 100);
        let lower = BoundingBox::new(0, 150, 200, 250);
        let expected = vec![left, lower, right];
        for input in [
            vec![right, lower, left],
            vec![lower, left, right],
            vec![left, right, lower],
        ] {
            assert_eq!(RegionDetector::remove_overlapping(input, 5), expected);
        }
    }

    #[test]
    fn test_output_is_capped() {
        let boxes: Vec<BoundingBox> = (0..8)
            .map(|i| BoundingBox::new(i * 100, 0, i * 100 + 90 - i, 30))
            .collect();
        let kept = RegionDetector::remove_overlapping(boxes, 5);
        assert_eq!(kept.len(), 5);
        assert_eq!(kept[0].width(), 90);
        assert!(kept.windows(2).all(|w| w[0].area() >= w[1].area()));
    }

    #[test]
    fn test_plate_shape_filter() {
        assert!(is_plate_shaped(200, 60));
        assert!(!is_plate_shaped(60, 30)); // width must exceed 60
        assert!(!is_plate_shaped(400, 50)); // aspect 8
        assert!(!is_plate_shaped(100, 0));
    }

    #[test]
    fn test_hsv_matches_opencv_scale() {
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        let yellow = rgb_to_hsv([230, 200, 20]);
        assert!((15..=35).contains(&yellow[0]));
    }
}
