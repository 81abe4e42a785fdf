use std::io::{Cursor, Write};
use std::path::Path;

use image::imageops::invert;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageOutputFormat, Luma};
use imageproc::contrast::{otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::filter3x3;
use imageproc::morphology::close;
use tempfile::NamedTempFile;

use crate::utils::PlateError;

/// Number of renderings produced for every region.
pub const VARIANT_COUNT: usize = 6;

/// Names of the renderings, in output order.
pub const VARIANT_NAMES: [&str; VARIANT_COUNT] = [
    "equalized",
    "adaptive",
    "otsu",
    "inverted",
    "closed",
    "sharpened",
];

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_GRID: u32 = 8;
const ADAPTIVE_WINDOW: u32 = 11;
const ADAPTIVE_BIAS: i32 = 2;
const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// ImageProcessor loads photos and renders plate regions for OCR.
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn load_from_bytes(image_bytes: &[u8]) -> Result<DynamicImage, PlateError> {
        image::load_from_memory(image_bytes)
            .map_err(|e| PlateError::ImageDecodeError(e.to_string()))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<DynamicImage, PlateError> {
        image::open(path.as_ref()).map_err(|e| {
            PlateError::ImageReadError(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Render one region as a fixed, ordered batch of OCR-friendly variants.
    ///
    /// Order: equalized, adaptive threshold, Otsu threshold, inverted
    /// adaptive, closed adaptive, sharpened equalized.
    pub fn preprocess_for_ocr(region: &DynamicImage) -> Vec<GrayImage> {
        let gray = region.to_luma8();

        let enhanced = Self::equalize_local(&gray, CLAHE_CLIP_LIMIT, CLAHE_GRID);
        let adaptive = Self::adaptive_threshold(&enhanced, ADAPTIVE_WINDOW, ADAPTIVE_BIAS);
        let otsu = threshold(&enhanced, otsu_level(&enhanced));

        let mut inverted = adaptive.clone();
        invert(&mut inverted);

        // Reconnects strokes broken by the threshold
        let closed = close(&adaptive, Norm::LInf, 1);

        let sharpened: GrayImage = filter3x3::<Luma<u8>, i32, u8>(&enhanced, &SHARPEN_KERNEL);

        vec![enhanced, adaptive, otsu, inverted, closed, sharpened]
    }

    /// Contrast-limited adaptive histogram equalization.
    ///
    /// Builds a clipped-histogram lookup table per tile and blends the four
    /// nearest tables bilinearly so tile borders do not show.
    pub fn equalize_local(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return gray.clone();
        }

        let tiles_x = grid.min(width).max(1);
        let tiles_y = grid.min(height).max(1);
        let tile_w = (width + tiles_x - 1) / tiles_x;
        let tile_h = (height + tiles_y - 1) / tiles_y;

        let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = (x0 + tile_w).min(width);
                let y1 = (y0 + tile_h).min(height);
                luts.push(Self::tile_lut(gray, (x0, y0, x1, y1), clip_limit));
            }
        }

        let axis = |pos: u32, tile: u32, tiles: u32| -> (usize, usize, f32) {
            let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
            let lo = (f.floor().max(0.0) as u32).min(tiles - 1);
            let hi = (lo + 1).min(tiles - 1);
            let weight = (f - lo as f32).clamp(0.0, 1.0);
            (lo as usize, hi as usize, weight)
        };

        let stride = tiles_x as usize;
        let mut out = ImageBuffer::new(width, height);
        for y in 0..height {
            let (ty0, ty1, wy) = axis(y, tile_h, tiles_y);
            for x in 0..width {
                let (tx0, tx1, wx) = axis(x, tile_w, tiles_x);
                let v = gray.get_pixel(x, y)[0] as usize;

                let top = luts[ty0 * stride + tx0][v] as f32 * (1.0 - wx)
                    + luts[ty0 * stride + tx1][v] as f32 * wx;
                let bottom = luts[ty1 * stride + tx0][v] as f32 * (1.0 - wx)
                    + luts[ty1 * stride + tx1][v] as f32 * wx;
                let value = top * (1.0 - wy) + bottom * wy;

                out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
            }
        }
        out
    }

    fn tile_lut(gray: &GrayImage, bounds: (u32, u32, u32, u32), clip_limit: f32) -> [u8; 256] {
        let (x0, y0, x1, y1) = bounds;
        let mut hist = [0u32; 256];
        for y in y0..y1 {
            for x in x0..x1 {
                hist[gray.get_pixel(x, y)[0] as usize] += 1;
            }
        }

        let count: u32 = (x1 - x0) * (y1 - y0);
        let mut lut = [0u8; 256];
        if count == 0 {
            for (i, slot) in lut.iter_mut().enumerate() {
                *slot = i as u8;
            }
            return lut;
        }

        // Clip and hand the excess back evenly
        let limit = ((clip_limit * count as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share + u32::from(i < remainder);
        }

        let mut cdf = 0u32;
        for (i, bin) in hist.iter().enumerate() {
            cdf += bin;
            lut[i] = ((cdf as f32 * 255.0 / count as f32).round()).min(255.0) as u8;
        }
        lut
    }

    /// Local mean thresholding over a square window.
    ///
    /// A pixel turns white when it is brighter than its window mean minus
    /// `bias`. Row prefix sums keep each window sum at one subtraction per row.
    pub fn adaptive_threshold(gray: &GrayImage, window_size: u32, bias: i32) -> GrayImage {
        let (width, height) = gray.dimensions();
        let mut result = ImageBuffer::new(width, height);
        if width == 0 || height == 0 {
            return result;
        }

        let mut row_sums = vec![vec![0u32; width as usize + 1]; height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                row_sums[y][x + 1] = row_sums[y][x] + gray.get_pixel(x as u32, y as u32)[0] as u32;
            }
        }

        let half = window_size / 2;
        for y in 0..height {
            let start_y = y.saturating_sub(half) as usize;
            let end_y = (y + half).min(height - 1) as usize;
            for x in 0..width {
                let start_x = x.saturating_sub(half) as usize;
                let end_x = (x + half).min(width - 1) as usize;

                let mut sum = 0u32;
                for row in &row_sums[start_y..=end_y] {
                    sum += row[end_x + 1] - row[start_x];
                }
                let count = ((end_x - start_x + 1) * (end_y - start_y + 1)) as u32;
                let threshold = (sum / count) as i32 - bias;

                let value = if gray.get_pixel(x, y)[0] as i32 > threshold { 255 } else { 0 };
                result.put_pixel(x, y, Luma([value]));
            }
        }
        result
    }

    pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, PlateError> {
        let mut buffer = Vec::new();
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
            .map_err(|e| {
                PlateError::ImageProcessingError(format!("Failed to encode image: {}", e))
            })?;
        Ok(buffer)
    }

    /// Write a processed image to a PNG temp file; the file lives as long as the handle.
    pub fn save_to_temp_file(image: &GrayImage) -> Result<NamedTempFile, PlateError> {
        let bytes = Self::encode_png(image)?;
        let mut temp_file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|e| PlateError::ImageProcessingError(e.to_string()))?;

        temp_file.write_all(&bytes)?;

        Ok(temp_file)
    }
}
