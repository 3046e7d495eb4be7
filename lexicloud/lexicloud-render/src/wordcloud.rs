//! Word cloud rendering.

use crate::atomic::write_atomic;
use crate::layout::{place_words, LayoutConfig, OccupancyGrid, Orientation, PlacedWord};
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use lexicloud_core::config::WordCloudConfig;
use lexicloud_core::error::{LexiError, Result};
use lexicloud_keywords::AggregatedWeights;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// A rendered cloud and the words that made it onto the canvas
#[derive(Debug, Clone)]
pub struct RenderedCloud {
    pub image: RgbaImage,
    pub words: Vec<PlacedWord>,
}

/// Draws aggregated weights as a word cloud image
pub struct WordCloudRenderer {
    layout: LayoutConfig,
    font: FontVec,
    background: Rgba<u8>,
    palette: Vec<Rgba<u8>>,
    mask: Option<RgbaImage>,
}

impl std::fmt::Debug for WordCloudRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordCloudRenderer")
            .field("layout", &self.layout)
            .field("background", &self.background)
            .field("palette", &self.palette)
            .field("mask", &self.mask.as_ref().map(|m| m.dimensions()))
            .finish()
    }
}

impl WordCloudRenderer {
    /// Load the configured font and mask. A missing mask falls back to the
    /// full rectangular canvas.
    ///
    /// A font that is missing or cannot be parsed is a render error, since no
    /// image can be produced without it.
    pub fn new(config: &WordCloudConfig) -> Result<Self> {
        let bytes = std::fs::read(&config.font_path).map_err(|e| {
            LexiError::render(format!("Cannot read font {}: {}", config.font_path.display(), e))
        })?;
        let font = FontVec::try_from_vec_and_index(bytes, config.font_index).map_err(|e| {
            LexiError::render(format!("Invalid font {}: {}", config.font_path.display(), e))
        })?;
        Self::with_font(config, font)
    }

    /// Use an already loaded font
    pub fn with_font(config: &WordCloudConfig, font: FontVec) -> Result<Self> {
        let background = parse_color(&config.background_color)?;
        let palette = config
            .palette
            .iter()
            .map(|c| parse_color(c))
            .collect::<Result<Vec<_>>>()?;
        let palette = if palette.is_empty() {
            vec![Rgba([0, 0, 0, 255])]
        } else {
            palette
        };

        let mask = config.mask_path.as_deref().and_then(load_mask);

        Ok(Self {
            layout: LayoutConfig::from(config),
            font,
            background,
            palette,
            mask,
        })
    }

    fn grid(&self) -> OccupancyGrid {
        match &self.mask {
            Some(mask) => OccupancyGrid::from_mask(mask, self.layout.width, self.layout.height),
            None => OccupancyGrid::new(self.layout.width, self.layout.height),
        }
    }

    /// Positions for every word that fits, heaviest first
    pub fn layout(&self, weights: &AggregatedWeights) -> Vec<PlacedWord> {
        let normalized = weights.normalized_by_max();
        let ranked = normalized.ranked();
        place_words(&ranked, &self.layout, self.grid(), |term, size| {
            text_size(PxScale::from(size), &self.font, term)
        })
    }

    /// Render `weights` into an image.
    ///
    /// Fails with [`LexiError::CorpusEmpty`] when no term has positive weight.
    pub fn render(&self, weights: &AggregatedWeights) -> Result<RenderedCloud> {
        if weights.ranked().is_empty() {
            return Err(LexiError::corpus_empty("no keywords with positive weight to draw"));
        }

        let words = self.layout(weights);
        let mut image = RgbaImage::from_pixel(self.layout.width, self.layout.height, self.background);
        let mut rng = StdRng::seed_from_u64(self.layout.random_seed);
        let margin = self.layout.margin;

        for word in &words {
            let color = self.palette[rng.random_range(0..self.palette.len())];
            let scale = PxScale::from(word.font_size);
            match word.orientation {
                Orientation::Horizontal => draw_text_mut(
                    &mut image,
                    color,
                    (word.x + margin) as i32,
                    (word.y + margin) as i32,
                    scale,
                    &self.font,
                    &word.term,
                ),
                Orientation::Vertical => {
                    // drawn upright, then turned so it reads bottom to top
                    let (tw, th) = text_size(scale, &self.font, &word.term);
                    let mut upright = RgbaImage::from_pixel(tw.max(1), th.max(1), self.background);
                    draw_text_mut(&mut upright, color, 0, 0, scale, &self.font, &word.term);
                    let turned = image::imageops::rotate270(&upright);
                    image::imageops::replace(
                        &mut image,
                        &turned,
                        (word.x + margin) as i64,
                        (word.y + margin) as i64,
                    );
                }
            }
        }

        debug!("Rendered {} words", words.len());
        Ok(RenderedCloud { image, words })
    }

    /// Render and write a PNG to `path`. Returns the number of words drawn.
    pub fn render_to_file(&self, weights: &AggregatedWeights, path: &Path) -> Result<usize> {
        let cloud = self.render(weights)?;
        let bytes = encode_png(cloud.image)?;
        write_atomic(path, &bytes)?;
        info!("Word cloud saved to {} ({} words)", path.display(), cloud.words.len());
        Ok(cloud.words.len())
    }
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| LexiError::render(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer.into_inner())
}

/// The mask as RGBA, or `None` (full canvas) when it is missing or unreadable
fn load_mask(path: &Path) -> Option<RgbaImage> {
    if !path.is_file() {
        warn!("Mask {} not found, using the full canvas", path.display());
        return None;
    }
    match image::open(path) {
        Ok(image) => Some(image.to_rgba8()),
        Err(e) => {
            warn!("Cannot decode mask {}: {}, using the full canvas", path.display(), e);
            None
        }
    }
}

/// Parse `#rrggbb`, `#rgb` or a basic color name
pub fn parse_color(value: &str) -> Result<Rgba<u8>> {
    let value = value.trim();
    let invalid = || LexiError::render(format!("Invalid color '{}'", value));

    if let Some(hex) = value.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(invalid)?;
        return match digits.as_slice() {
            [r, g, b] => Ok(Rgba([r * 17, g * 17, b * 17, 255])),
            [r1, r2, g1, g2, b1, b2] => Ok(Rgba([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, 255])),
            _ => Err(invalid()),
        };
    }

    let rgb = match value.to_lowercase().as_str() {
        "white" => [255, 255, 255],
        "black" => [0, 0, 0],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "gray" | "grey" => [128, 128, 128],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        _ => return Err(invalid()),
    };
    Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff8000").unwrap(), Rgba([255, 128, 0, 255]));
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color(" White ").unwrap(), Rgba([255, 255, 255, 255]));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#gg0000").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn test_missing_font_is_render_error() {
        let config = WordCloudConfig {
            font_path: PathBuf::from("/nonexistent/font.ttf"),
            ..WordCloudConfig::default()
        };
        let err = WordCloudRenderer::new(&config).unwrap_err();
        assert!(matches!(err, LexiError::Render(_)));
    }

    #[test]
    fn test_garbage_font_is_render_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        let config = WordCloudConfig {
            font_path: path,
            ..WordCloudConfig::default()
        };
        assert!(matches!(WordCloudRenderer::new(&config), Err(LexiError::Render(_))));
    }

    #[test]
    fn test_missing_or_broken_mask_means_full_canvas() {
        assert!(load_mask(Path::new("/nonexistent/mask.png")).is_none());

        let dir = tempfile::TempDir::new().unwrap();
        let broken = dir.path().join("mask.png");
        std::fs::write(&broken, b"not an image").unwrap();
        assert!(load_mask(&broken).is_none());

        let valid = dir.path().join("valid.png");
        RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255])).save(&valid).unwrap();
        assert_eq!(load_mask(&valid).unwrap().dimensions(), (3, 2));
    }

    #[test]
    fn test_png_encoding_has_signature() {
        let bytes = encode_png(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]))).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
