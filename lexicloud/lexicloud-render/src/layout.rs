//! Word placement for the word cloud.
//!
//! Words are placed heaviest first. Each word gets a font size proportional
//! to its weight, never larger than the size of the word placed before it, so
//! rendered size is non-decreasing in weight. A word is put at a random free
//! position of an occupancy grid; when none is free the other orientation is
//! tried, then the font shrinks step by step down to the minimum size, and
//! finally the word is skipped.

use image::RgbaImage;
use lexicloud_core::config::WordCloudConfig;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Positions tried at random before falling back to a full scan
const RANDOM_GUESSES: usize = 64;

/// Placement parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub width: u32,
    pub height: u32,
    pub max_words: usize,
    pub min_font_size: f32,
    pub max_font_size: f32,
    pub font_step: f32,
    pub margin: u32,
    pub prefer_horizontal: f64,
    pub random_seed: u64,
}

impl From<&WordCloudConfig> for LayoutConfig {
    fn from(config: &WordCloudConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            max_words: config.max_words,
            min_font_size: config.min_font_size,
            max_font_size: config.max_font_size,
            font_step: config.font_step,
            margin: config.margin,
            prefer_horizontal: config.prefer_horizontal.clamp(0.0, 1.0),
            random_seed: config.random_seed,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::from(&WordCloudConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    /// Rotated a quarter turn counter-clockwise, read bottom to top
    Vertical,
}

impl Orientation {
    fn flipped(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

/// A word with its final size and position. `x`, `y`, `width` and `height`
/// describe the occupied box including the margin.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub term: String,
    pub weight: f64,
    pub font_size: f32,
    pub orientation: Orientation,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Which canvas pixels are taken, with a summed-area table for O(1) box queries
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    occupied: Vec<bool>,
    integral: Vec<u32>,
}

impl OccupancyGrid {
    /// An empty rectangular canvas
    pub fn new(width: u32, height: u32) -> Self {
        let mut grid = Self {
            width,
            height,
            occupied: vec![false; (width as usize) * (height as usize)],
            integral: Vec::new(),
        };
        grid.rebuild();
        grid
    }

    /// A canvas shaped by a mask image, resized to `width` x `height`.
    ///
    /// White and fully transparent mask pixels are blocked.
    pub fn from_mask(mask: &RgbaImage, width: u32, height: u32) -> Self {
        let resized;
        let mask = if mask.dimensions() == (width, height) {
            mask
        } else {
            resized = image::imageops::resize(mask, width, height, image::imageops::FilterType::Nearest);
            &resized
        };

        let occupied = mask
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                a == 0 || (r >= 250 && g >= 250 && b >= 250)
            })
            .collect();

        let mut grid = Self {
            width,
            height,
            occupied,
            integral: Vec::new(),
        };
        grid.rebuild();
        grid
    }

    /// Number of free pixels
    pub fn free_area(&self) -> usize {
        self.occupied.iter().filter(|o| !**o).count()
    }

    fn rebuild(&mut self) {
        let stride = self.width as usize + 1;
        self.integral = vec![0; stride * (self.height as usize + 1)];
        self.refresh_from(0, 0);
    }

    /// Recompute the table entries below and right of (x0, y0); the ones
    /// above or left of it only cover pixels that did not change
    fn refresh_from(&mut self, x0: usize, y0: usize) {
        let (w, h) = (self.width as usize, self.height as usize);
        let stride = w + 1;
        for y in y0..h {
            for x in x0..w {
                self.integral[(y + 1) * stride + x + 1] = self.occupied[y * w + x] as u32
                    + self.integral[y * stride + x + 1]
                    + self.integral[(y + 1) * stride + x]
                    - self.integral[y * stride + x];
            }
        }
    }

    /// Whether the box at (x, y) of size w x h lies on the canvas and is entirely free
    pub fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        if w == 0 || h == 0 || x + w > self.width || y + h > self.height {
            return false;
        }
        let stride = self.width as usize + 1;
        let (x0, y0, x1, y1) = (x as usize, y as usize, (x + w) as usize, (y + h) as usize);
        let taken = self.integral[y1 * stride + x1] + self.integral[y0 * stride + x0]
            - self.integral[y0 * stride + x1]
            - self.integral[y1 * stride + x0];
        taken == 0
    }

    /// Mark a box as taken
    pub fn occupy(&mut self, x: u32, y: u32, w: u32, h: u32) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        if x >= x_end || y >= y_end {
            return;
        }
        for yy in y..y_end {
            let row = (yy * self.width) as usize;
            self.occupied[row + x as usize..row + x_end as usize].fill(true);
        }
        self.refresh_from(x as usize, y as usize);
    }

    /// A uniformly chosen free position for a w x h box.
    ///
    /// Random guesses come first; only when they all miss is every position
    /// scanned, once.
    pub fn random_free_position<R: Rng>(&self, w: u32, h: u32, rng: &mut R) -> Option<(u32, u32)> {
        if w == 0 || h == 0 || w > self.width || h > self.height {
            return None;
        }
        let (max_x, max_y) = (self.width - w, self.height - h);

        for _ in 0..RANDOM_GUESSES {
            let (x, y) = (rng.random_range(0..=max_x), rng.random_range(0..=max_y));
            if self.is_free(x, y, w, h) {
                return Some((x, y));
            }
        }

        (0..=max_y)
            .flat_map(|y| (0..=max_x).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_free(x, y, w, h))
            .choose(rng)
    }
}

/// Font size for `weight` relative to the heaviest weight
pub fn scaled_font_size(weight: f64, max_weight: f64, config: &LayoutConfig) -> f32 {
    if max_weight <= 0.0 {
        return config.min_font_size;
    }
    let ratio = (weight / max_weight).clamp(0.0, 1.0) as f32;
    config.min_font_size + (config.max_font_size - config.min_font_size) * ratio
}

/// Place `ranked` words (heaviest first, positive weights) on `grid`.
///
/// `measure(term, font_size)` returns the unrotated text extent in pixels.
pub fn place_words<F>(
    ranked: &[(&str, f64)],
    config: &LayoutConfig,
    mut grid: OccupancyGrid,
    mut measure: F,
) -> Vec<PlacedWord>
where
    F: FnMut(&str, f32) -> (u32, u32),
{
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let max_weight = ranked.first().map(|(_, w)| *w).unwrap_or(0.0);
    let mut size_cap = config.max_font_size;
    let mut placed = Vec::new();

    for &(term, weight) in ranked.iter().take(config.max_words) {
        if weight <= 0.0 {
            continue;
        }

        let preferred = if rng.random_bool(config.prefer_horizontal) {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };

        let mut size = scaled_font_size(weight, max_weight, config).min(size_cap);
        let mut spot = None;

        while size >= config.min_font_size && spot.is_none() {
            let (tw, th) = measure(term, size);
            for orientation in [preferred, preferred.flipped()] {
                let (bw, bh) = match orientation {
                    Orientation::Horizontal => (tw, th),
                    Orientation::Vertical => (th, tw),
                };
                let (bw, bh) = (bw + 2 * config.margin, bh + 2 * config.margin);
                if let Some((x, y)) = grid.random_free_position(bw, bh, &mut rng) {
                    spot = Some((orientation, x, y, bw, bh));
                    break;
                }
            }
            if spot.is_none() {
                size -= config.font_step;
            }
        }

        match spot {
            Some((orientation, x, y, w, h)) => {
                grid.occupy(x, y, w, h);
                size_cap = size;
                placed.push(PlacedWord {
                    term: term.to_string(),
                    weight,
                    font_size: size,
                    orientation,
                    x,
                    y,
                    width: w,
                    height: h,
                });
            }
            None => debug!("No room left for '{}'", term),
        }
    }

    debug!(
        "Placed {} of {} words, {} pixels left free",
        placed.len(),
        ranked.len().min(config.max_words),
        grid.free_area()
    );
    placed
}
