//! Terrain mask service
//!
//! Stages describe collision and effect regions as raster layers. Each pixel is
//! classified by exact color match (within a small tolerance) against a fixed
//! palette. World coordinates are scaled into mask space using the stage's
//! logical bounds, so a stage may ship masks at any resolution.
//!
//! All queries are side-effect free. Missing layers and out-of-bounds lookups
//! answer "nothing here".

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::Rect;
use crate::consts::COLOR_TOLERANCE;
use crate::error::MaskError;

/// Independent raster layers a stage may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskLayer {
    /// Ground / wall / ceiling / semisolid platform / kill pixels
    Collision,
    /// Surfaces that allow wall-cling
    WallSlide,
    Hazard,
    Speed,
    Bounce,
    /// Stage-specific marker regions
    Special,
}

/// Pixel classes and their palette colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainClass {
    Ground,
    Wall,
    Ceiling,
    /// Semisolid: only blocks from above, can be dropped through
    Platform,
    /// Hard kill pixels
    Kill,
    WallSlide,
    Hazard,
    Speed,
    Bounce,
    Special,
}

impl TerrainClass {
    /// Palette color (RGB)
    pub const fn color(self) -> [u8; 3] {
        match self {
            TerrainClass::Ground => [0, 0, 0],
            TerrainClass::Wall => [64, 64, 64],
            TerrainClass::Ceiling => [192, 192, 192],
            TerrainClass::Platform => [0, 0, 255],
            TerrainClass::Kill => [128, 0, 0],
            TerrainClass::WallSlide => [0, 255, 255],
            TerrainClass::Hazard => [255, 0, 0],
            TerrainClass::Speed => [255, 255, 0],
            TerrainClass::Bounce => [0, 255, 0],
            TerrainClass::Special => [255, 0, 255],
        }
    }

    /// Classes that block movement from every side
    pub const SOLID: [TerrainClass; 3] =
        [TerrainClass::Ground, TerrainClass::Wall, TerrainClass::Ceiling];
}

/// Result of the collision classification query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surface {
    None,
    Ground,
    Wall,
    Ceiling,
}

impl Surface {
    /// Lookup order: earlier entries win where classes overlap
    const LOOKUP: [(TerrainClass, Surface); 3] = [
        (TerrainClass::Ground, Surface::Ground),
        (TerrainClass::Wall, Surface::Wall),
        (TerrainClass::Ceiling, Surface::Ceiling),
    ];

    pub fn is_solid(self) -> bool {
        self != Surface::None
    }
}

#[inline]
fn color_matches(pixel: [u8; 4], color: [u8; 3]) -> bool {
    pixel[3] > 0
        && pixel[0].abs_diff(color[0]) <= COLOR_TOLERANCE
        && pixel[1].abs_diff(color[1]) <= COLOR_TOLERANCE
        && pixel[2].abs_diff(color[2]) <= COLOR_TOLERANCE
}

/// A single decoded raster layer (RGBA8)
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainMask {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl TerrainMask {
    /// Decode from a tightly packed RGBA8 buffer
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8]) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(MaskError::BufferLength {
                expected,
                actual: bytes.len(),
            });
        }
        let pixels: &[[u8; 4]] =
            bytemuck::try_cast_slice(bytes).map_err(|_| MaskError::BufferLength {
                expected,
                actual: bytes.len(),
            })?;
        Ok(Self {
            width,
            height,
            pixels: pixels.to_vec(),
        })
    }

    /// Fully transparent mask
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    /// Paint a rectangle of mask pixels (clipped to the mask)
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, class: TerrainClass) {
        let [r, g, b] = class.color();
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y.min(self.height)..y_end {
            for px in x.min(self.width)..x_end {
                let idx = (py * self.width + px) as usize;
                self.pixels[idx] = [r, g, b, 255];
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at mask coordinates, `None` outside the mask
    pub fn pixel(&self, px: i64, py: i64) -> Option<[u8; 4]> {
        if px < 0 || py < 0 || px >= self.width as i64 || py >= self.height as i64 {
            return None;
        }
        self.pixels
            .get((py as usize) * self.width as usize + px as usize)
            .copied()
    }

    pub fn matches(&self, px: i64, py: i64, class: TerrainClass) -> bool {
        self.pixel(px, py)
            .is_some_and(|p| color_matches(p, class.color()))
    }
}

/// Every raster layer of a stage, sharing one world-to-mask mapping
#[derive(Debug, Clone, Default)]
pub struct StageTerrain {
    bounds: Rect,
    layers: HashMap<MaskLayer, TerrainMask>,
}

impl StageTerrain {
    /// Empty terrain over the given logical stage bounds
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            layers: HashMap::new(),
        }
    }

    pub fn with_layer(mut self, layer: MaskLayer, mask: TerrainMask) -> Self {
        self.insert_layer(layer, mask);
        self
    }

    pub fn insert_layer(&mut self, layer: MaskLayer, mask: TerrainMask) {
        self.layers.insert(layer, mask);
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Mask pixels per world pixel on each axis
    fn scale(&self, mask: &TerrainMask) -> Vec2 {
        if self.bounds.w <= 0.0 || self.bounds.h <= 0.0 {
            return Vec2::ONE;
        }
        Vec2::new(
            mask.width as f32 / self.bounds.w,
            mask.height as f32 / self.bounds.h,
        )
    }

    fn to_mask(&self, mask: &TerrainMask, world: Vec2) -> Vec2 {
        (world - Vec2::new(self.bounds.x, self.bounds.y)) * self.scale(mask)
    }

    fn mask_pixel_at(&self, mask: &TerrainMask, x: f32, y: f32) -> (i64, i64) {
        let m = self.to_mask(mask, Vec2::new(x, y));
        (m.x.floor() as i64, m.y.floor() as i64)
    }

    /// Classify a world point against the ground/wall/ceiling palette
    pub fn classify(&self, x: f32, y: f32, layer: MaskLayer) -> Surface {
        let Some(mask) = self.layers.get(&layer) else {
            return Surface::None;
        };
        let (px, py) = self.mask_pixel_at(mask, x, y);
        Surface::LOOKUP
            .iter()
            .find(|(class, _)| mask.matches(px, py, *class))
            .map_or(Surface::None, |(_, surface)| *surface)
    }

    /// Whether a world point belongs to a specific class
    pub fn is_class_member(&self, x: f32, y: f32, layer: MaskLayer, class: TerrainClass) -> bool {
        let Some(mask) = self.layers.get(&layer) else {
            return false;
        };
        let (px, py) = self.mask_pixel_at(mask, x, y);
        mask.matches(px, py, class)
    }

    /// World-space rect of a mask pixel
    fn world_pixel(&self, mask: &TerrainMask, px: i64, py: i64) -> Rect {
        let scale = self.scale(mask);
        let w = 1.0 / scale.x;
        let h = 1.0 / scale.y;
        Rect::new(
            self.bounds.x + px as f32 * w,
            self.bounds.y + py as f32 * h,
            w,
            h,
        )
    }

    /// Mask pixels covered by a half-open world rect, clipped to the mask
    fn pixel_span(&self, mask: &TerrainMask, rect: &Rect) -> (i64, i64, i64, i64) {
        let min = self.to_mask(mask, Vec2::new(rect.left(), rect.top()));
        let max = self.to_mask(mask, Vec2::new(rect.right(), rect.bottom()));
        (
            (min.x.floor() as i64).max(0),
            (min.y.floor() as i64).max(0),
            (max.x.ceil() as i64).min(mask.width as i64),
            (max.y.ceil() as i64).min(mask.height as i64),
        )
    }

    /// Every mask pixel covered by `rect` that belongs to one of `classes`,
    /// row by row, with its class and world-space rect
    pub fn touching<'a>(
        &'a self,
        rect: Rect,
        layer: MaskLayer,
        classes: &'a [TerrainClass],
    ) -> impl Iterator<Item = (TerrainClass, Rect)> + 'a {
        let mask = self.layers.get(&layer);
        let (x0, y0, x1, y1) = mask.map_or((0, 0, 0, 0), |m| self.pixel_span(m, &rect));
        mask.into_iter().flat_map(move |mask| {
            (y0..y1)
                .flat_map(move |py| (x0..x1).map(move |px| (px, py)))
                .filter_map(move |(px, py)| {
                    let class = classes.iter().find(|c| mask.matches(px, py, **c))?;
                    Some((*class, self.world_pixel(mask, px, py)))
                })
        })
    }

    /// Whether any mask pixel covered by `rect` belongs to one of `classes`
    pub fn rect_touches(&self, rect: &Rect, layer: MaskLayer, classes: &[TerrainClass]) -> bool {
        self.touching(*rect, layer, classes).next().is_some()
    }
}
