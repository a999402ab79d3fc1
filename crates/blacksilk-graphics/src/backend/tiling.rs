//! CPU tiling for tile-based operations.
//!
//! Counts follow `floor(dim / tile_size) + 1` per axis. When a dimension is
//! an exact multiple of the tile size the last tile along that axis is
//! clipped to zero size and processed as a no-op.

use blacksilk_core::Rect32I;

/// Tile edge length used by CPU kernels.
pub const TILE_SIZE: u32 = 1024;

/// Tiles along the x axis of `area`.
#[inline]
pub fn horizontal_tile_count(area: Rect32I, tile_size: u32) -> u32 {
    area.width.max(0) as u32 / tile_size.max(1) + 1
}

/// Tiles along the y axis of `area`.
#[inline]
pub fn vertical_tile_count(area: Rect32I, tile_size: u32) -> u32 {
    area.height.max(0) as u32 / tile_size.max(1) + 1
}

/// Sum of horizontal and vertical tile counts.
///
/// ```rust
/// use blacksilk_core::Rect32I;
/// use blacksilk_graphics::backend::tiling::tile_count_for_rectangle;
///
/// assert_eq!(tile_count_for_rectangle(Rect32I::from_size(2048, 1024), 1024), 5);
/// ```
#[inline]
pub fn tile_count_for_rectangle(area: Rect32I, tile_size: u32) -> u32 {
    horizontal_tile_count(area, tile_size) + vertical_tile_count(area, tile_size)
}

/// Tile grid covering `area`, row-major, clipped to the area.
///
/// The grid is `horizontal x vertical` tiles; trailing tiles may be empty.
pub fn tiles_for_rectangle(area: Rect32I, tile_size: u32) -> Vec<Rect32I> {
    let ts = tile_size.max(1) as i32;
    let cols = horizontal_tile_count(area, tile_size) as i32;
    let rows = vertical_tile_count(area, tile_size) as i32;

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let x = area.x + col * ts;
            let y = area.y + row * ts;
            let w = ts.min(area.right() - x).max(0);
            let h = ts.min(area.bottom() - y).max(0);
            tiles.push(Rect32I::new(x, y, w, h));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_counts() {
        let area = Rect32I::from_size(2048, 1024);
        assert_eq!(horizontal_tile_count(area, TILE_SIZE), 3);
        assert_eq!(vertical_tile_count(area, TILE_SIZE), 2);
        assert_eq!(tile_count_for_rectangle(area, TILE_SIZE), 5);
        assert_eq!(tile_count_for_rectangle(Rect32I::from_size(100, 100), TILE_SIZE), 2);
    }

    #[test]
    fn test_tiles_cover_area() {
        let area = Rect32I::new(10, 20, 2500, 1024);
        let tiles = tiles_for_rectangle(area, TILE_SIZE);
        assert_eq!(tiles.len(), 3 * 2);
        let covered: u64 = tiles.iter().map(|t| t.area()).sum();
        assert_eq!(covered, area.area());
        assert_eq!(tiles[2], Rect32I::new(10 + 2048, 20, 452, 1024));
        // exact multiple leaves an empty trailing row
        assert!(tiles[3..].iter().all(|t| t.is_empty()));
    }
}
