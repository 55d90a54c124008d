//! File-backed bitmap provider.

use super::{BitmapProvider, DecodeContext, DecodeError};
use crate::bitmap::Bitmap;
use crate::tile::Tile;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Path template for tile images.
///
/// Placeholders `{col}` (or `{column}`) and `{row}` are replaced with the
/// tile's grid position, for example `"levels/1000/{col}_{row}.png"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePattern(String);

impl TilePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute the grid position into the template.
    pub fn resolve(&self, column: u32, row: u32) -> String {
        let column = column.to_string();
        self.0
            .replace("{column}", &column)
            .replace("{col}", &column)
            .replace("{row}", &row.to_string())
    }
}

impl fmt::Display for TilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loads tile images from files under a root directory.
///
/// Each tile's data token is expected to be a [`TilePattern`]; tiles without
/// one fall back to the provider's default pattern, if any. Images may be
/// smaller than the tile (edge tiles); the bitmap keeps the image's size.
#[derive(Debug, Clone)]
pub struct FileBitmapProvider {
    root: PathBuf,
    default_pattern: Option<TilePattern>,
}

impl FileBitmapProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_pattern: None,
        }
    }

    /// Pattern used for tiles that carry no data token.
    pub fn with_default_pattern(mut self, pattern: TilePattern) -> Self {
        self.default_pattern = Some(pattern);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the image path for `tile`.
    pub fn path_for(&self, tile: &Tile) -> Result<PathBuf, DecodeError> {
        let pattern = tile
            .data::<TilePattern>()
            .or(self.default_pattern.as_ref())
            .ok_or(DecodeError::MissingData {
                column: tile.column(),
                row: tile.row(),
            })?;
        Ok(self.root.join(pattern.resolve(tile.column(), tile.row())))
    }
}

impl BitmapProvider for FileBitmapProvider {
    fn decode(&self, tile: &Tile, context: &DecodeContext) -> Result<Bitmap, DecodeError> {
        let path = self.path_for(tile)?;
        trace!(path = %path.display(), "Loading tile image");

        let image = image::open(&path)
            .map_err(|e| DecodeError::from_image(path.clone(), e))?
            .to_rgba8();
        let (width, height) = image.dimensions();

        let mut bitmap = context.allocate(width, height)?;
        bitmap.copy_from_rgba8(image.as_raw());
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::BitmapPool;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context() -> DecodeContext {
        DecodeContext::new(Arc::new(BitmapPool::default()))
    }

    #[test]
    fn test_pattern_resolution() {
        let pattern = TilePattern::new("tiles/{col}_{row}.png");
        assert_eq!(pattern.resolve(3, 7), "tiles/3_7.png");

        let pattern = TilePattern::new("{row}/{column}.jpg");
        assert_eq!(pattern.resolve(1, 2), "2/1.jpg");
    }

    #[test]
    fn test_decode_reads_image_from_disk() {
        let temp = TempDir::new().unwrap();
        let image = image::RgbaImage::from_pixel(16, 8, image::Rgba([0, 0, 255, 255]));
        image.save(temp.path().join("2_1.png")).unwrap();

        let provider = FileBitmapProvider::new(temp.path());
        let tile = Tile::new(2, 1, 16, 16, 1.0).with_data(TilePattern::new("{col}_{row}.png"));

        let bitmap = provider.decode(&tile, &context()).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (16, 8));
        assert_eq!(bitmap.pixmap().pixel(0, 0).unwrap().blue(), 255);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let provider = FileBitmapProvider::new(temp.path())
            .with_default_pattern(TilePattern::new("{col}_{row}.png"));
        let tile = Tile::new(9, 9, 16, 16, 1.0);

        let err = provider.decode(&tile, &context()).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_tile_without_pattern_is_missing_data() {
        let provider = FileBitmapProvider::new("/nonexistent");
        let tile = Tile::new(0, 0, 16, 16, 1.0);

        let err = provider.decode(&tile, &context()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingData { column: 0, row: 0 }));
    }

    #[test]
    fn test_tile_pattern_overrides_default() {
        let provider = FileBitmapProvider::new("/root")
            .with_default_pattern(TilePattern::new("default/{col}.png"));
        let tile = Tile::new(4, 5, 16, 16, 1.0).with_data(TilePattern::new("own/{row}.png"));

        assert_eq!(
            provider.path_for(&tile).unwrap(),
            PathBuf::from("/root/own/5.png")
        );
    }
}
