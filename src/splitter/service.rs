//! # 会话层
//!
//! ## 设计思路
//!
//! 页面上“先选图，再反复调整行列数”的交互在这里收敛为一个显式的会话对象：
//! 会话持有当前位图与当前网格，调整参数时整体重算并替换网格，不做增量更新。
//!
//! ## 实现思路
//!
//! - `load`：解码新图片，成功后替换位图并清空旧网格，再按上一次的参数尽力切分；
//!   旧参数不适用于新图片时只保留位图，等待调用方换参数 `retile`。
//! - `retile`：基于当前位图重新切分，成功后替换网格。
//! - 解码或重新切分失败时保持原状态不变，用户可以直接换参数重试。
//! - 所有修改都需要 `&mut self`，单一调用方即可保证串行，不需要加锁。

use super::{DecodedBitmap, ImageSource, ImageSplitter, SplitError, TileGrid, TileSpec};

/// 图片切分会话。
#[derive(Debug, Default)]
pub struct SplitSession {
    splitter: ImageSplitter,
    bitmap: Option<DecodedBitmap>,
    grid: Option<TileGrid>,
    spec: TileSpec,
}

impl SplitSession {
    pub fn new(splitter: ImageSplitter) -> Self {
        Self {
            splitter,
            bitmap: None,
            grid: None,
            spec: TileSpec::default(),
        }
    }

    pub fn splitter(&self) -> &ImageSplitter {
        &self.splitter
    }

    /// 加载新图片，并尝试按上一次的切分参数生成网格。
    ///
    /// 只有解码失败才返回错误；切分失败时网格为空，位图照常替换。
    /// 返回解码后的位图，调用方可用于整图预览。
    pub async fn load(&mut self, source: ImageSource) -> Result<&DecodedBitmap, SplitError> {
        let bitmap = self.splitter.decode(source).await?;

        self.grid = match self.splitter.compute_tiles(&bitmap, &self.spec) {
            Ok(grid) => Some(grid),
            Err(e) => {
                log::warn!("⚠️ 上一次的切分参数不适用于新图片，等待重新切分：{}", e);
                None
            }
        };
        Ok(self.bitmap.insert(bitmap))
    }

    /// 以新的切分参数重新生成网格。
    pub fn retile(&mut self, spec: TileSpec) -> Result<&TileGrid, SplitError> {
        let bitmap = self
            .bitmap
            .as_ref()
            .ok_or_else(|| SplitError::UnsupportedFormat("尚未加载图片".to_string()))?;

        let grid = self.splitter.compute_tiles(bitmap, &spec)?;
        log::debug!("🔁 重新切分 - {} 块", grid.len());

        self.spec = spec;
        Ok(self.grid.insert(grid))
    }

    pub fn bitmap(&self) -> Option<&DecodedBitmap> {
        self.bitmap.as_ref()
    }

    pub fn grid(&self) -> Option<&TileGrid> {
        self.grid.as_ref()
    }

    /// 当前生效的切分参数。
    pub fn spec(&self) -> TileSpec {
        self.spec
    }

    pub fn clear(&mut self) {
        self.bitmap = None;
        self.grid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::SplitConfig;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode");
        cursor.into_inner()
    }

    #[tokio::test]
    async fn retile_replaces_previous_grid() {
        let mut session = SplitSession::new(ImageSplitter::new(SplitConfig::default()));
        session
            .load(ImageSource::payload(png(60, 40), "image/png"))
            .await
            .expect("load");
        assert_eq!(session.grid().map(TileGrid::len), Some(1));

        session.retile(TileSpec::grid(2, 3)).expect("retile");
        assert_eq!(session.grid().map(TileGrid::len), Some(6));
        assert_eq!(session.spec(), TileSpec::grid(2, 3));

        session.retile(TileSpec::grid(4, 4)).expect("retile again");
        assert_eq!(session.grid().map(TileGrid::len), Some(16));
    }

    #[tokio::test]
    async fn failed_retile_keeps_state() {
        let mut session = SplitSession::default();
        session
            .load(ImageSource::payload(png(4, 4), "image/png"))
            .await
            .expect("load");
        session.retile(TileSpec::grid(2, 2)).expect("retile");

        let result = session.retile(TileSpec::grid(1, 9));
        assert!(matches!(result, Err(SplitError::DegenerateTile(_))));
        assert_eq!(session.grid().map(TileGrid::len), Some(4));
        assert_eq!(session.spec(), TileSpec::grid(2, 2));
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_bitmap() {
        let mut session = SplitSession::default();
        session
            .load(ImageSource::payload(png(8, 8), "image/png"))
            .await
            .expect("load");

        let result = session
            .load(ImageSource::payload(b"hello".to_vec(), "text/plain"))
            .await;
        assert!(matches!(result, Err(SplitError::UnsupportedFormat(_))));
        assert_eq!(session.bitmap().map(DecodedBitmap::width), Some(8));
    }

    #[tokio::test]
    async fn smaller_image_replaces_bitmap_even_if_previous_spec_no_longer_fits() {
        let mut session = SplitSession::default();
        session
            .load(ImageSource::payload(png(100, 100), "image/png"))
            .await
            .expect("load large");
        session.retile(TileSpec::grid(10, 10)).expect("retile");
        assert_eq!(session.grid().map(TileGrid::len), Some(100));

        let bitmap = session
            .load(ImageSource::payload(png(4, 4), "image/png"))
            .await
            .expect("load small");
        assert_eq!((bitmap.width(), bitmap.height()), (4, 4));

        assert_eq!(
            session.bitmap().map(|b| (b.width(), b.height())),
            Some((4, 4))
        );
        assert!(session.grid().is_none());
        assert_eq!(session.spec(), TileSpec::grid(10, 10));

        session.retile(TileSpec::grid(2, 2)).expect("retile small");
        assert_eq!(session.grid().map(TileGrid::len), Some(4));
    }

    #[test]
    fn retile_without_image_fails() {
        let mut session = SplitSession::default();
        assert!(session.retile(TileSpec::grid(2, 2)).is_err());
        session.clear();
        assert!(session.bitmap().is_none());
    }
}
