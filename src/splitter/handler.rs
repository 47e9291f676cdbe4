//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageSplitter` 只负责流程编排与配置管理，不关心结果如何展示或保存。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 按来源加载原始字节
//! 3. 解码为位图（此时即可做整图预览）
//! 4. 按切分参数生成分块网格
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<SplitConfig>>` 支持运行时调整。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录 `load/decode/tile/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::{
    DecodedBitmap, DegeneratePolicy, ImageSource, SplitConfig, SplitError, TileGrid, TileSpec,
    tiler,
};

/// 图片切分器。
#[derive(Debug, Clone)]
pub struct ImageSplitter {
    pub(super) config: Arc<RwLock<SplitConfig>>,
}

impl Default for ImageSplitter {
    fn default() -> Self {
        Self::new(SplitConfig::default())
    }
}

impl ImageSplitter {
    /// 根据初始配置创建切分器。
    ///
    /// # 示例
    /// ```rust
    /// use image_splitter::splitter::{ImageSplitter, SplitConfig};
    ///
    /// let splitter = ImageSplitter::new(SplitConfig::default());
    /// assert_eq!(splitter.config_snapshot()?.max_file_size, 2 * 1024 * 1024);
    /// # Ok::<(), image_splitter::splitter::SplitError>(())
    /// ```
    pub fn new(config: SplitConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<SplitConfig, SplitError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| SplitError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 整体替换配置，替换前先做取值校验。
    pub fn set_config(&self, config: SplitConfig) -> Result<(), SplitError> {
        config.validate()?;
        let mut current = self
            .config
            .write()
            .map_err(|_| SplitError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        *current = config;
        log::info!("⚙️ 已更新切分配置");
        Ok(())
    }

    /// 切换分块尺寸为 0 时的处理策略。
    pub fn set_degenerate_policy(&self, policy: DegeneratePolicy) -> Result<(), SplitError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| SplitError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.degenerate_policy = policy;
        log::info!("⚙️ 已切换分块策略：{}", policy.as_str());
        Ok(())
    }

    /// 加载并解码图片。
    ///
    /// 返回的位图可立即用于整图预览，与后续切分互不依赖。
    pub async fn decode(&self, source: ImageSource) -> Result<DecodedBitmap, SplitError> {
        let config = self.config_snapshot()?;
        self.decode_with(source, &config).await
    }

    async fn decode_with(
        &self,
        source: ImageSource,
        config: &SplitConfig,
    ) -> Result<DecodedBitmap, SplitError> {
        let load_start = Instant::now();
        let raw = self.load_source(source, config).await?;
        let load_elapsed = load_start.elapsed();

        let decode_start = Instant::now();
        let bitmap = Self::decode_raw(raw, config)?;
        log::debug!(
            "⏱️ load={}ms decode={}ms",
            load_elapsed.as_millis(),
            decode_start.elapsed().as_millis()
        );

        Ok(bitmap)
    }

    /// 按当前配置切分已解码的位图。
    pub fn compute_tiles(
        &self,
        bitmap: &DecodedBitmap,
        spec: &TileSpec,
    ) -> Result<TileGrid, SplitError> {
        let config = self.config_snapshot()?;
        tiler::compute_tiles_limited(bitmap, spec, config.degenerate_policy, config.max_pieces)
    }

    /// 处理主入口：加载、解码并切分。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_splitter::splitter::{ImageSource, ImageSplitter, TileSpec};
    ///
    /// # async fn demo() -> Result<(), image_splitter::splitter::SplitError> {
    /// let splitter = ImageSplitter::default();
    /// let (bitmap, grid) = splitter
    ///     .split(ImageSource::reference("photo.png"), &TileSpec::grid(2, 3))
    ///     .await?;
    /// assert_eq!(grid.len(), 6);
    /// # let _ = bitmap;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn split(
        &self,
        source: ImageSource,
        spec: &TileSpec,
    ) -> Result<(DecodedBitmap, TileGrid), SplitError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let bitmap = self.decode_with(source, &config).await?;
        let decode_elapsed = decode_start.elapsed();

        let tile_start = Instant::now();
        let grid = tiler::compute_tiles_limited(
            &bitmap,
            spec,
            config.degenerate_policy,
            config.max_pieces,
        )?;
        let tile_elapsed = tile_start.elapsed();

        log::info!(
            "✅ 图片切分完成 - load+decode={}ms tile={}ms total={}ms",
            decode_elapsed.as_millis(),
            tile_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok((bitmap, grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[tokio::test]
    async fn split_payload_end_to_end() {
        let splitter = ImageSplitter::default();
        let source = ImageSource::payload(create_png_bytes(100, 100), "image/png");

        let (bitmap, grid) = splitter
            .split(source, &TileSpec::grid(2, 3))
            .await
            .expect("split should succeed");

        assert_eq!((bitmap.width(), bitmap.height()), (100, 100));
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.layout().piece_width, 33);
        assert_eq!(grid.layout().piece_height, 50);
    }

    #[tokio::test]
    async fn split_data_url_reference() {
        let splitter = ImageSplitter::default();
        let url = crate::splitter::data_url::encode("image/png", &create_png_bytes(20, 10));

        let (_, grid) = splitter
            .split(ImageSource::reference(url), &TileSpec::tile_size(8, 4))
            .await
            .expect("split should succeed");

        assert_eq!((grid.layout().columns, grid.layout().rows), (3, 3));
        assert_eq!(grid.len(), 9);
    }

    #[tokio::test]
    async fn policy_switch_applies_to_next_request() {
        let splitter = ImageSplitter::default();
        let bitmap = splitter
            .decode(ImageSource::payload(create_png_bytes(3, 3), "image/png"))
            .await
            .expect("decode");

        assert!(matches!(
            splitter.compute_tiles(&bitmap, &TileSpec::grid(4, 4)),
            Err(SplitError::DegenerateTile(_))
        ));

        splitter
            .set_degenerate_policy(DegeneratePolicy::Clamp)
            .expect("set policy");
        let grid = splitter
            .compute_tiles(&bitmap, &TileSpec::grid(4, 4))
            .expect("clamped tiles");
        assert_eq!(grid.len(), 9);
    }

    #[test]
    fn set_config_rejects_invalid_values() {
        let splitter = ImageSplitter::default();
        let mut config = SplitConfig::default();
        config.max_file_size = 0;

        assert!(splitter.set_config(config).is_err());
        assert_eq!(
            splitter.config_snapshot().expect("snapshot").max_file_size,
            2 * 1024 * 1024
        );
    }
}
