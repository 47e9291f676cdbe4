//! # 解码模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//! 像素解码本身交给 `image` crate，本模块不重新实现任何编解码器。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限 / 内存上限快速拒绝
//! 3. 完整解码
//! 4. 转换 RGBA，并校验字节长度一致性

use image::{GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

use super::source::RawImageData;
use super::{DecodedBitmap, ImageSplitter, SplitConfig, SplitError};

impl ImageSplitter {
    /// 将原始字节解码为位图。
    pub(crate) fn decode_raw(
        raw: RawImageData,
        config: &SplitConfig,
    ) -> Result<DecodedBitmap, SplitError> {
        let format: ImageFormat = image::guess_format(&raw.bytes)
            .map_err(|e| SplitError::UnsupportedFormat(format!("不支持的图片格式：{}", e)))?;

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory_with_format(&raw.bytes, format)
            .map_err(|e| SplitError::DecodeFailed(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(SplitError::DecodeFailed(format!(
                "图片尺寸无效：{}x{}",
                width, height
            )));
        }
        Self::validate_pixel_limits(config, width, height)?;

        let pixels = decoded.to_rgba8();
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| SplitError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

        if pixels.as_raw().len() != expected_len {
            return Err(SplitError::DecodeFailed("解码后像素数据长度异常".to_string()));
        }

        log::info!(
            "✅ 图片解码成功 - 来源: {} 格式: {:?} 尺寸: {}x{}",
            raw.source_hint,
            format,
            width,
            height
        );

        Ok(DecodedBitmap {
            pixels,
            format: Some(format),
            source_hint: raw.source_hint,
        })
    }

    /// 仅通过内存中的图片头信息读取宽高。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), SplitError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| SplitError::UnsupportedFormat(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| SplitError::DecodeFailed(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_pixel_limits(config: &SplitConfig, width: u32, height: u32) -> Result<(), SplitError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| SplitError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(SplitError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &SplitConfig,
        width: u32,
        height: u32,
    ) -> Result<(), SplitError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| SplitError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(SplitError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}
