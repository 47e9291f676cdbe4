//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义（二进制文件 / 字符串引用）
//! - `RawImageData` 表示已加载但未解码的字节
//! - `DecodedBitmap` 表示解码后的像素网格（固有尺寸，与显示缩放无关）
//! - `TileSpec` / `TileLayout` / `TileGrid` 描述切分参数与结果

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use super::SplitError;
use super::data_url;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 上传或拖入的二进制文件，附带声明的 MIME 类型与体积。
    Payload {
        bytes: Vec<u8>,
        mime: Option<String>,
        size: Option<u64>,
    },
    /// 字符串引用：Data URL、网络地址、本地路径，或包含图片地址的 HTML 片段。
    Reference(String),
}

impl ImageSource {
    /// 以实际字节长度作为声明体积构造二进制来源。
    pub fn payload(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        let size = bytes.len() as u64;
        Self::Payload {
            bytes,
            mime: Some(mime.into()),
            size: Some(size),
        }
    }

    pub fn reference(reference: impl Into<String>) -> Self {
        Self::Reference(reference.into())
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 解码后的位图。
///
/// 由解码阶段创建，切分阶段只读访问。
#[derive(Debug, Clone)]
pub struct DecodedBitmap {
    pub(crate) pixels: RgbaImage,
    pub(crate) format: Option<ImageFormat>,
    pub(crate) source_hint: &'static str,
}

impl DecodedBitmap {
    /// 直接由 RGBA 像素构造位图，便于调用方与测试绕过编解码器。
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            format: None,
            source_hint: "memory",
        }
    }

    /// 固有宽度（像素）。
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// 固有高度（像素）。
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// 源文件格式（内存构造时为 `None`）。
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn source_hint(&self) -> &'static str {
        self.source_hint
    }

    /// 将整张图重新编码为 PNG，用于切分前的整图预览。
    pub fn encode_png(&self) -> Result<Vec<u8>, SplitError> {
        encode_png(&self.pixels)
    }

    /// 整图预览的 Data URL 形式。
    pub fn to_data_url(&self) -> Result<String, SplitError> {
        Ok(data_url::encode("image/png", &self.encode_png()?))
    }
}

/// 切分参数。
///
/// `tile_width_px` 存在时覆盖 `columns`，`tile_height_px` 存在时覆盖 `rows`。
/// `Some(0)` 与 `None` 等价。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    pub rows: u32,
    pub columns: u32,
    pub tile_width_px: Option<u32>,
    pub tile_height_px: Option<u32>,
}

impl Default for TileSpec {
    fn default() -> Self {
        Self {
            rows: 1,
            columns: 1,
            tile_width_px: None,
            tile_height_px: None,
        }
    }
}

impl TileSpec {
    /// 按行列数切分。
    pub fn grid(rows: u32, columns: u32) -> Self {
        Self {
            rows,
            columns,
            ..Self::default()
        }
    }

    /// 按目标分块像素尺寸切分。
    pub fn tile_size(tile_width_px: u32, tile_height_px: u32) -> Self {
        Self {
            tile_width_px: Some(tile_width_px),
            tile_height_px: Some(tile_height_px),
            ..Self::default()
        }
    }
}

/// 分块在源图中的像素矩形。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 解析后的网格几何信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub rows: u32,
    pub columns: u32,
    pub piece_width: u32,
    pub piece_height: u32,
}

impl TileLayout {
    pub fn piece_count(&self) -> u64 {
        self.rows as u64 * self.columns as u64
    }

    /// 按行优先顺序列出所有分块矩形。
    pub fn rects(&self) -> impl Iterator<Item = TileRect> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.columns).map(move |column| TileRect {
                x: column * self.piece_width,
                y: row * self.piece_height,
                width: self.piece_width,
                height: self.piece_height,
            })
        })
    }

    /// 被保留的区域 `(0, 0, columns * w, rows * h)`，其余边缘像素被丢弃。
    pub fn covered_extent(&self) -> (u32, u32) {
        (self.columns * self.piece_width, self.rows * self.piece_height)
    }
}

/// 单个分块产物：独立可用的 PNG 图片及其位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceArtifact {
    pub(crate) index: usize,
    pub(crate) row: u32,
    pub(crate) column: u32,
    pub(crate) rect: TileRect,
    pub(crate) png: Vec<u8>,
}

impl PieceArtifact {
    /// 行优先顺序下的下标（从 0 开始）。
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn rect(&self) -> TileRect {
        self.rect
    }

    /// PNG 编码后的字节。
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// `data:image/png;base64,...`，可直接作为 `<img src>` 使用。
    pub fn to_data_url(&self) -> String {
        data_url::encode("image/png", &self.png)
    }
}

/// 切分结果：行优先排列的分块序列。
///
/// 一经生成不可修改；参数变化时整体重新生成。
#[derive(Debug, Clone)]
pub struct TileGrid {
    pub(crate) layout: TileLayout,
    pub(crate) pieces: Vec<PieceArtifact>,
}

impl TileGrid {
    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    pub fn pieces(&self) -> &[PieceArtifact] {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PieceArtifact> {
        self.pieces.iter()
    }

    /// 按行、列取出分块。
    pub fn get(&self, row: u32, column: u32) -> Option<&PieceArtifact> {
        if row >= self.layout.rows || column >= self.layout.columns {
            return None;
        }
        let index = row as usize * self.layout.columns as usize + column as usize;
        self.pieces.get(index)
    }
}

impl<'a> IntoIterator for &'a TileGrid {
    type Item = &'a PieceArtifact;
    type IntoIter = std::slice::Iter<'a, PieceArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}

/// 将 RGBA 像素编码为独立 PNG。
pub(crate) fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, SplitError> {
    let mut cursor = Cursor::new(Vec::new());
    pixels
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| SplitError::DecodeFailed(format!("PNG 编码失败：{}", e)))?;
    Ok(cursor.into_inner())
}
