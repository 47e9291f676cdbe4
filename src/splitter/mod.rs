//! # 图片切分模块（splitter）
//!
//! ## 设计思路
//!
//! 该模块将“来源识别 → 加载校验 → 解码 → 切分编码”按职责拆分为多个子模块，
//! 避免单文件膨胀与耦合。展示与保存不在本模块内，由调用方（CLI / `export`）负责。
//!
//! - `service`：会话状态（当前位图 + 当前网格）
//! - `handler`：编排整条处理流水线
//! - `loader`：负责二进制 / HTML 片段 / Data URL / URL / 文件加载与安全校验
//! - `decoder`：负责解码与像素限制
//! - `tiler`：负责网格计算与分块 PNG 编码
//! - `data_url`：Data URL 编解码
//! - `config/error/source`：配置、错误、数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 调用方（CLI / 会话）
//!    ↓
//! service.rs（保存当前位图，参数变化时整体重算）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + MIME / 体积 / 签名校验）
//!    ├─ decoder.rs（解码 + 像素限制）
//!    └─ tiler.rs（行列解析 + 行优先裁剪 + PNG 编码）
//!    ↓
//! 返回 TileGrid 或 SplitError
//! ```

mod config;
pub mod data_url;
mod decoder;
mod error;
mod handler;
mod loader;
mod service;
mod source;
pub mod tiler;

pub use config::{
    DEFAULT_BASE_NAME, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_PIECES, DegeneratePolicy, SplitConfig,
};
pub use error::SplitError;
pub use handler::ImageSplitter;
pub use loader::extract_image_reference;
pub use service::SplitSession;
pub use source::{
    DecodedBitmap, ImageSource, PieceArtifact, TileGrid, TileLayout, TileRect, TileSpec,
};
pub use tiler::{compute_tiles, resolve_layout};
