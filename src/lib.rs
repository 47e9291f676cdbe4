//! # 图片切分工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 调用方 (CLI / 其他程序)                   │
//! │   输入：二进制文件 / Data URL / URL / 路径 / HTML 片段     │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓ ImageSource + TileSpec
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↓            核心 (Rust)                            │
//! │                                                          │
//! │  ┌─ splitter ─── 加载·解码·切分                           │
//! │  │   ├─ loader    MIME / 体积 / 签名校验                  │
//! │  │   ├─ decoder   image 解码 + 像素限制                   │
//! │  │   └─ tiler     行优先裁剪 + PNG 编码                    │
//! │  │                                                       │
//! │  ├─ export ────── 分块命名与落盘                          │
//! │  ├─ settings ──── JSON 设置文件                           │
//! │  └─ error ─────── AppError (统一错误类型)                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，命令行入口的返回类型 |
//! | [`splitter`] | 从各类来源加载图片、解码并切分为 PNG 分块 |
//! | [`export`] | 分块文件命名（`<前缀><序号>.png`）与保存 |
//! | [`settings`] | 设置文件的读取与写回 |

pub mod error;
pub mod export;
pub mod settings;
pub mod splitter;
