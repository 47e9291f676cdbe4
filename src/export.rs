//! 分块导出模块
//!
//! # 设计思路
//!
//! 统一管理分块图片的保存路径与文件命名，并在目录不存在时自动创建。
//! 文件名约定为 `<前缀><从 1 开始的序号>.png`，前缀为空时使用配置中的默认值。
//!
//! # 实现思路
//!
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 按网格的行优先顺序依次写出，返回写出的路径列表。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::splitter::{SplitConfig, SplitError, TileGrid};

/// 导出结果信息
#[derive(Debug, Clone, Serialize)]
pub struct ExportInfo {
    pub path: String,
    pub file_count: u64,
    pub total_size: u64,
}

/// 生成单个分块的文件名。
///
/// # 参数
/// * `base` - 已确定的文件名前缀（见 [`SplitConfig::base_name_or_default`]）
/// * `index` - 分块在行优先顺序下的下标（从 0 开始）
///
/// # 示例
/// ```rust
/// use image_splitter::export::piece_file_name;
///
/// assert_eq!(piece_file_name("avatar", 0), "avatar1.png");
/// assert_eq!(piece_file_name("pice", 5), "pice6.png");
/// ```
pub fn piece_file_name(base: &str, index: usize) -> String {
    format!("{}{}.png", base, index + 1)
}

/// 前缀只能是文件名的一部分，不能带目录。
fn validate_base_name(base: &str) -> Result<(), SplitError> {
    if base.is_empty() {
        return Err(SplitError::FileSystem("文件名前缀为空".to_string()));
    }
    if base.chars().any(|c| std::path::is_separator(c) || c == '/' || c == '\\') {
        return Err(SplitError::FileSystem(format!(
            "文件名前缀不能包含路径分隔符：{}",
            base
        )));
    }
    Ok(())
}

/// 获取（必要时创建）导出目录。
///
/// # 返回
/// - `Ok(PathBuf)` — 可用的导出目录
/// - `Err(SplitError::FileSystem)` — 路径已被文件占用或无法创建
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf, SplitError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(SplitError::FileSystem(format!(
                "导出路径不是目录：{}",
                dir.display()
            )));
        }
        return Ok(dir.to_path_buf());
    }

    fs::create_dir_all(dir).map_err(|e| {
        SplitError::FileSystem(format!("创建导出目录 '{}' 失败: {}", dir.display(), e))
    })?;
    Ok(dir.to_path_buf())
}

/// 将网格中的全部分块写入目录。
///
/// `name` 为空或全是空白时使用 `config.default_base_name`。
///
/// # 返回
/// 行优先顺序的文件路径列表。
pub fn save_grid(
    grid: &TileGrid,
    dir: &Path,
    name: Option<&str>,
    config: &SplitConfig,
) -> Result<Vec<PathBuf>, SplitError> {
    let base = config.base_name_or_default(name);
    validate_base_name(base)?;

    let dir = ensure_output_dir(dir)?;
    let mut written = Vec::with_capacity(grid.len());

    for piece in grid {
        let file_path = dir.join(piece_file_name(base, piece.index()));
        fs::write(&file_path, piece.png_bytes()).map_err(|e| {
            SplitError::FileSystem(format!("保存分块 '{}' 失败: {}", file_path.display(), e))
        })?;
        written.push(file_path);
    }

    log::info!("💾 已导出 {} 个分块到 {}", written.len(), dir.display());
    Ok(written)
}

/// 汇总导出结果（路径 + 文件数 + 总大小）。
pub fn export_info(dir: &Path, written: &[PathBuf]) -> ExportInfo {
    let total_size = written
        .iter()
        .filter_map(|path| fs::metadata(path).ok())
        .map(|metadata| metadata.len())
        .sum();

    ExportInfo {
        path: dir.to_string_lossy().to_string(),
        file_count: written.len() as u64,
        total_size,
    }
}
