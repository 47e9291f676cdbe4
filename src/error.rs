//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，供命令行入口统一返回，
//! 替代各处分散的 `.map_err(|e| e.to_string())`、`expect()` 等不一致模式。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `SplitError` 与 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于以 JSON 输出给上层脚本。

use serde::Serialize;

use crate::splitter::SplitError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片处理流水线错误（加载 / 解码 / 切分 / 导出）
    #[error("{0}")]
    Split(#[from] SplitError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件读取或解析失败
    #[error("设置文件错误: {0}")]
    Settings(String),
}

impl AppError {
    /// 稳定的错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Split(err) => err.code(),
            Self::Io(_) => "io",
            Self::Settings(_) => "settings",
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
