//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载“加载 → 解码 → 切分 → 导出”链路中的所有错误来源，
//! 避免字符串拼接式错误处理。通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 所有错误都是同步返回、可直接展示给用户的，不存在需要重试的瞬时错误：
//! 用户换一张图或换一组行列参数重新来过即可。

/// 图片切分统一错误类型。
///
/// 该类型会在二进制入口被上转为 `AppError`，最终以提示文案展示给用户。
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    /// 输入不是可识别的图片，或无法从 HTML 片段中提取图片地址。
    #[error("图片格式不合法：{0}")]
    UnsupportedFormat(String),

    /// 输入体积超过上限（默认 2MB）。
    #[error("图片体积超限：{0}")]
    PayloadTooLarge(String),

    /// 计算出的分块宽或高为 0。
    #[error("分块尺寸无效：{0}")]
    DegenerateTile(String),

    /// 底层编解码器失败（损坏字节、截断数据流、编码失败）。
    #[error("解码错误：{0}")]
    DecodeFailed(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("文件错误：{0}")]
    FileSystem(String),
}

impl SplitError {
    /// 稳定的错误码，供 CLI 输出与日志检索。
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::DegenerateTile(_) => "degenerate_tile",
            Self::DecodeFailed(_) => "decode_failed",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::FileSystem(_) => "file_system",
        }
    }

    /// 错误发生的流水线阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_)
            | Self::PayloadTooLarge(_)
            | Self::Network(_)
            | Self::Timeout(_) => "load",
            Self::DecodeFailed(_) | Self::ResourceLimit(_) => "decode",
            Self::DegenerateTile(_) => "tile",
            Self::FileSystem(_) => "export",
        }
    }
}
