//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `SplitConfig`，保证运行时行为可观测、可调整、可测试。
//! 页面上原本散落在各个输入框里的值（行数、列数、分块尺寸）属于单次请求参数，
//! 放在 `TileSpec` 中；这里只保留跨请求稳定的阈值与策略。
//!
//! ## 实现思路
//!
//! - `Default` 提供与原页面一致的默认值（2MB 上限、下载文件名前缀 `pice`）。
//! - 派生 `serde`，配合 `#[serde(default)]` 支持从 JSON 设置文件做局部覆盖。
//! - `DegeneratePolicy` 决定行列数超过像素数时是报错还是收缩。

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SplitError;

/// 上传图片的默认体积上限（2MB）。
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// 下载文件名的默认前缀。
pub const DEFAULT_BASE_NAME: &str = "pice";

/// 单次切分默认允许的最大分块数。
pub const DEFAULT_MAX_PIECES: u64 = 10_000;

/// 分块宽或高为 0 时的处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// 直接返回 `SplitError::DegenerateTile`。
    #[default]
    Fail,
    /// 将列数收缩到不超过宽度、行数收缩到不超过高度。
    Clamp,
}

impl FromStr for DegeneratePolicy {
    type Err = SplitError;

    /// 从命令行等外部字符串解析策略，大小写不敏感。
    fn from_str(policy: &str) -> Result<Self, Self::Err> {
        match policy.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "clamp" => Ok(Self::Clamp),
            other => Err(SplitError::UnsupportedFormat(format!(
                "未知分块策略：{}（可选：fail / clamp）",
                other
            ))),
        }
    }
}

impl DegeneratePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Clamp => "clamp",
        }
    }
}

/// 图片切分配置。
///
/// 字段覆盖了加载、解码、切分、导出四个阶段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// 输入图片允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 网络下载总超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 下载分块读取超时时间（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// 是否允许访问内网或本地地址（默认关闭，防 SSRF）。
    pub allow_private_network: bool,
    /// 是否解析域名并拒绝解析到内网的主机（默认开启）。
    pub resolve_dns_for_url_safety: bool,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 单次切分允许产生的最大分块数。
    pub max_pieces: u64,
    /// 分块尺寸为 0 时的处理策略。
    pub degenerate_policy: DegeneratePolicy,
    /// 用户未填写文件名时使用的前缀。
    pub default_base_name: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            download_timeout: 30,
            connect_timeout: 8,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
            allow_private_network: false,
            resolve_dns_for_url_safety: true,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            max_pieces: DEFAULT_MAX_PIECES,
            degenerate_policy: DegeneratePolicy::Fail,
            default_base_name: DEFAULT_BASE_NAME.to_string(),
        }
    }
}

impl SplitConfig {
    /// 校验配置取值是否合理。
    ///
    /// 设置文件与命令行参数合并后调用，尽早拒绝无意义的阈值。
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.max_file_size == 0 {
            return Err(SplitError::UnsupportedFormat("max_file_size 不能为 0".to_string()));
        }
        if !(1..=600).contains(&self.download_timeout) {
            return Err(SplitError::UnsupportedFormat(
                "download_timeout 必须在 1~600 秒之间".to_string(),
            ));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(SplitError::UnsupportedFormat(
                "connect_timeout 必须在 1~120 秒之间".to_string(),
            ));
        }
        if !(500..=120_000).contains(&self.stream_chunk_timeout_ms) {
            return Err(SplitError::UnsupportedFormat(
                "stream_chunk_timeout_ms 必须在 500~120000 毫秒之间".to_string(),
            ));
        }
        if self.max_pieces == 0 {
            return Err(SplitError::UnsupportedFormat("max_pieces 不能为 0".to_string()));
        }
        Ok(())
    }

    /// 根据用户输入决定下载文件名前缀。
    pub fn base_name_or_default<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.default_base_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_upload_limits() {
        let config = SplitConfig::default();
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Fail);
        assert_eq!(config.default_base_name, "pice");
        assert!(config.resolve_dns_for_url_safety);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn policy_parses_case_insensitive() {
        assert_eq!(" Clamp ".parse::<DegeneratePolicy>().ok(), Some(DegeneratePolicy::Clamp));
        assert_eq!(DegeneratePolicy::Fail.as_str(), "fail");
        assert!(matches!(
            "shrink".parse::<DegeneratePolicy>(),
            Err(SplitError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn base_name_falls_back_when_blank() {
        let config = SplitConfig::default();
        assert_eq!(config.base_name_or_default(None), "pice");
        assert_eq!(config.base_name_or_default(Some("   ")), "pice");
        assert_eq!(config.base_name_or_default(Some("avatar")), "avatar");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SplitConfig =
            serde_json::from_str(r#"{"max_pieces": 64, "degenerate_policy": "clamp"}"#)
                .expect("parse config");
        assert_eq!(config.max_pieces, 64);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Clamp);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = SplitConfig::default();
        config.max_pieces = 0;
        assert!(config.validate().is_err());
    }
}
