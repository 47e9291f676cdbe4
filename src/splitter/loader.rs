//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源的原始字节加载，并在“尽可能早”的阶段执行输入校验，尽快失败。
//!
//! ## 实现思路
//!
//! - 二进制文件：MIME 类型 + 体积上限 + 文件签名。
//! - HTML 片段：正则提取 `src` 中以 jpg/jpeg/png/gif 结尾的地址（兼容旧的拖拽来源，尽力而为）。
//! - Data URL：MIME + 解码前体积估算 + 解码后体积。
//! - URL：协议 + 主机安全（含 DNS 解析结果）+ 内容类型 + 体积校验 + 流式下载。
//!   每一跳重定向都重新解析并校验，请求固定连到校验过的地址。
//! - 本地路径：存在性 + metadata 体积限制 + 读取。
//!
//! 体积判断统一为 `size > max_file_size` 即拒绝，恰好等于上限的输入可以通过。

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::net::lookup_host;

use super::source::RawImageData;
use super::{ImageSource, ImageSplitter, SplitConfig, SplitError, data_url};

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

/// 从拖拽得到的 HTML 中提取图片地址。
///
/// 只认 `src="..."` / `src='...'`，扩展名大小写不敏感，允许带查询串或锚点。
static MARKUP_IMAGE_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"src=["']([^"']*?\.(?i:jpe?g|png|gif)(?:[?#][^"']*)?)["']"#)
        .expect("markup image pattern must compile")
});

/// 从 HTML 片段中提取第一个图片地址。
///
/// 这是对拖拽来源的兼容路径，不做真正的 HTML 解析。
pub fn extract_image_reference(markup: &str) -> Option<String> {
    MARKUP_IMAGE_SRC
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
}

impl ImageSplitter {
    /// 按来源类型加载原始字节。
    pub(super) async fn load_source(
        &self,
        source: ImageSource,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        match source {
            ImageSource::Payload { bytes, mime, size } => {
                Self::load_from_payload(bytes, mime.as_deref(), size, config)
            }
            ImageSource::Reference(reference) => self.load_from_reference(&reference, config).await,
        }
    }

    /// 校验并接收上传 / 拖入的二进制文件。
    pub(super) fn load_from_payload(
        bytes: Vec<u8>,
        mime: Option<&str>,
        size: Option<u64>,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        log::info!("📁 开始处理上传图片 - MIME: {:?}", mime);

        let mime = mime.map(str::trim).filter(|m| !m.is_empty()).ok_or_else(|| {
            SplitError::UnsupportedFormat("缺少 MIME 类型，请上传 jpg, png, gif, jpeg 格式的图片".to_string())
        })?;

        if !Self::is_image_content_type(mime) {
            return Err(SplitError::UnsupportedFormat(format!(
                "不是图片类型：{}，请上传 jpg, png, gif, jpeg 格式的图片",
                mime
            )));
        }

        let declared = size.unwrap_or(bytes.len() as u64);
        Self::validate_file_size(declared.max(bytes.len() as u64), config)?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "payload",
        })
    }

    /// 解析字符串引用：HTML 片段、Data URL、网络地址或本地路径。
    pub(super) async fn load_from_reference(
        &self,
        reference: &str,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SplitError::UnsupportedFormat("图片引用为空".to_string()));
        }

        if reference.contains('<') {
            log::debug!("🧩 从 HTML 片段中提取图片地址");
            let locator = extract_image_reference(reference).ok_or_else(|| {
                SplitError::UnsupportedFormat(
                    "HTML 中未找到 jpg, png, gif, jpeg 格式的图片地址".to_string(),
                )
            })?;
            return self.load_from_locator(&locator, config).await;
        }

        self.load_from_locator(reference, config).await
    }

    async fn load_from_locator(
        &self,
        locator: &str,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        let lower = locator.get(..8).unwrap_or(locator).to_ascii_lowercase();
        if lower.starts_with("data:") {
            Self::load_from_data_url(locator, config)
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            self.load_from_url(locator, config).await
        } else {
            Self::load_from_file(locator, config)
        }
    }

    /// 从 Data URL 加载图片原始字节。
    pub(super) fn load_from_data_url(
        data: &str,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        log::info!("📝 开始处理 Data URL 图片");

        let parsed = data_url::decode_with_limit(data, config.max_file_size)?;
        if !Self::is_image_content_type(&parsed.mime) {
            return Err(SplitError::UnsupportedFormat(format!(
                "Data URL 不是图片类型：{}",
                parsed.mime
            )));
        }

        Self::validate_file_size(parsed.bytes.len() as u64, config)?;
        Self::validate_image_signature(&parsed.bytes)?;

        Ok(RawImageData {
            bytes: parsed.bytes,
            source_hint: "data_url",
        })
    }

    /// 从本地路径加载图片原始字节。
    pub(super) fn load_from_file(
        path: &str,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(SplitError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| SplitError::FileSystem(format!("无法读取文件信息：{}", e)))?;
        Self::validate_file_size(metadata.len(), config)?;

        let bytes = std::fs::read(file_path)
            .map_err(|e| SplitError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    /// 从 URL 加载图片原始字节。
    pub(super) async fn load_from_url(
        &self,
        url: &str,
        config: &SplitConfig,
    ) -> Result<RawImageData, SplitError> {
        log::info!("🌐 开始下载图片 - URL: {}", Self::redact_url_for_log(url));

        let pinned = Self::validate_url_safety(url, config).await?;
        let bytes = self.download_with_validation(url, pinned, config).await?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "url",
        })
    }

    /// 执行带校验的网络下载。
    ///
    /// `pinned` 为调用方校验首个地址时得到的解析结果。
    /// 手动跟随重定向，每一跳都重新做主机安全校验，
    /// 并把域名固定到校验时解析出的地址。
    async fn download_with_validation(
        &self,
        url: &str,
        mut pinned: Vec<SocketAddr>,
        config: &SplitConfig,
    ) -> Result<Vec<u8>, SplitError> {
        let mut current_url = reqwest::Url::parse(url)
            .map_err(|e| SplitError::UnsupportedFormat(format!("URL 格式错误：{}", e)))?;

        for redirect_count in 0..=config.max_redirects {
            let client = Self::build_http_client(&current_url, &pinned, config)?;

            log::debug!("📡 发送 HTTP 请求...");
            let response = client
                .get(current_url.clone())
                .header(reqwest::header::ACCEPT, "image/png,image/jpeg,image/gif,image/*;q=0.8")
                .send()
                .await
                .map_err(|e| Self::map_reqwest_error(e, current_url.as_str(), config))?;

            if response.status().is_redirection() {
                if redirect_count >= config.max_redirects {
                    return Err(SplitError::Network(format!(
                        "重定向次数超过限制（{}）",
                        config.max_redirects
                    )));
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .ok_or_else(|| SplitError::Network("重定向响应缺少 Location 头".to_string()))?;

                let location_str = location
                    .to_str()
                    .map_err(|e| SplitError::UnsupportedFormat(format!("重定向地址无效：{}", e)))?;

                let next_url = current_url
                    .join(location_str)
                    .map_err(|e| SplitError::UnsupportedFormat(format!("重定向 URL 解析失败：{}", e)))?;

                pinned = Self::validate_url_safety(next_url.as_str(), config).await?;

                log::debug!("↪️ 跳转到: {}", Self::redact_url_for_log(next_url.as_str()));
                current_url = next_url;
                continue;
            }

            if !response.status().is_success() {
                return Err(SplitError::Network(format!(
                    "HTTP {}: {}",
                    response.status().as_u16(),
                    Self::status_message(response.status().as_u16())
                )));
            }

            if let Some(ct) = response.headers().get(reqwest::header::CONTENT_TYPE) {
                if let Ok(ct_str) = ct.to_str() {
                    if !Self::is_image_content_type(ct_str) {
                        return Err(SplitError::UnsupportedFormat(format!("不是图片类型：{}", ct_str)));
                    }
                }
            }

            let total_len = response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|cl| cl.to_str().ok())
                .and_then(|cl| cl.parse::<u64>().ok());

            if let Some(size) = total_len {
                Self::validate_file_size(size, config)?;
            }

            let initial_capacity = total_len
                .map(|len| len.min(config.max_file_size) as usize)
                .filter(|len| *len > 0)
                .unwrap_or(BUFFER_INITIAL_CAPACITY);
            let mut buffer = Vec::with_capacity(initial_capacity);
            let mut response = response;
            let chunk_timeout = Duration::from_millis(config.stream_chunk_timeout_ms);

            loop {
                let next_chunk = tokio::time::timeout(chunk_timeout, response.chunk())
                    .await
                    .map_err(|_| SplitError::Timeout("下载数据流读取超时".to_string()))?;

                let Some(chunk) =
                    next_chunk.map_err(|e| SplitError::Network(format!("下载失败：{}", e)))?
                else {
                    break;
                };

                buffer.extend_from_slice(&chunk);
                Self::validate_file_size(buffer.len() as u64, config)?;
            }

            log::debug!("✅ 下载完成 - {} bytes", buffer.len());
            return Ok(buffer);
        }

        Err(SplitError::Network("下载流程异常结束".to_string()))
    }

    /// 创建本跳使用的 HTTP 客户端。
    ///
    /// `pinned` 非空时，域名只会连到这些已校验的地址。
    fn build_http_client(
        url: &reqwest::Url,
        pinned: &[SocketAddr],
        config: &SplitConfig,
    ) -> Result<reqwest::Client, SplitError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::none());

        if let Some(host) = url.host_str() {
            if !pinned.is_empty() {
                builder = builder.resolve_to_addrs(host, pinned);
            }
        }

        builder
            .build()
            .map_err(|e| SplitError::Network(format!("无法创建 HTTP 客户端：{}", e)))
    }

    /// 解析主机名，任一结果落在内网即拒绝。
    async fn resolve_public_socket_addrs(
        host: &str,
        port: u16,
    ) -> Result<Vec<SocketAddr>, SplitError> {
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| SplitError::Network(format!("URL 主机解析失败：{}", e)))?;

        let mut result = Vec::new();
        for addr in addrs {
            if Self::is_private_or_local_ip(addr.ip()) {
                return Err(SplitError::Network(format!(
                    "URL 解析结果命中内网地址：{}",
                    addr.ip()
                )));
            }
            result.push(addr);
        }

        Ok(result)
    }

    /// 校验 URL 安全性。
    ///
    /// 默认阻止本地/内网目标。域名会被解析，返回解析出的公网地址供请求固定使用；
    /// 字面 IP 或放行内网时返回空列表。
    async fn validate_url_safety(
        url: &str,
        config: &SplitConfig,
    ) -> Result<Vec<SocketAddr>, SplitError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| SplitError::UnsupportedFormat(format!("URL 格式错误：{}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SplitError::UnsupportedFormat("仅支持 HTTP/HTTPS".to_string()));
        }

        if config.allow_private_network {
            return Ok(Vec::new());
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| SplitError::UnsupportedFormat("URL 缺少主机地址".to_string()))?;

        if Self::is_local_hostname(host) {
            return Err(SplitError::Network(format!("禁止访问本地网络地址：{}", host)));
        }

        let bare_host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare_host.parse::<IpAddr>() {
            if Self::is_private_or_local_ip(ip) {
                return Err(SplitError::Network(format!("禁止访问内网 IP：{}", ip)));
            }
            return Ok(Vec::new());
        }

        if !config.resolve_dns_for_url_safety {
            return Ok(Vec::new());
        }

        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| SplitError::UnsupportedFormat("URL 缺少端口信息".to_string()))?;

        let pinned = Self::resolve_public_socket_addrs(host, port).await?;
        if pinned.is_empty() {
            return Err(SplitError::Network(format!("URL 未解析到有效地址：{}", host)));
        }

        Ok(pinned)
    }

    fn is_local_hostname(host: &str) -> bool {
        host.eq_ignore_ascii_case("localhost")
            || host.eq_ignore_ascii_case("localhost.")
            || host.ends_with(".local")
    }

    /// 判断 IP 是否属于本地/内网/链路本地等受限范围。
    fn is_private_or_local_ip(ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                let octets = v4.octets();
                v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_unspecified()
                    || v4.is_multicast()
                    || octets[0] == 0
                    // 100.64.0.0/10 运营商级 NAT
                    || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
            }
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => Self::is_private_or_local_ip(IpAddr::V4(v4)),
                None => {
                    v6.is_loopback()
                        || v6.is_unspecified()
                        || v6.is_unique_local()
                        || v6.is_unicast_link_local()
                        || v6.is_multicast()
                }
            },
        }
    }

    fn is_image_content_type(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|base| base.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }

    fn validate_file_size(size: u64, config: &SplitConfig) -> Result<(), SplitError> {
        if size > config.max_file_size {
            return Err(SplitError::PayloadTooLarge(format!(
                "请上传 {:.2} MB 以内的图片（当前：{:.2} MB）",
                config.max_file_size as f64 / 1024.0 / 1024.0,
                size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), SplitError> {
        if bytes.is_empty() {
            return Err(SplitError::UnsupportedFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| SplitError::UnsupportedFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(SplitError::UnsupportedFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }

    fn redact_url_for_log(url: &str) -> String {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return "<invalid-url>".to_string();
        };

        let host = parsed.host_str().unwrap_or("<unknown-host>");
        let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

        format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
    }

    fn map_reqwest_error(e: reqwest::Error, url: &str, config: &SplitConfig) -> SplitError {
        let err_msg = e.to_string().replace(url, &Self::redact_url_for_log(url));

        if e.is_timeout() {
            SplitError::Timeout(format!("下载超时（{}秒）", config.download_timeout))
        } else if e.is_connect() {
            SplitError::Network(format!("无法连接：{}", err_msg))
        } else {
            SplitError::Network(format!("请求失败：{}", err_msg))
        }
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }
}
