//! Data URL 编解码。
//!
//! 分块产物以 `data:image/png;base64,...` 形式交给展示层，
//! 加载阶段也接受同样格式的引用字符串。

use base64::{Engine as _, engine::general_purpose};

use super::SplitError;

/// 解析后的 Data URL。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// 将字节编码为 base64 Data URL。
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// 解析 base64 Data URL。
pub fn decode(data: &str) -> Result<DataUrl, SplitError> {
    decode_with_limit(data, u64::MAX)
}

/// 解析 base64 Data URL，并在解码前按估算体积拒绝超限输入。
pub fn decode_with_limit(data: &str, max_size: u64) -> Result<DataUrl, SplitError> {
    let normalized = data.trim();
    let rest = normalized
        .strip_prefix("data:")
        .ok_or_else(|| SplitError::UnsupportedFormat("不是 Data URL".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| SplitError::UnsupportedFormat("Data URL 缺少数据段".to_string()))?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or("").trim().to_ascii_lowercase();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(SplitError::UnsupportedFormat("缺少 base64 标记".to_string()));
    }

    let estimated = estimate_decoded_upper_bound_len(payload)?;
    if estimated > max_size {
        return Err(SplitError::PayloadTooLarge(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            max_size as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| SplitError::DecodeFailed(format!("Base64 解码失败：{}", e)))?;

    Ok(DataUrl { mime, bytes })
}

fn estimate_decoded_upper_bound_len(base64_data: &str) -> Result<u64, SplitError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| SplitError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| SplitError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_mime_and_bytes() {
        let url = encode("image/png", b"\x89PNG");
        let parsed = decode(&url).expect("decode data url");
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.bytes, b"\x89PNG");
    }

    #[test]
    fn decode_rejects_missing_base64_marker() {
        let result = decode("data:image/png,rawtext");
        assert!(matches!(result, Err(SplitError::UnsupportedFormat(_))));
    }

    #[test]
    fn decode_with_limit_rejects_before_decoding() {
        let huge = format!("data:image/png;base64,{}", "A".repeat(1024 * 1024));
        let result = decode_with_limit(&huge, 32);
        assert!(matches!(result, Err(SplitError::PayloadTooLarge(_))));
    }

    #[test]
    fn decode_reports_corrupt_payload() {
        let result = decode("data:image/gif;base64,@@@");
        assert!(matches!(result, Err(SplitError::DecodeFailed(_))));
    }
}
