//! 设置文件读写。
//!
//! 设置文件为 JSON，字段与 `SplitConfig` 一一对应，缺省字段取默认值。

use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::splitter::SplitConfig;

/// 读取设置文件；文件不存在时返回 `Ok(None)`。
pub fn load_settings(path: &Path) -> Result<Option<SplitConfig>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<SplitConfig>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;
    parsed.validate()?;

    Ok(Some(parsed))
}

/// 将设置写回文件（格式化输出，便于手工编辑）。
pub fn save_settings(path: &Path, config: &SplitConfig) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Settings(format!("创建设置目录失败: {}", e)))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::DegeneratePolicy;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_settings(&dir.path().join("settings.json")).expect("load");
        assert!(result.is_none());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conf").join("settings.json");

        let mut config = SplitConfig::default();
        config.degenerate_policy = DegeneratePolicy::Clamp;
        config.default_base_name = "piece".to_string();
        save_settings(&path, &config).expect("save");

        let loaded = load_settings(&path).expect("load").expect("present");
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_json_is_settings_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");

        assert!(matches!(load_settings(&path), Err(AppError::Settings(_))));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"max_pieces": 0}"#).expect("write");

        assert!(matches!(load_settings(&path), Err(AppError::Split(_))));
    }
}
