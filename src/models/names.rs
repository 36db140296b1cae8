// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Ultralytics 导出的 ONNX 在 metadata 里带 `names`, 形如
//! `{0: 'person', 1: 'bicycle', 2: 'car', ...}` (Python dict 字面量),
//! 其他工具导出的也可能是 JSON `{"0": "person", ...}`.

use anyhow::{bail, Result};
use tracing::warn;

use crate::detection::types::COCO_CLASSES;

use once_cell::sync::Lazy;
use regex::Regex;

static NAME_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]?(\d+)['"]?\s*:\s*(?:'([^']*)'|"([^"]*)")"#).expect("valid regex"));

/// 解析 names 元数据, 缺失的 id 以 "class{id}" 补齐
pub fn parse_names(raw: &str) -> Vec<String> {
    let mut entries: Vec<(usize, String)> = NAME_ENTRY
        .captures_iter(raw)
        .filter_map(|cap| {
            let id = cap.get(1)?.as_str().parse::<usize>().ok()?;
            let name = cap.get(2).or_else(|| cap.get(3))?.as_str().to_string();
            Some((id, name))
        })
        .collect();
    entries.sort_by_key(|(id, _)| *id);

    let len = entries.last().map(|(id, _)| id + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(|i| format!("class{}", i)).collect();
    for (id, name) in entries {
        names[id] = name;
    }
    names
}

/// 模型类别名: 无 names 元数据时用 COCO-80, 有但无法解析时报错
pub fn class_names(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw else {
        warn!("⚠️ 模型未携带 names 元数据, 使用 COCO-80 类别");
        return Ok(COCO_CLASSES.iter().map(|s| s.to_string()).collect());
    };
    let names = parse_names(raw);
    if names.is_empty() {
        bail!("无法解析模型 names 元数据: {:?}", raw);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python_dict() {
        let names = parse_names("{0: 'person', 1: 'bicycle', 2: 'car', 3: 'motorcycle'}");
        assert_eq!(names, ["person", "bicycle", "car", "motorcycle"]);
    }

    #[test]
    fn test_parse_json_style_and_spaces() {
        let names = parse_names(r#"{"0": "person", "1": "traffic light"}"#);
        assert_eq!(names, ["person", "traffic light"]);

        let names = parse_names(r#"{0: "stop sign", 2: 'dining table'}"#);
        assert_eq!(names, ["stop sign", "class1", "dining table"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_names("").is_empty());
        assert!(parse_names("{}").is_empty());
    }

    #[test]
    fn test_class_names_fallback_and_errors() {
        let coco = class_names(None).unwrap();
        assert_eq!(coco.len(), 80);
        assert_eq!(coco[2], "car");

        let custom = class_names(Some(r#"{"0": "truck", "1": "car"}"#)).unwrap();
        assert_eq!(custom, ["truck", "car"]);

        assert!(class_names(Some("garbage")).is_err());
    }
}
