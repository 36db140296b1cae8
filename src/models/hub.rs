// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模型文件定位: 本地路径优先, 否则下载到用户缓存目录

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

const CACHE_DIR: &str = "traffic-light-rs";

/// 返回可加载的模型路径
pub fn resolve_model(path: &str, url: Option<&str>) -> Result<PathBuf> {
    let local = Path::new(path);
    if local.exists() {
        return Ok(local.to_path_buf());
    }

    let Some(url) = url else {
        bail!("模型文件不存在: {} (可用 --model-url 指定下载地址)", path);
    };

    let file_name = local
        .file_name()
        .with_context(|| format!("模型路径缺少文件名: {}", path))?;
    let cache = cache_dir().join(file_name);
    if cache.exists() {
        info!("📦 使用缓存模型: {}", cache.display());
        return Ok(cache);
    }

    download(url, &cache)?;
    Ok(cache)
}

fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR)
}

fn download(url: &str, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("无法创建缓存目录: {}", parent.display()))?;
    }

    info!("⬇️ 下载模型: {} → {}", url, dst.display());
    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("下载失败: {}", url))?;

    // 写入 .part, 完整后改名
    let part = dst.with_extension("part");
    {
        let mut writer = BufWriter::new(File::create(&part)?);
        let bytes = io::copy(&mut resp.into_reader(), &mut writer)?;
        writer.flush()?;
        info!("✅ 下载完成: {:.1} MB", bytes as f64 / 1024.0 / 1024.0);
    }
    fs::rename(&part, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_path_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("yolov8n.onnx");
        fs::write(&model, b"onnx").unwrap();
        let resolved = resolve_model(model.to_str().unwrap(), None).unwrap();
        assert_eq!(resolved, model);
    }

    #[test]
    fn test_missing_without_url_fails() {
        let err = resolve_model("definitely/missing/model.onnx", None).unwrap_err();
        assert!(err.to_string().contains("model.onnx"));
    }
}
