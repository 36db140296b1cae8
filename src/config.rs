// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 命令行参数 + 信号灯时长配置 (JSON 文件)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 默认视频流地址 (手机 IP Webcam)
pub const DEFAULT_SOURCE: &str = "http://192.168.1.32:8080/video";

#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM4";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// 串口写入失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum WriteFailurePolicy {
    /// 立即终止控制循环
    #[default]
    Fatal,
    /// 丢弃本次指令, 继续下一帧
    Drop,
}

/// 车流量信号灯参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLOv8 车流量检测 → 串口信号灯控制", long_about = None)]
pub struct Args {
    /// 视频流地址 (MJPEG/RTSP/文件, 任意 FFmpeg 可打开的地址)
    #[arg(short, long, default_value = DEFAULT_SOURCE)]
    pub source: String,

    /// 串口设备
    #[arg(short, long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// 波特率
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,

    /// 串口读超时 (毫秒)
    #[arg(long, default_value_t = 1000)]
    pub serial_timeout_ms: u64,

    /// 打开串口后等待单片机复位的时间 (毫秒)
    #[arg(long, default_value_t = 2000)]
    pub settle_ms: u64,

    /// ONNX 检测模型路径
    #[arg(short, long, default_value = "models/yolov8n.onnx")]
    pub model: String,

    /// 模型不存在时的下载地址
    #[arg(long)]
    pub model_url: Option<String>,

    /// 推理输入尺寸
    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// NMS IOU 阈值
    #[arg(long, default_value_t = 0.7)]
    pub iou: f32,

    /// 每帧最多保留的检测框数
    #[arg(long, default_value_t = crate::models::yolov8::MAX_DET)]
    pub max_det: usize,

    /// ONNX Runtime 线程数
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 计为车辆的类别名 (按模型标签解析)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "car,motorcycle,bus,truck"
    )]
    pub vehicle_classes: Vec<String>,

    /// 单次取帧等待时间 (毫秒)
    #[arg(long, default_value_t = 1000)]
    pub read_timeout_ms: u64,

    /// 取帧失败后的退避时间 (毫秒, 0 = 立即重试)
    #[arg(long, default_value_t = 0)]
    pub retry_backoff_ms: u64,

    /// 连续取帧失败上限 (不设置 = 无限重试)
    #[arg(long)]
    pub max_unavailable: Option<u32>,

    /// 串口写入失败策略
    #[arg(long, value_enum, default_value_t = WriteFailurePolicy::Fatal)]
    pub on_write_error: WriteFailurePolicy,

    /// 退出键
    #[arg(long, default_value_t = 'q')]
    pub quit_key: char,

    /// 无窗口模式 (Ctrl-C 退出)
    #[arg(long)]
    pub headless: bool,

    /// 叠加文字使用的字体
    #[arg(long, default_value = "assets/font/DejaVuSans.ttf")]
    pub font: PathBuf,

    /// 信号灯时长配置文件 (JSON)
    #[arg(long)]
    pub timing: Option<PathBuf>,

    /// 以 info 级别打印模型和控制循环各阶段耗时
    #[arg(long)]
    pub profile: bool,
}

impl Args {
    pub fn serial_timeout(&self) -> Duration {
        Duration::from_millis(self.serial_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// 信号灯时长配置 - 通过JSON文件调整参数
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub red_ms: u32,               // 红灯
    pub yellow_ms: u32,            // 黄灯
    pub green_base_ms: u32,        // 无车时的绿灯
    pub green_per_vehicle_ms: u32, // 每辆车增加的绿灯
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            red_ms: 5000,
            yellow_ms: 2000,
            green_base_ms: 3000,
            green_per_vehicle_ms: 1000,
        }
    }
}

impl TimingConfig {
    /// 从JSON文件加载配置; 文件不存在时写入默认配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 时长配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 时长配置解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 时长配置不存在, 创建默认配置 {}", path.display());
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("❌ 保存时长配置失败: {}", e);
                }
            }
            Err(e) => warn!("❌ 序列化时长配置失败: {}", e),
        }
    }
}
