// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型
//!
//! 只有 "帧不可用" 不是错误 (见 `input::FrameRead::Unavailable`),
//! 其余失败都会终止控制循环, 在退出前释放视频源和串口.

use thiserror::Error;

/// 串口设备通道错误
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("串口已关闭")]
    Closed,
    #[error("串口写入失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 控制循环的致命错误
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("无法打开串口 {port} @ {baud}")]
    DeviceOpen {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("检测失败 (第 {frame} 帧)")]
    Detector {
        frame: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("发送信号灯指令失败")]
    SerialWrite(#[source] DeviceError),

    #[error("显示失败")]
    Display(#[source] anyhow::Error),

    #[error("视频流连续 {0} 次取帧失败")]
    FeedLost(u32),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("启动阶段被中断: {0}")]
    Interrupted(&'static str),
}
