// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// - VideoSource:  控制循环使用的拉取式接口
/// - StreamSource: ez-ffmpeg 解码线程 + 有界通道
/// - DecodeFilter: 帧过滤器, 把解码后的 RGBA 帧推入通道
pub mod decode_filter;
pub mod decoder;

use std::fmt;

pub use decode_filter::DecodeFilter;
pub use decoder::StreamSource;

use crate::detection::Frame;

/// 一次取帧的结果; `Unavailable` 不是错误, 调用方跳过本轮并重试
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    Unavailable(UnavailableReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// 等待超时
    Timeout,
    /// 空帧或损坏帧
    Corrupt,
    /// 解码线程已退出
    Disconnected,
    /// 已调用 release
    Released,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnavailableReason::Timeout => "timeout",
            UnavailableReason::Corrupt => "corrupt frame",
            UnavailableReason::Disconnected => "decoder disconnected",
            UnavailableReason::Released => "source released",
        };
        f.write_str(s)
    }
}

pub trait VideoSource {
    fn read_frame(&mut self) -> FrameRead;

    /// 释放底层连接, 可重复调用
    fn release(&mut self);
}
