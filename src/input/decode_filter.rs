// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg解码过滤器模块
/// FFmpeg decode filter: `format=rgba` 帧 → RgbaImage → 有界通道
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbaImage;
use tracing::{debug, info, warn};

use super::UnavailableReason;

/// 通道里的消息: 解码好的帧, 或者一次不可用
pub type Decoded = Result<RgbaImage, UnavailableReason>;

const MAX_DIMENSION: u32 = 8192;

pub struct DecodeFilter {
    tx: Sender<Decoded>,
    stop: Arc<AtomicBool>,
    count: usize,
    last: Instant,
    total_frames: usize,
    dropped_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<Decoded>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            stop,
            count: 0,
            last: Instant::now(),
            total_frames: 0,
            dropped_frames: 0,
        }
    }

    /// 通道满时丢弃最新帧, 返回 false 表示接收端已关闭
    fn push(&mut self, msg: Decoded) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// 按行拷贝 (linesize 可能大于 width * 4)
///
/// # Safety
/// `data` 必须指向至少 `stride * height` 字节
unsafe fn copy_rgba(data: *const u8, stride: usize, width: u32, height: u32) -> Option<RgbaImage> {
    let row = width as usize * 4;
    if stride < row {
        return None;
    }
    let mut buf = vec![0u8; row * height as usize];
    for (y, dst) in buf.chunks_exact_mut(row).enumerate() {
        let src = std::slice::from_raw_parts(data.add(y * stride), row);
        dst.copy_from_slice(src);
    }
    RgbaImage::from_raw(width, height, buf)
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("source released".to_string());
        }
        self.total_frames += 1;

        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                None
            } else {
                let ptr = frame.as_ptr();
                let w = (*ptr).width;
                let h = (*ptr).height;
                let data = (*ptr).data[0];
                let stride = (*ptr).linesize[0];
                if w <= 0
                    || h <= 0
                    || w as u32 > MAX_DIMENSION
                    || h as u32 > MAX_DIMENSION
                    || data.is_null()
                    || stride <= 0
                {
                    None
                } else {
                    copy_rgba(data, stride as usize, w as u32, h as u32)
                }
            }
        };

        let msg = match image {
            Some(image) => {
                self.count += 1;
                Ok(image)
            }
            None => {
                self.dropped_frames += 1;
                if self.dropped_frames <= 10 {
                    warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.total_frames);
                }
                Err(UnavailableReason::Corrupt)
            }
        };

        if !self.push(msg) {
            return Err("receiver dropped".to_string());
        }

        if self.last.elapsed().as_secs_f64() >= 5.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ 解码线程退出");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_rgba_skips_row_padding() {
        // 2x2, stride 12 (每行 4 字节填充)
        let mut raw = vec![0u8; 24];
        raw[0..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        raw[12..20].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let img = unsafe { copy_rgba(raw.as_ptr(), 12, 2, 2) }.unwrap();
        assert_eq!(img.get_pixel(1, 0).0, [5, 6, 7, 8]);
        assert_eq!(img.get_pixel(0, 1).0, [9, 10, 11, 12]);
    }

    #[test]
    fn test_copy_rgba_rejects_short_stride() {
        let raw = vec![0u8; 16];
        assert!(unsafe { copy_rgba(raw.as_ptr(), 4, 2, 2) }.is_none());
    }
}
