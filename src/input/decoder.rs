// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 网络视频流解码器
/// 解码线程推帧, 控制循环通过 `read_frame` 按需拉取
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use tracing::{error, info};

use super::decode_filter::{DecodeFilter, Decoded};
use super::{FrameRead, UnavailableReason, VideoSource};
use crate::detection::Frame;

/// 通道容量, 满了就丢最新帧
const CHANNEL_CAPACITY: usize = 2;

pub struct StreamSource {
    url: String,
    read_timeout: Duration,
    rx: Option<Receiver<Decoded>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    next_index: u64,
}

impl StreamSource {
    /// 启动解码线程; 连接失败不会在这里报错, 而是表现为持续的 Unavailable
    pub fn open(url: &str, read_timeout: Duration) -> Result<Self> {
        let (tx, rx) = bounded::<Decoded>(CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, stop.clone());

        let thread_url = url.to_string();
        let handle = thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || {
                info!("🎬 解码器启动: {}", thread_url);
                match decode(&thread_url, filter) {
                    Ok(()) => info!("✅ 解码线程正常退出"),
                    Err(e) => error!("❌ 解码失败: {:#}", e),
                }
            })
            .context("无法创建解码线程")?;

        Ok(Self::from_channel(url, rx, stop, Some(handle), read_timeout))
    }

    /// 由已有的通道组装; 解码线程可以不存在
    fn from_channel(
        url: &str,
        rx: Receiver<Decoded>,
        stop: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            url: url.to_string(),
            read_timeout,
            rx: Some(rx),
            stop,
            handle,
            next_index: 0,
        }
    }
}

fn decode(url: &str, filter: DecodeFilter) -> Result<()> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let mut input = Input::new(url);
    if url.starts_with("rtsp://") {
        input = input.set_input_opts(
            [("rtsp_transport", "tcp"), ("rtsp_flags", "prefer_tcp")].into(),
        );
    }

    let ctx = FfmpegContext::builder()
        .input(input)
        .filter_descs(["format=rgba"].into())
        .output(out)
        .build()
        .map_err(|e| anyhow::anyhow!("构建失败: {}", e))?;

    let sch = ctx
        .start()
        .map_err(|e| anyhow::anyhow!("启动失败: {}", e))?;
    info!("✅ 视频流已连接");

    sch.wait().map_err(|e| anyhow::anyhow!("解码中断: {}", e))?;
    Ok(())
}

impl VideoSource for StreamSource {
    fn read_frame(&mut self) -> FrameRead {
        let Some(rx) = self.rx.as_ref() else {
            return FrameRead::Unavailable(UnavailableReason::Released);
        };
        match rx.recv_timeout(self.read_timeout) {
            Ok(Ok(image)) => {
                let frame = Frame::new(self.next_index, image);
                self.next_index += 1;
                FrameRead::Frame(frame)
            }
            Ok(Err(reason)) => FrameRead::Unavailable(reason),
            Err(RecvTimeoutError::Timeout) => FrameRead::Unavailable(UnavailableReason::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                FrameRead::Unavailable(UnavailableReason::Disconnected)
            }
        }
    }

    fn release(&mut self) {
        if self.rx.is_none() {
            return;
        }
        self.stop.store(true, Ordering::Relaxed);
        // 接收端关闭后过滤器下一帧即退出
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        info!("📴 视频源已释放: {}", self.url);
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn source(capacity: usize) -> (crossbeam_channel::Sender<Decoded>, Arc<AtomicBool>, StreamSource) {
        let (tx, rx) = bounded::<Decoded>(capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let src = StreamSource::from_channel(
            "test://feed",
            rx,
            stop.clone(),
            None,
            Duration::from_millis(10),
        );
        (tx, stop, src)
    }

    #[test]
    fn test_read_numbers_frames_and_reports_gaps() {
        let (tx, _stop, mut src) = source(4);
        tx.send(Ok(RgbaImage::new(4, 4))).unwrap();
        tx.send(Err(UnavailableReason::Corrupt)).unwrap();
        tx.send(Ok(RgbaImage::new(4, 4))).unwrap();

        assert!(matches!(src.read_frame(), FrameRead::Frame(f) if f.index == 0));
        assert!(matches!(
            src.read_frame(),
            FrameRead::Unavailable(UnavailableReason::Corrupt)
        ));
        assert!(matches!(src.read_frame(), FrameRead::Frame(f) if f.index == 1));
        assert!(matches!(
            src.read_frame(),
            FrameRead::Unavailable(UnavailableReason::Timeout)
        ));

        drop(tx);
        assert!(matches!(
            src.read_frame(),
            FrameRead::Unavailable(UnavailableReason::Disconnected)
        ));
    }

    #[test]
    fn test_read_after_release_is_released() {
        let (tx, stop, mut src) = source(2);
        tx.send(Ok(RgbaImage::new(4, 4))).unwrap();

        src.release();
        assert!(stop.load(Ordering::Relaxed));
        assert!(matches!(
            src.read_frame(),
            FrameRead::Unavailable(UnavailableReason::Released)
        ));
        // 接收端已关闭, 过滤器据此退出
        assert!(tx.send(Ok(RgbaImage::new(4, 4))).is_err());

        src.release();
        assert!(matches!(
            src.read_frame(),
            FrameRead::Unavailable(UnavailableReason::Released)
        ));
    }
}
