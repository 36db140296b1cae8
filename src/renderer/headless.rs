// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 无窗口显示: 只记录日志, 退出依赖 Ctrl-C

use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use super::DisplaySink;
use crate::detection::Frame;

#[derive(Debug, Default)]
pub struct HeadlessSink;

impl HeadlessSink {
    pub fn new() -> Self {
        Self
    }
}

impl DisplaySink for HeadlessSink {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        debug!(
            "帧 #{} {}x{} (headless)",
            frame.index,
            frame.width(),
            frame.height()
        );
        Ok(())
    }

    async fn poll_quit(&mut self, wait: Duration) -> bool {
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        false
    }
}
