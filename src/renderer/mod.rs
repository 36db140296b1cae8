// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 画面标注与显示 (Renderer)
///
/// - Annotator:   在帧上画车辆框和计数文字 (imageproc + ab_glyph)
/// - DisplaySink: 显示接口, 控制循环每轮调用 show → poll_quit
/// - WindowSink:  macroquad 窗口
/// - HeadlessSink: 无窗口运行
pub mod headless;
pub mod window;

use std::path::Path;
use std::time::Duration;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

pub use headless::HeadlessSink;
pub use window::WindowSink;

use crate::detection::{Detection, Frame};

pub const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const BOX_THICKNESS: i32 = 2;
pub const TEXT_ORIGIN: (i32, i32) = (10, 10);
pub const TEXT_SCALE: f32 = 30.0;

/// 显示接口
pub trait DisplaySink {
    /// 展示已标注的帧
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// 最多等待 `wait`, 返回是否请求退出
    #[allow(async_fn_in_trait)]
    async fn poll_quit(&mut self, wait: Duration) -> bool;
}

/// 帧标注器
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// 没有字体时只画框
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("无法读取字体文件: {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow::anyhow!("无效的字体文件: {}", path.display()))?;
        Ok(Self::new(Some(font)))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 绿色 2px 空心框
    pub fn draw_box(&self, image: &mut RgbaImage, det: &Detection) {
        for inset in 0..BOX_THICKNESS {
            let w = det.width() - 2 * inset;
            let h = det.height() - 2 * inset;
            if w < 1 || h < 1 {
                break;
            }
            let rect = Rect::at(det.x1 + inset, det.y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }
    }

    /// 左上角红色 "Vehicles: N"
    pub fn draw_count(&self, image: &mut RgbaImage, count: usize) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let text = format!("Vehicles: {}", count);
        draw_text_mut(
            image,
            TEXT_COLOR,
            TEXT_ORIGIN.0,
            TEXT_ORIGIN.1,
            PxScale::from(TEXT_SCALE),
            font,
            &text,
        );
    }

    pub fn annotate(&self, image: &mut RgbaImage, vehicles: &[&Detection]) {
        for det in vehicles {
            self.draw_box(image, det);
        }
        self.draw_count(image, vehicles.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_box_is_two_pixels_thick() {
        let annotator = Annotator::new(None);
        let mut img = blank(40, 40);
        let det = Detection::new(2, 0.9, (5, 5, 25, 25));
        annotator.draw_box(&mut img, &det);

        assert_eq!(*img.get_pixel(5, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(6, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(7, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(15, 15), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_degenerate_box_is_ignored() {
        let annotator = Annotator::new(None);
        let mut img = blank(10, 10);
        let det = Detection::new(2, 0.9, (3, 3, 3, 8));
        annotator.draw_box(&mut img, &det);
        assert!(img.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_count_without_font_leaves_frame_untouched() {
        let annotator = Annotator::new(None);
        let mut img = blank(64, 64);
        annotator.draw_count(&mut img, 3);
        assert!(!annotator.has_font());
        assert!(img.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        assert!(Annotator::from_font_file(Path::new("no/such/font.ttf")).is_err());
    }
}
