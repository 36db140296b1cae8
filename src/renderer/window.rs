// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// macroquad 显示窗口
/// 必须在 `macroquad::Window` 的协程里创建和使用
use std::time::Duration;

use anyhow::{bail, Result};
use macroquad::prelude::*;
use tracing::info;

use super::DisplaySink;
use crate::detection::Frame as VideoFrame;

pub const WINDOW_TITLE: &str = "Traffic Feed";

pub struct WindowSink {
    texture: Option<Texture2D>,
    quit_key: KeyCode,
}

impl WindowSink {
    pub fn new(quit_key: char) -> Result<Self> {
        let Some(quit_key) = key_code(quit_key) else {
            bail!("不支持的退出键: {:?} (仅支持 a-z)", quit_key);
        };
        // 关窗口交给 poll_quit 处理
        prevent_quit();
        info!("🖥️ 显示窗口就绪: {}", WINDOW_TITLE);
        Ok(Self {
            texture: None,
            quit_key,
        })
    }

    /// 窗口配置, 供 `macroquad::Window::from_config` 使用
    pub fn conf() -> Conf {
        Conf {
            window_title: WINDOW_TITLE.to_string(),
            window_width: 1280,
            window_height: 720,
            high_dpi: true,
            ..Default::default()
        }
    }
}

/// 字母 → KeyCode
pub fn key_code(c: char) -> Option<KeyCode> {
    let key = match c.to_ascii_lowercase() {
        'a' => KeyCode::A,
        'b' => KeyCode::B,
        'c' => KeyCode::C,
        'd' => KeyCode::D,
        'e' => KeyCode::E,
        'f' => KeyCode::F,
        'g' => KeyCode::G,
        'h' => KeyCode::H,
        'i' => KeyCode::I,
        'j' => KeyCode::J,
        'k' => KeyCode::K,
        'l' => KeyCode::L,
        'm' => KeyCode::M,
        'n' => KeyCode::N,
        'o' => KeyCode::O,
        'p' => KeyCode::P,
        'q' => KeyCode::Q,
        'r' => KeyCode::R,
        's' => KeyCode::S,
        't' => KeyCode::T,
        'u' => KeyCode::U,
        'v' => KeyCode::V,
        'w' => KeyCode::W,
        'x' => KeyCode::X,
        'y' => KeyCode::Y,
        'z' => KeyCode::Z,
        _ => return None,
    };
    Some(key)
}

impl DisplaySink for WindowSink {
    fn show(&mut self, frame: &VideoFrame) -> Result<()> {
        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 || w > u16::MAX as u32 || h > u16::MAX as u32 {
            bail!("无法显示 {}x{} 的帧", w, h);
        }

        // 只在分辨率变化时重建纹理, 否则更新像素数据
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, frame.image.as_raw());
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes: frame.image.as_raw().clone(),
                width: w as u16,
                height: h as u16,
            });
        }

        clear_background(BLACK);
        if let Some(texture) = &self.texture {
            // 等比缩放居中
            let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
            let dw = texture.width() * scale;
            let dh = texture.height() * scale;
            draw_texture_ex(
                texture,
                (screen_width() - dw) / 2.0,
                (screen_height() - dh) / 2.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(dw, dh)),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    async fn poll_quit(&mut self, _wait: Duration) -> bool {
        // 呈现本帧, 同时处理窗口事件
        next_frame().await;
        is_key_pressed(self.quit_key) || is_quit_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_code_mapping() {
        assert_eq!(key_code('q'), Some(KeyCode::Q));
        assert_eq!(key_code('Q'), Some(KeyCode::Q));
        assert_eq!(key_code('1'), None);
    }
}
