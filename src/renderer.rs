//! 预览窗口 (macroquad)
//!
//! 每处理一项画一帧, Esc 提前结束批次。

use ab_glyph::FontArc;
use anyhow::Result;
use image::DynamicImage;
use macroquad::prelude::*;
use macroquad::window::Conf;
use tracing::info;

use crate::overlay::{captions, draw_detections, Caption};
use crate::pipeline::{Batch, BatchSummary, Processed, SourceItem};

/// 预览窗口配置
pub fn window_conf() -> Conf {
    Conf {
        window_title: "autolabel".to_owned(),
        window_width: 1280,
        window_height: 720,
        high_dpi: true,
        ..Default::default()
    }
}

struct Preview {
    texture: Option<Texture2D>,
    font: Option<FontArc>,
    /// 没有字体时用 macroquad 内置字体绘制的标签
    captions: Vec<Caption>,
    status: String,
}

impl Preview {
    fn new(font: Option<FontArc>) -> Self {
        Self {
            texture: None,
            font,
            captions: Vec::new(),
            status: String::new(),
        }
    }

    fn update(&mut self, processed: &Processed, labeled: usize) {
        let overlay = draw_detections(
            &processed.item.image,
            &processed.outcome.detections,
            self.font.as_ref(),
        );
        let rgba = DynamicImage::ImageRgb8(overlay).to_rgba8();
        let (w, h) = (rgba.width() as u16, rgba.height() as u16);

        // 只在分辨率变化时重建纹理
        match &self.texture {
            Some(tex) if tex.width() == w as f32 && tex.height() == h as f32 => {
                tex.update(&Image {
                    bytes: rgba.into_raw(),
                    width: w,
                    height: h,
                });
            }
            _ => {
                let texture = Texture2D::from_rgba8(w, h, rgba.as_raw());
                texture.set_filter(FilterMode::Linear);
                self.texture = Some(texture);
            }
        }

        self.captions = if self.font.is_some() {
            Vec::new()
        } else {
            captions(&processed.outcome.detections)
        };

        self.status = status_line(processed, labeled);
    }

    fn draw(&self) {
        clear_background(BLACK);

        if let Some(texture) = &self.texture {
            // 保持宽高比居中
            let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
            let size = vec2(texture.width() * scale, texture.height() * scale);
            let origin = vec2(
                (screen_width() - size.x) / 2.0,
                (screen_height() - size.y) / 2.0,
            );
            draw_texture_ex(
                texture,
                origin.x,
                origin.y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(size),
                    ..Default::default()
                },
            );

            for caption in &self.captions {
                let x = caption.x as f32 * scale + origin.x;
                let y = caption.y as f32 * scale + origin.y;
                draw_text(&caption.text, x, y - 5.0, 20.0, GREEN);
            }
        }

        draw_text(&self.status, 10.0, screen_height() - 10.0, 20.0, WHITE);
        draw_text("Esc: stop", 10.0, 20.0, 20.0, GRAY);
    }
}

/// 状态栏文字 (内置字体只有 ASCII 字形)
fn status_line(processed: &Processed, labeled: usize) -> String {
    match &processed.outcome.written {
        Some(name) => format!(
            "{} -> {} ({} objects) | written {}",
            processed.item.origin,
            name.stem(),
            processed.outcome.detections.len(),
            labeled
        ),
        None => format!("{} (background) | written {}", processed.item.origin, labeled),
    }
}

/// 带预览运行批次
pub async fn run_with_preview<S>(mut batch: Batch<S>, font: Option<FontArc>) -> Result<BatchSummary>
where
    S: Iterator<Item = Result<SourceItem>>,
{
    let mut preview = Preview::new(font);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            info!("🛑 Esc 按下, 提前结束批次");
            return Ok(batch.abort());
        }

        let Some(processed) = batch.step()? else {
            break;
        };
        preview.update(&processed, batch.summary().labeled);
        preview.draw();

        next_frame().await;
    }

    Ok(batch.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::OutputNamer;
    use crate::pipeline::LabelOutcome;
    use tempfile::TempDir;

    fn processed(written: bool) -> Processed {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path());
        namer.initialize().unwrap();
        Processed {
            item: SourceItem {
                image: image::RgbImage::new(4, 4),
                name: None,
                prefix: Some("clip".to_string()),
                origin: "clip #20".to_string(),
            },
            outcome: LabelOutcome {
                detections: Vec::new(),
                written: written.then(|| namer.allocate(None, Some("clip")).unwrap()),
            },
        }
    }

    #[test]
    fn status_line_is_ascii() {
        let labeled = status_line(&processed(true), 3);
        assert_eq!(labeled, "clip #20 -> clip_000000 (0 objects) | written 3");
        assert!(labeled.is_ascii());

        let background = status_line(&processed(false), 0);
        assert_eq!(background, "clip #20 (background) | written 0");
    }
}
