use std::path::Path;
use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::LoopMetricsSnapshot;
use crate::zone::entity::TILE_SIZE;
use crate::zone::RenderFrame;

use super::assets::SpriteCache;
use super::canvas::{draw_rect, draw_sprite, tint_pixel, Canvas};
use super::text::{draw_outlined_text, text_height, text_width};
use super::{world_to_screen_px, Viewport};

const CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const HUD_COLOR: [u8; 4] = [255, 255, 255, 255];
const SPEECH_GAP_PX: i32 = 2;
const HUD_MARGIN_PX: i32 = 2;

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    pixel_scale: u32,
    sprites: SpriteCache,
}

impl Renderer {
    /// The frame buffer is the window size divided by `pixel_scale`; pixels
    /// upscales it to the surface.
    pub fn new(window: Arc<Window>, assets_dir: &Path, pixel_scale: u32) -> Result<Self, Error> {
        let pixel_scale = pixel_scale.max(1);
        let size = window.inner_size();
        let (pixels, viewport) =
            Self::build_pixels(Arc::clone(&window), size.width, size.height, pixel_scale)?;
        Ok(Self {
            window,
            pixels,
            viewport,
            pixel_scale,
            sprites: SpriteCache::new(assets_dir),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let (pixels, viewport) =
            Self::build_pixels(Arc::clone(&self.window), width, height, self.pixel_scale)?;
        self.pixels = pixels;
        self.viewport = viewport;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
        pixel_scale: u32,
    ) -> Result<(Pixels<'static>, Viewport), Error> {
        let viewport = Viewport {
            width: (width / pixel_scale).max(1),
            height: (height / pixel_scale).max(1),
        };
        let surface = SurfaceTexture::new(width.max(1), height.max(1), window);
        let pixels = Pixels::new(viewport.width, viewport.height, surface)?;
        Ok((pixels, viewport))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn render(
        &mut self,
        frame: Option<&RenderFrame>,
        metrics: &LoopMetricsSnapshot,
    ) -> Result<(), Error> {
        let viewport = self.viewport;
        let mut canvas = Canvas::new(self.pixels.frame_mut(), viewport.width, viewport.height);
        draw_frame(&mut canvas, &mut self.sprites, frame, metrics.tps);
        self.pixels.render()
    }
}

/// Paints one frame: entities in list order, then every speech line on top,
/// then the tick-rate readout.
pub(crate) fn draw_frame(
    canvas: &mut Canvas<'_>,
    sprites: &mut SpriteCache,
    frame: Option<&RenderFrame>,
    tps: f32,
) {
    canvas.clear(CLEAR_COLOR);
    let viewport = Viewport {
        width: canvas.width(),
        height: canvas.height(),
    };
    let tile = TILE_SIZE as i32;

    if let Some(frame) = frame {
        for item in &frame.items {
            let (left, top) = world_to_screen_px(item.position, frame.focus, viewport);
            let tint = item.tint.map(|tint| tint.0);
            match sprites.get(&item.image) {
                Some(sprite) => draw_sprite(canvas, left, top, sprite, 1, tint, item.mirror),
                None => draw_rect(canvas, left, top, tile, tint_pixel(PLACEHOLDER_COLOR, tint)),
            }
        }

        for item in &frame.items {
            let Some(speech) = item.speech.as_deref() else {
                continue;
            };
            let (left, top) = world_to_screen_px(item.position, frame.focus, viewport);
            let x = left + tile / 2 - text_width(speech, 1) / 2;
            let y = top - text_height(1) - SPEECH_GAP_PX;
            let color = item.tint.map_or(HUD_COLOR, |tint| tint.0);
            draw_outlined_text(canvas, x, y, speech, color, 1);
        }
    }

    let readout = format!("{tps:.2}");
    draw_outlined_text(canvas, HUD_MARGIN_PX, HUD_MARGIN_PX, &readout, HUD_COLOR, 1);
}
