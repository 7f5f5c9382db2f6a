use super::assets::Sprite;

/// Borrowed RGBA8 frame buffer.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }
}

pub fn write_pixel_rgba_clipped(canvas: &mut Canvas<'_>, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= canvas.width as i32 || y >= canvas.height as i32 {
        return;
    }
    let Some(pixel_offset) = (y as usize)
        .checked_mul(canvas.width as usize)
        .and_then(|row| row.checked_add(x as usize))
    else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > canvas.frame.len() {
        return;
    }
    canvas.frame[byte_offset..end].copy_from_slice(&color);
}

pub fn draw_rect(canvas: &mut Canvas<'_>, left: i32, top: i32, size: i32, color: [u8; 4]) {
    for y in top..top + size {
        for x in left..left + size {
            write_pixel_rgba_clipped(canvas, x, y, color);
        }
    }
}

/// Multiplies each channel by the tint, as a color matrix scale would.
pub fn tint_pixel(pixel: [u8; 4], tint: Option<[u8; 4]>) -> [u8; 4] {
    let Some(tint) = tint else {
        return pixel;
    };
    let mut out = [0u8; 4];
    for channel in 0..4 {
        out[channel] = ((u16::from(pixel[channel]) * u16::from(tint[channel]) + 127) / 255) as u8;
    }
    out
}

/// Draws `sprite` with its top-left corner at (`left`, `top`), scaled by an
/// integer factor. Fully transparent texels are skipped.
pub fn draw_sprite(
    canvas: &mut Canvas<'_>,
    left: i32,
    top: i32,
    sprite: &Sprite,
    scale: i32,
    tint: Option<[u8; 4]>,
    mirror: bool,
) {
    let scale = scale.max(1);
    let expected_len = sprite.width as usize * sprite.height as usize * 4;
    if sprite.width == 0 || sprite.height == 0 || sprite.rgba.len() < expected_len {
        return;
    }
    for src_y in 0..sprite.height {
        for src_x in 0..sprite.width {
            let offset = (src_y as usize * sprite.width as usize + src_x as usize) * 4;
            let texel = [
                sprite.rgba[offset],
                sprite.rgba[offset + 1],
                sprite.rgba[offset + 2],
                sprite.rgba[offset + 3],
            ];
            if texel[3] == 0 {
                continue;
            }
            let column = if mirror {
                sprite.width - 1 - src_x
            } else {
                src_x
            };
            let color = tint_pixel(texel, tint);
            draw_rect(
                canvas,
                left + column as i32 * scale,
                top + src_y as i32 * scale,
                scale,
                color,
            );
        }
    }
}
