use super::canvas::{write_pixel_rgba_clipped, Canvas};

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;
const FIRST_GLYPH: char = ' ';
const OUTLINE_COLOR: [u8; 4] = [0, 0, 0, 255];

/// 3x5 glyphs for printable ASCII, `' '..='~'`. Three bits per row, top row
/// in the high bits.
const GLYPHS: [u16; 95] = [
    0x0000, 0x2482, 0x5a00, 0x5f7d, 0x7ddf, 0x52a5, 0x2aab, 0x2400, //
    0x1491, 0x4494, 0x0aa8, 0x05d0, 0x0014, 0x01c0, 0x0002, 0x12a4, //
    0x7b6f, 0x2c97, 0x73e7, 0x73cf, 0x5bc9, 0x79cf, 0x79ef, 0x7292, //
    0x7bef, 0x7bcf, 0x0410, 0x0414, 0x1511, 0x0e38, 0x4454, 0x72c2, //
    0x7be7, 0x2bed, 0x6bae, 0x7927, 0x6b6e, 0x79a7, 0x79a4, 0x796f, //
    0x5bed, 0x7497, 0x726f, 0x5bad, 0x4927, 0x5fed, 0x5ffd, 0x7b6f, //
    0x6ba4, 0x7b79, 0x6bad, 0x79cf, 0x7492, 0x5b6f, 0x5b6a, 0x5bfd, //
    0x5aad, 0x5a92, 0x72a7, 0x6926, 0x4889, 0x324b, 0x2a00, 0x0007, //
    0x4400, 0x0e7f, 0x49ae, 0x0f27, 0x13ef, 0x0fa7, 0x39a4, 0x0f79, //
    0x49ad, 0x2092, 0x106a, 0x4bad, 0x4927, 0x0ded, 0x0d6d, 0x0f6f, //
    0x0d74, 0x0f79, 0x0d64, 0x0f8f, 0x2e93, 0x0b6f, 0x0b6a, 0x0b7a, //
    0x0a95, 0x0b79, 0x0e57, 0x3593, 0x2492, 0x64d6, 0x0780,
];

fn glyph_for(ch: char) -> u16 {
    let index = (ch as u32).wrapping_sub(FIRST_GLYPH as u32) as usize;
    // Unknown characters render as '?'.
    GLYPHS.get(index).copied().unwrap_or(GLYPHS[31])
}

fn glyph_pixel(glyph: u16, col: i32, row: i32) -> bool {
    let row_bits = (glyph >> (3 * (GLYPH_HEIGHT - 1 - row))) & 0b111;
    row_bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0
}

pub fn text_width(text: &str, scale: i32) -> i32 {
    let chars = text.chars().count() as i32;
    if chars == 0 {
        return 0;
    }
    (chars * GLYPH_ADVANCE - 1) * scale.max(1)
}

pub fn text_height(scale: i32) -> i32 {
    GLYPH_HEIGHT * scale.max(1)
}

pub fn draw_text(canvas: &mut Canvas<'_>, x: i32, y: i32, text: &str, color: [u8; 4], scale: i32) {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars() {
        let glyph = glyph_for(ch);
        for row in 0..GLYPH_HEIGHT {
            for col in 0..GLYPH_WIDTH {
                if !glyph_pixel(glyph, col, row) {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        write_pixel_rgba_clipped(
                            canvas,
                            pen_x + col * scale + sx,
                            y + row * scale + sy,
                            color,
                        );
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

/// Text with a one-pixel black ring so it reads over any background.
pub fn draw_outlined_text(
    canvas: &mut Canvas<'_>,
    x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
    scale: i32,
) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx != 0 || dy != 0 {
                draw_text(canvas, x + dx, y + dy, text, OUTLINE_COLOR, scale);
            }
        }
    }
    draw_text(canvas, x, y, text, color, scale);
}
