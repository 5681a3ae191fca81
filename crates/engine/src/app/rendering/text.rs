use super::canvas::Canvas;

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;
const FIRST_GLYPH: u8 = b' ';
const FALLBACK_GLYPH: char = '?';

/// 3x5 bitmaps for `' '..='`'`, five rows of three bits, top row in the high
/// bits. Lowercase letters reuse the uppercase shapes.
const GLYPHS: [u16; 65] = [
    0x0000, 0x2482, 0x5A00, 0x5F7D, 0x7DDF, 0x52A5, 0x2AAB, 0x2400, //
    0x1491, 0x4494, 0x0AA8, 0x05D0, 0x0014, 0x01C0, 0x0002, 0x12A4, //
    0x7B6F, 0x2C97, 0x73E7, 0x73CF, 0x5BC9, 0x79CF, 0x79EF, 0x7292, //
    0x7BEF, 0x7BCF, 0x0410, 0x0414, 0x1511, 0x0E38, 0x4454, 0x72C2, //
    0x7BE7, 0x2BED, 0x6BAE, 0x7927, 0x6B6E, 0x79A7, 0x79A4, 0x796F, //
    0x5BED, 0x7497, 0x726F, 0x5BAD, 0x4927, 0x5FED, 0x5FFD, 0x7B6F, //
    0x6BA4, 0x7B79, 0x6BAD, 0x79CF, 0x7492, 0x5B6F, 0x5B6A, 0x5BFD, //
    0x5AAD, 0x5A92, 0x72A7, 0x6926, 0x4889, 0x324B, 0x2A00, 0x0007, //
    0x4400,
];

fn glyph_bits(ch: char) -> u16 {
    let folded = ch.to_ascii_uppercase();
    let ch = if (' '..='`').contains(&folded) {
        folded
    } else if folded.is_whitespace() {
        ' '
    } else {
        FALLBACK_GLYPH
    };
    GLYPHS[(ch as u8 - FIRST_GLYPH) as usize]
}

pub(crate) fn glyph_advance(scale: i32) -> i32 {
    (GLYPH_WIDTH + 1) * scale
}

pub(crate) fn line_advance(scale: i32) -> i32 {
    (GLYPH_HEIGHT + 2) * scale
}

pub(crate) fn text_width(text: &str, scale: i32) -> i32 {
    let count = text.chars().count() as i32;
    if count == 0 {
        return 0;
    }
    count * glyph_advance(scale) - scale
}

pub(crate) fn draw_text(
    canvas: &mut Canvas<'_>,
    mut x: i32,
    y: i32,
    text: &str,
    scale: i32,
    color: [u8; 4],
) {
    let scale = scale.max(1);
    for ch in text.chars() {
        draw_glyph(canvas, x, y, glyph_bits(ch), scale, color);
        x += glyph_advance(scale);
    }
}

fn draw_glyph(canvas: &mut Canvas<'_>, x: i32, y: i32, bits: u16, scale: i32, color: [u8; 4]) {
    for row in 0..GLYPH_HEIGHT {
        for col in 0..GLYPH_WIDTH {
            let shift = (GLYPH_HEIGHT - 1 - row) * GLYPH_WIDTH + (GLYPH_WIDTH - 1 - col);
            if bits & (1 << shift) == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    canvas.put(x + col * scale + sx, y + row * scale + sy, color);
                }
            }
        }
    }
}

/// Greedy word wrap to at most `max_chars` per line. Words longer than a
/// line are split.
pub(crate) fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
