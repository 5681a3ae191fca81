/// Decoded RGBA8 image kept in memory for blitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadedImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rgba: Vec<u8>,
}

impl LoadedImage {
    fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Integer pixel rectangle in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScreenRect {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) width: i32,
    pub(crate) height: i32,
}

impl ScreenRect {
    pub(crate) const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Clipped drawing over an RGBA8 frame buffer. Every write outside the
/// frame is dropped.
pub(crate) struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn clear(&mut self, color: [u8; 4]) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let bytes = &self.frame[offset..offset + 4];
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Writes one pixel, blending over the existing colour when `color` is
    /// translucent.
    pub(crate) fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        let dst = &mut self.frame[offset..offset + 4];
        match color[3] {
            0 => {}
            255 => dst.copy_from_slice(&color),
            alpha => {
                let alpha = u16::from(alpha);
                for channel in 0..3 {
                    let src = u16::from(color[channel]);
                    let old = u16::from(dst[channel]);
                    dst[channel] = ((src * alpha + old * (255 - alpha)) / 255) as u8;
                }
                dst[3] = 255;
            }
        }
    }

    pub(crate) fn fill_rect(&mut self, rect: ScreenRect, color: [u8; 4]) {
        let start_x = rect.x.max(0);
        let start_y = rect.y.max(0);
        let end_x = rect.x.saturating_add(rect.width).min(self.width as i32);
        let end_y = rect.y.saturating_add(rect.height).min(self.height as i32);
        for y in start_y..end_y {
            for x in start_x..end_x {
                self.put(x, y, color);
            }
        }
    }

    pub(crate) fn outline_rect(&mut self, rect: ScreenRect, color: [u8; 4]) {
        if rect.width <= 1 || rect.height <= 1 {
            return;
        }
        let right = rect.x + rect.width - 1;
        let bottom = rect.y + rect.height - 1;
        self.fill_rect(ScreenRect::new(rect.x, rect.y, rect.width, 1), color);
        self.fill_rect(ScreenRect::new(rect.x, bottom, rect.width, 1), color);
        self.fill_rect(ScreenRect::new(rect.x, rect.y, 1, rect.height), color);
        self.fill_rect(ScreenRect::new(right, rect.y, 1, rect.height), color);
    }

    /// Nearest-neighbour copy of `source` (a sub-rectangle of `image`) into
    /// `target`. Fully transparent texels are skipped.
    pub(crate) fn blit(&mut self, image: &LoadedImage, source: ScreenRect, target: ScreenRect) {
        if source.is_empty() || target.is_empty() {
            return;
        }
        let start_x = target.x.max(0);
        let start_y = target.y.max(0);
        let end_x = target.x.saturating_add(target.width).min(self.width as i32);
        let end_y = target.y.saturating_add(target.height).min(self.height as i32);
        let scale_x = source.width as f32 / target.width as f32;
        let scale_y = source.height as f32 / target.height as f32;

        for y in start_y..end_y {
            let src_y = source.y + ((y - target.y) as f32 * scale_y) as i32;
            for x in start_x..end_x {
                let src_x = source.x + ((x - target.x) as f32 * scale_x) as i32;
                if src_x < 0 || src_y < 0 {
                    continue;
                }
                if let Some(texel) = image.texel(src_x as u32, src_y as u32) {
                    self.put(x, y, texel);
                }
            }
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let offset = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?
            .checked_mul(4)?;
        (offset + 4 <= self.frame.len()).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    #[test]
    fn fill_rect_is_clipped_to_frame() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        let mut canvas = Canvas::new(&mut frame, 4, 4);
        canvas.fill_rect(ScreenRect::new(-2, -2, 4, 4), RED);

        assert_eq!(canvas.pixel(0, 0), Some(RED));
        assert_eq!(canvas.pixel(1, 1), Some(RED));
        assert_eq!(canvas.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn translucent_colour_blends() {
        let mut frame = vec![0u8; 4];
        let mut canvas = Canvas::new(&mut frame, 1, 1);
        canvas.clear(BLACK);
        canvas.put(0, 0, [255, 255, 255, 51]);

        assert_eq!(canvas.pixel(0, 0), Some([51, 51, 51, 255]));
    }

    #[test]
    fn blit_scales_source_region() {
        let image = LoadedImage {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        let mut frame = vec![0u8; 4 * 4 * 2];
        let mut canvas = Canvas::new(&mut frame, 4, 2);
        canvas.blit(&image, ScreenRect::new(1, 0, 1, 1), ScreenRect::new(0, 0, 2, 2));

        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 255, 255]));
        assert_eq!(canvas.pixel(2, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut frame = vec![0u8; 5 * 5 * 4];
        let mut canvas = Canvas::new(&mut frame, 5, 5);
        canvas.outline_rect(ScreenRect::new(0, 0, 5, 5), RED);

        assert_eq!(canvas.pixel(0, 4), Some(RED));
        assert_eq!(canvas.pixel(4, 2), Some(RED));
        assert_eq!(canvas.pixel(2, 2), Some([0, 0, 0, 0]));
    }
}
