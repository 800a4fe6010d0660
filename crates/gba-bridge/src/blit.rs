//! Pixel format conversion
//!
//! The renderer stores each 5-bit channel in the top bits of its own byte,
//! red first. Hosts take `0xAARRGGBB`, so the red and blue bytes swap, the
//! low three bits of every channel are filled by replicating its top bits
//! and alpha is opaque.

/// Convert one renderer pixel to `0xAARRGGBB`
#[inline]
pub fn convert_pixel(pixel: u32) -> u32 {
    let [r, g, b, _] = pixel.to_le_bytes();
    u32::from_le_bytes([b | b >> 5, g | g >> 5, r | r >> 5, 0xFF])
}

/// Convert a whole frame into a host buffer
pub fn blit(src: &[u32], dst: &mut [u32]) {
    for (out, &pixel) in dst.iter_mut().zip(src) {
        *out = convert_pixel(pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gba_core::video::color_to_pixel;

    #[test]
    fn test_channel_extremes() {
        assert_eq!(convert_pixel(color_to_pixel(0x0000)), 0xFF00_0000);
        assert_eq!(convert_pixel(color_to_pixel(0x7FFF)), 0xFFFF_FFFF);
        assert_eq!(convert_pixel(color_to_pixel(0x001F)), 0xFFFF_0000);
        assert_eq!(convert_pixel(color_to_pixel(0x03E0)), 0xFF00_FF00);
        assert_eq!(convert_pixel(color_to_pixel(0x7C00)), 0xFF00_00FF);
    }

    #[test]
    fn test_blit_stops_at_shorter_buffer() {
        let src = [0x00F8_F8F8u32; 4];
        let mut dst = [0u32; 2];
        blit(&src, &mut dst);
        assert_eq!(dst, [0xFFFF_FFFF; 2]);
    }
}
