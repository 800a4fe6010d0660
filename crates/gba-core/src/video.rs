//! Scanline timing and the software renderer
//!
//! A scanline is 1006 cycles of draw followed by 226 cycles of horizontal
//! blank; a frame is 228 scanlines, the last 68 in vertical blank. The frame
//! counter advances when vertical blank begins, after all 160 visible lines
//! have been drawn.

use crate::memory::{read16, write16};
use crate::serialize::{offsets, StateReader, StateWriter};

pub const VIDEO_HORIZONTAL_PIXELS: usize = 240;
pub const VIDEO_VERTICAL_PIXELS: usize = 160;
pub const VIDEO_HDRAW_LENGTH: i32 = 1006;
pub const VIDEO_HBLANK_LENGTH: i32 = 226;
pub const VIDEO_HORIZONTAL_LENGTH: i32 = VIDEO_HDRAW_LENGTH + VIDEO_HBLANK_LENGTH;
pub const VIDEO_VERTICAL_TOTAL_PIXELS: u16 = 228;
pub const VIDEO_TOTAL_LENGTH: i32 = VIDEO_HORIZONTAL_LENGTH * VIDEO_VERTICAL_TOTAL_PIXELS as i32;

pub const SIZE_PALETTE_RAM: usize = 0x400;
pub const SIZE_VRAM: usize = 0x18000;
pub const SIZE_OAM: usize = 0x400;

const DISPSTAT_VBLANK: u8 = 0x1;
const DISPSTAT_HBLANK: u8 = 0x2;
const DISPSTAT_VCOUNTER: u8 = 0x4;

const DISPCNT_FRAME_SELECT: u16 = 0x0010;
const DISPCNT_FORCED_BLANK: u16 = 0x0080;

/// Pixel written for every dot while the display is force-blanked
const FORCED_BLANK_COLOR: u32 = 0x00F8_F8F8;

/// Expand a 15-bit BGR color into a packed pixel, each channel in the top
/// five bits of its byte, red in the low byte
pub fn color_to_pixel(color: u16) -> u32 {
    let c = u32::from(color);
    ((c & 0x1F) << 3) | ((c << 6) & 0xF800) | ((c << 9) & 0xF8_0000)
}

/// Map a VRAM address onto the 96 KiB backing store
pub fn vram_offset(address: u32) -> usize {
    let offset = (address & 0x1FFFF) as usize;
    if offset >= SIZE_VRAM {
        offset - 0x8000
    } else {
        offset
    }
}

/// Renderer drawing into a fixed 240x160 framebuffer
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    output: Box<[u32]>,
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self {
            output: vec![0; VIDEO_HORIZONTAL_PIXELS * VIDEO_VERTICAL_PIXELS].into_boxed_slice(),
        }
    }

    /// The frame in row-major order
    pub fn output(&self) -> &[u32] {
        &self.output
    }

    fn draw_scanline(&mut self, y: usize, dispcnt: u16, palette: &[u8], vram: &[u8]) {
        let row = &mut self.output[y * VIDEO_HORIZONTAL_PIXELS..(y + 1) * VIDEO_HORIZONTAL_PIXELS];
        if dispcnt & DISPCNT_FORCED_BLANK != 0 {
            row.fill(FORCED_BLANK_COLOR);
            return;
        }
        let backdrop = color_to_pixel(read16(palette, 0));
        let frame = if dispcnt & DISPCNT_FRAME_SELECT != 0 { 0xA000 } else { 0 };
        match dispcnt & 7 {
            3 => {
                for (x, pixel) in row.iter_mut().enumerate() {
                    *pixel = color_to_pixel(read16(vram, (y * VIDEO_HORIZONTAL_PIXELS + x) * 2));
                }
            }
            4 => {
                for (x, pixel) in row.iter_mut().enumerate() {
                    let index = usize::from(vram[frame + y * VIDEO_HORIZONTAL_PIXELS + x]);
                    *pixel = color_to_pixel(read16(palette, index * 2));
                }
            }
            5 => {
                for (x, pixel) in row.iter_mut().enumerate() {
                    *pixel = if x < 160 && y < 128 {
                        color_to_pixel(read16(vram, frame + (y * 160 + x) * 2))
                    } else {
                        backdrop
                    };
                }
            }
            _ => row.fill(backdrop),
        }
    }
}

/// Display timing and video memory
#[derive(Debug, Clone)]
pub struct Video {
    pub(crate) palette: Box<[u8]>,
    pub(crate) vram: Box<[u8]>,
    pub(crate) oam: Box<[u8]>,
    renderer: SoftwareRenderer,
    vcount: u16,
    in_hblank: bool,
    flags: u8,
    next_event: i32,
    frame_counter: u32,
}

impl Default for Video {
    fn default() -> Self {
        Self::new()
    }
}

impl Video {
    pub fn new() -> Self {
        Self {
            palette: vec![0; SIZE_PALETTE_RAM].into_boxed_slice(),
            vram: vec![0; SIZE_VRAM].into_boxed_slice(),
            oam: vec![0; SIZE_OAM].into_boxed_slice(),
            renderer: SoftwareRenderer::new(),
            vcount: 0,
            in_hblank: false,
            flags: 0,
            next_event: VIDEO_HDRAW_LENGTH,
            frame_counter: 0,
        }
    }

    /// Restart timing at the top of the frame; video memory is kept
    pub fn reset(&mut self) {
        self.vcount = 0;
        self.in_hblank = false;
        self.flags = 0;
        self.next_event = VIDEO_HDRAW_LENGTH;
        self.frame_counter = 0;
    }

    /// Frames completed since reset
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn vcount(&self) -> u16 {
        self.vcount
    }

    /// Status bits owned by the video unit, merged into DISPSTAT reads
    pub fn status_flags(&self) -> u16 {
        u16::from(self.flags)
    }

    pub fn renderer(&self) -> &SoftwareRenderer {
        &self.renderer
    }

    pub fn store_palette16(&mut self, address: u32, value: u16) {
        write16(&mut self.palette, (address & 0x3FE) as usize, value);
    }

    pub fn store_vram16(&mut self, address: u32, value: u16) {
        write16(&mut self.vram, vram_offset(address & !1), value);
    }

    pub fn store_oam16(&mut self, address: u32, value: u16) {
        write16(&mut self.oam, (address & 0x3FE) as usize, value);
    }

    pub fn load_palette16(&self, address: u32) -> u16 {
        read16(&self.palette, (address & 0x3FE) as usize)
    }

    pub fn load_vram16(&self, address: u32) -> u16 {
        read16(&self.vram, vram_offset(address & !1))
    }

    pub fn load_oam16(&self, address: u32) -> u16 {
        read16(&self.oam, (address & 0x3FE) as usize)
    }

    /// Advance timing by `cycles`, returning cycles until the next event
    pub fn process_events(&mut self, cycles: i32, dispcnt: u16, dispstat: u16) -> i32 {
        self.next_event -= cycles;
        while self.next_event <= 0 {
            if !self.in_hblank {
                self.in_hblank = true;
                self.flags |= DISPSTAT_HBLANK;
                if usize::from(self.vcount) < VIDEO_VERTICAL_PIXELS {
                    self.renderer.draw_scanline(
                        usize::from(self.vcount),
                        dispcnt,
                        &self.palette,
                        &self.vram,
                    );
                }
                self.next_event += VIDEO_HBLANK_LENGTH;
            } else {
                self.in_hblank = false;
                self.flags &= !DISPSTAT_HBLANK;
                self.vcount = (self.vcount + 1) % VIDEO_VERTICAL_TOTAL_PIXELS;
                match usize::from(self.vcount) {
                    VIDEO_VERTICAL_PIXELS => {
                        self.flags |= DISPSTAT_VBLANK;
                        self.frame_counter = self.frame_counter.wrapping_add(1);
                        tracing::trace!(frame = self.frame_counter, "vblank");
                    }
                    227 => self.flags &= !DISPSTAT_VBLANK,
                    _ => {}
                }
                if self.vcount == dispstat >> 8 {
                    self.flags |= DISPSTAT_VCOUNTER;
                } else {
                    self.flags &= !DISPSTAT_VCOUNTER;
                }
                self.next_event += VIDEO_HDRAW_LENGTH;
            }
        }
        self.next_event
    }

    pub fn save_state(&self, w: &mut StateWriter<'_>) {
        w.seek(offsets::VIDEO);
        w.put_u16(self.vcount);
        w.put_bool(self.in_hblank);
        w.put_u8(self.flags);
        w.put_i32(self.next_event);
        w.put_u32(self.frame_counter);
        w.seek(offsets::PALETTE);
        w.put_bytes(&self.palette);
        w.seek(offsets::OAM);
        w.put_bytes(&self.oam);
        w.seek(offsets::VRAM);
        w.put_bytes(&self.vram);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) {
        r.seek(offsets::VIDEO);
        self.vcount = r.get_u16() % VIDEO_VERTICAL_TOTAL_PIXELS;
        self.in_hblank = r.get_bool();
        self.flags = r.get_u8() & 0x7;
        self.next_event = r.get_i32();
        self.frame_counter = r.get_u32();
        r.seek(offsets::PALETTE);
        r.get_bytes(&mut self.palette);
        r.seek(offsets::OAM);
        r.get_bytes(&mut self.oam);
        r.seek(offsets::VRAM);
        r.get_bytes(&mut self.vram);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frame(video: &mut Video, dispcnt: u16) {
        let start = video.frame_counter();
        while video.frame_counter() == start {
            video.process_events(VIDEO_HORIZONTAL_LENGTH, dispcnt, 0);
        }
    }

    #[test]
    fn test_color_to_pixel() {
        assert_eq!(color_to_pixel(0), 0);
        assert_eq!(color_to_pixel(0x001F), 0x0000_00F8);
        assert_eq!(color_to_pixel(0x03E0), 0x0000_F800);
        assert_eq!(color_to_pixel(0x7C00), 0x00F8_0000);
        assert_eq!(color_to_pixel(0x7FFF), 0x00F8_F8F8);
    }

    #[test]
    fn test_vram_mirror() {
        assert_eq!(vram_offset(0x0601_0000), 0x10000);
        assert_eq!(vram_offset(0x0601_8000), 0x10000);
        assert_eq!(vram_offset(0x0602_0000), 0);
    }

    #[test]
    fn test_frame_counter_on_vblank() {
        let mut video = Video::new();
        let mut cycles = 0;
        while video.frame_counter() == 0 {
            cycles += 1;
            video.process_events(1, 0, 0);
        }
        assert_eq!(cycles, VIDEO_HORIZONTAL_LENGTH * 160);
        assert_eq!(video.vcount(), 160);
        assert_eq!(video.status_flags() & u16::from(DISPSTAT_VBLANK), 1);
    }

    #[test]
    fn test_next_event_is_positive() {
        let mut video = Video::new();
        assert_eq!(video.process_events(0, 0, 0), VIDEO_HDRAW_LENGTH);
        assert_eq!(video.process_events(VIDEO_HDRAW_LENGTH, 0, 0), VIDEO_HBLANK_LENGTH);
        assert!(video.status_flags() & u16::from(DISPSTAT_HBLANK) != 0);
    }

    #[test]
    fn test_forced_blank_is_white() {
        let mut video = Video::new();
        run_frame(&mut video, DISPCNT_FORCED_BLANK);
        assert!(video.renderer().output().iter().all(|&p| p == FORCED_BLANK_COLOR));
    }

    #[test]
    fn test_mode3_bitmap() {
        let mut video = Video::new();
        video.store_vram16(0x0600_0000, 0x001F);
        run_frame(&mut video, 3);
        assert_eq!(video.renderer().output()[0], 0xF8);
        assert_eq!(video.renderer().output()[1], 0);
    }

    #[test]
    fn test_mode4_paletted() {
        let mut video = Video::new();
        video.store_palette16(0x0500_0002, 0x03E0);
        video.store_vram16(0x0600_0000, 0x0001);
        run_frame(&mut video, 4);
        assert_eq!(video.renderer().output()[0], 0xF800);
    }
}
