//! Integration tests for the C ABI entry points

mod common;

use std::ptr;

use common::{bios, rom};
use gba_bridge::ffi::*;
use gba_bridge::{RawMemoryAreas, AUDIO_BUFFER_LEN, AUDIO_PAIRS_MAX, FRAMEBUFFER_PIXELS};

#[test]
fn test_frame_scenario() {
    unsafe {
        let ctx = gba_create(ptr::null());
        assert!(!ctx.is_null());

        let garbage = [0x42u8; 0x300];
        assert_eq!(gba_load(ctx, garbage.as_ptr(), garbage.len() as i32), 0);
        let image = rom(b"AUNE");
        assert_eq!(gba_load(ctx, image.as_ptr(), image.len() as i32), 1);

        let mut video = vec![0u32; FRAMEBUFFER_PIXELS];
        let mut audio = vec![0i16; AUDIO_BUFFER_LEN];
        let mut nsamp = -1;
        gba_advance(
            ctx,
            0,
            video.as_mut_ptr(),
            &mut nsamp,
            audio.as_mut_ptr(),
            0,
            0,
            0,
            0,
            0,
        );
        assert!((0..=AUDIO_PAIRS_MAX as i32).contains(&nsamp));
        assert!(video.iter().all(|&p| p >> 24 == 0xFF));
        assert_eq!((*ctx).frame_counter(), 1);

        gba_destroy(ctx);
    }
}

#[test]
fn test_invalid_bios_returns_null() {
    let garbage = vec![0u8; 0x4000];
    unsafe {
        assert!(gba_create(garbage.as_ptr()).is_null());
        let ctx = gba_create(bios().as_ptr());
        assert!(!ctx.is_null());
        gba_destroy(ctx);
    }
}

#[test]
fn test_negative_length_rejected() {
    let image = rom(b"AUNE");
    unsafe {
        let ctx = gba_create(ptr::null());
        assert_eq!(gba_load(ctx, image.as_ptr(), -1), 0);
        assert_eq!(gba_load(ctx, ptr::null(), 16), 0);
        gba_destroy(ctx);
    }
}

#[test]
fn test_memory_areas_are_live() {
    let image = rom(b"AUNE");
    unsafe {
        let ctx = gba_create(ptr::null());
        let mut areas = RawMemoryAreas::default();
        gba_get_memory_areas(ctx, &mut areas);
        assert!(!areas.wram.is_null());
        assert!(areas.rom.is_null());

        assert_eq!(gba_load(ctx, image.as_ptr(), image.len() as i32), 1);
        gba_get_memory_areas(ctx, &mut areas);
        assert_eq!(*areas.rom.add(0xAC), b'A');
        *areas.iwram.add(0x10) = 0x99;
        assert_eq!((*ctx).memory_areas().iwram[0x10], 0x99);
        gba_destroy(ctx);
    }
}

#[test]
fn test_state_round_trip() {
    let image = rom(b"AUNE");
    unsafe {
        let ctx = gba_create(ptr::null());
        gba_load(ctx, image.as_ptr(), image.len() as i32);
        gba_advance(
            ctx,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            0,
            0,
            0,
            0,
        );
        let size = gba_get_state_size() as usize;
        assert_eq!(size, 0x61000);
        let mut first = vec![0u8; size];
        let mut second = vec![0u8; size];
        gba_get_state(ctx, first.as_mut_ptr());
        gba_put_state(ctx, first.as_ptr());
        gba_get_state(ctx, second.as_mut_ptr());
        assert!(first == second);

        // A rejected state is ignored
        let blank = vec![0u8; size];
        gba_put_state(ctx, blank.as_ptr());
        gba_get_state(ctx, second.as_mut_ptr());
        assert!(first == second);
        gba_destroy(ctx);
    }
}

#[test]
fn test_save_ram_round_trip() {
    let image = rom(b"AREE");
    unsafe {
        let ctx = gba_create(ptr::null());
        gba_load(ctx, image.as_ptr(), image.len() as i32);
        let size = gba_get_save_ram_size(ctx);
        assert_eq!(size, 0x8000);
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        gba_put_save_ram(ctx, data.as_ptr());
        let mut out = vec![0u8; size as usize];
        gba_get_save_ram(ctx, out.as_mut_ptr());
        assert!(data == out);
        gba_destroy(ctx);
    }
}

#[test]
fn test_null_context_ignored() {
    let mut buf = vec![0u8; 16];
    unsafe {
        let ctx = ptr::null_mut();
        gba_reset(ctx);
        assert_eq!(gba_load(ctx, buf.as_ptr(), 16), 0);
        gba_advance(
            ctx,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            0,
            0,
            0,
            0,
        );
        assert_eq!(gba_get_save_ram_size(ctx), 0);
        gba_get_save_ram(ctx, buf.as_mut_ptr());
        gba_put_save_ram(ctx, buf.as_ptr());
        gba_get_state(ctx, buf.as_mut_ptr());
        gba_put_state(ctx, buf.as_ptr());
        let mut areas = RawMemoryAreas::default();
        gba_get_memory_areas(ctx, &mut areas);
        assert!(areas.bios.is_null());
        gba_destroy(ctx);
    }
}
