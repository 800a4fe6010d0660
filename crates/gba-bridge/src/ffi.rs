//! C ABI entry points
//!
//! Every function takes the context as an opaque pointer returned by
//! [`gba_create`]. A null context is ignored, or yields 0 where a value is
//! returned. Fallible operations report failure as null or 0 and log the
//! reason; nothing unwinds across the boundary.

use std::ptr;
use std::slice;

use crate::context::Context;
use crate::memory::RawMemoryAreas;
use crate::snapshot::state_size;
use crate::stepper::FrameInput;
use crate::{AUDIO_BUFFER_LEN, BIOS_SIZE, FRAMEBUFFER_PIXELS};

/// Create a context, booting through `bios` unless it is null
///
/// # Safety
///
/// `bios` must be null or point to at least 16384 readable bytes.
#[no_mangle]
pub unsafe extern "C" fn gba_create(bios: *const u8) -> *mut Context {
    let bios = (!bios.is_null()).then(|| slice::from_raw_parts(bios, BIOS_SIZE));
    match Context::create(bios) {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(_) => ptr::null_mut(),
    }
}

/// Destroy a context
///
/// # Safety
///
/// `ctx` must be null or a pointer from [`gba_create`] not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn gba_destroy(ctx: *mut Context) {
    if !ctx.is_null() {
        Box::from_raw(ctx).destroy();
    }
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn gba_reset(ctx: *mut Context) {
    if let Some(ctx) = ctx.as_mut() {
        ctx.reset();
    }
}

/// Load a ROM image, returning 1 on success and 0 on failure
///
/// # Safety
///
/// `ctx` must be null or a live context; `data` must point to `length`
/// readable bytes.
#[no_mangle]
pub unsafe extern "C" fn gba_load(ctx: *mut Context, data: *const u8, length: i32) -> i32 {
    let Some(ctx) = ctx.as_mut() else {
        return 0;
    };
    let Ok(length) = usize::try_from(length) else {
        return 0;
    };
    if data.is_null() {
        return 0;
    }
    i32::from(ctx.load(slice::from_raw_parts(data, length)).is_ok())
}

/// Run one frame
///
/// # Safety
///
/// `ctx` must be null or a live context. Each buffer may be null, which
/// skips that output; otherwise `vbuff` must hold 240x160 pixels, `sbuff`
/// 2048 samples and `nsamp` one `i32`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn gba_advance(
    ctx: *mut Context,
    keys: i32,
    vbuff: *mut u32,
    nsamp: *mut i32,
    sbuff: *mut i16,
    time: i64,
    gyrox: i16,
    gyroy: i16,
    gyroz: i16,
    luma: u8,
) {
    let Some(ctx) = ctx.as_mut() else {
        return;
    };
    let input = FrameInput {
        keys: keys as u16,
        time,
        gyro_x: gyrox,
        gyro_y: gyroy,
        gyro_z: gyroz,
        luma,
    };
    let video: &mut [u32] = if vbuff.is_null() {
        &mut []
    } else {
        slice::from_raw_parts_mut(vbuff, FRAMEBUFFER_PIXELS)
    };
    let audio: &mut [i16] = if sbuff.is_null() {
        &mut []
    } else {
        slice::from_raw_parts_mut(sbuff, AUDIO_BUFFER_LEN)
    };
    let pairs = ctx.advance(&input, video, audio);
    if let Some(nsamp) = nsamp.as_mut() {
        *nsamp = pairs as i32;
    }
}

/// Fill `dst` with the base pointer of each memory region
///
/// # Safety
///
/// `ctx` must be null or a live context and `dst` must be null or writable.
/// The pointers written stay valid until the context is destroyed or another
/// ROM is loaded.
#[no_mangle]
pub unsafe extern "C" fn gba_get_memory_areas(ctx: *mut Context, dst: *mut RawMemoryAreas) {
    if let (Some(ctx), Some(dst)) = (ctx.as_mut(), dst.as_mut()) {
        *dst = ctx.raw_memory_areas();
    }
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn gba_get_save_ram_size(ctx: *mut Context) -> i32 {
    ctx.as_ref().map_or(0, |ctx| ctx.save_ram_size() as i32)
}

/// Copy save RAM out
///
/// # Safety
///
/// `ctx` must be null or a live context; `data` must have room for
/// [`gba_get_save_ram_size`] bytes.
#[no_mangle]
pub unsafe extern "C" fn gba_get_save_ram(ctx: *mut Context, data: *mut u8) {
    if let Some(ctx) = ctx.as_ref() {
        if !data.is_null() {
            ctx.get_save_ram(slice::from_raw_parts_mut(data, ctx.save_ram_size()));
        }
    }
}

/// Copy save RAM in
///
/// # Safety
///
/// `ctx` must be null or a live context; `data` must hold
/// [`gba_get_save_ram_size`] readable bytes.
#[no_mangle]
pub unsafe extern "C" fn gba_put_save_ram(ctx: *mut Context, data: *const u8) {
    if let Some(ctx) = ctx.as_mut() {
        if !data.is_null() {
            let len = ctx.save_ram_size();
            ctx.put_save_ram(slice::from_raw_parts(data, len));
        }
    }
}

#[no_mangle]
pub extern "C" fn gba_get_state_size() -> i32 {
    state_size() as i32
}

/// Write a save state
///
/// # Safety
///
/// `ctx` must be null or a live context; `data` must have room for
/// [`gba_get_state_size`] bytes.
#[no_mangle]
pub unsafe extern "C" fn gba_get_state(ctx: *mut Context, data: *mut u8) {
    if let Some(ctx) = ctx.as_ref() {
        if !data.is_null() {
            // The buffer is sized by construction
            let _ = ctx.get_state(slice::from_raw_parts_mut(data, state_size()));
        }
    }
}

/// Restore a save state; a rejected buffer is logged and ignored
///
/// # Safety
///
/// `ctx` must be null or a live context; `data` must hold
/// [`gba_get_state_size`] readable bytes.
#[no_mangle]
pub unsafe extern "C" fn gba_put_state(ctx: *mut Context, data: *const u8) {
    if let Some(ctx) = ctx.as_mut() {
        if !data.is_null() {
            let _ = ctx.put_state(slice::from_raw_parts(data, state_size()));
        }
    }
}
