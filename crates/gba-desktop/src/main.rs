//! GBA Desktop - windowed host for the embedding bridge
//!
//! Frames come from [`Context::advance`] already in the host pixel format,
//! which minifb reads as 0RGB. Audio is produced but not played.

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use gba_bridge::{
    Context, FrameInput, AUDIO_BUFFER_LEN, FRAMEBUFFER_PIXELS, VIDEO_HORIZONTAL_PIXELS,
    VIDEO_VERTICAL_PIXELS,
};
use gba_core::Keys;
use minifb::{Key, Window, WindowOptions};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// GBA Emulator Desktop App
#[derive(Parser, Debug)]
#[command(name = "gba-desktop")]
#[command(about = "A GBA bridge desktop app", long_about = None)]
struct Args {
    /// Path to the ROM image
    #[arg(short, long)]
    rom: PathBuf,

    /// Optional 16 KiB BIOS image
    #[arg(short, long)]
    bios: Option<PathBuf>,

    /// Screen scale factor (1-4)
    #[arg(short, long, default_value = "2")]
    scale: usize,

    /// Ambient light level reported to solar sensor carts
    #[arg(long, default_value = "0")]
    luma: u8,
}

const KEYMAP: [(Key, Keys); 10] = [
    (Key::X, Keys::A),
    (Key::Z, Keys::B),
    (Key::Backspace, Keys::SELECT),
    (Key::Enter, Keys::START),
    (Key::Right, Keys::RIGHT),
    (Key::Left, Keys::LEFT),
    (Key::Up, Keys::UP),
    (Key::Down, Keys::DOWN),
    (Key::S, Keys::R),
    (Key::A, Keys::L),
];

/// Tilt step per held key, in raw sensor units
const TILT_STEP: i16 = 0x0800;

fn pressed_keys(window: &Window) -> Keys {
    KEYMAP
        .iter()
        .filter(|(key, _)| window.is_key_down(*key))
        .fold(Keys::empty(), |keys, (_, bit)| keys | *bit)
}

fn axis(window: &Window, minus: Key, plus: Key) -> i16 {
    match (window.is_key_down(minus), window.is_key_down(plus)) {
        (true, false) => -TILT_STEP,
        (false, true) => TILT_STEP,
        _ => 0,
    }
}

fn unix_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let bios = args
        .bios
        .as_deref()
        .map(|path| {
            fs::read(path).with_context(|| format!("failed to read BIOS {}", path.display()))
        })
        .transpose()?;
    let rom = fs::read(&args.rom)
        .with_context(|| format!("failed to read ROM {}", args.rom.display()))?;

    let mut ctx = Context::create(bios.as_deref()).context("failed to create context")?;
    ctx.load(&rom).context("failed to load ROM")?;

    if let Some(cart) = ctx.gba().cartridge() {
        let header = cart.header();
        println!("Loaded {} ({})", header.title(), header.game_code());
    }

    let scale = args.scale.clamp(1, 4);
    let mut window = Window::new(
        "GBA Emulator",
        VIDEO_HORIZONTAL_PIXELS * scale,
        VIDEO_VERTICAL_PIXELS * scale,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    )
    .map_err(|e| anyhow!("failed to create window: {e}"))?;
    window.set_target_fps(60);

    let mut video = vec![0u32; FRAMEBUFFER_PIXELS];
    let mut audio = vec![0i16; AUDIO_BUFFER_LEN];

    println!("Press ESC or close the window to exit.");

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let input = FrameInput {
            keys: pressed_keys(&window).bits(),
            time: unix_time(),
            gyro_x: axis(&window, Key::J, Key::L),
            gyro_y: axis(&window, Key::I, Key::K),
            gyro_z: axis(&window, Key::U, Key::O),
            luma: args.luma,
        };
        ctx.advance(&input, &mut video, &mut audio);

        window
            .update_with_buffer(&video, VIDEO_HORIZONTAL_PIXELS, VIDEO_VERTICAL_PIXELS)
            .map_err(|e| anyhow!("failed to update window: {e}"))?;
    }

    ctx.destroy();
    println!("Emulator closed.");
    Ok(())
}
