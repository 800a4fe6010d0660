//! GBA CLI - headless runner for the embedding bridge

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use gba_bridge::{snapshot, Context, FrameInput, AUDIO_BUFFER_LEN, FRAMEBUFFER_PIXELS};
use gba_core::cartridge::CartridgeHeader;
use std::fs;
use std::path::{Path, PathBuf};

/// GBA bridge CLI
#[derive(Parser, Debug)]
#[command(name = "gba-cli")]
#[command(about = "Run a GBA ROM headlessly through the embedding bridge", long_about = None)]
struct Args {
    /// Path to the ROM image
    #[arg(short, long)]
    rom: PathBuf,

    /// Optional 16 KiB BIOS image
    #[arg(short, long)]
    bios: Option<PathBuf>,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Held keys as a bitmask (A=0x1 B=0x2 Select=0x4 Start=0x8 ...)
    #[arg(short, long, default_value = "0", value_parser = parse_mask)]
    keys: u16,

    /// Save RAM to import after loading
    #[arg(long)]
    save_in: Option<PathBuf>,

    /// Write save RAM here after running
    #[arg(long)]
    save_out: Option<PathBuf>,

    /// Snapshot to restore after loading
    #[arg(long)]
    state_in: Option<PathBuf>,

    /// Write a snapshot here after running
    #[arg(long)]
    state_out: Option<PathBuf>,

    /// Dump CPU registers after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump the first bytes of each memory region after execution
    #[arg(short = 'm', long)]
    dump_memory: bool,
}

fn parse_mask(s: &str) -> std::result::Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid key mask {s:?}: {e}"))
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
        print_header(cart.header(), cart.rom().len());
    }
    println!(
        "  Save type: {:?} ({} bytes)",
        ctx.gba().savedata().savetype(),
        ctx.save_ram_size()
    );
    println!("  BIOS: {}", if ctx.has_bios() { "loaded" } else { "skipped" });

    if let Some(path) = &args.save_in {
        import_save_ram(&mut ctx, path)?;
    }
    if let Some(path) = &args.state_in {
        let state = fs::read(path)
            .with_context(|| format!("failed to read state {}", path.display()))?;
        ctx.put_state(&state)
            .with_context(|| format!("state {} rejected", path.display()))?;
    }

    println!("\nRunning {} frames...", args.frames);

    let input = FrameInput {
        keys: args.keys,
        ..FrameInput::default()
    };
    let mut video = vec![0u32; FRAMEBUFFER_PIXELS];
    let mut audio = vec![0i16; AUDIO_BUFFER_LEN];
    let mut pairs = 0usize;
    for _ in 0..args.frames {
        pairs += ctx.advance(&input, &mut video, &mut audio);
    }

    println!("Completed {} frames, {} audio pairs.", ctx.frame_counter(), pairs);

    if let Some(path) = &args.save_out {
        let mut save = vec![0u8; ctx.save_ram_size()];
        let n = ctx.get_save_ram(&mut save);
        fs::write(path, &save[..n]).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {n} bytes of save RAM to {}", path.display());
    }
    if let Some(path) = &args.state_out {
        let mut state = vec![0u8; snapshot::state_size()];
        ctx.get_state(&mut state).context("failed to capture state")?;
        fs::write(path, &state).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote state to {}", path.display());
    }

    if args.dump_cpu {
        dump_cpu_state(&ctx);
    }
    if args.dump_memory {
        dump_memory(&mut ctx);
    }

    ctx.destroy();
    Ok(())
}

fn print_header(header: &CartridgeHeader, size: usize) {
    println!("Loaded cartridge:");
    println!("  Title: {}", header.title());
    println!("  Game code: {}", header.game_code());
    println!("  Maker: {}", String::from_utf8_lossy(&header.maker));
    println!("  Version: {}", header.version);
    println!(
        "  Checksum: {:02X} ({})",
        header.checksum,
        if header.checksum_ok { "ok" } else { "mismatch" }
    );
    println!("  ROM: {size} bytes");
}

fn import_save_ram(ctx: &mut Context, path: &Path) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("failed to read save {}", path.display()))?;
    let expected = ctx.save_ram_size();
    if expected == 0 {
        bail!("cartridge has no save RAM to import into");
    }
    let n = ctx.put_save_ram(&data);
    if n < data.len() {
        tracing::warn!(file = data.len(), kept = n, "save file larger than save RAM, truncated");
    }
    Ok(())
}

fn dump_cpu_state(ctx: &Context) {
    let cpu = ctx.gba().cpu();
    let regs = cpu.registers();

    println!("\nCPU State:");
    println!("{regs}");
    println!("  Mode: {:02X}  Thumb: {}", regs.mode(), regs.thumb());
    println!("  Cycles: {}", cpu.total_cycles());
}

fn dump_memory(ctx: &mut Context) {
    let areas = ctx.memory_areas();
    println!("\nMemory:");
    for (name, region) in [
        ("bios", &*areas.bios),
        ("wram", &*areas.wram),
        ("iwram", &*areas.iwram),
        ("mmio", &*areas.io),
        ("palram", &*areas.palette),
        ("vram", &*areas.vram),
        ("oam", &*areas.oam),
        ("rom", &*areas.rom),
    ] {
        let head: Vec<String> = region.iter().take(16).map(|b| format!("{b:02X}")).collect();
        println!("  {:<7}{:>8} bytes  {}", name, region.len(), head.join(" "));
    }
}
