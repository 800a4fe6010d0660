//! GBA Debugger - egui host with live memory inspection

use eframe::egui;
use std::fs;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use gba_bridge::{
    snapshot, Context, FrameInput, AUDIO_BUFFER_LEN, FRAMEBUFFER_PIXELS, VIDEO_HORIZONTAL_PIXELS,
    VIDEO_VERTICAL_PIXELS,
};
use gba_core::{Keys, MemoryAreas};

/// Bytes shown per hex dump row
const ROW_BYTES: usize = 16;
/// Rows shown in the hex dump
const DUMP_ROWS: usize = 16;

/// Memory regions the inspector can browse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Bios,
    Wram,
    Iwram,
    Mmio,
    Palram,
    Vram,
    Oam,
    Rom,
}

impl Region {
    const ALL: [Region; 8] = [
        Region::Bios,
        Region::Wram,
        Region::Iwram,
        Region::Mmio,
        Region::Palram,
        Region::Vram,
        Region::Oam,
        Region::Rom,
    ];

    fn name(self) -> &'static str {
        match self {
            Region::Bios => "BIOS",
            Region::Wram => "WRAM",
            Region::Iwram => "IWRAM",
            Region::Mmio => "MMIO",
            Region::Palram => "Palette",
            Region::Vram => "VRAM",
            Region::Oam => "OAM",
            Region::Rom => "ROM",
        }
    }

    /// Bus address of the first byte
    fn base(self) -> u32 {
        match self {
            Region::Bios => 0x0000_0000,
            Region::Wram => 0x0200_0000,
            Region::Iwram => 0x0300_0000,
            Region::Mmio => 0x0400_0000,
            Region::Palram => 0x0500_0000,
            Region::Vram => 0x0600_0000,
            Region::Oam => 0x0700_0000,
            Region::Rom => 0x0800_0000,
        }
    }

    fn select<'a>(self, areas: MemoryAreas<'a>) -> &'a mut [u8] {
        match self {
            Region::Bios => areas.bios,
            Region::Wram => areas.wram,
            Region::Iwram => areas.iwram,
            Region::Mmio => areas.io,
            Region::Palram => areas.palette,
            Region::Vram => areas.vram,
            Region::Oam => areas.oam,
            Region::Rom => areas.rom,
        }
    }
}

const KEYMAP: [(egui::Key, Keys); 10] = [
    (egui::Key::X, Keys::A),
    (egui::Key::Z, Keys::B),
    (egui::Key::Backspace, Keys::SELECT),
    (egui::Key::Enter, Keys::START),
    (egui::Key::ArrowRight, Keys::RIGHT),
    (egui::Key::ArrowLeft, Keys::LEFT),
    (egui::Key::ArrowUp, Keys::UP),
    (egui::Key::ArrowDown, Keys::DOWN),
    (egui::Key::S, Keys::R),
    (egui::Key::A, Keys::L),
];

/// App state for the egui application
struct DebuggerApp {
    ctx: Context,
    rom_loaded: bool,
    paused: bool,
    keys: Keys,
    video: Vec<u32>,
    audio: Vec<i16>,
    texture: Option<egui::TextureHandle>,
    region: Region,
    offset: usize,
    poke_offset: String,
    poke_value: String,
    status: String,
    last_frame_time: Instant,
    fps: f64,
}

impl DebuggerApp {
    fn new(bios: Option<Vec<u8>>) -> gba_bridge::Result<Self> {
        let ctx = Context::create(bios.as_deref()).or_else(|e| {
            tracing::warn!("BIOS rejected ({e}), booting without it");
            Context::create(None)
        })?;
        Ok(Self {
            ctx,
            rom_loaded: false,
            paused: false,
            keys: Keys::empty(),
            video: vec![0; FRAMEBUFFER_PIXELS],
            audio: vec![0; AUDIO_BUFFER_LEN],
            texture: None,
            region: Region::Wram,
            offset: 0,
            poke_offset: String::new(),
            poke_value: String::new(),
            status: String::new(),
            last_frame_time: Instant::now(),
            fps: 0.0,
        })
    }

    fn load_rom(&mut self, path: &Path) {
        let result = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|rom| self.ctx.load(&rom).map_err(|e| e.to_string()));
        match result {
            Ok(()) => {
                self.rom_loaded = true;
                self.status = format!("Loaded {}", path.display());
            }
            Err(e) => self.status = format!("Failed to load {}: {e}", path.display()),
        }
    }

    fn save_state(&mut self, path: &Path) {
        let mut state = vec![0u8; snapshot::state_size()];
        let result = self
            .ctx
            .get_state(&mut state)
            .map_err(|e| e.to_string())
            .and_then(|()| fs::write(path, &state).map_err(|e| e.to_string()));
        self.status = match result {
            Ok(()) => format!("Saved state to {}", path.display()),
            Err(e) => format!("Failed to save state: {e}"),
        };
    }

    fn load_state(&mut self, path: &Path) {
        let result = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|state| self.ctx.put_state(&state).map_err(|e| e.to_string()));
        self.status = match result {
            Ok(()) => format!("Restored state from {}", path.display()),
            Err(e) => format!("Failed to restore state: {e}"),
        };
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        self.keys = ctx.input(|i| {
            KEYMAP
                .iter()
                .filter(|(key, _)| i.key_down(*key))
                .fold(Keys::empty(), |keys, (_, bit)| keys | *bit)
        });
    }

    fn step(&mut self) {
        let input = FrameInput {
            keys: self.keys.bits(),
            time: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs() as i64),
            ..FrameInput::default()
        };
        self.ctx.advance(&input, &mut self.video, &mut self.audio);
    }

    fn poke(&mut self) {
        let offset = usize::from_str_radix(self.poke_offset.trim_start_matches("0x"), 16);
        let value = u8::from_str_radix(self.poke_value.trim_start_matches("0x"), 16);
        let (Ok(offset), Ok(value)) = (offset, value) else {
            self.status = "Offset and value must be hex".to_string();
            return;
        };
        let region = self.region;
        match region.select(self.ctx.memory_areas()).get_mut(offset) {
            Some(byte) => {
                *byte = value;
                self.status = format!("{:08X} <- {value:02X}", region.base() as usize + offset);
            }
            None => self.status = format!("Offset {offset:X} outside {}", region.name()),
        }
    }

    fn update_texture(&mut self, ctx: &egui::Context) -> egui::TextureHandle {
        let rgba: Vec<u8> = self
            .video
            .iter()
            .flat_map(|pixel| {
                let [b, g, r, a] = pixel.to_le_bytes();
                [r, g, b, a]
            })
            .collect();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [VIDEO_HORIZONTAL_PIXELS, VIDEO_VERTICAL_PIXELS],
            &rgba,
        );
        let texture = self.texture.get_or_insert_with(|| {
            ctx.load_texture(
                "gba_frame",
                egui::ColorImage::default(),
                egui::TextureOptions::NEAREST,
            )
        });
        texture.set(image, egui::TextureOptions::NEAREST);
        texture.clone()
    }

    fn memory_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Memory");
        ui.horizontal(|ui| {
            egui::ComboBox::from_label("Region")
                .selected_text(self.region.name())
                .show_ui(ui, |ui| {
                    for region in Region::ALL {
                        if ui.selectable_value(&mut self.region, region, region.name()).changed() {
                            self.offset = 0;
                        }
                    }
                });
        });

        let region = self.region;
        let view = region.select(self.ctx.memory_areas());
        let len = view.len();
        ui.label(format!("{} bytes at {:08X}", len, region.base()));
        if len == 0 {
            ui.label("Region not mapped");
            return;
        }

        let page = ROW_BYTES * DUMP_ROWS;
        ui.horizontal(|ui| {
            if ui.button("<<").clicked() {
                self.offset = self.offset.saturating_sub(page);
            }
            if ui.button(">>").clicked() && self.offset + page < len {
                self.offset += page;
            }
        });
        self.offset = self.offset.min(len.saturating_sub(1));

        let end = (self.offset + page).min(len);
        for (row, bytes) in view[self.offset..end].chunks(ROW_BYTES).enumerate() {
            let addr = region.base() as usize + self.offset + row * ROW_BYTES;
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
            ui.monospace(format!("{addr:08X}  {}", hex.join(" ")));
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Offset");
            ui.text_edit_singleline(&mut self.poke_offset);
            ui.label("Value");
            ui.text_edit_singleline(&mut self.poke_value);
            if ui.button("Write").clicked() {
                self.poke();
            }
        });
    }

    fn cpu_panel(&self, ui: &mut egui::Ui) {
        ui.heading("CPU");
        let cpu = self.ctx.gba().cpu();
        ui.monospace(cpu.registers().to_string());
        ui.label(format!("Cycles: {}", cpu.total_cycles()));
        ui.label(format!(
            "Save: {:?} ({} bytes)",
            self.ctx.gba().savedata().savetype(),
            self.ctx.save_ram_size()
        ));
    }
}

impl eframe::App for DebuggerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_input(ctx);

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f64();
        self.fps = 1.0 / dt.max(0.001);
        self.last_frame_time = now;

        if self.rom_loaded && !self.paused {
            self.step();
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                if ui.button("Open ROM").clicked() {
                    if let Some(path) = rfd::FileDialog::new().pick_file() {
                        self.load_rom(&path);
                    }
                }
                if ui.button("Save State").clicked() {
                    if let Some(path) = rfd::FileDialog::new().save_file() {
                        self.save_state(&path);
                    }
                }
                if ui.button("Load State").clicked() {
                    if let Some(path) = rfd::FileDialog::new().pick_file() {
                        self.load_state(&path);
                    }
                }
                if ui.button(if self.paused { "Resume" } else { "Pause" }).clicked() {
                    self.paused = !self.paused;
                }
                if ui.button("Step").clicked() && self.rom_loaded {
                    self.step();
                }
                if ui.button("Reset").clicked() {
                    self.ctx.reset();
                }

                ui.label(format!("FPS: {:.1}", self.fps));
                ui.label(format!("Frames: {}", self.ctx.frame_counter()));
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.status.as_str());
        });

        egui::SidePanel::right("inspector").min_width(420.0).show(ctx, |ui| {
            self.cpu_panel(ui);
            ui.separator();
            self.memory_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.rom_loaded {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("No ROM loaded. Please select a .gba file.");
                });
                return;
            }
            let texture = self.update_texture(ctx);
            ui.add(egui::Image::from_texture(&texture).fit_to_exact_size(egui::Vec2::new(
                (VIDEO_HORIZONTAL_PIXELS * 2) as f32,
                (VIDEO_VERTICAL_PIXELS * 2) as f32,
            )));
        });

        if !self.paused {
            ctx.request_repaint();
        }
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let viewport = egui::ViewportBuilder::default().with_inner_size(egui::Vec2::new(960.0, 600.0));

    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    // Usage: gba-debugger [ROM] [BIOS]
    let mut args = std::env::args().skip(1);
    let rom_path = args.next();
    let bios = args.next().and_then(|path| match fs::read(&path) {
        Ok(bios) => Some(bios),
        Err(e) => {
            tracing::warn!("failed to read BIOS {path}: {e}");
            None
        }
    });

    eframe::run_native(
        "GBA Debugger",
        native_options,
        Box::new(move |_| {
            let mut app = DebuggerApp::new(bios)?;
            if let Some(path) = rom_path {
                app.load_rom(Path::new(&path));
            }
            Ok(Box::new(app))
        }),
    )
}
