//! ARM register file and run loop
//!
//! The core keeps the full ARM7TDMI register file, including the banked
//! registers of every privileged mode, and a cycle counter. The run loop
//! fetches from the bus until the next scheduled event and then hands the
//! elapsed cycles to the board. Only unconditional instructions execute, and
//! of those only branches, immediate-operand data processing and
//! immediate-offset loads and stores; everything else retires as a fetch.
//! Data accesses go through the bus, so they reach save chips and cartridge
//! devices exactly as a host poke would.

use std::fmt;

use crate::memory::AccessWidth;
use crate::serialize::{offsets, StateReader, StateWriter};

/// Processor modes, as stored in the CPSR mode bits
pub mod mode {
    pub const USER: u32 = 0x10;
    pub const FIQ: u32 = 0x11;
    pub const IRQ: u32 = 0x12;
    pub const SUPERVISOR: u32 = 0x13;
    pub const ABORT: u32 = 0x17;
    pub const UNDEFINED: u32 = 0x1B;
    pub const SYSTEM: u32 = 0x1F;
}

pub const ARM_SP: usize = 13;
pub const ARM_LR: usize = 14;
pub const ARM_PC: usize = 15;

/// CPSR THUMB state bit
pub const CPSR_THUMB: u32 = 0x20;
/// CPSR IRQ and FIQ disable bits
pub const CPSR_IRQ_DISABLE: u32 = 0x80;
pub const CPSR_FIQ_DISABLE: u32 = 0x40;

pub const BASE_BIOS: u32 = 0x0000_0000;
pub const BASE_WORKING_RAM: u32 = 0x0200_0000;
pub const BASE_CART0: u32 = 0x0800_0000;

pub const SP_BASE_SYSTEM: u32 = 0x0300_7F00;
pub const SP_BASE_IRQ: u32 = 0x0300_7FA0;
pub const SP_BASE_SUPERVISOR: u32 = 0x0300_7FE0;

const BANK_COUNT: usize = 6;

/// Condition field meaning "always"
const COND_ALWAYS: u32 = 0xE;

/// Bus as seen by the CPU
pub trait Bus {
    /// Fetch an instruction halfword; must not disturb device state
    fn fetch16(&mut self, address: u32) -> u16;
    /// Fetch an instruction word; must not disturb device state
    fn fetch32(&mut self, address: u32) -> u32;
    /// Cycles taken by a sequential access
    fn access_cycles(&self, address: u32, width: AccessWidth) -> i32;
    /// Cycles taken by the first access after a branch
    fn branch_cycles(&self, address: u32) -> i32;
    /// Run scheduled devices for `cycles`, returning cycles until the next event
    fn process_events(&mut self, cycles: i32) -> i32;

    fn read8(&mut self, address: u32) -> u8;
    fn read16(&mut self, address: u32) -> u16;
    fn read32(&mut self, address: u32) -> u32;
    fn write8(&mut self, address: u32, value: u8);
    fn write16(&mut self, address: u32, value: u16);
    fn write32(&mut self, address: u32, value: u32);
}

/// The visible register file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub gprs: [u32; 16],
    pub cpsr: u32,
    pub spsr: u32,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            gprs: [0; 16],
            cpsr: mode::SYSTEM,
            spsr: 0,
        }
    }
}

impl Registers {
    pub fn mode(&self) -> u32 {
        self.cpsr & 0x1F
    }

    pub fn thumb(&self) -> bool {
        self.cpsr & CPSR_THUMB != 0
    }

    pub fn pc(&self) -> u32 {
        self.gprs[ARM_PC]
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chunk) in self.gprs.chunks(4).enumerate() {
            for (j, value) in chunk.iter().enumerate() {
                write!(f, "r{:<2} {:08X}  ", i * 4 + j, value)?;
            }
            writeln!(f)?;
        }
        write!(f, "cpsr {:08X}  spsr {:08X}", self.cpsr, self.spsr)
    }
}

fn bank_index(mode: u32) -> usize {
    match mode {
        mode::FIQ => 1,
        mode::IRQ => 2,
        mode::SUPERVISOR => 3,
        mode::ABORT => 4,
        mode::UNDEFINED => 5,
        _ => 0,
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// ARM7TDMI core state
#[derive(Debug, Clone, Default)]
pub struct ArmCore {
    regs: Registers,
    banked_sp: [u32; BANK_COUNT],
    banked_lr: [u32; BANK_COUNT],
    banked_spsr: [u32; BANK_COUNT],
    cycles: i32,
    next_event: i32,
    total_cycles: u64,
}

impl ArmCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Cycles executed since reset
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles + self.cycles as u64
    }

    /// Reset into system mode with the boot stack pointers
    ///
    /// Execution starts at the BIOS reset vector when a BIOS is present,
    /// otherwise directly at the cartridge entry point, or in work RAM when
    /// no cartridge is mounted.
    pub fn reset(&mut self, has_bios: bool, has_rom: bool) {
        *self = Self::default();
        self.switch_mode(mode::IRQ);
        self.regs.gprs[ARM_SP] = SP_BASE_IRQ;
        self.switch_mode(mode::SUPERVISOR);
        self.regs.gprs[ARM_SP] = SP_BASE_SUPERVISOR;
        self.switch_mode(mode::SYSTEM);
        self.regs.gprs[ARM_SP] = SP_BASE_SYSTEM;
        self.regs.gprs[ARM_PC] = if has_bios {
            self.switch_mode(mode::SUPERVISOR);
            self.regs.cpsr |= CPSR_IRQ_DISABLE | CPSR_FIQ_DISABLE;
            BASE_BIOS
        } else if has_rom {
            BASE_CART0
        } else {
            BASE_WORKING_RAM
        };
        self.next_event = 1;
    }

    /// Swap the banked registers for a new mode
    pub fn switch_mode(&mut self, new_mode: u32) {
        let old = bank_index(self.regs.mode());
        let new = bank_index(new_mode);
        if old != new {
            self.banked_sp[old] = self.regs.gprs[ARM_SP];
            self.banked_lr[old] = self.regs.gprs[ARM_LR];
            self.banked_spsr[old] = self.regs.spsr;
            self.regs.gprs[ARM_SP] = self.banked_sp[new];
            self.regs.gprs[ARM_LR] = self.banked_lr[new];
            self.regs.spsr = self.banked_spsr[new];
        }
        self.regs.cpsr = (self.regs.cpsr & !0x1F) | new_mode;
    }

    /// Execute until the next scheduled event, then run the devices
    pub fn run_loop(&mut self, bus: &mut impl Bus) {
        while self.cycles < self.next_event {
            self.step(bus);
        }
        let elapsed = self.cycles;
        self.total_cycles += elapsed as u64;
        self.cycles = 0;
        self.next_event = bus.process_events(elapsed).max(1);
    }

    fn step(&mut self, bus: &mut impl Bus) {
        let pc = self.regs.gprs[ARM_PC];
        if self.regs.thumb() {
            let opcode = bus.fetch16(pc);
            self.cycles += bus.access_cycles(pc, AccessWidth::Half);
            if opcode & 0xF800 == 0xE000 {
                let offset = sign_extend(u32::from(opcode & 0x7FF), 11) << 1;
                self.branch(bus, pc.wrapping_add(4).wrapping_add(offset as u32));
            } else {
                self.regs.gprs[ARM_PC] = pc.wrapping_add(2);
            }
        } else {
            let opcode = bus.fetch32(pc);
            self.cycles += bus.access_cycles(pc, AccessWidth::Word);
            self.execute_arm(bus, pc, opcode);
        }
    }

    fn execute_arm(&mut self, bus: &mut impl Bus, pc: u32, opcode: u32) {
        if opcode >> 28 != COND_ALWAYS {
            self.regs.gprs[ARM_PC] = pc.wrapping_add(4);
            return;
        }
        match (opcode >> 25) & 7 {
            0b101 => {
                if opcode & 0x0100_0000 != 0 {
                    self.regs.gprs[ARM_LR] = pc.wrapping_add(4);
                }
                let offset = sign_extend(opcode & 0x00FF_FFFF, 24) << 2;
                self.branch(bus, pc.wrapping_add(8).wrapping_add(offset as u32));
            }
            0b001 => self.data_immediate(bus, pc, opcode),
            0b010 => {
                let width = if opcode & 0x0040_0000 != 0 {
                    AccessWidth::Byte
                } else {
                    AccessWidth::Word
                };
                self.transfer(bus, pc, opcode, opcode & 0xFFF, width);
            }
            // LDRH/STRH with an immediate offset
            0b000 if opcode & 0x0040_00F0 == 0x0040_00B0 => {
                let offset = ((opcode >> 4) & 0xF0) | (opcode & 0xF);
                self.transfer(bus, pc, opcode, offset, AccessWidth::Half);
            }
            _ => self.regs.gprs[ARM_PC] = pc.wrapping_add(4),
        }
    }

    /// Register operand, with the PC reading two instructions ahead
    fn operand(&self, index: usize, pc: u32) -> u32 {
        if index == ARM_PC {
            pc.wrapping_add(8)
        } else {
            self.regs.gprs[index]
        }
    }

    fn data_immediate(&mut self, bus: &mut impl Bus, pc: u32, opcode: u32) {
        let imm = (opcode & 0xFF).rotate_right(((opcode >> 8) & 0xF) * 2);
        let rn = self.operand(((opcode >> 16) & 0xF) as usize, pc);
        let rd = ((opcode >> 12) & 0xF) as usize;
        let result = match (opcode >> 21) & 0xF {
            0x0 => rn & imm,
            0x1 => rn ^ imm,
            0x2 => rn.wrapping_sub(imm),
            0x3 => imm.wrapping_sub(rn),
            0x4 => rn.wrapping_add(imm),
            0xC => rn | imm,
            0xD => imm,
            0xE => rn & !imm,
            0xF => !imm,
            // Flag-only and carry-dependent operations
            _ => {
                self.regs.gprs[ARM_PC] = pc.wrapping_add(4);
                return;
            }
        };
        if rd == ARM_PC {
            self.branch(bus, result);
        } else {
            self.regs.gprs[rd] = result;
            self.regs.gprs[ARM_PC] = pc.wrapping_add(4);
        }
    }

    fn transfer(
        &mut self,
        bus: &mut impl Bus,
        pc: u32,
        opcode: u32,
        offset: u32,
        width: AccessWidth,
    ) {
        let pre = opcode & 0x0100_0000 != 0;
        let up = opcode & 0x0080_0000 != 0;
        let writeback = !pre || opcode & 0x0020_0000 != 0;
        let load = opcode & 0x0010_0000 != 0;
        let rn = ((opcode >> 16) & 0xF) as usize;
        let rd = ((opcode >> 12) & 0xF) as usize;

        let base = self.operand(rn, pc);
        let indexed = if up {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };
        let address = if pre { indexed } else { base };
        // A stored PC reads three instructions ahead
        let stored = if rd == ARM_PC {
            pc.wrapping_add(12)
        } else {
            self.regs.gprs[rd]
        };

        self.cycles += bus.access_cycles(address, width);
        self.regs.gprs[ARM_PC] = pc.wrapping_add(4);
        if writeback && rn != ARM_PC {
            self.regs.gprs[rn] = indexed;
        }

        if !load {
            match width {
                AccessWidth::Byte => bus.write8(address, stored as u8),
                AccessWidth::Half => bus.write16(address & !1, stored as u16),
                AccessWidth::Word => bus.write32(address & !3, stored),
            }
            return;
        }
        let value = match width {
            AccessWidth::Byte => u32::from(bus.read8(address)),
            AccessWidth::Half => u32::from(bus.read16(address & !1)),
            AccessWidth::Word => bus.read32(address & !3).rotate_right(8 * (address & 3)),
        };
        self.cycles += 1;
        if rd == ARM_PC {
            self.branch(bus, value);
        } else {
            self.regs.gprs[rd] = value;
        }
    }

    fn branch(&mut self, bus: &mut impl Bus, target: u32) {
        let target = if self.regs.thumb() { target & !1 } else { target & !3 };
        self.regs.gprs[ARM_PC] = target;
        self.cycles += bus.branch_cycles(target);
    }

    pub fn save_state(&self, w: &mut StateWriter<'_>) {
        w.seek(offsets::CPU);
        for gpr in self.regs.gprs {
            w.put_u32(gpr);
        }
        w.put_u32(self.regs.cpsr);
        w.put_u32(self.regs.spsr);
        for bank in [&self.banked_sp, &self.banked_lr, &self.banked_spsr] {
            for value in bank {
                w.put_u32(*value);
            }
        }
        w.put_i32(self.cycles);
        w.put_i32(self.next_event);
        w.put_u64(self.total_cycles);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) {
        r.seek(offsets::CPU);
        for gpr in self.regs.gprs.iter_mut() {
            *gpr = r.get_u32();
        }
        self.regs.cpsr = r.get_u32();
        self.regs.spsr = r.get_u32();
        for bank in [&mut self.banked_sp, &mut self.banked_lr, &mut self.banked_spsr] {
            for value in bank.iter_mut() {
                *value = r.get_u32();
            }
        }
        self.cycles = r.get_i32();
        self.next_event = r.get_i32();
        self.total_cycles = r.get_u64();
    }
}
