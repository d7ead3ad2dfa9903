//! ZX Spectrum memory map and AY port bridge for the Z80.

use iz80::Machine;

use super::format::AyBlock;
use crate::psg::Ym2149;

const ZX_PORT_MASK: u16 = 0xC002;
const ZX_REG_PORT: u16 = 0xC000;
const ZX_DATA_PORT: u16 = 0x8000;
const CPC_DATA_BUS_MASK: u16 = 0xFF00;
const CPC_PORT_A: u16 = 0xF400;
const CPC_PORT_C: u16 = 0xF600;

/// 64K RAM plus the PSG behind the 128K port pair.
pub struct AyMachine {
    memory: Box<[u8; 65_536]>,
    chip: Ym2149,
    selected_register: u8,
    cpc_port_seen: bool,
}

impl AyMachine {
    /// Machine driving `chip`.
    pub fn new(chip: Ym2149) -> Self {
        Self {
            memory: Box::new([0; 65_536]),
            chip,
            selected_register: 0,
            cpc_port_seen: false,
        }
    }

    /// Fill memory with the standard EMUL layout and reset the chip.
    ///
    /// 0x0000-0x00FF holds RET, 0x0100-0x3FFF 0xFF, the rest zero, and
    /// 0x0038 an EI so IM1 handlers return cleanly.
    pub fn reset_layout(&mut self) {
        self.memory[..=0x00FF].fill(0xC9);
        self.memory[0x0100..=0x3FFF].fill(0xFF);
        self.memory[0x4000..].fill(0x00);
        self.memory[0x0038] = 0xFB;
        self.selected_register = 0;
        self.chip.reset();
        self.cpc_port_seen = false;
    }

    /// Copy a block into memory, clamped to the address space.
    pub fn load_block(&mut self, block: &AyBlock) {
        let start = block.address as usize;
        let end = (start + block.data.len()).min(self.memory.len());
        self.memory[start..end].copy_from_slice(&block.data[..end - start]);
    }

    /// The PSG.
    pub fn chip(&self) -> &Ym2149 {
        &self.chip
    }

    /// The PSG, mutable.
    pub fn chip_mut(&mut self) -> &mut Ym2149 {
        &mut self.chip
    }

    /// Whether the player touched Amstrad CPC PPI ports.
    pub fn requires_cpc_firmware(&self) -> bool {
        self.cpc_port_seen
    }
}

impl Machine for AyMachine {
    fn peek(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn poke(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }

    fn port_in(&mut self, _address: u16) -> u8 {
        0xFF
    }

    fn port_out(&mut self, address: u16, value: u8) {
        match address & ZX_PORT_MASK {
            ZX_REG_PORT => {
                self.selected_register = value & 0x0F;
                return;
            }
            ZX_DATA_PORT => {
                self.chip.write_register(self.selected_register, value);
                return;
            }
            _ => {}
        }

        if matches!(address & CPC_DATA_BUS_MASK, CPC_PORT_A | CPC_PORT_C) && !self.cpc_port_seen {
            log::warn!("AY player accessed CPC port 0x{:04x}", address);
            self.cpc_port_seen = true;
        }
    }
}
