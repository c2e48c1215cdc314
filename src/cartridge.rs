use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use thiserror::Error;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Errors surfaced while ingesting a ROM image. This is the only fallible
/// host-facing operation in the core; everything the guest can do degrades
/// to documented sentinel reads instead of failing.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to read ROM image: {0}")]
    Io(#[from] io::Error),
    #[error("ROM image is empty")]
    Empty,
    #[error("ROM image length {0:#x} is not a multiple of the 16 KiB bank size")]
    BadLength(usize),
    #[error("unsupported cartridge type {0:#04x} (only ROM-only and MBC1 carts are supported)")]
    UnsupportedType(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    cart_type: u8,
    save_path: Option<PathBuf>,
    mbc_state: MbcState,
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        /// 5-bit ROM bank register. Never 0; a 0 write is coerced to 1.
        rom_bank: u8,
        /// 2-bit secondary register: RAM bank in mode 1, or ROM bank bits
        /// 5-6 depending on the region and mode.
        ram_bank: u8,
        /// Banking mode select (0 = ROM mode, 1 = RAM mode).
        mode: u8,
        ram_enable: bool,
    },
}

impl Cartridge {
    /// Parse and validate a raw ROM image.
    pub fn load(data: Vec<u8>) -> Result<Self, CartridgeError> {
        if data.is_empty() {
            return Err(CartridgeError::Empty);
        }
        if data.len() % ROM_BANK_SIZE != 0 {
            return Err(CartridgeError::BadLength(data.len()));
        }

        let header = Header::parse(&data);
        let cart_type = header.cart_type();
        let mbc = header
            .mbc_type()
            .ok_or(CartridgeError::UnsupportedType(cart_type))?;
        let ram_size = header.ram_size();
        let title = header.title();

        debug!(
            "loaded ROM: {:?} ({:?}, {} banks, {} bytes RAM)",
            title,
            mbc,
            data.len() / ROM_BANK_SIZE,
            ram_size
        );

        let mbc_state = match mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
                ram_enable: false,
            },
        };

        Ok(Self {
            rom: data,
            ram: vec![0; ram_size],
            mbc,
            title,
            cart_type,
            save_path: None,
            mbc_state,
        })
    }

    /// Load a ROM image from disk. For battery-backed carts an adjacent
    /// `.sav` file, if present, is loaded into external RAM and `save_ram`
    /// writes it back.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let data = fs::read(&path)?;
        let mut cart = Self::load(data)?;

        if cart.has_battery() {
            let mut save = PathBuf::from(path.as_ref());
            save.set_extension("sav");
            cart.save_path = Some(save.clone());
            if let Ok(bytes) = fs::read(&save) {
                for (d, s) in cart.ram.iter_mut().zip(bytes.iter()) {
                    *d = *s;
                }
            }
        }

        Ok(cart)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match (&self.mbc_state, addr) {
            (MbcState::NoMbc, 0x0000..=0x7FFF) => {
                self.rom.get(addr as usize).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc1 { ram_bank, mode, .. }, 0x0000..=0x3FFF) => {
                // Mode 1 maps the secondary register into bits 5-6 of the
                // lower bank; mode 0 always shows bank 0 here.
                let bank = if *mode == 0 {
                    0
                } else {
                    ((*ram_bank as usize) & 0x03) << 5
                };
                let offset = bank * ROM_BANK_SIZE + addr as usize;
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            (
                MbcState::Mbc1 {
                    rom_bank,
                    ram_bank,
                    mode,
                    ..
                },
                0x4000..=0x7FFF,
            ) => {
                let bank = if *mode == 0 {
                    (((*ram_bank as usize) & 0x03) << 5) | (*rom_bank as usize & 0x1F)
                } else {
                    *rom_bank as usize & 0x1F
                };
                let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            (MbcState::NoMbc, 0xA000..=0xBFFF) => {
                let idx = addr as usize - 0xA000;
                self.ram.get(idx).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if !*ram_enable {
                    0xFF
                } else {
                    let idx = self.ram_index(addr);
                    self.ram.get(idx).copied().unwrap_or(0xFF)
                }
            }
            _ => 0xFF,
        }
    }

    /// Writes to the ROM regions act as MBC control registers; writes to
    /// 0xA000-0xBFFF store into the selected RAM bank when enabled. ROM
    /// bytes themselves are never modified.
    pub fn write(&mut self, addr: u16, val: u8) {
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, 0xA000..=0xBFFF) => {
                let idx = addr as usize - 0xA000;
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val;
                }
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
                trace!("MBC1 RAM enable: {}", *ram_enable);
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
                trace!("MBC1 ROM bank: {}", *rom_bank);
            }
            (MbcState::Mbc1 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x03;
                trace!("MBC1 secondary bank: {}", *ram_bank);
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
                trace!("MBC1 banking mode: {}", *mode);
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if *ram_enable {
                    let idx = self.ram_index(addr);
                    if let Some(b) = self.ram.get_mut(idx) {
                        *b = val;
                    }
                } else {
                    trace!("dropped write to disabled external RAM at {addr:04X}");
                }
            }
            _ => {}
        }
    }

    /// Reset the mapper registers to their power-on values. ROM and RAM
    /// contents are preserved.
    pub fn reset(&mut self) {
        self.mbc_state = match self.mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
                ram_enable: false,
            },
        };
    }

    fn ram_index(&self, addr: u16) -> usize {
        match &self.mbc_state {
            MbcState::NoMbc => addr as usize - 0xA000,
            MbcState::Mbc1 { ram_bank, mode, .. } => {
                // The secondary register selects the RAM bank only in mode 1.
                let bank = if *mode == 0 {
                    0
                } else {
                    (*ram_bank as usize) & 0x03
                };
                bank * RAM_BANK_SIZE + addr as usize - 0xA000
            }
        }
    }

    fn has_battery(&self) -> bool {
        self.cart_type == 0x03
    }

    pub fn save_ram(&self) -> io::Result<()> {
        if let (true, Some(path)) = (self.has_battery(), &self.save_path) {
            if !self.ram.is_empty() {
                fs::write(path, &self.ram)?;
            }
        }
        Ok(())
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn title(&self) -> String {
        let end = 0x0143.min(self.data.len());
        let mut slice = &self.data[0x0134.min(self.data.len())..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cart_type(&self) -> u8 {
        self.data.get(0x0147).copied().unwrap_or(0)
    }

    fn mbc_type(&self) -> Option<MbcType> {
        match self.cart_type() {
            0x00 => Some(MbcType::NoMbc),
            0x01..=0x03 => Some(MbcType::Mbc1),
            _ => None,
        }
    }

    fn ram_size(&self) -> usize {
        match self.data.get(0x0149).copied().unwrap_or(0) {
            0x00 => 0,
            0x01 => 0x800,  // 2KB
            0x02 => 0x2000, // 8KB
            0x03 => 0x8000, // 32KB (4 banks)
            _ => 0x2000,
        }
    }
}
