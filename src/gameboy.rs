use crate::{
    cartridge::{Cartridge, CartridgeError},
    cpu::Cpu,
    input::JoypadState,
    mmu::Mmu,
    ppu::FRAME_CYCLES,
};

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
        }
    }

    /// Parse and insert a ROM image.
    pub fn load_rom(&mut self, data: Vec<u8>) -> Result<(), CartridgeError> {
        self.mmu.load_cart(Cartridge::load(data)?);
        Ok(())
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.mmu.load_cart(cart);
    }

    /// Reset to the post-boot state while preserving the loaded cartridge
    /// (and its external RAM).
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        self.cpu = Cpu::new();
        self.mmu = Mmu::new();
        if let Some(mut c) = cart {
            c.reset();
            self.mmu.load_cart(c);
        }
    }

    /// Run one CPU step (an instruction or an interrupt dispatch) and feed
    /// the elapsed cycles to the timer and PPU. Returns the T-cycles
    /// consumed.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.mmu);
        self.mmu.tick(cycles);
        cycles
    }

    /// Step until the PPU finishes a frame, then return the framebuffer of
    /// 2-bit shades. With the LCD disabled no frame is ever produced; the
    /// loop gives up after two frames' worth of cycles so the host keeps
    /// its cadence.
    pub fn run_one_frame(&mut self) -> &[u8] {
        let mut elapsed = 0u32;
        while !self.mmu.ppu.frame_ready() && elapsed < FRAME_CYCLES * 2 {
            elapsed += self.step();
        }
        self.mmu.ppu.take_frame()
    }

    /// Replace the joypad state. Call between frames.
    pub fn set_joypad(&mut self, state: JoypadState) {
        self.mmu.set_joypad(state);
    }

    /// Persist battery-backed cartridge RAM, if any.
    pub fn save_cart_ram(&mut self) {
        self.mmu.save_cart_ram();
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
