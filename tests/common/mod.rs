use dotmatrix::gameboy::GameBoy;

/// Build a 32 KiB ROM-only image with `program` placed at the entry point
/// (0x0100), where execution begins after reset.
#[allow(dead_code)]
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

/// A machine in the post-boot state with `program` mapped at 0x0100.
#[allow(dead_code)]
pub fn gameboy_with_program(program: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new();
    gb.load_rom(rom_with_program(program)).unwrap();
    gb
}

/// An MBC1 image of `banks` 16 KiB banks; the first byte of every bank
/// holds the bank number so bank mapping is observable.
#[allow(dead_code)]
pub fn mbc1_rom(banks: usize) -> Vec<u8> {
    let mut rom = vec![0u8; banks * 0x4000];
    rom[0x0147] = 0x01; // MBC1
    for i in 0..banks {
        rom[i * 0x4000] = i as u8;
    }
    rom
}
