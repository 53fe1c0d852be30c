// Opcodes and register layout from the TDC-GP22 datasheet.

pub type Opcode = u8;

pub const WRITE_REG: Opcode = 0x80; // 0x80..=0x86, register number in low bits
pub const READ_RES: Opcode = 0xb0; // 0xb0..=0xb3, result register in low bits
pub const READ_STAT: Opcode = 0xb4;
pub const READ_REG1: Opcode = 0xb5; // Highest 8 bits of register 1, for testing communication

pub const INIT: Opcode = 0x70;
pub const POWER_ON_RESET: Opcode = 0x50;
pub const START_TOF: Opcode = 0x01;
pub const START_CAL_RESONATOR: Opcode = 0x03;
pub const START_CAL_TDC: Opcode = 0x04;

pub const NUM_CONFIG_REGISTERS: usize = 7;
pub const NUM_RESULT_REGISTERS: u8 = 4;

// Register 0: TDC calibration result is applied automatically.
pub const REG0_CALIBRATE: u32 = 1 << 13;
// Register 1: fast init, measurement restarts immediately after the interrupt.
pub const REG1_EN_FAST_INIT: u32 = 1 << 23;

// Status register fields.
pub const STAT_ALU_POINTER_MASK: u16 = 0x0007;
pub const STAT_HITS_CH1_SHIFT: u16 = 3;
pub const STAT_HITS_CH2_SHIFT: u16 = 6;
pub const STAT_HITS_MASK: u16 = 0x0007;
pub const STAT_TIMEOUT_TDC: u16 = 1 << 9;
pub const STAT_TIMEOUT_PRECOUNTER: u16 = 1 << 10;
pub const STAT_ERROR_OPEN: u16 = 1 << 11;
pub const STAT_ERROR_SHORT: u16 = 1 << 12;
pub const STAT_EEPROM_ERROR_SINGLE: u16 = 1 << 13;
pub const STAT_EEPROM_ERROR_DOUBLE: u16 = 1 << 14;
pub const STAT_EEPROM_EQ_CREG: u16 = 1 << 15;
