use crate::cpu::{Bus8080, Cpu8080, CpuError};
use coinop_common::key::Key;

/// Total addressable memory size (64 KiB).
const MEMORY_SIZE: usize = 0x10000;

/// Start of the Space Invaders video RAM window.
const VRAM_START: usize = 0x2400;
/// Size of video RAM in bytes (0x1c00 = 7168 bytes = 224x256 bits).
const VRAM_SIZE: usize = 0x1c00;

/// 8080 clock and frame timing for Space Invaders.
pub const CPU_CLOCK_HZ: u32 = 2_000_000;
pub const FRAME_RATE_HZ: u32 = 60;
pub const CYCLES_PER_FRAME: u32 = CPU_CLOCK_HZ / FRAME_RATE_HZ;

/// Bit positions for input port 1 (IN 1).
const IN1_BIT_COIN: u8 = 0;
const IN1_BIT_P2_START: u8 = 1;
const IN1_BIT_P1_START: u8 = 2;
const IN1_BIT_P1_FIRE: u8 = 4;
const IN1_BIT_P1_LEFT: u8 = 5;
const IN1_BIT_P1_RIGHT: u8 = 6;

/// Bit positions for input port 2 (IN 2): player 2 controls and tilt.
const IN2_BIT_TILT: u8 = 2;
const IN2_BIT_P2_FIRE: u8 = 4;
const IN2_BIT_P2_LEFT: u8 = 5;
const IN2_BIT_P2_RIGHT: u8 = 6;

/// Bus state for the Space Invaders machine: flat 64 KiB memory, the input
/// port latches, and the discrete shift-register hardware.
///
/// The shift register is the machine's one piece of custom silicon: the
/// program loads bytes through OUT 4, picks a bit offset through OUT 2 and
/// reads the shifted result back through IN 3, which is much cheaper than
/// shifting sprites in 8080 code.
struct InvadersBus {
    memory: [u8; MEMORY_SIZE],
    input_ports: [u8; 3],
    shift_register: u16,
    shift_offset: u8,
}

impl Default for InvadersBus {
    fn default() -> Self {
        Self {
            memory: [0; MEMORY_SIZE],
            input_ports: [0; 3],
            shift_register: 0,
            shift_offset: 0,
        }
    }
}

impl Bus8080 for InvadersBus {
    fn mem_read(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn mem_write(&mut self, addr: u16, value: u8) {
        // ROM and RAM are not distinguished; the stock program never
        // writes below 0x2000.
        self.memory[addr as usize] = value;
    }

    fn io_read(&mut self, port: u8) -> u8 {
        match port {
            0 | 1 | 2 => self.input_ports[port as usize],
            3 => {
                let shift = 8 - (self.shift_offset & 0x7);
                (self.shift_register >> shift) as u8
            }
            _ => 0,
        }
    }

    fn io_write(&mut self, port: u8, value: u8) {
        match port {
            2 => {
                self.shift_offset = value & 0x7;
            }
            4 => {
                // New byte enters the high half; the previous high half
                // slides down.
                self.shift_register = (self.shift_register >> 8) | (u16::from(value) << 8);
            }
            // Ports 3 and 5 drive the discrete sound board and port 6 the
            // watchdog; all are accepted and ignored.
            _ => {}
        }
    }
}

/// The Space Invaders machine: an 8080 core wired to the arcade bus.
///
/// `step_frame` advances emulation by one 60 Hz frame worth of cycles,
/// injecting the two per-frame interrupts the video hardware generates
/// (RST 1 mid-screen, RST 2 at vblank).
pub struct InvadersMachine {
    cpu: Cpu8080,
    bus: InvadersBus,
}

impl InvadersMachine {
    /// Construct a new machine in a powered-up but reset state.
    pub fn new() -> Self {
        Self {
            cpu: Cpu8080::new(),
            bus: InvadersBus::default(),
        }
    }

    /// Reset CPU and IO state, preserving memory contents.
    pub fn reset(&mut self) {
        self.cpu.reset();
        let mut bus = InvadersBus::default();
        bus.memory = self.bus.memory;
        self.bus = bus;
    }

    /// Load a ROM image into memory starting at 0x0000, where Space
    /// Invaders expects its code. Memory beyond the image stays zeroed.
    pub fn load_rom(&mut self, rom: &[u8]) {
        let len = rom.len().min(MEMORY_SIZE);
        self.bus.memory[..len].copy_from_slice(&rom[..len]);
        self.cpu.pc = 0x0000;
    }

    /// Run one video frame worth of emulation and return the cycles spent.
    ///
    /// The 2 MHz CPU gets 33,333 cycles per 60 Hz frame. Interrupt 1 fires
    /// after the first half and interrupt 2 after the second, mirroring the
    /// mid-screen and vblank signals of the original board. A halted CPU
    /// ends the frame early; the interrupts still fire so that an enabled
    /// halt wakes up.
    pub fn step_frame(&mut self) -> Result<u32, CpuError> {
        let half_frame = CYCLES_PER_FRAME / 2;
        let mut cycles: u32 = 0;

        while cycles < half_frame {
            let c = self.cpu.step(&mut self.bus)?;
            if c == 0 {
                break;
            }
            cycles += c;
        }
        self.cpu.interrupt(&mut self.bus, 1);

        while cycles < CYCLES_PER_FRAME {
            let c = self.cpu.step(&mut self.bus)?;
            if c == 0 {
                break;
            }
            cycles += c;
        }
        self.cpu.interrupt(&mut self.bus, 2);

        Ok(cycles)
    }

    /// Deliver an external interrupt (vector 1 or 2 on this machine).
    ///
    /// Dropped while the program has interrupts disabled.
    pub fn raise_interrupt(&mut self, vector: u8) {
        self.cpu.interrupt(&mut self.bus, vector);
    }

    /// True once the CPU has executed HLT and no interrupt has woken it.
    pub fn halted(&self) -> bool {
        self.cpu.halted
    }

    /// Map a logical key event onto the input port latches.
    ///
    /// Port 1 (player 1): `C` inserts a coin, `Num1`/`Num2` start one or
    /// two players, `A`/`Left` and `D`/`Right` move, `S`/`Space` fires.
    /// Port 2 (player 2): `J`/`L` move and `K` fires; `T` tilts the
    /// cabinet (latched on press, the game clears it).
    pub fn handle_key(&mut self, key: Key, pressed: bool) {
        match key {
            Key::C => self.set_input_bit(1, IN1_BIT_COIN, pressed),
            Key::Num1 => self.set_input_bit(1, IN1_BIT_P1_START, pressed),
            Key::Num2 => self.set_input_bit(1, IN1_BIT_P2_START, pressed),
            Key::A | Key::Left => self.set_input_bit(1, IN1_BIT_P1_LEFT, pressed),
            Key::D | Key::Right => self.set_input_bit(1, IN1_BIT_P1_RIGHT, pressed),
            Key::S | Key::Space => self.set_input_bit(1, IN1_BIT_P1_FIRE, pressed),
            Key::J => self.set_input_bit(2, IN2_BIT_P2_LEFT, pressed),
            Key::L => self.set_input_bit(2, IN2_BIT_P2_RIGHT, pressed),
            Key::K => self.set_input_bit(2, IN2_BIT_P2_FIRE, pressed),
            Key::T if pressed => self.set_input_bit(2, IN2_BIT_TILT, true),
            _ => {}
        }
    }

    fn set_input_bit(&mut self, port: usize, bit: u8, pressed: bool) {
        let mask = 1 << bit;
        if pressed {
            self.bus.input_ports[port] |= mask;
        } else {
            self.bus.input_ports[port] &= !mask;
        }
    }

    /// The raw video RAM window used by the renderer: 0x1c00 bytes
    /// starting at 0x2400, one bit per pixel, column major.
    pub fn video_ram(&self) -> &[u8] {
        &self.bus.memory[VRAM_START..VRAM_START + VRAM_SIZE]
    }
}

impl Default for InvadersMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with_program(program: &[u8]) -> InvadersMachine {
        let mut machine = InvadersMachine::new();
        machine.load_rom(program);
        machine
    }

    fn step_cpu(machine: &mut InvadersMachine, steps: usize) {
        for _ in 0..steps {
            machine.cpu.step(&mut machine.bus).expect("cpu fault");
        }
    }

    #[test]
    fn shift_hardware_round_trip() {
        // MVI A,AA ; OUT 4 ; MVI A,FF ; OUT 4 ; MVI A,04 ; OUT 2 ; IN 3
        let mut machine = machine_with_program(&[
            0x3e, 0xaa, 0xd3, 0x04, 0x3e, 0xff, 0xd3, 0x04, 0x3e, 0x04, 0xd3, 0x02, 0xdb, 0x03,
        ]);

        step_cpu(&mut machine, 7);

        assert_eq!(machine.bus.shift_register, 0xffaa);
        assert_eq!(machine.bus.shift_offset, 4);
        assert_eq!(machine.cpu.a, 0xfa);
    }

    #[test]
    fn unused_out_ports_are_accepted() {
        // MVI A,5A ; OUT 3 ; OUT 5 ; OUT 6
        let mut machine =
            machine_with_program(&[0x3e, 0x5a, 0xd3, 0x03, 0xd3, 0x05, 0xd3, 0x06]);

        step_cpu(&mut machine, 4);

        assert_eq!(machine.bus.shift_register, 0);
        assert_eq!(machine.bus.shift_offset, 0);
    }

    #[test]
    fn in_reads_the_input_latches() {
        // IN 1 ; MOV B,A ; IN 2
        let mut machine = machine_with_program(&[0xdb, 0x01, 0x47, 0xdb, 0x02]);
        machine.bus.input_ports[1] = 0x15;
        machine.bus.input_ports[2] = 0x60;

        step_cpu(&mut machine, 3);

        assert_eq!(machine.cpu.b, 0x15);
        assert_eq!(machine.cpu.a, 0x60);
    }

    #[test]
    fn key_events_latch_port_bits() {
        let mut machine = InvadersMachine::new();

        machine.handle_key(Key::C, true);
        machine.handle_key(Key::Left, true);
        machine.handle_key(Key::Space, true);
        assert_eq!(machine.bus.input_ports[1], 0b0011_0001);

        machine.handle_key(Key::Left, false);
        assert_eq!(machine.bus.input_ports[1], 0b0001_0001);

        // Tilt latches on press and is not cleared on release.
        machine.handle_key(Key::T, true);
        machine.handle_key(Key::T, false);
        assert_eq!(machine.bus.input_ports[2], 1 << IN2_BIT_TILT);

        machine.handle_key(Key::K, true);
        assert_eq!(
            machine.bus.input_ports[2],
            (1 << IN2_BIT_TILT) | (1 << IN2_BIT_P2_FIRE)
        );
    }

    #[test]
    fn load_rom_starts_execution_at_zero() {
        let mut machine = InvadersMachine::new();
        machine.cpu.pc = 0x1234;
        machine.load_rom(&[0xc3, 0x00, 0x01]);

        assert_eq!(machine.cpu.pc, 0);
        assert_eq!(machine.bus.memory[0], 0xc3);
        // Memory past the image stays zeroed.
        assert_eq!(machine.bus.memory[3], 0);
    }

    #[test]
    fn video_ram_window_covers_the_framebuffer() {
        let mut machine = InvadersMachine::new();
        machine.bus.memory[VRAM_START] = 0xab;
        machine.bus.memory[VRAM_START + VRAM_SIZE - 1] = 0xcd;

        let vram = machine.video_ram();
        assert_eq!(vram.len(), VRAM_SIZE);
        assert_eq!(vram[0], 0xab);
        assert_eq!(vram[VRAM_SIZE - 1], 0xcd);
    }

    #[test]
    fn step_frame_injects_both_interrupts() {
        // EI ; JMP 0x0001 - spin with interrupts enabled.
        let mut machine = machine_with_program(&[0xfb, 0xc3, 0x01, 0x00]);

        let cycles = machine.step_frame().unwrap();

        // The first interrupt vectored to 8 and pushed the loop PC; the
        // second was dropped because the handler never re-enabled them.
        assert!(cycles >= CYCLES_PER_FRAME);
        assert!(!machine.cpu.interrupts_enabled);
        assert_eq!(machine.cpu.sp, 0xeffe);
        assert!(machine.cpu.pc >= 0x0008);
    }

    #[test]
    fn step_frame_wakes_an_enabled_halt() {
        // EI ; HLT
        let mut machine = machine_with_program(&[0xfb, 0x76]);

        machine.step_frame().unwrap();

        // The mid-frame interrupt cleared the halt and vectored to 8;
        // execution then ran NOPs to the end of the frame.
        assert!(!machine.halted());
        assert!(machine.cpu.pc >= 0x0008);
    }

    #[test]
    fn halted_machine_with_interrupts_disabled_stays_halted() {
        let mut machine = machine_with_program(&[0x76]);

        let cycles = machine.step_frame().unwrap();

        assert!(machine.halted());
        assert_eq!(cycles, 7);
    }

    #[test]
    fn raise_interrupt_reaches_the_cpu() {
        let mut machine = machine_with_program(&[0xfb, 0x00]);
        step_cpu(&mut machine, 1);

        machine.raise_interrupt(2);
        assert_eq!(machine.cpu.pc, 0x0010);

        // A second request is dropped until the program runs EI again.
        machine.raise_interrupt(1);
        assert_eq!(machine.cpu.pc, 0x0010);
    }

    #[test]
    fn step_frame_surfaces_cpu_faults() {
        let mut machine = machine_with_program(&[0x08]);

        let err = machine.step_frame().unwrap_err();
        assert_eq!(
            err,
            CpuError::UnimplementedOpcode {
                opcode: 0x08,
                pc: 0x0000
            }
        );
    }
}
