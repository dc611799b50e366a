//! Integration tests using Tom Harte's `SingleStepTests` for the SM83.
//!
//! Runs one JSON file per opcode × 1,000 tests each, comparing CPU
//! register and memory state after every instruction.
//!
//! Test data lives in `test-data/sm83/v1/`.

use std::fs;
use std::path::Path;

use emu_core::Bus;
use serde::Deserialize;
use sharp_sm83::{Model, Sm83};

/// Flat 64KB RAM bus for testing.
struct TestBus {
    ram: Box<[u8; 0x10000]>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            ram: Box::new([0; 0x10000]),
        }
    }

    fn load_ram(&mut self, entries: &[(u16, u8)]) {
        for &(addr, value) in entries {
            self.ram[addr as usize] = value;
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }

    fn pending_interrupts(&mut self) -> u8 {
        // The vectors exercise single instructions, never dispatch
        0
    }

    fn acknowledge_interrupt(&mut self, _bit: u8) {}
}

/// JSON test case format.
#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<serde_json::Value>,
}

/// JSON CPU state format.
#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    #[serde(default)]
    ime: u8,
    #[serde(default)]
    ie: u8,
    ram: Vec<(u16, u8)>,
}

/// Set up the CPU and bus from the initial test state.
fn setup(cpu: &mut Sm83, bus: &mut TestBus, state: &CpuState) {
    bus.load_ram(&state.ram);
    bus.ram[0xFFFF] = state.ie;

    let mut regs = cpu.registers();
    regs.a = state.a;
    regs.f = state.f;
    regs.b = state.b;
    regs.c = state.c;
    regs.d = state.d;
    regs.e = state.e;
    regs.h = state.h;
    regs.l = state.l;
    regs.sp = state.sp;
    regs.pc = state.pc;
    regs.ime = state.ime != 0;
    cpu.set_registers(regs);
}

/// Compare the CPU/bus state against expected, returning a list of mismatches.
fn compare(cpu: &Sm83, bus: &TestBus, expected: &CpuState) -> Vec<String> {
    let mut errors = Vec::new();
    let regs = cpu.registers();

    check_u8(&mut errors, "A", regs.a, expected.a);
    check_u8(&mut errors, "F", regs.f, expected.f);
    check_u8(&mut errors, "B", regs.b, expected.b);
    check_u8(&mut errors, "C", regs.c, expected.c);
    check_u8(&mut errors, "D", regs.d, expected.d);
    check_u8(&mut errors, "E", regs.e, expected.e);
    check_u8(&mut errors, "H", regs.h, expected.h);
    check_u8(&mut errors, "L", regs.l, expected.l);
    check_u16(&mut errors, "SP", regs.sp, expected.sp);
    check_u16(&mut errors, "PC", regs.pc, expected.pc);

    let actual_ime = u8::from(regs.ime);
    if actual_ime != expected.ime {
        errors.push(format!("IME: got {actual_ime}, want {}", expected.ime));
    }

    for &(addr, expected_val) in &expected.ram {
        let actual_val = bus.peek(addr);
        if actual_val != expected_val {
            errors.push(format!(
                "RAM[${addr:04X}]: got ${actual_val:02X}, want ${expected_val:02X}"
            ));
        }
    }

    errors
}

fn check_u8(errors: &mut Vec<String>, name: &str, actual: u8, expected: u8) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:02X}, want ${expected:02X}"));
    }
}

fn check_u16(errors: &mut Vec<String>, name: &str, actual: u16, expected: u16) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:04X}, want ${expected:04X}"));
    }
}

/// The eleven holes in the opcode table have no vector files.
const ILLEGAL: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

/// Run all SM83 SingleStepTests.
#[test]
#[ignore = "requires test-data/sm83 — run with --ignored"]
fn run_all() {
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("parent of crate dir")
        .parent()
        .expect("workspace root")
        .join("test-data/sm83/v1");
    assert!(
        test_dir.is_dir(),
        "test data not found at {}",
        test_dir.display()
    );

    let mut files: Vec<_> = fs::read_dir(&test_dir)
        .expect("read test dir")
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();

    let mut total = 0u64;
    let mut failed = 0u64;

    for file in &files {
        let json = fs::read_to_string(file).expect("read test file");
        let cases: Vec<TestCase> = serde_json::from_str(&json).expect("parse test file");

        for case in &cases {
            total += 1;

            let mut cpu = Sm83::new(Model::Dmg);
            let mut bus = TestBus::new();
            setup(&mut cpu, &mut bus, &case.initial);

            let opcode = bus.peek(case.initial.pc);
            if ILLEGAL.contains(&opcode) {
                assert!(cpu.step(&mut bus).is_err(), "{}: expected fault", case.name);
                continue;
            }

            let ticks = cpu.step(&mut bus).expect("legal opcode");

            let mut errors = compare(&cpu, &bus, &case.final_state);
            let expected_ticks = 4 * case.cycles.len() as u64;
            if ticks.get() != expected_ticks {
                errors.push(format!(
                    "cycles: got {}, want {expected_ticks}",
                    ticks.get()
                ));
            }

            if !errors.is_empty() {
                failed += 1;
                eprintln!("{}: {}", case.name, errors.join("; "));
            }
        }
    }

    assert_eq!(failed, 0, "{failed} of {total} cases failed");
}
