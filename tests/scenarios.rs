//! End-to-end scenarios through the public API.

use chip8::cpu::decode::{assemble, Instruction, Opcode};
use chip8::scheduler::Clock;
use chip8::{
    BeepCounter, Config, Cpu, FrameBuffer, Keypad, Machine, Quirks, Scheduler, State, Tick,
    VmError,
};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn cpu_for(program: &[u8]) -> Cpu<FrameBuffer, Keypad, BeepCounter> {
    let state = State::new(program).unwrap();
    Cpu::new(state, FrameBuffer::default(), Keypad::new(), BeepCounter::new())
}

#[derive(Clone)]
struct TestClock(Rc<Cell<Instant>>);

impl TestClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.0.get()
    }

    fn sleep(&self, duration: Duration) {
        self.0.set(self.0.get() + duration);
    }
}

#[test]
fn add_wraps_at_256() {
    let mut state = State::new(&[]).unwrap();
    state.set_v(0, 10).unwrap();
    state.add_v(0, 250).unwrap();
    assert_eq!(state.v(0), Ok(4));
}

#[test]
fn load_immediate_then_advance() {
    let mut cpu = cpu_for(&[0x60, 0x05]);
    cpu.step().unwrap();

    assert_eq!(cpu.state().v(0), Ok(5));
    assert_eq!(cpu.state().pc(), 0x202);
}

#[test]
fn call_and_return() {
    let mut program = vec![0u8; 0x12];
    program[..2].copy_from_slice(&[0x22, 0x10]);
    program[0x10..].copy_from_slice(&[0x00, 0xEE]);
    let mut cpu = cpu_for(&program);

    cpu.run_batch(2).unwrap();
    assert_eq!(cpu.state().pc(), 0x202);
    assert_eq!(cpu.state().stack_depth(), 0);
}

#[test]
fn draw_twice_toggles_back_with_collision() {
    let mut program = assemble(&[
        Opcode::LoadIndex { addr: 0x208 },
        Opcode::Draw { x: 0, y: 0, n: 1 },
        Opcode::Draw { x: 0, y: 0, n: 1 },
        Opcode::Jump { addr: 0x206 },
    ]);
    program.push(0xFF);
    let mut cpu = cpu_for(&program);

    cpu.run_batch(2).unwrap();
    for x in 0..8 {
        assert!(cpu.display().pixel(x, 0));
    }
    assert_eq!(cpu.display().lit(), 8);
    assert_eq!(cpu.state().v(0xF), Ok(0));

    cpu.step().unwrap();
    assert_eq!(cpu.display().lit(), 0);
    assert_eq!(cpu.state().v(0xF), Ok(1));
}

#[test]
fn unassigned_word_is_rejected_without_side_effects() {
    let mut cpu = cpu_for(&[0x61, 0x07, 0x81, 0x27]);
    cpu.step().unwrap();
    let before = cpu.state().clone();

    assert_eq!(
        cpu.step(),
        Err(VmError::UnsupportedInstruction {
            instruction: Instruction::from_word(0x8127),
            previous: Some(Instruction::from_word(0x6107)),
        })
    );
    assert_eq!(cpu.state(), &before);
}

#[test]
fn error_message_names_both_instructions() {
    let mut cpu = cpu_for(&[0x61, 0x07, 0x81, 0x27]);
    cpu.step().unwrap();
    let message = cpu.step().unwrap_err().to_string();

    assert!(message.contains("0x8127"), "{}", message);
    assert!(message.contains("0x6107"), "{}", message);
}

#[test]
fn countdown_loop_reads_delay_timer() {
    // V0 = 10; DT = V0; loop: V1 = DT; SE V1, 0; JP loop
    let program = assemble(&[
        Opcode::Load { x: 0, kk: 10 },
        Opcode::SetDelay { x: 0 },
        Opcode::ReadDelay { x: 1 },
        Opcode::SkipIfEqual { x: 1, kk: 0 },
        Opcode::Jump { addr: 0x204 },
        Opcode::Jump { addr: 0x20A },
    ]);
    let mut cpu = cpu_for(&program);
    cpu.run_batch(60).unwrap();

    assert_eq!(cpu.state().pc(), 0x20A);
    assert_eq!(cpu.state().delay(), 0);
}

#[test]
fn canonical_quirks_store_three_digits() {
    let program = assemble(&[
        Opcode::LoadIndex { addr: 0x300 },
        Opcode::Load { x: 5, kk: 254 },
        Opcode::StoreBcd { x: 5 },
        Opcode::LoadRegisters { x: 2 },
    ]);
    let mut cpu = cpu_for(&program).with_quirks(Quirks::canonical());
    cpu.run_batch(4).unwrap();

    assert_eq!(cpu.state().v(0), Ok(2));
    assert_eq!(cpu.state().v(1), Ok(5));
    assert_eq!(cpu.state().v(2), Ok(4));
}

#[test]
fn font_glyphs_draw_digits() {
    // Draw glyph 0 at (0, 0): the top row of "0" is 0xF0
    let program = assemble(&[
        Opcode::Load { x: 2, kk: 0 },
        Opcode::LoadGlyph { x: 2 },
        Opcode::Draw { x: 0, y: 1, n: 5 },
    ]);
    let mut cpu = cpu_for(&program);
    cpu.run_batch(3).unwrap();

    let text = cpu.display().to_text('#', '.');
    let rows: Vec<&str> = text.lines().take(5).collect();
    assert_eq!(&rows[0][..4], "####");
    assert_eq!(&rows[1][..4], "#..#");
    assert_eq!(&rows[4][..4], "####");
}

#[test]
fn scheduler_drives_machine_until_failure() {
    // Twenty increments, then RET on an empty stack
    let mut ops = vec![Opcode::AddImmediate { x: 3, kk: 1 }; 20];
    ops.push(Opcode::Return);
    let config = Config {
        tick_interval_ms: 10,
        instructions_per_second: 500,
        ..Config::default()
    };
    let machine = Machine::from_config(&assemble(&ops), &config, BeepCounter::new()).unwrap();

    let clock = TestClock::new();
    let mut scheduler = Scheduler::with_clock(config.tick_interval(), clock.clone());
    let errors = Rc::new(Cell::new(0));
    let seen = Rc::clone(&errors);
    machine.attach(&mut scheduler, config.batch_size(), move |_| seen.set(seen.get() + 1));

    assert_eq!(scheduler.run(), Err(VmError::StackUnderflow));
    assert_eq!(errors.get(), 1);
    // Five steps per tick: four clean ticks, the fifth fails on its first step
    assert_eq!(scheduler.ticks(), 4);
    assert_eq!(machine.cpu().state().v(3), Ok(20));
    assert_eq!(scheduler.poll(), Tick::Idle);
}
