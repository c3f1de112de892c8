//! Player application state and event loop.

use crate::config::Config;
use crate::devices::{Keypad, Speaker, KEY_COUNT};
use crate::error::{Result, VmError};
use crate::machine::Machine;
use crate::scheduler::{Scheduler, Subscription, Tick};
use crate::FrameBuffer;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// How long a key stays down after a press event.
///
/// Terminals report presses (and repeats) but rarely releases.
const KEY_HOLD: Duration = Duration::from_millis(150);

/// Longest wait for input between redraws.
const FRAME: Duration = Duration::from_millis(16);

/// Speaker that rings the terminal bell.
#[derive(Debug, Default)]
pub struct TerminalBell {
    pending: bool,
    /// Total beeps so far.
    pub count: u64,
}

impl TerminalBell {
    /// Whether a beep happened since the last call.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

impl Speaker for TerminalBell {
    fn beep(&mut self) {
        self.pending = true;
        self.count += 1;
    }
}

pub type PlayerMachine = Machine<FrameBuffer, Keypad, TerminalBell>;

/// Player application state.
pub struct PlayerApp {
    /// The machine being played.
    pub machine: PlayerMachine,
    pub scheduler: Scheduler,
    /// Present while the machine is running.
    subscription: Option<Subscription>,
    /// Error that stopped the machine, set by the scheduler callback.
    failure: Rc<RefCell<Option<VmError>>>,
    batch: u32,
    /// Release deadline for each held key.
    held: [Option<Instant>; KEY_COUNT],
    pub title: String,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
}

impl PlayerApp {
    /// Create a paused player for `program`.
    pub fn new(program: &[u8], config: &Config, title: String) -> Result<Self> {
        let machine = Machine::from_config(program, config, TerminalBell::default())?;

        Ok(Self {
            machine,
            scheduler: Scheduler::new(config.tick_interval()),
            subscription: None,
            failure: Rc::new(RefCell::new(None)),
            batch: config.batch_size(),
            held: [None; KEY_COUNT],
            title,
            should_quit: false,
            status: "Paused. Press space to run, Esc to quit.".into(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Start or pause execution.
    pub fn toggle(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            self.status = "Paused.".into();
            return;
        }

        self.failure.borrow_mut().take();
        let failure = Rc::clone(&self.failure);
        self.subscription = Some(self.machine.attach(&mut self.scheduler, self.batch, move |err| {
            *failure.borrow_mut() = Some(err.clone());
        }));
        self.status = "Running.".into();
    }

    /// Reset the machine, keeping the run state.
    pub fn reset(&mut self) {
        match self.machine.reset() {
            Ok(()) => self.status = "Reset.".into(),
            Err(e) => self.status = format!("Reset failed: {}", e),
        }
    }

    /// Press a key until [`KEY_HOLD`] passes without a repeat.
    pub fn press(&mut self, key: u8, now: Instant) {
        if self.machine.cpu_mut().keyboard_mut().press(key).is_ok() {
            self.held[key as usize] = Some(now + KEY_HOLD);
        }
    }

    /// Release keys whose hold has expired.
    pub fn release_expired(&mut self, now: Instant) {
        let mut cpu = self.machine.cpu_mut();
        for (key, deadline) in self.held.iter_mut().enumerate() {
            if deadline.is_some_and(|d| d <= now) {
                *deadline = None;
                let _ = cpu.keyboard_mut().release(key as u8);
            }
        }
    }

    /// Fire a scheduler tick if one is due.
    ///
    /// Returns whether the speaker beeped.
    pub fn update(&mut self) -> bool {
        if let Tick::Failed(err) = self.scheduler.poll() {
            self.subscription = None;
            self.status = format!("Stopped: {}", err);
        }
        self.machine.cpu_mut().speaker_mut().take_pending()
    }

    /// The last error the machine stopped on.
    pub fn failure(&self) -> Option<VmError> {
        self.failure.borrow().clone()
    }

    /// How long to wait for input before the next update.
    pub fn wait_time(&self) -> Duration {
        self.scheduler
            .next_deadline()
            .map_or(FRAME, |deadline| deadline.min(FRAME))
    }
}

/// Map a terminal key to a keypad key.
fn keypad_key(code: crossterm::event::KeyCode) -> Option<u8> {
    use crossterm::event::KeyCode;

    match code {
        KeyCode::Char(c) => Keypad::key_for_char(c),
        KeyCode::Down => Keypad::key_for_name("ArrowDown"),
        KeyCode::Left => Keypad::key_for_name("ArrowLeft"),
        KeyCode::Right => Keypad::key_for_name("ArrowRight"),
        KeyCode::Up => Keypad::key_for_name("ArrowUp"),
        _ => None,
    }
}

/// Play a program in the terminal.
pub fn run_player(program: &[u8], config: &Config, title: String) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::{stdout, Write};

    let mut app = PlayerApp::new(program, config, title)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(app.wait_time())? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release {
                    match key.code {
                        KeyCode::Esc => app.should_quit = true,
                        KeyCode::Char(' ') => app.toggle(),
                        KeyCode::Backspace => app.reset(),
                        code => {
                            if let Some(pad) = keypad_key(code) {
                                app.press(pad, Instant::now());
                            }
                        }
                    }
                }
            }
        }

        app.release_expired(Instant::now());
        if app.update() {
            stdout().write_all(b"\x07")?;
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
