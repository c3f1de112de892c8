//! A shareable CPU that can be driven by a [`Scheduler`].

use crate::config::Config;
use crate::cpu::{Cpu, State};
use crate::devices::{Display, FrameBuffer, Keyboard, Keypad, SilentSpeaker, Speaker};
use crate::error::{Result, VmError};
use crate::scheduler::{Clock, Scheduler, Subscription};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A [`Cpu`] behind `Rc<RefCell<..>>`, so a scheduler callback and the host
/// can both reach it.
pub struct Machine<D = FrameBuffer, K = Keypad, S = SilentSpeaker> {
    cpu: Rc<RefCell<Cpu<D, K, S>>>,
}

impl<D, K, S> Clone for Machine<D, K, S> {
    fn clone(&self) -> Self {
        Self {
            cpu: Rc::clone(&self.cpu),
        }
    }
}

impl<S: Speaker + 'static> Machine<FrameBuffer, Keypad, S> {
    /// Build a machine for `program` with an in-memory display and keypad.
    pub fn from_config(program: &[u8], config: &Config, speaker: S) -> Result<Self> {
        let state = State::new(program)?;
        let display = FrameBuffer::new(config.display_width, config.display_height);
        let cpu = Cpu::new(state, display, Keypad::new(), speaker).with_quirks(config.quirks);
        Ok(Self::new(cpu))
    }
}

impl<D, K, S> Machine<D, K, S>
where
    D: Display + 'static,
    K: Keyboard + 'static,
    S: Speaker + 'static,
{
    pub fn new(cpu: Cpu<D, K, S>) -> Self {
        Self {
            cpu: Rc::new(RefCell::new(cpu)),
        }
    }

    /// Subscribe to `scheduler`, running `batch` steps per tick.
    ///
    /// `on_error` receives the error that stopped the machine.
    pub fn attach<C: Clock>(
        &self,
        scheduler: &mut Scheduler<C>,
        batch: u32,
        on_error: impl FnMut(&VmError) + 'static,
    ) -> Subscription {
        let cpu = Rc::clone(&self.cpu);
        scheduler.subscribe(move || cpu.borrow_mut().run_batch(batch).map(|_| ()), on_error)
    }

    pub fn cpu(&self) -> Ref<'_, Cpu<D, K, S>> {
        self.cpu.borrow()
    }

    pub fn cpu_mut(&self) -> RefMut<'_, Cpu<D, K, S>> {
        self.cpu.borrow_mut()
    }

    pub fn reset(&self) -> Result<()> {
        self.cpu.borrow_mut().reset()
    }
}

impl<D, K, S> std::fmt::Debug for Machine<D, K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cpu.try_borrow() {
            Ok(cpu) => f.debug_tuple("Machine").field(&*cpu).finish(),
            Err(_) => f.write_str("Machine(<busy>)"),
        }
    }
}
