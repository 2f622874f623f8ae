//! Execution context and the context-switch primitive.
//!
//! A [`Context`] is the saved register state of a thread that is not running.
//! The kernel never looks inside it: it moves the context together with the
//! thread that owns it and lends both contexts to a [`ContextSwitch`] when it
//! hands the processor from one thread to another.
use alloc::{rc::Rc, vec::Vec};
use core::cell::RefCell;

/// Size of each thread's stack.
pub const STACK_SIZE: usize = 0x100000;
/// Thread magic to detect stack overflow.
pub const THREAD_MAGIC: usize = 0xdeadbeefcafebabe;

/// The saved execution state of a thread.
#[derive(Debug)]
pub struct Context {
    owner: u64,
    /// A stack pointer on context switch.
    sp: usize,
    /// Guard word at the bottom of the stack.
    magic: usize,
}

impl Context {
    /// Creates the initial context of the thread `owner`.
    pub fn new(owner: u64) -> Self {
        Self {
            owner,
            sp: STACK_SIZE,
            magic: THREAD_MAGIC,
        }
    }

    /// Identifier of the thread this context belongs to.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// The saved stack pointer.
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Whether the stack grew past its guard word.
    pub fn is_overflowed(&self) -> bool {
        self.magic != THREAD_MAGIC
    }

    #[doc(hidden)]
    pub fn clobber_guard(&mut self) {
        self.magic = 0;
    }
}

/// The context-switch magic.
pub trait ContextSwitch {
    /// Saves the running state into `current` and resumes `next`.
    ///
    /// On real hardware this call returns only when some later switch resumes
    /// `current` again. Interrupts are disabled on entry and are still
    /// disabled when it returns.
    fn switch_to(&mut self, current: &mut Context, next: &mut Context);
}

/// One completed call to [`ContextSwitch::switch_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRecord {
    /// Owner of the context that was saved.
    pub from: u64,
    /// Owner of the context that was resumed.
    pub to: u64,
}

/// A switch primitive for a simulated machine.
///
/// The outgoing thread is considered resumed as soon as the call returns,
/// so the code after a switch runs immediately. Every switch is appended to
/// a shared history.
#[derive(Default)]
pub struct SimulatedSwitch {
    history: Rc<RefCell<Vec<SwitchRecord>>>,
}

impl SimulatedSwitch {
    /// Creates a switch primitive with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle on the switch history that stays valid after the primitive
    /// is handed over to the kernel.
    pub fn history(&self) -> Rc<RefCell<Vec<SwitchRecord>>> {
        self.history.clone()
    }
}

impl ContextSwitch for SimulatedSwitch {
    fn switch_to(&mut self, current: &mut Context, next: &mut Context) {
        assert_ne!(
            current.owner, next.owner,
            "Cannot switch a context to itself."
        );
        // Pretend the outgoing thread pushed its callee-saved registers.
        current.sp = STACK_SIZE - 6 * core::mem::size_of::<usize>();
        self.history.borrow_mut().push(SwitchRecord {
            from: current.owner,
            to: next.owner,
        });
    }
}
