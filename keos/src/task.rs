//! Task trait for interact with user process.

/// Represents a **task** executed by a thread.
///
/// A thread that runs a user program carries the program's user-mode
/// registers and its address space. The dispatcher does not know either; it
/// only tells the task when to put them away and when to bring them back.
///
/// On every context switch the outgoing task is saved with
/// [`save_user_state`] then [`save_state`] before the processor changes
/// hands, and the incoming task is restored with [`restore_user_state`] then
/// [`restore_state`] after it.
///
/// [`save_user_state`]: Task::save_user_state
/// [`save_state`]: Task::save_state
/// [`restore_user_state`]: Task::restore_user_state
/// [`restore_state`]: Task::restore_state
pub trait Task {
    /// Saves the user-mode registers of the program.
    fn save_user_state(&mut self);

    /// Saves the address-space state of the program.
    fn save_state(&mut self) {}

    /// Reloads the user-mode registers of the program.
    fn restore_user_state(&mut self);

    /// Activates the address space of the program.
    fn restore_state(&mut self) {}
}

impl Task for () {
    fn save_user_state(&mut self) {}

    fn restore_user_state(&mut self) {}
}
