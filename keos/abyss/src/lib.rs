//! The abyss of kernel that operates hardwares.
//!
//! This crate contains the machine that the scheduler of KeOS runs on: the
//! interrupt controller with its tick counter and timer interrupts, the
//! execution context of a thread together with the context-switch primitive,
//! and the kernel print macros.
//!
//! The scheduler never inspects the contents of these objects. It only asks
//! the [`interrupt::Interrupt`] controller what time it is and whether
//! interrupts are off, hands two [`context::Context`]s to a
//! [`context::ContextSwitch`], and prints what it did.
//!
//! **YOU ARE *NOT* SUPPOSED TO REIMPLEMENT THE MODULES OF THIS CRATE.**
//! Everything here stands in for hardware (or a hardware simulator), which is
//! why this crate is named "abyss".
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[doc(hidden)]
#[macro_use]
pub mod kprint;
pub mod context;
pub mod interrupt;

#[doc(hidden)]
pub use log as __log;
