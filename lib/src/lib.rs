#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

pub mod alignment;
pub mod irq;
pub mod klog;
pub mod ports;
pub mod spinlock;

#[cfg(test)]
extern crate std;

pub use alignment::{
    align_down_u64, align_down_usize, align_up_u64, align_up_usize, span_count_u64, span_count_usize,
};
pub use irq::{InterruptControl, IrqState};
pub use klog::{KlogLevel, klog_get_level, klog_init, klog_register_backend, klog_set_level};
pub use spinlock::{IrqMutex, IrqMutexGuard};

#[cfg(target_arch = "x86_64")]
pub use irq::X86InterruptControl;
