//! Interrupt-flag save/restore (irqsave / irqrestore).
//!
//! The board is single-core and cooperative, so masking interrupt delivery is
//! the only thing needed to make a short sequence atomic with respect to
//! interrupt handlers.  The [`InterruptControl`] seam lets the bus driver take
//! critical sections without knowing how the CPU implements them.

/// RFLAGS interrupt-enable bit.
const RFLAGS_IF: u64 = 1 << 9;

/// Interrupt state captured by [`InterruptControl::irq_save`].
///
/// Holds the raw flags word so nested sections restore exactly what they
/// found: only the outermost restore re-enables delivery.
#[must_use = "dropping the saved state leaves interrupts disabled"]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqState(u64);

impl IrqState {
    #[inline]
    pub const fn from_raw(flags: u64) -> Self {
        Self(flags)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether interrupts were enabled when this state was saved.
    #[inline]
    pub const fn interrupts_were_enabled(self) -> bool {
        self.0 & RFLAGS_IF != 0
    }

    /// State word for "interrupts enabled".
    #[inline]
    pub const fn enabled() -> Self {
        Self(RFLAGS_IF)
    }

    /// State word for "interrupts disabled".
    #[inline]
    pub const fn disabled() -> Self {
        Self(0)
    }
}

/// Scoped interrupt-disable primitive.
///
/// Implementations must make `irq_save` disable delivery before returning and
/// `irq_restore` re-enable it only if the saved state had it enabled.
pub trait InterruptControl {
    /// Save the current interrupt state and disable interrupt delivery.
    fn irq_save(&self) -> IrqState;

    /// Restore a state previously returned by [`irq_save`](Self::irq_save).
    fn irq_restore(&self, state: IrqState);
}

/// Interrupt control on the running x86_64 CPU via RFLAGS.IF.
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy, Debug, Default)]
pub struct X86InterruptControl;

#[cfg(target_arch = "x86_64")]
impl InterruptControl for X86InterruptControl {
    #[inline]
    fn irq_save(&self) -> IrqState {
        let flags = x86_64::registers::rflags::read_raw();
        x86_64::instructions::interrupts::disable();
        IrqState::from_raw(flags)
    }

    #[inline]
    fn irq_restore(&self, state: IrqState) {
        if state.interrupts_were_enabled() {
            x86_64::instructions::interrupts::enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_state_tracks_if_bit() {
        assert!(IrqState::enabled().interrupts_were_enabled());
        assert!(!IrqState::disabled().interrupts_were_enabled());
        assert!(IrqState::from_raw(0x246).interrupts_were_enabled());
        assert!(!IrqState::from_raw(0x046).interrupts_were_enabled());
        assert_eq!(IrqState::from_raw(0x202).raw(), 0x202);
    }
}
