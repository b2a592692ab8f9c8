//! Legacy x86 I/O port numbers used by the board.

/// First serial port, used by the early klog backend.
pub const COM1: u16 = 0x3F8;

/// PCI configuration mechanism #1: address register.
pub const PCI_CONFIG_ADDRESS: u16 = 0xCF8;

/// PCI configuration mechanism #1: data register.
pub const PCI_CONFIG_DATA: u16 = 0xCFC;
