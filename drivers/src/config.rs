//! Build-time configuration of the BAR fallback pool.
//!
//! The pool size is read from the `QEMU_PCI_BAR_PAGE_COUNT` environment
//! variable when the crate is compiled (decimal page count).  Zero disables
//! the fallback path; so does building without the `bar-page-pool` feature.

use qemu_pci_mm::bitmap_words;

/// Pool size used when the environment does not override it.
pub const DEFAULT_BAR_PAGE_COUNT: usize = 64;

/// Number of 4 KiB pages reserved for the BAR fallback pool.
pub const BAR_PAGE_COUNT: usize = match option_env!("QEMU_PCI_BAR_PAGE_COUNT") {
    Some(raw) => parse_page_count(raw),
    None => DEFAULT_BAR_PAGE_COUNT,
};

/// Bitmap words backing a pool of [`BAR_PAGE_COUNT`] pages.
pub const BAR_POOL_WORDS: usize = bitmap_words(BAR_PAGE_COUNT);

/// Parse a decimal page count during constant evaluation.
///
/// Malformed input fails the build.
pub const fn parse_page_count(raw: &str) -> usize {
    let bytes = raw.as_bytes();
    assert!(!bytes.is_empty(), "QEMU_PCI_BAR_PAGE_COUNT is empty");

    let mut value: usize = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(
            digit.is_ascii_digit(),
            "QEMU_PCI_BAR_PAGE_COUNT must be a decimal page count"
        );
        value = match value.checked_mul(10) {
            Some(v) => v + (digit - b'0') as usize,
            None => panic!("QEMU_PCI_BAR_PAGE_COUNT overflows usize"),
        };
        i += 1;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_counts() {
        assert_eq!(parse_page_count("0"), 0);
        assert_eq!(parse_page_count("64"), 64);
        assert_eq!(parse_page_count("00130"), 130);
    }

    #[test]
    #[should_panic]
    fn rejects_hex_notation() {
        let _ = parse_page_count("0x40");
    }

    #[test]
    fn words_cover_page_count() {
        assert!(BAR_POOL_WORDS * 64 >= BAR_PAGE_COUNT);
        assert!(BAR_POOL_WORDS * 64 < BAR_PAGE_COUNT + 64);
    }
}
