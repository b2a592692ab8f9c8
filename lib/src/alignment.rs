//! Power-of-two alignment and page-count helpers.
//!
//! The BAR page pool works in whole pages while callers hand it byte lengths,
//! so every conversion between the two goes through these helpers.

/// Generate `align_down_$suffix`, `align_up_$suffix` and `span_count_$suffix`
/// for a given integer type.
///
/// All functions treat `alignment == 0` as a no-op. `align_up` saturates
/// instead of wrapping.
macro_rules! impl_align_fns {
    ($ty:ty, $suffix:ident) => {
        paste::paste! {
            /// Align `value` down to the nearest multiple of `alignment`.
            #[inline(always)]
            pub const fn [<align_down_ $suffix>](value: $ty, alignment: $ty) -> $ty {
                if alignment == 0 {
                    return value;
                }
                value & !(alignment - 1)
            }

            /// Align `value` up to the nearest multiple of `alignment`.
            #[inline(always)]
            pub const fn [<align_up_ $suffix>](value: $ty, alignment: $ty) -> $ty {
                if alignment == 0 {
                    return value;
                }
                let adjusted = value.saturating_add(alignment - 1);
                adjusted & !(alignment - 1)
            }

            /// Number of `alignment`-sized spans needed to cover `value` bytes.
            /// Returns `value` unchanged when `alignment` is zero.
            #[inline(always)]
            pub const fn [<span_count_ $suffix>](value: $ty, alignment: $ty) -> $ty {
                if alignment == 0 {
                    return value;
                }
                value.div_ceil(alignment)
            }
        }
    };
}

impl_align_fns!(u64, u64);
impl_align_fns!(usize, usize);
