//! 16-byte character-class scanning.

/// A character-class scanner over 16-byte windows.
///
/// A spanner is configured with up to four target bytes and reports the index
/// of the first window byte equal to any of them. It reproduces the semantics
/// of the x86 `PCMPISTRI` instruction with implicit-length operands: a NUL
/// byte terminates the scan, so a window containing a NUL before the first
/// target reports "no match" even when a target occurs later in the window.
/// Zero is therefore a sentinel and never a valid target.
///
/// On `x86_64` hosts with SSE4.2 the scan is a single `PCMPISTRI`; elsewhere
/// a byte-class table reproduces the same semantics, NUL short-circuit
/// included. The implementation is selected once, at construction, using
/// runtime CPU feature detection.
///
/// # Example
///
/// ```
/// use csvjet::StringSpanner;
///
/// let spanner = StringSpanner::new(&[b',']);
/// let window = *b"value,rest\0\0\0\0\0\0";
/// // SAFETY: `window` is 16 bytes long.
/// assert_eq!(unsafe { spanner.find(window.as_ptr()) }, 5);
/// ```
#[derive(Clone, Copy)]
pub struct StringSpanner {
    /// Target bytes packed at the front; the trailing NULs double as the
    /// implicit-length terminator of the SSE needle.
    needle: [u8; 16],
    /// Byte-class table for the portable scan. Entry 0 is always set so the
    /// scan stops at a NUL.
    table: [u8; 256],
    #[cfg(target_arch = "x86_64")]
    sse42: bool,
}

impl StringSpanner {
    /// Creates a spanner matching any of the given target bytes.
    ///
    /// At most four targets are supported; zero bytes are ignored, which lets
    /// callers pass a disabled slot (an unset escape byte) without changing
    /// the target set.
    ///
    /// # Panics
    ///
    /// Panics if more than four targets are given.
    pub fn new(targets: &[u8]) -> StringSpanner {
        assert!(targets.len() <= 4, "a spanner supports at most 4 targets");

        let mut needle = [0u8; 16];
        let mut table = [0u8; 256];
        table[0] = 1;

        let mut packed = 0;
        for &target in targets {
            if target != 0 {
                needle[packed] = target;
                table[target as usize] = 1;
                packed += 1;
            }
        }

        StringSpanner {
            needle,
            table,
            #[cfg(target_arch = "x86_64")]
            sse42: std::arch::is_x86_feature_detected!("sse4.2"),
        }
    }

    /// Scans the 16 bytes at `ptr` and returns the index of the first target
    /// byte, or 16 if no target occurs before the window end or a NUL.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of 16 bytes. Cursors uphold this for any
    /// position inside their pending region through the guard-byte invariant.
    #[inline]
    pub unsafe fn find(&self, ptr: *const u8) -> usize {
        #[cfg(target_arch = "x86_64")]
        if self.sse42 {
            // SAFETY: SSE4.2 support was detected at construction, and the
            // caller guarantees 16 readable bytes at `ptr`.
            return unsafe { self.find_sse42(ptr) };
        }
        // SAFETY: the caller guarantees 16 readable bytes at `ptr`.
        unsafe { self.find_generic(ptr) }
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "sse4.2")]
    unsafe fn find_sse42(&self, ptr: *const u8) -> usize {
        use core::arch::x86_64::{__m128i, _mm_cmpistri, _mm_loadu_si128};

        // SAFETY: `needle` is 16 bytes, and the caller guarantees 16 readable
        // bytes at `ptr`. Unaligned loads are permitted by `loadu`.
        let needle = unsafe { _mm_loadu_si128(self.needle.as_ptr().cast::<__m128i>()) };
        let window = unsafe { _mm_loadu_si128(ptr.cast::<__m128i>()) };

        // Mode 0: unsigned bytes, equal-any aggregation, least-significant
        // index. Returns 16 when nothing matched within the implicit lengths.
        unsafe { _mm_cmpistri::<0>(needle, window) as usize }
    }

    #[inline]
    unsafe fn find_generic(&self, ptr: *const u8) -> usize {
        for i in 0..16 {
            // SAFETY: `i < 16` and the caller guarantees 16 readable bytes.
            let byte = unsafe { *ptr.add(i) };
            if self.table[byte as usize] != 0 {
                // Entry 0 flags the NUL short-circuit, not a match.
                return if byte == 0 { 16 } else { i };
            }
        }
        16
    }
}

impl std::fmt::Debug for StringSpanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<u8> = self.needle.iter().copied().take_while(|&b| b != 0).collect();
        f.debug_struct("StringSpanner").field("targets", &targets).finish()
    }
}
