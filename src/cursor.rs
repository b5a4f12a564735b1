//! Input cursors: contiguous byte windows with an over-read guarantee.

use crate::error::Result;

/// A refillable window of pending input bytes.
///
/// A cursor exposes the not-yet-parsed part of its input as one contiguous
/// region, lets the parser discard a prefix with [`consume`](Self::consume),
/// and extends the region on demand with [`fill`](Self::fill).
///
/// # The over-read guarantee
///
/// Every implementation must keep the 16 bytes past the pending region
/// readable, with at least one NUL among them. The row parser performs
/// unconditional 16-byte loads at any position inside the pending region, so
/// the final load may extend up to 15 bytes past the last real byte; the NUL
/// stops the [`StringSpanner`](crate::StringSpanner) scan there. Both cursors
/// in this crate keep all 16 guard bytes NUL.
///
/// Pointers returned by [`buf`](Self::buf) are stable between mutating calls
/// and invalidated by `consume` and `fill`.
pub trait StreamCursor {
    /// Returns a pointer to the first pending byte.
    fn buf(&self) -> *const u8;

    /// Returns the number of pending bytes, excluding the guard bytes.
    fn size(&self) -> usize;

    /// Discards the first `min(n, size)` pending bytes.
    fn consume(&mut self, n: usize);

    /// Attempts to extend the pending region.
    ///
    /// Returns `Ok(true)` if new bytes arrived, `Ok(false)` if the source is
    /// exhausted. Calling `fill` on an exhausted cursor is a no-op that keeps
    /// returning `Ok(false)`.
    fn fill(&mut self) -> Result<bool>;

    /// Returns the pending bytes as a slice.
    fn pending(&self) -> &[u8] {
        // SAFETY: implementations guarantee `size()` readable bytes at
        // `buf()`, and the shared borrow forbids mutation while the slice
        // lives.
        unsafe { std::slice::from_raw_parts(self.buf(), self.size()) }
    }
}

impl<C: StreamCursor + ?Sized> StreamCursor for &mut C {
    fn buf(&self) -> *const u8 {
        (**self).buf()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn consume(&mut self, n: usize) {
        (**self).consume(n)
    }

    fn fill(&mut self) -> Result<bool> {
        (**self).fill()
    }
}

impl<C: StreamCursor + ?Sized> StreamCursor for Box<C> {
    fn buf(&self) -> *const u8 {
        (**self).buf()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn consume(&mut self, n: usize) {
        (**self).consume(n)
    }

    fn fill(&mut self) -> Result<bool> {
        (**self).fill()
    }
}

#[cfg(unix)]
pub use self::mapped::MappedFileCursor;

#[cfg(unix)]
mod mapped {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;
    use std::ptr;

    use log::debug;

    use super::StreamCursor;
    use crate::error::{Error, Result};

    /// A cursor over a read-only memory-mapped file.
    ///
    /// The whole file is presented as a single window, so `fill` never has
    /// anything to add and the parser runs without refills or copies.
    ///
    /// The over-read guarantee is provided by a guard page: an anonymous
    /// read-only reservation one page larger than the rounded-up file size is
    /// mapped first, then the file is mapped over its front at a fixed
    /// address. The reservation's trailing page stays anonymous zero-fill, so
    /// a 16-byte load at the last file byte lands in readable NULs instead of
    /// faulting. When the file length is not a multiple of the page size, the
    /// kernel's zero-fill of the final partial page provides the NULs and the
    /// guard page backs the page-aligned case.
    #[derive(Debug)]
    pub struct MappedFileCursor {
        /// Reservation base; also the file mapping's address.
        base: *mut libc::c_void,
        /// Reservation length: file size rounded up a page, plus the guard
        /// page.
        total: usize,
        ptr: *const u8,
        end: *const u8,
    }

    impl MappedFileCursor {
        /// Maps the file at `path` read-only.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<MappedFileCursor> {
            let path = path.as_ref();
            let open_err = |source: io::Error| Error::Open { path: path.into(), source };

            let file = File::open(path).map_err(open_err)?;
            let len = file.metadata().map_err(open_err)?.len() as usize;

            // SAFETY: querying a system constant has no preconditions.
            let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
            let total = len.div_ceil(page) * page + page;

            // SAFETY: an anonymous reservation at a kernel-chosen address
            // touches no existing mapping.
            let base = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    total,
                    libc::PROT_READ,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if base == libc::MAP_FAILED {
                return Err(open_err(io::Error::last_os_error()));
            }

            if len > 0 {
                // SAFETY: the fixed placement overwrites only the front of
                // the reservation made above, which this cursor owns.
                let fixed = unsafe {
                    libc::mmap(
                        base,
                        len,
                        libc::PROT_READ,
                        libc::MAP_SHARED | libc::MAP_FIXED,
                        file.as_raw_fd(),
                        0,
                    )
                };
                if fixed == libc::MAP_FAILED {
                    let source = io::Error::last_os_error();
                    // SAFETY: unmapping the reservation taken above.
                    unsafe { libc::munmap(base, total) };
                    return Err(open_err(source));
                }
                if fixed != base {
                    // SAFETY: both regions were mapped above and are released
                    // before the error propagates.
                    unsafe {
                        libc::munmap(fixed, len);
                        libc::munmap(base, total);
                    }
                    return Err(Error::MapLayout);
                }

                // SAFETY: `base..base + len` is the file mapping made above.
                unsafe { libc::madvise(base, len, libc::MADV_SEQUENTIAL) };
            }

            debug!("mapped {} ({len} bytes + guard page)", path.display());

            Ok(MappedFileCursor {
                base,
                total,
                ptr: base.cast_const().cast(),
                end: unsafe { base.cast_const().cast::<u8>().add(len) },
            })
        }
    }

    impl StreamCursor for MappedFileCursor {
        fn buf(&self) -> *const u8 {
            self.ptr
        }

        fn size(&self) -> usize {
            self.end as usize - self.ptr as usize
        }

        fn consume(&mut self, n: usize) {
            let n = n.min(self.size());
            // SAFETY: `n <= size`, so the result stays within the mapping.
            self.ptr = unsafe { self.ptr.add(n) };
        }

        /// A mapped file is a single window; there is never more to add.
        fn fill(&mut self) -> Result<bool> {
            Ok(false)
        }
    }

    impl Drop for MappedFileCursor {
        fn drop(&mut self) {
            // SAFETY: one munmap over the reservation's full extent releases
            // both the file overlay and the guard page.
            unsafe { libc::munmap(self.base, self.total) };
        }
    }

    #[cfg(test)]
    mod tests {
        use std::io::Write;

        use super::*;

        fn temp_file(contents: &[u8]) -> std::path::PathBuf {
            use std::sync::atomic::{AtomicUsize, Ordering};
            static COUNTER: AtomicUsize = AtomicUsize::new(0);

            let path = std::env::temp_dir().join(format!(
                "csvjet-cursor-{}-{}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::Relaxed),
            ));
            let mut file = File::create(&path).unwrap();
            file.write_all(contents).unwrap();
            path
        }

        #[test]
        fn window_matches_file_contents() {
            let path = temp_file(b"a,b,c\n1,2,3\n");
            let cursor = MappedFileCursor::open(&path).unwrap();
            assert_eq!(cursor.pending(), b"a,b,c\n1,2,3\n");
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn guard_bytes_are_nul() {
            let path = temp_file(b"no trailing newline");
            let cursor = MappedFileCursor::open(&path).unwrap();
            let end = unsafe { cursor.buf().add(cursor.size()) };
            for i in 0..16 {
                // SAFETY: the guard invariant under test.
                assert_eq!(unsafe { *end.add(i) }, 0, "guard byte {i}");
            }
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn consume_advances_and_saturates() {
            let path = temp_file(b"abcdef");
            let mut cursor = MappedFileCursor::open(&path).unwrap();
            cursor.consume(2);
            assert_eq!(cursor.pending(), b"cdef");
            cursor.consume(100);
            assert_eq!(cursor.size(), 0);
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn fill_reports_exhaustion() {
            let path = temp_file(b"x\n");
            let mut cursor = MappedFileCursor::open(&path).unwrap();
            assert!(!cursor.fill().unwrap());
            assert_eq!(cursor.pending(), b"x\n");
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn empty_file_maps_to_empty_window() {
            let path = temp_file(b"");
            let cursor = MappedFileCursor::open(&path).unwrap();
            assert_eq!(cursor.size(), 0);
            // SAFETY: the guard invariant must hold even with no file bytes.
            assert_eq!(unsafe { *cursor.buf() }, 0);
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn missing_file_reports_path() {
            let err = MappedFileCursor::open("/nonexistent/csvjet-test").unwrap_err();
            assert!(err.to_string().contains("/nonexistent/csvjet-test"));
        }
    }
}
