//! Architecture-specific streaming memory kernels.
//!
//! Contention is generated with non-temporal (cache-bypassing) memory
//! operations so that every byte a lane moves hits the main-memory bus
//! instead of being absorbed by the cache hierarchy. Each kernel works
//! through its lane's buffer in unrolled blocks of sixteen operations to
//! keep as many memory transactions in flight as the load/store units
//! allow, and ends with a store-visibility fence so a lane's traffic is
//! globally visible before the lane reports completion.
//!
//! Unsupported hosts degrade to a portable volatile-word loop rather than
//! failing to build; a specific kernel can still be forced through
//! [`GeneratorTuning::kernel`](crate::GeneratorTuning).

use crate::mode::ContentionMode;
use serde::{Deserialize, Serialize};

/// Contention kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    /// Portable fallback: volatile 64-bit loads/stores, atomic fence
    Scalar,
    /// x86_64 AVX2: `vmovntdqa`/`vmovntdq` over 32-byte vectors, `sfence`
    Avx2,
    /// aarch64 NEON: `ldnp`/`stnp` pair ops over quadwords, `dsb sy`
    Neon,
}

impl KernelKind {
    /// Pick the widest kernel this host can run.
    ///
    /// Detection happens once per generator, not per burst.
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                Self::Avx2
            } else {
                Self::Scalar
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            Self::Neon
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Self::Scalar
        }
    }

    /// Whether the current host can execute this kernel
    #[must_use]
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            Self::Avx2 => is_x86_feature_detected!("avx2"),
            #[cfg(not(target_arch = "x86_64"))]
            Self::Avx2 => false,
            Self::Neon => cfg!(target_arch = "aarch64"),
        }
    }

    /// Bytes moved by one elementary operation of this kernel
    #[must_use]
    pub fn vector_width(&self) -> usize {
        match self {
            Self::Scalar => 8,
            Self::Avx2 => 32,
            Self::Neon => 16,
        }
    }

    /// Bytes covered by one unrolled kernel block (sixteen operations for
    /// the vector kernels). Lengths are consumed a whole block at a time;
    /// a sub-block tail is skipped, matching how bursts round their work.
    #[must_use]
    pub fn block_bytes(&self) -> usize {
        match self {
            Self::Avx2 => 512,
            Self::Scalar | Self::Neon => 256,
        }
    }

    /// Required buffer alignment: one whole kernel block
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.block_bytes()
    }

    /// Lowercase kernel name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Avx2 => "avx2",
            Self::Neon => "neon",
        }
    }

    /// Run one contention pass over a lane's buffer pair.
    ///
    /// # Safety
    ///
    /// `read` and `write` must each be valid for `length` bytes, aligned
    /// to [`alignment()`](Self::alignment), and exclusively owned by the
    /// calling lane for the duration of the pass.
    pub(crate) unsafe fn run(
        self,
        mode: ContentionMode,
        read: *const u8,
        write: *mut u8,
        length: usize,
    ) {
        match self {
            #[cfg(target_arch = "x86_64")]
            Self::Avx2 => match mode {
                ContentionMode::Read => avx2::read(read, length),
                ContentionMode::Write => avx2::write(write, length),
                ContentionMode::Copy => avx2::copy(read, write, length),
            },
            #[cfg(target_arch = "aarch64")]
            Self::Neon => match mode {
                ContentionMode::Read => neon::read(read, length),
                ContentionMode::Write => neon::write(write, length),
                ContentionMode::Copy => neon::copy(read, write, length),
            },
            // Kernels the host cannot execute are rejected at generator
            // construction, so only the portable loop reaches this arm.
            _ => match mode {
                ContentionMode::Read => scalar::read(read, length),
                ContentionMode::Write => scalar::write(write, length),
                ContentionMode::Copy => scalar::copy(read, write, length),
            },
        }
    }
}

impl std::fmt::Display for KernelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Portable fallback: volatile 64-bit words in 256-byte blocks, fenced.
///
/// Volatile accesses cannot be elided or fused, so the traffic survives
/// optimization even though the values are meaningless.
mod scalar {
    use std::sync::atomic::{fence, Ordering};

    const WORDS_PER_BLOCK: usize = 32;

    pub unsafe fn read(src: *const u8, length: usize) {
        let mut p = src.cast::<u64>();
        let mut remaining = length;
        let mut acc = 0u64;
        while remaining >= super::BLOCK_PORTABLE {
            for i in 0..WORDS_PER_BLOCK {
                acc ^= p.add(i).read_volatile();
            }
            p = p.add(WORDS_PER_BLOCK);
            remaining -= super::BLOCK_PORTABLE;
        }
        fence(Ordering::SeqCst);
        std::hint::black_box(acc);
    }

    pub unsafe fn write(dst: *mut u8, length: usize) {
        let mut p = dst.cast::<u64>();
        let mut remaining = length;
        while remaining >= super::BLOCK_PORTABLE {
            for i in 0..WORDS_PER_BLOCK {
                p.add(i).write_volatile(0);
            }
            p = p.add(WORDS_PER_BLOCK);
            remaining -= super::BLOCK_PORTABLE;
        }
        fence(Ordering::SeqCst);
    }

    pub unsafe fn copy(src: *const u8, dst: *mut u8, length: usize) {
        let mut s = src.cast::<u64>();
        let mut d = dst.cast::<u64>();
        let mut remaining = length;
        while remaining >= super::BLOCK_PORTABLE {
            for i in 0..WORDS_PER_BLOCK {
                d.add(i).write_volatile(s.add(i).read_volatile());
            }
            s = s.add(WORDS_PER_BLOCK);
            d = d.add(WORDS_PER_BLOCK);
            remaining -= super::BLOCK_PORTABLE;
        }
        fence(Ordering::SeqCst);
    }
}

const BLOCK_PORTABLE: usize = 256;

/// AVX2 streaming kernels: sixteen 32-byte non-temporal vector ops per
/// 512-byte block, `sfence` at the end.
#[cfg(target_arch = "x86_64")]
mod avx2 {
    use std::arch::x86_64::{
        __m256i, _mm256_or_si256, _mm256_setzero_si256, _mm256_stream_load_si256,
        _mm256_stream_si256, _mm_sfence,
    };

    const BLOCK: usize = 512;
    const VECTORS_PER_BLOCK: usize = 16;

    /// Streaming loads. ORing into an accumulator keeps the loads
    /// observable so the optimizer cannot drop them.
    #[target_feature(enable = "avx2")]
    pub unsafe fn read(src: *const u8, length: usize) {
        let mut p = src.cast::<__m256i>();
        let mut remaining = length;
        let mut acc = _mm256_setzero_si256();
        while remaining >= BLOCK {
            for i in 0..VECTORS_PER_BLOCK {
                acc = _mm256_or_si256(acc, _mm256_stream_load_si256(p.add(i)));
            }
            p = p.add(VECTORS_PER_BLOCK);
            remaining -= BLOCK;
        }
        _mm_sfence();
        std::hint::black_box(acc);
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn write(dst: *mut u8, length: usize) {
        let zero = _mm256_setzero_si256();
        let mut p = dst.cast::<__m256i>();
        let mut remaining = length;
        while remaining >= BLOCK {
            for i in 0..VECTORS_PER_BLOCK {
                _mm256_stream_si256(p.add(i), zero);
            }
            p = p.add(VECTORS_PER_BLOCK);
            remaining -= BLOCK;
        }
        _mm_sfence();
    }

    /// Loads a full block into sixteen vector registers before storing any
    /// of it, maximizing in-flight memory transactions per iteration.
    #[target_feature(enable = "avx2")]
    pub unsafe fn copy(src: *const u8, dst: *mut u8, length: usize) {
        let mut s = src.cast::<__m256i>();
        let mut d = dst.cast::<__m256i>();
        let mut remaining = length;
        while remaining >= BLOCK {
            let v0 = _mm256_stream_load_si256(s);
            let v1 = _mm256_stream_load_si256(s.add(1));
            let v2 = _mm256_stream_load_si256(s.add(2));
            let v3 = _mm256_stream_load_si256(s.add(3));
            let v4 = _mm256_stream_load_si256(s.add(4));
            let v5 = _mm256_stream_load_si256(s.add(5));
            let v6 = _mm256_stream_load_si256(s.add(6));
            let v7 = _mm256_stream_load_si256(s.add(7));
            let v8 = _mm256_stream_load_si256(s.add(8));
            let v9 = _mm256_stream_load_si256(s.add(9));
            let v10 = _mm256_stream_load_si256(s.add(10));
            let v11 = _mm256_stream_load_si256(s.add(11));
            let v12 = _mm256_stream_load_si256(s.add(12));
            let v13 = _mm256_stream_load_si256(s.add(13));
            let v14 = _mm256_stream_load_si256(s.add(14));
            let v15 = _mm256_stream_load_si256(s.add(15));
            _mm256_stream_si256(d, v0);
            _mm256_stream_si256(d.add(1), v1);
            _mm256_stream_si256(d.add(2), v2);
            _mm256_stream_si256(d.add(3), v3);
            _mm256_stream_si256(d.add(4), v4);
            _mm256_stream_si256(d.add(5), v5);
            _mm256_stream_si256(d.add(6), v6);
            _mm256_stream_si256(d.add(7), v7);
            _mm256_stream_si256(d.add(8), v8);
            _mm256_stream_si256(d.add(9), v9);
            _mm256_stream_si256(d.add(10), v10);
            _mm256_stream_si256(d.add(11), v11);
            _mm256_stream_si256(d.add(12), v12);
            _mm256_stream_si256(d.add(13), v13);
            _mm256_stream_si256(d.add(14), v14);
            _mm256_stream_si256(d.add(15), v15);
            s = s.add(VECTORS_PER_BLOCK);
            d = d.add(VECTORS_PER_BLOCK);
            remaining -= BLOCK;
        }
        _mm_sfence();
    }
}

/// NEON streaming kernels: `ldnp`/`stnp` non-temporal pair ops over
/// 256-byte blocks, `dsb sy` barrier at the end. The pair instructions
/// have no stable intrinsic, so the loops are inline assembly.
#[cfg(target_arch = "aarch64")]
mod neon {
    use std::arch::asm;

    pub unsafe fn read(src: *const u8, length: usize) {
        asm!(
            "cmp {rem}, #256",
            "b.lt 3f",
            "2:",
            "ldnp x0, x1, [{ptr}]",
            "ldnp x0, x1, [{ptr}, #16]",
            "ldnp x0, x1, [{ptr}, #32]",
            "ldnp x0, x1, [{ptr}, #48]",
            "ldnp x0, x1, [{ptr}, #64]",
            "ldnp x0, x1, [{ptr}, #80]",
            "ldnp x0, x1, [{ptr}, #96]",
            "ldnp x0, x1, [{ptr}, #112]",
            "ldnp x0, x1, [{ptr}, #128]",
            "ldnp x0, x1, [{ptr}, #144]",
            "ldnp x0, x1, [{ptr}, #160]",
            "ldnp x0, x1, [{ptr}, #176]",
            "ldnp x0, x1, [{ptr}, #192]",
            "ldnp x0, x1, [{ptr}, #208]",
            "ldnp x0, x1, [{ptr}, #224]",
            "ldnp x0, x1, [{ptr}, #240]",
            "add {ptr}, {ptr}, #256",
            "sub {rem}, {rem}, #256",
            "cmp {rem}, #256",
            "b.ge 2b",
            "3:",
            "dsb sy",
            rem = inout(reg) length => _,
            ptr = inout(reg) src => _,
            out("x0") _,
            out("x1") _,
            options(nostack),
        );
    }

    pub unsafe fn write(dst: *mut u8, length: usize) {
        asm!(
            "cmp {rem}, #256",
            "b.lt 3f",
            "mov x0, xzr",
            "mov x1, xzr",
            "2:",
            "stnp x0, x1, [{ptr}]",
            "stnp x0, x1, [{ptr}, #16]",
            "stnp x0, x1, [{ptr}, #32]",
            "stnp x0, x1, [{ptr}, #48]",
            "stnp x0, x1, [{ptr}, #64]",
            "stnp x0, x1, [{ptr}, #80]",
            "stnp x0, x1, [{ptr}, #96]",
            "stnp x0, x1, [{ptr}, #112]",
            "stnp x0, x1, [{ptr}, #128]",
            "stnp x0, x1, [{ptr}, #144]",
            "stnp x0, x1, [{ptr}, #160]",
            "stnp x0, x1, [{ptr}, #176]",
            "stnp x0, x1, [{ptr}, #192]",
            "stnp x0, x1, [{ptr}, #208]",
            "stnp x0, x1, [{ptr}, #224]",
            "stnp x0, x1, [{ptr}, #240]",
            "add {ptr}, {ptr}, #256",
            "sub {rem}, {rem}, #256",
            "cmp {rem}, #256",
            "b.ge 2b",
            "3:",
            "dsb sy",
            rem = inout(reg) length => _,
            ptr = inout(reg) dst => _,
            out("x0") _,
            out("x1") _,
            options(nostack),
        );
    }

    /// Eight registers in flight: four pair loads then four pair stores
    /// per 64-byte group, four groups per block.
    pub unsafe fn copy(src: *const u8, dst: *mut u8, length: usize) {
        asm!(
            "cmp {rem}, #256",
            "b.lt 3f",
            "2:",
            "ldnp x0, x1, [{sp1}]",
            "ldnp x2, x3, [{sp1}, #16]",
            "ldnp x4, x5, [{sp1}, #32]",
            "ldnp x6, x7, [{sp1}, #48]",
            "stnp x0, x1, [{dp1}]",
            "stnp x2, x3, [{dp1}, #16]",
            "stnp x4, x5, [{dp1}, #32]",
            "stnp x6, x7, [{dp1}, #48]",
            "ldnp x0, x1, [{sp1}, #64]",
            "ldnp x2, x3, [{sp1}, #80]",
            "ldnp x4, x5, [{sp1}, #96]",
            "ldnp x6, x7, [{sp1}, #112]",
            "stnp x0, x1, [{dp1}, #64]",
            "stnp x2, x3, [{dp1}, #80]",
            "stnp x4, x5, [{dp1}, #96]",
            "stnp x6, x7, [{dp1}, #112]",
            "ldnp x0, x1, [{sp1}, #128]",
            "ldnp x2, x3, [{sp1}, #144]",
            "ldnp x4, x5, [{sp1}, #160]",
            "ldnp x6, x7, [{sp1}, #176]",
            "stnp x0, x1, [{dp1}, #128]",
            "stnp x2, x3, [{dp1}, #144]",
            "stnp x4, x5, [{dp1}, #160]",
            "stnp x6, x7, [{dp1}, #176]",
            "ldnp x0, x1, [{sp1}, #192]",
            "ldnp x2, x3, [{sp1}, #208]",
            "ldnp x4, x5, [{sp1}, #224]",
            "ldnp x6, x7, [{sp1}, #240]",
            "stnp x0, x1, [{dp1}, #192]",
            "stnp x2, x3, [{dp1}, #208]",
            "stnp x4, x5, [{dp1}, #224]",
            "stnp x6, x7, [{dp1}, #240]",
            "add {sp1}, {sp1}, #256",
            "add {dp1}, {dp1}, #256",
            "sub {rem}, {rem}, #256",
            "cmp {rem}, #256",
            "b.ge 2b",
            "3:",
            "dsb sy",
            rem = inout(reg) length => _,
            sp1 = inout(reg) src => _,
            dp1 = inout(reg) dst => _,
            out("x0") _,
            out("x1") _,
            out("x2") _,
            out("x3") _,
            out("x4") _,
            out("x5") _,
            out("x6") _,
            out("x7") _,
            options(nostack),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LaneBuffers;

    #[test]
    fn detect_returns_supported_kernel() {
        let kind = KernelKind::detect();
        assert!(kind.is_supported());
    }

    #[test]
    fn scalar_is_supported_everywhere() {
        assert!(KernelKind::Scalar.is_supported());
    }

    #[test]
    fn alignment_is_one_unrolled_block() {
        assert_eq!(KernelKind::Avx2.vector_width(), 32);
        assert_eq!(KernelKind::Avx2.alignment(), 512);
        assert_eq!(KernelKind::Neon.vector_width(), 16);
        assert_eq!(KernelKind::Neon.alignment(), 256);
        assert_eq!(KernelKind::Scalar.alignment(), 256);
    }

    #[test]
    fn names_are_lowercase() {
        assert_eq!(KernelKind::Scalar.to_string(), "scalar");
        assert_eq!(KernelKind::Avx2.to_string(), "avx2");
        assert_eq!(KernelKind::Neon.to_string(), "neon");
    }

    #[test]
    fn scalar_copy_moves_bytes() {
        let kind = KernelKind::Scalar;
        let mut lane = LaneBuffers::allocate(1024, kind.alignment()).unwrap();
        unsafe {
            std::ptr::write_bytes(lane.read_ptr_mut(), 0xAB, 1024);
            kind.run(ContentionMode::Copy, lane.read_ptr(), lane.write_ptr(), 1024);
            assert_eq!(*lane.write_ptr(), 0xAB);
            assert_eq!(*lane.write_ptr().add(1023), 0xAB);
        }
    }

    #[test]
    fn detected_kernel_runs_all_modes() {
        let kind = KernelKind::detect();
        let size = kind.alignment() * 4;
        let mut lane = LaneBuffers::allocate(size, kind.alignment()).unwrap();
        unsafe {
            std::ptr::write_bytes(lane.read_ptr_mut(), 0x5A, size);
            for mode in ContentionMode::ALL {
                kind.run(mode, lane.read_ptr(), lane.write_ptr(), size);
            }
            // Copy ran last; the write buffer holds the read pattern.
            assert_eq!(*lane.write_ptr(), 0x5A);
        }
    }

    #[test]
    fn sub_block_lengths_are_a_no_op() {
        let kind = KernelKind::Scalar;
        let mut lane = LaneBuffers::allocate(512, kind.alignment()).unwrap();
        unsafe {
            std::ptr::write_bytes(lane.read_ptr_mut(), 0xFF, 512);
            // Below one block no bytes move, matching burst rounding.
            kind.run(ContentionMode::Copy, lane.read_ptr(), lane.write_ptr(), 100);
            assert_eq!(*lane.write_ptr(), 0);
        }
    }
}
