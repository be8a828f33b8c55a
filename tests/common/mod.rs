//! Shared test doubles: a fake RAM region, a controllable loopback NIC,
//! and a scripted timer.

#![allow(dead_code)]

use core::cell::Cell;

use dma_coherency::{DmaRegion, MemoryClass, ProbeDevice, ProbeError, Ticks, Timer};

/// Heap-backed memory standing in for a DMA-capable region. The fake bus
/// address is independent of the CPU pointer, exactly like real hardware;
/// the mock NIC carries the same mapping.
pub struct TestRam {
    mem: Box<[u8]>,
    bus: u64,
}

impl TestRam {
    pub fn new(len: usize, bus: u64) -> Self {
        Self {
            mem: vec![0u8; len].into_boxed_slice(),
            bus,
        }
    }

    pub fn region(&mut self, class: MemoryClass) -> DmaRegion {
        unsafe { DmaRegion::new(self.mem.as_mut_ptr(), self.bus, self.mem.len(), class) }
    }

    pub fn cpu_ptr(&mut self) -> *mut u8 {
        self.mem.as_mut_ptr()
    }

    pub fn bus(&self) -> u64 {
        self.bus
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }
}

/// Byte pattern the mock writes in corruption mode; neither any probe
/// pattern nor a complement of one.
pub const CORRUPT_WORD: u32 = 0x01020304;

/// Controllable loopback NIC.
///
/// Dials:
/// - `coherent_writes_before_stale`: after this many `dma_write` calls the
///   device's writes stop reaching CPU-visible memory, emulating a
///   writeback cache hiding DMA writes (Stage 1 passes, Stage 2 sees
///   stale data).
/// - `corrupt_instead_of_stale`: dropped writes scribble `CORRUPT_WORD`
///   instead, emulating line tearing.
/// - `fail_from_op`: from this operation index on, every call returns the
///   given error.
/// - `echo_corrupt`: `dma_read` reports flipped bytes (device observed
///   wrong data).
pub struct MockNic {
    ram: *mut u8,
    ram_bus: u64,
    ram_len: usize,
    ops: usize,
    pub writes_seen: usize,
    pub reads_seen: usize,
    pub coherent_writes_before_stale: Option<usize>,
    pub corrupt_instead_of_stale: bool,
    pub fail_from_op: Option<(usize, ProbeError)>,
    pub echo_corrupt: bool,
}

impl MockNic {
    pub fn new(ram: &mut TestRam) -> Self {
        Self {
            ram: ram.cpu_ptr(),
            ram_bus: ram.bus(),
            ram_len: ram.len(),
            ops: 0,
            writes_seen: 0,
            reads_seen: 0,
            coherent_writes_before_stale: None,
            corrupt_instead_of_stale: false,
            fail_from_op: None,
            echo_corrupt: false,
        }
    }

    fn offset(&self, bus_addr: u64, len: usize) -> usize {
        let off = (bus_addr - self.ram_bus) as usize;
        assert!(off + len <= self.ram_len, "mock DMA outside test RAM");
        off
    }

    fn check_fail(&mut self) -> Result<(), ProbeError> {
        self.ops += 1;
        if let Some((from, err)) = self.fail_from_op {
            if self.ops > from {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl ProbeDevice for MockNic {
    fn dma_read(&mut self, bus_addr: u64, out: &mut [u8]) -> Result<(), ProbeError> {
        self.check_fail()?;
        self.reads_seen += 1;
        let off = self.offset(bus_addr, out.len());
        unsafe {
            core::ptr::copy_nonoverlapping(self.ram.add(off), out.as_mut_ptr(), out.len());
        }
        if self.echo_corrupt {
            for b in out.iter_mut() {
                *b ^= 0xFF;
            }
        }
        Ok(())
    }

    fn dma_write(&mut self, bus_addr: u64, data: &[u8]) -> Result<(), ProbeError> {
        self.check_fail()?;
        self.writes_seen += 1;
        let off = self.offset(bus_addr, data.len());

        if let Some(limit) = self.coherent_writes_before_stale {
            if self.writes_seen > limit {
                if self.corrupt_instead_of_stale {
                    let junk = CORRUPT_WORD.to_le_bytes();
                    unsafe {
                        for i in 0..data.len() {
                            *self.ram.add(off + i) = junk[i % 4];
                        }
                    }
                }
                // Stale mode: the write never reaches CPU-visible memory.
                return Ok(());
            }
        }

        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), self.ram.add(off), data.len());
        }
        Ok(())
    }
}

/// Timer advancing a fixed step per read. One tick is one microsecond.
///
/// With the default 1 µs step, timed snooping reads look like cache hits;
/// raise the step past the snoop threshold to emulate memory-speed reads,
/// or past a stage budget to exhaust it.
pub struct TestTimer {
    now: Cell<u64>,
    step: Cell<u64>,
}

impl TestTimer {
    pub fn new() -> Self {
        Self {
            now: Cell::new(0),
            step: Cell::new(1),
        }
    }

    pub fn with_step(step: u64) -> Self {
        let t = Self::new();
        t.step.set(step);
        t
    }

    pub fn set_step(&self, step: u64) {
        self.step.set(step);
    }
}

impl Timer for TestTimer {
    fn now(&self) -> Ticks {
        let t = self.now.get();
        self.now.set(t + self.step.get());
        Ticks(t)
    }

    fn ticks_per_second(&self) -> u64 {
        1_000_000
    }
}

/// Backend that records which cache operations ran, for guard tests.
#[derive(Default)]
pub struct RecordingBackend {
    pub line_flushes: Cell<usize>,
    pub full_flushes: Cell<usize>,
    pub barriers: Cell<usize>,
    pub touches: Cell<usize>,
    pub global_policy_applied: Cell<usize>,
}

impl dma_coherency::CacheBackend for RecordingBackend {
    fn flush_lines(&self, _ptr: *const u8, _len: usize, _line_size: u16) {
        self.line_flushes.set(self.line_flushes.get() + 1);
    }

    fn full_flush(&self) {
        self.full_flushes.set(self.full_flushes.get() + 1);
    }

    fn memory_barrier(&self) {
        self.barriers.set(self.barriers.get() + 1);
    }

    fn touch_lines(&self, _ptr: *const u8, _len: usize, _line_size: u16) {
        self.touches.set(self.touches.get() + 1);
    }

    fn apply_global_policy(&self) {
        self.global_policy_applied.set(self.global_policy_applied.get() + 1);
    }
}
