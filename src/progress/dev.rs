use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// full progress bar
pub const PROGRESS_FULL: u8 = 20;

/// What a device is doing. Doubles as the stop flag: a worker keeps going
/// only while the mode still reads as the one it started with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Read,
    Write,
    Short,
    Long,
}

impl Mode {
    fn to_u8(self) -> u8 {
        match self {
            Mode::Idle => 0,
            Mode::Read => 1,
            Mode::Write => 2,
            Mode::Short => 3,
            Mode::Long => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Mode::Read,
            2 => Mode::Write,
            3 => Mode::Short,
            4 => Mode::Long,
            _ => Mode::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Idle => "Idle",
            Mode::Read => "Read",
            Mode::Write => "Write",
            Mode::Short => "Short",
            Mode::Long => "Long",
        }
    }
}

/// evidence-of-life glyph
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Spinner {
    Blank,
    Bar,
    Slash,
    Dash,
    Backslash,
}

impl Spinner {
    pub fn next(self) -> Self {
        match self {
            Spinner::Blank | Spinner::Backslash => Spinner::Bar,
            Spinner::Bar => Spinner::Slash,
            Spinner::Slash => Spinner::Dash,
            Spinner::Dash => Spinner::Backslash,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Spinner::Blank => ' ',
            Spinner::Bar => '|',
            Spinner::Slash => '/',
            Spinner::Dash => '-',
            Spinner::Backslash => '\\',
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Spinner::Blank => 0,
            Spinner::Bar => 1,
            Spinner::Slash => 2,
            Spinner::Dash => 3,
            Spinner::Backslash => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Spinner::Bar,
            2 => Spinner::Slash,
            3 => Spinner::Dash,
            4 => Spinner::Backslash,
            _ => Spinner::Blank,
        }
    }
}

/// single-field update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Mode(Mode),
    Progress(u8),
    Speed(u64),
    Slow(u64),
    Error(u64),
    Loop(u64),
    Busy(Spinner),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub mode: Mode,
    pub progress: u8,
    pub speed: u64,
    pub slow: u64,
    pub error: u64,
    pub loops: u64,
    pub busy: Spinner,
}

/// live status of one device
///
/// Every field is its own atomic. Readers may see a mix of old and new
/// fields, which is fine for a display sampled every tick.
#[derive(Default)]
pub struct StatusRecord {
    mode: AtomicU8,
    progress: AtomicU8,
    speed: AtomicU64,
    slow: AtomicU64,
    error: AtomicU64,
    loops: AtomicU64,
    busy: AtomicU8,
    /// a worker thread is bound to this device, set from claim to worker exit
    worker: AtomicBool,
}

impl StatusRecord {
    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set(&self, field: Field) {
        match field {
            Field::Mode(m) => self.mode.store(m.to_u8(), Ordering::Release),
            Field::Progress(p) => self.progress.store(p.min(PROGRESS_FULL), Ordering::Release),
            Field::Speed(v) => self.speed.store(v, Ordering::Release),
            Field::Slow(v) => self.slow.store(v, Ordering::Release),
            Field::Error(v) => self.error.store(v, Ordering::Release),
            Field::Loop(v) => self.loops.store(v, Ordering::Release),
            Field::Busy(s) => self.busy.store(s.to_u8(), Ordering::Release),
        }
    }

    pub fn add_slow(&self) {
        self.slow.fetch_add(1, Ordering::AcqRel);
    }

    pub fn add_error(&self) {
        self.error.fetch_add(1, Ordering::AcqRel);
    }

    pub fn add_loop(&self) {
        self.loops.fetch_add(1, Ordering::AcqRel);
    }

    pub fn busy(&self) -> Spinner {
        Spinner::from_u8(self.busy.load(Ordering::Acquire))
    }

    pub fn advance_busy(&self) {
        self.set(Field::Busy(self.busy().next()));
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot{
            mode: self.mode(),
            progress: self.progress.load(Ordering::Acquire),
            speed: self.speed.load(Ordering::Acquire),
            slow: self.slow.load(Ordering::Acquire),
            error: self.error.load(Ordering::Acquire),
            loops: self.loops.load(Ordering::Acquire),
            busy: self.busy(),
        }
    }

    pub fn worker_live(&self) -> bool {
        self.worker.load(Ordering::Acquire)
    }

    /// Bind a new worker running `mode`. Fails while another worker is bound
    /// or the mode is not Idle.
    pub(crate) fn claim(&self, mode: Mode) -> bool {
        if self.worker.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return false;
        }
        let claimed = self.mode
            .compare_exchange(Mode::Idle.to_u8(), mode.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed {
            self.worker.store(false, Ordering::Release);
        }
        claimed
    }

    pub(crate) fn release(&self) {
        self.worker.store(false, Ordering::Release);
    }

    /// Stop request. Returns false when nothing was running.
    pub fn request_idle(&self) -> bool {
        self.mode.swap(Mode::Idle.to_u8(), Ordering::AcqRel) != Mode::Idle.to_u8()
    }

    /// Worker-side completion: back to Idle only if the mode is still `mode`.
    pub fn finish(&self, mode: Mode) -> bool {
        self.mode
            .compare_exchange(mode.to_u8(), Mode::Idle.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_spinner_cycle() {
        let mut s = Spinner::Blank;
        let mut seen = String::new();
        for _ in 0..5 {
            s = s.next();
            seen.push(s.glyph());
        }
        assert_eq!(seen,"|/-\\|");
    }

    #[test]
    fn test_claim_is_exclusive() {
        let rec = StatusRecord::default();
        assert_eq!(rec.mode(),Mode::Idle);
        assert!(rec.claim(Mode::Read));
        assert!(!rec.claim(Mode::Write));
        assert_eq!(rec.mode(),Mode::Read);

        // stopped but the worker has not unwound yet
        assert!(rec.request_idle());
        assert!(!rec.claim(Mode::Write));
        assert!(rec.worker_live());
        rec.release();
        assert!(!rec.worker_live());
        assert!(rec.claim(Mode::Write));
        assert_eq!(rec.mode(),Mode::Write);
    }

    #[test]
    fn test_finish_respects_external_stop() {
        let rec = StatusRecord::default();
        assert!(rec.claim(Mode::Short));
        assert!(rec.request_idle());
        assert!(!rec.request_idle());
        assert!(!rec.finish(Mode::Short));
        assert_eq!(rec.mode(),Mode::Idle);
    }

    #[test]
    fn test_fields() {
        let rec = StatusRecord::default();
        rec.set(Field::Progress(35));
        rec.add_slow();
        rec.add_slow();
        rec.add_error();
        rec.set(Field::Speed(120));
        rec.advance_busy();
        let s = rec.snapshot();
        assert_eq!(s.progress,PROGRESS_FULL);
        assert_eq!((s.slow,s.error,s.speed),(2,1,120));
        assert_eq!(s.busy,Spinner::Bar);
    }
}
