//! Incoming pattern matching
//!
//! A [`MatchTable`] watches the received byte stream for registered byte
//! sequences. Matching happens one byte at a time inside the receive
//! interrupt ([`MatchTable::advance`]), which only moves progress counters
//! and sets trigger bits. Handlers run later, from foreground code, when the
//! dispatch sweep collects the triggered entries.
//!
//! Each entry uses a single-character restart rule rather than a full
//! prefix automaton: on a mismatch the counter drops to 1 if the byte equals
//! the first pattern byte, otherwise to 0. Patterns whose prefix overlaps
//! itself (e.g. `"aab"` fed `"aaab"`) can therefore be missed.

use heapless::Vec;

use crate::uart::RxObserver;

/// Callback run by the dispatch sweep with the context given at registration
pub type MatchHandler<C> = fn(C);

/// Registration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatchError {
    /// All pattern slots are in use
    TableFull,
}

/// One registered pattern and its progress through the input
#[derive(Debug, Clone)]
pub struct MatchEntry<C, const L: usize> {
    pattern: Vec<u8, L>,
    /// Length of the currently matched prefix, always `< pattern.len()`
    progress: usize,
    handler: MatchHandler<C>,
    context: C,
}

impl<C, const L: usize> MatchEntry<C, L> {
    /// Stored pattern, after truncation to `L` bytes
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Number of pattern bytes matched so far
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Feed one byte; returns `true` when the pattern completes
    fn advance(&mut self, byte: u8) -> bool {
        let Some(&first) = self.pattern.first() else {
            // Empty pattern completes on every byte
            return true;
        };

        if byte == self.pattern[self.progress] {
            self.progress += 1;
            if self.progress == self.pattern.len() {
                self.progress = 0;
                return true;
            }
        } else if self.progress > 0 {
            self.progress = usize::from(byte == first);
        }
        false
    }
}

/// Registered patterns plus the set of completed-but-undispatched entries
///
/// `P` bounds the number of patterns (at most 32), `L` the stored length of
/// each pattern. Entries keep registration order; removal shifts later
/// entries down.
#[derive(Debug, Clone)]
pub struct MatchTable<C, const P: usize, const L: usize> {
    entries: Vec<MatchEntry<C, L>, P>,
    /// Bit `i` set: entry `i` completed since the last sweep
    triggered: u32,
}

impl<C: Copy, const P: usize, const L: usize> Default for MatchTable<C, P, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Copy, const P: usize, const L: usize> MatchTable<C, P, L> {
    const FITS_BITSET: () = assert!(P <= 32, "at most 32 patterns fit the trigger bitset");

    /// Create an empty table
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_BITSET;
        Self {
            entries: Vec::new(),
            triggered: 0,
        }
    }

    /// Number of registered patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered entries in registration order
    pub fn entries(&self) -> &[MatchEntry<C, L>] {
        &self.entries
    }

    /// Whether entry `index` completed since the last sweep
    pub fn is_triggered(&self, index: usize) -> bool {
        index < self.entries.len() && self.triggered & (1 << index) != 0
    }

    /// Register `pattern`, truncated to `L` bytes
    ///
    /// The new entry starts with no progress. Duplicate patterns are kept as
    /// separate entries.
    pub fn register(
        &mut self,
        pattern: &[u8],
        handler: MatchHandler<C>,
        context: C,
    ) -> Result<(), MatchError> {
        let mut stored = Vec::new();
        // Cannot fail: truncated to capacity
        let _ = stored.extend_from_slice(Self::truncate(pattern));

        self.entries
            .push(MatchEntry {
                pattern: stored,
                progress: 0,
                handler,
                context,
            })
            .map_err(|_| MatchError::TableFull)
    }

    /// Remove the first entry whose stored pattern equals `pattern`
    ///
    /// `pattern` is truncated the same way as on registration. Returns
    /// `false` if nothing matched.
    pub fn deregister(&mut self, pattern: &[u8]) -> bool {
        let pattern = Self::truncate(pattern);
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.pattern.as_slice() == pattern)
        else {
            return false;
        };

        self.entries.remove(index);

        // Keep pending triggers attached to the entries that shifted down
        let below = self.triggered & ((1u32 << index) - 1);
        let above = self.triggered.checked_shr(index as u32 + 1).unwrap_or(0) << index;
        self.triggered = below | above;
        true
    }

    /// Feed one received byte to every entry
    pub fn advance(&mut self, byte: u8) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.advance(byte) {
                self.triggered |= 1 << index;
            }
        }
    }

    /// Collect the handlers of triggered entries and clear their bits
    pub fn take_triggered(&mut self) -> Vec<(MatchHandler<C>, C), P> {
        let mut ready = Vec::new();
        if self.triggered == 0 {
            return ready;
        }
        for (index, entry) in self.entries.iter().enumerate() {
            if self.triggered & (1 << index) != 0 {
                // Cannot fail: at most P entries
                let _ = ready.push((entry.handler, entry.context));
            }
        }
        self.triggered = 0;
        ready
    }

    /// Run the handler of every triggered entry once
    pub fn dispatch(&mut self) {
        for (handler, context) in self.take_triggered() {
            handler(context);
        }
    }

    fn truncate(pattern: &[u8]) -> &[u8] {
        &pattern[..pattern.len().min(L)]
    }
}

impl<C: Copy, const P: usize, const L: usize> RxObserver for MatchTable<C, P, L> {
    fn observe(&mut self, byte: u8) {
        self.advance(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    type Table = MatchTable<&'static AtomicUsize, 4, 8>;

    fn bump(counter: &'static AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn feed(table: &mut Table, bytes: &[u8]) {
        for &byte in bytes {
            table.advance(byte);
        }
    }

    fn progress_of(table: &Table, pattern: &[u8]) -> Option<usize> {
        table
            .entries()
            .iter()
            .find(|entry| entry.pattern() == pattern)
            .map(|entry| entry.progress())
    }

    #[test]
    fn test_full_match_triggers_once() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"ok", bump, &HITS).unwrap();

        feed(&mut table, b"o");
        assert!(!table.is_triggered(0));
        feed(&mut table, b"k");
        assert!(table.is_triggered(0));

        // Unrelated byte does not add or clear a trigger
        feed(&mut table, b"x");
        assert!(table.is_triggered(0));

        table.dispatch();
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
        assert!(!table.is_triggered(0));

        table.dispatch();
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_match_before_sweep_fires_once() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"ok", bump, &HITS).unwrap();

        feed(&mut table, b"okok");
        table.dispatch();
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_character_restart_rule() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"aab", bump, &HITS).unwrap();

        // 'a' -> 1, 'b' mismatches and is not 'a' -> 0
        feed(&mut table, b"ab");
        assert_eq!(progress_of(&table, b"aab"), Some(0));

        // 'a' -> 1, 'a' -> 2
        feed(&mut table, b"aa");
        assert_eq!(progress_of(&table, b"aab"), Some(2));
        assert!(!table.is_triggered(0));

        feed(&mut table, b"b");
        assert!(table.is_triggered(0));
    }

    #[test]
    fn test_self_overlapping_prefix_is_missed() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"aab", bump, &HITS).unwrap();

        // Third 'a' restarts at 1, so the trailing 'b' mismatches
        feed(&mut table, b"aaab");
        assert!(!table.is_triggered(0));
        assert_eq!(progress_of(&table, b"aab"), Some(0));
    }

    #[test]
    fn test_mismatch_on_first_byte_restarts() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"qwe", bump, &HITS).unwrap();

        feed(&mut table, b"qwqwe");
        assert!(table.is_triggered(0));
    }

    #[test]
    fn test_entries_progress_independently() {
        static SHORT: AtomicUsize = AtomicUsize::new(0);
        static LONG: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"qwe", bump, &SHORT).unwrap();
        table.register(b"qwerty", bump, &LONG).unwrap();

        feed(&mut table, b"qwerty");
        assert!(table.is_triggered(0));
        assert!(table.is_triggered(1));

        table.dispatch();
        assert_eq!(SHORT.load(Ordering::SeqCst), 1);
        assert_eq!(LONG.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_table_full() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        for pattern in [b"a", b"b", b"c", b"d"] {
            table.register(pattern, bump, &HITS).unwrap();
        }
        assert_eq!(table.register(b"e", bump, &HITS), Err(MatchError::TableFull));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_long_pattern_is_truncated() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"0123456789", bump, &HITS).unwrap();
        assert_eq!(table.entries()[0].pattern(), b"01234567");

        feed(&mut table, b"01234567");
        assert!(table.is_triggered(0));

        // Deregistering by the full literal finds the truncated entry
        assert!(table.deregister(b"0123456789"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_empty_pattern_triggers_on_next_byte() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"", bump, &HITS).unwrap();
        assert!(!table.is_triggered(0));

        feed(&mut table, b"z");
        table.dispatch();
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reregistering_resets_progress() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"abc", bump, &HITS).unwrap();
        feed(&mut table, b"ab");
        assert_eq!(progress_of(&table, b"abc"), Some(2));

        assert!(table.deregister(b"abc"));
        table.register(b"abc", bump, &HITS).unwrap();
        assert_eq!(progress_of(&table, b"abc"), Some(0));

        feed(&mut table, b"c");
        assert!(!table.is_triggered(0));
    }

    #[test]
    fn test_deregister_compacts_in_order() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"***", bump, &HITS).unwrap();
        table.register(b"qwe", bump, &HITS).unwrap();
        table.register(b"123", bump, &HITS).unwrap();

        assert!(table.deregister(b"***"));
        {
            let patterns: heapless::Vec<&[u8], 4> =
                table.entries().iter().map(|entry| entry.pattern()).collect();
            assert_eq!(patterns.as_slice(), &[b"qwe".as_slice(), b"123".as_slice()]);
        }

        // Unknown pattern is a no-op
        assert!(!table.deregister(b"nope"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_deregister_removes_first_duplicate_only() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"dup", bump, &HITS).unwrap();
        table.register(b"dup", bump, &HITS).unwrap();

        assert!(table.deregister(b"dup"));
        assert_eq!(table.len(), 1);
        assert!(table.deregister(b"dup"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_deregister_keeps_pending_triggers_aligned() {
        static FIRST: AtomicUsize = AtomicUsize::new(0);
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        static THIRD: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"x", bump, &FIRST).unwrap();
        table.register(b"y", bump, &SECOND).unwrap();
        table.register(b"z", bump, &THIRD).unwrap();

        feed(&mut table, b"xz");
        assert!(table.deregister(b"x"));

        // "z" moved from index 2 to 1 and keeps its trigger
        assert!(!table.is_triggered(0));
        assert!(table.is_triggered(1));

        table.dispatch();
        assert_eq!(FIRST.load(Ordering::SeqCst), 0);
        assert_eq!(SECOND.load(Ordering::SeqCst), 0);
        assert_eq!(THIRD.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_passes_registered_context() {
        static A: AtomicUsize = AtomicUsize::new(0);
        static B: AtomicUsize = AtomicUsize::new(0);
        let mut table = Table::new();
        table.register(b"1", bump, &A).unwrap();
        table.register(b"2", bump, &B).unwrap();

        feed(&mut table, b"2");
        table.dispatch();
        assert_eq!(A.load(Ordering::SeqCst), 0);
        assert_eq!(B.load(Ordering::SeqCst), 1);
    }
}
