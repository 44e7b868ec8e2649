// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interleaving of packets across streams.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use isoplex_core::units::{TimeBase, TimeStamp};

use crate::cursor::StreamCursor;

/// The next sample of a stream.
#[derive(Copy, Clone, Debug)]
struct PendingSample {
    dts: TimeStamp,
    time_base: TimeBase,
    stream: usize,
}

impl Ord for PendingSample {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest decode time first. Ties go to the lowest stream index.
        TimeBase::cmp_instants((self.dts, self.time_base), (other.dts, other.time_base))
            .then(self.stream.cmp(&other.stream))
    }
}

impl PartialOrd for PendingSample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingSample {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingSample {}

/// A `Scheduler` picks the stream whose next sample has the earliest decode time.
#[derive(Default)]
pub(crate) struct Scheduler {
    pending: BinaryHeap<Reverse<PendingSample>>,
}

impl Scheduler {
    /// Queue the next sample of every stream that has one.
    pub fn rebuild(&mut self, cursors: &[&StreamCursor]) {
        self.pending.clear();

        for (stream, cursor) in cursors.iter().enumerate() {
            self.push(stream, cursor);
        }
    }

    /// Queue the next sample of `stream`, if it has one.
    pub fn push(&mut self, stream: usize, cursor: &StreamCursor) {
        if cursor.is_valid() {
            let time_base = cursor.time_base();
            self.pending.push(Reverse(PendingSample { dts: cursor.dts(), time_base, stream }));
        }
    }

    /// Take the stream with the earliest next sample.
    pub fn pop(&mut self) -> Option<usize> {
        self.pending.pop().map(|Reverse(pending)| pending.stream)
    }

    /// Returns true if no stream has a sample left.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::two_chunk_table;

    #[test]
    fn verify_earliest_first() {
        // 1000 ticks per sample at 1000 and 2000 ticks per second.
        let mut a = StreamCursor::new(0, two_chunk_table(), &Default::default()).unwrap();

        let mut table = two_chunk_table();
        table.timescale = 2000;
        let mut b = StreamCursor::new(1, table, &Default::default()).unwrap();

        let mut scheduler = Scheduler::default();
        scheduler.rebuild(&[&a, &b]);

        // Both start at 0s, the lower stream index wins.
        assert_eq!(scheduler.pop(), Some(0));
        assert_eq!(scheduler.pop(), Some(1));
        assert!(scheduler.is_empty());

        // Stream 0 is at 1s, stream 1 is at 0.5s.
        a.advance();
        b.advance();
        scheduler.rebuild(&[&a, &b]);
        assert_eq!(scheduler.pop(), Some(1));
        assert_eq!(scheduler.pop(), Some(0));
    }
}
