//! # Event Journal
//!
//! The auditable per-peer protocol log. One line per wire event:
//!
//! ```text
//! <tag> <t_ms> <TYPE> <seq_or_ack> <length>
//! ```
//!
//! `tag` is `snd`, `rcv` or `drp`; `t_ms` is milliseconds since the
//! connection epoch with exactly two decimals; `TYPE` is the segment kind;
//! `length` is the payload byte count (0 for ACK/SYN/FIN). After the
//! connection closes a statistics trailer is appended, separated from the
//! event lines by one blank line.
//!
//! The epoch is set explicitly by the driver: the sender arms it immediately
//! before journaling its SYN, the receiver on arrival of the first SYN, so
//! both ends stamp that event `0.00`.

use quanta::Instant;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::seq::SeqNum;
use crate::wire::SegmentKind;

/// Which way the journaled event went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
    Drop,
}

impl Direction {
    fn tag(self) -> &'static str {
        match self {
            Direction::Send => "snd",
            Direction::Recv => "rcv",
            Direction::Drop => "drp",
        }
    }
}

/// Append-only event log over any byte sink.
#[derive(Debug)]
pub struct Journal<W: Write> {
    out: W,
    epoch: Option<Instant>,
}

/// The journal flavor the drivers use.
pub type FileJournal = Journal<BufWriter<File>>;

impl FileJournal {
    /// Create (truncate) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Journal::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> Journal<W> {
    pub fn new(out: W) -> Self {
        Journal { out, epoch: None }
    }

    /// Fix the connection epoch at the current instant. All subsequent
    /// timestamps are offsets from this moment.
    pub fn start_clock(&mut self) {
        self.epoch = Some(Instant::now());
    }

    pub fn clock_started(&self) -> bool {
        self.epoch.is_some()
    }

    /// Append one event line.
    pub fn record(
        &mut self,
        dir: Direction,
        kind: SegmentKind,
        seq: SeqNum,
        len: usize,
    ) -> io::Result<()> {
        let t_ms = match self.epoch {
            Some(epoch) => Instant::now().duration_since(epoch).as_secs_f64() * 1000.0,
            None => 0.0,
        };
        writeln!(self.out, "{} {:.2} {} {} {}", dir.tag(), t_ms, kind, seq, len)
    }

    /// Append the statistics trailer and flush the sink.
    pub fn finish(&mut self, trailer: &str) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.write_all(trailer.as_bytes())?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(journal: &Journal<Vec<u8>>) -> Vec<String> {
        String::from_utf8(journal.out.clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn line_layout_matches_log_grammar() {
        let mut j = Journal::new(Vec::new());
        j.start_clock();
        j.record(Direction::Send, SegmentKind::Data, SeqNum::new(123), 1000)
            .unwrap();
        let line = &lines(&j)[0];
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], "snd");
        assert_eq!(fields[2], "DATA");
        assert_eq!(fields[3], "123");
        assert_eq!(fields[4], "1000");
        // Two decimals, always.
        assert_eq!(fields[1].split('.').nth(1).unwrap().len(), 2);
    }

    #[test]
    fn first_event_after_clock_start_is_zero() {
        let mut j = Journal::new(Vec::new());
        j.start_clock();
        j.record(Direction::Recv, SegmentKind::Syn, SeqNum::new(1), 0)
            .unwrap();
        assert!(lines(&j)[0].starts_with("rcv 0.00 SYN"));
    }

    #[test]
    fn drop_tag_rendered() {
        let mut j = Journal::new(Vec::new());
        j.start_clock();
        j.record(Direction::Drop, SegmentKind::Ack, SeqNum::new(9), 0)
            .unwrap();
        assert!(lines(&j)[0].starts_with("drp "));
        assert!(lines(&j)[0].ends_with("ACK 9 0"));
    }

    #[test]
    fn trailer_separated_by_blank_line() {
        let mut j = Journal::new(Vec::new());
        j.start_clock();
        j.record(Direction::Send, SegmentKind::Fin, SeqNum::new(5), 0)
            .unwrap();
        j.finish("Original data sent: 0\n").unwrap();
        let all = lines(&j);
        assert_eq!(all.len(), 3);
        assert!(all[1].is_empty());
        assert_eq!(all[2], "Original data sent: 0");
    }
}
