use std::fmt::{self, Write as _};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use bridge_core::game::{CompletedTrick, LocalRound, TrickOutcome};
use bridge_core::model::card::Card;
use bridge_core::model::seat::Seat;
use bridge_table::{Departure, Role, SessionObserver, SessionReport};

const PARTNERSHIPS: [&str; 2] = ["North/South", "East/West"];

fn join_cards<'a>(cards: impl IntoIterator<Item = &'a Card>) -> String {
    cards
        .into_iter()
        .map(Card::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn trick_line(trick: &CompletedTrick) -> String {
    let plays = trick
        .leader
        .rotation()
        .iter()
        .map(|seat| format!("{seat}:{}", trick.cards[seat.index()]))
        .collect::<Vec<_>>()
        .join(" ");
    format!("Trick {:>2}: {plays} -> {}", trick.number, trick.winner)
}

/// Streams one seat's progress to `out` as the session runs. Each line is
/// flushed straight away; the first write error stops further output and is
/// returned by [`ConsoleObserver::finish`].
pub struct ConsoleObserver<W: io::Write> {
    out: W,
    failed: Option<io::Error>,
}

impl<W: io::Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: None }
    }

    fn line(&mut self, text: fmt::Arguments<'_>) {
        if self.failed.is_some() {
            return;
        }
        let written = self
            .out
            .write_fmt(format_args!("{text}\n"))
            .and_then(|()| self.out.flush());
        if let Err(err) = written {
            self.failed = Some(err);
        }
    }

    pub fn finish(self) -> io::Result<W> {
        match self.failed {
            Some(err) => Err(err),
            None => Ok(self.out),
        }
    }
}

impl<W: io::Write> SessionObserver for ConsoleObserver<W> {
    fn seated(&mut self, seat: Seat, role: Role) {
        let role = match role {
            Role::Creator => "created the table",
            Role::Joiner => "joined the table",
        };
        self.line(format_args!("{seat} {role}. Four players ready."));
    }

    fn hand_dealt(&mut self, _seat: Seat, hand: &[Card]) {
        self.line(format_args!("Hand: {}", join_cards(hand)));
    }

    fn trick_resolved(&mut self, _seat: Seat, outcome: &TrickOutcome) {
        let verdict = if outcome.won { "TAKEN" } else { "GIVEN" };
        self.line(format_args!("Played card {} {verdict}", outcome.card));
    }
}

/// Closing lines once the session is over: the partnership total and how the
/// seat left the table.
pub fn render_summary(report: &SessionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} took {} of {} tricks",
        PARTNERSHIPS[report.seat.partnership()],
        report.tricks_won(),
        report.tricks.len()
    );
    let _ = writeln!(
        out,
        "{}",
        match report.departure {
            Departure::Destroyed => "Destroying table",
            Departure::Closed => "Leaving table",
        }
    );
    out
}

/// Console summary for an in-process rehearsal of all four seats.
pub fn render_rehearsal(round: &LocalRound) -> String {
    let mut out = String::new();
    for seat in Seat::LOOP {
        let played = round.player(seat).played();
        let _ = writeln!(out, "{:<5} played: {}", seat.to_string(), join_cards(played));
    }
    for trick in round.history() {
        let _ = writeln!(out, "{}", trick_line(trick));
    }
    let totals = round.partnership_tricks();
    for (label, taken) in PARTNERSHIPS.iter().zip(totals) {
        let _ = writeln!(out, "{label}: {taken} tricks");
    }
    out
}

/// Write the report as pretty JSON, creating parent directories.
pub fn write_json(report: &SessionReport, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating report directory at {}", dir.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("creating report file at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("writing report to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::game::GreedyPolicy;
    use bridge_core::model::deck::Deck;

    fn rehearsed() -> LocalRound {
        let mut round = LocalRound::deal(&Deck::shuffled_with_seed(8, 10));
        round.play_out(&mut GreedyPolicy).expect("round completes");
        round
    }

    fn report_for(round: &LocalRound, seat: Seat) -> SessionReport {
        let initial_hand = round.player(seat).played().to_vec();
        let tricks = round
            .history()
            .iter()
            .map(|trick| TrickOutcome {
                trick: *trick,
                card: trick.cards[seat.index()],
                won: trick.winner.is_partner_of(seat),
            })
            .collect();
        SessionReport {
            seat,
            role: Role::Joiner,
            initial_hand,
            tricks,
            departure: Departure::Closed,
        }
    }

    /// A writer that counts flushes, to show lines leave as they are made.
    #[derive(Default)]
    struct Flushes {
        bytes: Vec<u8>,
        flushed_at: Vec<usize>,
    }

    impl io::Write for Flushes {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed_at.push(self.bytes.len());
            Ok(())
        }
    }

    fn replay(report: &SessionReport, observer: &mut dyn SessionObserver) {
        observer.seated(report.seat, report.role);
        observer.hand_dealt(report.seat, &report.initial_hand);
        for outcome in &report.tricks {
            observer.trick_resolved(report.seat, outcome);
        }
    }

    #[test]
    fn console_prints_each_trick_as_it_resolves() {
        let round = rehearsed();
        let report = report_for(&round, Seat::East);
        let mut console = ConsoleObserver::new(Flushes::default());

        console.seated(report.seat, report.role);
        console.hand_dealt(report.seat, &report.initial_hand);
        console.trick_resolved(report.seat, &report.tricks[0]);
        let so_far = String::from_utf8(console.out.bytes.clone()).expect("utf8");
        assert!(so_far.starts_with("East joined the table."));
        let first = report.tricks[0];
        let verdict = if first.won { "TAKEN" } else { "GIVEN" };
        assert!(so_far.ends_with(&format!("Played card {} {verdict}\n", first.card)));
        assert_eq!(so_far.matches("Played card ").count(), 1);
        assert_eq!(console.out.flushed_at.len(), 3);

        for outcome in &report.tricks[1..] {
            console.trick_resolved(report.seat, outcome);
        }
        let out = console.finish().expect("no write errors");
        assert_eq!(out.flushed_at.len(), 2 + 13);
        let text = String::from_utf8(out.bytes).expect("utf8");
        assert_eq!(text.matches("Played card ").count(), 13);
        assert_eq!(
            text.matches(" TAKEN\n").count(),
            round.partnership_tricks()[Seat::East.partnership()]
        );
    }

    #[test]
    fn console_reports_the_first_write_error() {
        struct Closed;
        impl io::Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let round = rehearsed();
        let mut console = ConsoleObserver::new(Closed);
        replay(&report_for(&round, Seat::North), &mut console);
        let err = console.finish().err().expect("write error surfaces");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn summary_names_partnership_and_departure() {
        let round = rehearsed();
        let report = report_for(&round, Seat::East);
        let text = render_summary(&report);
        assert!(text.starts_with(&format!(
            "East/West took {} of 13 tricks",
            round.partnership_tricks()[1]
        )));
        assert!(text.trim_end().ends_with("Leaving table"));
    }

    #[test]
    fn rehearsal_totals_add_up() {
        let round = rehearsed();
        let text = render_rehearsal(&round);
        assert_eq!(text.matches("Trick ").count(), 13);
        let [ns, ew] = round.partnership_tricks();
        assert!(text.contains(&format!("North/South: {ns} tricks")));
        assert!(text.contains(&format!("East/West: {ew} tricks")));
        assert_eq!(ns + ew, 13);
    }

    #[test]
    fn json_report_round_trips_through_disk() {
        let round = rehearsed();
        let report = report_for(&round, Seat::West);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("west.json");
        write_json(&report, &path).expect("write");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value["seat"], "West");
        assert_eq!(value["departure"], "closed");
        assert_eq!(value["tricks"].as_array().map(Vec::len), Some(13));
    }
}
