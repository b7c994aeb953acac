use std::io::{stderr, IsTerminal, Stderr, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;

/// Receives extraction progress, one unit per visited issue.
pub trait Progress {
  fn start(&mut self, total: u64);
  fn advance(&mut self, delta: u64);
  fn finish(&mut self);
}

/// Progress sink that ignores everything
pub struct NoProgress;

impl Progress for NoProgress {
  fn start(&mut self, _total: u64) {}
  fn advance(&mut self, _delta: u64) {}
  fn finish(&mut self) {}
}

const BAR_WIDTH: u64 = 28;

/// Single-line progress bar on stderr, cleared when finished
pub struct TerminalProgress {
  out: Stderr,
  total: u64,
  current: u64,
}

impl TerminalProgress {
  /// A terminal bar when stderr is a tty and `quiet` is off, otherwise silence.
  pub fn for_stderr(quiet: bool) -> Box<dyn Progress> {
    if quiet || !stderr().is_terminal() {
      Box::new(NoProgress)
    } else {
      Box::new(Self {
        out: stderr(),
        total: 0,
        current: 0,
      })
    }
  }

  fn redraw(&mut self) {
    let line = render_bar(self.current, self.total);
    // Best effort
    let _ = self
      .out
      .queue(MoveToColumn(0))
      .and_then(|out| out.queue(Clear(ClearType::CurrentLine)))
      .and_then(|out| out.queue(Print(line)));
    let _ = self.out.flush();
  }
}

impl Progress for TerminalProgress {
  fn start(&mut self, total: u64) {
    self.total = total;
    self.current = 0;
    self.redraw();
  }

  fn advance(&mut self, delta: u64) {
    self.current += delta;
    self.redraw();
  }

  fn finish(&mut self) {
    let _ = self
      .out
      .queue(MoveToColumn(0))
      .and_then(|out| out.queue(Clear(ClearType::CurrentLine)));
    let _ = self.out.flush();
  }
}

/// "[#######---------------------]  10/40"
fn render_bar(current: u64, total: u64) -> String {
  let filled = if total == 0 {
    BAR_WIDTH
  } else {
    (current.min(total) * BAR_WIDTH) / total
  };
  let width = total.to_string().len();
  format!(
    "[{}{}] {:>width$}/{}",
    "#".repeat(filled as usize),
    "-".repeat((BAR_WIDTH - filled) as usize),
    current,
    total,
    width = width
  )
}
