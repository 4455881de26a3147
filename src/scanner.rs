//! Inline reasoning marker scanner.
//!
//! Some OpenAI-style backends inline reasoning in plain content between an
//! open and a close marker (`<think>...</think>`). The scanner re-splits plain
//! text into token and thinking deltas, even when a marker straddles chunk
//! boundaries.
//!
//! Text that could be the start of a marker is held back until the next chunk
//! confirms or rules it out. At most `marker.len() - 1` bytes are ever held.

use crate::model::Delta;
use crate::options::MarkerPair;

/// Which marker the scanner is currently looking for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Outside a marker pair; text is token output
    Plain,
    /// Between open and close markers; text is thinking output
    InsideMarker,
}

/// Streaming state machine over plain-text fragments.
///
/// # Example
/// ```
/// use unichat::model::Delta;
/// use unichat::options::MarkerPair;
/// use unichat::scanner::InlineTagScanner;
///
/// let mut scanner = InlineTagScanner::new(MarkerPair::think());
/// let mut deltas = scanner.push("A<thi");
/// deltas.extend(scanner.push("nk>B</think>C"));
/// deltas.extend(scanner.finish());
///
/// assert_eq!(
///     deltas,
///     vec![Delta::token("A"), Delta::thinking("B"), Delta::token("C")]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct InlineTagScanner {
    markers: MarkerPair,
    mode: ScanMode,
    tail: String,
}

impl InlineTagScanner {
    pub fn new(markers: MarkerPair) -> Self {
        Self {
            markers,
            mode: ScanMode::Plain,
            tail: String::new(),
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Text currently withheld because it may begin a marker.
    pub fn pending(&self) -> &str {
        &self.tail
    }

    /// Scan one plain-text fragment.
    pub fn push(&mut self, text: &str) -> Vec<Delta> {
        let mut deltas = Vec::new();
        self.tail.push_str(text);

        loop {
            let marker = match self.mode {
                ScanMode::Plain => self.markers.open.as_str(),
                ScanMode::InsideMarker => self.markers.close.as_str(),
            };

            if marker.is_empty() {
                emit(&mut deltas, self.mode, &self.tail);
                self.tail.clear();
                break;
            }

            match self.tail.find(marker) {
                Some(index) => {
                    emit(&mut deltas, self.mode, &self.tail[..index]);
                    let consumed = index + marker.len();
                    self.tail.drain(..consumed);
                    self.mode = match self.mode {
                        ScanMode::Plain => ScanMode::InsideMarker,
                        ScanMode::InsideMarker => ScanMode::Plain,
                    };
                }
                None => {
                    let held = partial_marker_len(&self.tail, marker);
                    let ready = self.tail.len() - held;
                    emit(&mut deltas, self.mode, &self.tail[..ready]);
                    self.tail.drain(..ready);
                    break;
                }
            }
        }

        deltas
    }

    /// Flush withheld text at end of stream, classified by the current mode.
    ///
    /// An unclosed marker is not an error; its content surfaces as thinking.
    pub fn finish(&mut self) -> Vec<Delta> {
        let mut deltas = Vec::new();
        emit(&mut deltas, self.mode, &self.tail);
        self.tail.clear();
        deltas
    }
}

fn emit(deltas: &mut Vec<Delta>, mode: ScanMode, text: &str) {
    if text.is_empty() {
        return;
    }
    deltas.push(match mode {
        ScanMode::Plain => Delta::token(text),
        ScanMode::InsideMarker => Delta::thinking(text),
    });
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .filter(|&n| marker.is_char_boundary(n))
        .find(|&n| text.ends_with(&marker[..n]))
        .unwrap_or(0)
}
