use std::time::Duration;
use tracing::trace;

pub const DEFAULT_WORDS_PER_SESSION: u32 = 10;

/// Pause between a completed word and the next one, so the completed
/// highlight can render.
pub const DEFAULT_NEXT_WORD_DELAY: Duration = Duration::from_millis(200);

/// The word currently being typed and how far the player got.
///
/// `cursor_index() == typed_prefix().chars().count() <= target_len()` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingProgress {
    target_word: String,
    target: Vec<char>,
    typed_prefix: String,
    cursor: usize,
}

impl TypingProgress {
    pub fn new(word: &str) -> Self {
        Self {
            target_word: word.to_string(),
            target: word.chars().collect(),
            typed_prefix: String::new(),
            cursor: 0,
        }
    }

    pub fn target_word(&self) -> &str {
        &self.target_word
    }

    pub fn typed_prefix(&self) -> &str {
        &self.typed_prefix
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    /// Character the player has to type next, if any
    pub fn expected_char(&self) -> Option<char> {
        self.target.get(self.cursor).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.target.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreCounters {
    pub correct_keystrokes: u32,
    pub mistake_keystrokes: u32,
    pub words_completed: u32,
}

impl ScoreCounters {
    pub fn total_keystrokes(&self) -> u32 {
        self.correct_keystrokes + self.mistake_keystrokes
    }
}

/// Result of feeding the whole input buffer to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// A deletion (or an unchanged buffer). No score change.
    Edited,
    Correct(char),
    /// Wrong character. The buffer must be reverted to the typed prefix.
    Mistake(char),
    /// Invalid edit (too long, pasted, or no word in play). The buffer must
    /// be reverted; no counters were touched.
    Rejected,
    /// Correct final character of a word; another word follows.
    WordCompleted(char),
    /// Correct final character of the last word of the session.
    SessionCompleted(char),
}

impl InputOutcome {
    pub fn reverts_buffer(&self) -> bool {
        matches!(self, InputOutcome::Mistake(_) | InputOutcome::Rejected)
    }

    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            InputOutcome::Correct(_)
                | InputOutcome::WordCompleted(_)
                | InputOutcome::SessionCompleted(_)
        )
    }

    pub fn changes_score(&self) -> bool {
        self.is_correct() || matches!(self, InputOutcome::Mistake(_))
    }
}

/// Per-word and per-session typing state machine
#[derive(Debug, Clone)]
pub struct TypingEngine {
    progress: Option<TypingProgress>,
    counters: ScoreCounters,
    words_per_session: u32,
}

impl Default for TypingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WORDS_PER_SESSION)
    }
}

impl TypingEngine {
    pub fn new(words_per_session: u32) -> Self {
        Self {
            progress: None,
            counters: ScoreCounters::default(),
            words_per_session: words_per_session.max(1),
        }
    }

    pub fn words_per_session(&self) -> u32 {
        self.words_per_session
    }

    pub fn progress(&self) -> Option<&TypingProgress> {
        self.progress.as_ref()
    }

    pub fn counters(&self) -> ScoreCounters {
        self.counters
    }

    pub fn is_session_complete(&self) -> bool {
        self.counters.words_completed >= self.words_per_session
    }

    /// Typed prefix the visible buffer should show
    pub fn typed_prefix(&self) -> &str {
        self.progress.as_ref().map_or("", |p| p.typed_prefix())
    }

    pub fn issue_word(&mut self, word: &str) {
        trace!(word, "issuing word");
        self.progress = Some(TypingProgress::new(word));
    }

    pub fn abandon_word(&mut self) {
        self.progress = None;
    }

    /// Clears counters and the current word; only called at session start.
    pub fn reset(&mut self) {
        self.progress = None;
        self.counters = ScoreCounters::default();
    }

    pub fn submit_input(&mut self, new_value: &str) -> InputOutcome {
        let Some(progress) = self.progress.as_mut() else {
            return InputOutcome::Rejected;
        };
        // Between a completed word and the next one nothing is typeable
        if progress.is_complete() {
            return InputOutcome::Rejected;
        }

        let new_len = new_value.chars().count();

        if new_len < progress.cursor {
            if !progress.typed_prefix.starts_with(new_value) {
                return InputOutcome::Rejected;
            }
            progress.typed_prefix = new_value.to_string();
            progress.cursor = new_len;
            return InputOutcome::Edited;
        }

        if new_len > progress.target.len() {
            return InputOutcome::Rejected;
        }

        if new_value == progress.typed_prefix {
            return InputOutcome::Edited;
        }

        // Exactly one character appended to the accepted prefix
        if new_len != progress.cursor + 1
            || !new_value.starts_with(progress.typed_prefix.as_str())
        {
            return InputOutcome::Rejected;
        }
        let Some(typed) = new_value.chars().last() else {
            return InputOutcome::Rejected;
        };

        if progress.expected_char() != Some(typed) {
            self.counters.mistake_keystrokes += 1;
            return InputOutcome::Mistake(typed);
        }

        self.counters.correct_keystrokes += 1;
        progress.typed_prefix.push(typed);
        progress.cursor += 1;

        if !progress.is_complete() {
            return InputOutcome::Correct(typed);
        }

        self.counters.words_completed += 1;
        if self.is_session_complete() {
            InputOutcome::SessionCompleted(typed)
        } else {
            InputOutcome::WordCompleted(typed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn engine_with(word: &str, words_per_session: u32) -> TypingEngine {
        let mut engine = TypingEngine::new(words_per_session);
        engine.issue_word(word);
        engine
    }

    #[test]
    fn test_issue_word_resets_progress() {
        let mut engine = engine_with("cat", 10);
        engine.submit_input("c");

        engine.issue_word("dog");

        let progress = engine.progress().unwrap();
        assert_eq!(progress.target_word(), "dog");
        assert_eq!(progress.typed_prefix(), "");
        assert_eq!(progress.cursor_index(), 0);
    }

    #[test]
    fn test_first_correct_char() {
        let mut engine = engine_with("apple", 10);

        assert_eq!(engine.submit_input("a"), InputOutcome::Correct('a'));
        assert_eq!(engine.counters().correct_keystrokes, 1);
        assert_eq!(engine.counters().mistake_keystrokes, 0);
        assert_eq!(engine.progress().unwrap().cursor_index(), 1);
    }

    #[test]
    fn test_mistake_is_rejected() {
        let mut engine = engine_with("cat", 10);
        engine.submit_input("c");

        let outcome = engine.submit_input("cx");

        assert_eq!(outcome, InputOutcome::Mistake('x'));
        assert!(outcome.reverts_buffer());
        assert_eq!(engine.counters().mistake_keystrokes, 1);
        assert_eq!(engine.typed_prefix(), "c");
        assert_eq!(engine.progress().unwrap().cursor_index(), 1);
    }

    #[test]
    fn test_word_completion() {
        let mut engine = engine_with("cat", 10);

        assert_eq!(engine.submit_input("c"), InputOutcome::Correct('c'));
        assert_eq!(engine.submit_input("ca"), InputOutcome::Correct('a'));
        assert_eq!(engine.submit_input("cat"), InputOutcome::WordCompleted('t'));
        assert_eq!(engine.counters().words_completed, 1);
        assert!(engine.progress().unwrap().is_complete());
    }

    #[test]
    fn test_single_word_session_completes() {
        let mut engine = engine_with("hi", 1);

        engine.submit_input("h");
        assert_eq!(engine.submit_input("hi"), InputOutcome::SessionCompleted('i'));
        assert!(engine.is_session_complete());
    }

    #[test]
    fn test_session_completes_on_tenth_word() {
        let mut engine = TypingEngine::default();

        for n in 1..=10 {
            engine.issue_word("ab");
            engine.submit_input("a");
            let outcome = engine.submit_input("ab");
            if n < 10 {
                assert_eq!(outcome, InputOutcome::WordCompleted('b'));
            } else {
                assert_eq!(outcome, InputOutcome::SessionCompleted('b'));
            }
        }
        assert_eq!(engine.counters().words_completed, 10);
    }

    #[test]
    fn test_deletion() {
        let mut engine = engine_with("cat", 10);
        engine.submit_input("c");
        engine.submit_input("ca");

        assert_eq!(engine.submit_input("c"), InputOutcome::Edited);
        assert_eq!(engine.progress().unwrap().cursor_index(), 1);
        assert_eq!(engine.submit_input(""), InputOutcome::Edited);
        assert_eq!(engine.progress().unwrap().cursor_index(), 0);

        let counters = engine.counters();
        assert_eq!(counters.correct_keystrokes, 2);
        assert_eq!(counters.mistake_keystrokes, 0);
    }

    #[test]
    fn test_deletion_that_rewrites_prefix_is_rejected() {
        let mut engine = engine_with("cat", 10);
        engine.submit_input("c");
        engine.submit_input("ca");

        assert_eq!(engine.submit_input("x"), InputOutcome::Rejected);
        assert_eq!(engine.typed_prefix(), "ca");
    }

    #[test]
    fn test_overlong_input_is_rejected() {
        let mut engine = engine_with("hi", 10);
        engine.submit_input("h");

        assert_eq!(engine.submit_input("hixx"), InputOutcome::Rejected);
        assert_eq!(
            engine.counters(),
            ScoreCounters {
                correct_keystrokes: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_pasted_text_is_rejected() {
        let mut engine = engine_with("banana", 10);

        assert_eq!(engine.submit_input("ban"), InputOutcome::Rejected);
        assert_eq!(engine.counters(), ScoreCounters::default());
        assert_eq!(engine.typed_prefix(), "");
    }

    #[test]
    fn test_unchanged_buffer_is_an_edit() {
        let mut engine = engine_with("cat", 10);
        engine.submit_input("c");

        assert_eq!(engine.submit_input("c"), InputOutcome::Edited);
        assert_eq!(engine.counters().correct_keystrokes, 1);
    }

    #[test]
    fn test_input_without_word_is_rejected() {
        let mut engine = TypingEngine::default();
        assert_eq!(engine.submit_input("a"), InputOutcome::Rejected);
    }

    #[test]
    fn test_input_after_completion_is_rejected() {
        let mut engine = engine_with("a", 10);
        assert_matches!(engine.submit_input("a"), InputOutcome::WordCompleted('a'));

        assert_eq!(engine.submit_input("aa"), InputOutcome::Rejected);
        assert_eq!(engine.submit_input("a"), InputOutcome::Rejected);
        assert_eq!(engine.counters().words_completed, 1);
    }

    #[test]
    fn test_multibyte_characters() {
        let mut engine = engine_with("café", 10);
        engine.submit_input("c");
        engine.submit_input("ca");
        engine.submit_input("caf");

        assert_eq!(engine.submit_input("café"), InputOutcome::WordCompleted('é'));
    }

    #[test]
    fn test_spaces_are_typed_like_any_char() {
        let mut engine = engine_with("a b", 10);
        engine.submit_input("a");

        assert_eq!(engine.submit_input("a "), InputOutcome::Correct(' '));
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut engine = engine_with("ab", 10);
        engine.submit_input("x");
        engine.submit_input("a");

        engine.reset();

        assert_eq!(engine.counters(), ScoreCounters::default());
        assert!(engine.progress().is_none());
    }

    #[test]
    fn test_words_per_session_is_at_least_one() {
        assert_eq!(TypingEngine::new(0).words_per_session(), 1);
    }

    #[test]
    fn test_cursor_and_counters_invariants() {
        let mut engine = engine_with("banana", 10);
        let buffers = [
            "b", "bx", "ba", "bab", "ban", "b", "", "b", "ba", "ban", "bana", "banan", "bananaa",
            "banax", "banana",
        ];

        let mut prev_cursor = 0;
        let mut prev = engine.counters();
        for buffer in buffers {
            let before_prefix_len = engine.progress().unwrap().cursor_index();
            let outcome = engine.submit_input(buffer);
            let progress = engine.progress().unwrap();
            let counters = engine.counters();

            assert!(progress.cursor_index() <= progress.target_len());
            assert_eq!(progress.cursor_index(), progress.typed_prefix().chars().count());
            if progress.cursor_index() < prev_cursor {
                assert!(buffer.chars().count() < before_prefix_len);
                assert_eq!(outcome, InputOutcome::Edited);
            }

            match outcome {
                o if o.is_correct() => {
                    assert_eq!(counters.correct_keystrokes, prev.correct_keystrokes + 1);
                    assert_eq!(counters.mistake_keystrokes, prev.mistake_keystrokes);
                }
                InputOutcome::Mistake(_) => {
                    assert_eq!(counters.mistake_keystrokes, prev.mistake_keystrokes + 1);
                    assert_eq!(counters.correct_keystrokes, prev.correct_keystrokes);
                }
                _ => assert_eq!(counters, prev),
            }

            prev_cursor = progress.cursor_index();
            prev = counters;
        }

        assert_eq!(engine.counters().words_completed, 1);
    }
}
