/// Per-turn transcript assembly for the live conversation session
///
/// The live API delivers input (user speech) and output (model speech)
/// transcriptions as partial fragments spread over many messages. Fragments
/// accumulate in two running buffers; a turn-complete signal finalizes each
/// non-empty buffer into one history entry and clears both.

/// Who spoke a finalized transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

pub struct TurnAssembler {
    input_buffer: String,
    output_buffer: String,
    history: Vec<TranscriptEntry>,
}

impl TurnAssembler {
    pub fn new() -> Self {
        TurnAssembler {
            input_buffer: String::new(),
            output_buffer: String::new(),
            history: Vec::new(),
        }
    }

    /// Append a fragment of the user's transcribed speech
    pub fn push_input(&mut self, fragment: &str) {
        self.input_buffer.push_str(fragment);
    }

    /// Append a fragment of the model's transcribed speech
    pub fn push_output(&mut self, fragment: &str) {
        self.output_buffer.push_str(fragment);
    }

    /// Finalize the current turn: each non-empty buffer becomes exactly one
    /// history entry (user first, then model), and both buffers are cleared.
    /// Returns the entries appended by this turn.
    pub fn complete_turn(&mut self) -> Vec<TranscriptEntry> {
        let mut appended = Vec::new();

        let input = self.input_buffer.trim();
        if !input.is_empty() {
            appended.push(TranscriptEntry {
                speaker: Speaker::User,
                text: input.to_string(),
            });
        }

        let output = self.output_buffer.trim();
        if !output.is_empty() {
            appended.push(TranscriptEntry {
                speaker: Speaker::Model,
                text: output.to_string(),
            });
        }

        self.input_buffer.clear();
        self.output_buffer.clear();

        self.history.extend(appended.iter().cloned());
        appended
    }

    pub fn history(&self) -> &[TranscriptEntry] {
        &self.history
    }

    /// Text accumulated for the in-progress turn (for display while streaming)
    pub fn partial_input(&self) -> &str {
        &self.input_buffer
    }

    pub fn partial_output(&self) -> &str {
        &self.output_buffer
    }
}

impl Default for TurnAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_accumulate_until_turn_complete() {
        let mut assembler = TurnAssembler::new();

        assembler.push_input("Hello ");
        assembler.push_input("there");
        assembler.push_output("Hi! ");
        assembler.push_output("How can I help?");

        assert_eq!(assembler.partial_input(), "Hello there");
        assert!(assembler.history().is_empty());

        let appended = assembler.complete_turn();
        assert_eq!(
            appended,
            vec![
                TranscriptEntry { speaker: Speaker::User, text: "Hello there".into() },
                TranscriptEntry { speaker: Speaker::Model, text: "Hi! How can I help?".into() },
            ]
        );
        assert_eq!(assembler.history(), appended.as_slice());
    }

    #[test]
    fn test_buffers_cleared_after_turn() {
        let mut assembler = TurnAssembler::new();

        assembler.push_input("one");
        assembler.complete_turn();

        assert_eq!(assembler.partial_input(), "");
        assert_eq!(assembler.partial_output(), "");

        // A second turn-complete with empty buffers appends nothing
        assert!(assembler.complete_turn().is_empty());
        assert_eq!(assembler.history().len(), 1);
    }

    #[test]
    fn test_empty_buffer_produces_no_entry() {
        let mut assembler = TurnAssembler::new();

        assembler.push_output("model only");
        let appended = assembler.complete_turn();

        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].speaker, Speaker::Model);
    }

    #[test]
    fn test_whitespace_only_buffer_produces_no_entry() {
        let mut assembler = TurnAssembler::new();

        assembler.push_input("   ");
        assembler.push_output("\n");

        assert!(assembler.complete_turn().is_empty());
        assert!(assembler.history().is_empty());
    }

    #[test]
    fn test_turns_append_in_order() {
        let mut assembler = TurnAssembler::new();

        assembler.push_input("first question");
        assembler.push_output("first answer");
        assembler.complete_turn();

        assembler.push_input("second question");
        assembler.push_output("second answer");
        assembler.complete_turn();

        let texts: Vec<&str> = assembler.history().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["first question", "first answer", "second question", "second answer"]
        );
    }
}
