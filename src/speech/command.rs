//! Command classification: recognized phrases against the fixed vocabulary.
//! Exact, case-insensitive string equality only. The wake phrase confirms an
//! armed activation; the fix-display synonyms request the monitor handshake
//! regardless of arming.

use tracing::debug;

use super::RecognizedPhrase;

/// Phrases that request the monitor handshake.
const FIX_DISPLAY_PHRASES: &[&str] = &["fix display", "fix monitor"];

/// Typed command derived from a recognized phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    WakeWordConfirmed,
    FixDisplayRequested,
}

/// Matches phrases against the wake word and the command vocabulary.
pub struct CommandClassifier {
    wake_word: String,
    /// Inclusive floor for the wake phrase.
    wake_confidence: f32,
    /// Exclusive floor for command phrases.
    command_confidence: f32,
}

impl CommandClassifier {
    pub fn new(wake_word: &str, wake_confidence: f32, command_confidence: f32) -> Self {
        Self {
            wake_word: wake_word.to_lowercase(),
            wake_confidence,
            command_confidence,
        }
    }

    /// Classify one phrase. Sub-threshold confidence or any text that is not
    /// an exact vocabulary match yields no event.
    pub fn classify(&self, phrase: &RecognizedPhrase) -> Option<CommandEvent> {
        let text = phrase.text.to_lowercase();

        if text == self.wake_word && phrase.confidence >= self.wake_confidence {
            debug!(confidence = phrase.confidence, "wake phrase matched");
            return Some(CommandEvent::WakeWordConfirmed);
        }
        if FIX_DISPLAY_PHRASES.contains(&text.as_str())
            && phrase.confidence > self.command_confidence
        {
            debug!(text = %phrase.text, confidence = phrase.confidence, "command matched");
            return Some(CommandEvent::FixDisplayRequested);
        }
        None
    }

    /// The full vocabulary the recognizer should be limited to.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut v = vec![self.wake_word.clone()];
        v.extend(FIX_DISPLAY_PHRASES.iter().map(|s| s.to_string()));
        v
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn phrase(text: &str, confidence: f32) -> RecognizedPhrase {
        RecognizedPhrase {
            text: text.to_string(),
            confidence,
            at: Instant::now(),
        }
    }

    fn classifier() -> CommandClassifier {
        CommandClassifier::new("Jarvis", 0.6, 0.6)
    }

    #[test]
    fn wake_word_is_case_insensitive() {
        let c = classifier();
        assert_eq!(
            c.classify(&phrase("JARVIS", 0.61)),
            Some(CommandEvent::WakeWordConfirmed)
        );
        assert_eq!(
            c.classify(&phrase("jarvis", 0.9)),
            Some(CommandEvent::WakeWordConfirmed)
        );
    }

    #[test]
    fn wake_word_requires_exact_text() {
        let c = classifier();
        assert_eq!(c.classify(&phrase("Jarvis!", 0.9)), None);
        assert_eq!(c.classify(&phrase("hey Jarvis", 0.9)), None);
        assert_eq!(c.classify(&phrase("Jarv", 0.9)), None);
    }

    #[test]
    fn wake_confidence_floor_is_inclusive() {
        let c = classifier();
        assert_eq!(
            c.classify(&phrase("Jarvis", 0.6)),
            Some(CommandEvent::WakeWordConfirmed)
        );
        assert_eq!(c.classify(&phrase("Jarvis", 0.59)), None);
    }

    #[test]
    fn fix_display_confidence_floor_is_exclusive() {
        let c = classifier();
        assert_eq!(c.classify(&phrase("fix display", 0.6)), None);
        assert_eq!(
            c.classify(&phrase("fix display", 0.61)),
            Some(CommandEvent::FixDisplayRequested)
        );
    }

    #[test]
    fn both_fix_synonyms_match() {
        let c = classifier();
        assert_eq!(
            c.classify(&phrase("Fix Display", 0.8)),
            Some(CommandEvent::FixDisplayRequested)
        );
        assert_eq!(
            c.classify(&phrase("FIX MONITOR", 0.8)),
            Some(CommandEvent::FixDisplayRequested)
        );
    }

    #[test]
    fn unknown_phrases_yield_nothing() {
        let c = classifier();
        assert_eq!(c.classify(&phrase("open the pod bay doors", 0.99)), None);
        assert_eq!(c.classify(&phrase("", 0.99)), None);
    }

    #[test]
    fn vocabulary_covers_wake_and_commands() {
        let v = classifier().vocabulary();
        assert!(v.contains(&"jarvis".to_string()));
        assert!(v.contains(&"fix display".to_string()));
        assert!(v.contains(&"fix monitor".to_string()));
    }
}
