//! Topic guidance schedule.
//!
//! Steers a conversation across several angles of the same topic by
//! injecting a fresh prompt at fixed turn indices.

/// Returns the prompt to inject at `turn`, or `None` to let the
/// conversation continue naturally.
///
/// Turn 0 yields the topic itself. The orchestrator only applies the
/// returned prompt as an override for nonzero turns.
pub fn guidance(turn: usize, topic: &str) -> Option<String> {
    match turn {
        0 => Some(topic.to_string()),
        4 => Some(format!(
            "Regarding '{topic}': what are the practical challenges or limitations?"
        )),
        6 => Some(format!(
            "Back to '{topic}': how might this evolve in the next few years?"
        )),
        8 => Some(format!(
            "Focusing on '{topic}': what should people actually do or consider?"
        )),
        _ => None,
    }
}

/// Fill the rescue template used after repeated rejections.
pub fn rescue_prompt(template: &str, topic: &str) -> String {
    template.replace("{topic}", topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "Should humanity colonize Mars?";

    #[test]
    fn test_turn_zero_returns_topic() {
        assert_eq!(guidance(0, TOPIC).as_deref(), Some(TOPIC));
    }

    #[test]
    fn test_scheduled_angles() {
        assert_eq!(
            guidance(4, TOPIC).unwrap(),
            "Regarding 'Should humanity colonize Mars?': what are the practical challenges or limitations?"
        );
        assert_eq!(
            guidance(6, TOPIC).unwrap(),
            "Back to 'Should humanity colonize Mars?': how might this evolve in the next few years?"
        );
        assert_eq!(
            guidance(8, TOPIC).unwrap(),
            "Focusing on 'Should humanity colonize Mars?': what should people actually do or consider?"
        );
    }

    #[test]
    fn test_angles_quote_topic() {
        for turn in [4, 6, 8] {
            assert!(guidance(turn, TOPIC).unwrap().contains(TOPIC));
        }
    }

    #[test]
    fn test_natural_flow_turns() {
        for turn in [1, 2, 3, 5, 7, 9, 10, 42] {
            assert!(guidance(turn, TOPIC).is_none(), "turn {turn}");
        }
    }

    #[test]
    fn test_rescue_prompt() {
        let prompt = rescue_prompt(
            "Back to the original topic - {topic}: What's another angle to consider?",
            "AI",
        );
        assert_eq!(
            prompt,
            "Back to the original topic - AI: What's another angle to consider?"
        );
    }
}
