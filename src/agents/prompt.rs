//! Prompt builder for the description agent.
//!
//! [`PromptBuilder`] constructs `(system_msg, user_msg)` pairs for an
//! OpenAI-compatible `/v1/chat/completions` endpoint.  The same system
//! instruction serves both input kinds; the user message differs depending on
//! whether the model is describing an attached image or a piece of text.

// ---------------------------------------------------------------------------
// System instruction
// ---------------------------------------------------------------------------

/// Shared instruction: the model acts as a composer turning any input into a
/// concrete, generatable music brief.
const SYSTEM_INSTRUCTION: &str = "\
You are an expert music composer and producer.
Task: Turn the given input into a vivid, concrete music description that a
text-to-music model can render directly.

Rules:
1. Always name a mood, a tempo (with an approximate BPM), the lead
   instruments, and a genre or style.
2. Describe the overall atmosphere and how the piece should evolve.
3. Keep the description to one paragraph of 3-6 sentences.
4. Reply with ONLY the music description - no preamble, no explanation.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds description prompts for image or text input.
///
/// # Example
/// ```rust
/// use musepipe::agents::PromptBuilder;
///
/// let builder = PromptBuilder::new();
/// let (system, user) = builder.build_text_chat("a quiet rainy evening", 15.0, None);
/// assert!(system.contains("music composer"));
/// assert!(user.contains("rainy evening"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the `(system_msg, user_msg)` pair for an image description
    /// request.  The image itself is attached separately as a data URL; the
    /// user message tells the model what to look at.
    pub fn build_image_chat(&self, duration_secs: f32, style_hint: Option<&str>) -> (String, String) {
        let mut user_msg = String::with_capacity(512);
        user_msg.push_str(
            "Look at the attached image and describe the music it evokes: \
             its mood, tempo, instruments, genre and atmosphere.",
        );
        self.push_hints(&mut user_msg, duration_secs, style_hint);
        (SYSTEM_INSTRUCTION.to_string(), user_msg)
    }

    /// Build the `(system_msg, user_msg)` pair for a text description
    /// request.
    pub fn build_text_chat(
        &self,
        text: &str,
        duration_secs: f32,
        style_hint: Option<&str>,
    ) -> (String, String) {
        let mut user_msg = String::with_capacity(512 + text.len());
        user_msg.push_str(
            "Expand the following idea into a music description covering \
             mood, tempo, instruments, genre and atmosphere.\n\nIdea:\n",
        );
        user_msg.push_str(text);
        self.push_hints(&mut user_msg, duration_secs, style_hint);
        (SYSTEM_INSTRUCTION.to_string(), user_msg)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn push_hints(&self, user_msg: &mut String, duration_secs: f32, style_hint: Option<&str>) {
        user_msg.push_str(&format!(
            "\n\nThe piece will be about {duration_secs:.0} seconds long."
        ));
        if let Some(style) = style_hint {
            user_msg.push_str(&format!("\nPreferred style: {style}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_names_the_required_attributes() {
        let builder = PromptBuilder::new();
        let (system, _) = builder.build_text_chat("test", 10.0, None);

        assert!(system.contains("music composer"));
        assert!(system.contains("mood"));
        assert!(system.contains("tempo"));
        assert!(system.contains("instruments"));
        assert!(system.contains("genre"));
    }

    #[test]
    fn text_prompt_embeds_the_idea_and_duration() {
        let builder = PromptBuilder::new();
        let (_, user) = builder.build_text_chat("a storm over the sea", 30.0, None);

        assert!(user.contains("a storm over the sea"));
        assert!(user.contains("30 seconds"));
    }

    #[test]
    fn image_prompt_mentions_the_attached_image() {
        let builder = PromptBuilder::new();
        let (_, user) = builder.build_image_chat(10.0, None);

        assert!(user.contains("attached image"));
        assert!(user.contains("atmosphere"));
    }

    #[test]
    fn style_hint_is_appended_when_present() {
        let builder = PromptBuilder::new();
        let (_, user) = builder.build_text_chat("sunrise", 10.0, Some("lo-fi hip hop"));
        assert!(user.contains("Preferred style: lo-fi hip hop"));

        let (_, without) = builder.build_text_chat("sunrise", 10.0, None);
        assert!(!without.contains("Preferred style"));
    }
}
