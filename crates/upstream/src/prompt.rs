use std::path::Path;

pub const DEFAULT_PROMPT_FILE: &str = "prompt.txt";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a food analysis assistant. Describe the food in the image objectively, focusing on ingredients, preparation style, and dish type.";

pub const ANALYSIS_INSTRUCTION: &str =
    "Analyze this image and describe the food according to the instructions.";

/// One emphasis per stored variant. Variation 0 (queries) uses none.
const VARIATION_FOCUS: [(&str, &str); 5] = [
    (
        "ingredients",
        "Emphasize the main ingredients and how much of each is visible.",
    ),
    (
        "preparation",
        "Emphasize the preparation style and cooking technique.",
    ),
    (
        "appearance",
        "Emphasize colors, textures, and how the dish is plated.",
    ),
    (
        "dish",
        "Emphasize the dish type, the cuisine it belongs to, and when it is usually eaten.",
    ),
    (
        "query",
        "Answer with a short phrase someone might type when searching for this dish.",
    ),
];

/// Short name of a variation's emphasis, `"neutral"` for 0.
#[must_use]
pub fn variation_focus(variation: u8) -> &'static str {
    focus_entry(variation).map_or("neutral", |(name, _)| name)
}

/// User instruction sent with the image for `variation`.
#[must_use]
pub fn instruction_for(variation: u8) -> String {
    match focus_entry(variation) {
        Some((_, hint)) => format!("{ANALYSIS_INSTRUCTION} {hint}"),
        None => ANALYSIS_INSTRUCTION.to_string(),
    }
}

fn focus_entry(variation: u8) -> Option<(&'static str, &'static str)> {
    if variation == 0 {
        return None;
    }
    let slot = usize::from(variation - 1) % VARIATION_FOCUS.len();
    Some(VARIATION_FOCUS[slot])
}

/// Reads the system prompt from `path`, falling back to the built-in prompt
/// when the file is missing, unreadable, or blank.
#[must_use]
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(raw) if !raw.trim().is_empty() => {
            log::info!("Loaded system prompt from {}", path.display());
            raw.trim().to_string()
        }
        Ok(_) => {
            log::warn!(
                "Prompt file {} is empty, using built-in prompt",
                path.display()
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
        Err(err) => {
            log::debug!(
                "No prompt file at {} ({err}), using built-in prompt",
                path.display()
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn stored_variations_get_distinct_instructions() {
        let instructions: HashSet<String> = (1..=5).map(instruction_for).collect();
        assert_eq!(instructions.len(), 5);
        assert!(!instructions.contains(&instruction_for(0)));
        assert_eq!(instruction_for(0), ANALYSIS_INSTRUCTION);
    }

    #[test]
    fn variations_wrap_around_the_table() {
        assert_eq!(instruction_for(6), instruction_for(1));
        assert_eq!(variation_focus(10), variation_focus(5));
        assert_eq!(variation_focus(0), "neutral");
    }

    #[test]
    fn prompt_file_overrides_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("prompt.txt");
        assert_eq!(load_system_prompt(&path), DEFAULT_SYSTEM_PROMPT);

        std::fs::write(&path, "  Describe the car.\n").unwrap();
        assert_eq!(load_system_prompt(&path), "Describe the car.");

        std::fs::write(&path, "   \n").unwrap();
        assert_eq!(load_system_prompt(&path), DEFAULT_SYSTEM_PROMPT);
    }
}
