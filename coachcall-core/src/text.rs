use crate::types::{Role, TranscriptEntry};

pub const DEFAULT_AGENT_DISPLAY_NAME: &str = "Olivia";
pub const USER_DISPLAY_NAME: &str = "User";

pub fn speaker_label(role: Role, agent_display_name: &str) -> &str {
    match role {
        Role::Agent => agent_display_name,
        Role::User => USER_DISPLAY_NAME,
    }
}

/// Flattens a transcript into `"{Speaker}: {content}"` lines joined by `\n`.
///
/// Content is copied verbatim; a turn with embedded newlines spans several lines.
pub fn render_transcript_text(entries: &[TranscriptEntry], agent_display_name: &str) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", speaker_label(e.role, agent_display_name), e.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_turn() {
        let entries = vec![
            TranscriptEntry::new(Role::Agent, "Hello! How are you feeling today?", 1),
            TranscriptEntry::new(Role::User, "Pretty good.", 2),
        ];
        assert_eq!(
            render_transcript_text(&entries, DEFAULT_AGENT_DISPLAY_NAME),
            "Olivia: Hello! How are you feeling today?\nUser: Pretty good."
        );
    }

    #[test]
    fn content_is_rendered_verbatim() {
        let entries = vec![
            TranscriptEntry::new(Role::User, "eggs\nand toast", 1),
            TranscriptEntry::new(Role::Agent, "  noted,  thanks ", 2),
        ];
        assert_eq!(
            render_transcript_text(&entries, "Coach"),
            "User: eggs\nand toast\nCoach:   noted,  thanks "
        );
    }

    #[test]
    fn empty_transcript_renders_empty() {
        assert_eq!(render_transcript_text(&[], "Coach"), "");
    }
}
