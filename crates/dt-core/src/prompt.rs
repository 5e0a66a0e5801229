use crate::types::Coach;

struct Recovery {
    noun: &'static str,
    example: &'static str,
}

fn recovery_for(coach: Coach) -> Option<Recovery> {
    let r = match coach {
        Coach::Empathy => Recovery {
            noun: "observation",
            example: r#"{"type": "RECORD_OBSERVATION", "data": {"content": "...", "category": "pain_point"}}"#,
        },
        Coach::Define => Recovery {
            noun: "POV statement",
            example: r#"{"type": "RECORD_POV", "data": {"user": "...", "need": "...", "insight": "...", "statement": "..."}}"#,
        },
        Coach::Ideate => Recovery {
            noun: "idea",
            example: r#"{"type": "RECORD_IDEA", "data": {"title": "...", "description": "..."}}"#,
        },
        Coach::Prototype => Recovery {
            noun: "prototype",
            example: r#"{"type": "RECORD_PROTOTYPE", "data": {"name": "...", "description": "...", "type": "low_fidelity", "features": []}}"#,
        },
        _ => return None,
    };
    Some(r)
}

/// Instruction asking `coach` to emit only the directive it forgot for
/// `content`. `None` for coaches that never record artifacts.
pub fn recovery_prompt(coach: Coach, content: &str) -> Option<String> {
    let r = recovery_for(coach)?;
    Some(format!(
        "Read the following content carefully and record the {noun} it describes. \
         Output only the JSON action, with no conversational text.\n\n\
         Content: {content}\n\n\
         Reply with exactly one block in this format:\n\
         ```json:action\n{example}\n```",
        noun = r.noun,
        example = r.example,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::parse_directives;

    #[test]
    fn recording_coaches_have_prompts() {
        for coach in Coach::all() {
            assert_eq!(
                recovery_prompt(*coach, "x").is_some(),
                coach.records_artifacts(),
                "{coach}"
            );
        }
    }

    #[test]
    fn prompt_embeds_content() {
        let p = recovery_prompt(Coach::Ideate, "a bus stop that texts you").unwrap();
        assert!(p.contains("Content: a bus stop that texts you"));
        assert!(p.contains("record the idea"));
    }

    #[test]
    fn format_example_is_itself_parseable() {
        let p = recovery_prompt(Coach::Empathy, "riders wait in the rain").unwrap();
        let directives = parse_directives(&p);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].kind(), "RECORD_OBSERVATION");
    }
}
