//! Prompt templates for every generation call.
//!
//! Templates use `{name}` placeholders. Rendering fails if a placeholder has
//! no value, so a stage cannot run without the inputs its prompt declares.
//! `{{` and `}}` produce literal braces.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("template '{template}' has no value for '{{{name}}}'")]
    MissingVariable { template: &'static str, name: String },

    #[error("template '{template}' has an unterminated placeholder")]
    Unterminated { template: &'static str },
}

/// A named prompt template.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub template: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, template: &'static str) -> Self {
        Self { name, template }
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            if let Some(stripped) = after.strip_prefix('{') {
                rest = stripped;
                continue;
            }
            let Some(close) = after.find('}') else { break };
            let name = &after[..close];
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after[close + 1..];
        }
        names
    }

    /// Substitute `vars` into the template. Values are inserted verbatim and
    /// never re-scanned for placeholders.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.template.len() + 256);
        let mut chars = self.template.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let rest = &self.template[i + 1..];
                    let close = rest.find('}').ok_or(PromptError::Unterminated {
                        template: self.name,
                    })?;
                    let name = &rest[..close];
                    let value = vars
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| PromptError::MissingVariable {
                            template: self.name,
                            name: name.to_string(),
                        })?;
                    out.push_str(value);
                    // Skip the placeholder body and the closing brace.
                    for _ in 0..=name.chars().count() {
                        chars.next();
                    }
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }
}

/// System prompt sent ahead of every therapeutic generation.
pub const THERAPIST_SYSTEM_PROMPT: &str = "\
You are a professional Cognitive Behavioral Therapy (CBT) therapist running a structured session.
Ground every reply in established CBT principles and keep the relationship warm, non-judgmental and professional.

Help the client notice and examine their thoughts, feelings and behaviours, stay in the present, and work toward practical next steps.
Ask open-ended questions that invite reflection. Validate emotions while gently questioning unhelpful thoughts.
Never give medical advice or diagnoses. If the client mentions self-harm or a crisis, take it seriously and encourage professional or emergency help.
Stay in the therapeutic frame at all times: no code, no technical asides, no dismissing or minimising concerns.";

pub const SUMMARY: PromptTemplate = PromptTemplate::new(
    "summary",
    "You are a CBT therapist writing a clinical summary of the session so far.

Conversation:
{conversation}

Summarise what a therapist would need to continue this work:
1. KEY CONCERNS: the main issues the client has raised
2. EMOTIONAL PATTERNS: dominant emotions and shifts in mood
3. COGNITIVE PATTERNS: recurring thoughts, beliefs and distortions
4. BEHAVIORAL PATTERNS: behaviours, coping strategies and avoidance
5. THERAPEUTIC PROGRESS: techniques already applied and how the client responded
6. IMPORTANT CONTEXT: background details and triggers mentioned

Write clinically but with empathy. Use at most {max_words} words.",
);

pub const CLASSIFICATION: PromptTemplate = PromptTemplate::new(
    "classification",
    "You route client messages for a CBT therapy assistant.

Client message: \"{message}\"

Conversation context:
{context}

Assign exactly ONE category:

GREETING: hellos, introductions and pleasantries (\"Hi doctor\", \"Nice to meet you\", \"How are you?\")
PROCEDURAL: questions about how the session works (\"Should we start?\", \"How does this work?\", \"What now?\")
SESSION_END: the client is wrapping up (\"Have a good day doc\", \"See you soon\", \"I think I feel ok now\", \"That's all for today\", \"I should go\", \"Thanks for today\")
THERAPEUTIC: emotional or psychological content that deserves full CBT attention (feelings, problems, thoughts, experiences, requests for help)
SMALL_TALK: casual remarks without emotional content (weather, general news)

Answer with the category name only: GREETING, PROCEDURAL, SESSION_END, THERAPEUTIC or SMALL_TALK.",
);

pub const GREETING: PromptTemplate = PromptTemplate::new(
    "greeting",
    "You are a warm, professional CBT therapist and the client has just greeted you.

Client message: \"{message}\"
Conversation context:
{context}

Reply in one or two sentences: return the greeting warmly, keep professional boundaries, and ease toward what the client would like to work on.
If you have already met in this conversation, do not introduce yourself again.",
);

pub const PROCEDURAL: PromptTemplate = PromptTemplate::new(
    "procedural",
    "You are a CBT therapist and the client has asked how the session works.

Client message: \"{message}\"
Conversation context:
{context}

In one to three sentences, answer the question, reassure them about the process, and invite them to share what is on their mind.",
);

pub const SMALL_TALK: PromptTemplate = PromptTemplate::new(
    "small_talk",
    "You are a CBT therapist and the client has made a casual remark.

Client message: \"{message}\"
Conversation context:
{context}

In one or two sentences, acknowledge the remark politely, show interest in how they are doing, and steer gently back toward therapeutic work.",
);

pub const ASSESSMENT: PromptTemplate = PromptTemplate::new(
    "assessment",
    "You are a CBT therapist making an initial assessment of the client's latest message.

Client message: \"{message}\"

Conversation context:
{context}

Reference material:
{knowledge}

Assess, in plain prose:
1. Emotional state: what the client is feeling and how intensely
2. Cognitive patterns: thoughts, beliefs or distortions that show up
3. Behavioral aspects: what they are doing or avoiding
4. Triggers: situations or events that set this off
5. Severity: how much distress this causes, and any sign of risk or crisis
6. Conversation state: whether this is the first exchange or a continuation, and what has already been covered

This assessment is for the therapist only; it is not shown to the client.",
);

pub const TECHNIQUE_SELECTION: PromptTemplate = PromptTemplate::new(
    "technique_selection",
    "You are a CBT therapist planning the next intervention.

Assessment:
{assessment}

Relevant CBT knowledge:
{knowledge}

{techniques}
Choose the 2-3 techniques from the list above that best fit this assessment. Do not use techniques outside the list.
For each, explain why it fits and how you would apply it in this conversation: the questions you would ask or the exercise you would suggest.",
);

pub const RESPONSE: PromptTemplate = PromptTemplate::new(
    "response",
    "You are a CBT therapist replying to your client.

Client message: \"{message}\"

Conversation context:
{context}

Your assessment:
{assessment}

Your intervention plan:
{technique_plan}

Example therapist responses from similar conversations:
{exemplars}

Write the reply the client will read:
- Speak directly to the client, naturally and conversationally; never break character
- Validate what they shared, then weave the planned techniques in without naming them
- Offer a concrete, manageable next step where it fits
- Never diagnose or give medical advice
- If self-harm or crisis is mentioned, acknowledge it seriously and encourage professional or emergency support
- Do not greet the client again if the conversation is already under way
- Do not show the assessment or plan
- End with one open-ended question",
);

pub const CONCLUSION: PromptTemplate = PromptTemplate::new(
    "conclusion",
    "You are a CBT therapist closing the session.

Session context:
{context}

Write a warm, professional closing message that:
1. Acknowledges the client's openness and courage in sharing
2. Summarises the main patterns and insights that came up
3. Notes any progress or new awareness
4. Suggests areas to keep focusing on, without being prescriptive
5. Offers encouragement for the road ahead

Use plain, accessible language. Do not diagnose. Do not ask any questions: this is the final message and should give closure.
Keep it between 200 and 300 words.",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_placeholders() {
        let t = PromptTemplate::new("t", "Hello {name}, you said \"{message}\".");
        let out = t.render(&[("name", "Sam"), ("message", "hi")]).unwrap();
        assert_eq!(out, "Hello Sam, you said \"hi\".");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let t = PromptTemplate::new("t", "A {assessment} B");
        let err = t.render(&[("message", "x")]).unwrap_err();
        assert_eq!(
            err,
            PromptError::MissingVariable {
                template: "t",
                name: "assessment".into()
            }
        );
    }

    #[test]
    fn escaped_braces_and_verbatim_values() {
        let t = PromptTemplate::new("t", "{{literal}} {value}");
        let out = t.render(&[("value", "{not a placeholder}")]).unwrap();
        assert_eq!(out, "{literal} {not a placeholder}");
    }

    #[test]
    fn unterminated_placeholder() {
        let t = PromptTemplate::new("t", "oops {open");
        assert!(matches!(t.render(&[]), Err(PromptError::Unterminated { .. })));
    }

    #[test]
    fn multibyte_text_around_placeholders() {
        let t = PromptTemplate::new("t", "café {x} naïve");
        assert_eq!(t.render(&[("x", "é")]).unwrap(), "café é naïve");
    }

    #[test]
    fn placeholders_listed_once() {
        let t = PromptTemplate::new("t", "{a} {{b}} {c} {a}");
        assert_eq!(t.placeholders(), vec!["a", "c"]);
    }

    #[test]
    fn stage_templates_declare_their_inputs() {
        assert_eq!(ASSESSMENT.placeholders(), vec!["message", "context", "knowledge"]);
        assert_eq!(
            TECHNIQUE_SELECTION.placeholders(),
            vec!["assessment", "knowledge", "techniques"]
        );
        assert_eq!(
            RESPONSE.placeholders(),
            vec!["message", "context", "assessment", "technique_plan", "exemplars"]
        );
        assert_eq!(CONCLUSION.placeholders(), vec!["context"]);
        assert_eq!(SUMMARY.placeholders(), vec!["conversation", "max_words"]);
    }

    #[test]
    fn simple_templates_take_message_and_context() {
        for t in [GREETING, PROCEDURAL, SMALL_TALK, CLASSIFICATION] {
            assert_eq!(t.placeholders(), vec!["message", "context"], "{}", t.name);
        }
    }
}
