//! Keyword intent routing and `key=value` argument extraction for chat input.

use serde_json::{Map, Value};

use crate::mcp::tools::ToolName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Help,
    ListTools,
    Quit,
    Tool(ToolName),
    Unknown,
}

/// A chat line split into free words and `key=value` arguments.
#[derive(Debug, Default, PartialEq)]
pub struct Utterance {
    pub words: Vec<String>,
    pub arguments: Map<String, Value>,
}

impl Utterance {
    pub fn parse(line: &str) -> Self {
        let mut utterance = Self::default();
        for token in tokenize(line) {
            match token.split_once('=') {
                Some((key, value)) if is_argument_key(key) => {
                    utterance
                        .arguments
                        .insert(key.to_string(), Value::String(value.to_string()));
                }
                _ => utterance.words.push(token.to_lowercase()),
            }
        }
        utterance
    }

    /// Routes on the free words only, so argument values never pick the tool.
    pub fn intent(&self) -> Intent {
        let text = self.words.join(" ");
        let has = |needle: &str| text.contains(needle);

        match text.as_str() {
            "help" | "?" => return Intent::Help,
            "tools" => return Intent::ListTools,
            "quit" | "exit" => return Intent::Quit,
            _ => {}
        }

        if let Some(tool) = self.words.first().and_then(|w| w.parse::<ToolName>().ok()) {
            Intent::Tool(tool)
        } else if has("token") || has("oauth") {
            Intent::Tool(ToolName::TestOauthToken)
        } else if has("connection") || has("ping") {
            Intent::Tool(ToolName::TestApiConnection)
        } else if has("submit") || has("new claim") {
            Intent::Tool(ToolName::SubmitClaim)
        } else if has("claim") {
            Intent::Tool(ToolName::GetPatientClaims)
        } else if has("search") || has("find") || has("patient") {
            Intent::Tool(ToolName::SearchPatient)
        } else {
            Intent::Unknown
        }
    }
}

fn is_argument_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

/// Splits on whitespace, keeping double-quoted runs together and dropping the
/// quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(line: &str) -> Intent {
        Utterance::parse(line).intent()
    }

    #[test]
    fn routes_by_keyword() {
        assert_eq!(intent("test oauth"), Intent::Tool(ToolName::TestOauthToken));
        assert_eq!(intent("check the connection please"), Intent::Tool(ToolName::TestApiConnection));
        assert_eq!(intent("Submit a new claim"), Intent::Tool(ToolName::SubmitClaim));
        assert_eq!(intent("show claim history"), Intent::Tool(ToolName::GetPatientClaims));
        assert_eq!(intent("find patient"), Intent::Tool(ToolName::SearchPatient));
        assert_eq!(intent("what's the weather"), Intent::Unknown);
    }

    #[test]
    fn builtins_and_explicit_tool_names() {
        assert_eq!(intent("help"), Intent::Help);
        assert_eq!(intent("  tools "), Intent::ListTools);
        assert_eq!(intent("EXIT"), Intent::Quit);
        assert_eq!(
            intent("ohip_get_patient_claims patient_id=p1"),
            Intent::Tool(ToolName::GetPatientClaims)
        );
    }

    #[test]
    fn argument_values_do_not_affect_routing() {
        assert_eq!(
            intent("search last_name=Token first_name=Claim"),
            Intent::Tool(ToolName::SearchPatient)
        );
    }

    #[test]
    fn extracts_quoted_arguments() {
        let utterance = Utterance::parse(r#"find patient first_name="Mary Ann" last_name=O'Neil"#);
        assert_eq!(utterance.arguments["first_name"], "Mary Ann");
        assert_eq!(utterance.arguments["last_name"], "O'Neil");
        assert_eq!(utterance.words, vec!["find", "patient"]);
    }

    #[test]
    fn non_argument_equals_stays_a_word() {
        let utterance = Utterance::parse("Total=5 claims");
        assert!(utterance.arguments.is_empty());
        assert_eq!(utterance.words, vec!["total=5", "claims"]);
    }
}
