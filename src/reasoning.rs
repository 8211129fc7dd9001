use regex::Regex;

pub const REASONING_OPEN: &str = "<think>";
pub const REASONING_CLOSE: &str = "</think>";

/// A model answer split into its reasoning trace and the part meant for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub reasoning: Option<String>,
    pub visible: String,
}

/// Splits delimited reasoning regions out of raw model text.
#[derive(Debug, Clone)]
pub struct ReasoningParser {
    pattern: Regex,
}

impl ReasoningParser {
    pub fn new(open: &str, close: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            "(?s){}(.*?){}",
            regex::escape(open),
            regex::escape(close)
        ))?;
        Ok(Self { pattern })
    }

    /// Only the first region is reported as reasoning, but every region is
    /// stripped from the visible text.
    pub fn parse(&self, raw: &str) -> ParsedResponse {
        let reasoning = self
            .pattern
            .captures(raw)
            .and_then(|captures| captures.get(1))
            .map(|region| region.as_str().trim().to_string());

        let mut visible = raw.to_string();
        // Removing a region can join stray markers into a new one
        while self.pattern.is_match(&visible) {
            visible = self.pattern.replace_all(&visible, "").into_owned();
        }

        ParsedResponse {
            reasoning,
            visible: visible.trim().to_string(),
        }
    }
}

impl Default for ReasoningParser {
    fn default() -> Self {
        Self::new(REASONING_OPEN, REASONING_CLOSE).expect("escaped markers always compile")
    }
}
