//! URI templates for dynamic resources
//!
//! Supports the simple-expansion subset of RFC 6570 that resource templates
//! use in practice: `file:///logs/{date}.txt` matches `file:///logs/2025-01-01.txt`
//! and yields `date = 2025-01-01`. A variable never spans a `/`.

use regex::Regex;
use std::collections::HashMap;

use tandem_mcp_protocol::{McpError, McpResult};

#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    regex: Regex,
    variables: Vec<String>,
}

impl UriTemplate {
    pub fn new(pattern: &str) -> McpResult<Self> {
        let invalid = |why: String| {
            McpError::InvalidParameters(format!("invalid URI template '{}': {}", pattern, why))
        };

        let mut regex_pattern = String::from("^");
        let mut variables = Vec::new();
        let mut rest = pattern;
        while let Some(open) = rest.find('{') {
            let close = rest[open..]
                .find('}')
                .map(|offset| open + offset)
                .ok_or_else(|| invalid("unclosed '{'".to_string()))?;
            let name = &rest[open + 1..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(format!("bad variable name '{}'", name)));
            }
            if variables.iter().any(|existing| existing == name) {
                return Err(invalid(format!("variable '{}' appears twice", name)));
            }
            regex_pattern.push_str(&regex::escape(&rest[..open]));
            regex_pattern.push_str("([^/]+)");
            variables.push(name.to_string());
            rest = &rest[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unmatched '}'".to_string()));
        }
        regex_pattern.push_str(&regex::escape(rest));
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            variables,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    /// Variable values when `uri` matches, keyed by variable name
    pub fn extract(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        self.variables
            .iter()
            .enumerate()
            .map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|value| (name.clone(), value.as_str().to_string()))
            })
            .collect()
    }

    /// Substitute variables into the template
    pub fn expand(&self, values: &HashMap<String, String>) -> McpResult<String> {
        let mut uri = self.pattern.clone();
        for name in &self.variables {
            let value = values.get(name).ok_or_else(|| McpError::missing_param(name))?;
            uri = uri.replace(&format!("{{{}}}", name), value);
        }
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_variables() {
        let template = UriTemplate::new("file:///users/{user_id}/{doc}.json").unwrap();
        assert_eq!(template.variables(), ["user_id", "doc"]);

        let values = template.extract("file:///users/alice/notes.json").unwrap();
        assert_eq!(values["user_id"], "alice");
        assert_eq!(values["doc"], "notes");
    }

    #[test]
    fn test_variable_does_not_span_segments() {
        let template = UriTemplate::new("file:///users/{user_id}.json").unwrap();
        assert!(template.matches("file:///users/bob.json"));
        assert!(!template.matches("file:///users/a/b.json"));
        assert!(!template.matches("file:///users/bob.json.bak"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let template = UriTemplate::new("db://table(1)?id={id}").unwrap();
        assert!(template.matches("db://table(1)?id=7"));
        assert!(!template.matches("db://table1?id=7"));
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert!(UriTemplate::new("file:///{open").is_err());
        assert!(UriTemplate::new("file:///{}").is_err());
        assert!(UriTemplate::new("file:///{a}/{a}").is_err());
        assert!(UriTemplate::new("file:///a}").is_err());
    }

    #[test]
    fn test_expand_round_trips_extract() {
        let template = UriTemplate::new("logs://{day}/{level}").unwrap();
        let values = template.extract("logs://monday/error").unwrap();
        assert_eq!(template.expand(&values).unwrap(), "logs://monday/error");
        assert!(template.expand(&HashMap::new()).is_err());
    }
}
