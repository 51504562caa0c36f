//! Placeholder extraction and substitution for box templates.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is valid"))
}

/// Scans a template for `{{ ... }}` placeholders. The inner text is
/// kept verbatim; surrounding whitespace only matters at extraction
/// time, lookups use the trimmed variable.
pub struct Processor {
    template: String,
    vars: Vec<String>,
}

impl Processor {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let vars = placeholder_pattern()
            .captures_iter(&template)
            .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
            .collect();
        Self { template, vars }
    }

    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// The namespace portion of every distinct variable, insertion
    /// ordered; a variable with no `/` maps to the empty prefix.
    pub fn prefixes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut prefixes = Vec::new();
        for var in &self.vars {
            let cleaned = var.trim();
            let prefix = match cleaned.rfind('/') {
                Some(i) => cleaned[..i].to_string(),
                None => String::new(),
            };
            if seen.insert(prefix.clone()) {
                prefixes.push(prefix);
            }
        }
        prefixes
    }

    /// Substitutes every placeholder occurrence. A variable missing
    /// from `values` renders as the empty string; that is the
    /// contract, not a failure.
    pub fn replace(&self, values: &HashMap<String, String>) -> String {
        let mut output = self.template.clone();
        for var in &self.vars {
            let placeholder = format!("{{{{{var}}}}}");
            let replacement = values.get(var.trim()).cloned().unwrap_or_default();
            output = output.replace(&placeholder, &replacement);
        }
        output
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extracts_vars_verbatim() {
        let processor = Processor::new("a={{ns/env/key}} b={{ ns/env/key }} c={{other}}");
        assert_eq!(processor.vars(), &["ns/env/key", " ns/env/key ", "other"]);
    }

    #[test]
    fn prefixes_are_deduplicated_in_insertion_order() {
        let processor =
            Processor::new("{{b/x}} {{a/deep/key}} {{ b/y }} {{root}} {{a/deep/other}}");
        assert_eq!(processor.prefixes(), vec!["b", "a/deep", ""]);
    }

    #[test]
    fn replace_resolves_trimmed_lookups() {
        let processor = Processor::new("A={{ns/env/key}} B={{ ns/env/key }}");
        let mut values = HashMap::new();
        values.insert("ns/env/key".to_string(), "42".to_string());
        assert_eq!(processor.replace(&values), "A=42 B=42");
    }

    #[test]
    fn missing_vars_render_empty() {
        let processor = Processor::new("x={{missing/key}}!");
        assert_eq!(processor.replace(&HashMap::new()), "x=!");
    }

    #[test]
    fn no_placeholders_is_a_no_op() {
        let processor = Processor::new("plain text");
        assert!(processor.vars().is_empty());
        assert!(processor.prefixes().is_empty());
        assert_eq!(processor.replace(&HashMap::new()), "plain text");
    }
}
