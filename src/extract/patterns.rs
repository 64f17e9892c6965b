use regex::Regex;
use serde::{Deserialize, Serialize};

/// Vulnerability classes recognized in engine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnClass {
    Xss,
    Sqli,
}

impl VulnClass {
    pub const ALL: [VulnClass; 2] = [VulnClass::Xss, VulnClass::Sqli];

    /// Short label used in diagnostic text and artifact files.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Xss => "XSS",
            Self::Sqli => "SQLi",
        }
    }

    /// Display name of the dynamic checker for this class.
    pub fn checker_label(&self) -> &'static str {
        match self {
            Self::Xss => "XSSChecker",
            Self::Sqli => "SQLiChecker",
        }
    }
}

impl std::fmt::Display for VulnClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Slot value substituted where the engine flagged an argument occurrence as
/// exploitable. The XSS checker recognizes it as the position to inject its
/// payload.
pub const PAYLOAD_MARKER: &str = "XSS_PAYLOAD_MARKER";

/// One row of the line-classification table: how to recognize a test-case
/// record for a vulnerability class and pull the argument bindings out of it.
pub struct ClassPattern {
    pub class: VulnClass,
    pub marker: &'static str,
    values: Regex,
    exploitable: Option<Regex>,
}

impl ClassPattern {
    /// The full classification table. Adding a vulnerability class means
    /// adding a row here.
    pub fn table() -> Vec<ClassPattern> {
        vec![
            ClassPattern {
                class: VulnClass::Xss,
                marker: "EchoFunctionTracker: Test case:",
                values: Regex::new(
                    r#"v\d+_arg\d+_\d+(?:\(exploitable\))? = \{[^}]*\}; \(string\) "([^)]*)""#,
                )
                .unwrap(),
                exploitable: Some(Regex::new(r"v(\d+)_arg\d+_\d+\(exploitable\)").unwrap()),
            },
            ClassPattern {
                class: VulnClass::Sqli,
                marker: "SqliteFunctionTracker: Test case:",
                values: Regex::new(r#"v\d+_arg\d+_\d+ = \{[^}]*\}; \(string\) "([^)]*)""#).unwrap(),
                exploitable: None,
            },
        ]
    }

    /// Extract the candidate tuple from a test-case line, with exploitable
    /// slots replaced by the payload marker. None when the line is not a
    /// test-case record for this class.
    pub fn match_line(&self, line: &str) -> Option<Vec<String>> {
        if !line.contains(self.marker) {
            return None;
        }

        let mut values: Vec<String> = self
            .values
            .captures_iter(line)
            .map(|cap| cap[1].to_string())
            .collect();
        if values.is_empty() {
            return None;
        }

        if let Some(tag) = &self.exploitable {
            for cap in tag.captures_iter(line) {
                if let Ok(index) = cap[1].parse::<usize>() {
                    if index < values.len() {
                        values[index] = PAYLOAD_MARKER.to_string();
                    }
                }
            }
        }

        Some(values)
    }
}
