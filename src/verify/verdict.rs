use serde::{Deserialize, Serialize};

/// Checker output phrases that each indicate a vulnerability actually
/// manifested during dynamic re-execution.
pub const VULNERABILITY_SIGNATURES: [&str; 4] = [
    "Potential quotes breaks in tags detected",
    "Potential space breaks in tag without quotes detected",
    "Potential tags injection detected",
    "Potential SQL injection detected",
];

/// The combined diagnostic text from the dynamic checkers plus the derived
/// confirmation flag. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub text: String,
    pub confirmed: bool,
}

impl Verdict {
    /// Derive the confirmation flag from the concatenated checker output:
    /// confirmed iff any signature phrase occurs in the text.
    pub fn from_text(text: String) -> Self {
        let confirmed = VULNERABILITY_SIGNATURES
            .iter()
            .any(|signature| text.contains(signature));
        Self { text, confirmed }
    }
}
