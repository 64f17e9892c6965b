pub mod checker;
pub mod verdict;

pub use checker::DynamicVerifier;
pub use verdict::{Verdict, VULNERABILITY_SIGNATURES};
