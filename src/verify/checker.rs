use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::extract::{format_tuple, ArgTuple, TestCaseBucket, VulnClass};
use super::verdict::Verdict;

/// Result of one checker invocation. A failed invocation never aborts the
/// batch; the caller substitutes a notice for it.
#[derive(Debug)]
enum CheckerRun {
    Output(String),
    Failed(String),
}

/// Invokes the external dynamic checkers against candidate tuples and
/// classifies the combined result.
#[derive(Debug, Clone)]
pub struct DynamicVerifier {
    php_executable: PathBuf,
    xss_checker: PathBuf,
    sqli_checker: PathBuf,
}

impl DynamicVerifier {
    pub fn new(php_executable: PathBuf, xss_checker: PathBuf, sqli_checker: PathBuf) -> Self {
        Self {
            php_executable,
            xss_checker,
            sqli_checker,
        }
    }

    /// Run every candidate tuple in the bucket through its class's checker
    /// against the given harness and derive a verdict from the combined
    /// output.
    pub async fn verify(&self, harness: &Path, bucket: &TestCaseBucket) -> Verdict {
        let mut text = String::new();

        for class in VulnClass::ALL {
            let tuples = bucket.sorted_tuples(class);
            if tuples.is_empty() {
                text.push_str(&format!("[-] No {} arguments found.\n", class.label()));
                continue;
            }

            text.push_str(&format!("[+] {}:\n", class.checker_label()));
            for tuple in tuples {
                debug!(class = %class, tuple = %format_tuple(tuple), "Running checker");
                text.push_str(&format!("[*] Testing {}\n", format_tuple(tuple)));
                match self.run_checker(self.checker_for(class), harness, tuple).await {
                    CheckerRun::Output(output) => text.push_str(&output),
                    CheckerRun::Failed(reason) => {
                        warn!(
                            checker = class.checker_label(),
                            harness = %harness.display(),
                            reason = %reason,
                            "Checker invocation failed"
                        );
                        text.push_str(&format!("Error running {}\n", class.checker_label()));
                    }
                }
            }
        }

        Verdict::from_text(text)
    }

    fn checker_for(&self, class: VulnClass) -> &Path {
        match class {
            VulnClass::Xss => &self.xss_checker,
            VulnClass::Sqli => &self.sqli_checker,
        }
    }

    async fn run_checker(&self, checker: &Path, harness: &Path, tuple: &ArgTuple) -> CheckerRun {
        let output = Command::new(&self.php_executable)
            .arg(checker)
            .arg(harness)
            .args(tuple)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                CheckerRun::Output(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => CheckerRun::Failed(format!("exit status {}", output.status)),
            Err(e) => CheckerRun::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    // Tests drive the verifier with /bin/sh standing in for the PHP
    // interpreter and shell scripts standing in for the checker scripts.
    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn verifier(dir: &TempDir, xss_body: &str, sqli_body: &str) -> DynamicVerifier {
        DynamicVerifier::new(
            PathBuf::from("/bin/sh"),
            write_script(dir, "xss_checker.sh", xss_body),
            write_script(dir, "sqli_checker.sh", sqli_body),
        )
    }

    fn bucket_with(class: VulnClass, tuple: &[&str]) -> TestCaseBucket {
        let mut bucket = TestCaseBucket::default();
        bucket.insert(class, tuple.iter().map(|v| v.to_string()).collect());
        bucket
    }

    #[tokio::test]
    async fn test_empty_bucket_emits_notices_only() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier(&dir, "echo unused", "echo unused");

        let verdict = verifier
            .verify(Path::new("harness.php"), &TestCaseBucket::default())
            .await;
        assert!(!verdict.confirmed);
        assert!(verdict.text.contains("[-] No XSS arguments found."));
        assert!(verdict.text.contains("[-] No SQLi arguments found."));
        assert!(!verdict.text.contains("[+]"));
    }

    #[tokio::test]
    async fn test_confirming_checker_output_confirms_verdict() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier(
            &dir,
            r#"echo "[!] Potential tags injection detected: <script>""#,
            "echo unused",
        );

        let bucket = bucket_with(VulnClass::Xss, &["<script>"]);
        let verdict = verifier.verify(Path::new("harness.php"), &bucket).await;
        assert!(verdict.confirmed);
        assert!(verdict.text.contains("[+] XSSChecker:"));
        assert!(verdict.text.contains(r#"[*] Testing ("<script>")"#));
    }

    #[tokio::test]
    async fn test_checker_receives_harness_and_tuple_arguments() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier(&dir, r#"echo "args: $*""#, "echo unused");

        let bucket = bucket_with(VulnClass::Xss, &["a", "b"]);
        let verdict = verifier.verify(Path::new("h.php"), &bucket).await;
        assert!(verdict.text.contains("args: h.php a b"));
    }

    #[tokio::test]
    async fn test_failing_checker_substituted_not_fatal() {
        let dir = TempDir::new().unwrap();
        let verifier = verifier(
            &dir,
            "exit 1",
            r#"echo "[!] Potential SQL injection detected: SELECT""#,
        );

        let mut bucket = bucket_with(VulnClass::Xss, &["x"]);
        bucket.insert(VulnClass::Sqli, vec!["' OR 1=1".to_string()]);

        let verdict = verifier.verify(Path::new("harness.php"), &bucket).await;
        // The XSS checker failing must not stop the SQLi checker from
        // confirming.
        assert!(verdict.text.contains("Error running XSSChecker"));
        assert!(verdict.confirmed);
    }

    #[tokio::test]
    async fn test_unlaunchable_interpreter_substituted() {
        let dir = TempDir::new().unwrap();
        let verifier = DynamicVerifier::new(
            dir.path().join("no-such-interpreter"),
            dir.path().join("xss"),
            dir.path().join("sqli"),
        );

        let bucket = bucket_with(VulnClass::Sqli, &["x"]);
        let verdict = verifier.verify(Path::new("harness.php"), &bucket).await;
        assert!(verdict.text.contains("Error running SQLiChecker"));
        assert!(!verdict.confirmed);
    }
}
