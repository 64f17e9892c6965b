use serde::Serialize;

/// Structured bootstrap configuration for one engine project. A template
/// substitution step turns this into the project's bootstrap script; the
/// value itself is what the core owns.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapSpec {
    /// argv slots made symbolic. Slot 1 carries the harness path, so the
    /// symbolic range starts at 2.
    pub symbolic_arg_indices: Vec<usize>,
    /// Concrete filler passed for each symbolic slot; its length bounds the
    /// symbolic string the engine explores.
    pub filler: String,
    pub argv_count: usize,
    /// Plugin package fetched and unpacked inside the analysis guest.
    pub plugin_package: String,
}

impl BootstrapSpec {
    pub fn new(argv_count: usize, fill_length: usize, plugin_name: &str) -> Self {
        Self {
            symbolic_arg_indices: (2..=argv_count).collect(),
            filler: "a".repeat(fill_length),
            argv_count,
            plugin_package: format!("{}.tar.gz", plugin_name),
        }
    }

    fn sym_args_value(&self) -> String {
        self.symbolic_arg_indices
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn filler_args(&self) -> String {
        vec![self.filler.as_str(); self.argv_count.saturating_sub(1)].join(" ")
    }

    /// Apply this spec to the bootstrap template, producing the project's
    /// bootstrap script.
    pub fn apply_to_template(&self, template: &str) -> String {
        let mut script = String::with_capacity(template.len());
        for line in template.lines() {
            if line.contains("S2E_SYM_ARGS=") {
                script.push_str(&line.replace(
                    "S2E_SYM_ARGS=\"\"",
                    &format!("S2E_SYM_ARGS=\"{}\"", self.sym_args_value()),
                ));
                script.push('\n');
            } else if line.contains("execute \"${TARGET_PATH}\"") {
                script.push_str(line);
                if self.argv_count > 1 {
                    script.push(' ');
                    script.push_str(&self.filler_args());
                }
                script.push('\n');
            } else if line.contains("# Plugin") {
                script.push_str(line);
                script.push('\n');
                script.push_str(&format!("${{S2ECMD}} get \"{}\"\n", self.plugin_package));
                script.push_str(&format!("tar -xzf {}\n", self.plugin_package));
            } else {
                script.push_str(line);
                script.push('\n');
            }
        }
        script
    }
}
