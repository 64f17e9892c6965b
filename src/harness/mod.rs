pub mod scanner;

pub use scanner::{
    concrete_harness_path, count_symbolic_args, discover, normalize_include, Harness,
    SYMBOLIC_HARNESS_DIR,
};
