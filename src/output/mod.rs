pub mod console;
pub mod writer_json;

pub use console::{print_bypass_report, render_bypass_report};
pub use writer_json::{parse_candidates, read_candidates, write_results};
