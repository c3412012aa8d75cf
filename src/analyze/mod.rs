pub mod patterns;
pub mod file_analysis;
pub mod page_info;

pub use file_analysis::{analyze_non_html_file, FileAnalysis, FileKind, RequestedFile};
pub use page_info::{extract_page_info, PageInfo};
