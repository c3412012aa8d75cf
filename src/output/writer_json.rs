use std::fs;
use std::path::Path;

use crate::bypass::{BypassResults, CandidateRecord};
use crate::error::Result;
use crate::utils::ensure_dir;

/// Candidate records from a JSON array or from JSONL (one object per line).
pub fn read_candidates(path: &Path) -> Result<Vec<CandidateRecord>> {
    let data = fs::read_to_string(path)?;
    parse_candidates(&data)
}

pub fn parse_candidates(data: &str) -> Result<Vec<CandidateRecord>> {
    if data.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(data)?);
    }
    let mut out = Vec::new();
    for line in data.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: CandidateRecord = serde_json::from_str(line)?;
        out.push(record);
    }
    Ok(out)
}

/// Write the `url -> outcome` map as pretty JSON.
pub fn write_results(path: &Path, results: &BypassResults) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(results)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_and_jsonl() {
        let array = r#"[{"url": "http://x/a", "status": 403, "size": 12}]"#;
        let records = parse_candidates(array).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, 403);

        let jsonl = "{\"url\": \"http://x/a\", \"status\": 403}\n\n{\"url\": \"http://x/b\", \"status\": 200}\n";
        let records = parse_candidates(jsonl).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].url, "http://x/b");
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_candidates("{\"url\": 1}").is_err());
    }
}
