//! Parser for the gateway's node listing output.
//!
//! Each meaningful line is whitespace-separated:
//!
//! ```text
//! name  _  _  cpu  mem  [gpu  gpu_mem]  users...
//! ```
//!
//! The GPU columns only appear on GPU nodes, so the column count varies.
//! They are taken to be present when the line has at least seven fields and
//! the sixth field ends in `%`. Otherwise GPU values are `"N/A"` and users
//! start at the sixth field.
//!
//! Blank lines, lines starting with `*` and lines with fewer than six fields
//! are skipped silently.

use super::types::NodeStatusRecord;

/// Placeholder for missing GPU figures
pub const NOT_AVAILABLE: &str = "N/A";

const MIN_FIELDS: usize = 6;
const GPU_FIELDS_END: usize = 7;

/// Width of the longest node name, used to align listings
const NAME_WIDTH: usize = "mercury28".len();

/// Width of a load column
const LOAD_WIDTH: usize = "100.0%".len();

/// Parse the raw listing into records, keeping input order.
pub fn parse_status(raw: &str) -> Vec<NodeStatusRecord> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<NodeStatusRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('*') {
        return None;
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let has_gpu = fields.len() >= GPU_FIELDS_END && fields[5].ends_with('%');
    let (gpu_load, gpu_mem_load, users_from) = if has_gpu {
        (fields[5], fields[6], GPU_FIELDS_END)
    } else {
        (NOT_AVAILABLE, NOT_AVAILABLE, 5)
    };

    Some(NodeStatusRecord {
        name: fields[0].to_string(),
        cpu_load: fields[3].to_string(),
        mem_load: fields[4].to_string(),
        gpu_load: gpu_load.to_string(),
        gpu_mem_load: gpu_mem_load.to_string(),
        users: fields[users_from..].iter().map(|s| s.to_string()).collect(),
    })
}

impl NodeStatusRecord {
    /// Node name padded so listings line up.
    pub fn padded_name(&self) -> String {
        format!("{:<width$}", self.name, width = NAME_WIDTH)
    }

    /// One-line load summary, e.g. `| C: 12.5%  | M: 40.0%  | G: N/A    | GM: N/A    | alice, bob`.
    pub fn summary(&self) -> String {
        format!(
            "| C: {:<w$} | M: {:<w$} | G: {:<w$} | GM: {:<w$} | {}",
            self.cpu_load,
            self.mem_load,
            self.gpu_load,
            self.gpu_mem_load,
            self.users.join(", "),
            w = LOAD_WIDTH
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parsing {
        use super::*;

        #[test]
        fn test_gpu_node() {
            let records = parse_status("mercury3 x x 12.5% 40.0% 80.0% 2000MB alice bob");
            assert_eq!(records, vec![NodeStatusRecord {
                name: "mercury3".to_string(),
                cpu_load: "12.5%".to_string(),
                mem_load: "40.0%".to_string(),
                gpu_load: "80.0%".to_string(),
                gpu_mem_load: "2000MB".to_string(),
                users: vec!["alice".to_string(), "bob".to_string()],
            }]);
        }

        #[test]
        fn test_node_without_gpu() {
            let records = parse_status("mercury4 x x 5.0% 10.0% alice");
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].gpu_load, "N/A");
            assert_eq!(records[0].gpu_mem_load, "N/A");
            assert_eq!(records[0].users, vec!["alice".to_string()]);
        }

        #[test]
        fn test_non_percent_sixth_field_means_users() {
            let records = parse_status("mars1 yes 16 3.0% 7.5% bob carol dave");
            assert_eq!(records[0].gpu_load, NOT_AVAILABLE);
            assert_eq!(records[0].users, ["bob", "carol", "dave"]);
        }

        #[test]
        fn test_six_fields_with_percent_has_no_gpu() {
            let records = parse_status("venus2 yes 32 1.0% 2.0% 3.0%");
            assert_eq!(records[0].gpu_load, NOT_AVAILABLE);
            assert_eq!(records[0].users, ["3.0%"]);
        }

        #[test]
        fn test_gpu_node_without_users() {
            let records = parse_status("jupiter1 yes 64 50.0% 60.0% 0.0% 0MB");
            assert_eq!(records[0].gpu_load, "0.0%");
            assert_eq!(records[0].gpu_mem_load, "0MB");
            assert!(records[0].users.is_empty());
        }

        #[test]
        fn test_comments_blank_and_short_lines_skipped() {
            let raw = "\
* header line with enough fields to look real

mars1 yes 16 3.0%
   * indented comment a b c d e f
saturn1 yes 8 1.0% 1.0% eve
";
            let records = parse_status(raw);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].name, "saturn1");
        }

        #[test]
        fn test_input_order_preserved() {
            let raw = "venus1 y y 1% 1% a\nmars9 y y 1% 1% b\njupiter2 y y 1% 1% c\n";
            let names: Vec<_> = parse_status(raw).into_iter().map(|r| r.name).collect();
            assert_eq!(names, ["venus1", "mars9", "jupiter2"]);
        }

        #[test]
        fn test_tabs_and_repeated_spaces() {
            let records = parse_status("  neptune2\tyes   24 9.9%\t\t8.8% frank  ");
            assert_eq!(records[0].name, "neptune2");
            assert_eq!(records[0].mem_load, "8.8%");
            assert_eq!(records[0].users, ["frank"]);
        }

        #[test]
        fn test_empty_input() {
            assert!(parse_status("").is_empty());
        }
    }

    mod formatting {
        use super::*;

        #[test]
        fn test_padded_name() {
            let records = parse_status("mars1 y y 1.0% 2.0% a");
            assert_eq!(records[0].padded_name(), "mars1    ");
        }

        #[test]
        fn test_summary_gpu_node() {
            let records = parse_status("mercury3 x x 12.5% 40.0% 80.0% 2000MB alice bob");
            assert_eq!(
                records[0].summary(),
                "| C: 12.5%  | M: 40.0%  | G: 80.0%  | GM: 2000MB | alice, bob"
            );
        }

        #[test]
        fn test_summary_without_users() {
            let records = parse_status("mars1 y y 100.0% 2.0% 3.0% 4MB");
            assert_eq!(
                records[0].summary(),
                "| C: 100.0% | M: 2.0%   | G: 3.0%   | GM: 4MB    | "
            );
        }
    }
}
