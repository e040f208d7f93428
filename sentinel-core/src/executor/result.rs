use chrono::{DateTime, Utc};

/// How a check invocation terminated (spec.md §4.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitStatus {
    Normal,
    Crash,
    Timeout,
}

/// Structured outcome of a single plugin invocation (spec.md §4.2), whether
/// produced by the direct executor or a connector client.
#[derive(Clone, Debug)]
pub struct CheckResult {
    pub command_id: u64,
    pub exit_code: i32,
    pub exit_status: ExitStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
}

impl CheckResult {
    pub fn latency(&self, scheduled_for: DateTime<Utc>) -> chrono::Duration {
        self.start_time - scheduled_for
    }

    pub fn execution_time(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// Plugin output parsing (spec.md §4.2): first line up to `|` is
/// `plugin_output`; text after `|` on that line is `perf_data`; subsequent
/// lines up to another `|` are `long_plugin_output`; text after a second `|`
/// continues `perf_data`.
pub fn parse_output(raw: &str) -> (String, String, String) {
    let mut lines = raw.lines();
    let Some(first_line) = lines.next() else {
        return (String::new(), String::new(), String::new());
    };

    let (plugin_output, mut perf_data) = match first_line.split_once('|') {
        Some((out, perf)) => (out.trim_end().to_string(), perf.trim().to_string()),
        None => (first_line.trim_end().to_string(), String::new()),
    };

    let mut long_lines: Vec<String> = Vec::new();
    let mut seen_second_pipe = false;
    for line in lines {
        if seen_second_pipe {
            if !perf_data.is_empty() {
                perf_data.push('\n');
            }
            perf_data.push_str(line.trim());
            continue;
        }
        match line.split_once('|') {
            Some((out, perf)) => {
                if !out.is_empty() {
                    long_lines.push(out.trim_end().to_string());
                }
                if !perf.trim().is_empty() {
                    if !perf_data.is_empty() {
                        perf_data.push('\n');
                    }
                    perf_data.push_str(perf.trim());
                }
                seen_second_pipe = true;
            }
            None => long_lines.push(line.trim_end().to_string()),
        }
    }

    (plugin_output, long_lines.join("\n"), perf_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line_with_perfdata() {
        let (out, long, perf) = parse_output("OK - all good|time=0.012s;1;2");
        assert_eq!(out, "OK - all good");
        assert!(long.is_empty());
        assert_eq!(perf, "time=0.012s;1;2");
    }

    #[test]
    fn parses_multi_line_output_and_perfdata() {
        let raw = "OK - summary\nextra line one\nextra line two|total=3;load=0.5";
        let (out, long, perf) = parse_output(raw);
        assert_eq!(out, "OK - summary");
        assert_eq!(long, "extra line one\nextra line two");
        assert_eq!(perf, "total=3;load=0.5");
    }

    #[test]
    fn parses_output_with_no_pipe() {
        let (out, long, perf) = parse_output("just text, no perfdata");
        assert_eq!(out, "just text, no perfdata");
        assert!(long.is_empty());
        assert!(perf.is_empty());
    }
}
