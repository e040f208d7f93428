//! Macro expansion (spec.md §4.10): `$MACRO$`/`$ARGn$` substitution with
//! per-result sanitization.

use std::collections::HashMap;

/// Replaces every `$NAME$` occurrence in `template` using `values`. Unknown
/// macros expand to the empty string rather than erroring — an unconfigured
/// custom variable on one contact shouldn't break every other contact's
/// notification command.
pub fn expand(template: &str, values: &HashMap<String, String>, illegal_output_chars: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            if let Some(end) = template[i + 1..].find('$') {
                let name = &template[i + 1..i + 1 + end];
                if name.is_empty() {
                    // "$$" collapses to a literal dollar sign.
                    out.push('$');
                } else if let Some(value) = values.get(name) {
                    out.push_str(&sanitize(value, illegal_output_chars));
                }
                // else: unknown macro, expands to nothing.
                i += end + 2;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn sanitize(value: &str, illegal_output_chars: &str) -> String {
    value.chars().filter(|c| !illegal_output_chars.contains(*c)).collect()
}

/// Positional `$ARGn$` macros from a per-execution argument list.
pub fn arg_macros(args: &[String]) -> HashMap<String, String> {
    args.iter()
        .enumerate()
        .map(|(i, v)| (format!("ARG{}", i + 1), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_macros() {
        let mut values = HashMap::new();
        values.insert("HOSTNAME".to_string(), "web01".to_string());
        let out = expand("check $HOSTNAME$ now", &values, "");
        assert_eq!(out, "check web01 now");
    }

    #[test]
    fn unknown_macro_expands_to_empty() {
        let values = HashMap::new();
        let out = expand("value=$NOPE$end", &values, "");
        assert_eq!(out, "value=end");
    }

    #[test]
    fn sanitizes_illegal_characters() {
        let mut values = HashMap::new();
        values.insert("OUTPUT".to_string(), "bad`rm -rf`output".to_string());
        let out = expand("$OUTPUT$", &values, "`");
        assert_eq!(out, "badrm -rfoutput");
    }

    #[test]
    fn expansion_is_idempotent_with_no_dollar_signs_left() {
        let mut values = HashMap::new();
        values.insert("A".to_string(), "x".to_string());
        let once = expand("$A$", &values, "");
        let twice = expand(&once, &values, "");
        assert_eq!(once, twice);
    }
}
