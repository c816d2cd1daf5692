//! Placeholder substitution for agent instructions.

use std::collections::BTreeMap;

/// Replace `{key}` placeholders in `template` with values from `vars`.
///
/// Placeholders without a matching variable are left untouched, so prompts
/// containing literal braces (JSON samples, code) survive rendering.
/// `{{` and `}}` always render as a single brace.
pub fn render_instructions(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let key = &tail[1..end];
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                    rest = &tail[end + 1..];
                    continue;
                }
            }
        }

        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_keys() {
        let rendered = render_instructions(
            "Write a song for {name} in {style} style.",
            &vars(&[("name", "Dylan"), ("style", "rap")]),
        );
        assert_eq!(rendered, "Write a song for Dylan in rap style.");
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let rendered = render_instructions("Hi {name}, reply as {format}", &vars(&[("name", "Ada")]));
        assert_eq!(rendered, "Hi Ada, reply as {format}");
    }

    #[test]
    fn doubled_braces_escape() {
        let rendered = render_instructions("Return {{\"city\": \"{city}\"}}", &vars(&[("city", "Paris")]));
        assert_eq!(rendered, "Return {\"city\": \"Paris\"}");
    }

    #[test]
    fn unbalanced_braces_pass_through() {
        assert_eq!(render_instructions("a { b } c }", &BTreeMap::new()), "a { b } c }");
        assert_eq!(render_instructions("{open", &vars(&[("open", "x")])), "{open");
    }

    #[test]
    fn values_are_not_rendered_again() {
        let rendered = render_instructions("{a}", &vars(&[("a", "{b}"), ("b", "nope")]));
        assert_eq!(rendered, "{b}");
    }
}
