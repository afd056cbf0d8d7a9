/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Replace `${ENV_VAR}` placeholders using a custom lookup function.
///
/// Split out from [`substitute_env`] so substitution is testable without
/// mutating the process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    // Leave unresolved placeholders intact.
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            // Empty or unclosed placeholder: emit literally and move on.
            _ => {
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let lookup = |name: &str| match name {
            "VIDRELAY_TEST_VAR" => Some("hello".to_string()),
            _ => None,
        };
        assert_eq!(
            substitute_env_with("key=${VIDRELAY_TEST_VAR}", lookup),
            "key=hello"
        );
    }

    #[test]
    fn substitutes_several_vars_in_one_value() {
        let lookup = |name: &str| match name {
            "A" => Some("1".to_string()),
            "B" => Some("2".to_string()),
            _ => None,
        };
        assert_eq!(substitute_env_with("${A}:${B}:${C}", lookup), "1:2:${C}");
    }

    #[test]
    fn leaves_unknown_var() {
        let lookup = |_: &str| None;
        assert_eq!(
            substitute_env_with("${VIDRELAY_NONEXISTENT_XYZ}", lookup),
            "${VIDRELAY_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn leaves_unclosed_placeholder() {
        let lookup = |_: &str| Some("x".to_string());
        assert_eq!(substitute_env_with("tail ${OOPS", lookup), "tail ${OOPS");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
