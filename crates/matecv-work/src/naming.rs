// crates/matecv-work/src/naming.rs

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Values available to the rename template.
#[derive(Clone, Copy, Debug)]
pub struct NameVars<'a> {
    pub mate_name: &'a str,
    pub shader_family: &'a str,
    pub shader_name: &'a str,
}

impl NameVars<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        match key {
            "mate_name" => Some(self.mate_name),
            "shader_family" => Some(self.shader_family),
            "shader_name" => Some(self.shader_name),
            _ => None,
        }
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").unwrap_or_else(|e| panic!("placeholder pattern: {e}")))
}

/// Render `template` into a `.mate` file name.
///
/// `{key}` inserts the value; a key that only matches after lowercasing
/// (`{MATE_NAME}`) inserts the value upper-cased; unknown keys are kept
/// verbatim.
pub fn render_mate_name(template: &str, vars: &NameVars<'_>) -> String {
    let rendered = placeholder().replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        if let Some(v) = vars.get(key) {
            v.to_string()
        } else if let Some(v) = vars.get(&key.to_lowercase()) {
            v.to_uppercase()
        } else {
            caps[0].to_string()
        }
    });
    format!("{rendered}.mate")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: NameVars<'static> = NameVars { mate_name: "body", shader_family: "npr", shader_name: "_NPRToon" };

    #[test]
    fn default_template() {
        assert_eq!(render_mate_name("{mate_name}_{shader_family}", &VARS), "body_npr.mate");
    }

    #[test]
    fn uppercase_key_uppercases_value() {
        assert_eq!(render_mate_name("{MATE_NAME}-{Shader_Name}", &VARS), "BODY-_NPRTOON.mate");
    }

    #[test]
    fn unknown_key_kept() {
        assert_eq!(render_mate_name("{mate_name}{foo}", &VARS), "body{foo}.mate");
        assert_eq!(render_mate_name("plain", &VARS), "plain.mate");
    }
}
