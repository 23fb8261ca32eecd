//! Interpolation of `{{ ... }}` expressions in configuration strings.
//!
//! Supported expressions:
//! - `{{user `name`}}` - a user variable supplied by the host (empty if unset)
//! - `{{build_name}}` - name of the build being post-processed
//! - `{{build_type}}` - type of the builder that ran

use std::collections::HashMap;

/// Values available to templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub user_variables: HashMap<String, String>,
    pub build_name: Option<String>,
    pub build_type: Option<String>,
}

impl TemplateContext {
    /// Render `input`, replacing every `{{ ... }}` expression.
    ///
    /// Returns a description of the problem if an expression is unterminated
    /// or unknown.
    pub fn render(&self, input: &str) -> Result<String, String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| format!("unterminated template expression in {:?}", input))?;

            out.push_str(&self.evaluate(after[..end].trim())?);
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn evaluate(&self, expr: &str) -> Result<String, String> {
        match expr {
            "build_name" => return Ok(self.build_name.clone().unwrap_or_default()),
            "build_type" => return Ok(self.build_type.clone().unwrap_or_default()),
            _ => {}
        }

        if let Some(arg) = expr
            .strip_prefix("user")
            .filter(|arg| arg.starts_with([' ', '`']))
        {
            let name = arg
                .trim()
                .strip_prefix('`')
                .and_then(|s| s.strip_suffix('`'))
                .ok_or_else(|| format!("malformed user variable reference: {{{{{}}}}}", expr))?;
            return Ok(self.user_variables.get(name).cloned().unwrap_or_default());
        }

        Err(format!("unknown template function: {:?}", expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext {
            user_variables: HashMap::from([("out_dir".to_string(), "/out".to_string())]),
            build_name: Some("web".to_string()),
            build_type: Some("vmware-iso".to_string()),
        }
    }

    #[test]
    fn test_render_plain_text() {
        assert_eq!(context().render("/out/vm.ova").unwrap(), "/out/vm.ova");
    }

    #[test]
    fn test_render_user_variable() {
        let rendered = context().render("{{user `out_dir`}}/{{ build_name }}.ova").unwrap();
        assert_eq!(rendered, "/out/web.ova");
    }

    #[test]
    fn test_render_missing_user_variable_is_empty() {
        assert_eq!(context().render("{{user `nope`}}").unwrap(), "");
    }

    #[test]
    fn test_render_build_type() {
        assert_eq!(context().render("{{build_type}}").unwrap(), "vmware-iso");
    }

    #[test]
    fn test_render_unterminated() {
        let err = context().render("{{user `out_dir`").unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn test_render_unknown_function() {
        let err = context().render("{{timestamp}}").unwrap_err();
        assert!(err.contains("unknown template function"));
    }

    #[test]
    fn test_render_malformed_user_reference() {
        let err = context().render("{{user out_dir}}").unwrap_err();
        assert!(err.contains("malformed"));
    }
}
