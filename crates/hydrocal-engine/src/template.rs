//! Engine input-file templating
//!
//! The engine input is a text file with `$name` / `${name}` substitution
//! slots for each calibration parameter, the initial conditions, the time
//! window and the forcing-data reference. `$$` renders a literal `$`.
//! Unknown placeholders are render-time errors: a silently unsubstituted
//! slot would send garbage into the engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use hydrocal_core::EngineError;

/// A loaded input template.
#[derive(Debug, Clone)]
pub struct InputTemplate {
    text: String,
}

impl InputTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        Ok(Self {
            text: fs::read_to_string(path)?,
        })
    }

    /// Substitute every placeholder from `vars`.
    pub fn render(&self, vars: &BTreeMap<String, String>) -> Result<String, EngineError> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
                continue;
            }

            let (name, tail) = if let Some(braced) = after.strip_prefix('{') {
                let end = braced.find('}').ok_or_else(|| EngineError::Template {
                    message: "unterminated '${' placeholder".to_string(),
                })?;
                (&braced[..end], &braced[end + 1..])
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], &after[end..])
            };

            if name.is_empty() {
                return Err(EngineError::Template {
                    message: "stray '$' without a placeholder name".to_string(),
                });
            }
            let value = vars.get(name).ok_or_else(|| EngineError::Template {
                message: format!("no value for placeholder '{name}'"),
            })?;
            out.push_str(value);
            rest = tail;
        }
        out.push_str(rest);
        Ok(out)
    }
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
    fn substitutes_bare_and_braced_placeholders() {
        let template = InputTemplate::new("roughness $s_r cap ${c_w1}x");
        let rendered = template
            .render(&vars(&[("s_r", "0.011"), ("c_w1", "4.2")]))
            .unwrap();
        assert_eq!(rendered, "roughness 0.011 cap 4.2x");
    }

    #[test]
    fn double_dollar_escapes() {
        let template = InputTemplate::new("cost $$10 for $s_r");
        let rendered = template.render(&vars(&[("s_r", "0.01")])).unwrap();
        assert_eq!(rendered, "cost $10 for 0.01");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let template = InputTemplate::new("roughness $missing");
        let err = template.render(&vars(&[])).unwrap_err();
        assert!(matches!(err, EngineError::Template { .. }));
    }

    #[test]
    fn unterminated_brace_is_an_error() {
        let template = InputTemplate::new("${oops");
        assert!(template.render(&vars(&[])).is_err());
    }
}
