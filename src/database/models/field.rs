use serde_json::Value;

/// Value shape an updatable attribute accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-blank string
    Text,
    /// String or null
    OptionalText,
    /// String or number
    Scalar,
}

/// Attribute name paired with the shape its stored value must keep
pub type UpdatableField = (&'static str, FieldKind);

impl FieldKind {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            FieldKind::OptionalText => value.is_string() || value.is_null(),
            FieldKind::Scalar => value.is_string() || value.is_number(),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "a non-empty string",
            FieldKind::OptionalText => "a string or null",
            FieldKind::Scalar => "a string or number",
        }
    }
}

/// Comma-separated attribute names, for error messages
pub fn field_names(fields: &[UpdatableField]) -> String {
    fields
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_accept_their_shapes() {
        assert!(FieldKind::Text.accepts(&json!("HQ")));
        assert!(!FieldKind::Text.accepts(&json!("  ")));
        assert!(!FieldKind::Text.accepts(&json!(null)));
        assert!(!FieldKind::Text.accepts(&json!(5)));

        assert!(FieldKind::OptionalText.accepts(&json!(null)));
        assert!(!FieldKind::OptionalText.accepts(&json!(["a"])));

        assert!(FieldKind::Scalar.accepts(&json!(22.5)));
        assert!(FieldKind::Scalar.accepts(&json!("300")));
        assert!(!FieldKind::Scalar.accepts(&json!({})));
        assert!(!FieldKind::Scalar.accepts(&json!(true)));
    }
}
