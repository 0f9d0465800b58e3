use serde::Deserialize;

/// Process-wide switches which change what the lowering stage emits
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoweringOptions {
    /// Emit calls to `__trace_enter` in every prologue and to
    /// `__trace_leave` before every return
    pub trace_calls: bool,
    /// Annotate the instruction stream with a comment naming every lowered
    /// statement
    pub debug_comments: bool,
}

/// Runtime entry point called at the start of every function when call
/// tracing is enabled
pub const TRACE_ENTER: &str = "__trace_enter";
/// Runtime entry point called before every return when call tracing is
/// enabled
pub const TRACE_LEAVE: &str = "__trace_leave";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options: LoweringOptions = serde_json::from_str(r#"{ "trace_calls": true }"#).unwrap();

        assert!(options.trace_calls);
        assert!(!options.debug_comments);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<LoweringOptions>(r#"{ "opt_level": 3 }"#).is_err());
    }
}
