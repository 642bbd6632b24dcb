//! Tool display metadata and tool response inspection

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Icon used for tools missing from the display map
pub const DEFAULT_TOOL_ICON: &str = "wrench";

/// How a tool is presented in activity telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDisplay {
    pub label: String,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    DEFAULT_TOOL_ICON.to_string()
}

/// Tool name to display metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolDisplayMap(HashMap<String, ToolDisplay>);

impl ToolDisplayMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tool: impl Into<String>, label: impl Into<String>, icon: impl Into<String>) {
        self.0.insert(
            tool.into(),
            ToolDisplay {
                label: label.into(),
                icon: icon.into(),
            },
        );
    }

    pub fn label(&self, tool: &str) -> String {
        match self.0.get(tool) {
            Some(display) => display.label.clone(),
            None => format!("Running {tool}"),
        }
    }

    pub fn icon(&self, tool: &str) -> String {
        self.0
            .get(tool)
            .map(|display| display.icon.clone())
            .unwrap_or_else(default_icon)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A tool response is an error when it is an object with `status == "error"`
/// or any `error` key.
pub fn is_error_response(response: &Value) -> bool {
    match response.as_object() {
        Some(object) => {
            object.get("status").and_then(Value::as_str) == Some("error")
                || object.contains_key("error")
        }
        None => false,
    }
}

const DETAIL_FIELDS: [&str; 4] = ["message", "error", "detail", "reason"];
const DETAIL_CONTAINERS: [&str; 3] = ["error", "result", "response"];

fn first_detail(object: &serde_json::Map<String, Value>) -> Option<String> {
    DETAIL_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Pull a human readable error message out of a tool response.
///
/// Looks at `message`, `error`, `detail` and `reason` at the top level, then
/// inside `error`, `result` and `response` objects.
pub fn extract_error_detail(response: &Value) -> Option<String> {
    let object = response.as_object()?;
    first_detail(object).or_else(|| {
        DETAIL_CONTAINERS.iter().find_map(|container| {
            object
                .get(*container)
                .and_then(Value::as_object)
                .and_then(first_detail)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_fallback() {
        let mut map = ToolDisplayMap::new();
        map.insert("search", "Searching inventory", "search");

        assert_eq!(map.label("search"), "Searching inventory");
        assert_eq!(map.icon("search"), "search");
        assert_eq!(map.label("mystery"), "Running mystery");
        assert_eq!(map.icon("mystery"), "wrench");
    }

    #[test]
    fn test_display_map_from_yaml() {
        let yaml = "lookup:\n  label: Looking up\nnotify:\n  label: Notifying\n  icon: bell\n";
        let map: ToolDisplayMap = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.icon("lookup"), "wrench");
        assert_eq!(map.icon("notify"), "bell");
    }

    #[test]
    fn test_is_error_response() {
        assert!(is_error_response(&json!({"status": "error"})));
        assert!(is_error_response(&json!({"error": null})));
        assert!(!is_error_response(&json!({"status": "success"})));
        assert!(!is_error_response(&json!("error")));
        assert!(!is_error_response(&json!(null)));
    }

    #[test]
    fn test_extract_error_detail_top_level_order() {
        let response = json!({"reason": "r", "detail": "d", "message": "  "});
        assert_eq!(extract_error_detail(&response), Some("d".to_string()));
    }

    #[test]
    fn test_extract_error_detail_containers() {
        let response = json!({"status": "error", "error": {"message": " quota exceeded "}});
        assert_eq!(
            extract_error_detail(&response),
            Some("quota exceeded".to_string())
        );

        let response = json!({"result": {"reason": "denied"}});
        assert_eq!(extract_error_detail(&response), Some("denied".to_string()));
    }

    #[test]
    fn test_extract_error_detail_missing() {
        assert_eq!(extract_error_detail(&json!({"status": "error"})), None);
        assert_eq!(extract_error_detail(&json!([1, 2])), None);
    }
}
