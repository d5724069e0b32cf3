//! `get_current_time(timezone)`: wall-clock time in an IANA time zone.

use chrono::Utc;
use chrono_tz::Tz;
use ltm_core::error::ToolError;
use ltm_core::tool::SyncTool;
use std::str::FromStr;

use super::string_arg;

pub struct CurrentTime;

impl SyncTool for CurrentTime {
    fn description(&self) -> &str {
        "Get the current date and time in a time zone (tz database name, e.g. \"Europe/London\")."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "IANA time zone, e.g. \"America/New_York\" or \"Asia/Tokyo\""
                }
            },
            "required": ["timezone"]
        })
    }

    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let name = string_arg(&arguments, "timezone")?.trim();
        let tz = Tz::from_str(name)
            .map_err(|_| ToolError::InvalidArguments(format!("Unknown time zone '{name}'")))?;
        let now = Utc::now().with_timezone(&tz);
        Ok(serde_json::json!({
            "timezone": name,
            "current_time": now.format("%Y-%m-%d %H:%M:%S").to_string(),
            "utc_offset": now.format("%:z").to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_time_in_zone() {
        let value = CurrentTime
            .call(serde_json::json!({"timezone": "Asia/Tokyo"}))
            .unwrap();
        assert_eq!(value["timezone"], "Asia/Tokyo");
        assert_eq!(value["utc_offset"], "+09:00");
        assert_eq!(value["current_time"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn unknown_zone_is_invalid_arguments() {
        let err = CurrentTime
            .call(serde_json::json!({"timezone": "Mars/Olympus_Mons"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.contains("Mars/Olympus_Mons")));
    }
}
