//! `DatabaseClient.search` and `DatabaseClient.get_user`: canned lookups.

use ltm_core::error::ToolError;
use ltm_core::tool::SyncTool;

use super::{integer_arg, string_arg};

pub struct Search;

impl SyncTool for Search {
    fn description(&self) -> &str {
        "Search the database for a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search terms" }
            },
            "required": ["query"]
        })
    }

    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = string_arg(&arguments, "query")?;
        Ok(serde_json::json!([
            { "id": 1, "title": format!("Result for '{query}' #1") },
            { "id": 2, "title": format!("Result for '{query}' #2") },
        ]))
    }
}

pub struct GetUser;

impl SyncTool for GetUser {
    fn description(&self) -> &str {
        "Get a user by ID."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer" }
            },
            "required": ["user_id"]
        })
    }

    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let id = integer_arg(&arguments, "user_id")?;
        Ok(serde_json::json!({
            "id": id,
            "name": format!("User {id}"),
            "email": format!("user{id}@example.com"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_echoes_query() {
        let rows = Search.call(serde_json::json!({"query": "rust"})).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["title"], "Result for 'rust' #1");
    }

    #[test]
    fn get_user_builds_record() {
        let user = GetUser.call(serde_json::json!({"user_id": 7})).unwrap();
        assert_eq!(user["email"], "user7@example.com");
        assert!(GetUser.call(serde_json::json!({})).is_err());
    }
}
