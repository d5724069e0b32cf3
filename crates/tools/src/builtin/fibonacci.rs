//! `calculate_fibonacci(n)`: iterative, with a cache shared across calls.

use ltm_core::error::ToolError;
use ltm_core::tool::SyncTool;
use std::sync::Mutex;

use super::integer_arg;

/// F(186) is the largest Fibonacci number that fits in a `u128`.
pub const MAX_N: usize = 186;

pub struct Fibonacci {
    /// `cache[i]` is F(i); always holds at least F(0) and F(1)
    cache: Mutex<Vec<u128>>,
}

impl Fibonacci {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(vec![0, 1]),
        }
    }

    /// F(n), extending the cache from its highest known index.
    pub fn compute(&self, n: usize) -> Result<u128, ToolError> {
        if n > MAX_N {
            return Err(ToolError::InvalidArguments(format!(
                "n must be at most {MAX_N}, got {n}"
            )));
        }
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while cache.len() <= n {
            let len = cache.len();
            let next = cache[len - 1] + cache[len - 2];
            cache.push(next);
        }
        Ok(cache[n])
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for Fibonacci {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTool for Fibonacci {
    fn description(&self) -> &str {
        "Calculate the nth Fibonacci number."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "n": {
                    "type": "integer",
                    "description": "Index of the Fibonacci number, F(0) = 0, F(1) = 1"
                }
            },
            "required": ["n"]
        })
    }

    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let n = integer_arg(&arguments, "n")?;
        let n = usize::try_from(n)
            .map_err(|_| ToolError::InvalidArguments(format!("n must not be negative, got {n}")))?;
        let value = self.compute(n)?;
        // Large values do not fit a JSON number; send them as text.
        Ok(match u64::try_from(value) {
            Ok(small) => serde_json::json!(small),
            Err(_) => serde_json::Value::String(value.to_string()),
        })
    }
}
