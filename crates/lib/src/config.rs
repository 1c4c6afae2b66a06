//! List configuration.
//!
//! A [`ListConfig`] names the position column, the scope delimiting each list, the
//! integer used for the top of a list, and where newly created items are placed.
//! It can be built in code or parsed from JSON:
//!
//! ```
//! use ranklist::{ListConfig, Placement, Scope};
//!
//! let config = ListConfig::from_json(
//!     r#"{"position_column": "rank", "scope": {"foreign_key": "todo_list_id"}, "placement": "top"}"#,
//! )
//! .unwrap();
//! assert_eq!(config.position_column, "rank");
//! assert_eq!(config.placement, Placement::Top);
//! assert_eq!(config.scope, Some(Scope::foreign_key("todo_list_id")));
//! ```

use serde::{Deserialize, Deserializer};

use crate::Result;
use crate::constants::{DEFAULT_POSITION_COLUMN, DEFAULT_SCOPE, DEFAULT_TOP_OF_LIST};
use crate::scope::Scope;

/// Where a newly created item enters its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Shift every item down and take the top position
    Top,
    /// Take the position after the current bottom item
    #[default]
    Bottom,
    /// Leave new items out of the list
    None,
}

/// Configuration of one family of lists sharing a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ListConfig {
    /// Column holding the position integer
    pub position_column: String,
    /// Scope delimiting each list; `None` is a configuration error surfaced on first use
    pub scope: Option<Scope>,
    /// Position of the first item (use 0 for array-like indexing)
    pub top_of_list: i64,
    /// Placement of newly created items
    pub placement: Placement,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            position_column: DEFAULT_POSITION_COLUMN.to_string(),
            scope: Some(Scope::raw(DEFAULT_SCOPE)),
            top_of_list: DEFAULT_TOP_OF_LIST,
            placement: Placement::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawListConfig {
    #[serde(default)]
    position_column: Option<String>,
    #[serde(default, deserialize_with = "present")]
    scope: Option<serde_json::Value>,
    #[serde(default)]
    top_of_list: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    placement: Option<Option<Placement>>,
}

/// Distinguishes an explicit `null` (`Some(null)`) from a missing field (`None`).
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ListConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// Missing fields take their defaults. `"scope": null` is accepted here and fails
    /// with `NullScope` when a list is first resolved; `"placement": null` disables
    /// automatic placement. A scope that is neither a string, a `{"foreign_key": ..}`
    /// object nor a `{"filter": [..]}` object is rejected with `InvalidScope`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawListConfig = serde_json::from_str(json)?;
        let defaults = Self::default();

        let scope = match raw.scope {
            None => defaults.scope,
            Some(value) => Scope::from_json(&value)?,
        };

        Ok(Self {
            position_column: raw.position_column.unwrap_or(defaults.position_column),
            scope,
            top_of_list: raw.top_of_list.unwrap_or(defaults.top_of_list),
            placement: match raw.placement {
                None => defaults.placement,
                Some(placement) => placement.unwrap_or(Placement::None),
            },
        })
    }

    pub fn with_position_column(mut self, column: impl Into<String>) -> Self {
        self.position_column = column.into();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Clears the scope. Any operation that resolves it fails with `NullScope`.
    pub fn without_scope(mut self) -> Self {
        self.scope = None;
        self
    }

    pub fn with_top_of_list(mut self, top: i64) -> Self {
        self.top_of_list = top;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}
