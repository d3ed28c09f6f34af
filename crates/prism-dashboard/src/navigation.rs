//! Tab and execution selection state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fragment prefix that addresses a single execution.
pub const EXECUTION_FRAGMENT_PREFIX: &str = "#execution-";

/// Dashboard tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
  #[default]
  Overview,
  Steps,
  Drilldown,
}

impl Tab {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Overview => "overview",
      Self::Steps => "steps",
      Self::Drilldown => "drilldown",
    }
  }
}

impl fmt::Display for Tab {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Tab {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "overview" => Ok(Self::Overview),
      "steps" => Ok(Self::Steps),
      "drilldown" => Ok(Self::Drilldown),
      other => Err(format!("unknown tab: {other}")),
    }
  }
}

/// Which tab is shown and which execution, if any, is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigator {
  tab: Tab,
  selection: Option<String>,
}

impl Navigator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn tab(&self) -> Tab {
    self.tab
  }

  pub fn set_tab(&mut self, tab: Tab) {
    self.tab = tab;
  }

  pub fn selection(&self) -> Option<&str> {
    self.selection.as_deref()
  }

  /// Select an execution and switch to the drilldown tab.
  pub fn select(&mut self, execution_id: impl Into<String>) {
    self.selection = Some(execution_id.into());
    self.tab = Tab::Drilldown;
  }

  /// Clear the selection, returning the drilldown to its list.
  pub fn back_to_list(&mut self) {
    self.selection = None;
  }

  /// Apply a location fragment.
  ///
  /// `#execution-<id>` selects `<id>`; an empty fragment (or a bare `#`)
  /// clears the selection and keeps the tab. Any other fragment is ignored and
  /// `false` is returned.
  pub fn apply_fragment(&mut self, fragment: &str) -> bool {
    if fragment.is_empty() || fragment == "#" {
      self.back_to_list();
      return true;
    }
    match fragment.strip_prefix(EXECUTION_FRAGMENT_PREFIX) {
      Some(id) if !id.is_empty() => {
        self.select(id);
        true
      }
      _ => false,
    }
  }

  /// The fragment addressing the current selection, or an empty string.
  pub fn fragment(&self) -> String {
    match &self.selection {
      Some(id) => format!("{EXECUTION_FRAGMENT_PREFIX}{id}"),
      None => String::new(),
    }
  }
}
