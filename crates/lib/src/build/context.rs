//! The "currently building" context.
//!
//! A build procedure that invokes the engine again must register the targets
//! it builds with the target it is producing. Inside the engine that identity
//! is an explicit [`BuildContext`] value; it only becomes environment variables
//! when it crosses into a procedure's process.

use std::path::Path;

use crate::consts::{ENV_PARENT, ENV_STACK, STACK_SEPARATOR};
use crate::target::{Target, TargetError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
  /// Outermost first; the last entry is the parent.
  ancestors: Vec<Target>,
}

impl BuildContext {
  /// Context of a build requested directly, not from inside another build.
  pub fn top_level() -> Self {
    Self::default()
  }

  /// Context for the procedure of `target`.
  pub fn child(&self, target: &Target) -> Self {
    let mut ancestors = self.ancestors.clone();
    ancestors.push(target.clone());
    Self { ancestors }
  }

  /// The target whose build requested this one.
  pub fn parent(&self) -> Option<&Target> {
    self.ancestors.last()
  }

  pub fn ancestors(&self) -> &[Target] {
    &self.ancestors
  }

  pub fn depth(&self) -> usize {
    self.ancestors.len()
  }

  pub fn contains(&self, target: &Target) -> bool {
    self.ancestors.contains(target)
  }

  /// The ancestor chain followed by `target`, for cycle reports.
  pub fn chain_with(&self, target: &Target) -> Vec<String> {
    self
      .ancestors
      .iter()
      .chain(std::iter::once(target))
      .map(|t| t.name().to_string())
      .collect()
  }

  /// Rebuild the context a parent build exported to this process.
  ///
  /// `REDO_STACK` carries the whole chain; `REDO_PARENT` alone is accepted for
  /// procedures that set it by hand.
  pub fn from_env(root: &Path) -> Result<Self, TargetError> {
    let stack = std::env::var(ENV_STACK).unwrap_or_default();
    let mut ancestors = stack
      .split(STACK_SEPARATOR)
      .filter(|s| !s.is_empty())
      .map(|s| Target::parse(root, s))
      .collect::<Result<Vec<_>, _>>()?;

    if let Ok(parent) = std::env::var(ENV_PARENT)
      && !parent.is_empty()
    {
      let parent = Target::parse(root, &parent)?;
      if ancestors.last() != Some(&parent) {
        ancestors.push(parent);
      }
    }

    Ok(Self { ancestors })
  }

  /// Variables that hand this context to a child process.
  pub fn to_env(&self) -> Vec<(&'static str, String)> {
    let Some(parent) = self.parent() else {
      return Vec::new();
    };
    let stack = self
      .ancestors
      .iter()
      .map(Target::name)
      .collect::<Vec<_>>()
      .join(&STACK_SEPARATOR.to_string());
    vec![(ENV_PARENT, parent.name().to_string()), (ENV_STACK, stack)]
  }
}
