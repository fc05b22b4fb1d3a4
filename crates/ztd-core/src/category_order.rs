use std::collections::{
  BTreeSet,
  HashSet
};
use std::fs;
use std::io::{
  self,
  Write
};
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tempfile::NamedTempFile;
use tracing::{
  debug,
  error,
  info,
  warn
};

use crate::task::Task;

/// Name of the single durable value holding
/// the category order.
pub const CATEGORY_ORDER_KEY: &str =
  "ztd_category_order";

/// Persisted, user-chosen display order of
/// category names.
///
/// Neither operation fails the caller: a
/// missing or corrupt value loads as an
/// empty order and a failed save is only
/// logged.
pub trait CategoryOrderStore {
  fn load(&self) -> Vec<String>;

  fn save(&mut self, order: &[String]);
}

#[derive(Debug)]
pub struct FileCategoryOrderStore {
  path: PathBuf
}

impl FileCategoryOrderStore {
  #[tracing::instrument(skip(data_dir))]
  pub fn open(
    data_dir: &Path
  ) -> anyhow::Result<Self> {
    fs::create_dir_all(data_dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          data_dir.display()
        )
      })?;

    let path = data_dir.join(format!(
      "{CATEGORY_ORDER_KEY}.json"
    ));
    info!(
      path = %path.display(),
      "opened category order store"
    );

    Ok(Self {
      path
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn write_atomic(
    &self,
    order: &[String]
  ) -> anyhow::Result<()> {
    let json =
      serde_json::to_string(order)?;
    let dir = self
      .path
      .parent()
      .unwrap_or_else(|| Path::new("."));
    let mut temp =
      NamedTempFile::new_in(dir)?;
    temp.write_all(json.as_bytes())?;
    temp.flush()?;
    temp.persist(&self.path).map_err(
      |err| {
        anyhow!(
          "failed to persist {}: {}",
          self.path.display(),
          err
        )
      }
    )?;
    Ok(())
  }
}

impl CategoryOrderStore
  for FileCategoryOrderStore
{
  #[tracing::instrument(skip(self))]
  fn load(&self) -> Vec<String> {
    let raw = match fs::read_to_string(
      &self.path
    ) {
      | Ok(raw) => raw,
      | Err(err)
        if err.kind()
          == io::ErrorKind::NotFound =>
      {
        debug!(
          path = %self.path.display(),
          "no stored category order"
        );
        return Vec::new();
      }
      | Err(err) => {
        error!(
          error = %err,
          path = %self.path.display(),
          "failed reading category order"
        );
        return Vec::new();
      }
    };

    parse_stored_order(&raw)
  }

  #[tracing::instrument(skip(
    self, order
  ))]
  fn save(&mut self, order: &[String]) {
    match self.write_atomic(order) {
      | Ok(()) => {
        debug!(
          count = order.len(),
          "saved category order"
        );
      }
      | Err(err) => {
        warn!(
          error = %err,
          path = %self.path.display(),
          "failed saving category order"
        );
      }
    }
  }
}

/// Keeps the serialized value in memory, the
/// way a browser's local storage would.
#[derive(Debug, Clone, Default)]
pub struct MemoryCategoryOrderStore {
  raw: Option<String>
}

impl MemoryCategoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from an arbitrary stored value,
  /// valid or not.
  pub fn with_raw(
    raw: impl Into<String>
  ) -> Self {
    Self {
      raw: Some(raw.into())
    }
  }

  pub fn raw(&self) -> Option<&str> {
    self.raw.as_deref()
  }
}

impl CategoryOrderStore
  for MemoryCategoryOrderStore
{
  fn load(&self) -> Vec<String> {
    self
      .raw
      .as_deref()
      .map(parse_stored_order)
      .unwrap_or_default()
  }

  fn save(&mut self, order: &[String]) {
    match serde_json::to_string(order) {
      | Ok(json) => self.raw = Some(json),
      | Err(err) => {
        warn!(
          error = %err,
          "failed encoding category order"
        );
      }
    }
  }
}

fn parse_stored_order(
  raw: &str
) -> Vec<String> {
  if raw.trim().is_empty() {
    return Vec::new();
  }

  match serde_json::from_str::<
    Vec<String>
  >(raw)
  {
    | Ok(order) => order,
    | Err(err) => {
      error!(
        error = %err,
        "failed parsing category order; \
         using an empty order"
      );
      Vec::new()
    }
  }
}

/// Display categories present in `tasks`.
pub fn live_categories(
  tasks: &[Task]
) -> BTreeSet<String> {
  tasks
    .iter()
    .map(|task| {
      task.category_name().to_string()
    })
    .collect()
}

/// Stored categories that are still live, in
/// stored order, followed by every other live
/// category sorted lexicographically.
pub fn merge(
  stored: &[String],
  live: &BTreeSet<String>
) -> Vec<String> {
  let mut seen =
    HashSet::with_capacity(live.len());
  let mut out =
    Vec::with_capacity(live.len());

  for category in stored {
    if live.contains(category)
      && seen.insert(category.as_str())
    {
      out.push(category.clone());
    }
  }

  // BTreeSet iterates in sorted order.
  for category in live {
    if !seen.contains(category.as_str()) {
      out.push(category.clone());
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use tempfile::tempdir;

  use super::{
    CategoryOrderStore,
    FileCategoryOrderStore,
    MemoryCategoryOrderStore,
    live_categories,
    merge
  };
  use crate::task::Task;

  fn set(items: &[&str]) -> BTreeSet<String> {
    items
      .iter()
      .map(|item| item.to_string())
      .collect()
  }

  fn order(items: &[&str]) -> Vec<String> {
    items
      .iter()
      .map(|item| item.to_string())
      .collect()
  }

  #[test]
  fn empty_stored_order_sorts_alphabetically() {
    assert_eq!(
      merge(&[], &set(&["B", "A"])),
      order(&["A", "B"])
    );
  }

  #[test]
  fn stored_order_first_new_categories_sorted_after() {
    let stored =
      order(&["work", "gone", "home"]);
    let live = set(&[
      "home", "errands", "work", "admin"
    ]);

    assert_eq!(
      merge(&stored, &live),
      order(&[
        "work", "home", "admin", "errands"
      ])
    );
  }

  #[test]
  fn merge_yields_each_live_category_once() {
    let stored = order(&[
      "b", "x", "b", "a", "a", "zz"
    ]);
    let live = set(&["a", "b", "c"]);

    let merged = merge(&stored, &live);
    assert_eq!(
      merged,
      order(&["b", "a", "c"])
    );
    assert_eq!(
      merged
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>(),
      live
    );
  }

  #[test]
  fn live_categories_use_the_fallback() {
    let tasks = vec![
      Task::new("a").with_category("work"),
      Task::new("b"),
    ];

    assert_eq!(
      live_categories(&tasks),
      set(&["Uncategorized", "work"])
    );
  }

  #[test]
  fn corrupt_value_loads_as_empty() {
    let store =
      MemoryCategoryOrderStore::with_raw(
        "[\"work\", oops"
      );
    assert!(store.load().is_empty());

    let wrong_shape =
      MemoryCategoryOrderStore::with_raw(
        "{\"work\": 1}"
      );
    assert!(wrong_shape.load().is_empty());
  }

  #[test]
  fn memory_store_round_trips() {
    let mut store =
      MemoryCategoryOrderStore::new();
    assert!(store.load().is_empty());

    store.save(&order(&["home", "work"]));
    assert_eq!(
      store.raw(),
      Some("[\"home\",\"work\"]")
    );
    assert_eq!(
      store.load(),
      order(&["home", "work"])
    );
  }

  #[test]
  fn file_store_survives_reopen_and_tolerates_garbage()
   {
    let temp = tempdir().expect("tempdir");

    let mut store =
      FileCategoryOrderStore::open(
        temp.path()
      )
      .expect("open store");
    assert!(store.load().is_empty());

    store.save(&order(&["b", "a"]));
    let reopened =
      FileCategoryOrderStore::open(
        temp.path()
      )
      .expect("reopen store");
    assert_eq!(
      reopened.load(),
      order(&["b", "a"])
    );

    std::fs::write(
      reopened.path(),
      "not json"
    )
    .expect("write garbage");
    assert!(reopened.load().is_empty());
  }
}
