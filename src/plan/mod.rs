pub mod jmx;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the configuration file inside every plan directory.
pub const PLAN_FILE: &str = "plan.jmx";

const TEMPLATE: &str = include_str!("../../assets/template.jmx");

const TESTPLAN_TAG: &str = "TestPlan";
const TESTNAME_ATTR: &str = "testname";
const COMMENTS_PROP: &str = "TestPlan.comments";
const FUNCTIONAL_MODE_PROP: &str = "TestPlan.functional_mode";
const TEARDOWN_PROP: &str = "TestPlan.tearDown_on_shutdown";
const SERIALIZE_PROP: &str = "TestPlan.serialize_threadgroups";

/// Listing entry; `checked` marks the plan the dashboard should select.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub name: String,
    pub checked: bool,
}

/// Attributes read back from the plan XML.
#[derive(Debug, Clone, Serialize)]
pub struct PlanInfo {
    pub name: String,
    pub comments: String,
    pub functional_mode: bool,
    #[serde(rename = "tearDown_on_shutdown")]
    pub teardown_on_shutdown: bool,
    pub serialize_threadgroups: bool,
}

/// Fields accepted by [`PlanStore::edit`].
#[derive(Debug, Clone, Deserialize)]
pub struct PlanEdit {
    pub old_name: String,
    pub new_name: String,
    pub comments: String,
    pub functional_mode: bool,
    #[serde(rename = "tearDown_on_shutdown")]
    pub teardown_on_shutdown: bool,
    pub serialize_threadgroups: bool,
}

/// Plan names become path components, so anything that could escape the
/// workspace root is rejected up front.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("plan name must not be empty");
    }
    if name == "." || name == ".." {
        bail!("plan name must not be a relative path component");
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        bail!("plan name must not contain path separators");
    }
    Ok(())
}

/// Owns every plan directory operation under the workspace root.
#[derive(Debug, Clone)]
pub struct PlanStore {
    root: PathBuf,
}

impl PlanStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn plan_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn plan_file(&self, name: &str) -> Result<PathBuf> {
        Ok(self.plan_dir(name)?.join(PLAN_FILE))
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.plan_dir(name) {
            Ok(dir) => tokio::fs::metadata(dir).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Instantiate the bundled template as a new plan.
    pub async fn create(&self, name: &str) -> Result<PathBuf> {
        let dir = self.plan_dir(name)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating plan directory {}", dir.display()))?;
        let content = jmx::write_attr(TEMPLATE, TESTPLAN_TAG, TESTNAME_ATTR, name)?;
        let path = dir.join(PLAN_FILE);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(plan = name, path = %path.display(), "created plan");
        Ok(path)
    }

    /// Persist an uploaded plan file under a new plan directory.
    pub async fn import(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.plan_dir(name)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating plan directory {}", dir.display()))?;
        let path = dir.join(PLAN_FILE);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(plan = name, path = %path.display(), "imported plan");
        Ok(path)
    }

    /// Rename the plan directory and push the edited attributes into the XML.
    pub async fn edit(&self, edit: &PlanEdit) -> Result<()> {
        let old_dir = self.plan_dir(&edit.old_name)?;
        let new_dir = self.plan_dir(&edit.new_name)?;
        if old_dir != new_dir {
            tokio::fs::rename(&old_dir, &new_dir).await.with_context(|| {
                format!("renaming {} to {}", old_dir.display(), new_dir.display())
            })?;
        }

        let path = new_dir.join(PLAN_FILE);
        let mut content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        content = jmx::write_attr(&content, TESTPLAN_TAG, TESTNAME_ATTR, &edit.new_name)?;
        content = jmx::write_prop_text(&content, "stringProp", COMMENTS_PROP, &edit.comments)?;
        for (key, value) in [
            (FUNCTIONAL_MODE_PROP, edit.functional_mode),
            (TEARDOWN_PROP, edit.teardown_on_shutdown),
            (SERIALIZE_PROP, edit.serialize_threadgroups),
        ] {
            content = jmx::write_prop_text(&content, "boolProp", key, bool_str(value))?;
        }

        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(plan = %edit.new_name, "saved plan");
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        let dir = self.plan_dir(name)?;
        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("removing {}", dir.display()))?;
        info!(plan = name, "removed plan");
        Ok(())
    }

    /// Remove every plan, returning the removed names so callers can cascade.
    pub async fn remove_all(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.plan_names().await? {
            tokio::fs::remove_dir_all(self.root.join(&name))
                .await
                .with_context(|| format!("removing plan {name}"))?;
            info!(plan = %name, "removed plan");
            removed.push(name);
        }
        Ok(removed)
    }

    /// All plans, newest directory first, the first one marked `checked`.
    pub async fn list(&self) -> Result<Vec<PlanSummary>> {
        let names = self.names_by_mtime().await?;
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, name)| PlanSummary { name, checked: i == 0 })
            .collect())
    }

    /// Same listing with `checked` forced onto the named plan.
    pub async fn list_checked(&self, checked: &str) -> Result<Vec<PlanSummary>> {
        let names = self.names_by_mtime().await?;
        Ok(names
            .into_iter()
            .map(|name| {
                let is_checked = name == checked;
                PlanSummary { name, checked: is_checked }
            })
            .collect())
    }

    pub async fn info(&self, name: &str) -> Result<PlanInfo> {
        let path = self.plan_file(name)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let testname = jmx::read_attr(&content, TESTPLAN_TAG, TESTNAME_ATTR)?
            .unwrap_or_else(|| name.to_string());
        let comments =
            jmx::read_prop_text(&content, "stringProp", COMMENTS_PROP)?.unwrap_or_default();

        Ok(PlanInfo {
            name: testname,
            comments,
            functional_mode: read_bool(&content, FUNCTIONAL_MODE_PROP)?,
            teardown_on_shutdown: read_bool(&content, TEARDOWN_PROP)?,
            serialize_threadgroups: read_bool(&content, SERIALIZE_PROP)?,
        })
    }

    async fn plan_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // an untouched workspace has no root yet; that is an empty listing
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e).context("reading workspace root"),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    async fn names_by_mtime(&self) -> Result<Vec<String>> {
        let mut stamped = Vec::new();
        for name in self.plan_names().await? {
            let modified = tokio::fs::metadata(self.root.join(&name))
                .await?
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            stamped.push((modified, name));
        }
        stamped.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(stamped.into_iter().map(|(_, name)| name).collect())
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn read_bool(content: &str, prop: &str) -> Result<bool> {
    Ok(jmx::read_prop_text(content, "boolProp", prop)?
        .map(|v| v == "true")
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("..\\escape")]
    fn rejects_unsafe_names(#[case] name: &str) {
        assert!(validate_name(name).is_err());
    }

    #[rstest]
    #[case("smoke")]
    #[case("spike test 01")]
    #[case("订单压测")]
    fn accepts_plain_names(#[case] name: &str) {
        assert!(validate_name(name).is_ok());
    }

    #[tokio::test]
    async fn create_list_info_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());

        store.create("smoke").await.unwrap();
        assert!(store.exists("smoke").await);

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "smoke");
        assert!(list[0].checked);

        let info = store.info("smoke").await.unwrap();
        assert_eq!(info.name, "smoke");
        assert!(!info.functional_mode);
    }

    #[tokio::test]
    async fn edit_renames_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        store.create("before").await.unwrap();

        store
            .edit(&PlanEdit {
                old_name: "before".into(),
                new_name: "after".into(),
                comments: "tuned".into(),
                functional_mode: true,
                teardown_on_shutdown: false,
                serialize_threadgroups: true,
            })
            .await
            .unwrap();

        assert!(!store.exists("before").await);
        let info = store.info("after").await.unwrap();
        assert_eq!(info.name, "after");
        assert_eq!(info.comments, "tuned");
        assert!(info.functional_mode);
        assert!(!info.teardown_on_shutdown);
        assert!(info.serialize_threadgroups);
    }

    #[tokio::test]
    async fn remove_all_reports_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        store.create("a").await.unwrap();
        store.create("b").await.unwrap();

        let mut removed = store.remove_all().await.unwrap();
        removed.sort();
        assert_eq!(removed, vec!["a".to_string(), "b".to_string()]);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_missing_root_is_empty() {
        let store = PlanStore::new("/nonexistent/loadmeter-test-root");
        assert!(store.list().await.unwrap().is_empty());
    }
}
