use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

use super::{Page, Project, SiteRepository, ROOT_PAGE_ID};

#[derive(Debug, Clone)]
struct PageNode {
    parent_id: Option<u64>,
    slug: String,
    active: bool,
}

#[derive(Debug)]
struct ProjectTree {
    project: Project,
    pages: BTreeMap<u64, PageNode>,
}

/// Page trees held in memory
///
/// Used as the site source of the standalone server (loaded from a JSON
/// file) and by hosts or tests that drive page moves themselves.
/// Rewritten URLs are built from page slugs along the parent chain, with a
/// `/<lang>` prefix for projects without a virtual host.
#[derive(Debug, Default)]
pub struct MemorySiteRepository {
    trees: RwLock<Vec<ProjectTree>>,
}

#[derive(Debug, Deserialize)]
struct SiteTreeFile {
    projects: Vec<ProjectTreeFile>,
}

#[derive(Debug, Deserialize)]
struct ProjectTreeFile {
    #[serde(flatten)]
    project: Project,
    #[serde(default)]
    pages: Vec<PageFile>,
}

#[derive(Debug, Deserialize)]
struct PageFile {
    id: u64,
    parent: u64,
    slug: String,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl MemorySiteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository with one empty tree per project
    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let repository = Self::new();
        for project in projects {
            repository.add_project(project);
        }
        repository
    }

    /// Loads projects and pages from a JSON file
    ///
    /// ```json
    /// { "projects": [ { "name": "main", "lang": "en", "host": null,
    ///     "pages": [ { "id": 2, "parent": 1, "slug": "about" } ] } ] }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read site tree file {}", path.display()))?;
        let file: SiteTreeFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse site tree file {}", path.display()))?;

        let repository = Self::new();
        for tree in file.projects {
            repository.add_project(tree.project.clone());
            for page in tree.pages {
                repository.insert_page(&tree.project, page.id, page.parent, &page.slug, page.active)?;
            }
        }

        info!("Loaded site trees for {} project(s) from {}", repository.project_count(), path.display());
        Ok(repository)
    }

    /// Adds a project with just its root page; the first project becomes the default
    pub fn add_project(&self, project: Project) {
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        if trees.iter().any(|t| t.project == project) {
            return;
        }

        let mut pages = BTreeMap::new();
        pages.insert(
            ROOT_PAGE_ID,
            PageNode {
                parent_id: None,
                slug: String::new(),
                active: true,
            },
        );
        debug!("Adding project {} ({})", project.name, project.lang);
        trees.push(ProjectTree { project, pages });
    }

    pub fn project_count(&self) -> usize {
        self.trees.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn insert_page(
        &self,
        project: &Project,
        page_id: u64,
        parent_id: u64,
        slug: &str,
        active: bool,
    ) -> Result<()> {
        self.with_tree_mut(project, |tree| {
            if tree.pages.contains_key(&page_id) {
                bail!("Page {} already exists", page_id);
            }
            if !tree.pages.contains_key(&parent_id) {
                bail!("Parent page {} does not exist", parent_id);
            }
            tree.pages.insert(
                page_id,
                PageNode {
                    parent_id: Some(parent_id),
                    slug: slug.to_string(),
                    active,
                },
            );
            Ok(())
        })
    }

    /// Re-parents a page; its subtree moves with it
    pub fn move_page(&self, project: &Project, page_id: u64, new_parent_id: u64) -> Result<()> {
        self.with_tree_mut(project, |tree| {
            if !tree.pages.contains_key(&new_parent_id) {
                bail!("Parent page {} does not exist", new_parent_id);
            }

            // The new parent must not live inside the moved subtree
            let mut cursor = Some(new_parent_id);
            while let Some(id) = cursor {
                if id == page_id {
                    bail!("Cannot move page {} below itself", page_id);
                }
                cursor = tree.pages.get(&id).and_then(|n| n.parent_id);
            }

            let node = tree
                .pages
                .get_mut(&page_id)
                .ok_or_else(|| anyhow!("Page {} does not exist", page_id))?;
            node.parent_id = Some(new_parent_id);
            Ok(())
        })
    }

    pub fn rename_page(&self, project: &Project, page_id: u64, slug: &str) -> Result<()> {
        self.with_tree_mut(project, |tree| {
            let node = tree
                .pages
                .get_mut(&page_id)
                .ok_or_else(|| anyhow!("Page {} does not exist", page_id))?;
            node.slug = slug.to_string();
            Ok(())
        })
    }

    pub fn set_active(&self, project: &Project, page_id: u64, active: bool) -> Result<()> {
        self.with_tree_mut(project, |tree| {
            let node = tree
                .pages
                .get_mut(&page_id)
                .ok_or_else(|| anyhow!("Page {} does not exist", page_id))?;
            node.active = active;
            Ok(())
        })
    }

    /// Removes a page and its whole subtree
    pub fn remove_page(&self, project: &Project, page_id: u64) -> Result<()> {
        self.with_tree_mut(project, |tree| {
            if page_id == ROOT_PAGE_ID {
                bail!("The root page cannot be removed");
            }

            let mut doomed = vec![page_id];
            let mut index = 0;
            while index < doomed.len() {
                let parent = doomed[index];
                doomed.extend(
                    tree.pages
                        .iter()
                        .filter(|(_, node)| node.parent_id == Some(parent))
                        .map(|(id, _)| *id),
                );
                index += 1;
            }

            for id in doomed {
                tree.pages.remove(&id);
            }
            Ok(())
        })
    }

    fn with_tree_mut<T>(
        &self,
        project: &Project,
        f: impl FnOnce(&mut ProjectTree) -> Result<T>,
    ) -> Result<T> {
        let mut trees = self.trees.write().unwrap_or_else(|e| e.into_inner());
        let tree = trees
            .iter_mut()
            .find(|t| t.project == *project)
            .ok_or_else(|| anyhow!("Unknown project {} ({})", project.name, project.lang))?;
        f(tree)
    }

    fn rewritten_url(tree: &ProjectTree, page_id: u64) -> Result<String> {
        let mut slugs = Vec::new();
        let mut cursor = Some(page_id);

        while let Some(id) = cursor {
            let node = tree
                .pages
                .get(&id)
                .ok_or_else(|| anyhow!("Page {} does not exist", id))?;
            if !node.slug.is_empty() {
                slugs.push(node.slug.as_str());
            }
            cursor = node.parent_id;
        }
        slugs.reverse();

        let path = format!("/{}", slugs.join("/"));
        if tree.project.has_vhost() {
            Ok(path)
        } else {
            Ok(format!("/{}{}", tree.project.lang, path))
        }
    }
}

impl SiteRepository for MemorySiteRepository {
    fn projects(&self) -> Result<Vec<Project>> {
        let trees = self.trees.read().unwrap_or_else(|e| e.into_inner());
        Ok(trees.iter().map(|t| t.project.clone()).collect())
    }

    fn default_project(&self) -> Result<Project> {
        let trees = self.trees.read().unwrap_or_else(|e| e.into_inner());
        trees
            .first()
            .map(|t| t.project.clone())
            .ok_or_else(|| anyhow!("No projects configured"))
    }

    fn page(&self, project: &Project, page_id: u64) -> Result<Page> {
        let trees = self.trees.read().unwrap_or_else(|e| e.into_inner());
        let tree = trees
            .iter()
            .find(|t| t.project == *project)
            .ok_or_else(|| anyhow!("Unknown project {} ({})", project.name, project.lang))?;
        let node = tree
            .pages
            .get(&page_id)
            .ok_or_else(|| anyhow!("Page {} does not exist in {}", page_id, project.name))?;

        Ok(Page {
            id: page_id,
            project: tree.project.clone(),
            parent_id: node.parent_id,
            active: node.active,
            url_rewritten: Self::rewritten_url(tree, page_id)?,
        })
    }

    fn children(&self, project: &Project, page_id: u64) -> Result<Vec<u64>> {
        let trees = self.trees.read().unwrap_or_else(|e| e.into_inner());
        let tree = trees
            .iter()
            .find(|t| t.project == *project)
            .ok_or_else(|| anyhow!("Unknown project {} ({})", project.name, project.lang))?;

        Ok(tree
            .pages
            .iter()
            .filter(|(_, node)| node.parent_id == Some(page_id))
            .map(|(id, _)| *id)
            .collect())
    }
}
