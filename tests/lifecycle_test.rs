#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};
    use std::sync::Arc;

    use redirect_manager::lifecycle::{
        DialogFlow, HookScope, LifecycleConfig, LifecycleHooks, MemorySessionStore, Notice,
    };
    use redirect_manager::manager::{RedirectManager, StaticLicense, FREE_REDIRECTS};
    use redirect_manager::site::{MemorySiteRepository, PageRef, Project};
    use redirect_manager::store::{MemoryDatabase, RedirectDatabase, RedirectEntry, TableName};
    use redirect_manager::url_parser::ChildRedirect;

    /// main/en:  1 ─┬─ 2 about ── 3 team ── 4 jobs
    ///              └─ 5 news
    fn setup(licensed: bool) -> (RedirectManager, Arc<MemorySiteRepository>, Project) {
        let project = Project::new("main", "en");
        let sites = Arc::new(MemorySiteRepository::with_projects([project.clone()]));
        sites.insert_page(&project, 2, 1, "about", true).unwrap();
        sites.insert_page(&project, 3, 2, "team", true).unwrap();
        sites.insert_page(&project, 4, 3, "jobs", true).unwrap();
        sites.insert_page(&project, 5, 1, "news", true).unwrap();

        let license = if licensed {
            StaticLicense::licensed()
        } else {
            StaticLicense::unlicensed(Some("https://store.example".to_string()))
        };
        let manager = RedirectManager::new(Arc::new(MemoryDatabase::new()), sites.clone(), Arc::new(license));
        (manager, sites, project)
    }

    /// Memory tables that refuse to store one particular source
    struct RejectingDatabase {
        inner: MemoryDatabase,
        rejected_source: &'static str,
    }

    impl RedirectDatabase for RejectingDatabase {
        fn replace(&self, table: &TableName, id: &str, entry: &RedirectEntry) -> Result<()> {
            if entry.source_url == self.rejected_source {
                bail!("disk full while writing {}", entry.source_url);
            }
            self.inner.replace(table, id, entry)
        }

        fn fetch(&self, table: &TableName, id: &str) -> Result<Option<RedirectEntry>> {
            self.inner.fetch(table, id)
        }

        fn delete(&self, table: &TableName, id: &str) -> Result<bool> {
            self.inner.delete(table, id)
        }

        fn fetch_all(&self, table: &TableName) -> Result<Vec<RedirectEntry>> {
            self.inner.fetch_all(table)
        }

        fn count(&self, table: &TableName) -> Result<usize> {
            self.inner.count(table)
        }
    }

    fn target(manager: &RedirectManager, project: &Project, source: &str) -> Option<String> {
        manager.get_redirect_for_url(source, project).unwrap()
    }

    #[tokio::test]
    async fn test_move_adds_redirect_per_page() -> Result<()> {
        let (manager, sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let page = PageRef::new(&project, 2);
        let mut scope = HookScope::new();

        hooks.on_page_move_before(&mut scope, &page);
        sites.move_page(&project, 2, 5)?;
        let outcome = hooks.on_page_move_after(&mut scope, &page);

        assert_eq!(outcome.added, 3);
        assert_eq!(outcome.notices, vec![Notice::RedirectsAdded { count: 3 }]);
        assert_eq!(target(&manager, &project, "/about").as_deref(), Some("/news/about"));
        assert_eq!(target(&manager, &project, "/about/team").as_deref(), Some("/news/about/team"));
        assert_eq!(target(&manager, &project, "/en/about/team/jobs").as_deref(), Some("/news/about/team/jobs"));
        assert_eq!(scope.finish(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_hooks_add_nothing_twice() -> Result<()> {
        let (manager, sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let page = PageRef::new(&project, 2);
        let mut scope = HookScope::new();

        hooks.on_page_move_before(&mut scope, &page);
        sites.move_page(&project, 2, 5)?;
        hooks.on_page_move_after(&mut scope, &page);
        let again = hooks.on_page_move_after(&mut scope, &page);

        assert_eq!(again.added, 0);
        assert_eq!(manager.redirect_count(Some(&project))?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_save_without_url_change_adds_nothing() -> Result<()> {
        let (manager, _sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let page = PageRef::new(&project, 3);
        let mut scope = HookScope::new();

        hooks.on_page_save_before(&mut scope, &page);
        let outcome = hooks.on_page_save(&mut scope, &page);

        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(manager.redirect_count(None)?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_rename_redirects_subtree() -> Result<()> {
        let (manager, sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let page = PageRef::new(&project, 2);
        let mut scope = HookScope::new();

        hooks.on_page_save_before(&mut scope, &page);
        sites.rename_page(&project, 2, "company")?;
        let outcome = hooks.on_page_save(&mut scope, &page);

        assert_eq!(outcome.added, 3);
        assert_eq!(target(&manager, &project, "/about/team").as_deref(), Some("/company/team"));

        Ok(())
    }

    #[tokio::test]
    async fn test_unstaged_child_uses_parent_urls() -> Result<()> {
        let (manager, sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let mut scope = HookScope::new();

        // Only the parent was staged, as if the child's entry had been lost
        scope.stage(&PageRef::new(&project, 2), "/about".to_string());
        sites.rename_page(&project, 2, "company")?;
        let outcome = hooks.on_page_save(&mut scope, &PageRef::new(&project, 2));

        assert_eq!(outcome.added, 3);
        assert_eq!(target(&manager, &project, "/about/team/jobs").as_deref(), Some("/company/team/jobs"));

        Ok(())
    }

    #[tokio::test]
    async fn test_root_and_inactive_pages_are_ignored() -> Result<()> {
        let (manager, sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let mut scope = HookScope::new();

        hooks.on_page_save_before(&mut scope, &PageRef::new(&project, 1));
        assert_eq!(scope.staged_count(), 0);

        sites.set_active(&project, 5, false)?;
        hooks.on_page_move_before(&mut scope, &PageRef::new(&project, 5));
        assert_eq!(scope.staged_count(), 0);

        let outcome = hooks.on_page_deactivate(&mut scope, &PageRef::new(&project, 5));
        assert!(outcome.proposal.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_proposes_parent() -> Result<()> {
        let (manager, _sites, project) = setup(true);
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let mut scope = HookScope::new();

        let outcome = hooks.on_page_deactivate(&mut scope, &PageRef::new(&project, 3));
        let proposal = outcome.proposal.expect("active page yields a proposal");

        assert_eq!(proposal.source_url, "/about/team");
        assert_eq!(proposal.target_url, "/about");
        assert_eq!(proposal.lang, "en");
        assert_eq!(
            proposal.children,
            vec![ChildRedirect {
                source: "/about/team/jobs".to_string(),
                target: "/about/jobs".to_string(),
            }]
        );
        assert_eq!(manager.redirect_count(None)?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_of_top_level_page_redirects_children_to_root() -> Result<()> {
        let (manager, _sites, project) = setup(true);
        let config = LifecycleConfig {
            auto_redirect_removed_pages: true,
        };
        let hooks = LifecycleHooks::new(&manager, config);
        let mut scope = HookScope::new();

        let outcome = hooks.on_page_delete(&mut scope, &PageRef::new(&project, 2));
        let proposal = outcome.proposal.clone().unwrap();

        assert_eq!(proposal.target_url, "/");
        assert_eq!(proposal.children[0].target, "/team");
        assert_eq!(outcome.added, 3);
        assert_eq!(target(&manager, &project, "/about/team/jobs").as_deref(), Some("/team/jobs"));

        Ok(())
    }

    #[tokio::test]
    async fn test_license_limit_stops_move() -> Result<()> {
        let (manager, sites, project) = setup(false);
        for i in 0..FREE_REDIRECTS - 1 {
            manager.add_redirect(&format!("/filler-{}", i), "/", &project)?;
        }

        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let page = PageRef::new(&project, 2);
        let mut scope = HookScope::new();

        hooks.on_page_move_before(&mut scope, &page);
        sites.move_page(&project, 2, 5)?;
        let outcome = hooks.on_page_move_after(&mut scope, &page);

        assert_eq!(outcome.added, 1);
        assert!(matches!(
            outcome.notices.as_slice(),
            [Notice::LicenseLimitReached { store_url: Some(_), .. }]
        ));
        // The grandchild was never reached
        assert_eq!(scope.finish(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_child_does_not_block_siblings() -> Result<()> {
        let (_, sites, project) = setup(true);
        sites.insert_page(&project, 6, 2, "careers", true)?;

        let db = RejectingDatabase {
            inner: MemoryDatabase::new(),
            rejected_source: "/about/team",
        };
        let manager = RedirectManager::new(Arc::new(db), sites.clone(), Arc::new(StaticLicense::licensed()));
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let page = PageRef::new(&project, 2);
        let mut scope = HookScope::new();

        hooks.on_page_move_before(&mut scope, &page);
        sites.move_page(&project, 2, 5)?;
        let outcome = hooks.on_page_move_after(&mut scope, &page);

        assert_eq!(outcome.added, 3);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.notices, vec![Notice::RedirectsAdded { count: 3 }]);
        assert_eq!(target(&manager, &project, "/about/team"), None);
        assert_eq!(target(&manager, &project, "/about/team/jobs").as_deref(), Some("/news/about/team/jobs"));
        assert_eq!(target(&manager, &project, "/about/careers").as_deref(), Some("/news/about/careers"));

        Ok(())
    }

    #[tokio::test]
    async fn test_dialog_flow() -> Result<()> {
        let (manager, _sites, project) = setup(true);
        let sessions = MemorySessionStore::new();
        let hooks = LifecycleHooks::new(&manager, LifecycleConfig::default());
        let mut scope = HookScope::new();

        let proposal = hooks
            .on_page_delete(&mut scope, &PageRef::new(&project, 2))
            .proposal
            .unwrap();

        let flow = DialogFlow::new(&manager, &sessions, "session-1");
        flow.begin(&proposal)?;
        assert_eq!(flow.urls_to_process()?, vec!["/about/team", "/about/team/jobs"]);

        let step = flow.process_further_urls("/about/team", Some("/x"), false, &project)?;
        assert_eq!(step.next_url.as_deref(), Some("/about/team/jobs"));
        assert_eq!(step.added, 0);

        let step = flow.process_further_urls("/about/team/jobs", Some("/news"), true, &project)?;
        assert_eq!(step.added, 1);
        assert!(flow.urls_to_process()?.is_empty());
        assert_eq!(target(&manager, &project, "/about/team/jobs").as_deref(), Some("/news"));

        // Another session has its own queue
        let other = DialogFlow::new(&manager, &sessions, "session-2");
        assert!(other.urls_to_process()?.is_empty());

        Ok(())
    }
}
