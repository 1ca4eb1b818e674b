//! Breadcrumb trails: named, ordered lists of code locations.
//!
//! The store keeps trails in creation order and hands out owned copies, so
//! nothing outside can mutate its state except through these operations.
//! Every mutation emits one [`BreadcrumbEvent::Changed`] on the broadcast
//! channel; persistence listens there.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::types::breadcrumb::{BreadcrumbState, Crumb, Trail};
use crate::types::ids::generate_id;
use crate::types::range::TextRange;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreadcrumbEvent {
    Changed,
}

#[derive(Debug, Clone)]
pub struct CreateTrailOptions {
    pub description: Option<String>,
    pub set_active: bool,
}

impl Default for CreateTrailOptions {
    fn default() -> Self {
        Self {
            description: None,
            set_active: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateCrumbOptions {
    pub note: Option<String>,
    pub tag: Option<String>,
}

pub struct BreadcrumbStore {
    /// Creation order; deleting the active trail promotes the first survivor
    trails: Vec<Trail>,
    active_trail_id: Option<String>,
    events: broadcast::Sender<BreadcrumbEvent>,
}

impl Default for BreadcrumbStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BreadcrumbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreadcrumbStore")
            .field("trails", &self.trails.len())
            .field("active_trail_id", &self.active_trail_id)
            .finish()
    }
}

impl BreadcrumbStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            trails: Vec::new(),
            active_trail_id: None,
            events,
        }
    }

    pub fn from_state(state: BreadcrumbState) -> Self {
        let mut store = Self::new();
        store.trails = state.trails;
        store.active_trail_id = state.active_trail_id;
        store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BreadcrumbEvent> {
        self.events.subscribe()
    }

    fn changed(&self) {
        // no receivers is fine
        let _ = self.events.send(BreadcrumbEvent::Changed);
    }

    fn trail_mut(&mut self, trail_id: &str) -> Option<&mut Trail> {
        self.trails.iter_mut().find(|t| t.id == trail_id)
    }

    pub fn state(&self) -> BreadcrumbState {
        BreadcrumbState {
            active_trail_id: self.active_trail_id.clone(),
            trails: self.trails.clone(),
        }
    }

    pub fn replace_state(&mut self, state: BreadcrumbState) {
        self.trails = state.trails;
        self.active_trail_id = state.active_trail_id;
        self.changed();
    }

    /// All trails, most recently updated first
    pub fn get_trails(&self) -> Vec<Trail> {
        let mut trails = self.trails.clone();
        trails.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        trails
    }

    pub fn get_trail(&self, trail_id: &str) -> Option<Trail> {
        self.trails.iter().find(|t| t.id == trail_id).cloned()
    }

    pub fn get_active_trail(&self) -> Option<Trail> {
        self.get_trail(self.active_trail_id.as_deref()?)
    }

    pub fn active_trail_id(&self) -> Option<&str> {
        self.active_trail_id.as_deref()
    }

    /// Accepts any id, including `None` to clear the selection
    pub fn set_active_trail(&mut self, trail_id: Option<String>) {
        self.active_trail_id = trail_id;
        self.changed();
    }

    pub fn create_trail(&mut self, name: &str, options: CreateTrailOptions) -> Trail {
        let now = Utc::now();
        let trail = Trail {
            id: generate_id(),
            name: name.to_string(),
            description: options.description,
            created_at: now,
            updated_at: now,
            crumbs: Vec::new(),
        };
        if options.set_active {
            self.active_trail_id = Some(trail.id.clone());
        }
        self.trails.push(trail.clone());
        self.changed();
        trail
    }

    /// Set name and description together; `None` clears the description
    pub fn rename_trail(&mut self, trail_id: &str, name: &str, description: Option<String>) -> bool {
        let Some(trail) = self.trail_mut(trail_id) else {
            return false;
        };
        trail.name = name.to_string();
        trail.description = description;
        trail.updated_at = Utc::now();
        self.changed();
        true
    }

    pub fn delete_trail(&mut self, trail_id: &str) -> bool {
        let Some(idx) = self.trails.iter().position(|t| t.id == trail_id) else {
            return false;
        };
        self.trails.remove(idx);
        if self.active_trail_id.as_deref() == Some(trail_id) {
            self.active_trail_id = self.trails.first().map(|t| t.id.clone());
        }
        self.changed();
        true
    }

    /// Append a crumb at the end of the trail
    pub fn add_crumb(
        &mut self,
        trail_id: &str,
        uri: PathBuf,
        range: TextRange,
        snippet: &str,
        options: CreateCrumbOptions,
    ) -> Option<Crumb> {
        let trail = self.trail_mut(trail_id)?;
        let now = Utc::now();
        let crumb = Crumb {
            id: generate_id(),
            trail_id: trail_id.to_string(),
            uri,
            range,
            snippet: snippet.to_string(),
            note: options.note,
            tag: options.tag,
            created_at: now,
        };
        trail.crumbs.push(crumb.clone());
        trail.updated_at = now;
        self.changed();
        Some(crumb)
    }

    pub fn update_crumb_note(&mut self, trail_id: &str, crumb_id: &str, note: Option<String>) -> bool {
        let Some(trail) = self.trail_mut(trail_id) else {
            return false;
        };
        let Some(crumb) = trail.crumbs.iter_mut().find(|c| c.id == crumb_id) else {
            return false;
        };
        crumb.note = note;
        trail.updated_at = Utc::now();
        self.changed();
        true
    }

    pub fn remove_crumb(&mut self, trail_id: &str, crumb_id: &str) -> bool {
        let Some(trail) = self.trail_mut(trail_id) else {
            return false;
        };
        let before = trail.crumbs.len();
        trail.crumbs.retain(|c| c.id != crumb_id);
        if trail.crumbs.len() == before {
            return false;
        }
        trail.updated_at = Utc::now();
        self.changed();
        true
    }

    /// Move a crumb to `new_index`, clamped to the end of the trail
    pub fn move_crumb(&mut self, trail_id: &str, crumb_id: &str, new_index: usize) -> bool {
        let Some(trail) = self.trail_mut(trail_id) else {
            return false;
        };
        let Some(from) = trail.crumbs.iter().position(|c| c.id == crumb_id) else {
            return false;
        };
        let crumb = trail.crumbs.remove(from);
        let to = new_index.min(trail.crumbs.len());
        trail.crumbs.insert(to, crumb);
        trail.updated_at = Utc::now();
        self.changed();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crumb(store: &mut BreadcrumbStore, trail: &str, line: u32) -> Crumb {
        store
            .add_crumb(
                trail,
                PathBuf::from("/work/src/main.rs"),
                TextRange::lines(line, line),
                &format!("line {}", line),
                CreateCrumbOptions::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_crumbs_keep_call_order() {
        let mut store = BreadcrumbStore::new();
        let t = store.create_trail("flow", CreateTrailOptions::default());
        let a = crumb(&mut store, &t.id, 1);
        let b = crumb(&mut store, &t.id, 7);
        let c = crumb(&mut store, &t.id, 3);
        let ids: Vec<_> = store
            .get_trail(&t.id)
            .unwrap()
            .crumbs
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_delete_active_trail_promotes_first_remaining() {
        let mut store = BreadcrumbStore::new();
        let a = store.create_trail("a", CreateTrailOptions::default());
        let b = store.create_trail("b", CreateTrailOptions::default());
        assert_eq!(store.active_trail_id(), Some(b.id.as_str()));

        assert!(store.delete_trail(&b.id));
        assert_eq!(store.active_trail_id(), Some(a.id.as_str()));

        assert!(store.delete_trail(&a.id));
        assert_eq!(store.active_trail_id(), None);
        assert!(!store.delete_trail(&a.id));
    }

    #[test]
    fn test_delete_inactive_trail_keeps_selection() {
        let mut store = BreadcrumbStore::new();
        let a = store.create_trail("a", CreateTrailOptions::default());
        let b = store.create_trail(
            "b",
            CreateTrailOptions {
                set_active: false,
                ..Default::default()
            },
        );
        store.delete_trail(&b.id);
        assert_eq!(store.active_trail_id(), Some(a.id.as_str()));
    }

    #[test]
    fn test_add_crumb_to_unknown_trail() {
        let mut store = BreadcrumbStore::new();
        assert!(crumb_opt(&mut store, "nope").is_none());
    }

    fn crumb_opt(store: &mut BreadcrumbStore, trail: &str) -> Option<Crumb> {
        store.add_crumb(
            trail,
            PathBuf::from("/x"),
            TextRange::lines(0, 0),
            "x",
            CreateCrumbOptions::default(),
        )
    }

    #[test]
    fn test_move_and_note_update() {
        let mut store = BreadcrumbStore::new();
        let t = store.create_trail("flow", CreateTrailOptions::default());
        let a = crumb(&mut store, &t.id, 1);
        let b = crumb(&mut store, &t.id, 2);
        let c = crumb(&mut store, &t.id, 3);

        assert!(store.move_crumb(&t.id, &c.id, 0));
        assert!(store.move_crumb(&t.id, &a.id, 99));
        assert!(store.update_crumb_note(&t.id, &b.id, Some("sink".into())));
        let trail = store.get_trail(&t.id).unwrap();
        let ids: Vec<_> = trail.crumbs.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![c.id, b.id.clone(), a.id]);
        assert_eq!(trail.crumbs[1].note.as_deref(), Some("sink"));
        assert!(trail.updated_at >= t.updated_at);

        assert!(store.remove_crumb(&t.id, &b.id));
        assert!(!store.remove_crumb(&t.id, &b.id));
    }

    #[test]
    fn test_trails_sorted_by_update_and_copies_are_detached() {
        let mut store = BreadcrumbStore::new();
        let a = store.create_trail("a", CreateTrailOptions::default());
        let _b = store.create_trail("b", CreateTrailOptions::default());
        std::thread::sleep(std::time::Duration::from_millis(5));
        crumb(&mut store, &a.id, 1);
        assert_eq!(store.get_trails()[0].id, a.id);

        let mut copy = store.get_trail(&a.id).unwrap();
        copy.crumbs.clear();
        copy.name = "changed".into();
        assert_eq!(store.get_trail(&a.id).unwrap().crumbs.len(), 1);
        assert_eq!(store.get_trail(&a.id).unwrap().name, "a");
    }

    #[test]
    fn test_every_mutation_emits_change() {
        let mut store = BreadcrumbStore::new();
        let mut rx = store.subscribe();
        let t = store.create_trail("a", CreateTrailOptions::default());
        store.rename_trail(&t.id, "renamed", Some("desc".into()));
        store.set_active_trail(None);
        store.replace_state(BreadcrumbState::default());
        let mut n = 0;
        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev, BreadcrumbEvent::Changed);
            n += 1;
        }
        assert_eq!(n, 4);
        // lookup misses change nothing
        assert!(!store.rename_trail("missing", "x", None));
        assert!(rx.try_recv().is_err());
    }
}
