use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::behavior::behavior_for;
use crate::config::EditorConfig;
use crate::diagram::{Diagram, ElementRef};
use crate::error::{Error, Result};
use crate::history::History;
use crate::interaction::{Action, ActionContext, InteractionState, PaletteItem};
use crate::routing::{Route, route_all, route_link, route_preview};
use crate::snap::SnapTarget;

/// Where the current revision of each open diagram lives.
pub trait DiagramStore {
    fn get(&self, id: &str) -> Option<Arc<Diagram>>;
    fn set(&mut self, id: &str, diagram: Arc<Diagram>);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    diagrams: IndexMap<String, Arc<Diagram>>,
}

impl MemoryStore {
    pub fn remove(&mut self, id: &str) -> Option<Arc<Diagram>> {
        self.diagrams.shift_remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.diagrams.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.diagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagrams.is_empty()
    }
}

impl DiagramStore for MemoryStore {
    fn get(&self, id: &str) -> Option<Arc<Diagram>> {
        self.diagrams.get(id).cloned()
    }

    fn set(&mut self, id: &str, diagram: Arc<Diagram>) {
        self.diagrams.insert(id.to_string(), diagram);
    }
}

static IDLE: InteractionState = InteractionState::Idle;

/// Editing context for a set of open diagrams: their store, the shared history and
/// one interaction state per diagram.
#[derive(Debug)]
pub struct Session {
    store: MemoryStore,
    history: History,
    config: EditorConfig,
    interactions: HashMap<String, InteractionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Session {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            store: MemoryStore::default(),
            history: History::new(config.history_max_length),
            config,
            interactions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Opens a diagram after validating it. Returns its id.
    pub fn open(&mut self, diagram: Diagram) -> Result<String> {
        diagram.validate()?;
        let id = diagram.id.clone();
        info!(diagram = %id, kind = diagram.kind.as_str(), "diagram opened");
        self.store.set(&id, Arc::new(diagram));
        self.interactions.insert(id.clone(), InteractionState::Idle);
        Ok(id)
    }

    /// Closes a diagram, dropping its history. Returns the last revision.
    pub fn close(&mut self, id: &str) -> Result<Arc<Diagram>> {
        let diagram = self
            .store
            .remove(id)
            .ok_or_else(|| Error::UnknownDiagram(id.to_string()))?;
        self.history.forget(id);
        self.interactions.remove(id);
        info!(diagram = %id, "diagram closed");
        Ok(diagram)
    }

    pub fn diagram(&self, id: &str) -> Result<Arc<Diagram>> {
        self.store
            .get(id)
            .ok_or_else(|| Error::UnknownDiagram(id.to_string()))
    }

    pub fn diagram_ids(&self) -> impl Iterator<Item = &str> {
        self.store.ids()
    }

    pub fn state(&self, id: &str) -> &InteractionState {
        self.interactions.get(id).unwrap_or(&IDLE)
    }

    /// Element the link being drawn would currently attach to.
    pub fn link_target(&self, id: &str) -> Option<&SnapTarget> {
        self.state(id).link_target()
    }

    fn context<'a>(&'a mut self, id: &'a str) -> ActionContext<'a> {
        ActionContext {
            diagram_id: id,
            store: &mut self.store,
            history: &mut self.history,
            state: self.interactions.entry(id.to_string()).or_default(),
            config: &self.config,
        }
    }

    /// Feeds one pointer-level action to the diagram's behavior.
    pub fn dispatch(&mut self, id: &str, action: Action) -> Result<()> {
        let behavior = behavior_for(self.diagram(id)?.kind);
        let mut cx = self.context(id);
        behavior.handle_action(&mut cx, action)
    }

    pub fn undo(&mut self, id: &str) -> Result<bool> {
        self.diagram(id)?;
        let mut cx = self.context(id);
        cx.cancel();
        Ok(cx.history.undo(cx.diagram_id, &mut *cx.store))
    }

    pub fn redo(&mut self, id: &str) -> Result<bool> {
        self.diagram(id)?;
        let mut cx = self.context(id);
        cx.cancel();
        Ok(cx.history.redo(cx.diagram_id, &mut *cx.store))
    }

    /// Adds a palette item as a new node and returns its id.
    pub fn drop_item(&mut self, id: &str, item: PaletteItem) -> Result<String> {
        self.dispatch(id, Action::DropItem { item })?;
        self.diagram(id)?
            .focused()
            .map(|element| element.id.clone())
            .ok_or_else(|| Error::invalid("dropped node was not selected"))
    }

    /// Applies a programmatic edit as one undoable step. Any active gesture is
    /// cancelled first, and nothing is recorded when the diagram is unchanged.
    pub fn apply<T>(
        &mut self,
        id: &str,
        description: &str,
        edit: impl FnOnce(&mut Diagram) -> Result<T>,
    ) -> Result<T> {
        self.diagram(id)?;
        let mut cx = self.context(id);
        cx.cancel();
        let before = cx.diagram()?;
        let output = cx.update(|diagram| {
            let output = edit(diagram)?;
            if diagram.id != id {
                return Err(Error::invalid(format!(
                    "diagram '{id}' cannot be renamed to '{}'",
                    diagram.id
                )));
            }
            diagram.validate()?;
            Ok(output)
        })?;
        if cx.commit(description, before)? {
            debug!(diagram = %id, description, "edit applied");
        }
        Ok(output)
    }

    pub fn select(&mut self, id: &str, element: ElementRef) -> Result<()> {
        self.dispatch(
            id,
            Action::Select {
                element: Some(element),
                modifiers: Default::default(),
            },
        )
    }

    pub fn route_link(&self, id: &str, link_id: &str) -> Result<Route> {
        let diagram = self.diagram(id)?;
        route_link(&diagram, link_id, &self.config)
    }

    pub fn routes(&self, id: &str) -> Result<IndexMap<String, Route>> {
        let diagram = self.diagram(id)?;
        route_all(&diagram, &self.config)
    }

    /// Route of the link currently being drawn, if any.
    pub fn link_preview(&self, id: &str) -> Result<Option<Route>> {
        let InteractionState::Linking {
            source,
            drawing,
            target,
            ..
        } = self.state(id)
        else {
            return Ok(None);
        };
        let diagram = self.diagram(id)?;
        route_preview(&diagram, source, *drawing, target.as_ref(), &self.config).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::DiagramKind;
    use crate::geometry::{Bounds, Point};
    use crate::interaction::Phase;

    fn session_with_node() -> (Session, String, String) {
        let mut session = Session::default();
        let mut diagram = Diagram::new(DiagramKind::Flowchart, "flow");
        let node = diagram.add_node("start", "process", Bounds::new(0.0, 0.0, 100.0, 50.0));
        let id = session.open(diagram).unwrap();
        (session, id, node)
    }

    #[test]
    fn unknown_diagram_is_reported() {
        let mut session = Session::default();
        assert!(matches!(session.diagram("nope"), Err(Error::UnknownDiagram(_))));
        assert!(session.dispatch("nope", Action::Cancel).is_err());
        assert!(session.undo("nope").is_err());
    }

    #[test]
    fn invalid_diagrams_are_not_opened() {
        let mut session = Session::default();
        let mut diagram = Diagram::new(DiagramKind::Class, "broken");
        diagram.selection.push(ElementRef::node("ghost"));
        assert!(session.open(diagram).is_err());
        assert_eq!(session.diagram_ids().count(), 0);
    }

    #[test]
    fn apply_records_one_entry_per_change() {
        let (mut session, id, node) = session_with_node();
        session
            .apply(&id, "rename", |diagram| {
                diagram.node_mut(&node)?.name = "begin".to_string();
                Ok(())
            })
            .unwrap();
        session.apply(&id, "nothing", |_| Ok(())).unwrap();
        assert_eq!(session.history().descriptions().collect::<Vec<_>>(), vec!["rename"]);

        assert!(session.undo(&id).unwrap());
        assert_eq!(session.diagram(&id).unwrap().nodes[&node].name, "start");
        assert!(session.redo(&id).unwrap());
        assert_eq!(session.diagram(&id).unwrap().nodes[&node].name, "begin");
    }

    #[test]
    fn failed_edit_leaves_the_diagram_untouched() {
        let (mut session, id, _) = session_with_node();
        let before = session.diagram(&id).unwrap();
        let result = session.apply(&id, "bad", |diagram| {
            diagram.selection.push(ElementRef::node("ghost"));
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(*session.diagram(&id).unwrap(), *before);
        assert_eq!(session.history().past_len(), 0);
    }

    #[test]
    fn edits_cannot_change_the_diagram_id() {
        let (mut session, id, _) = session_with_node();
        let result = session.apply(&id, "rename", |diagram| {
            diagram.id = "other".to_string();
            Ok(())
        });
        assert!(matches!(result, Err(Error::InvalidDiagram { .. })));
        assert_eq!(session.diagram(&id).unwrap().id, id);
        assert_eq!(session.history().past_len(), 0);
    }

    #[test]
    fn dropped_item_is_placed_and_selected() {
        let (mut session, id, _) = session_with_node();
        let node = session
            .drop_item(
                &id,
                PaletteItem {
                    name: "decide".to_string(),
                    kind: "decision".to_string(),
                    position: Point::new(300.0, 200.0),
                },
            )
            .unwrap();
        let diagram = session.diagram(&id).unwrap();
        assert_eq!(diagram.nodes[&node].bounds.center(), Point::new(300.0, 200.0));
        assert_eq!(diagram.focused(), Some(&ElementRef::node(node)));
        assert!(session.history().can_undo(&id));
    }

    #[test]
    fn link_preview_follows_the_pointer() {
        let (mut session, id, node) = session_with_node();
        assert!(session.link_preview(&id).unwrap().is_none());
        session
            .dispatch(
                &id,
                Action::Link {
                    phase: Phase::Start,
                    source: ElementRef::node(node.clone()),
                    pointer: Point::new(50.0, 25.0),
                },
            )
            .unwrap();
        session
            .dispatch(
                &id,
                Action::Link {
                    phase: Phase::Move,
                    source: ElementRef::node(node),
                    pointer: Point::new(302.0, 98.0),
                },
            )
            .unwrap();

        let preview = session.link_preview(&id).unwrap().unwrap();
        assert_eq!(preview.target_point, Point::new(300.0, 100.0));
        let line_end = preview.points.last().unwrap();
        assert!(line_end.x < 300.0 && line_end.y < 100.0, "arrow tip should shorten the line");
        assert!(session.link_target(&id).is_none());
        assert_eq!(session.state(&id).name(), "linking");
    }

    #[test]
    fn close_forgets_history() {
        let (mut session, id, node) = session_with_node();
        session.select(&id, ElementRef::node(node)).unwrap();
        session.dispatch(&id, Action::Delete).unwrap();
        assert!(session.history().can_undo(&id));
        let last = session.close(&id).unwrap();
        assert!(last.nodes.is_empty());
        assert!(!session.history().can_undo(&id));
        assert!(session.diagram(&id).is_err());
    }
}
