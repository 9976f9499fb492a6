use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::behavior::DiagramBehavior;
use crate::config::EditorConfig;
use crate::diagram::{Diagram, ElementKind, ElementRef};
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Point};
use crate::history::{History, HistoryOperation};
use crate::ports::relocate_on_edge;
use crate::session::DiagramStore;
use crate::snap::{SnapTarget, snap_to_grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Start,
    Move,
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
    };

    /// Whether a click should toggle membership instead of replacing the selection.
    pub fn toggles(self) -> bool {
        self.shift || self.ctrl
    }
}

/// Item dropped from the palette onto the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteItem {
    pub name: String,
    pub kind: String,
    pub position: Point,
}

/// Pointer-level input, already converted to canvas coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Select {
        element: Option<ElementRef>,
        #[serde(default)]
        modifiers: Modifiers,
    },
    SelectArea {
        phase: Phase,
        pointer: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Move {
        phase: Phase,
        element: ElementRef,
        pointer: Point,
    },
    Resize {
        phase: Phase,
        element: ElementRef,
        bounds: Bounds,
    },
    Link {
        phase: Phase,
        source: ElementRef,
        pointer: Point,
    },
    ConfirmNewElement {
        name: String,
        kind: String,
    },
    DropItem {
        item: PaletteItem,
    },
    Cancel,
    Delete,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    Selecting {
        origin: Point,
        current: Point,
        modifiers: Modifiers,
        snapshot: Arc<Diagram>,
    },
    Dragging {
        element: ElementRef,
        start_pointer: Point,
        start_position: Point,
        snapshot: Arc<Diagram>,
    },
    Resizing {
        element: ElementRef,
        start_bounds: Bounds,
        snapshot: Arc<Diagram>,
    },
    Linking {
        source: ElementRef,
        drawing: Point,
        target: Option<SnapTarget>,
        show_create_dialog: bool,
        snapshot: Arc<Diagram>,
    },
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::Selecting { .. } => "selecting",
            InteractionState::Dragging { .. } => "dragging",
            InteractionState::Resizing { .. } => "resizing",
            InteractionState::Linking { .. } => "linking",
        }
    }

    /// Diagram revision captured when the active gesture started.
    pub fn snapshot(&self) -> Option<&Arc<Diagram>> {
        match self {
            InteractionState::Selecting { snapshot, .. }
            | InteractionState::Dragging { snapshot, .. }
            | InteractionState::Resizing { snapshot, .. }
            | InteractionState::Linking { snapshot, .. } => Some(snapshot),
            InteractionState::Idle => None,
        }
    }

    pub fn link_target(&self) -> Option<&SnapTarget> {
        match self {
            InteractionState::Linking { target, .. } => target.as_ref(),
            _ => None,
        }
    }
}

/// Everything an action handler may touch, passed explicitly for one diagram.
pub struct ActionContext<'a> {
    pub diagram_id: &'a str,
    pub store: &'a mut dyn DiagramStore,
    pub history: &'a mut History,
    pub state: &'a mut InteractionState,
    pub config: &'a EditorConfig,
}

impl ActionContext<'_> {
    pub fn diagram(&self) -> Result<Arc<Diagram>> {
        self.store
            .get(self.diagram_id)
            .ok_or_else(|| Error::UnknownDiagram(self.diagram_id.to_string()))
    }

    /// Copy-on-write edit of the current revision.
    pub fn update<T>(&mut self, edit: impl FnOnce(&mut Diagram) -> Result<T>) -> Result<T> {
        let current = self.diagram()?;
        let mut next = (*current).clone();
        let output = edit(&mut next)?;
        self.store.set(self.diagram_id, Arc::new(next));
        Ok(output)
    }

    /// Records one history entry from `before` to the current revision. Nothing is
    /// recorded when the gesture left the diagram unchanged.
    pub fn commit(
        &mut self,
        description: impl Into<String>,
        before: Arc<Diagram>,
    ) -> Result<bool> {
        let after = self.diagram()?;
        if *after == *before {
            return Ok(false);
        }
        self.history.add(HistoryOperation::snapshot(
            self.diagram_id,
            description,
            before,
            after,
        ));
        Ok(true)
    }

    fn restore(&mut self, snapshot: Arc<Diagram>) {
        self.store.set(self.diagram_id, snapshot);
    }

    /// Discards the provisional mutation of the active gesture and returns to idle.
    pub fn cancel(&mut self) {
        let state = std::mem::take(self.state);
        if let Some(snapshot) = state.snapshot() {
            debug!(diagram = %self.diagram_id, gesture = state.name(), "gesture cancelled");
            self.restore(Arc::clone(snapshot));
        }
    }
}

pub fn handle_action<B: DiagramBehavior + ?Sized>(
    behavior: &B,
    cx: &mut ActionContext<'_>,
    action: Action,
) -> Result<()> {
    match action {
        Action::Select { element, modifiers } => select(cx, element, modifiers),
        Action::SelectArea {
            phase,
            pointer,
            modifiers,
        } => select_area(cx, phase, pointer, modifiers),
        Action::Move {
            phase,
            element,
            pointer,
        } => match phase {
            Phase::Start => start_move(cx, element, pointer),
            Phase::Move => drag_to(cx, &element, pointer, false),
            Phase::End => drag_to(cx, &element, pointer, true),
        },
        Action::Resize {
            phase,
            element,
            bounds,
        } => match phase {
            Phase::Start => start_resize(cx, element),
            Phase::Move => resize_to(cx, &element, bounds, false),
            Phase::End => resize_to(cx, &element, bounds, true),
        },
        Action::Link {
            phase,
            source,
            pointer,
        } => match phase {
            Phase::Start => start_link(cx, source, pointer),
            Phase::Move => link_to(behavior, cx, &source, pointer).map(|_| ()),
            Phase::End => finish_link(behavior, cx, &source, pointer),
        },
        Action::ConfirmNewElement { name, kind } => {
            confirm_new_element(behavior, cx, &name, &kind)
        }
        Action::DropItem { item } => drop_item(behavior, cx, item),
        Action::Cancel => {
            cx.cancel();
            Ok(())
        }
        Action::Delete => delete_selection(cx),
        Action::Undo => {
            cx.cancel();
            cx.history.undo(cx.diagram_id, &mut *cx.store);
            Ok(())
        }
        Action::Redo => {
            cx.cancel();
            cx.history.redo(cx.diagram_id, &mut *cx.store);
            Ok(())
        }
    }
}

fn select(
    cx: &mut ActionContext<'_>,
    element: Option<ElementRef>,
    modifiers: Modifiers,
) -> Result<()> {
    if !cx.state.is_idle() {
        trace!(gesture = cx.state.name(), "selection ignored during gesture");
        return Ok(());
    }

    cx.update(|diagram| {
        match element {
            None if !modifiers.toggles() => diagram.clear_selection(),
            None => {}
            Some(element) if !diagram.contains(&element) => {
                warn!(kind = %element.kind, id = %element.id, "cannot select missing element");
            }
            Some(element) if modifiers.toggles() => diagram.toggle_selection(element),
            Some(element) => diagram.select_only(element),
        }
        Ok(())
    })
}

fn select_area(
    cx: &mut ActionContext<'_>,
    phase: Phase,
    pointer: Point,
    modifiers: Modifiers,
) -> Result<()> {
    match phase {
        Phase::Start => {
            cx.cancel();
            let snapshot = cx.diagram()?;
            if !modifiers.toggles() {
                cx.update(|diagram| {
                    diagram.clear_selection();
                    Ok(())
                })?;
            }
            *cx.state = InteractionState::Selecting {
                origin: pointer,
                current: pointer,
                modifiers,
                snapshot,
            };
            Ok(())
        }
        Phase::Move => {
            if let InteractionState::Selecting { current, .. } = &mut *cx.state {
                *current = pointer;
            }
            Ok(())
        }
        Phase::End => {
            let InteractionState::Selecting { origin, .. } = &*cx.state else {
                return Ok(());
            };
            let origin = *origin;
            *cx.state = InteractionState::Idle;

            let area = Bounds::from_corners(origin, pointer);
            if area.width <= 0.0 && area.height <= 0.0 {
                return Ok(());
            }
            cx.update(|diagram| {
                let mut inside: Vec<ElementRef> = diagram
                    .nodes
                    .values()
                    .filter(|node| area.contains_bounds(&node.bounds))
                    .map(|node| ElementRef::node(node.id.clone()))
                    .collect();
                inside.extend(
                    diagram
                        .notes
                        .values()
                        .filter(|note| area.contains_bounds(&note.bounds))
                        .map(|note| ElementRef::note(note.id.clone())),
                );
                for element in inside {
                    diagram.add_to_selection(element);
                }
                Ok(())
            })
        }
    }
}

fn ensure_selected(cx: &mut ActionContext<'_>, element: &ElementRef) -> Result<()> {
    if cx.diagram()?.is_selected(element) {
        return Ok(());
    }
    cx.update(|diagram| {
        diagram.select_only(element.clone());
        Ok(())
    })
}

fn start_move(cx: &mut ActionContext<'_>, element: ElementRef, pointer: Point) -> Result<()> {
    cx.cancel();
    let diagram = cx.diagram()?;
    let start_position = match element.kind {
        ElementKind::Node | ElementKind::Note => diagram.element_bounds(&element)?.position(),
        ElementKind::Port => diagram.port_bounds_of(&element.id)?.center(),
        ElementKind::Link => {
            warn!(id = %element.id, "links cannot be dragged");
            return Ok(());
        }
    };

    ensure_selected(cx, &element)?;
    let snapshot = cx.diagram()?;
    debug!(kind = %element.kind, id = %element.id, "move started");
    *cx.state = InteractionState::Dragging {
        element,
        start_pointer: pointer,
        start_position,
        snapshot,
    };
    Ok(())
}

fn drag_to(
    cx: &mut ActionContext<'_>,
    element: &ElementRef,
    pointer: Point,
    finish: bool,
) -> Result<()> {
    let InteractionState::Dragging {
        element: active,
        start_pointer,
        start_position,
        snapshot,
    } = &*cx.state
    else {
        trace!(id = %element.id, "move without start ignored");
        return Ok(());
    };
    if active != element {
        trace!(id = %element.id, "move for another element ignored");
        return Ok(());
    }

    let target = start_position.plus(pointer.minus(*start_pointer));
    let snapshot = Arc::clone(snapshot);
    let grid_size = cx.config.grid_size;

    let moved = cx.update(|diagram| match element.kind {
        ElementKind::Node => {
            let node = diagram.node_mut(&element.id)?;
            node.bounds = node.bounds.with_position(snap_to_grid(target, grid_size));
            Ok(())
        }
        ElementKind::Note => {
            let note = diagram.note_mut(&element.id)?;
            note.bounds = note.bounds.with_position(snap_to_grid(target, grid_size));
            Ok(())
        }
        ElementKind::Port => {
            let node_id = diagram.port(&element.id)?.node.clone();
            let node_bounds = diagram.node(&node_id)?.bounds;
            let (alignment, ratio) = relocate_on_edge(node_bounds, target);
            let port = diagram.port_mut(&element.id)?;
            port.alignment = alignment;
            port.placement.edge_pos_ratio = ratio;
            Ok(())
        }
        ElementKind::Link => Ok(()),
    });

    if let Err(err) = moved {
        cx.cancel();
        return Err(err);
    }
    trace!(id = %element.id, x = target.x, y = target.y, "dragged");

    if finish {
        *cx.state = InteractionState::Idle;
        cx.commit(format!("move {}", element.kind), snapshot)?;
        debug!(kind = %element.kind, id = %element.id, "move finished");
    }
    Ok(())
}

fn start_resize(cx: &mut ActionContext<'_>, element: ElementRef) -> Result<()> {
    cx.cancel();
    if !matches!(element.kind, ElementKind::Node | ElementKind::Note) {
        warn!(kind = %element.kind, id = %element.id, "only nodes and notes can be resized");
        return Ok(());
    }
    let start_bounds = cx.diagram()?.element_bounds(&element)?;

    ensure_selected(cx, &element)?;
    let snapshot = cx.diagram()?;
    debug!(kind = %element.kind, id = %element.id, "resize started");
    *cx.state = InteractionState::Resizing {
        element,
        start_bounds,
        snapshot,
    };
    Ok(())
}

fn resize_to(
    cx: &mut ActionContext<'_>,
    element: &ElementRef,
    suggested: Bounds,
    finish: bool,
) -> Result<()> {
    let InteractionState::Resizing {
        element: active,
        snapshot,
        ..
    } = &*cx.state
    else {
        trace!(id = %element.id, "resize without start ignored");
        return Ok(());
    };
    if active != element {
        trace!(id = %element.id, "resize for another element ignored");
        return Ok(());
    }

    let snapshot = Arc::clone(snapshot);
    let bounds = suggested.with_min_size(cx.config.min_element_size);
    let resized = cx.update(|diagram| {
        match element.kind {
            ElementKind::Node => diagram.node_mut(&element.id)?.bounds = bounds,
            ElementKind::Note => diagram.note_mut(&element.id)?.bounds = bounds,
            ElementKind::Port | ElementKind::Link => {}
        }
        Ok(())
    });

    if let Err(err) = resized {
        cx.cancel();
        return Err(err);
    }

    if finish {
        *cx.state = InteractionState::Idle;
        cx.commit(format!("resize {}", element.kind), snapshot)?;
        debug!(kind = %element.kind, id = %element.id, "resize finished");
    }
    Ok(())
}

fn start_link(cx: &mut ActionContext<'_>, source: ElementRef, pointer: Point) -> Result<()> {
    cx.cancel();
    if !matches!(source.kind, ElementKind::Node | ElementKind::Port) {
        warn!(kind = %source.kind, id = %source.id, "links start from nodes or ports");
        return Ok(());
    }
    let snapshot = cx.diagram()?;
    if !snapshot.contains(&source) {
        return Err(Error::missing(source.kind, source.id));
    }

    debug!(kind = %source.kind, id = %source.id, "link started");
    *cx.state = InteractionState::Linking {
        source,
        drawing: pointer,
        target: None,
        show_create_dialog: false,
        snapshot,
    };
    Ok(())
}

/// Updates the free end of the link being drawn. Returns the current target.
fn link_to<B: DiagramBehavior + ?Sized>(
    behavior: &B,
    cx: &mut ActionContext<'_>,
    source: &ElementRef,
    pointer: Point,
) -> Result<Option<SnapTarget>> {
    let InteractionState::Linking {
        source: active,
        show_create_dialog: false,
        ..
    } = &*cx.state
    else {
        trace!(id = %source.id, "link move without start ignored");
        return Ok(None);
    };
    if active != source {
        return Ok(None);
    }

    let diagram = cx.diagram()?;
    let target = match behavior.snap_to_elements(&diagram, source, pointer, cx.config) {
        Ok(target) => target,
        Err(err) => {
            cx.cancel();
            return Err(err);
        }
    };
    let free_end = behavior.free_endpoint(pointer, target.as_ref(), cx.config);

    if let InteractionState::Linking {
        drawing,
        target: current,
        ..
    } = &mut *cx.state
    {
        *drawing = free_end;
        *current = target.clone();
    }
    Ok(target)
}

fn finish_link<B: DiagramBehavior + ?Sized>(
    behavior: &B,
    cx: &mut ActionContext<'_>,
    source: &ElementRef,
    pointer: Point,
) -> Result<()> {
    let snapshot = match &*cx.state {
        InteractionState::Linking {
            source: active,
            show_create_dialog: false,
            snapshot,
            ..
        } if active == source => Arc::clone(snapshot),
        _ => {
            trace!(id = %source.id, "link end without start ignored");
            return Ok(());
        }
    };

    let Some(target) = link_to(behavior, cx, source, pointer)? else {
        debug!(id = %source.id, "link released on empty canvas, asking for a new element");
        if let InteractionState::Linking {
            show_create_dialog, ..
        } = &mut *cx.state
        {
            *show_create_dialog = true;
        }
        return Ok(());
    };

    let config = cx.config;
    let connected = cx.update(|diagram| {
        behavior.connect_elements(diagram, source, &target.element, config)
    });
    match connected {
        Ok(link_id) => {
            *cx.state = InteractionState::Idle;
            cx.commit("connect elements", snapshot)?;
            debug!(link = %link_id, "link created");
            Ok(())
        }
        Err(err) => {
            cx.cancel();
            Err(err)
        }
    }
}

fn confirm_new_element<B: DiagramBehavior + ?Sized>(
    behavior: &B,
    cx: &mut ActionContext<'_>,
    name: &str,
    kind: &str,
) -> Result<()> {
    let (source, drop_position, snapshot) = match &*cx.state {
        InteractionState::Linking {
            source,
            drawing,
            show_create_dialog: true,
            snapshot,
            ..
        } => (source.clone(), *drawing, Arc::clone(snapshot)),
        _ => {
            trace!("new element confirmed without a pending link");
            return Ok(());
        }
    };

    let config = cx.config;
    let created = cx.update(|diagram| {
        behavior.create_and_connect_to(diagram, &source, name, kind, drop_position, config)
    });
    match created {
        Ok(node_id) => {
            *cx.state = InteractionState::Idle;
            cx.commit(format!("add {name}"), snapshot)?;
            debug!(node = %node_id, "element created and connected");
            Ok(())
        }
        Err(err) => {
            cx.cancel();
            Err(err)
        }
    }
}

fn drop_item<B: DiagramBehavior + ?Sized>(
    behavior: &B,
    cx: &mut ActionContext<'_>,
    item: PaletteItem,
) -> Result<()> {
    cx.cancel();
    let before = cx.diagram()?;
    let bounds = behavior.node_bounds(item.position, cx.config);
    let node_id = cx.update(|diagram| {
        let id = diagram.add_node(item.name.clone(), item.kind.clone(), bounds);
        diagram.select_only(ElementRef::node(id.clone()));
        Ok(id)
    })?;
    cx.commit(format!("add {}", item.name), before)?;
    debug!(node = %node_id, kind = %item.kind, "palette item dropped");
    Ok(())
}

fn delete_selection(cx: &mut ActionContext<'_>) -> Result<()> {
    if !cx.state.is_idle() {
        trace!(gesture = cx.state.name(), "delete ignored during gesture");
        return Ok(());
    }
    let before = cx.diagram()?;
    if before.selection.is_empty() {
        return Ok(());
    }

    let removed = cx.update(|diagram| {
        let selection = diagram.selection.clone();
        Ok(selection
            .iter()
            .filter(|element| diagram.remove_element(element))
            .count())
    })?;
    cx.commit(format!("delete {removed} elements"), before)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::behavior_for;
    use crate::diagram::DiagramKind;
    use crate::ports::{Alignment, PortPlacement};
    use crate::session::MemoryStore;

    struct Harness {
        store: MemoryStore,
        history: History,
        state: InteractionState,
        config: EditorConfig,
        id: String,
    }

    impl Harness {
        fn new(diagram: Diagram) -> Self {
            let id = diagram.id.clone();
            let mut store = MemoryStore::default();
            store.set(&id, Arc::new(diagram));
            Self {
                store,
                history: History::default(),
                state: InteractionState::Idle,
                config: EditorConfig::default(),
                id,
            }
        }

        fn act(&mut self, action: Action) -> Result<()> {
            let diagram = self.store.get(&self.id).unwrap();
            let behavior = behavior_for(diagram.kind);
            let mut cx = ActionContext {
                diagram_id: &self.id,
                store: &mut self.store,
                history: &mut self.history,
                state: &mut self.state,
                config: &self.config,
            };
            behavior.handle_action(&mut cx, action)
        }

        fn diagram(&self) -> Arc<Diagram> {
            self.store.get(&self.id).unwrap()
        }
    }

    fn two_nodes() -> (Harness, String, String) {
        let mut diagram = Diagram::new(DiagramKind::Deployment, "gestures");
        let a = diagram.add_node("A", "node", Bounds::new(0.0, 0.0, 100.0, 60.0));
        let b = diagram.add_node("B", "node", Bounds::new(300.0, 0.0, 100.0, 60.0));
        (Harness::new(diagram), a, b)
    }

    fn mv(phase: Phase, id: &str, x: f32, y: f32) -> Action {
        Action::Move {
            phase,
            element: ElementRef::node(id),
            pointer: Point::new(x, y),
        }
    }

    #[test]
    fn drag_is_coalesced_into_one_history_entry() {
        let (mut h, a, _) = two_nodes();
        h.act(mv(Phase::Start, &a, 50.0, 30.0)).unwrap();
        for step in 1..=7 {
            h.act(mv(Phase::Move, &a, 50.0 + step as f32 * 6.0, 30.0)).unwrap();
            assert_eq!(h.history.past_len(), 0);
        }
        h.act(mv(Phase::End, &a, 93.0, 52.0)).unwrap();

        assert_eq!(h.history.past_len(), 1);
        assert!(h.state.is_idle());
        assert_eq!(h.diagram().nodes[&a].bounds.position(), Point::new(40.0, 20.0));
    }

    #[test]
    fn move_writes_snapped_positions_immediately() {
        let (mut h, a, _) = two_nodes();
        h.act(mv(Phase::Start, &a, 10.0, 10.0)).unwrap();
        assert!(h.diagram().is_selected(&ElementRef::node(a.clone())));
        h.act(mv(Phase::Move, &a, 24.0, 37.0)).unwrap();
        assert_eq!(h.diagram().nodes[&a].bounds.position(), Point::new(10.0, 30.0));
    }

    #[test]
    fn stray_move_and_end_are_ignored() {
        let (mut h, a, _) = two_nodes();
        let before = h.diagram();
        h.act(mv(Phase::Move, &a, 200.0, 200.0)).unwrap();
        h.act(mv(Phase::End, &a, 200.0, 200.0)).unwrap();
        assert_eq!(*h.diagram(), *before);
        assert_eq!(h.history.past_len(), 0);
    }

    #[test]
    fn click_without_movement_records_nothing() {
        let (mut h, a, _) = two_nodes();
        h.act(mv(Phase::Start, &a, 10.0, 10.0)).unwrap();
        h.act(mv(Phase::End, &a, 10.0, 10.0)).unwrap();
        assert_eq!(h.history.past_len(), 0);
        assert_eq!(h.diagram().focused(), Some(&ElementRef::node(a)));
    }

    #[test]
    fn cancel_restores_the_pre_gesture_snapshot() {
        let (mut h, a, _) = two_nodes();
        h.act(mv(Phase::Start, &a, 0.0, 0.0)).unwrap();
        let snapshot = h.diagram();
        h.act(mv(Phase::Move, &a, 120.0, 80.0)).unwrap();
        assert_ne!(*h.diagram(), *snapshot);
        h.act(Action::Cancel).unwrap();
        assert_eq!(*h.diagram(), *snapshot);
        assert!(h.state.is_idle());
        assert_eq!(h.history.past_len(), 0);
    }

    #[test]
    fn resize_is_clamped_to_the_minimum_size() {
        let (mut h, a, _) = two_nodes();
        let element = ElementRef::node(a.clone());
        let resize = |phase, bounds| Action::Resize {
            phase,
            element: element.clone(),
            bounds,
        };
        h.act(resize(Phase::Start, Bounds::default())).unwrap();
        h.act(resize(Phase::Move, Bounds::new(0.0, 0.0, 4.0, 200.0))).unwrap();
        h.act(resize(Phase::End, Bounds::new(0.0, 0.0, 3.0, -5.0))).unwrap();

        assert_eq!(h.diagram().nodes[&a].bounds, Bounds::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(h.history.past_len(), 1);
    }

    #[test]
    fn selection_replaces_toggles_and_clears() {
        let (mut h, a, b) = two_nodes();
        let select = |id: Option<&str>, modifiers| Action::Select {
            element: id.map(ElementRef::node),
            modifiers,
        };
        h.act(select(Some(a.as_str()), Modifiers::NONE)).unwrap();
        h.act(select(Some(b.as_str()), Modifiers::SHIFT)).unwrap();
        assert_eq!(h.diagram().selection.len(), 2);
        assert_eq!(h.diagram().focused(), Some(&ElementRef::node(b.clone())));

        h.act(select(Some(a.as_str()), Modifiers { shift: false, ctrl: true })).unwrap();
        assert_eq!(h.diagram().selection, vec![ElementRef::node(b.clone())]);

        h.act(select(Some(a.as_str()), Modifiers::NONE)).unwrap();
        assert_eq!(h.diagram().selection, vec![ElementRef::node(a.clone())]);

        h.act(select(None, Modifiers::NONE)).unwrap();
        assert!(h.diagram().selection.is_empty());
        assert_eq!(h.history.past_len(), 0);
    }

    #[test]
    fn rubber_band_selects_enclosed_nodes() {
        let (mut h, a, _) = two_nodes();
        let area = |phase, x, y| Action::SelectArea {
            phase,
            pointer: Point::new(x, y),
            modifiers: Modifiers::NONE,
        };
        h.act(area(Phase::Start, -10.0, -10.0)).unwrap();
        h.act(area(Phase::Move, 80.0, 40.0)).unwrap();
        assert!(matches!(h.state, InteractionState::Selecting { .. }));
        h.act(area(Phase::End, 150.0, 100.0)).unwrap();
        assert_eq!(h.diagram().selection, vec![ElementRef::node(a)]);
        assert!(h.state.is_idle());
    }

    #[test]
    fn cancelled_rubber_band_keeps_the_previous_selection() {
        let (mut h, a, _) = two_nodes();
        h.act(Action::Select {
            element: Some(ElementRef::node(a.clone())),
            modifiers: Modifiers::NONE,
        })
        .unwrap();
        let selected = h.diagram();

        h.act(Action::SelectArea {
            phase: Phase::Start,
            pointer: Point::new(300.0, 300.0),
            modifiers: Modifiers::NONE,
        })
        .unwrap();
        assert!(h.diagram().selection.is_empty());
        h.act(Action::Cancel).unwrap();

        assert_eq!(*h.diagram(), *selected);
        assert_eq!(h.diagram().selection, vec![ElementRef::node(a)]);
        assert!(h.state.is_idle());
        assert_eq!(h.history.past_len(), 0);
    }

    fn link(phase: Phase, source: &ElementRef, x: f32, y: f32) -> Action {
        Action::Link {
            phase,
            source: source.clone(),
            pointer: Point::new(x, y),
        }
    }

    #[test]
    fn linking_two_nodes_creates_complementary_ports() {
        let (mut h, a, b) = two_nodes();
        let source = ElementRef::node(a.clone());
        h.act(link(Phase::Start, &source, 50.0, 30.0)).unwrap();
        h.act(link(Phase::Move, &source, 200.0, 30.0)).unwrap();
        assert!(h.state.link_target().is_none());
        h.act(link(Phase::Move, &source, 320.0, 30.0)).unwrap();
        assert_eq!(
            h.state.link_target().map(|t| t.element.clone()),
            Some(ElementRef::node(b.clone()))
        );
        h.act(link(Phase::End, &source, 320.0, 30.0)).unwrap();

        let diagram = h.diagram();
        assert_eq!(diagram.links.len(), 1);
        let created = diagram.links.values().next().unwrap();
        let port1 = &diagram.ports[&created.port1];
        let port2 = &diagram.ports[&created.port2];
        assert_eq!((port1.node.as_str(), port1.alignment), (a.as_str(), Alignment::Right));
        assert_eq!((port2.node.as_str(), port2.alignment), (b.as_str(), Alignment::Left));
        assert_eq!(port1.placement.edge_pos_ratio, 50.0);
        assert_eq!(h.history.past_len(), 1);
        diagram.validate().unwrap();
    }

    #[test]
    fn stray_resize_link_and_confirm_events_are_ignored() {
        let (mut h, a, _) = two_nodes();
        let before = h.diagram();
        let element = ElementRef::node(a.clone());
        for phase in [Phase::Move, Phase::End] {
            h.act(Action::Resize {
                phase,
                element: element.clone(),
                bounds: Bounds::new(0.0, 0.0, 400.0, 400.0),
            })
            .unwrap();
            h.act(link(phase, &element, 320.0, 30.0)).unwrap();
        }
        h.act(Action::ConfirmNewElement {
            name: "orphan".to_string(),
            kind: "node".to_string(),
        })
        .unwrap();

        assert_eq!(*h.diagram(), *before);
        assert!(h.state.is_idle());
        assert_eq!(h.history.past_len(), 0);
    }

    #[test]
    fn confirm_is_ignored_while_the_link_is_still_being_drawn() {
        let (mut h, a, _) = two_nodes();
        let source = ElementRef::node(a);
        h.act(link(Phase::Start, &source, 50.0, 30.0)).unwrap();
        let before = h.diagram();
        h.act(Action::ConfirmNewElement {
            name: "early".to_string(),
            kind: "node".to_string(),
        })
        .unwrap();

        assert_eq!(*h.diagram(), *before);
        assert_eq!(h.state.name(), "linking");
        assert_eq!(h.history.past_len(), 0);
    }

    #[test]
    fn failed_link_snap_returns_to_idle() {
        let mut diagram = Diagram::new(DiagramKind::Deployment, "dangling");
        let a = diagram.add_node("A", "node", Bounds::new(0.0, 0.0, 100.0, 60.0));
        let b = diagram.add_node("B", "node", Bounds::new(300.0, 0.0, 100.0, 60.0));
        diagram
            .add_port(&b, Alignment::Left, PortPlacement::centered())
            .unwrap();
        let mut h = Harness::new(diagram);
        let source = ElementRef::node(a);
        h.act(link(Phase::Start, &source, 50.0, 30.0)).unwrap();
        let snapshot = h.diagram();

        let mut broken = (*snapshot).clone();
        broken.nodes.shift_remove(&b);
        h.store.set(&h.id, Arc::new(broken));

        assert!(h.act(link(Phase::Move, &source, 200.0, 30.0)).is_err());
        assert!(h.state.is_idle());
        assert_eq!(*h.diagram(), *snapshot);
    }

    #[test]
    fn sequence_messages_connect_lifeline_sides() {
        use crate::session::Session;

        let mut session = Session::default();
        let mut diagram = Diagram::new(DiagramKind::Sequence, "messages");
        let a = diagram.add_node("client", "lifeline", Bounds::new(0.0, 0.0, 120.0, 400.0));
        let b = diagram.add_node("server", "lifeline", Bounds::new(300.0, 0.0, 120.0, 400.0));
        let id = session.open(diagram).unwrap();
        let source = ElementRef::node(a.clone());

        session.dispatch(&id, link(Phase::Start, &source, 60.0, 100.0)).unwrap();
        session.dispatch(&id, link(Phase::Move, &source, 305.0, 150.0)).unwrap();
        assert_eq!(
            session.link_target(&id).map(|target| target.element.clone()),
            Some(ElementRef::node(b.clone()))
        );
        assert!(matches!(
            session.state(&id),
            InteractionState::Linking { drawing, .. } if *drawing == Point::new(300.0, 150.0)
        ));
        session.dispatch(&id, link(Phase::End, &source, 305.0, 150.0)).unwrap();

        let diagram = session.diagram(&id).unwrap();
        let message = diagram.links.values().next().unwrap();
        let from = &diagram.ports[&message.port1];
        let to = &diagram.ports[&message.port2];
        assert_eq!((from.node.as_str(), from.alignment), (a.as_str(), Alignment::Right));
        assert_eq!((to.node.as_str(), to.alignment), (b.as_str(), Alignment::Left));
        assert!(session.state(&id).is_idle());
        assert_eq!(session.history().descriptions().collect::<Vec<_>>(), vec!["connect elements"]);
    }

    #[test]
    fn link_cannot_target_its_own_node() {
        let (mut h, a, _) = two_nodes();
        let source = ElementRef::node(a);
        h.act(link(Phase::Start, &source, 50.0, 30.0)).unwrap();
        h.act(link(Phase::Move, &source, 60.0, 30.0)).unwrap();
        assert!(h.state.link_target().is_none());
    }

    #[test]
    fn releasing_on_canvas_asks_for_a_new_element() {
        let (mut h, a, _) = two_nodes();
        let source = ElementRef::node(a.clone());
        h.act(link(Phase::Start, &source, 50.0, 30.0)).unwrap();
        h.act(link(Phase::End, &source, 163.0, 304.0)).unwrap();
        assert!(matches!(
            &h.state,
            InteractionState::Linking {
                show_create_dialog: true,
                drawing,
                ..
            } if *drawing == Point::new(160.0, 300.0)
        ));

        h.act(Action::ConfirmNewElement {
            name: "cache".to_string(),
            kind: "node".to_string(),
        })
        .unwrap();

        let diagram = h.diagram();
        assert_eq!(diagram.nodes.len(), 3);
        let created = diagram.nodes.values().find(|n| n.name == "cache").unwrap();
        assert_eq!(created.bounds.center(), Point::new(160.0, 300.0));
        assert_eq!(created.ports.len(), 1);
        assert_eq!(diagram.links.len(), 1);
        assert_eq!(h.history.past_len(), 1);
        assert!(h.state.is_idle());
    }

    #[test]
    fn dismissing_the_new_element_dialog_discards_the_link() {
        let (mut h, a, _) = two_nodes();
        let before = h.diagram();
        let source = ElementRef::node(a);
        h.act(link(Phase::Start, &source, 50.0, 30.0)).unwrap();
        h.act(link(Phase::End, &source, 150.0, 300.0)).unwrap();
        h.act(Action::Cancel).unwrap();

        assert_eq!(*h.diagram(), *before);
        assert!(h.state.is_idle());
        assert_eq!(h.history.past_len(), 0);
    }

    #[test]
    fn link_to_existing_port_reuses_it() {
        let mut diagram = Diagram::new(DiagramKind::Class, "ports");
        let a = diagram.add_node("A", "class", Bounds::new(0.0, 0.0, 100.0, 100.0));
        let b = diagram.add_node("B", "class", Bounds::new(300.0, 0.0, 100.0, 100.0));
        let port_b = diagram
            .add_port(&b, Alignment::Top, PortPlacement::centered())
            .unwrap();
        let mut h = Harness::new(diagram);

        let source = ElementRef::node(a);
        h.act(link(Phase::Start, &source, 50.0, 50.0)).unwrap();
        h.act(link(Phase::End, &source, 350.0, 0.0)).unwrap();

        let diagram = h.diagram();
        let created = diagram.links.values().next().unwrap();
        assert_eq!(created.port2, port_b);
        assert_eq!(diagram.ports[&created.port1].alignment, Alignment::Bottom);
        assert_eq!(diagram.ports.len(), 2);
    }

    #[test]
    fn dragging_a_port_slides_it_along_the_edge() {
        let mut diagram = Diagram::new(DiagramKind::Deployment, "ports");
        let a = diagram.add_node("A", "node", Bounds::new(0.0, 0.0, 100.0, 100.0));
        let port = diagram
            .add_port(&a, Alignment::Right, PortPlacement::centered())
            .unwrap();
        let mut h = Harness::new(diagram);
        let element = ElementRef::port(port.clone());
        let drag = |phase, x, y| Action::Move {
            phase,
            element: element.clone(),
            pointer: Point::new(x, y),
        };

        h.act(drag(Phase::Start, 100.0, 50.0)).unwrap();
        h.act(drag(Phase::End, 25.0, -2.0)).unwrap();

        let moved = &h.diagram().ports[&port];
        assert_eq!(moved.alignment, Alignment::Top);
        assert_eq!(moved.placement.edge_pos_ratio, 25.0);
        assert_eq!(h.history.past_len(), 1);
    }

    #[test]
    fn delete_removes_selection_as_one_entry_and_undo_restores_it() {
        let (mut h, a, b) = two_nodes();
        let original = h.diagram();
        h.act(Action::Select {
            element: Some(ElementRef::node(a.clone())),
            modifiers: Modifiers::NONE,
        })
        .unwrap();
        h.act(Action::Select {
            element: Some(ElementRef::node(b.clone())),
            modifiers: Modifiers::SHIFT,
        })
        .unwrap();
        let selected = h.diagram();
        h.act(Action::Delete).unwrap();
        assert!(h.diagram().nodes.is_empty());
        assert_eq!(h.history.past_len(), 1);

        h.act(Action::Undo).unwrap();
        assert_eq!(*h.diagram(), *selected);
        assert_eq!(h.diagram().nodes, original.nodes);
        h.act(Action::Redo).unwrap();
        assert!(h.diagram().nodes.is_empty());
    }

    #[test]
    fn new_gesture_cancels_the_active_one() {
        let (mut h, a, b) = two_nodes();
        h.act(mv(Phase::Start, &a, 0.0, 0.0)).unwrap();
        h.act(mv(Phase::Move, &a, 100.0, 100.0)).unwrap();
        h.act(mv(Phase::Start, &b, 300.0, 0.0)).unwrap();
        assert_eq!(h.diagram().nodes[&a].bounds.position(), Point::new(0.0, 0.0));
        assert!(matches!(&h.state, InteractionState::Dragging { element, .. } if element.id == b));
    }
}
