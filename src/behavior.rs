use crate::config::EditorConfig;
use crate::diagram::{Diagram, DiagramKind, ElementKind, ElementRef, LinkStyle};
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Point};
use crate::interaction::{self, Action, ActionContext};
use crate::ports::{Alignment, alignment_towards};
use crate::routing::{RouteStyle, TipStyle};
use crate::snap::{
    SnapTarget, resolve_snap, snap_to_bounds, snap_to_elements_where, snap_to_grid,
};
use crate::{
    CLASS_NODE_HEIGHT, CLASS_NODE_WIDTH, LIFELINE_HEIGHT, LIFELINE_WIDTH, NODE_HEIGHT, NODE_WIDTH,
};

/// Editing rules of one diagram kind. Every method has a default; kinds override
/// only what differs.
pub trait DiagramBehavior: Sync {
    fn kind(&self) -> DiagramKind;

    /// Style given to links drawn by the user.
    fn link_style(&self) -> LinkStyle {
        LinkStyle {
            route: RouteStyle::Direct,
            source_tip: TipStyle::None,
            target_tip: TipStyle::Arrow,
        }
    }

    fn node_size(&self) -> (f32, f32) {
        (NODE_WIDTH, NODE_HEIGHT)
    }

    fn handle_action(&self, cx: &mut ActionContext<'_>, action: Action) -> Result<()> {
        interaction::handle_action(self, cx, action)
    }

    /// Element the free end of a link from `source` would attach to. The source
    /// element and everything on the source node are never candidates.
    fn snap_to_elements(
        &self,
        diagram: &Diagram,
        source: &ElementRef,
        pointer: Point,
        config: &EditorConfig,
    ) -> Result<Option<SnapTarget>> {
        let source_node = diagram.owning_node(source).map(str::to_owned);
        snap_to_elements_where(pointer, diagram, config.snap_tolerance, |candidate| {
            candidate != source && !belongs_to(diagram, candidate, source_node.as_deref())
        })
    }

    /// Where the free end is drawn for the current pointer.
    fn free_endpoint(
        &self,
        pointer: Point,
        target: Option<&SnapTarget>,
        config: &EditorConfig,
    ) -> Point {
        resolve_snap(pointer, target.cloned(), config.grid_size).point
    }

    /// Bounds of a node created at `position`, centered there and aligned to the grid.
    fn node_bounds(&self, position: Point, config: &EditorConfig) -> Bounds {
        let (width, height) = self.node_size();
        let origin = Point::new(position.x - width / 2.0, position.y - height / 2.0);
        Bounds::new(0.0, 0.0, width, height).with_position(snap_to_grid(origin, config.grid_size))
    }

    /// Links `source` to `target`, creating ports on nodes as needed. Returns the link id.
    fn connect_elements(
        &self,
        diagram: &mut Diagram,
        source: &ElementRef,
        target: &ElementRef,
        config: &EditorConfig,
    ) -> Result<String> {
        let source_bounds = diagram.element_bounds(source)?;
        let target_bounds = diagram.element_bounds(target)?;

        let source_port = match source.kind {
            ElementKind::Port => source.id.clone(),
            ElementKind::Node => {
                let alignment = match target.kind {
                    ElementKind::Port => diagram.port(&target.id)?.alignment.complementary(),
                    _ => alignment_towards(source_bounds, target_bounds),
                };
                diagram.add_port(&source.id, alignment, config.port_placement())?
            }
            kind => return Err(Error::invalid(format!("cannot link from a {kind}"))),
        };

        let source_alignment = diagram.port(&source_port)?.alignment;
        let target_port = match target.kind {
            ElementKind::Port => target.id.clone(),
            ElementKind::Node => diagram.add_port(
                &target.id,
                source_alignment.complementary(),
                config.port_placement(),
            )?,
            kind => return Err(Error::invalid(format!("cannot link to a {kind}"))),
        };

        diagram.add_link(&source_port, &target_port, self.link_style())
    }

    /// Creates a node at `position` and links `source` to it. Returns the node id.
    fn create_and_connect_to(
        &self,
        diagram: &mut Diagram,
        source: &ElementRef,
        name: &str,
        kind: &str,
        position: Point,
        config: &EditorConfig,
    ) -> Result<String> {
        let node_id = diagram.add_node(name, kind, self.node_bounds(position, config));
        self.connect_elements(diagram, source, &ElementRef::node(node_id.clone()), config)?;
        diagram.select_only(ElementRef::node(node_id.clone()));
        Ok(node_id)
    }
}

fn belongs_to(diagram: &Diagram, candidate: &ElementRef, node_id: Option<&str>) -> bool {
    match node_id {
        Some(node_id) => diagram.owning_node(candidate) == Some(node_id),
        None => false,
    }
}

pub struct ClassBehavior;

impl DiagramBehavior for ClassBehavior {
    fn kind(&self) -> DiagramKind {
        DiagramKind::Class
    }

    fn link_style(&self) -> LinkStyle {
        LinkStyle {
            route: RouteStyle::Direct,
            source_tip: TipStyle::None,
            target_tip: TipStyle::Triangle,
        }
    }

    fn node_size(&self) -> (f32, f32) {
        (CLASS_NODE_WIDTH, CLASS_NODE_HEIGHT)
    }
}

pub struct DeploymentBehavior;

impl DiagramBehavior for DeploymentBehavior {
    fn kind(&self) -> DiagramKind {
        DiagramKind::Deployment
    }
}

pub struct FlowchartBehavior;

impl DiagramBehavior for FlowchartBehavior {
    fn kind(&self) -> DiagramKind {
        DiagramKind::Flowchart
    }

    fn link_style(&self) -> LinkStyle {
        LinkStyle {
            route: RouteStyle::Spline,
            source_tip: TipStyle::None,
            target_tip: TipStyle::Arrow,
        }
    }
}

/// Messages run between lifelines, so only whole nodes are link targets and the
/// free end sticks to the lifeline edge.
pub struct SequenceBehavior;

impl DiagramBehavior for SequenceBehavior {
    fn kind(&self) -> DiagramKind {
        DiagramKind::Sequence
    }

    fn node_size(&self) -> (f32, f32) {
        (LIFELINE_WIDTH, LIFELINE_HEIGHT)
    }

    fn snap_to_elements(
        &self,
        diagram: &Diagram,
        source: &ElementRef,
        pointer: Point,
        config: &EditorConfig,
    ) -> Result<Option<SnapTarget>> {
        let source_node = diagram.owning_node(source).map(str::to_owned);
        snap_to_elements_where(pointer, diagram, config.snap_tolerance, |candidate| {
            candidate.kind == ElementKind::Node
                && Some(candidate.id.as_str()) != source_node.as_deref()
        })
    }

    fn free_endpoint(
        &self,
        pointer: Point,
        target: Option<&SnapTarget>,
        config: &EditorConfig,
    ) -> Point {
        match target {
            Some(target) => snap_to_bounds(pointer, target.bounds),
            None => snap_to_grid(pointer, config.grid_size),
        }
    }

    fn connect_elements(
        &self,
        diagram: &mut Diagram,
        source: &ElementRef,
        target: &ElementRef,
        config: &EditorConfig,
    ) -> Result<String> {
        let source_node = diagram
            .owning_node(source)
            .map(str::to_owned)
            .ok_or_else(|| Error::missing(source.kind, source.id.clone()))?;
        let source_bounds = diagram.node(&source_node)?.bounds;
        let target_bounds = diagram.element_bounds(target)?;
        let outgoing = if target_bounds.center().x >= source_bounds.center().x {
            Alignment::Right
        } else {
            Alignment::Left
        };

        let source_port = match source.kind {
            ElementKind::Port => source.id.clone(),
            _ => diagram.add_port(&source_node, outgoing, config.port_placement())?,
        };
        let target_port = match target.kind {
            ElementKind::Port => target.id.clone(),
            ElementKind::Node => {
                diagram.add_port(&target.id, outgoing.complementary(), config.port_placement())?
            }
            kind => return Err(Error::invalid(format!("cannot send a message to a {kind}"))),
        };
        diagram.add_link(&source_port, &target_port, self.link_style())
    }
}

static BEHAVIORS: [&dyn DiagramBehavior; 4] = [
    &ClassBehavior,
    &DeploymentBehavior,
    &FlowchartBehavior,
    &SequenceBehavior,
];

fn slot(kind: DiagramKind) -> usize {
    match kind {
        DiagramKind::Class => 0,
        DiagramKind::Deployment => 1,
        DiagramKind::Flowchart => 2,
        DiagramKind::Sequence => 3,
    }
}

pub fn behavior_for(kind: DiagramKind) -> &'static dyn DiagramBehavior {
    BEHAVIORS[slot(kind)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortPlacement;

    #[test]
    fn table_matches_every_kind() {
        for kind in [
            DiagramKind::Class,
            DiagramKind::Deployment,
            DiagramKind::Flowchart,
            DiagramKind::Sequence,
        ] {
            assert_eq!(behavior_for(kind).kind(), kind);
        }
    }

    #[test]
    fn kinds_pick_their_own_link_style() {
        assert_eq!(behavior_for(DiagramKind::Class).link_style().target_tip, TipStyle::Triangle);
        assert_eq!(behavior_for(DiagramKind::Flowchart).link_style().route, RouteStyle::Spline);
        assert_eq!(
            behavior_for(DiagramKind::Deployment).link_style(),
            behavior_for(DiagramKind::Sequence).link_style()
        );
    }

    #[test]
    fn snapping_skips_ports_of_the_source_node() {
        let config = EditorConfig::default();
        let mut diagram = Diagram::new(DiagramKind::Deployment, "snap");
        let a = diagram.add_node("a", "node", Bounds::new(0.0, 0.0, 100.0, 100.0));
        let port = diagram
            .add_port(&a, Alignment::Right, PortPlacement::centered())
            .unwrap();
        let behavior = behavior_for(DiagramKind::Deployment);

        let from_node = behavior
            .snap_to_elements(
                &diagram,
                &ElementRef::node(a.clone()),
                Point::new(100.0, 50.0),
                &config,
            )
            .unwrap();
        assert!(from_node.is_none());

        let from_port = behavior
            .snap_to_elements(&diagram, &ElementRef::port(port), Point::new(50.0, 50.0), &config)
            .unwrap();
        assert!(from_port.is_none());
    }

    #[test]
    fn sequence_snaps_to_lifelines_only() {
        let config = EditorConfig::default();
        let mut diagram = Diagram::new(DiagramKind::Sequence, "messages");
        let a = diagram.add_node("a", "lifeline", Bounds::new(0.0, 0.0, 120.0, 400.0));
        let b = diagram.add_node("b", "lifeline", Bounds::new(300.0, 0.0, 120.0, 400.0));
        diagram
            .add_port(&b, Alignment::Left, PortPlacement::centered())
            .unwrap();
        let behavior = behavior_for(DiagramKind::Sequence);

        let target = behavior
            .snap_to_elements(&diagram, &ElementRef::node(a), Point::new(300.0, 200.0), &config)
            .unwrap()
            .unwrap();
        assert_eq!(target.element, ElementRef::node(b));

        let end = behavior.free_endpoint(Point::new(333.0, 217.0), Some(&target), &config);
        assert_eq!(end, Point::new(300.0, 217.0));
    }

    #[test]
    fn sequence_messages_leave_sideways() {
        let config = EditorConfig::default();
        let mut diagram = Diagram::new(DiagramKind::Sequence, "messages");
        let a = diagram.add_node("a", "lifeline", Bounds::new(300.0, 0.0, 120.0, 400.0));
        let b = diagram.add_node("b", "lifeline", Bounds::new(0.0, 100.0, 120.0, 400.0));
        let behavior = behavior_for(DiagramKind::Sequence);

        let link = behavior
            .connect_elements(&mut diagram, &ElementRef::node(a), &ElementRef::node(b), &config)
            .unwrap();
        let link = diagram.link(&link).unwrap();
        assert_eq!(diagram.port(&link.port1).unwrap().alignment, Alignment::Left);
        assert_eq!(diagram.port(&link.port2).unwrap().alignment, Alignment::Right);
    }

    #[test]
    fn new_nodes_are_centered_on_the_grid() {
        let config = EditorConfig::default();
        let bounds = behavior_for(DiagramKind::Class).node_bounds(Point::new(203.0, 98.0), &config);
        assert_eq!(bounds, Bounds::new(120.0, 50.0, CLASS_NODE_WIDTH, CLASS_NODE_HEIGHT));
    }

    #[test]
    fn links_cannot_start_from_notes() {
        let config = EditorConfig::default();
        let mut diagram = Diagram::new(DiagramKind::Deployment, "notes");
        let note = diagram.add_note(Bounds::new(0.0, 0.0, 50.0, 50.0), "todo");
        let node = diagram.add_node("n", "node", Bounds::new(100.0, 0.0, 50.0, 50.0));
        let result = behavior_for(DiagramKind::Deployment).connect_elements(
            &mut diagram,
            &ElementRef::note(note),
            &ElementRef::node(node),
            &config,
        );
        assert!(matches!(result, Err(Error::InvalidDiagram { .. })));
    }
}
