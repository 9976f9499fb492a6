use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::geometry::{Bounds, Point};
use crate::ports::{Alignment, PortPlacement, port_bounds};
use crate::routing::{RouteStyle, TipStyle};
use crate::{MAX_VIEWPORT_SCALE, MIN_VIEWPORT_SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Port,
    Link,
    Note,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Port => "port",
            ElementKind::Link => "link",
            ElementKind::Note => "note",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub id: String,
    pub kind: ElementKind,
}

impl ElementRef {
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn node(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Node)
    }

    pub fn port(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Port)
    }

    pub fn link(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Link)
    }

    pub fn note(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Note)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Class,
    Deployment,
    Flowchart,
    Sequence,
}

impl DiagramKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Class => "class",
            DiagramKind::Deployment => "deployment",
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ColorScheme {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none() && self.stroke.is_none() && self.text.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "ColorScheme::is_empty")]
    pub color: ColorScheme,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    /// Owning node. Ownership lives in `Node::ports`; this is only a back-reference.
    pub node: String,
    pub alignment: Alignment,
    #[serde(flatten)]
    pub placement: PortPlacement,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStyle {
    #[serde(default)]
    pub route: RouteStyle,
    #[serde(default)]
    pub source_tip: TipStyle,
    #[serde(default)]
    pub target_tip: TipStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub port1: String,
    pub port2: String,
    #[serde(flatten)]
    pub style: LinkStyle,
    #[serde(default, skip_serializing_if = "ColorScheme::is_empty")]
    pub color: ColorScheme,
    /// Intermediate waypoints between the two ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub scale: f32,
    #[serde(default)]
    pub offset: Point,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Point::default(),
        }
    }
}

impl Viewport {
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_VIEWPORT_SCALE, MAX_VIEWPORT_SCALE);
    }

    /// Converts a screen-space pointer position into canvas coordinates.
    pub fn to_canvas(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.offset.x) / self.scale,
            y: (screen.y - self.offset.y) / self.scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: DiagramKind,
    #[serde(default)]
    pub nodes: IndexMap<String, Node>,
    #[serde(default)]
    pub ports: IndexMap<String, Port>,
    #[serde(default)]
    pub links: IndexMap<String, Link>,
    #[serde(default)]
    pub notes: IndexMap<String, Note>,
    /// Selected elements; the last entry is the focused one.
    #[serde(default)]
    pub selection: Vec<ElementRef>,
    #[serde(default)]
    pub viewport: Viewport,
}

pub fn new_element_id() -> String {
    Uuid::new_v4().to_string()
}

impl Diagram {
    pub fn new(kind: DiagramKind, name: impl Into<String>) -> Self {
        Self {
            id: new_element_id(),
            name: name.into(),
            kind,
            nodes: IndexMap::new(),
            ports: IndexMap::new(),
            links: IndexMap::new(),
            notes: IndexMap::new(),
            selection: Vec::new(),
            viewport: Viewport::default(),
        }
    }

    pub fn from_json(source: &str) -> Result<Self> {
        let diagram: Diagram = serde_json::from_str(source)?;
        diagram.validate()?;
        Ok(diagram)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::missing(ElementKind::Node, id))
    }

    pub fn port(&self, id: &str) -> Result<&Port> {
        self.ports
            .get(id)
            .ok_or_else(|| Error::missing(ElementKind::Port, id))
    }

    pub fn link(&self, id: &str) -> Result<&Link> {
        self.links
            .get(id)
            .ok_or_else(|| Error::missing(ElementKind::Link, id))
    }

    pub fn note(&self, id: &str) -> Result<&Note> {
        self.notes
            .get(id)
            .ok_or_else(|| Error::missing(ElementKind::Note, id))
    }

    pub fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::missing(ElementKind::Node, id))
    }

    pub fn port_mut(&mut self, id: &str) -> Result<&mut Port> {
        self.ports
            .get_mut(id)
            .ok_or_else(|| Error::missing(ElementKind::Port, id))
    }

    pub fn link_mut(&mut self, id: &str) -> Result<&mut Link> {
        self.links
            .get_mut(id)
            .ok_or_else(|| Error::missing(ElementKind::Link, id))
    }

    pub fn note_mut(&mut self, id: &str) -> Result<&mut Note> {
        self.notes
            .get_mut(id)
            .ok_or_else(|| Error::missing(ElementKind::Note, id))
    }

    pub fn contains(&self, element: &ElementRef) -> bool {
        match element.kind {
            ElementKind::Node => self.nodes.contains_key(&element.id),
            ElementKind::Port => self.ports.contains_key(&element.id),
            ElementKind::Link => self.links.contains_key(&element.id),
            ElementKind::Note => self.notes.contains_key(&element.id),
        }
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        bounds: Bounds,
    ) -> String {
        let id = new_element_id();
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                name: name.into(),
                kind: kind.into(),
                bounds,
                color: ColorScheme::default(),
                ports: Vec::new(),
            },
        );
        id
    }

    pub fn add_port(
        &mut self,
        node_id: &str,
        alignment: Alignment,
        placement: PortPlacement,
    ) -> Result<String> {
        let id = new_element_id();
        self.node_mut(node_id)?.ports.push(id.clone());
        self.ports.insert(
            id.clone(),
            Port {
                id: id.clone(),
                node: node_id.to_string(),
                alignment,
                placement,
                links: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn add_link(&mut self, port1: &str, port2: &str, style: LinkStyle) -> Result<String> {
        self.port(port1)?;
        self.port(port2)?;

        let id = new_element_id();
        self.port_mut(port1)?.links.push(id.clone());
        if port1 != port2 {
            self.port_mut(port2)?.links.push(id.clone());
        }
        self.links.insert(
            id.clone(),
            Link {
                id: id.clone(),
                port1: port1.to_string(),
                port2: port2.to_string(),
                style,
                color: ColorScheme::default(),
                points: Vec::new(),
                label: None,
            },
        );
        Ok(id)
    }

    pub fn add_note(&mut self, bounds: Bounds, text: impl Into<String>) -> String {
        let id = new_element_id();
        self.notes.insert(
            id.clone(),
            Note {
                id: id.clone(),
                bounds,
                text: text.into(),
            },
        );
        id
    }

    /// Removes an element and everything that can no longer exist without it. Returns
    /// `false` if the element was not present.
    pub fn remove_element(&mut self, element: &ElementRef) -> bool {
        match element.kind {
            ElementKind::Node => self.remove_node(&element.id),
            ElementKind::Port => self.remove_port(&element.id),
            ElementKind::Link => self.remove_link(&element.id),
            ElementKind::Note => {
                let existed = self.notes.shift_remove(&element.id).is_some();
                if existed {
                    self.prune_selection();
                }
                existed
            }
        }
    }

    pub fn remove_node(&mut self, node_id: &str) -> bool {
        let Some(node) = self.nodes.shift_remove(node_id) else {
            return false;
        };
        for port_id in &node.ports {
            self.remove_port(port_id);
        }
        self.prune_selection();
        true
    }

    pub fn remove_port(&mut self, port_id: &str) -> bool {
        let Some(port) = self.ports.shift_remove(port_id) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&port.node) {
            node.ports.retain(|id| id != port_id);
        }
        for link_id in &port.links {
            self.remove_link(link_id);
        }
        self.prune_selection();
        true
    }

    pub fn remove_link(&mut self, link_id: &str) -> bool {
        let Some(link) = self.links.shift_remove(link_id) else {
            return false;
        };
        for port_id in [&link.port1, &link.port2] {
            if let Some(port) = self.ports.get_mut(port_id) {
                port.links.retain(|id| id != link_id);
            }
        }
        self.prune_selection();
        true
    }

    fn prune_selection(&mut self) {
        let selection = std::mem::take(&mut self.selection);
        self.selection = selection
            .into_iter()
            .filter(|element| self.contains(element))
            .collect();
    }

    /// Absolute rectangle of a port, derived from its owning node.
    pub fn port_bounds_of(&self, port_id: &str) -> Result<Bounds> {
        let port = self.port(port_id)?;
        let node = self.node(&port.node)?;
        Ok(port_bounds(node.bounds, port.alignment, &port.placement))
    }

    pub fn element_bounds(&self, element: &ElementRef) -> Result<Bounds> {
        match element.kind {
            ElementKind::Node => Ok(self.node(&element.id)?.bounds),
            ElementKind::Note => Ok(self.note(&element.id)?.bounds),
            ElementKind::Port => self.port_bounds_of(&element.id),
            ElementKind::Link => {
                let link = self.link(&element.id)?;
                let a = self.port_bounds_of(&link.port1)?.center();
                let b = self.port_bounds_of(&link.port2)?.center();
                Ok(Bounds::from_corners(a, b))
            }
        }
    }

    /// Node that owns the given element, if the element is a node or a port.
    pub fn owning_node(&self, element: &ElementRef) -> Option<&str> {
        match element.kind {
            ElementKind::Node => self.nodes.get(&element.id).map(|node| node.id.as_str()),
            ElementKind::Port => self.ports.get(&element.id).map(|port| port.node.as_str()),
            ElementKind::Link | ElementKind::Note => None,
        }
    }

    pub fn is_selected(&self, element: &ElementRef) -> bool {
        self.selection.contains(element)
    }

    pub fn focused(&self) -> Option<&ElementRef> {
        self.selection.last()
    }

    pub fn select_only(&mut self, element: ElementRef) {
        self.selection.clear();
        if self.contains(&element) {
            self.selection.push(element);
        }
    }

    pub fn add_to_selection(&mut self, element: ElementRef) {
        if !self.contains(&element) {
            return;
        }
        self.selection.retain(|existing| existing != &element);
        self.selection.push(element);
    }

    pub fn toggle_selection(&mut self, element: ElementRef) {
        if self.is_selected(&element) {
            self.selection.retain(|existing| existing != &element);
        } else {
            self.add_to_selection(element);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Checks every structural invariant of the document.
    pub fn validate(&self) -> Result<()> {
        for (id, node) in &self.nodes {
            if id != &node.id {
                return Err(Error::invalid(format!(
                    "node stored under '{id}' carries id '{}'",
                    node.id
                )));
            }
            if node.bounds.width < 0.0 || node.bounds.height < 0.0 {
                return Err(Error::invalid(format!("node '{id}' has a negative size")));
            }
            for port_id in &node.ports {
                let port = self.port(port_id)?;
                if &port.node != id {
                    return Err(Error::invalid(format!(
                        "node '{id}' lists port '{port_id}' owned by '{}'",
                        port.node
                    )));
                }
            }
        }

        for (id, port) in &self.ports {
            if id != &port.id {
                return Err(Error::invalid(format!(
                    "port stored under '{id}' carries id '{}'",
                    port.id
                )));
            }
            let node = self.node(&port.node)?;
            if !node.ports.contains(id) {
                return Err(Error::invalid(format!(
                    "port '{id}' is not listed by its node '{}'",
                    port.node
                )));
            }
            for link_id in &port.links {
                self.link(link_id)?;
            }
        }

        for (id, link) in &self.links {
            if id != &link.id {
                return Err(Error::invalid(format!(
                    "link stored under '{id}' carries id '{}'",
                    link.id
                )));
            }
            for port_id in [&link.port1, &link.port2] {
                let port = self.port(port_id)?;
                if !port.links.contains(id) {
                    return Err(Error::invalid(format!(
                        "link '{id}' is not listed by its port '{port_id}'"
                    )));
                }
            }
        }

        for (id, note) in &self.notes {
            if id != &note.id {
                return Err(Error::invalid(format!(
                    "note stored under '{id}' carries id '{}'",
                    note.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for element in &self.selection {
            if !self.contains(element) {
                return Err(Error::missing(element.kind, element.id.clone()));
            }
            if !seen.insert(element) {
                return Err(Error::invalid(format!(
                    "{} '{}' is selected twice",
                    element.kind, element.id
                )));
            }
        }

        if !(MIN_VIEWPORT_SCALE..=MAX_VIEWPORT_SCALE).contains(&self.viewport.scale) {
            return Err(Error::invalid(format!(
                "viewport scale {} is outside [{MIN_VIEWPORT_SCALE}, {MAX_VIEWPORT_SCALE}]",
                self.viewport.scale
            )));
        }

        Ok(())
    }
}
