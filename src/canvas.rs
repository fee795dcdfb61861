//! Canvas interaction state machine.
//!
//! Headless port of the annotation canvas: it owns the shape collection
//! and the in-progress shape, interprets press/move/release gestures in
//! image coordinates, and reports what happened as [`CanvasEvent`]s for
//! the shell to act on (label dialog, repaint, scrollbars). The
//! screen-to-image transform, cursors, and painting all live outside.

use std::collections::HashSet;

use crate::geometry::{Point, Rect};
use crate::shape::{HighlightMode, Shape, ShapeKind};
use crate::store::{ShapeId, ShapeStore};
use crate::style::ShapeStyle;

/// Hit radius for vertex and close-snap tests, in image pixels at 1x zoom.
pub const EPSILON: f32 = 11.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasMode {
    /// Selecting and editing existing shapes.
    Edit,
    /// Drawing a new shape of the active kind.
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Modifier keys relevant to the interaction model.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// What a gesture handler did; the shell reacts (dialog, dirty flag,
/// scrollbars) without inspecting canvas internals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasEvent {
    /// A shape was finalized and stored. The shell prompts for a label and
    /// either calls [`Canvas::set_last_label`] or [`Canvas::reject_last_shape`].
    NewShape(ShapeId),
    SelectionChanged(bool),
    ShapeMoved,
    /// Drawing started (`true`) or ended/aborted (`false`).
    Drawing(bool),
    /// Pan gesture delta for the scroll area.
    Scroll(f32, f32),
}

/// The interaction state machine.
pub struct Canvas {
    mode: CanvasMode,
    create_mode: ShapeKind,
    store: ShapeStore,
    current: Option<Shape>,
    /// Guide segment from the anchor to the (clamped/snapped) cursor.
    line: [Point; 2],
    prev_point: Option<Point>,
    prev_move_point: Point,
    /// Top-left and bottom-right offsets of the dragged shape's bounding
    /// box relative to the grab point.
    offsets: (Point, Point),
    image_size: (f32, f32),
    scale: f32,
    epsilon: f32,
    h_shape: Option<ShapeId>,
    h_vertex: Option<usize>,
    h_edge: Option<usize>,
    prev_h_shape: Option<ShapeId>,
    prev_h_vertex: Option<usize>,
    prev_h_edge: Option<usize>,
    selected: Option<ShapeId>,
    hidden: HashSet<ShapeId>,
    moving_shape: bool,
    left_down: bool,
    snapping: bool,
    draw_square: bool,
    draw_double: bool,
    pan_start: Option<Point>,
    style: ShapeStyle,
}

impl Canvas {
    pub fn new(style: ShapeStyle) -> Self {
        Self {
            mode: CanvasMode::Edit,
            create_mode: ShapeKind::Rectangle,
            store: ShapeStore::new(),
            current: None,
            line: [Point::ZERO, Point::ZERO],
            prev_point: None,
            prev_move_point: Point::ZERO,
            offsets: (Point::ZERO, Point::ZERO),
            image_size: (0.0, 0.0),
            scale: 1.0,
            epsilon: EPSILON,
            h_shape: None,
            h_vertex: None,
            h_edge: None,
            prev_h_shape: None,
            prev_h_vertex: None,
            prev_h_edge: None,
            selected: None,
            hidden: HashSet::new(),
            moving_shape: false,
            left_down: false,
            snapping: true,
            draw_square: false,
            draw_double: true,
            pan_start: None,
            style,
        }
    }

    // ------------------------------------------------------------------
    // Mode and configuration
    // ------------------------------------------------------------------

    pub fn drawing(&self) -> bool {
        self.mode == CanvasMode::Create
    }

    pub fn editing(&self) -> bool {
        self.mode == CanvasMode::Edit
    }

    pub fn set_editing(&mut self, editing: bool) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        self.mode = if editing {
            CanvasMode::Edit
        } else {
            CanvasMode::Create
        };
        if !editing {
            self.un_highlight();
            self.deselect(&mut events);
        }
        self.prev_point = None;
        events
    }

    pub fn create_mode(&self) -> ShapeKind {
        self.create_mode
    }

    pub fn set_create_mode(&mut self, kind: ShapeKind) {
        self.create_mode = kind;
    }

    /// Constrain rectangle drawing and vertex drags to squares.
    pub fn set_draw_square(&mut self, on: bool) {
        self.draw_square = on;
    }

    /// Choose between two-press (`true`) and press-drag-release (`false`)
    /// completion for rectangles, circles and lines.
    pub fn set_draw_double(&mut self, on: bool) {
        self.draw_double = on;
    }

    /// Snapping on: polygon close-to-first attraction, edge drags off.
    /// Held Ctrl turns it off.
    pub fn set_snapping(&mut self, on: bool) {
        self.snapping = on;
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    /// Load a new image: prior shapes belong to the previous one.
    pub fn load_image(&mut self, width: f32, height: f32) {
        self.image_size = (width, height);
        self.store.clear();
        self.current = None;
        self.selected = None;
        self.hidden.clear();
        self.un_highlight();
    }

    /// Replace the shape collection (e.g. from a loaded annotation file).
    pub fn load_shapes(&mut self, shapes: impl IntoIterator<Item = Shape>) -> Vec<ShapeId> {
        self.store.clear();
        self.current = None;
        self.h_shape = None;
        self.h_vertex = None;
        self.h_edge = None;
        shapes.into_iter().map(|s| self.store.insert(s)).collect()
    }

    pub fn shapes(&self) -> &ShapeStore {
        &self.store
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeStore {
        &mut self.store
    }

    pub fn current_shape(&self) -> Option<&Shape> {
        self.current.as_ref()
    }

    pub fn selected_id(&self) -> Option<ShapeId> {
        self.selected
    }

    pub fn set_shape_visible(&mut self, id: ShapeId, visible: bool) {
        if visible {
            self.hidden.remove(&id);
        } else {
            self.hidden.insert(id);
        }
    }

    pub fn is_visible(&self, id: ShapeId) -> bool {
        !self.hidden.contains(&id)
    }

    // ------------------------------------------------------------------
    // Gesture handlers
    // ------------------------------------------------------------------

    pub fn mouse_press(
        &mut self,
        pos: Point,
        button: MouseButton,
        mods: Modifiers,
    ) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        match button {
            MouseButton::Left => {
                self.left_down = true;
                if self.drawing() {
                    self.press_while_drawing(pos, mods, &mut events);
                } else {
                    self.press_while_editing(pos, mods, &mut events);
                }
            }
            MouseButton::Right => {
                if self.editing() {
                    self.select_shape_at(pos, &mut events);
                    self.prev_point = Some(pos);
                }
            }
        }
        events
    }

    fn press_while_drawing(&mut self, pos: Point, mods: Modifiers, events: &mut Vec<CanvasEvent>) {
        let guide = self.line;
        if let Some(current) = self.current.as_mut() {
            match self.create_mode {
                ShapeKind::Polygon => {
                    current.add_point(guide[1]);
                    if let Some(&last) = current.points.last() {
                        self.line[0] = last;
                    }
                    if current.is_closed() {
                        self.finalise(events);
                    }
                }
                ShapeKind::Rectangle => self.handle_drawing(pos, events),
                ShapeKind::Circle | ShapeKind::Line => {
                    current.points = guide.to_vec();
                    self.finalise(events);
                }
                ShapeKind::LineStrip => {
                    current.add_point(guide[1]);
                    if let Some(&last) = current.points.last() {
                        self.line[0] = last;
                    }
                    if mods.ctrl && current.points.len() >= ShapeKind::LineStrip.min_points() {
                        self.finalise(events);
                    }
                }
                ShapeKind::Point => {}
            }
        } else if !self.out_of_image(pos) {
            let mut shape = Shape::new(self.create_mode);
            shape.add_point(pos);
            self.current = Some(shape);
            if self.create_mode == ShapeKind::Point {
                self.finalise(events);
            } else {
                self.line = [pos, pos];
                events.push(CanvasEvent::Drawing(true));
            }
        }
    }

    fn press_while_editing(&mut self, pos: Point, mods: Modifiers, events: &mut Vec<CanvasEvent>) {
        if self.h_edge.is_some() {
            let kind = self.h_shape.and_then(|id| self.store.get(id)).map(|s| s.kind);
            if matches!(kind, Some(ShapeKind::Polygon | ShapeKind::LineStrip)) {
                self.add_point_to_edge();
            }
        } else if self.h_vertex.is_some() && mods.shift {
            self.remove_selected_point();
        }
        let selection = self.select_shape_at(pos, events);
        self.prev_point = Some(pos);
        if selection.is_none() {
            self.pan_start = Some(pos);
        }
    }

    pub fn mouse_move(&mut self, pos: Point, _mods: Modifiers) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        self.prev_move_point = pos;

        if self.drawing() {
            self.move_while_drawing(pos);
            return events;
        }

        if self.left_down {
            if self.h_vertex.is_some() {
                self.bounded_move_vertex(pos);
                self.moving_shape = true;
            } else if self.h_edge.is_some() && !self.snapping {
                self.bounded_move_edge(pos);
                self.moving_shape = true;
                self.prev_point = Some(pos);
                if let Some(id) = self.h_shape {
                    self.calculate_offsets(id, pos);
                }
            } else if let Some(id) = self.selected
                && self.prev_point.is_some()
            {
                self.bounded_move_shape(id, pos);
                self.moving_shape = true;
            } else if let Some(start) = self.pan_start {
                events.push(CanvasEvent::Scroll(pos.x - start.x, pos.y - start.y));
            }
            return events;
        }

        self.hover(pos);
        events
    }

    fn move_while_drawing(&mut self, pos: Point) {
        let Some(current) = self.current.as_mut() else {
            self.prev_point = Some(pos);
            return;
        };

        let mut pos = pos;
        if pos.x < 0.0 || pos.x > self.image_size.0 || pos.y < 0.0 || pos.y > self.image_size.1 {
            pos = Point::new(
                pos.x.clamp(0.0, self.image_size.0),
                pos.y.clamp(0.0, self.image_size.1),
            );
            current.highlight_clear();
        } else if self.snapping
            && current.points.len() > 1
            && self.create_mode == ShapeKind::Polygon
            && pos.distance_to(current.points[0]) < self.epsilon
        {
            // Attract the guide to the starting point so a click closes.
            pos = current.points[0];
            current.highlight_vertex(0, HighlightMode::NearVertex);
        } else {
            current.highlight_clear();
        }

        let (Some(&first), Some(&last)) = (current.points.first(), current.points.last()) else {
            return;
        };
        self.line = match self.create_mode {
            ShapeKind::Polygon | ShapeKind::LineStrip => [last, pos],
            ShapeKind::Rectangle if self.draw_square => {
                [first, square_corner_from(first, pos)]
            }
            ShapeKind::Rectangle | ShapeKind::Circle | ShapeKind::Line => [first, pos],
            ShapeKind::Point => [first, first],
        };
        self.prev_point = None;
    }

    pub fn mouse_release(&mut self, pos: Point, button: MouseButton) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        if button == MouseButton::Left {
            self.left_down = false;
            if self.selected.is_none() && self.drawing() && !self.draw_double {
                match self.create_mode {
                    ShapeKind::Rectangle => self.handle_drawing(pos, &mut events),
                    ShapeKind::Circle | ShapeKind::Line => {
                        if self.current.as_ref().is_some_and(|c| c.points.len() == 1) {
                            let line = self.line;
                            if let Some(current) = self.current.as_mut() {
                                current.points = line.to_vec();
                            }
                            self.finalise(&mut events);
                        }
                    }
                    _ => {}
                }
            }
            self.pan_start = None;
            if self.moving_shape {
                events.push(CanvasEvent::ShapeMoved);
                self.moving_shape = false;
            }
        }
        events
    }

    /// Force-close the in-progress polygon/linestrip. The preceding press
    /// added a duplicate point under the cursor; drop it first.
    pub fn double_click(&mut self) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        if self.can_close_shape() && self.current.as_ref().is_some_and(|c| c.points.len() > 3) {
            if let Some(current) = self.current.as_mut() {
                current.pop_point();
            }
            self.finalise(&mut events);
        }
        events
    }

    /// Escape: discard the in-progress shape without emitting it.
    pub fn cancel_drawing(&mut self) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        if self.current.take().is_some() {
            log::debug!("drawing cancelled");
            events.push(CanvasEvent::Drawing(false));
        }
        events
    }

    /// Return key: close the in-progress shape if it has enough points.
    pub fn finish_drawing(&mut self) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        if self.can_close_shape() {
            self.finalise(&mut events);
        }
        events
    }

    fn can_close_shape(&self) -> bool {
        self.drawing() && self.current.as_ref().is_some_and(|c| c.points.len() > 2)
    }

    /// Nudge the selected shape one pixel, unless that would push any of
    /// its points outside the image.
    pub fn move_one_pixel(&mut self, direction: Direction) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        let Some(id) = self.selected else {
            return events;
        };
        let step = match direction {
            Direction::Left => Point::new(-1.0, 0.0),
            Direction::Right => Point::new(1.0, 0.0),
            Direction::Up => Point::new(0.0, -1.0),
            Direction::Down => Point::new(0.0, 1.0),
        };
        let bounds = self.image_size;
        let out = self
            .store
            .get(id)
            .is_none_or(|s| s.points.iter().any(|&p| self.out_of_image(p + step)));
        if !out
            && let Some(shape) = self.store.get_mut(id)
        {
            shape.move_by(step, bounds);
            events.push(CanvasEvent::ShapeMoved);
        }
        events
    }

    // ------------------------------------------------------------------
    // Finalization and the label-dialog handshake
    // ------------------------------------------------------------------

    fn finalise(&mut self, events: &mut Vec<CanvasEvent>) {
        let Some(mut current) = self.current.take() else {
            return;
        };
        // A shape whose first and last point coincide collapsed to nothing.
        if current.kind != ShapeKind::Point
            && current.points.first() == current.points.last()
            && current.points.len() < current.kind.min_points()
        {
            events.push(CanvasEvent::Drawing(false));
            return;
        }
        current.close();
        if !current.is_closed() {
            events.push(CanvasEvent::Drawing(false));
            return;
        }
        let id = self.store.insert(current);
        log::debug!("shape finalized: {:?}", id);
        events.push(CanvasEvent::Drawing(false));
        events.push(CanvasEvent::NewShape(id));
    }

    /// Complete the [`CanvasEvent::NewShape`] handshake with the label the
    /// user chose.
    pub fn set_last_label(
        &mut self,
        label: impl Into<String>,
        group_id: Option<u32>,
    ) -> Option<ShapeId> {
        let id = self.store.last_id()?;
        let shape = self.store.get_mut(id)?;
        shape.label = label.into();
        shape.group_id = group_id;
        Some(id)
    }

    /// Veto path of the handshake: the label dialog was cancelled, drop the
    /// shape that was just finalized.
    pub fn reject_last_shape(&mut self) -> Option<Shape> {
        self.store.pop()
    }

    /// Reopen the last committed shape for further editing.
    pub fn undo_last_line(&mut self) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        if let Some(mut shape) = self.store.pop() {
            shape.set_open();
            if let (Some(&last), Some(&first)) = (shape.points.last(), shape.points.first()) {
                self.line = [last, first];
            }
            self.current = Some(shape);
            events.push(CanvasEvent::Drawing(true));
        }
        events
    }

    /// Discard the last committed shape entirely.
    pub fn reset_all_lines(&mut self) -> Vec<CanvasEvent> {
        let mut events = Vec::new();
        if self.store.pop().is_some() {
            self.current = None;
            events.push(CanvasEvent::Drawing(false));
        }
        events
    }

    // ------------------------------------------------------------------
    // Selection and hover
    // ------------------------------------------------------------------

    /// Shape ids in hit-test priority order: descending by bounding-box
    /// origin, so a shape nested inside a larger one (greater origin) is
    /// reachable. This mirrors the original editor's behavior and is kept
    /// deliberately, z-order notwithstanding.
    fn hover_order(&self) -> Vec<ShapeId> {
        let mut order: Vec<(ShapeId, Rect)> = self
            .store
            .iter()
            .filter(|(id, _)| self.is_visible(*id))
            .filter_map(|(id, s)| s.bounding_rect().map(|r| (id, r)))
            .collect();
        order.sort_by(|(_, a), (_, b)| {
            b.x.total_cmp(&a.x).then_with(|| b.y.total_cmp(&a.y))
        });
        order.into_iter().map(|(id, _)| id).collect()
    }

    fn hover(&mut self, pos: Point) {
        let edge_epsilon = self.epsilon / self.scale;
        for id in self.hover_order() {
            let Some(shape) = self.store.get(id) else {
                continue;
            };
            let vertex = shape.nearest_vertex(pos, self.epsilon);
            let edge = if shape.kind.has_edges() {
                shape.nearest_edge(pos, edge_epsilon)
            } else {
                None
            };

            if let Some(index) = vertex {
                self.clear_hover_highlight();
                self.prev_h_vertex = Some(index);
                self.h_vertex = Some(index);
                self.prev_h_shape = Some(id);
                self.h_shape = Some(id);
                self.prev_h_edge = self.h_edge;
                self.h_edge = None;
                if let Some(shape) = self.store.get_mut(id) {
                    shape.highlight_vertex(index, HighlightMode::MoveVertex);
                }
                return;
            } else if edge.is_some() {
                self.clear_hover_highlight();
                self.prev_h_vertex = self.h_vertex;
                self.h_vertex = None;
                self.prev_h_shape = Some(id);
                self.h_shape = Some(id);
                self.prev_h_edge = edge;
                self.h_edge = edge;
                return;
            } else if shape.contains_point(pos) {
                self.prev_h_vertex = self.h_vertex;
                self.h_vertex = None;
                self.prev_h_shape = Some(id);
                self.h_shape = Some(id);
                self.prev_h_edge = self.h_edge;
                self.h_edge = None;
                return;
            }
        }
        self.un_highlight();
    }

    fn clear_hover_highlight(&mut self) {
        if let Some(id) = self.h_shape
            && let Some(shape) = self.store.get_mut(id)
        {
            shape.highlight_clear();
        }
    }

    fn un_highlight(&mut self) {
        self.clear_hover_highlight();
        self.prev_h_shape = self.h_shape;
        self.prev_h_vertex = self.h_vertex;
        self.prev_h_edge = self.h_edge;
        self.h_shape = None;
        self.h_vertex = None;
        self.h_edge = None;
    }

    pub fn hovered_shape(&self) -> Option<ShapeId> {
        self.h_shape
    }

    pub fn hovered_vertex(&self) -> Option<usize> {
        self.h_vertex
    }

    pub fn hovered_edge(&self) -> Option<usize> {
        self.h_edge
    }

    /// Select the hovered vertex/edge's shape, or the topmost (by hover
    /// order) shape containing `pos`.
    pub fn select_shape_at(
        &mut self,
        pos: Point,
        events: &mut Vec<CanvasEvent>,
    ) -> Option<ShapeId> {
        self.deselect(events);
        if let Some(index) = self.h_vertex
            && let Some(id) = self.h_shape
        {
            if let Some(shape) = self.store.get_mut(id) {
                shape.highlight_vertex(index, HighlightMode::MoveVertex);
            }
            self.select_shape(id, events);
            return Some(id);
        }
        if self.h_edge.is_some()
            && let Some(id) = self.h_shape
        {
            self.select_shape(id, events);
            self.calculate_offsets(id, pos);
            return Some(id);
        }
        for id in self.hover_order() {
            if self
                .store
                .get(id)
                .is_some_and(|shape| shape.contains_point(pos))
            {
                self.select_shape(id, events);
                self.calculate_offsets(id, pos);
                return Some(id);
            }
        }
        None
    }

    fn select_shape(&mut self, id: ShapeId, events: &mut Vec<CanvasEvent>) {
        self.deselect(events);
        if let Some(shape) = self.store.get_mut(id) {
            shape.selected = true;
            self.selected = Some(id);
            events.push(CanvasEvent::SelectionChanged(true));
        }
    }

    pub fn deselect(&mut self, events: &mut Vec<CanvasEvent>) {
        if let Some(id) = self.selected.take() {
            if let Some(shape) = self.store.get_mut(id) {
                shape.selected = false;
            }
            events.push(CanvasEvent::SelectionChanged(false));
        }
    }

    /// Delete the selected shape and return it.
    pub fn delete_selected(&mut self) -> Option<Shape> {
        let id = self.selected.take()?;
        self.h_shape = None;
        self.h_vertex = None;
        self.h_edge = None;
        self.store.remove(id)
    }

    /// Clone the selected shape and nudge the copy a couple of pixels so
    /// it is visibly distinct; the copy becomes the selection.
    pub fn duplicate_selected(&mut self, events: &mut Vec<CanvasEvent>) -> Option<ShapeId> {
        let id = self.selected?;
        let copy = self.store.get(id)?.duplicate();
        self.deselect(events);
        let new_id = self.store.insert(copy);
        self.select_shape(new_id, events);

        let anchor = self.store.get(new_id)?.points.first().copied()?;
        let offset = Point::new(2.0, 2.0);
        self.calculate_offsets(new_id, anchor);
        self.prev_point = Some(anchor);
        if !self.bounded_move_shape(new_id, anchor - offset) {
            self.bounded_move_shape(new_id, anchor + offset);
        }
        Some(new_id)
    }

    fn calculate_offsets(&mut self, id: ShapeId, point: Point) {
        if let Some(rect) = self.store.get(id).and_then(|s| s.bounding_rect()) {
            self.offsets = (
                Point::new(rect.x - point.x, rect.y - point.y),
                Point::new(rect.right() - point.x, rect.bottom() - point.y),
            );
        }
    }

    // ------------------------------------------------------------------
    // Bounded drag operations
    // ------------------------------------------------------------------

    fn clamp_to_image(&self, pos: Point) -> Point {
        Point::new(
            pos.x.clamp(0.0, self.image_size.0),
            pos.y.clamp(0.0, self.image_size.1),
        )
    }

    fn out_of_image(&self, p: Point) -> bool {
        !(0.0 <= p.x && p.x <= self.image_size.0 && 0.0 <= p.y && p.y <= self.image_size.1)
    }

    fn bounded_move_vertex(&mut self, pos: Point) {
        let (Some(index), Some(id)) = (self.h_vertex, self.h_shape) else {
            return;
        };
        let pos = self.clamp_to_image(pos);
        let draw_square = self.draw_square;
        let Some(shape) = self.store.get_mut(id) else {
            return;
        };
        let Some(&point) = shape.points.get(index) else {
            return;
        };
        let shift = if draw_square && shape.kind == ShapeKind::Rectangle {
            let opposite = shape.points[(index + 2) % 4];
            square_corner_from(opposite, pos) - point
        } else {
            pos - point
        };
        shape.move_vertex_by(index, shift);
    }

    fn bounded_move_edge(&mut self, pos: Point) {
        let (Some(index), Some(id)) = (self.h_edge, self.h_shape) else {
            return;
        };
        let pos = self.clamp_to_image(pos);
        if self.draw_square {
            return;
        }
        let Some(shape) = self.store.get_mut(id) else {
            return;
        };
        if shape.kind != ShapeKind::Rectangle || shape.points.len() != 4 {
            return;
        }
        // First endpoint of edge `index`; the parity-axis shift propagates
        // to the second endpoint through the rectangle adjacency rule.
        let endpoint = (index + 3) % 4;
        let p1 = shape.points[endpoint];
        let shift = if index % 2 == 0 {
            Point::new(pos.x - p1.x, 0.0)
        } else {
            Point::new(0.0, pos.y - p1.y)
        };
        shape.move_vertex_by(endpoint, shift);
    }

    fn bounded_move_shape(&mut self, id: ShapeId, pos: Point) -> bool {
        let (width, height) = self.image_size;
        let kind = match self.store.get(id) {
            Some(shape) => shape.kind,
            None => return false,
        };
        let mut pos = pos;
        if kind != ShapeKind::Circle {
            if self.out_of_image(pos) {
                return false;
            }
            // Keep the dragged bounding box inside the image by adjusting
            // the target, not rejecting the move.
            let o1 = pos + self.offsets.0;
            if self.out_of_image(o1) {
                pos = pos - Point::new(o1.x.min(0.0), o1.y.min(0.0));
            }
            let o2 = pos + self.offsets.1;
            if self.out_of_image(o2) {
                pos = pos + Point::new((width - o2.x).min(0.0), (height - o2.y).min(0.0));
            }
        }
        let Some(prev) = self.prev_point else {
            return false;
        };
        let delta = pos - prev;
        if delta == Point::ZERO {
            return false;
        }
        if let Some(shape) = self.store.get_mut(id) {
            shape.move_by(delta, (width, height));
        }
        self.prev_point = Some(pos);
        true
    }

    // ------------------------------------------------------------------
    // Vertex insertion/removal on hovered edges
    // ------------------------------------------------------------------

    fn add_point_to_edge(&mut self) {
        let (Some(id), Some(index)) = (self.prev_h_shape, self.prev_h_edge) else {
            return;
        };
        let point = self.prev_move_point;
        if let Some(shape) = self.store.get_mut(id) {
            shape.insert_point(index, point);
            shape.highlight_vertex(index, HighlightMode::MoveVertex);
            self.h_shape = Some(id);
            self.h_vertex = Some(index);
            self.h_edge = None;
            self.moving_shape = true;
        }
    }

    fn remove_selected_point(&mut self) {
        let (Some(id), Some(index)) = (self.prev_h_shape, self.prev_h_vertex) else {
            return;
        };
        if let Some(shape) = self.store.get_mut(id) {
            shape.remove_point(index);
            shape.highlight_clear();
            self.h_shape = Some(id);
            self.prev_h_vertex = None;
            self.moving_shape = true;
        }
    }

    /// Two-press rectangle flow: the first press anchors a corner, the
    /// second materializes the remaining three from the guide segment.
    fn handle_drawing(&mut self, pos: Point, events: &mut Vec<CanvasEvent>) {
        let target = self.line[1];
        if let Some(current) = self.current.as_mut() {
            if let Some(&init) = current.points.first()
                && !current.reach_max_points()
            {
                current.add_point(Point::new(target.x, init.y));
                current.add_point(target);
                current.add_point(Point::new(init.x, target.y));
                self.finalise(events);
            }
        } else if !self.out_of_image(pos) {
            let mut shape = Shape::new(self.create_mode);
            shape.add_point(pos);
            self.current = Some(shape);
            self.line = [pos, pos];
            events.push(CanvasEvent::Drawing(true));
        }
    }
}

/// The corner of a square anchored at `origin`, sized by the smaller of
/// the cursor's two axis deltas, signed toward the cursor.
fn square_corner_from(origin: Point, pos: Point) -> Point {
    let size = (pos.x - origin.x).abs().min((pos.y - origin.y).abs());
    let dir_x = if pos.x - origin.x < 0.0 { -1.0 } else { 1.0 };
    let dir_y = if pos.y - origin.y < 0.0 { -1.0 } else { 1.0 };
    Point::new(origin.x + dir_x * size, origin.y + dir_y * size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: f32, height: f32) -> Canvas {
        let mut canvas = Canvas::new(ShapeStyle::default());
        canvas.load_image(width, height);
        canvas
    }

    fn press(canvas: &mut Canvas, x: f32, y: f32) -> Vec<CanvasEvent> {
        canvas.mouse_press(Point::new(x, y), MouseButton::Left, Modifiers::default())
    }

    fn hover_move(canvas: &mut Canvas, x: f32, y: f32) -> Vec<CanvasEvent> {
        canvas.mouse_move(Point::new(x, y), Modifiers::default())
    }

    fn new_shape_id(events: &[CanvasEvent]) -> Option<ShapeId> {
        events.iter().find_map(|e| match e {
            CanvasEvent::NewShape(id) => Some(*id),
            _ => None,
        })
    }

    fn draw_rectangle(canvas: &mut Canvas, x1: f32, y1: f32, x2: f32, y2: f32) -> ShapeId {
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Rectangle);
        press(canvas, x1, y1);
        canvas.mouse_release(Point::new(x1, y1), MouseButton::Left);
        hover_move(canvas, x2, y2);
        let events = press(canvas, x2, y2);
        canvas.mouse_release(Point::new(x2, y2), MouseButton::Left);
        let id = new_shape_id(&events).expect("rectangle should finalize");
        canvas.set_last_label("object", None);
        id
    }

    #[test]
    fn test_two_press_rectangle() {
        let mut canvas = canvas(100.0, 100.0);
        let id = draw_rectangle(&mut canvas, 10.0, 10.0, 50.0, 40.0);
        let shape = canvas.shapes().get(id).unwrap();
        assert!(shape.is_closed());
        assert_eq!(
            shape.points,
            vec![
                Point::new(10.0, 10.0),
                Point::new(50.0, 10.0),
                Point::new(50.0, 40.0),
                Point::new(10.0, 40.0),
            ]
        );
    }

    #[test]
    fn test_square_mode_draws_square() {
        let mut canvas = canvas(200.0, 200.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Rectangle);
        canvas.set_draw_square(true);
        press(&mut canvas, 10.0, 10.0);
        hover_move(&mut canvas, 90.0, 50.0);
        let events = press(&mut canvas, 90.0, 50.0);
        let id = new_shape_id(&events).unwrap();
        let rect = canvas.shapes().get(id).unwrap().bounding_rect().unwrap();
        assert_eq!(rect.width, rect.height);
        assert_eq!(rect.width, 40.0);
    }

    #[test]
    fn test_square_mode_sign_follows_cursor() {
        let mut canvas = canvas(200.0, 200.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Rectangle);
        canvas.set_draw_square(true);
        press(&mut canvas, 100.0, 100.0);
        hover_move(&mut canvas, 40.0, 70.0);
        let events = press(&mut canvas, 40.0, 70.0);
        let id = new_shape_id(&events).unwrap();
        let rect = canvas.shapes().get(id).unwrap().bounding_rect().unwrap();
        assert_eq!((rect.width, rect.height), (30.0, 30.0));
        assert_eq!((rect.x, rect.y), (70.0, 70.0));
    }

    #[test]
    fn test_degenerate_rectangle_aborted() {
        let mut canvas = canvas(100.0, 100.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Rectangle);
        press(&mut canvas, 10.0, 10.0);
        // No movement: second press collapses to the anchor
        let events = press(&mut canvas, 10.0, 10.0);
        assert!(new_shape_id(&events).is_none());
        assert!(canvas.current_shape().is_none());
        assert!(canvas.shapes().is_empty());
    }

    #[test]
    fn test_point_finalizes_on_first_press() {
        let mut canvas = canvas(100.0, 100.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Point);
        let events = press(&mut canvas, 30.0, 40.0);
        let id = new_shape_id(&events).unwrap();
        assert_eq!(canvas.shapes().get(id).unwrap().points.len(), 1);
    }

    #[test]
    fn test_circle_two_press() {
        let mut canvas = canvas(100.0, 100.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Circle);
        press(&mut canvas, 50.0, 50.0);
        hover_move(&mut canvas, 60.0, 50.0);
        let events = press(&mut canvas, 60.0, 50.0);
        let id = new_shape_id(&events).unwrap();
        let shape = canvas.shapes().get(id).unwrap();
        assert_eq!(shape.points.len(), 2);
        assert!(shape.contains_point(Point::new(45.0, 50.0)));
    }

    #[test]
    fn test_polygon_snap_closes_on_first_point() {
        let mut canvas = canvas(100.0, 100.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Polygon);
        press(&mut canvas, 0.0, 0.0);
        hover_move(&mut canvas, 30.0, 0.0);
        press(&mut canvas, 30.0, 0.0);
        hover_move(&mut canvas, 30.0, 30.0);
        press(&mut canvas, 30.0, 30.0);
        // Click within the snap radius of the start point
        hover_move(&mut canvas, 3.0, 2.0);
        let events = press(&mut canvas, 3.0, 2.0);
        let id = new_shape_id(&events).expect("polygon should close");
        let shape = canvas.shapes().get(id).unwrap();
        assert!(shape.is_closed());
        assert_eq!(shape.points.len(), 3);
    }

    #[test]
    fn test_cancel_discards_current() {
        let mut canvas = canvas(100.0, 100.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Polygon);
        press(&mut canvas, 10.0, 10.0);
        assert!(canvas.current_shape().is_some());
        let events = canvas.cancel_drawing();
        assert_eq!(events, vec![CanvasEvent::Drawing(false)]);
        assert!(canvas.current_shape().is_none());
        assert!(canvas.shapes().is_empty());
    }

    #[test]
    fn test_reject_last_shape_veto() {
        let mut canvas = canvas(100.0, 100.0);
        draw_rectangle(&mut canvas, 10.0, 10.0, 40.0, 40.0);
        assert_eq!(canvas.shapes().len(), 1);
        assert!(canvas.reject_last_shape().is_some());
        assert!(canvas.shapes().is_empty());
    }

    #[test]
    fn test_press_outside_image_does_not_draw() {
        let mut canvas = canvas(100.0, 100.0);
        canvas.set_editing(false);
        canvas.set_create_mode(ShapeKind::Rectangle);
        let events = press(&mut canvas, 150.0, 50.0);
        assert!(events.is_empty());
        assert!(canvas.current_shape().is_none());
    }

    #[test]
    fn test_hover_prefers_nested_shape_with_greater_origin() {
        let mut canvas = canvas(200.0, 200.0);
        let outer = draw_rectangle(&mut canvas, 10.0, 10.0, 150.0, 150.0);
        let inner = draw_rectangle(&mut canvas, 50.0, 50.0, 100.0, 100.0);
        canvas.set_editing(true);
        hover_move(&mut canvas, 75.0, 75.0);
        assert_eq!(canvas.hovered_shape(), Some(inner));
        // A point inside only the outer shape still hits it
        hover_move(&mut canvas, 20.0, 20.0);
        assert_ne!(canvas.hovered_shape(), Some(inner));
        assert_eq!(canvas.hovered_shape(), Some(outer));
    }

    #[test]
    fn test_hover_priority_vertex_over_edge_over_area() {
        let mut canvas = canvas(200.0, 200.0);
        draw_rectangle(&mut canvas, 50.0, 50.0, 100.0, 100.0);
        canvas.set_editing(true);
        hover_move(&mut canvas, 51.0, 51.0);
        assert_eq!(canvas.hovered_vertex(), Some(0));
        hover_move(&mut canvas, 75.0, 49.0);
        assert!(canvas.hovered_vertex().is_none());
        assert!(canvas.hovered_edge().is_some());
        hover_move(&mut canvas, 75.0, 75.0);
        assert!(canvas.hovered_vertex().is_none());
        assert!(canvas.hovered_edge().is_none());
        assert!(canvas.hovered_shape().is_some());
    }

    #[test]
    fn test_vertex_drag_keeps_rectangle() {
        let mut canvas = canvas(200.0, 200.0);
        let id = draw_rectangle(&mut canvas, 50.0, 50.0, 100.0, 100.0);
        canvas.set_editing(true);
        hover_move(&mut canvas, 50.0, 50.0);
        assert_eq!(canvas.hovered_vertex(), Some(0));
        press(&mut canvas, 50.0, 50.0);
        hover_move(&mut canvas, 40.0, 60.0);
        let events = canvas.mouse_release(Point::new(40.0, 60.0), MouseButton::Left);
        assert!(events.contains(&CanvasEvent::ShapeMoved));
        let shape = canvas.shapes().get(id).unwrap();
        assert_eq!(shape.points[0], Point::new(40.0, 60.0));
        assert_eq!(shape.points[2], Point::new(100.0, 100.0));
        assert_eq!(shape.points[1], Point::new(100.0, 60.0));
        assert_eq!(shape.points[3], Point::new(40.0, 100.0));
    }

    #[test]
    fn test_edge_drag_moves_one_side() {
        let mut canvas = canvas(200.0, 200.0);
        let id = draw_rectangle(&mut canvas, 50.0, 50.0, 100.0, 100.0);
        canvas.set_editing(true);
        canvas.set_snapping(false);
        // Hover the top edge (between vertices 0 and 1)
        hover_move(&mut canvas, 75.0, 49.0);
        assert_eq!(canvas.hovered_edge(), Some(1));
        press(&mut canvas, 75.0, 49.0);
        hover_move(&mut canvas, 75.0, 30.0);
        canvas.mouse_release(Point::new(75.0, 30.0), MouseButton::Left);
        let shape = canvas.shapes().get(id).unwrap();
        assert_eq!(shape.points[0].y, 30.0);
        assert_eq!(shape.points[1].y, 30.0);
        assert_eq!(shape.points[2].y, 100.0);
        assert_eq!(shape.points[3].y, 100.0);
    }

    #[test]
    fn test_body_drag_clamped_to_image() {
        let mut canvas = canvas(100.0, 100.0);
        let id = draw_rectangle(&mut canvas, 10.0, 10.0, 40.0, 40.0);
        canvas.set_editing(true);
        hover_move(&mut canvas, 25.0, 25.0);
        press(&mut canvas, 25.0, 25.0);
        // Drag far toward the top-left corner; the box must stop at 0,0
        hover_move(&mut canvas, 5.0, 5.0);
        canvas.mouse_release(Point::new(5.0, 5.0), MouseButton::Left);
        let rect = canvas.shapes().get(id).unwrap().bounding_rect().unwrap();
        assert_eq!((rect.x, rect.y), (0.0, 0.0));
        assert_eq!((rect.width, rect.height), (30.0, 30.0));
    }

    #[test]
    fn test_pan_gesture_on_empty_space() {
        let mut canvas = canvas(100.0, 100.0);
        draw_rectangle(&mut canvas, 10.0, 10.0, 30.0, 30.0);
        canvas.set_editing(true);
        press(&mut canvas, 60.0, 60.0);
        let events = hover_move(&mut canvas, 70.0, 65.0);
        assert!(events.contains(&CanvasEvent::Scroll(10.0, 5.0)));
    }

    #[test]
    fn test_edge_click_inserts_vertex_on_polygon() {
        let mut canvas = canvas(100.0, 100.0);
        let shape = Shape::new(ShapeKind::Polygon).with_points(vec![
            Point::new(10.0, 10.0),
            Point::new(60.0, 10.0),
            Point::new(35.0, 60.0),
        ]);
        let ids = canvas.load_shapes([shape]);
        canvas.set_editing(true);
        // Hover the edge between vertices 0 and 1
        hover_move(&mut canvas, 35.0, 10.5);
        assert_eq!(canvas.hovered_edge(), Some(1));
        press(&mut canvas, 35.0, 10.5);
        let shape = canvas.shapes().get(ids[0]).unwrap();
        assert_eq!(shape.points.len(), 4);
        assert_eq!(shape.points[1], Point::new(35.0, 10.5));
    }

    #[test]
    fn test_shift_click_removes_vertex() {
        let mut canvas = canvas(100.0, 100.0);
        let shape = Shape::new(ShapeKind::Polygon).with_points(vec![
            Point::new(10.0, 10.0),
            Point::new(60.0, 10.0),
            Point::new(60.0, 60.0),
            Point::new(10.0, 60.0),
        ]);
        let ids = canvas.load_shapes([shape]);
        canvas.set_editing(true);
        hover_move(&mut canvas, 60.0, 10.0);
        assert_eq!(canvas.hovered_vertex(), Some(1));
        canvas.mouse_press(
            Point::new(60.0, 10.0),
            MouseButton::Left,
            Modifiers { shift: true, ctrl: false },
        );
        assert_eq!(canvas.shapes().get(ids[0]).unwrap().points.len(), 3);
    }

    #[test]
    fn test_move_one_pixel_respects_bounds() {
        let mut canvas = canvas(100.0, 100.0);
        let id = draw_rectangle(&mut canvas, 0.0, 10.0, 30.0, 40.0);
        canvas.set_editing(true);
        hover_move(&mut canvas, 15.0, 25.0);
        press(&mut canvas, 15.0, 25.0);
        canvas.mouse_release(Point::new(15.0, 25.0), MouseButton::Left);
        assert_eq!(canvas.selected_id(), Some(id));
        // Already flush against the left border
        assert!(canvas.move_one_pixel(Direction::Left).is_empty());
        let events = canvas.move_one_pixel(Direction::Right);
        assert!(events.contains(&CanvasEvent::ShapeMoved));
        assert_eq!(canvas.shapes().get(id).unwrap().points[0].x, 1.0);
    }

    #[test]
    fn test_duplicate_selected_nudges_copy() {
        let mut canvas = canvas(100.0, 100.0);
        let id = draw_rectangle(&mut canvas, 10.0, 10.0, 40.0, 40.0);
        canvas.set_editing(true);
        hover_move(&mut canvas, 25.0, 25.0);
        press(&mut canvas, 25.0, 25.0);
        canvas.mouse_release(Point::new(25.0, 25.0), MouseButton::Left);

        let mut events = Vec::new();
        let copy = canvas.duplicate_selected(&mut events).unwrap();
        assert_ne!(copy, id);
        assert_eq!(canvas.shapes().len(), 2);
        assert_eq!(canvas.selected_id(), Some(copy));
        let original = canvas.shapes().get(id).unwrap().points[0];
        let moved = canvas.shapes().get(copy).unwrap().points[0];
        assert_ne!(original, moved);
    }

    #[test]
    fn test_undo_last_line_reopens() {
        let mut canvas = canvas(100.0, 100.0);
        draw_rectangle(&mut canvas, 10.0, 10.0, 40.0, 40.0);
        canvas.set_editing(false);
        let events = canvas.undo_last_line();
        assert_eq!(events, vec![CanvasEvent::Drawing(true)]);
        assert!(canvas.shapes().is_empty());
        assert!(canvas.current_shape().is_some_and(|s| !s.is_closed()));
    }

    #[test]
    fn test_load_image_resets_shapes() {
        let mut canvas = canvas(100.0, 100.0);
        draw_rectangle(&mut canvas, 10.0, 10.0, 40.0, 40.0);
        canvas.load_image(200.0, 200.0);
        assert!(canvas.shapes().is_empty());
        assert!(canvas.current_shape().is_none());
    }
}
