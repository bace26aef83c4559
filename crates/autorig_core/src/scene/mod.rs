//! The scene graph: a DAG of named nodes with hierarchical parenting, a
//! typed attribute store, and attribute-to-attribute connections.
//!
//! Mutation is synchronous and single threaded. Creation calls return
//! opaque [`NodeRef`] handles; a failure raises immediately and leaves any
//! partial output in place for the caller to discard.

pub mod attribute;
pub mod constraint;
mod evaluation;
pub mod ik;
pub mod node;

use bevy::math::Vec3;
use bevy::platform::collections::{HashMap, HashSet};
use bevy::transform::components::Transform;
use indexmap::IndexMap;

use crate::data::{DataSpec, DataValue, euler_deg_to_quat, quat_to_euler_deg};
use crate::errors::{SceneError, SceneResult};
use crate::id::{NodeRef, SourcePlug, TargetPlug};
use crate::naming;
use crate::operator::Operator;

pub use attribute::{AttrDef, Attribute};
pub use constraint::{ConstraintDriver, ConstraintKind, WeightedConstraint};
pub use evaluation::WorldTransform;
pub use ik::{IkHandle, IkSolver, TwoBoneSolution, single_chain_aim, two_bone_ik};
pub use node::{CHANNEL_KEYS, SceneNode, SceneNodeKind, channel_pin};

use node::{component_of, component_pins_of, is_compound_channel};

#[derive(Default)]
pub struct Scene {
    nodes: IndexMap<NodeRef, SceneNode>,
    names: HashMap<String, NodeRef>,
    /// Destination plug to its single driver. Replacing requires `force`.
    edges_inverted: HashMap<TargetPlug, SourcePlug>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------ //
    // Lookup
    // ------------------------------------------------------------------ //

    pub fn node(&self, node: NodeRef) -> SceneResult<&SceneNode> {
        self.nodes.get(&node).ok_or(SceneError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeRef) -> SceneResult<&mut SceneNode> {
        self.nodes
            .get_mut(&node)
            .ok_or(SceneError::UnknownNode(node))
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeRef> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, node: NodeRef) -> SceneResult<&str> {
        Ok(self.node(node)?.name.as_str())
    }

    pub fn parent_of(&self, node: NodeRef) -> SceneResult<Option<NodeRef>> {
        Ok(self.node(node)?.parent)
    }

    pub fn children_of(&self, node: NodeRef) -> SceneResult<&[NodeRef]> {
        Ok(self.node(node)?.children())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.edges_inverted.len()
    }

    pub fn driver_of(&self, target: &TargetPlug) -> Option<&SourcePlug> {
        self.edges_inverted.get(target)
    }

    // ------------------------------------------------------------------ //
    // Creation
    // ------------------------------------------------------------------ //

    fn register(
        &mut self,
        name: String,
        parent: Option<NodeRef>,
        local: Transform,
        kind: SceneNodeKind,
    ) -> SceneResult<NodeRef> {
        if self.names.contains_key(&name) {
            return Err(SceneError::NameCollision(name));
        }
        if let Some(p) = parent {
            self.node(p)?;
        }

        let id = NodeRef::new();
        let mut attributes = IndexMap::new();
        if kind.has_transform() {
            attributes.insert(
                "visibility".to_string(),
                AttrDef::boolean("visibility").default_value(true).build(),
            );
        }
        if let SceneNodeKind::Utility(op) = &kind {
            let defaults: HashMap<String, DataValue> = op.input_defaults().into_iter().collect();
            for (pin, spec) in op.input_spec() {
                let default = defaults
                    .get(&pin)
                    .copied()
                    .unwrap_or_else(|| spec.default_value());
                attributes.insert(
                    pin.clone(),
                    AttrDef::new(pin, spec).default_value(default).build(),
                );
            }
        }

        self.names.insert(name.clone(), id);
        self.nodes.insert(
            id,
            SceneNode {
                id,
                name,
                parent,
                children: Vec::new(),
                local,
                kind,
                attributes,
                locked_channels: HashSet::new(),
                hidden_channels: HashSet::new(),
            },
        );
        if let Some(p) = parent {
            self.node_mut(p)?.children.push(id);
        }
        Ok(id)
    }

    pub fn create_transform(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeRef>,
    ) -> SceneResult<NodeRef> {
        self.register(
            name.into(),
            parent,
            Transform::IDENTITY,
            SceneNodeKind::Transform,
        )
    }

    /// Transform created directly at a world pose.
    pub fn create_transform_at(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeRef>,
        world: Transform,
    ) -> SceneResult<NodeRef> {
        let local = self.world_to_local(parent, world)?;
        self.register(name.into(), parent, local, SceneNodeKind::Transform)
    }

    pub fn create_joint(
        &mut self,
        name: impl Into<String>,
        world_position: Vec3,
        parent: Option<NodeRef>,
    ) -> SceneResult<NodeRef> {
        let local = self.world_to_local(parent, Transform::from_translation(world_position))?;
        self.register(
            name.into(),
            parent,
            Transform::from_translation(local.translation),
            SceneNodeKind::Joint,
        )
    }

    pub fn create_utility(
        &mut self,
        name: impl Into<String>,
        op: Box<dyn Operator>,
    ) -> SceneResult<NodeRef> {
        self.register(
            name.into(),
            None,
            Transform::IDENTITY,
            SceneNodeKind::Utility(op),
        )
    }

    fn world_to_local(
        &self,
        parent: Option<NodeRef>,
        world: Transform,
    ) -> SceneResult<Transform> {
        match parent {
            None => Ok(world),
            Some(p) => {
                let parent_world = self.eval_world_transform(p)?;
                Ok(Transform::from_matrix(
                    parent_world.to_matrix().inverse() * world.to_matrix(),
                ))
            }
        }
    }

    // ------------------------------------------------------------------ //
    // Transforms and hierarchy
    // ------------------------------------------------------------------ //

    pub fn set_local_transform(
        &mut self,
        node: NodeRef,
        translate: Option<Vec3>,
        rotate: Option<bevy::math::Quat>,
        scale: Option<Vec3>,
    ) -> SceneResult<()> {
        let n = self.node_mut(node)?;
        if let Some(t) = translate {
            n.local.translation = t;
        }
        if let Some(r) = rotate {
            n.local.rotation = r;
        }
        if let Some(s) = scale {
            n.local.scale = s;
        }
        Ok(())
    }

    pub fn set_world_transform(&mut self, node: NodeRef, world: Transform) -> SceneResult<()> {
        let parent = self.node(node)?.parent;
        let local = self.world_to_local(parent, world)?;
        self.node_mut(node)?.local = local;
        Ok(())
    }

    /// Move `node` under `new_parent`, preserving its world pose when
    /// `keep_world` is set.
    pub fn reparent(
        &mut self,
        node: NodeRef,
        new_parent: Option<NodeRef>,
        keep_world: bool,
    ) -> SceneResult<()> {
        self.node(node)?;
        if let Some(p) = new_parent {
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == node {
                    return Err(SceneError::HierarchyCycle {
                        child: self.node(node)?.name.clone(),
                        parent: self.node(p)?.name.clone(),
                    });
                }
                cursor = self.node(c)?.parent;
            }
        }

        let new_local = if keep_world {
            let world = self.eval_world_transform(node)?;
            Some(self.world_to_local(new_parent, world)?)
        } else {
            None
        };

        let old_parent = self.node(node)?.parent;
        if let Some(op) = old_parent {
            self.node_mut(op)?.children.retain(|c| *c != node);
        }
        if let Some(np) = new_parent {
            self.node_mut(np)?.children.push(node);
        }
        let n = self.node_mut(node)?;
        n.parent = new_parent;
        if let Some(local) = new_local {
            n.local = local;
        }
        Ok(())
    }

    pub fn rename(&mut self, node: NodeRef, new_name: impl Into<String>) -> SceneResult<()> {
        let new_name = new_name.into();
        if self.names.contains_key(&new_name) {
            return Err(SceneError::NameCollision(new_name));
        }
        let old = self.node(node)?.name.clone();
        self.names.remove(&old);
        self.names.insert(new_name.clone(), node);
        self.node_mut(node)?.name = new_name;
        Ok(())
    }

    /// Delete a node and its whole subtree, along with every connection
    /// into or out of it. Dependency-only nodes (utilities) are unaffected
    /// unless explicitly listed in the subtree.
    pub fn delete_node(&mut self, node: NodeRef) -> SceneResult<()> {
        self.node(node)?;
        let mut doomed = Vec::new();
        let mut stack = vec![node];
        while let Some(cur) = stack.pop() {
            doomed.push(cur);
            stack.extend(self.node(cur)?.children.iter().copied());
        }
        let set: HashSet<NodeRef> = doomed.iter().copied().collect();

        self.edges_inverted
            .retain(|t, s| !set.contains(&t.node) && !set.contains(&s.node));

        if let Some(p) = self.node(node)?.parent {
            self.node_mut(p)?.children.retain(|c| *c != node);
        }
        for d in doomed {
            if let Some(n) = self.nodes.shift_remove(&d) {
                self.names.remove(&n.name);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------ //
    // Attributes
    // ------------------------------------------------------------------ //

    /// Add a custom attribute. Fails with [`SceneError::DuplicateAttribute`]
    /// if the name exists, whether as an attribute or a built-in pin.
    pub fn add_attribute(&mut self, node: NodeRef, def: AttrDef) -> SceneResult<()> {
        let n = self.node(node)?;
        let duplicate = n.attributes.contains_key(&def.name)
            || (n.kind.has_transform()
                && (is_compound_channel(&def.name)
                    || component_of(&def.name).is_some()
                    || def.name == "matrix"
                    || def.name == "worldMatrix"))
            || match &n.kind {
                SceneNodeKind::Utility(op) => {
                    op.output_spec().iter().any(|(p, _)| *p == def.name)
                }
                SceneNodeKind::Constraint(_) => {
                    def.name == WeightedConstraint::OUT_TRANSLATE
                        || def.name == WeightedConstraint::OUT_ROTATE
                }
                SceneNodeKind::IkHandle(_) => {
                    def.name == IkHandle::OUT_ROOT_ROTATE || def.name == IkHandle::OUT_MID_ROTATE
                }
                _ => false,
            };
        if duplicate {
            return Err(SceneError::DuplicateAttribute {
                node: n.name.clone(),
                attribute: def.name,
            });
        }
        let name = def.name.clone();
        self.node_mut(node)?.attributes.insert(name, def.build());
        Ok(())
    }

    pub fn attr(&self, node: NodeRef, name: &str) -> SceneResult<&Attribute> {
        let n = self.node(node)?;
        n.attributes
            .get(name)
            .ok_or_else(|| SceneError::UnknownPlug {
                node: n.name.clone(),
                pin: name.to_string(),
            })
    }

    /// Author a value onto a channel or attribute.
    ///
    /// Scalar values convert between the scalar kinds; floats clamp into
    /// the attribute's range when one was declared.
    pub fn set_attr(
        &mut self,
        node: NodeRef,
        pin: &str,
        value: impl Into<DataValue>,
    ) -> SceneResult<()> {
        let value = value.into();
        let n = self.node(node)?;
        let node_name = n.name.clone();

        if n.kind.has_transform() {
            if n.channel_locked(pin)
                || (is_compound_channel(pin)
                    && component_pins_of(pin)
                        .into_iter()
                        .flatten()
                        .any(|c| n.channel_locked(c)))
            {
                return Err(SceneError::LockedChannel {
                    node: node_name,
                    pin: pin.to_string(),
                });
            }
            if is_compound_channel(pin) {
                let v = value.as_vec3().map_err(SceneError::from)?;
                let n = self.node_mut(node)?;
                match pin {
                    "translate" => n.local.translation = v,
                    "rotate" => n.local.rotation = euler_deg_to_quat(v),
                    _ => n.local.scale = v,
                }
                return Ok(());
            }
            if let Some((compound, axis)) = component_of(pin) {
                let v = value.as_f32().map_err(SceneError::from)?;
                let n = self.node_mut(node)?;
                match compound {
                    "translate" => n.local.translation[axis] = v,
                    "rotate" => {
                        let mut e = quat_to_euler_deg(n.local.rotation);
                        e[axis] = v;
                        n.local.rotation = euler_deg_to_quat(e);
                    }
                    _ => n.local.scale[axis] = v,
                }
                return Ok(());
            }
        }

        let attr = self.attr(node, pin)?;
        if attr.locked {
            return Err(SceneError::LockedChannel {
                node: node_name,
                pin: pin.to_string(),
            });
        }
        let stored = match attr.spec {
            DataSpec::F32 => DataValue::F32(attr.clamped(value.as_f32().map_err(SceneError::from)?)),
            DataSpec::I32 => DataValue::I32(value.as_i32().map_err(SceneError::from)?),
            DataSpec::Enum => DataValue::Enum(value.as_i32().map_err(SceneError::from)?),
            DataSpec::Bool => DataValue::Bool(value.as_bool().map_err(SceneError::from)?),
            expected => {
                if value.spec() != expected {
                    return Err(SceneError::AttributeTypeMismatch {
                        node: node_name,
                        attribute: pin.to_string(),
                        expected,
                        found: value.spec(),
                    });
                }
                value
            }
        };
        let n = self.node_mut(node)?;
        if let Some(attr) = n.attributes.get_mut(pin) {
            attr.value = stored;
        }
        Ok(())
    }

    /// Lock transform channels by their short keys (`"tx"`, `"rz"`, `"v"`),
    /// optionally hiding them from the channel box. Locked channels refuse
    /// authoring and incoming connections.
    pub fn lock_channels(&mut self, node: NodeRef, keys: &[&str], hide: bool) -> SceneResult<()> {
        self.node(node)?;
        for key in keys {
            let Some(pin) = channel_pin(key) else {
                return Err(SceneError::UnknownPlug {
                    node: self.node(node)?.name.clone(),
                    pin: (*key).to_string(),
                });
            };
            if pin == "visibility" {
                let n = self.node_mut(node)?;
                if let Some(attr) = n.attributes.get_mut("visibility") {
                    attr.locked = true;
                    attr.keyable = false;
                    attr.channel_visible = !hide;
                }
                continue;
            }
            let n = self.node_mut(node)?;
            n.locked_channels.insert(pin.to_string());
            if hide {
                n.hidden_channels.insert(pin.to_string());
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------ //
    // Connections
    // ------------------------------------------------------------------ //

    /// Wire `source` into `target`.
    ///
    /// A destination holds one driver: rewiring an already-driven target
    /// needs `force`. A connection that would close a dataflow cycle is
    /// rejected here, at wiring time.
    pub fn connect(
        &mut self,
        source: SourcePlug,
        target: TargetPlug,
        force: bool,
    ) -> SceneResult<()> {
        let from = self.source_spec(&source)?;
        let to = self.target_spec(&target)?;
        if !DataSpec::compatible(from, to) {
            return Err(SceneError::IncompatiblePinTypes {
                source_plug: source,
                target,
                from,
                to,
            });
        }
        if let Some(existing) = self.edges_inverted.get(&target) {
            if !force {
                return Err(SceneError::AlreadyDriven {
                    target,
                    existing: existing.clone(),
                });
            }
        }
        if source == SourcePlug::new(target.node, target.pin.clone())
            || self.depends_on(&source, &target)
        {
            return Err(SceneError::ConnectionCycle {
                source_plug: source,
                target,
            });
        }
        self.edges_inverted.insert(target, source);
        Ok(())
    }

    pub fn disconnect(&mut self, target: &TargetPlug) -> Option<SourcePlug> {
        self.edges_inverted.remove(target)
    }

    /// True when reading `source` transitively pulls on `needle`.
    ///
    /// Walks connections at plug granularity, expanding the in-node
    /// dependencies of computed pins (operator outputs read their inputs,
    /// world matrices read the transform channels). This is what lets an
    /// attribute legally fan into a channel on its own node while a real
    /// loop through the network is still refused.
    fn depends_on(&self, source: &SourcePlug, needle: &TargetPlug) -> bool {
        let mut seen: HashSet<SourcePlug> = HashSet::new();
        let mut frontier = vec![source.clone()];
        while let Some(cur) = frontier.pop() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            for dep in self.reads_from(&cur) {
                if dep == *needle {
                    return true;
                }
                if let Some(driver) = self.edges_inverted.get(&dep) {
                    frontier.push(driver.clone());
                }
            }
        }
        false
    }

    /// The same-node target plugs a source pin reads when evaluated.
    fn reads_from(&self, plug: &SourcePlug) -> Vec<TargetPlug> {
        let Ok(n) = self.node(plug.node) else {
            return Vec::new();
        };
        let pin = plug.pin.as_str();
        let channel_deps = |out: &mut Vec<TargetPlug>| {
            for compound in ["translate", "rotate", "scale"] {
                out.push(TargetPlug::new(plug.node, compound));
                if let Some(components) = component_pins_of(compound) {
                    for c in components {
                        out.push(TargetPlug::new(plug.node, c));
                    }
                }
            }
        };

        let mut deps = Vec::new();
        match &n.kind {
            SceneNodeKind::Utility(op) => {
                if op.output_spec().iter().any(|(p, _)| p == pin) {
                    for (input, _) in op.input_spec() {
                        deps.push(TargetPlug::new(plug.node, input));
                    }
                    return deps;
                }
            }
            SceneNodeKind::Constraint(c) => {
                if pin == WeightedConstraint::OUT_TRANSLATE || pin == WeightedConstraint::OUT_ROTATE
                {
                    for i in 0..c.drivers.len() {
                        deps.push(TargetPlug::new(plug.node, WeightedConstraint::weight_attr(i)));
                    }
                    return deps;
                }
            }
            SceneNodeKind::IkHandle(_) => {
                if pin == IkHandle::OUT_ROOT_ROTATE || pin == IkHandle::OUT_MID_ROTATE {
                    channel_deps(&mut deps);
                    return deps;
                }
            }
            _ => {}
        }
        if n.kind.has_transform() {
            if pin == "matrix" || pin == "worldMatrix" {
                channel_deps(&mut deps);
                return deps;
            }
            if is_compound_channel(pin) {
                deps.push(TargetPlug::new(plug.node, pin));
                if let Some(components) = component_pins_of(pin) {
                    for c in components {
                        deps.push(TargetPlug::new(plug.node, c));
                    }
                }
                return deps;
            }
            if let Some((compound, _)) = component_of(pin) {
                deps.push(TargetPlug::new(plug.node, pin));
                deps.push(TargetPlug::new(plug.node, compound));
                return deps;
            }
        }
        // Plain attribute: it reads its own driver, nothing else.
        deps.push(TargetPlug::new(plug.node, pin));
        deps
    }

    fn source_spec(&self, plug: &SourcePlug) -> SceneResult<DataSpec> {
        let n = self.node(plug.node)?;
        let pin = plug.pin.as_str();
        match &n.kind {
            SceneNodeKind::Utility(op) => {
                if let Some((_, spec)) = op.output_spec().into_iter().find(|(p, _)| p == pin) {
                    return Ok(spec);
                }
            }
            SceneNodeKind::Constraint(_) => {
                if pin == WeightedConstraint::OUT_TRANSLATE || pin == WeightedConstraint::OUT_ROTATE
                {
                    return Ok(DataSpec::Vec3);
                }
            }
            SceneNodeKind::IkHandle(_) => {
                if pin == IkHandle::OUT_ROOT_ROTATE || pin == IkHandle::OUT_MID_ROTATE {
                    return Ok(DataSpec::Vec3);
                }
            }
            _ => {}
        }
        if n.kind.has_transform() {
            if is_compound_channel(pin) {
                return Ok(DataSpec::Vec3);
            }
            if component_of(pin).is_some() {
                return Ok(DataSpec::F32);
            }
            if pin == "matrix" || pin == "worldMatrix" {
                return Ok(DataSpec::Mat4);
            }
        }
        if let Some(attr) = n.attributes.get(pin) {
            return Ok(attr.spec);
        }
        Err(SceneError::UnknownPlug {
            node: n.name.clone(),
            pin: pin.to_string(),
        })
    }

    fn target_spec(&self, plug: &TargetPlug) -> SceneResult<DataSpec> {
        let n = self.node(plug.node)?;
        let pin = plug.pin.as_str();
        if n.kind.has_transform() {
            let locked = n.channel_locked(pin)
                || (is_compound_channel(pin)
                    && component_pins_of(pin)
                        .into_iter()
                        .flatten()
                        .any(|c| n.channel_locked(c)));
            if locked {
                return Err(SceneError::LockedChannel {
                    node: n.name.clone(),
                    pin: pin.to_string(),
                });
            }
            if is_compound_channel(pin) {
                return Ok(DataSpec::Vec3);
            }
            if component_of(pin).is_some() {
                return Ok(DataSpec::F32);
            }
        }
        if let Some(attr) = n.attributes.get(pin) {
            if attr.locked {
                return Err(SceneError::LockedChannel {
                    node: n.name.clone(),
                    pin: pin.to_string(),
                });
            }
            return Ok(attr.spec);
        }
        Err(SceneError::UnknownPlug {
            node: n.name.clone(),
            pin: pin.to_string(),
        })
    }

    // ------------------------------------------------------------------ //
    // Constraints and IK
    // ------------------------------------------------------------------ //

    /// N weighted drivers blending into one driven node. The constraint
    /// node lands as a child of the driven node and its outputs are wired
    /// into the driven channels the kind covers.
    pub fn create_weighted_constraint(
        &mut self,
        kind: ConstraintKind,
        drivers: &[(NodeRef, f32)],
        driven: NodeRef,
        maintain_offset: bool,
    ) -> SceneResult<NodeRef> {
        self.create_constraint_internal(kind, drivers, driven, maintain_offset, [false; 3])
    }

    /// Point constraint that holds selected axes at their rest value.
    pub fn create_point_constraint(
        &mut self,
        drivers: &[(NodeRef, f32)],
        driven: NodeRef,
        maintain_offset: bool,
        skip_axes: [bool; 3],
    ) -> SceneResult<NodeRef> {
        self.create_constraint_internal(
            ConstraintKind::Point,
            drivers,
            driven,
            maintain_offset,
            skip_axes,
        )
    }

    fn create_constraint_internal(
        &mut self,
        kind: ConstraintKind,
        drivers: &[(NodeRef, f32)],
        driven: NodeRef,
        maintain_offset: bool,
        skip_axes: [bool; 3],
    ) -> SceneResult<NodeRef> {
        if drivers.is_empty() {
            return Err(SceneError::NoDrivers);
        }
        for (d, _) in drivers {
            self.node(*d)?;
        }
        let driven_node = self.node(driven)?;
        let driven_name = driven_node.name.clone();
        let rest = driven_node.local;

        if kind == ConstraintKind::Point {
            let sum: f32 = drivers.iter().map(|(_, w)| *w).sum();
            if (sum - 1.).abs() > 1e-4 {
                return Err(SceneError::UnnormalizedWeights { sum });
            }
        }

        let driven_world = self.eval_world_transform(driven)?;
        let mut constraint_drivers = Vec::with_capacity(drivers.len());
        for (d, _) in drivers {
            let offset = if maintain_offset {
                let dw = self.eval_world_transform(*d)?;
                Some(Transform::from_matrix(
                    dw.to_matrix().inverse() * driven_world.to_matrix(),
                ))
            } else {
                None
            };
            constraint_drivers.push(ConstraintDriver {
                node: *d,
                offset,
            });
        }

        let name = naming::with_suffix(&driven_name, kind.tag());
        let cns = self.register(
            name,
            Some(driven),
            Transform::IDENTITY,
            SceneNodeKind::Constraint(WeightedConstraint {
                kind,
                driven,
                drivers: constraint_drivers,
                maintain_offset,
                skip_axes,
                rest,
            }),
        )?;

        for (i, (_, w)) in drivers.iter().enumerate() {
            self.add_attribute(
                cns,
                AttrDef::float(WeightedConstraint::weight_attr(i))
                    .default_value(*w)
                    .min(0.),
            )?;
        }

        if kind.drives_translate() {
            self.connect(
                SourcePlug::new(cns, WeightedConstraint::OUT_TRANSLATE),
                TargetPlug::new(driven, "translate"),
                true,
            )?;
        }
        if kind.drives_rotate() {
            self.connect(
                SourcePlug::new(cns, WeightedConstraint::OUT_ROTATE),
                TargetPlug::new(driven, "rotate"),
                true,
            )?;
        }
        Ok(cns)
    }

    /// Effector handle over the joint run from `start` down to `end`.
    /// Rotation outputs are wired into the solved joints on creation.
    pub fn create_ik_handle(
        &mut self,
        start: NodeRef,
        end: NodeRef,
        solver: IkSolver,
    ) -> SceneResult<NodeRef> {
        let path = self.chain_path(start, end)?;
        let expected = match solver {
            IkSolver::RotatePlane => 3,
            IkSolver::SingleChain => 2,
        };
        let valid = match solver {
            IkSolver::RotatePlane => path.len() == 3,
            IkSolver::SingleChain => path.len() >= 2,
        };
        if !valid {
            return Err(SceneError::InvalidIkChain {
                start: self.node(start)?.name.clone(),
                end: self.node(end)?.name.clone(),
                expected,
            });
        }

        let end_world = self.eval_world_transform(end)?;
        let name = naming::with_suffix(&self.node(end)?.name.clone(), naming::suffix::IK_HANDLE);
        let handle = self.register(
            name,
            None,
            Transform::from_translation(end_world.translation),
            SceneNodeKind::IkHandle(IkHandle {
                start,
                end,
                solver,
                pole: None,
            }),
        )?;

        self.connect(
            SourcePlug::new(handle, IkHandle::OUT_ROOT_ROTATE),
            TargetPlug::new(path[0], "rotate"),
            true,
        )?;
        if solver == IkSolver::RotatePlane {
            self.connect(
                SourcePlug::new(handle, IkHandle::OUT_MID_ROTATE),
                TargetPlug::new(path[1], "rotate"),
                true,
            )?;
        }
        Ok(handle)
    }

    /// Resolve the pole-plane hint of a rotate-plane handle.
    pub fn set_pole_vector(&mut self, handle: NodeRef, pole: NodeRef) -> SceneResult<()> {
        self.node(pole)?;
        let name = self.node(handle)?.name.clone();
        match &mut self.node_mut(handle)?.kind {
            SceneNodeKind::IkHandle(h) => {
                h.pole = Some(pole);
                Ok(())
            }
            _ => Err(SceneError::UnknownPlug {
                node: name,
                pin: "poleVector".to_string(),
            }),
        }
    }

    /// Inclusive parent-chain run from `start` down to `end`.
    pub fn chain_path(&self, start: NodeRef, end: NodeRef) -> SceneResult<Vec<NodeRef>> {
        let mut path = vec![end];
        let mut cursor = end;
        while cursor != start {
            match self.node(cursor)?.parent {
                Some(p) => {
                    path.push(p);
                    cursor = p;
                }
                None => {
                    return Err(SceneError::NotADescendant {
                        start: self.node(start)?.name.clone(),
                        end: self.node(end)?.name.clone(),
                    });
                }
            }
        }
        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::Quat;

    use super::*;
    use crate::errors::GraphError;

    #[derive(Clone, Debug)]
    struct Double;

    impl Operator for Double {
        fn kind_tag(&self) -> &'static str {
            "DBL"
        }

        fn display_name(&self) -> String {
            "Double".into()
        }

        fn input_spec(&self) -> Vec<(crate::id::PinId, DataSpec)> {
            vec![("input".into(), DataSpec::F32)]
        }

        fn output_spec(&self) -> Vec<(crate::id::PinId, DataSpec)> {
            vec![("output".into(), DataSpec::F32)]
        }

        fn update(&self, ctx: &mut crate::operator::OpContext) -> Result<(), GraphError> {
            let x = ctx.data_back("input")?.as_f32()?;
            ctx.set_data_fwd("output", 2. * x);
            Ok(())
        }
    }

    #[test]
    fn node_names_collide_loudly() {
        let mut scene = Scene::new();
        scene.create_transform("root", None).unwrap();
        assert!(matches!(
            scene.create_transform("root", None),
            Err(SceneError::NameCollision(_))
        ));
    }

    #[test]
    fn duplicate_attribute_is_fatal() {
        let mut scene = Scene::new();
        let n = scene.create_transform("ctl", None).unwrap();
        scene.add_attribute(n, AttrDef::float("IKFK").range(0., 1.)).unwrap();
        assert!(matches!(
            scene.add_attribute(n, AttrDef::float("IKFK")),
            Err(SceneError::DuplicateAttribute { .. })
        ));
        // Built-in pins are reserved too.
        assert!(matches!(
            scene.add_attribute(n, AttrDef::float("translateX")),
            Err(SceneError::DuplicateAttribute { .. })
        ));
        assert!(matches!(
            scene.add_attribute(n, AttrDef::boolean("visibility")),
            Err(SceneError::DuplicateAttribute { .. })
        ));
    }

    #[test]
    fn destination_holds_one_driver() {
        let mut scene = Scene::new();
        let a = scene.create_transform("a", None).unwrap();
        let b = scene.create_transform("b", None).unwrap();
        let c = scene.create_transform("c", None).unwrap();
        scene
            .connect(
                SourcePlug::new(a, "translate"),
                TargetPlug::new(c, "translate"),
                false,
            )
            .unwrap();
        let again = scene.connect(
            SourcePlug::new(b, "translate"),
            TargetPlug::new(c, "translate"),
            false,
        );
        assert!(matches!(again, Err(SceneError::AlreadyDriven { .. })));
        scene
            .connect(
                SourcePlug::new(b, "translate"),
                TargetPlug::new(c, "translate"),
                true,
            )
            .unwrap();
        scene.set_attr(b, "translate", Vec3::new(1., 2., 3.)).unwrap();
        let v = scene.eval_attr(c, "translate").unwrap().as_vec3().unwrap();
        assert_eq!(v, Vec3::new(1., 2., 3.));
    }

    #[test]
    fn wiring_rejects_cycles_and_type_mismatches() {
        let mut scene = Scene::new();
        let a = scene.create_utility("a_DBL", Box::new(Double)).unwrap();
        let b = scene.create_utility("b_DBL", Box::new(Double)).unwrap();
        scene
            .connect(
                SourcePlug::new(a, "output"),
                TargetPlug::new(b, "input"),
                false,
            )
            .unwrap();
        assert!(matches!(
            scene.connect(
                SourcePlug::new(b, "output"),
                TargetPlug::new(a, "input"),
                false,
            ),
            Err(SceneError::ConnectionCycle { .. })
        ));

        let t = scene.create_transform("t", None).unwrap();
        assert!(matches!(
            scene.connect(
                SourcePlug::new(t, "worldMatrix"),
                TargetPlug::new(a, "input"),
                false,
            ),
            Err(SceneError::IncompatiblePinTypes { .. })
        ));
    }

    #[test]
    fn operators_pull_through_connections() {
        let mut scene = Scene::new();
        let a = scene.create_utility("a_DBL", Box::new(Double)).unwrap();
        let b = scene.create_utility("b_DBL", Box::new(Double)).unwrap();
        scene
            .connect(
                SourcePlug::new(a, "output"),
                TargetPlug::new(b, "input"),
                false,
            )
            .unwrap();
        scene.set_attr(a, "input", 3.).unwrap();
        assert_eq!(scene.eval_attr(b, "output").unwrap().as_f32().unwrap(), 12.);
    }

    #[test]
    fn world_transforms_compose_down_the_hierarchy() {
        let mut scene = Scene::new();
        let root = scene.create_transform("root", None).unwrap();
        let child = scene.create_transform("child", Some(root)).unwrap();
        scene
            .set_local_transform(root, Some(Vec3::new(0., 1., 0.)), Some(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)), None)
            .unwrap();
        scene
            .set_local_transform(child, Some(Vec3::X), None, None)
            .unwrap();
        let w = scene.world_transform(child).unwrap();
        assert!(w.translation.abs_diff_eq(Vec3::new(0., 2., 0.), 1e-5));
    }

    #[test]
    fn point_constraint_blends_driver_positions() {
        let mut scene = Scene::new();
        let a = scene.create_transform("a", None).unwrap();
        let b = scene.create_transform("b", None).unwrap();
        let driven = scene.create_transform("driven", None).unwrap();
        scene.set_attr(a, "translate", Vec3::ZERO).unwrap();
        scene.set_attr(b, "translate", Vec3::new(4., 0., 0.)).unwrap();
        let cns = scene
            .create_weighted_constraint(ConstraintKind::Point, &[(a, 0.75), (b, 0.25)], driven, false)
            .unwrap();
        let w = scene.world_transform(driven).unwrap();
        assert!(w.translation.abs_diff_eq(Vec3::new(1., 0., 0.), 1e-5));

        // Re-weighting through the attributes moves the driven node.
        scene.set_attr(cns, "weight0", 0.).unwrap();
        scene.set_attr(cns, "weight1", 1.).unwrap();
        let w = scene.world_transform(driven).unwrap();
        assert!(w.translation.abs_diff_eq(Vec3::new(4., 0., 0.), 1e-5));
    }

    #[test]
    fn point_constraint_weights_must_sum_to_one() {
        let mut scene = Scene::new();
        let a = scene.create_transform("a", None).unwrap();
        let b = scene.create_transform("b", None).unwrap();
        let driven = scene.create_transform("driven", None).unwrap();
        assert!(matches!(
            scene.create_weighted_constraint(
                ConstraintKind::Point,
                &[(a, 0.75), (b, 0.75)],
                driven,
                false
            ),
            Err(SceneError::UnnormalizedWeights { .. })
        ));
    }

    #[test]
    fn parent_constraint_maintains_offset() {
        let mut scene = Scene::new();
        let driver = scene.create_transform("driver", None).unwrap();
        let driven = scene.create_transform("driven", None).unwrap();
        scene.set_attr(driven, "translate", Vec3::new(0., 0., 2.)).unwrap();
        scene
            .create_weighted_constraint(ConstraintKind::Parent, &[(driver, 1.)], driven, true)
            .unwrap();
        scene.set_attr(driver, "translate", Vec3::new(1., 0., 0.)).unwrap();
        let w = scene.world_transform(driven).unwrap();
        assert!(w.translation.abs_diff_eq(Vec3::new(1., 0., 2.), 1e-5));
    }

    #[test]
    fn locked_channels_refuse_authoring_and_wiring() {
        let mut scene = Scene::new();
        let src = scene.create_transform("src", None).unwrap();
        let ctl = scene.create_transform("ctl", None).unwrap();
        scene.lock_channels(ctl, &["rx", "ry", "rz"], true).unwrap();
        assert!(matches!(
            scene.set_attr(ctl, "rotateX", 10.),
            Err(SceneError::LockedChannel { .. })
        ));
        assert!(matches!(
            scene.connect(
                SourcePlug::new(src, "rotate"),
                TargetPlug::new(ctl, "rotate"),
                false,
            ),
            Err(SceneError::LockedChannel { .. })
        ));
        // Translation is still open.
        scene.set_attr(ctl, "translateY", 3.).unwrap();
    }

    #[test]
    fn attribute_may_fan_into_channels_of_its_own_node() {
        let mut scene = Scene::new();
        let ctl = scene.create_transform("Local_CTL", None).unwrap();
        scene
            .add_attribute(ctl, AttrDef::float("localScale").default_value(1.).min(0.01))
            .unwrap();
        for axis in ["scaleX", "scaleY", "scaleZ"] {
            scene
                .connect(
                    SourcePlug::new(ctl, "localScale"),
                    TargetPlug::new(ctl, axis),
                    false,
                )
                .unwrap();
        }
        scene.set_attr(ctl, "localScale", 2.).unwrap();
        let s = scene.eval_attr(ctl, "scale").unwrap().as_vec3().unwrap();
        assert!(s.abs_diff_eq(Vec3::splat(2.), 1e-6));

        // Driving a channel from the very plug it feeds is still a cycle.
        assert!(matches!(
            scene.connect(
                SourcePlug::new(ctl, "translate"),
                TargetPlug::new(ctl, "translate"),
                false,
            ),
            Err(SceneError::ConnectionCycle { .. })
        ));
    }

    #[test]
    fn deleting_a_subtree_removes_its_connections() {
        let mut scene = Scene::new();
        let grp = scene.create_transform("grp", None).unwrap();
        let child = scene.create_transform("child", Some(grp)).unwrap();
        let other = scene.create_transform("other", None).unwrap();
        scene
            .connect(
                SourcePlug::new(child, "translate"),
                TargetPlug::new(other, "translate"),
                false,
            )
            .unwrap();
        assert_eq!(scene.connection_count(), 1);
        scene.delete_node(grp).unwrap();
        assert_eq!(scene.connection_count(), 0);
        assert_eq!(scene.node_count(), 1);
        assert!(scene.node_by_name("child").is_none());
    }

    #[test]
    fn reparent_can_keep_world_pose() {
        let mut scene = Scene::new();
        let a = scene.create_transform("a", None).unwrap();
        let b = scene.create_transform("b", None).unwrap();
        scene.set_attr(a, "translate", Vec3::new(5., 0., 0.)).unwrap();
        scene.set_attr(b, "translate", Vec3::new(1., 2., 3.)).unwrap();
        scene.reparent(b, Some(a), true).unwrap();
        let w = scene.world_transform(b).unwrap();
        assert!(w.translation.abs_diff_eq(Vec3::new(1., 2., 3.), 1e-5));
        assert!(
            scene
                .node(b)
                .unwrap()
                .local_transform()
                .translation
                .abs_diff_eq(Vec3::new(-4., 2., 3.), 1e-5)
        );
    }
}
