//! Pull-based evaluation of the scene.
//!
//! Values are resolved on demand: a channel read follows its incoming
//! connection, an operator output resolves its inputs and runs the
//! operator, a constraint output blends its driver worlds, an IK output
//! solves the chain. Results are memoized per query and a visiting stack
//! catches runtime cycles that wiring-time checks cannot see.

use bevy::log::warn;
use bevy::math::{Mat4, Quat, Vec3};
use bevy::platform::collections::HashMap;
use bevy::transform::components::Transform;

use crate::data::{DataValue, euler_deg_to_quat, quat_to_euler_deg};
use crate::errors::{GraphError, GraphResult};
use crate::id::{NodeRef, PinId, SourcePlug, TargetPlug};
use crate::operator::OpContext;
use crate::scene::constraint::WeightedConstraint;
use crate::scene::ik::{IkHandle, IkSolver, single_chain_aim, two_bone_ik};
use crate::scene::Scene;
use crate::scene::node::{SceneNodeKind, component_of, component_pins_of};

/// Snapshot of a node's world placement.
#[derive(Clone, Copy, Debug)]
pub struct WorldTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub matrix: Mat4,
}

impl Scene {
    /// Resolve the current value behind a channel, attribute or output pin.
    pub fn eval_attr(&self, node: NodeRef, pin: &str) -> GraphResult<DataValue> {
        Evaluator::new(self).attr(node, pin)
    }

    pub fn eval_world_transform(&self, node: NodeRef) -> GraphResult<Transform> {
        Evaluator::new(self).world(node)
    }

    /// World-space translate, rotate, scale and matrix in one query.
    pub fn world_transform(&self, node: NodeRef) -> GraphResult<WorldTransform> {
        let t = self.eval_world_transform(node)?;
        Ok(WorldTransform {
            translation: t.translation,
            rotation: t.rotation,
            scale: t.scale,
            matrix: t.to_matrix(),
        })
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum EvalKey {
    Attr(NodeRef, PinId),
    World(NodeRef),
}

#[derive(Clone, Copy)]
enum Cached {
    Data(DataValue),
    World(Transform),
}

struct Evaluator<'s> {
    scene: &'s Scene,
    cache: HashMap<EvalKey, Cached>,
    stack: Vec<EvalKey>,
}

impl<'s> Evaluator<'s> {
    fn new(scene: &'s Scene) -> Self {
        Self {
            scene,
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn describe(&self, node: NodeRef, pin: &str) -> String {
        match self.scene.node(node) {
            Ok(n) => format!("{}.{pin}", n.name),
            Err(_) => format!("{node:?}.{pin}"),
        }
    }

    fn attr(&mut self, node: NodeRef, pin: &str) -> GraphResult<DataValue> {
        let key = EvalKey::Attr(node, pin.to_string());
        if let Some(Cached::Data(v)) = self.cache.get(&key) {
            return Ok(*v);
        }
        if self.stack.contains(&key) {
            return Err(GraphError::EvaluationCycle(self.describe(node, pin)));
        }
        self.stack.push(key.clone());
        let result = self.attr_inner(node, pin);
        self.stack.pop();
        if let Ok(v) = &result {
            self.cache.insert(key, Cached::Data(*v));
        }
        result
    }

    fn attr_inner(&mut self, node: NodeRef, pin: &str) -> GraphResult<DataValue> {
        let n = self
            .scene
            .node(node)
            .map_err(|_| GraphError::MissingNode(node))?;

        if let Some(src) = self
            .scene
            .driver_of(&TargetPlug::new(node, pin))
            .cloned()
        {
            return self.source(&src);
        }

        if n.kind.has_transform() {
            match pin {
                "translate" => {
                    let base = n.local.translation;
                    return self.compound(node, "translate", base);
                }
                "rotate" => {
                    let base = quat_to_euler_deg(n.local.rotation);
                    return self.compound(node, "rotate", base);
                }
                "scale" => {
                    let base = n.local.scale;
                    return self.compound(node, "scale", base);
                }
                "matrix" => {
                    let local = self.local_evaluated(node)?;
                    return Ok(DataValue::Mat4(local.to_matrix()));
                }
                "worldMatrix" => {
                    let world = self.world(node)?;
                    return Ok(DataValue::Mat4(world.to_matrix()));
                }
                _ => {}
            }
            if let Some((compound, axis)) = component_of(pin) {
                let v = self.attr(node, compound)?.as_vec3()?;
                return Ok(DataValue::F32(v[axis]));
            }
        }

        if let Some(attr) = n.attributes.get(pin) {
            return Ok(attr.value);
        }

        Err(GraphError::UnknownPin {
            node: n.name.clone(),
            pin: pin.to_string(),
        })
    }

    /// A compound channel without a whole-pin driver still honours
    /// per-component drivers.
    fn compound(&mut self, node: NodeRef, pin: &str, base: Vec3) -> GraphResult<DataValue> {
        let mut v = base;
        if let Some(components) = component_pins_of(pin) {
            for (axis, component) in components.iter().enumerate() {
                if let Some(src) = self
                    .scene
                    .driver_of(&TargetPlug::new(node, *component))
                    .cloned()
                {
                    v[axis] = self.source(&src)?.as_f32()?;
                }
            }
        }
        Ok(DataValue::Vec3(v))
    }

    fn source(&mut self, plug: &SourcePlug) -> GraphResult<DataValue> {
        let n = self
            .scene
            .node(plug.node)
            .map_err(|_| GraphError::MissingNode(plug.node))?;
        let pin = plug.pin.as_str();
        match &n.kind {
            SceneNodeKind::Utility(op) => {
                if op.output_spec().iter().any(|(p, _)| p == pin) {
                    return self.run_operator(plug.node, pin);
                }
            }
            SceneNodeKind::Constraint(_) => {
                if pin == WeightedConstraint::OUT_TRANSLATE || pin == WeightedConstraint::OUT_ROTATE
                {
                    return self.constraint_output(plug.node, pin);
                }
            }
            SceneNodeKind::IkHandle(_) => {
                if pin == IkHandle::OUT_ROOT_ROTATE || pin == IkHandle::OUT_MID_ROTATE {
                    return self.ik_output(plug.node, pin);
                }
            }
            _ => {}
        }
        self.attr(plug.node, &plug.pin)
    }

    fn run_operator(&mut self, node: NodeRef, pin: &str) -> GraphResult<DataValue> {
        let key = EvalKey::Attr(node, pin.to_string());
        if let Some(Cached::Data(v)) = self.cache.get(&key) {
            return Ok(*v);
        }
        if self.stack.contains(&key) {
            return Err(GraphError::EvaluationCycle(self.describe(node, pin)));
        }
        self.stack.push(key.clone());

        let op = match &self
            .scene
            .node(node)
            .map_err(|_| GraphError::MissingNode(node))?
            .kind
        {
            SceneNodeKind::Utility(op) => op.clone(),
            _ => {
                self.stack.pop();
                return Err(GraphError::OutputMissing(SourcePlug::new(node, pin)));
            }
        };

        let mut inputs = HashMap::new();
        let mut failure = None;
        for (p, _) in op.input_spec() {
            match self.attr(node, &p) {
                Ok(v) => {
                    inputs.insert(p, v);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.stack.pop();
        if let Some(e) = failure {
            return Err(e);
        }

        let mut ctx = OpContext::new(inputs);
        op.update(&mut ctx)?;
        let outputs = ctx.into_outputs();
        let result = outputs
            .get(pin)
            .copied()
            .ok_or_else(|| GraphError::OutputMissing(SourcePlug::new(node, pin)));
        for (p, v) in outputs {
            self.cache.insert(EvalKey::Attr(node, p), Cached::Data(v));
        }
        result
    }

    fn constraint_output(&mut self, node: NodeRef, pin: &str) -> GraphResult<DataValue> {
        let key = EvalKey::Attr(node, pin.to_string());
        if let Some(Cached::Data(v)) = self.cache.get(&key) {
            return Ok(*v);
        }
        if self.stack.contains(&key) {
            return Err(GraphError::EvaluationCycle(self.describe(node, pin)));
        }
        self.stack.push(key.clone());
        let solved = self.solve_constraint(node);
        self.stack.pop();
        let (translate, rotate) = solved?;
        self.cache.insert(
            EvalKey::Attr(node, WeightedConstraint::OUT_TRANSLATE.to_string()),
            Cached::Data(DataValue::Vec3(translate)),
        );
        self.cache.insert(
            EvalKey::Attr(node, WeightedConstraint::OUT_ROTATE.to_string()),
            Cached::Data(DataValue::Vec3(rotate)),
        );
        Ok(if pin == WeightedConstraint::OUT_TRANSLATE {
            DataValue::Vec3(translate)
        } else {
            DataValue::Vec3(rotate)
        })
    }

    /// Blend the driver worlds by the current weights, then express the
    /// result in the driven node's parent space.
    fn solve_constraint(&mut self, node: NodeRef) -> GraphResult<(Vec3, Vec3)> {
        let constraint = match &self
            .scene
            .node(node)
            .map_err(|_| GraphError::MissingNode(node))?
            .kind
        {
            SceneNodeKind::Constraint(c) => c.clone(),
            _ => return Err(GraphError::MissingNode(node)),
        };
        let rest = constraint.rest;

        let mut weights = Vec::with_capacity(constraint.drivers.len());
        for i in 0..constraint.drivers.len() {
            weights.push(
                self.attr(node, &WeightedConstraint::weight_attr(i))?
                    .as_f32()?,
            );
        }
        let total: f32 = weights.iter().sum();
        if total <= 1e-6 {
            // Weightless constraints hold the rest pose.
            return Ok((rest.translation, quat_to_euler_deg(rest.rotation)));
        }

        let mut blend_t = Vec3::ZERO;
        let mut blend_q: Option<Quat> = None;
        let mut acc_w = 0.;
        for (driver, w) in constraint.drivers.iter().zip(&weights) {
            let w = *w / total;
            if w <= 0. {
                continue;
            }
            let dw = self.world(driver.node)?;
            let target = match driver.offset {
                Some(offset) => dw.mul_transform(offset),
                None => dw,
            };
            blend_t += w * target.translation;
            blend_q = Some(match blend_q {
                None => target.rotation,
                Some(q) => q.slerp(target.rotation, w / (acc_w + w)),
            });
            acc_w += w;
        }
        let blend_q = blend_q.unwrap_or(rest.rotation).normalize();

        let driven = self
            .scene
            .node(constraint.driven)
            .map_err(|_| GraphError::MissingNode(constraint.driven))?;
        let parent_world = match driven.parent {
            Some(p) => self.world(p)?,
            None => Transform::IDENTITY,
        };
        let local = Transform::from_matrix(
            parent_world.to_matrix().inverse() * Mat4::from_rotation_translation(blend_q, blend_t),
        );

        let mut translate = local.translation;
        for axis in 0..3 {
            if constraint.skip_axes[axis] {
                translate[axis] = rest.translation[axis];
            }
        }
        Ok((translate, quat_to_euler_deg(local.rotation)))
    }

    fn ik_output(&mut self, node: NodeRef, pin: &str) -> GraphResult<DataValue> {
        let key = EvalKey::Attr(node, pin.to_string());
        if let Some(Cached::Data(v)) = self.cache.get(&key) {
            return Ok(*v);
        }
        if self.stack.contains(&key) {
            return Err(GraphError::EvaluationCycle(self.describe(node, pin)));
        }
        self.stack.push(key.clone());
        let solved = self.solve_ik(node);
        self.stack.pop();
        let (root_rotate, mid_rotate) = solved?;
        self.cache.insert(
            EvalKey::Attr(node, IkHandle::OUT_ROOT_ROTATE.to_string()),
            Cached::Data(DataValue::Vec3(root_rotate)),
        );
        self.cache.insert(
            EvalKey::Attr(node, IkHandle::OUT_MID_ROTATE.to_string()),
            Cached::Data(DataValue::Vec3(mid_rotate)),
        );
        Ok(if pin == IkHandle::OUT_ROOT_ROTATE {
            DataValue::Vec3(root_rotate)
        } else {
            DataValue::Vec3(mid_rotate)
        })
    }

    /// Solve the chain from its rest pose (the authored joint locals)
    /// toward the handle's current world position.
    fn solve_ik(&mut self, node: NodeRef) -> GraphResult<(Vec3, Vec3)> {
        let handle_node = self
            .scene
            .node(node)
            .map_err(|_| GraphError::MissingNode(node))?;
        let handle_name = handle_node.name.clone();
        let handle = match &handle_node.kind {
            SceneNodeKind::IkHandle(h) => h.clone(),
            _ => return Err(GraphError::MissingNode(node)),
        };
        let path = self
            .scene
            .chain_path(handle.start, handle.end)
            .map_err(|_| GraphError::BrokenIkChain {
                start: handle.start,
                end: handle.end,
            })?;

        let start = self
            .scene
            .node(path[0])
            .map_err(|_| GraphError::MissingNode(path[0]))?;
        let parent_world = match start.parent {
            Some(p) => self.world(p)?,
            None => Transform::IDENTITY,
        };
        // The root's position may be driven (a constrained chain root);
        // its rotation always solves from the authored rest orientation.
        let root_translation = self.attr(path[0], "translate")?.as_vec3()?;
        let rest_root = parent_world.mul_transform(Transform {
            translation: root_translation,
            ..start.local
        });
        let target = self.world(node)?.translation;

        let hold = |a: Quat, b: Quat| (quat_to_euler_deg(a), quat_to_euler_deg(b));

        match handle.solver {
            IkSolver::SingleChain => {
                let child = self
                    .scene
                    .node(path[1])
                    .map_err(|_| GraphError::MissingNode(path[1]))?;
                let rest_child = rest_root.mul_transform(child.local);
                match single_chain_aim(
                    (rest_root.translation, rest_root.rotation),
                    rest_child.translation,
                    target,
                ) {
                    Some(world_rot) => {
                        let local_rot = parent_world.rotation.inverse() * world_rot;
                        Ok((quat_to_euler_deg(local_rot), quat_to_euler_deg(child.local.rotation)))
                    }
                    None => {
                        warn!("ik handle `{handle_name}` target is degenerate, holding rest pose");
                        Ok(hold(start.local.rotation, child.local.rotation))
                    }
                }
            }
            IkSolver::RotatePlane => {
                let mid = self
                    .scene
                    .node(path[1])
                    .map_err(|_| GraphError::MissingNode(path[1]))?;
                let end = self
                    .scene
                    .node(path[2])
                    .map_err(|_| GraphError::MissingNode(path[2]))?;
                let rest_mid = rest_root.mul_transform(mid.local);
                let rest_end = rest_mid.mul_transform(end.local);
                let pole = match handle.pole {
                    Some(p) => Some(self.world(p)?.translation),
                    None => None,
                };
                match two_bone_ik(
                    (rest_root.translation, rest_root.rotation),
                    (rest_mid.translation, rest_mid.rotation),
                    rest_end.translation,
                    target,
                    pole,
                ) {
                    Some(sol) => {
                        let root_local = parent_world.rotation.inverse() * sol.root_world_rotation;
                        let mid_local = sol.root_world_rotation.inverse() * sol.mid_world_rotation;
                        Ok((quat_to_euler_deg(root_local), quat_to_euler_deg(mid_local)))
                    }
                    None => {
                        warn!("ik handle `{handle_name}` target is degenerate, holding rest pose");
                        Ok(hold(start.local.rotation, mid.local.rotation))
                    }
                }
            }
        }
    }

    fn local_evaluated(&mut self, node: NodeRef) -> GraphResult<Transform> {
        Ok(Transform {
            translation: self.attr(node, "translate")?.as_vec3()?,
            rotation: euler_deg_to_quat(self.attr(node, "rotate")?.as_vec3()?),
            scale: self.attr(node, "scale")?.as_vec3()?,
        })
    }

    fn world(&mut self, node: NodeRef) -> GraphResult<Transform> {
        let key = EvalKey::World(node);
        if let Some(Cached::World(t)) = self.cache.get(&key) {
            return Ok(*t);
        }
        if self.stack.contains(&key) {
            return Err(GraphError::EvaluationCycle(self.describe(node, "worldMatrix")));
        }
        self.stack.push(key.clone());
        let result = self.world_inner(node);
        self.stack.pop();
        if let Ok(t) = &result {
            self.cache.insert(key, Cached::World(*t));
        }
        result
    }

    fn world_inner(&mut self, node: NodeRef) -> GraphResult<Transform> {
        let n = self
            .scene
            .node(node)
            .map_err(|_| GraphError::MissingNode(node))?;
        if !n.kind.has_transform() {
            return Ok(Transform::IDENTITY);
        }
        let parent_world = match n.parent {
            Some(p) => self.world(p)?,
            None => Transform::IDENTITY,
        };
        let local = self.local_evaluated(node)?;
        Ok(parent_world.mul_transform(local))
    }
}
