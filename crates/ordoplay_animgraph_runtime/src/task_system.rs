// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pose task registration.
//!
//! Pose nodes do not produce poses directly during the graph update. They
//! register tasks here, and a later blending pass executes the task list in
//! registration order (dependencies always precede their users).

use crate::settings::NodeIndex;
use crate::string_id::StringId;
use crate::time::Percentage;
use std::any::Any;
use std::fmt;

/// Index of a registered task
pub type TaskIndex = u16;

/// Kind of pose produced without sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseType {
    /// Skeleton bind pose
    ReferencePose,
    /// All-zero additive pose
    ZeroPose,
}

/// Work item consumed by the pose blending pass
pub trait Task: Any + fmt::Debug {
    /// Display name for debugging
    fn name(&self) -> &'static str;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// Produce a pose without sampling any animation
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultPoseTask {
    /// Which default pose
    pub pose_type: PoseType,
}

impl Task for DefaultPoseTask {
    fn name(&self) -> &'static str {
        "Default Pose"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sample an animation clip at a time
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTask {
    /// Clip to sample
    pub clip_id: StringId,
    /// Where to sample
    pub time: Percentage,
}

impl Task for SampleTask {
    fn name(&self) -> &'static str {
        "Sample"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Blend the poses of its two dependencies
#[derive(Debug, Clone, PartialEq)]
pub struct BlendTask {
    /// Weight of the second dependency
    pub blend_weight: f32,
}

impl Task for BlendTask {
    fn name(&self) -> &'static str {
        "Blend"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct RegisteredTask {
    source_node: NodeIndex,
    dependencies: Vec<TaskIndex>,
    task: Box<dyn Task>,
}

/// Ordered list of tasks registered during one graph update
#[derive(Debug, Default)]
pub struct TaskSystem {
    tasks: Vec<RegisteredTask>,
}

impl TaskSystem {
    /// Create an empty task system
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear for a new frame
    pub fn reset(&mut self) {
        self.tasks.clear();
    }

    /// Register a task produced by a node
    ///
    /// Dependencies must already be registered.
    pub fn register_task<T: Task>(&mut self, source_node: NodeIndex, dependencies: &[TaskIndex], task: T) -> TaskIndex {
        assert!(self.tasks.len() < TaskIndex::MAX as usize, "task list is full");
        assert!(
            dependencies.iter().all(|d| (*d as usize) < self.tasks.len()),
            "task dependency registered after its user"
        );

        self.tasks.push(RegisteredTask {
            source_node,
            dependencies: dependencies.to_vec(),
            task: Box::new(task),
        });
        (self.tasks.len() - 1) as TaskIndex
    }

    /// Move every task of another system to the end of this one
    ///
    /// Returns the offset to add to task indices issued by `other`.
    pub fn transfer_tasks(&mut self, other: &mut TaskSystem) -> TaskIndex {
        let offset = self.tasks.len();
        assert!(offset + other.tasks.len() < TaskIndex::MAX as usize, "task list is full");

        for mut registered in other.tasks.drain(..) {
            for dependency in &mut registered.dependencies {
                *dependency += offset as TaskIndex;
            }
            self.tasks.push(registered);
        }

        offset as TaskIndex
    }

    /// Number of registered tasks
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing was registered
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get a task as a concrete type
    pub fn task<T: Task>(&self, index: TaskIndex) -> Option<&T> {
        self.tasks.get(index as usize)?.task.as_any().downcast_ref::<T>()
    }

    /// Get the display name of a task
    pub fn task_name(&self, index: TaskIndex) -> Option<&'static str> {
        self.tasks.get(index as usize).map(|t| t.task.name())
    }

    /// Node that registered a task
    pub fn source_node(&self, index: TaskIndex) -> Option<NodeIndex> {
        self.tasks.get(index as usize).map(|t| t.source_node)
    }

    /// Tasks a task depends on
    pub fn dependencies(&self, index: TaskIndex) -> &[TaskIndex] {
        self.tasks
            .get(index as usize)
            .map(|t| t.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Count tasks of a concrete type
    pub fn count_tasks_of_type<T: Task>(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.task.as_any().is::<T>())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut tasks = TaskSystem::new();
        let a = tasks.register_task(3, &[], DefaultPoseTask { pose_type: PoseType::ReferencePose });
        let b = tasks.register_task(
            4,
            &[],
            SampleTask {
                clip_id: StringId::new("walk"),
                time: Percentage(0.5),
            },
        );
        let blend = tasks.register_task(5, &[a, b], BlendTask { blend_weight: 0.25 });

        assert_eq!(tasks.num_tasks(), 3);
        assert_eq!(tasks.source_node(a), Some(3));
        assert_eq!(tasks.dependencies(blend), &[a, b]);
        assert!(tasks.task::<SampleTask>(a).is_none());
        assert_eq!(tasks.task::<BlendTask>(blend).map(|t| t.blend_weight), Some(0.25));
        assert_eq!(tasks.count_tasks_of_type::<DefaultPoseTask>(), 1);
    }

    #[test]
    fn test_transfer_rebases_dependencies() {
        let mut owner = TaskSystem::new();
        owner.register_task(0, &[], DefaultPoseTask { pose_type: PoseType::ReferencePose });

        let mut external = TaskSystem::new();
        let a = external.register_task(1, &[], DefaultPoseTask { pose_type: PoseType::ZeroPose });
        let b = external.register_task(2, &[a], BlendTask { blend_weight: 1.0 });

        let offset = owner.transfer_tasks(&mut external);
        assert_eq!(offset, 1);
        assert!(external.is_empty());
        assert_eq!(owner.dependencies(b + offset), &[a + offset]);
    }

    #[test]
    #[should_panic(expected = "task dependency registered after its user")]
    fn test_dependency_must_exist() {
        let mut tasks = TaskSystem::new();
        tasks.register_task(0, &[7], BlendTask { blend_weight: 0.0 });
    }
}
