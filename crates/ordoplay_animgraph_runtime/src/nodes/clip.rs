// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation clip playback.

use super::{GraphPoseNodeResult, NodeEvaluator, NodeRuntime, PoseNodeState};
use crate::events::{SampledEvent, SampledEventKind, SampledEventRange};
use crate::settings::{AnimationClipSettings, NodeIndex};
use crate::task_system::SampleTask;
use crate::time::{Percentage, SyncTrack, SyncTrackTime, SyncTrackTimeRange, DEFAULT_SYNC_TRACK};
use crate::transform::Transform;
use std::sync::Arc;

/// Runtime state of a clip node
#[derive(Debug, Clone)]
pub(crate) struct ClipNode {
    pub time: PoseNodeState,
    pub sync_track: Arc<SyncTrack>,
}

impl ClipNode {
    pub fn new(settings: &AnimationClipSettings) -> Self {
        let sync_track = if settings.sync_events.is_empty() {
            Arc::clone(&DEFAULT_SYNC_TRACK)
        } else {
            Arc::new(SyncTrack::new(
                settings.sync_events.iter().map(|marker| (marker.id.clone(), marker.start_time)),
            ))
        };

        Self {
            time: PoseNodeState {
                duration: settings.duration,
                ..Default::default()
            },
            sync_track,
        }
    }
}

/// Advance normalized time, returning the new time, whole loops crossed and
/// the progress actually made
fn advance(previous: Percentage, delta: f32, looping: bool) -> (Percentage, i32, f32) {
    let raw = Percentage::new(previous.as_f32() + delta);
    if looping {
        let (current, loops) = raw.wrapped();
        (current, loops, delta)
    } else {
        let current = raw.clamped();
        (current, 0, current.as_f32() - previous.as_f32())
    }
}

impl NodeEvaluator<'_> {
    fn clip_node_mut(&mut self, node_index: NodeIndex) -> &mut ClipNode {
        match &mut self.node_mut(node_index).runtime {
            NodeRuntime::Clip(node) => node,
            _ => panic!("node {node_index} is not a clip"),
        }
    }

    pub(super) fn initialize_clip(&mut self, settings: &AnimationClipSettings, initial_time: SyncTrackTime) {
        let node = self.clip_node_mut(settings.node_index);
        let start = node.sync_track.get_percentage_through(initial_time);
        node.time = PoseNodeState {
            previous_time: start,
            current_time: start,
            duration: settings.duration,
            loop_count: 0,
        };
    }

    pub(super) fn update_clip(
        &mut self,
        settings: &AnimationClipSettings,
        range: Option<&SyncTrackTimeRange>,
    ) -> GraphPoseNodeResult {
        let delta_time = self.context.delta_time;
        let node = self.clip_node_mut(settings.node_index);

        let (previous, delta) = match range {
            Some(range) => {
                let start = node.sync_track.get_percentage_through(range.start_time);
                let end = node.sync_track.get_percentage_through(range.end_time);
                let mut delta = end.as_f32() - start.as_f32();
                if delta < 0.0 {
                    delta += 1.0;
                }
                (start, delta)
            }
            None if settings.duration > 0.0 => (node.time.current_time, delta_time / settings.duration),
            None => (node.time.current_time, 0.0),
        };

        let (current, loops, progress) = advance(previous, delta, settings.looping);
        node.time.previous_time = previous;
        node.time.current_time = current;
        node.time.loop_count += loops;

        // Sample events crossed in (previous, previous + progress]
        let events_start = self.context.sampled_events_buffer.num_events();
        if settings.duration > 0.0 && progress > 0.0 {
            let from = previous.as_f32();
            let to = from + progress;
            for event in &settings.events {
                let at = event.time / settings.duration;
                let crossed = (at > from && at <= to) || (to > 1.0 && at + 1.0 > from && at + 1.0 <= to);
                if crossed {
                    self.context.sampled_events_buffer.emplace(SampledEvent {
                        source_node: settings.node_index,
                        kind: SampledEventKind::Animation { id: event.id.clone() },
                        weight: 1.0,
                        percentage_through: at,
                    });
                }
            }
        }
        let events_end = self.context.sampled_events_buffer.num_events();

        let seconds = progress * settings.duration;
        let velocity = settings.root_motion_velocity;
        let root_motion_delta =
            Transform::from_translation([velocity[0] * seconds, velocity[1] * seconds, velocity[2] * seconds]);

        let task_index = self.context.task_system.register_task(
            settings.node_index,
            &[],
            SampleTask {
                clip_id: settings.clip_id.clone(),
                time: current,
            },
        );

        GraphPoseNodeResult {
            task_index: Some(task_index),
            root_motion_delta,
            sampled_event_range: SampledEventRange::new(events_start, events_end),
        }
    }
}
