// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clip and external graph node compilers.

use super::compile_with;
use crate::compilation::{CompilationError, GraphCompilationContext};
use crate::node::{ClipDescriptor, Node};
use ordoplay_animgraph_runtime::settings::{AnimationClipSettings, ExternalGraphSettings};
use ordoplay_animgraph_runtime::{NodeIndex, StringId};

pub(super) fn compile_animation_clip(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    clip: &ClipDescriptor,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<AnimationClipSettings>(ctx, node, |_, mut settings| {
        settings.clip_id = clip.clip_id.clone();
        settings.duration = clip.duration;
        settings.looping = clip.looping;
        settings.sync_events = clip.sync_events.clone();
        settings.events = clip.events.clone();
        settings.root_motion_velocity = clip.root_motion_velocity;
        Ok(settings)
    })
}

pub(super) fn compile_external_graph(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    slot_id: &StringId,
) -> Result<NodeIndex, CompilationError> {
    let already_compiled = ctx.compiled_node_index(node.id).is_some();
    let index = compile_with::<ExternalGraphSettings>(ctx, node, |_, mut settings| {
        settings.slot_id = slot_id.clone();
        Ok(settings)
    })?;

    if !already_compiled {
        ctx.register_external_graph_slot(slot_id.clone(), index)?;
    }
    Ok(index)
}
