use std::time::Duration;

use super::{send_action, DriverContext};
use crate::transport::{Action, Vec3};

/// Move once to `target` after `delay`, then exit.
pub(super) async fn run(ctx: DriverContext, target: Vec3, delay: Duration) {
    tokio::select! {
        _ = ctx.token.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }
    if !ctx.gate.is_open() {
        return;
    }

    let rotation = ctx.player.snapshot().rotation;
    if send_action(&ctx, &Action::Teleport { position: target, rotation }) {
        ctx.player.lock().position = target;
        tracing::info!(server = %ctx.label, x = target.x, y = target.y, z = target.z, "Moved to target position");
    } else {
        tracing::error!(server = %ctx.label, "Failed to move to target position");
    }
}
