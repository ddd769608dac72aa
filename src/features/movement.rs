//! Anti-idle movement: look rotation, crouch pulse and jump pulse.

use std::time::Duration;

use super::{send_action, DriverContext};
use crate::transport::Action;

pub(super) async fn rotate(ctx: DriverContext, period: Duration, step: f32) {
    let mut ticker = super::ticker(period);
    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break,
            _ = ticker.tick() => {
                if !ctx.gate.is_open() {
                    continue;
                }
                let action = {
                    let mut player = ctx.player.lock();
                    let rotation = player.rotate(step);
                    Action::Look { position: player.position, rotation }
                };
                send_action(&ctx, &action);
            }
        }
    }
}

pub(super) async fn sneak(ctx: DriverContext, period: Duration, hold: Duration) {
    let mut ticker = super::ticker(period);
    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break,
            _ = ticker.tick() => {
                if !ctx.gate.is_open() || !send_action(&ctx, &Action::Sneak(true)) {
                    continue;
                }
                tokio::select! {
                    _ = ctx.token.cancelled() => break,
                    _ = tokio::time::sleep(hold) => {}
                }
                if ctx.gate.is_open() {
                    send_action(&ctx, &Action::Sneak(false));
                }
            }
        }
    }
}

pub(super) async fn jump(ctx: DriverContext, period: Duration) {
    let mut ticker = super::ticker(period);
    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break,
            _ = ticker.tick() => {
                if ctx.gate.is_open() {
                    send_action(&ctx, &Action::Jump);
                }
            }
        }
    }
}
