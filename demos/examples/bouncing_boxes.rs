// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bouncing boxes: step a small world and count overlapping pairs each frame.
//!
//! This example shows how to:
//! - create one proxy per body and move it every step with its displacement,
//! - run a single-threaded pass and a parallel pass over the move buffer,
//! - shift the world origin and inspect tree quality.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p canopy_demos --example bouncing_boxes`

use std::sync::atomic::{AtomicUsize, Ordering};

use canopy_broad_phase::{BroadPhase, BroadPhaseConfig};
use canopy_index::{Aabb2D, ProxyId, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BODIES: u32 = 500;
const WORLD: f32 = 200.0;
const STEPS: usize = 60;
const DT: f32 = 1.0 / 60.0;

/// A body moving at constant velocity inside the world bounds.
#[derive(Clone, Copy, Debug)]
struct Body {
    aabb: Aabb2D<f32>,
    velocity: Vec2<f32>,
    proxy: ProxyId,
}

impl Body {
    /// Advance by one step, reflecting off the walls. Returns the displacement.
    fn step(&mut self) -> Vec2<f32> {
        let mut d = self.velocity.scale(DT);
        if self.aabb.min_x + d.x < 0.0 || self.aabb.max_x + d.x > WORLD {
            self.velocity.x = -self.velocity.x;
            d.x = -d.x;
        }
        if self.aabb.min_y + d.y < 0.0 || self.aabb.max_y + d.y > WORLD {
            self.velocity.y = -self.velocity.y;
            d.y = -d.y;
        }
        self.aabb = self.aabb.shifted(Vec2::new(-d.x, -d.y));
        d
    }
}

fn main() {
    env_logger::init();

    let config = BroadPhaseConfig::default().with_workers(4);
    let mut broad_phase: BroadPhase<f32, u32> = match BroadPhase::with_config(config) {
        Ok(broad_phase) => broad_phase,
        Err(err) => {
            log::error!("bad configuration: {err}");
            return;
        }
    };

    let mut rng = StdRng::seed_from_u64(42);
    let mut bodies: Vec<Body> = (0..BODIES)
        .map(|i| {
            let size = rng.gen_range(1.0..4.0);
            let x = rng.gen_range(0.0..WORLD - size);
            let y = rng.gen_range(0.0..WORLD - size);
            let aabb = Aabb2D::from_xywh(x, y, size, size);
            Body {
                aabb,
                velocity: Vec2::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0)),
                proxy: broad_phase.create_proxy(aabb, i),
            }
        })
        .collect();

    for step in 0..STEPS {
        for body in &mut bodies {
            let d = body.step();
            broad_phase.move_proxy(body.proxy, body.aabb, d);
        }

        let pairs = if step % 2 == 0 {
            let mut touching = Vec::new();
            broad_phase.update_pairs(&mut |a: u32, b: u32| touching.push((a, b)));
            touching.len()
        } else {
            let reports = AtomicUsize::new(0);
            broad_phase.update_pairs_parallel(4, &|_: u32, _: u32| {
                reports.fetch_add(1, Ordering::Relaxed);
            });
            reports.into_inner()
        };

        if step % 10 == 0 {
            println!(
                "step {step:>3}: {pairs:>4} pairs, tree height {}, quality {:.2}",
                broad_phase.tree_height(),
                broad_phase.tree_quality()
            );
        }
    }

    // Recentre the world on its middle and rebuild the tree from scratch.
    let centre = Vec2::new(WORLD / 2.0, WORLD / 2.0);
    broad_phase.shift_origin(centre);
    broad_phase.rebuild();
    let mut near_origin = 0;
    broad_phase.query(Aabb2D::new(-10.0, -10.0, 10.0, 10.0), |_| {
        near_origin += 1;
        true
    });
    println!(
        "{} proxies, {near_origin} near the new origin, tree height {}",
        broad_phase.proxy_count(),
        broad_phase.tree_height()
    );
}
