use terrain::{
    Brush, GridLayout, MemoryHub, MemoryStore, PublishOutcome, ReconcileOutcome, Rgb,
    TerrainGrid, TerrainSession, TerrainStore, Tool, VertexDelta, WorldToGridTransform,
    glam::{Quat, Vec3},
};

const FRAME_DT: f32 = 1.0 / 60.0;

struct Client {
    session: TerrainSession,
    store: MemoryStore,
}

impl Client {
    fn join(hub: &MemoryHub, id: &str) -> Self {
        Self::join_with(hub, id, WorldToGridTransform::IDENTITY)
    }

    fn join_with(hub: &MemoryHub, id: &str, transform: WorldToGridTransform) -> Self {
        Self {
            session: TerrainSession::from_grid(
                TerrainGrid::new(GridLayout::new(16, 16, 0.5)),
                id,
                transform,
                150,
            ),
            store: hub.connect(),
        }
    }

    /// Runs the store change notification if anything changed.
    fn sync(&mut self) -> Option<ReconcileOutcome> {
        if !self.store.take_changed() {
            return None;
        }
        Some(self.session.reconcile(&self.store))
    }
}

fn sync_all(clients: &mut [Client]) {
    for client in clients.iter_mut() {
        client.sync();
    }
}

fn assert_same_terrain(a: &TerrainSession, b: &TerrainSession) {
    assert_eq!(
        a.grid().heights(),
        b.grid().heights(),
        "heights of {} and {} differ",
        a.client_id(),
        b.client_id()
    );
    assert_eq!(
        a.grid().colors(),
        b.grid().colors(),
        "colors of {} and {} differ",
        a.client_id(),
        b.client_id()
    );
}

fn assert_matches_store(session: &TerrainSession, store: &MemoryStore) {
    for (key, record) in store.entries() {
        let index: usize = key.parse().unwrap();
        assert_eq!(session.grid().height(index), Some(record.height), "vertex {key}");
        if let Some(color) = record.color {
            assert_eq!(session.grid().color(index), Some(color), "vertex {key}");
        }
    }
}

fn brush(tool: Tool, radius: f32) -> Brush {
    Brush {
        radius,
        tool,
        color: Rgb::new(0.8, 0.3, 0.1),
        ..Brush::default()
    }
}

#[test]
fn published_delta_reaches_other_client_and_echo_is_ignored() {
    let hub = MemoryHub::new();
    let mut a = Client::join(&hub, "A");
    let mut b = Client::join(&hub, "B");

    // A's local edit, then its publish.
    let delta = VertexDelta {
        vertex_index: 4,
        height: 2.0,
        color: None,
        timestamp_ms: 100,
        author: "A".to_string(),
    };
    let mut local = TerrainGrid::new(GridLayout::new(16, 16, 0.5));
    local.set_height(4, 2.0);
    a.session = TerrainSession::from_grid(local, "A", WorldToGridTransform::IDENTITY, 150);
    a.store.set("4", delta).unwrap();

    b.sync();
    a.sync();

    assert_eq!(b.session.grid().height(4), Some(2.0));
    assert_eq!(a.session.grid().height(4), Some(2.0));
    assert!(!a.session.take_geometry_changes().any());
}

#[test]
fn concurrent_overlapping_strokes_converge() {
    let hub = MemoryHub::new();
    let mut clients = vec![
        Client::join(&hub, "a"),
        Client::join(&hub, "b"),
        Client::join(&hub, "c"),
    ];
    let mut now = 10_000;

    // Two clients sculpt overlapping areas at the same time in each round.
    let rounds = [
        (
            (0, Tool::Raise, Vec3::new(0.0, 0.0, 0.0)),
            (1, Tool::Lower, Vec3::new(0.7, 0.0, 0.2)),
        ),
        (
            (2, Tool::Paint, Vec3::new(0.3, 0.0, 0.0)),
            (0, Tool::Smooth, Vec3::new(-0.2, 0.0, 0.4)),
        ),
        (
            (1, Tool::Raise, Vec3::new(-1.0, 0.0, -1.0)),
            (2, Tool::Erase, Vec3::new(-0.5, 0.0, -0.5)),
        ),
        (
            (0, Tool::Paint, Vec3::new(1.5, 0.0, 1.5)),
            (1, Tool::Raise, Vec3::new(1.2, 0.0, 1.0)),
        ),
    ];

    for (first, second) in rounds {
        let strokes = [first, second];
        for (who, _, _) in strokes {
            clients[who].session.begin_stroke();
        }

        for frame in 0..24 {
            for (who, tool, center) in strokes {
                let drift = Vec3::new(frame as f32 * 0.05, 0.0, 0.0);
                let client = &mut clients[who];
                client
                    .session
                    .apply_brush(center + drift, &brush(tool, 1.2), FRAME_DT);
                client.session.update_stroke(&mut client.store, now);
                now += 7;
            }
            // Store notifications interleave with the edits.
            if frame % 3 == 0 {
                sync_all(&mut clients);
            }
        }

        for (who, _, _) in strokes {
            let client = &mut clients[who];
            let outcome = client.session.end_stroke(&mut client.store, now);
            assert!(!matches!(outcome, PublishOutcome::Sent { pending: 1.., .. }));
            now += 7;
        }
        sync_all(&mut clients);
    }

    // Quiesce: everyone sees the final store state.
    sync_all(&mut clients);
    sync_all(&mut clients);

    assert!(!hub.is_empty());
    for client in &clients {
        assert!(client.session.dirty().is_empty());
        assert_matches_store(&client.session, &client.store);
    }
    assert_same_terrain(&clients[0].session, &clients[1].session);
    assert_same_terrain(&clients[1].session, &clients[2].session);
}

#[test]
fn newer_write_wins_even_when_it_arrives_first() {
    let hub = MemoryHub::new();
    let mut clients = vec![
        Client::join(&hub, "fast"),
        Client::join(&hub, "slow"),
        Client::join(&hub, "observer"),
    ];

    // Seed the room far from the contested area so everyone is past bootstrap.
    clients[2]
        .session
        .apply_brush(Vec3::new(-4.0, 0.0, -4.0), &brush(Tool::Raise, 0.3), 0.1);
    let seed = &mut clients[2];
    seed.session.end_stroke(&mut seed.store, 500);
    sync_all(&mut clients);

    // `slow` has a lagging clock: its edit carries an older timestamp but lands later.
    let fast = &mut clients[0];
    fast.session.apply_brush(Vec3::ZERO, &brush(Tool::Raise, 1.0), 0.1);
    fast.session.end_stroke(&mut fast.store, 2_000);
    clients[2].sync();

    let slow = &mut clients[1];
    slow.session.apply_brush(Vec3::ZERO, &brush(Tool::Lower, 1.0), 0.1);
    slow.session.end_stroke(&mut slow.store, 1_000);

    sync_all(&mut clients);

    let center = clients[0].session.grid().layout().index(8, 8);
    assert!(clients[0].session.grid().height(center).unwrap() > 0.0);
    assert_eq!(clients[0].store.get(&center.to_string()).map(|r| r.timestamp_ms), Some(2_000));
    assert_same_terrain(&clients[0].session, &clients[1].session);
    assert_same_terrain(&clients[0].session, &clients[2].session);
}

#[test]
fn late_joiner_bootstraps_every_entry() {
    let hub = MemoryHub::new();
    let mut a = Client::join(&hub, "a");
    let mut b = Client::join(&hub, "b");

    a.session.apply_brush(Vec3::new(-1.0, 0.0, 0.0), &brush(Tool::Raise, 1.5), 0.2);
    a.session.end_stroke(&mut a.store, 5_000);
    b.sync();
    b.session
        .apply_brush(Vec3::new(1.0, 0.0, 1.0), &brush(Tool::Paint, 1.5), 0.2);
    b.session.end_stroke(&mut b.store, 6_000);
    a.sync();

    let mut late = Client::join(&hub, "late");
    let outcome = late.sync();

    match outcome {
        Some(ReconcileOutcome::Applied(stats)) => {
            assert!(stats.bootstrap);
            assert_eq!(stats.updated, hub.len());
        }
        other => panic!("expected a bootstrap, got {other:?}"),
    }
    assert_matches_store(&late.session, &late.store);
    assert_same_terrain(&late.session, &a.session);
    assert_same_terrain(&late.session, &b.session);
}

#[test]
fn reset_reverts_every_client() {
    let hub = MemoryHub::new();
    let mut a = Client::join(&hub, "a");
    let mut b = Client::join(&hub, "b");

    a.session.apply_brush(Vec3::ZERO, &brush(Tool::Raise, 2.0), 0.2);
    a.session.end_stroke(&mut a.store, 1_000);
    b.sync();
    assert!(b.session.grid().heights().iter().any(|h| *h != 0.0));

    let report = b.session.reset(&mut b.store);
    assert_eq!(report.remaining, 0);
    assert!(hub.is_empty());

    assert_eq!(a.sync(), Some(ReconcileOutcome::Reset));
    for client in [&a, &b] {
        let grid = client.session.grid();
        assert_eq!(grid.heights(), grid.baseline().heights());
        assert!(
            grid.colors()
                .chunks_exact(3)
                .all(|c| c == Rgb::DEFAULT_TERRAIN.to_array())
        );
    }

    // Editing after the reset behaves like a fresh room.
    a.session.apply_brush(Vec3::ZERO, &brush(Tool::Raise, 1.0), 0.1);
    a.session.end_stroke(&mut a.store, 3_000);
    b.sync();
    assert_same_terrain(&a.session, &b.session);
}

#[test]
fn partial_reset_leaves_survivors_as_ordinary_deltas() {
    let hub = MemoryHub::new();
    let mut a = Client::join(&hub, "a");
    let mut b = Client::join(&hub, "b");

    a.session.apply_brush(Vec3::ZERO, &brush(Tool::Raise, 1.0), 0.2);
    a.session.end_stroke(&mut a.store, 1_000);
    b.sync();

    let survivor = a.store.keys().remove(0);
    hub.fail_deletes_for([survivor.clone()]);
    let report = a.session.reset(&mut a.store);
    assert_eq!(report.remaining, 1);

    // B never sees an empty store, so it keeps the surviving vertex.
    assert!(matches!(b.sync(), Some(ReconcileOutcome::Applied(_))));
    let index: usize = survivor.parse().unwrap();
    assert_eq!(
        b.session.grid().height(index),
        a.store.get(&survivor).map(|r| r.height)
    );
    assert!(a.session.grid().heights().iter().all(|h| *h == 0.0));
}

#[test]
fn dropped_publish_is_resent_after_reconnect() {
    let hub = MemoryHub::new();
    let mut a = Client::join(&hub, "a");
    let mut b = Client::join(&hub, "b");

    hub.set_online(false);
    a.session.begin_stroke();
    a.session.apply_brush(Vec3::ZERO, &brush(Tool::Raise, 1.0), 0.1);
    let outcome = a.session.end_stroke(&mut a.store, 1_000);
    assert!(matches!(outcome, PublishOutcome::Sent { pending: 1.., .. }));
    assert!(b.sync().is_none());

    hub.set_online(true);
    let outcome = a.session.update_stroke(&mut a.store, 1_500);
    assert!(matches!(outcome, PublishOutcome::Sent { pending: 0, .. }));

    b.sync();
    assert_same_terrain(&a.session, &b.session);
}

#[test]
fn rotated_grid_takes_world_space_brush() {
    let hub = MemoryHub::new();
    let transform = WorldToGridTransform::from_translation_rotation(
        Vec3::new(50.0, 3.0, -20.0),
        Quat::from_rotation_y(0.7),
    );
    let mut a = Client::join_with(&hub, "a", transform);
    let mut b = Client::join(&hub, "b");

    let target = a.session.grid().layout().index(3, 12);
    let world = transform.to_world(a.session.grid().local_position(target));
    a.session.apply_brush(world, &brush(Tool::Raise, 0.3), 0.1);
    a.session.end_stroke(&mut a.store, 1_000);
    b.sync();

    assert!(a.session.grid().height(target).unwrap() > 0.0);
    assert_eq!(a.session.dirty().len(), 0);
    assert_eq!(hub.len(), 1);
    assert_same_terrain(&a.session, &b.session);
}
