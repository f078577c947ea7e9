//! End-to-end pipeline contract tests against the recording engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use docframe_cache::{Bitmap, ImageLoadState, ImageResult};
use docframe_core::{
    ChannelUiDispatcher, FrameAdapter, FrameEventListener, HostScope, ImageAdapter, Lifecycle,
    RenderConfig, RenderError, RenderRuntime, SizeChangedListener, UiInbox,
};
use docframe_engine::{DocumentKey, EngineCall, HitTestKind, MockEngine, SurfaceId};
use serial_test::serial;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn runtime_with(config: RenderConfig) -> (RenderRuntime, Arc<MockEngine>, UiInbox) {
    init_tracing();
    let engine = Arc::new(MockEngine::new());
    let (ui, inbox) = ChannelUiDispatcher::new();
    let runtime = RenderRuntime::new(engine.clone(), ui, config);
    (runtime, engine, inbox)
}

fn default_runtime() -> (RenderRuntime, Arc<MockEngine>, UiInbox) {
    runtime_with(RenderConfig::default())
}

/// Give the surface workers and delayed frame ticks time to run.
fn settle() {
    thread::sleep(Duration::from_millis(120));
}

#[test]
fn mutations_reach_the_engine_in_post_order() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.add_element(
        "n1",
        "text",
        "root",
        0,
        HashMap::new(),
        HashMap::new(),
        vec![],
    );
    session.update_styles("n1", HashMap::new());
    session.remove_element("n1");
    assert!(runtime.drain(Duration::from_secs(5)));

    let calls = engine.call_log();
    let mutation_order: Vec<&EngineCall> = calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                EngineCall::CreateBody { .. }
                    | EngineCall::AddElement { .. }
                    | EngineCall::UpdateStyles { .. }
                    | EngineCall::RemoveElement { .. }
            )
        })
        .collect();
    assert_eq!(mutation_order.len(), 4);
    assert!(matches!(mutation_order[0], EngineCall::CreateBody { .. }));
    assert!(matches!(mutation_order[1], EngineCall::AddElement { .. }));
    assert!(matches!(mutation_order[2], EngineCall::UpdateStyles { .. }));
    assert!(matches!(mutation_order[3], EngineCall::RemoveElement { .. }));

    runtime.shutdown();
}

#[test]
fn second_body_replaces_the_native_document() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.create_body("root2", HashMap::new(), HashMap::new(), vec![]);
    assert!(runtime.drain(Duration::from_secs(5)));

    let calls = engine.call_log();
    let create_positions: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, EngineCall::CreateDocument { .. }))
        .map(|(i, _)| i)
        .collect();
    let destroy_position = calls
        .iter()
        .position(|c| matches!(c, EngineCall::DestroyDocument { .. }))
        .expect("old document released");

    assert_eq!(create_positions.len(), 2);
    // The old handle is released before the replacement exists.
    assert!(destroy_position > create_positions[0]);
    assert!(destroy_position < create_positions[1]);

    runtime.shutdown();
}

#[test]
fn destroy_preempts_queued_mutations() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    assert!(runtime.drain(Duration::from_secs(5)));

    // Queue a burst, then destroy before it drains. The teardown is
    // posted at the queue front, so everything behind it no-ops.
    for i in 0..20 {
        session.update_attrs(&format!("n{i}"), HashMap::new());
    }
    session.destroy();
    assert!(runtime.drain(Duration::from_secs(5)));

    let calls = engine.call_log();
    let destroy_position = calls
        .iter()
        .position(|c| matches!(c, EngineCall::DestroyDocument { .. }))
        .expect("document released");
    let late_mutations = calls[destroy_position..]
        .iter()
        .filter(|c| matches!(c, EngineCall::UpdateAttrs { .. }))
        .count();
    assert_eq!(late_mutations, 0);

    assert!(session.is_destroyed());
    assert_eq!(session.lifecycle(), Lifecycle::Destroyed);
    assert!(runtime.session(session.key()).is_none());

    runtime.shutdown();
}

#[test]
fn destroyed_session_ignores_further_work() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));
    session.destroy();
    assert!(runtime.drain(Duration::from_secs(5)));
    engine.clear_log();

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.hit_test(HitTestKind::Click, 1, 1);
    session.surface_available(SurfaceId(5), 100, 100);
    assert!(runtime.drain(Duration::from_secs(5)));

    assert!(engine.call_log().is_empty());
    assert_eq!(
        session.document_size(),
        Err(RenderError::Destroyed(session.key()))
    );

    runtime.shutdown();
}

#[test]
#[serial]
fn surface_attach_runs_on_its_own_worker_and_paints_immediately() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    assert!(runtime.drain(Duration::from_secs(5)));

    assert_eq!(session.lifecycle(), Lifecycle::Paused);
    session.surface_available(SurfaceId(9), 360, 640);
    settle();

    assert_eq!(session.lifecycle(), Lifecycle::Active);
    assert_eq!(session.presented_surface(), Ok(SurfaceId(9)));

    let recorded = engine.recorded();
    let attach_index = recorded
        .iter()
        .position(|r| matches!(r.call, EngineCall::AttachContext { .. }))
        .expect("context attached");

    // Attach, first clear, and first present run back to back on the
    // surface worker.
    assert!(matches!(
        recorded[attach_index + 1].call,
        EngineCall::ClearBuffer { .. }
    ));
    assert!(matches!(
        recorded[attach_index + 2].call,
        EngineCall::SwapBuffers { .. }
    ));

    // The attach-triggered frame ran: layout and paint on the mutation
    // worker, present on the surface worker.
    let layout = recorded
        .iter()
        .find(|r| matches!(r.call, EngineCall::Layout { .. }))
        .expect("frame laid out");
    let paint = recorded
        .iter()
        .find(|r| matches!(r.call, EngineCall::Paint { .. }))
        .expect("frame painted");
    let create = recorded
        .iter()
        .find(|r| matches!(r.call, EngineCall::CreateDocument { .. }))
        .unwrap();
    assert_eq!(layout.thread, create.thread);
    assert_eq!(paint.thread, create.thread);
    assert_ne!(recorded[attach_index].thread, create.thread);

    let present_after_paint = engine.count_calls(|c| matches!(c, EngineCall::InvalidateContext { .. }));
    assert!(present_after_paint >= 1);

    runtime.shutdown();
}

#[test]
#[serial]
fn resize_presents_exactly_two_buffer_cycles() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    // No body on purpose: frame ticks no-op, so every invalidate in the
    // log comes from the resize.
    session.surface_available(SurfaceId(2), 100, 100);
    settle();
    engine.clear_log();

    session.surface_resized(150, 200);
    settle();

    let calls = engine.call_log();
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::ResizeContext { .. })),
        1
    );
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::InvalidateContext { .. })),
        2
    );
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::SwapBuffers { .. })),
        2
    );
    assert!(matches!(calls[0], EngineCall::ResizeContext { width: 150, height: 200, .. }));

    runtime.shutdown();
}

#[test]
#[serial]
fn surface_destroyed_detaches_and_pauses() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.surface_available(SurfaceId(3), 100, 100);
    settle();

    session.surface_destroyed();

    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::DetachContext { .. })),
        1
    );
    assert!(session.is_paused());
    assert_eq!(session.lifecycle(), Lifecycle::Paused);
    assert_eq!(
        session.presented_surface(),
        Err(RenderError::NoSurface(session.key()))
    );

    runtime.shutdown();
}

#[test]
#[serial]
fn pause_releases_the_surface_and_resume_stays_surface_less() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.surface_available(SurfaceId(6), 100, 100);
    settle();

    session.set_pause(true);
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::DetachContext { .. })),
        1
    );
    engine.clear_log();

    // Resuming without a new surface must not paint into the old one.
    session.set_pause(false);
    session.request_frame();
    settle();

    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::Paint { .. })),
        0
    );
    assert_eq!(
        session.presented_surface(),
        Err(RenderError::NoSurface(session.key()))
    );

    // A fresh surface brings frames back.
    session.surface_available(SurfaceId(7), 100, 100);
    settle();
    assert!(engine.count_calls(|c| matches!(c, EngineCall::Paint { .. })) >= 1);

    runtime.shutdown();
}

struct SizeRecorder {
    sizes: Mutex<Vec<(i32, i32)>>,
}

impl SizeChangedListener for SizeRecorder {
    fn on_size_changed(&self, width: i32, height: i32) {
        self.sizes.lock().unwrap().push((width, height));
    }
}

#[test]
#[serial]
fn size_changes_are_delivered_on_the_ui_thread_by_default() {
    let (runtime, engine, inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));
    let recorder = Arc::new(SizeRecorder {
        sizes: Mutex::new(Vec::new()),
    });
    session.set_adapter(FrameAdapter::new().with_size_changed(recorder.clone()));

    engine.set_document_size(360, 640);
    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.surface_available(SurfaceId(8), 360, 640);
    settle();

    // Nothing arrives until the host pumps its UI loop.
    assert!(recorder.sizes.lock().unwrap().is_empty());
    inbox.drain();
    assert_eq!(*recorder.sizes.lock().unwrap(), vec![(360, 640)]);

    runtime.shutdown();
}

#[test]
fn pause_flushes_images_and_resume_restores_them() {
    let (runtime, _engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));
    session.set_pause(false);

    let result = session
        .resolve_image("img-1", "https://example.com/a.png", 64, 64, false)
        .unwrap();
    assert_eq!(session.image_count(), 1);

    session.set_pause(true);
    assert_eq!(session.image_count(), 0);
    assert_eq!(runtime.image_cache().len(), 1);

    session.set_pause(false);
    assert_eq!(session.image_count(), 1);
    assert!(runtime.image_cache().is_empty());

    // The restored entry is the same result object.
    let again = session
        .resolve_image("img-1", "https://example.com/a.png", 64, 64, false)
        .unwrap();
    assert!(Arc::ptr_eq(&result, &again));

    runtime.shutdown();
}

struct CollectingAdapter {
    loads: Mutex<Vec<(DocumentKey, Arc<ImageResult>)>>,
}

impl ImageAdapter for CollectingAdapter {
    fn load(&self, document: DocumentKey, result: Arc<ImageResult>) {
        self.loads.lock().unwrap().push((document, result));
    }
}

#[test]
fn image_loads_go_through_the_adapter_once() {
    init_tracing();
    let engine = Arc::new(MockEngine::new());
    let (ui, _inbox) = ChannelUiDispatcher::new();
    let adapter = Arc::new(CollectingAdapter {
        loads: Mutex::new(Vec::new()),
    });
    let runtime = RenderRuntime::new(engine, ui, RenderConfig::default())
        .with_image_adapter(adapter.clone());

    let session = runtime.create_session(HostScope(1));
    session.set_pause(false);

    session.resolve_image("img-1", "u", 32, 32, false);
    session.resolve_image("img-1", "u", 32, 32, false);
    session.resolve_image("img-1", "u", 32, 32, true);

    let loads = adapter.loads.lock().unwrap();
    // Two distinct requests (placeholder is part of identity), each
    // loaded once.
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[0].0, session.key());

    let result = loads[0].1.clone();
    drop(loads);
    session.complete_image(&result, Some(Arc::new(Bitmap::new(vec![0; 4], 1, 1))));
    assert_eq!(result.state(), ImageLoadState::Loaded);

    runtime.shutdown();
}

struct ClickRecorder {
    clicks: Mutex<Vec<(String, i32, i32, i32, i32)>>,
}

impl FrameEventListener for ClickRecorder {
    fn on_click(&self, element: &str, x: i32, y: i32, width: i32, height: i32) {
        self.clicks
            .lock()
            .unwrap()
            .push((element.to_owned(), x, y, width, height));
    }
}

#[test]
fn click_hit_resolves_block_box_on_the_ui_thread() {
    let (runtime, engine, inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));
    let recorder = Arc::new(ClickRecorder {
        clicks: Mutex::new(Vec::new()),
    });
    session.set_adapter(FrameAdapter::new().with_events(recorder.clone()));

    engine.set_hit_result(Some("btn"));
    engine.set_block_box(10, 20, 30, 40);
    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.hit_test(HitTestKind::Click, 15, 25);
    assert!(runtime.drain(Duration::from_secs(5)));

    // All four edges were queried.
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::BlockLayout { .. })),
        4
    );

    // Nothing is delivered until the host pumps its UI loop.
    assert!(recorder.clicks.lock().unwrap().is_empty());
    inbox.drain();
    assert_eq!(
        *recorder.clicks.lock().unwrap(),
        vec![("btn".to_owned(), 10, 20, 30, 40)]
    );

    runtime.shutdown();
}

#[test]
fn touch_hits_do_not_resolve_boxes() {
    let (runtime, engine, inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));
    engine.set_hit_result(Some("btn"));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.hit_test(HitTestKind::Touch, 5, 5);
    assert!(runtime.drain(Duration::from_secs(5)));

    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::BlockLayout { .. })),
        0
    );
    assert_eq!(inbox.drain(), 0);

    runtime.shutdown();
}

#[test]
#[serial]
fn burst_of_mutations_coalesces_into_few_frames() {
    let (runtime, engine, _inbox) = default_runtime();
    let session = runtime.create_session(HostScope(1));

    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    session.surface_available(SurfaceId(4), 100, 100);
    settle();
    engine.clear_log();

    for i in 0..20 {
        session.update_styles(&format!("n{i}"), HashMap::new());
    }
    assert!(runtime.drain(Duration::from_secs(5)));
    settle();

    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::UpdateStyles { .. })),
        20
    );
    // The twenty repaint requests land in one or two frame intervals.
    let layouts = engine.count_calls(|c| matches!(c, EngineCall::Layout { .. }));
    assert!(layouts >= 1, "at least one frame ran");
    assert!(layouts <= 3, "20 mutations produced {layouts} frames");

    runtime.shutdown();
}

#[test]
fn host_scope_fanout_targets_only_its_documents() {
    let (runtime, engine, _inbox) = default_runtime();
    let in_scope = runtime.create_session(HostScope(1));
    let other = runtime.create_session(HostScope(2));

    in_scope.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    other.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    assert!(runtime.drain(Duration::from_secs(5)));

    runtime.on_host_destroyed(HostScope(1));
    assert!(runtime.drain(Duration::from_secs(5)));

    assert!(in_scope.is_destroyed());
    assert!(!other.is_destroyed());
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::DestroyDocument { .. })),
        1
    );

    runtime.shutdown();
}

#[test]
fn low_memory_drops_cached_and_live_images() {
    let (runtime, _engine, _inbox) = default_runtime();
    let live = runtime.create_session(HostScope(1));
    let paused = runtime.create_session(HostScope(1));
    live.set_pause(false);
    paused.set_pause(false);

    live.resolve_image("a", "u1", 8, 8, false);
    paused.resolve_image("b", "u2", 8, 8, false);
    paused.set_pause(true);
    assert_eq!(runtime.image_cache().len(), 1);

    runtime.on_low_memory();

    assert_eq!(live.image_count(), 0);
    assert!(runtime.image_cache().is_empty());

    runtime.shutdown();
}

#[test]
fn add_font_refreshes_every_live_document() {
    let (runtime, engine, _inbox) = default_runtime();
    let a = runtime.create_session(HostScope(1));
    let b = runtime.create_session(HostScope(2));

    a.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    b.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    assert!(runtime.drain(Duration::from_secs(5)));

    runtime.add_font("Inter", "/fonts/inter.ttf");
    // The registration task re-posts one refresh per document, so one
    // more drain is needed before they have all run.
    assert!(runtime.drain(Duration::from_secs(5)));
    assert!(runtime.drain(Duration::from_secs(5)));

    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::AddFont { .. })),
        1
    );
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::RefreshFont { .. })),
        2
    );

    runtime.shutdown();
}

#[test]
#[serial]
fn rapid_surface_churn_survives_and_throttles() {
    let config = RenderConfig::default()
        .with_max_detaches_per_window(2)
        .with_churn_window(Duration::from_secs(5));
    let (runtime, engine, _inbox) = runtime_with(config);
    let session = runtime.create_session(HostScope(1));
    session.create_body("root", HashMap::new(), HashMap::new(), vec![]);
    assert!(runtime.drain(Duration::from_secs(5)));

    for i in 0..4 {
        session.surface_available(SurfaceId(100 + i), 50, 50);
        // Let the attach land on the surface worker before tearing down.
        thread::sleep(Duration::from_millis(30));
        session.surface_destroyed();
    }

    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::AttachContext { .. })),
        4
    );
    assert_eq!(
        engine.count_calls(|c| matches!(c, EngineCall::DetachContext { .. })),
        4
    );
    assert_eq!(runtime.stats().snapshot().detaches_in_window, 4);
    assert_eq!(runtime.stats().pending_attaches(), 0);

    runtime.shutdown();
}

#[test]
fn document_keys_are_unique_and_monotonic() {
    let (runtime, _engine, _inbox) = default_runtime();
    let a = runtime.create_session(HostScope(1));
    let b = runtime.create_session(HostScope(1));
    let c = runtime.create_session(HostScope(2));

    assert!(a.key() < b.key());
    assert!(b.key() < c.key());
    assert_eq!(runtime.document_count(), 3);

    runtime.shutdown();
    assert_eq!(runtime.document_count(), 0);
}
