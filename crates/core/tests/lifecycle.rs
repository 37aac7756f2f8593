use std::cell::RefCell;
use std::rc::Rc;

use stimscene_core::{
    Clock, Context, Drawable, HeadlessWindow, InputKind, RawInput, SceneConfig, SceneError,
    ScriptedInput, Stimuli, TextStim, Value, VirtualClock, Window,
};

struct Session {
    ctx: Context,
    clock: VirtualClock,
    window: Rc<RefCell<HeadlessWindow>>,
    input: Rc<RefCell<ScriptedInput>>,
}

fn session() -> Session {
    session_at(64.0)
}

fn session_at(frame_rate: f64) -> Session {
    let clock = VirtualClock::new();
    let window = Rc::new(RefCell::new(HeadlessWindow::new(clock.clone(), frame_rate)));
    let input = Rc::new(RefCell::new(ScriptedInput::new(clock.clone())));
    let ctx = Context::new(window.clone(), input.clone(), clock.clone());
    Session {
        ctx,
        clock,
        window,
        input,
    }
}

fn response_scene(session: &Session) -> stimscene_core::Scene {
    session
        .ctx
        .scene(SceneConfig::new().duration(1.0).close_on("key_f"))
        .unwrap()
        .bind(|()| Ok(TextStim::new("respond")))
}

#[test]
fn closes_after_duration_without_input() {
    let session = session();
    let mut scene = response_scene(&session);

    scene.show(()).unwrap();

    let elapsed = session.clock.now() - scene.show_time().unwrap();
    let period = session.window.borrow().frame_period();
    assert!(elapsed >= 1.0 && elapsed < 1.0 + period, "elapsed {elapsed}");
    assert!(scene.events().unwrap().is_empty());
}

#[test]
fn fixation_at_sixty_hertz_lasts_its_nominal_frames() {
    let session = session_at(60.0);
    let mut fixation = session.ctx.fixation(Some(0.5)).unwrap();

    fixation.show(()).unwrap();

    // one onset flip plus thirty frames of 1/60 s
    assert_eq!(session.window.borrow().flip_count(), 31);
    let elapsed = session.clock.now() - fixation.show_time().unwrap();
    assert!((elapsed - 0.5).abs() < 1e-9, "elapsed {elapsed}");
}

#[test]
fn closes_early_on_trigger_key() {
    let session = session();
    let mut scene = response_scene(&session);
    session.input.borrow_mut().press_key_in("f", 0.3);

    scene.show(()).unwrap();

    let elapsed = session.clock.now() - scene.show_time().unwrap();
    assert!(elapsed < 0.35, "elapsed {elapsed}");
    let events = scene.events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, InputKind::Key);
    assert_eq!(events[0].name, "f");
    assert!(events[0].rt > 0.25 && events[0].rt < 0.3);
}

#[test]
fn other_keys_are_recorded_but_do_not_close() {
    let session = session();
    let mut scene = response_scene(&session);
    {
        let mut input = session.input.borrow_mut();
        input
            .press_key_in("j", 0.1)
            .press_key_in("space", 0.2)
            .press_key_in("f", 0.5);
    }

    scene.show(()).unwrap();

    let names: Vec<_> = scene
        .events()
        .unwrap()
        .iter()
        .map(|e| e.name.clone())
        .collect();
    assert_eq!(names, ["j", "space", "f"]);
}

#[test]
fn events_are_in_non_decreasing_order() {
    let session = session();
    let mut scene = session
        .ctx
        .scene(SceneConfig::new().duration(0.5))
        .unwrap()
        .bind(|()| Ok(TextStim::new("")));
    {
        let clock = session.clock.now();
        let mut input = session.input.borrow_mut();
        // simultaneous presses reported out of order within one frame
        input.push(RawInput::key("b", clock + 0.105));
        input.push(RawInput::mouse("right", clock + 0.101));
        input.push(RawInput::key("a", clock + 0.3));
    }

    scene.show(()).unwrap();

    let rts: Vec<f64> = scene.events().unwrap().iter().map(|e| e.rt).collect();
    assert_eq!(rts.len(), 3);
    assert!(rts.windows(2).all(|pair| pair[0] <= pair[1]), "{rts:?}");
}

#[test]
fn no_draw_after_closing_frame() {
    let session = session();
    let mut scene = session
        .ctx
        .scene(SceneConfig::new().close_on("mouse_left"))
        .unwrap()
        .bind(|()| Ok(TextStim::new("click")));
    session.input.borrow_mut().click_in("left", 0.05);

    scene.show(()).unwrap();
    let flips = session.window.borrow().flip_count();
    let closed_at = session.clock.now();

    // the frame that observed the click is the last one presented
    let rt = scene.events().unwrap()[0].rt;
    assert!(closed_at - scene.show_time().unwrap() - rt < session.window.borrow().frame_period());
    assert_eq!(flips, 4);
}

#[test]
fn duplicate_escape_listener_fails_before_drawing() {
    let session = session();
    let mut scene = session
        .ctx
        .scene(SceneConfig::new().on("on_key_escape", |_| Ok(())))
        .unwrap()
        .bind(|()| Ok(TextStim::new("x")));

    let err = scene
        .config(SceneConfig::new().on("on_key_escape", |_| Ok(())))
        .unwrap_err();

    assert!(matches!(err, SceneError::DuplicateListener(_)));
    assert_eq!(session.window.borrow().flip_count(), 0);
}

#[test]
fn set_then_get_round_trips() {
    let session = session();
    let mut scene = response_scene(&session);
    scene.set("stimulus", "GREEN").set("congruent", false).set("soa", 0.25);

    assert_eq!(scene.get("stimulus").unwrap(), &Value::from("GREEN"));
    assert_eq!(scene.get("congruent").unwrap(), &Value::Bool(false));
    assert_eq!(scene.get_f64("soa").unwrap(), 0.25);
    assert!(matches!(scene.get("missing"), Err(SceneError::KeyNotFound(_))));
}

#[test]
fn trial_loop_collects_rows() {
    let session = session();
    let mut fixation = session.ctx.fixation(Some(0.25)).unwrap();
    let mut probe = session
        .ctx
        .scene(SceneConfig::new().duration(1.0).close_on_all(["key_f", "key_j"]))
        .unwrap()
        .bind(|(left, right): (&'static str, &'static str)| {
            let items: Vec<Box<dyn Drawable>> = vec![
                Box::new(TextStim::new(left).with_pos(-0.5, 0.0)),
                Box::new(TextStim::new(right).with_pos(0.5, 0.0)),
            ];
            Ok(Stimuli::many(items))
        });

    for (trial, key) in [(1, "f"), (2, "j")] {
        fixation.show(()).unwrap();
        session.input.borrow_mut().press_key_in(key, 0.2);
        probe.set("trial", trial);
        probe.show(("<", ">")).unwrap();
        session.ctx.add_row_from(&probe).unwrap();
    }

    let data = session.ctx.data();
    let data = data.borrow();
    assert_eq!(data.len(), 2);
    assert_eq!(data.rows()[0]["response"], Value::from("f"));
    assert_eq!(data.rows()[1]["response"], Value::from("j"));
    assert_eq!(data.rows()[1]["trial"], Value::Int(2));
    let window = session.window.borrow();
    assert!(window.frames().iter().any(|frame| frame == &["<", ">"]));
}

#[test]
fn reentrant_show_is_reported() {
    let session = session();
    let inner = Rc::new(RefCell::new(
        session
            .ctx
            .scene(SceneConfig::new().duration(0.0))
            .unwrap()
            .bind(|()| Ok(TextStim::new("inner"))),
    ));
    let nested = inner.clone();
    let window = session.window.clone();
    let mut outer = session
        .ctx
        .scene(SceneConfig::new().duration(0.1).on("scene_drawn", move |_| {
            // hold the window as a toolkit would during a blocking flip
            let _guard = window.borrow_mut();
            nested.borrow_mut().show(())?;
            Ok(())
        }))
        .unwrap()
        .bind(|()| Ok(TextStim::new("outer")));

    let err = outer.show(()).unwrap_err();

    let source = std::error::Error::source(&err).expect("callback error has a source");
    assert!(source.to_string().contains("window is already in use"));
}
