//! End-to-end listener scenarios against a parsed page

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rustkit_common::{init_logging, LogConfig};
use rustkit_dom::{
    DispatchTarget, DomEvent, KeyboardEventData, MouseEventData, Node, NodeId, NodeType, Page,
};
use rustkit_listener::{
    attach_listener, callback, Callback, EventPhase, ListenerHook, ListenerOptions, TargetRef,
    TargetSpec, TokioTimers, VirtualTimers,
};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>
    <div id="toolbar">
        <button id="save" class="btn">Save</button>
        <button id="load" class="btn dynamic-btn">Load</button>
        <button id="quit" class="btn">Quit</button>
    </div>
    <input id="search">
</body>
</html>"#;

struct Harness {
    page: Page,
    timers: Rc<VirtualTimers>,
    calls: Rc<RefCell<Vec<DomEvent>>>,
}

impl Harness {
    fn new() -> Self {
        let _ = init_logging(LogConfig::for_tests());
        Self {
            page: Page::parse_html(PAGE).unwrap(),
            timers: Rc::new(VirtualTimers::new()),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn hook(&self) -> ListenerHook<DomEvent> {
        ListenerHook::new(self.page.environment(self.timers.clone()))
    }

    fn on_event(&self) -> Callback<DomEvent> {
        let calls = self.calls.clone();
        callback(move |event: &DomEvent| calls.borrow_mut().push(event.clone()))
    }

    fn element(&self, id: &str) -> Rc<Node> {
        self.page.document.require_element_by_id(id).unwrap()
    }

    fn click(&self, id: &str) {
        self.page.click(&self.element(id));
    }

    fn advance_ms(&self, ms: u64) {
        self.timers.advance(Duration::from_millis(ms));
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

#[test]
fn test_debounced_button_ref() {
    let h = Harness::new();
    let save = h.element("save");
    let button_ref = TargetRef::<DomEvent>::with_target(save.clone());

    let mut hook = h.hook();
    hook.render(
        TargetSpec::Ref(button_ref),
        "click",
        h.on_event(),
        &ListenerOptions::default().debounce(300),
    );

    let mut last = None;
    for i in 0u8..5 {
        let event = DomEvent::mouse(
            "click",
            MouseEventData {
                client_x: f64::from(i),
                ..Default::default()
            },
        );
        last = Some(event.id);
        h.page.dispatch(&save, &event);
        h.advance_ms(10);
    }

    // Fifth click at t=40, so the call lands at t=340.
    h.advance_ms(289);
    assert_eq!(h.call_count(), 0);
    h.advance_ms(1);
    assert_eq!(h.call_count(), 1);
    assert_eq!(Some(h.calls.borrow()[0].id), last);
}

#[test]
fn test_delayed_global_listener() {
    let h = Harness::new();
    let mut hook = h.hook();
    hook.render(
        TargetSpec::Global,
        "click",
        h.on_event(),
        &ListenerOptions::default().delay(500),
    );

    // Clicks on any element bubble to the window.
    h.click("quit");
    h.advance_ms(499);
    assert_eq!(h.call_count(), 0);
    h.advance_ms(1);
    assert_eq!(h.call_count(), 1);

    let event = h.calls.borrow()[0].clone();
    assert_eq!(event.target(), Some(DispatchTarget::Node(h.element("quit").id)));
}

#[test]
fn test_selector_with_null_target() {
    let h = Harness::new();
    let mut hook = h.hook();
    hook.render(
        TargetSpec::Null,
        "click",
        h.on_event(),
        &ListenerOptions::default().target_selector(".dynamic-btn"),
    );
    assert_eq!(hook.attached_count(), 1);

    h.click("load");
    h.click("save");
    assert_eq!(h.call_count(), 1);
}

#[test]
fn test_selector_attaches_to_every_match() {
    let h = Harness::new();
    let mut hook = h.hook();
    hook.render(
        TargetSpec::selector("#toolbar .btn, .btn"),
        ["mousedown", "mouseup"],
        h.on_event(),
        &ListenerOptions::default(),
    );

    // Unsupported selector: nothing attached.
    assert_eq!(hook.attached_count(), 0);

    hook.render(
        TargetSpec::selector(".btn"),
        ["mousedown", "mouseup"],
        h.on_event(),
        &ListenerOptions::default(),
    );
    assert_eq!(hook.attached_count(), 6);
    for id in ["save", "load", "quit"] {
        let node = h.element(id);
        assert_eq!(node.event_target.listener_count("mousedown"), 1);
        assert_eq!(node.event_target.listener_count("mouseup"), 1);
    }

    hook.unmount();
    for id in ["save", "load", "quit"] {
        assert!(h.element(id).event_target.is_empty());
    }
}

#[test]
fn test_null_target_without_selector() {
    let h = Harness::new();
    let mut hook = h.hook();
    let teardown = hook.render(TargetSpec::Null, "click", h.on_event(), &ListenerOptions::default());

    assert_eq!(hook.attached_count(), 0);
    h.click("save");
    teardown.call();
    hook.unmount();
    assert_eq!(h.call_count(), 0);
}

#[test]
fn test_multiple_event_types_on_window() {
    let h = Harness::new();
    let _listener = attach_listener(
        &h.page.environment(h.timers.clone()),
        TargetSpec::Global,
        ["click", "keydown"],
        h.on_event(),
        &ListenerOptions::default(),
    );

    h.click("save");
    h.page.dispatch(
        &h.element("search"),
        &DomEvent::keyboard(
            "keydown",
            KeyboardEventData {
                key: "Enter".into(),
                ..Default::default()
            },
        ),
    );

    let types: Vec<_> = h.calls.borrow().iter().map(|e| e.event_type.clone()).collect();
    assert_eq!(types, vec!["click", "keydown"]);
}

#[test]
fn test_capture_listener_runs_before_target() {
    let h = Harness::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let toolbar_log = order.clone();
    let toolbar = callback(move |event: &DomEvent| {
        toolbar_log.borrow_mut().push(("toolbar", event.phase()));
    });
    let button_log = order.clone();
    let button = callback(move |event: &DomEvent| {
        button_log.borrow_mut().push(("button", event.phase()));
    });

    let mut toolbar_hook = h.hook();
    toolbar_hook.render(
        TargetSpec::Element(h.element("toolbar")),
        "click",
        toolbar,
        &ListenerOptions::default().capture(true),
    );
    let mut button_hook = h.hook();
    button_hook.render(
        TargetSpec::Element(h.element("save")),
        "click",
        button,
        &ListenerOptions::default(),
    );

    h.click("save");
    assert_eq!(
        *order.borrow(),
        vec![("toolbar", EventPhase::Capturing), ("button", EventPhase::AtTarget)]
    );

    toolbar_hook.unmount();
    assert!(h.element("toolbar").event_target.is_empty());
}

#[test]
fn test_once_across_repeated_clicks() {
    let h = Harness::new();
    let mut hook = h.hook();
    hook.render(
        TargetSpec::Element(h.element("save")),
        "click",
        h.on_event(),
        &ListenerOptions::default().once(true),
    );

    for _ in 0..3 {
        h.click("save");
    }
    assert_eq!(h.call_count(), 1);
    // The native once registration removed itself.
    assert!(h.element("save").event_target.is_empty());
}

#[test]
fn test_stop_propagation_hides_event_from_window_listener() {
    let h = Harness::new();
    let stopper = callback(|event: &DomEvent| event.stop_propagation());

    let mut stop_hook = h.hook();
    stop_hook.render(
        TargetSpec::Element(h.element("save")),
        "click",
        stopper,
        &ListenerOptions::default(),
    );
    let mut window_hook = h.hook();
    window_hook.render(TargetSpec::Global, "click", h.on_event(), &ListenerOptions::default());

    h.click("save");
    h.click("load");
    assert_eq!(h.call_count(), 1);
}

#[test]
fn test_selector_is_not_re_evaluated_without_dependency_change() {
    let h = Harness::new();
    let options = ListenerOptions::default().target_selector(".btn");
    let on_event = h.on_event();

    let mut hook = h.hook();
    hook.render(TargetSpec::Global, "click", on_event.clone(), &options);
    assert_eq!(hook.attached_count(), 3);

    let extra = Node::new(
        NodeId::new(10_000),
        NodeType::Element {
            tag_name: "button".into(),
            attributes: [("class".to_string(), "btn".to_string())].into(),
        },
    );
    h.element("toolbar").append_child(extra.clone());

    hook.render(TargetSpec::Global, "click", on_event.clone(), &options);
    assert!(extra.event_target.is_empty());

    hook.render(TargetSpec::Global, ["click", "auxclick"], on_event, &options);
    assert_eq!(extra.event_target.listener_count("click"), 1);
    assert_eq!(hook.attached_count(), 8);
}

#[test]
fn test_manual_teardown_re_resolves_selector() {
    let h = Harness::new();
    let mut hook = h.hook();
    let teardown = hook.render(
        TargetSpec::Null,
        "click",
        h.on_event(),
        &ListenerOptions::default().target_selector("button"),
    );
    assert_eq!(hook.attached_count(), 3);

    teardown.call();
    assert_eq!(hook.attached_count(), 0);
    for id in ["save", "load", "quit"] {
        assert!(h.element(id).event_target.is_empty());
    }

    teardown.call();
    hook.unmount();
}

#[test]
fn test_options_from_json_drive_the_hook() {
    let h = Harness::new();
    let options =
        ListenerOptions::from_json(r##"{"debounce": 100, "targetSelector": "#search"}"##).unwrap();

    let mut hook = h.hook();
    hook.render(TargetSpec::Null, "input", h.on_event(), &options);

    let search = h.element("search");
    for _ in 0..3 {
        h.page.dispatch(&search, &DomEvent::new("input", true, false));
    }
    h.advance_ms(100);
    assert_eq!(h.call_count(), 1);
}

#[test]
fn test_unmount_before_debounce_fires() {
    let h = Harness::new();
    let mut hook = h.hook();
    hook.render(
        TargetSpec::Element(h.element("save")),
        "click",
        h.on_event(),
        &ListenerOptions::default().debounce(300),
    );

    h.click("save");
    drop(hook);

    assert_eq!(h.timers.pending(), 0);
    h.advance_ms(1_000);
    assert_eq!(h.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_on_tokio_timers() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let page = Page::parse_html(PAGE).unwrap();
            let timers = Rc::new(TokioTimers::new());
            let calls = Rc::new(RefCell::new(0));

            let save = page.document.require_element_by_id("save").unwrap();
            let target: TargetSpec<DomEvent> = TargetSpec::Element(save.clone());

            let counter = calls.clone();
            let listener = attach_listener(
                &page.environment(timers.clone()),
                target,
                "click",
                callback(move |_: &DomEvent| *counter.borrow_mut() += 1),
                &ListenerOptions::default().debounce(300),
            );

            for _ in 0..5 {
                page.click(&save);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            assert_eq!(*calls.borrow(), 0);

            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(*calls.borrow(), 1);

            page.click(&save);
            listener.teardown();
            assert_eq!(timers.pending(), 0);

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(*calls.borrow(), 1);
        })
        .await;
}
