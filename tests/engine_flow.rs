//! End-to-end flows through the assembled engine, against the in-memory
//! surface and store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use webpilot_cli::{
    AutomationEngine, EngineConfig, MemoryStore, ResolvePolicy, StaticSurface, TaskStatus,
    TimeSpec,
};

fn test_config() -> EngineConfig {
    EngineConfig {
        policy: ResolvePolicy::HtmlFirst,
        retries: 1,
        step_delay_ms: 1,
        data_dir: std::env::temp_dir().join("webpilot-test"),
        log_filter: "warn".to_string(),
    }
}

async fn engine_on(surface: Arc<StaticSurface>) -> AutomationEngine {
    AutomationEngine::new(surface, None, Arc::new(MemoryStore::new()), &test_config())
        .await
        .expect("engine")
}

/// Answers the scripts a search flow sends: host lookup, existence checks
/// for the Baidu selectors, and ok-acknowledgements for everything else.
fn baidu_script_handler(
    js: &str,
) -> Result<serde_json::Value, webpilot_surface::SurfaceError> {
    if js == "location.host" {
        return Ok(json!("www.baidu.com"));
    }
    if js.contains("querySelectorAll") {
        return Ok(json!([]));
    }
    if js.contains("getBoundingClientRect") && !js.contains("scrollIntoView") {
        // Existence checks: only the Baidu selectors are on this page.
        return Ok(json!(js.contains("#kw") || js.contains("#su")));
    }
    Ok(json!({ "ok": true }))
}

#[tokio::test]
async fn compound_search_navigates_and_searches() {
    let surface = Arc::new(StaticSurface::new().with_script_handler(baidu_script_handler));
    let engine = engine_on(surface.clone()).await;

    let task = engine.run("open baidu and search for rust books").await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.result.unwrap().message.contains("rust books"));
    assert_eq!(surface.visited(), vec!["https://www.baidu.com".to_string()]);
    engine.shutdown();
}

#[tokio::test]
async fn time_phrase_schedules_instead_of_running() {
    let surface = Arc::new(StaticSurface::new());
    let engine = engine_on(surface.clone()).await;

    let task = engine.run("tomorrow 9am search weather").await.unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    assert!(surface.visited().is_empty());

    // Cancellation is accepted while pending, refused afterwards.
    assert!(engine.cancel_task(&task.id).await.unwrap());
    assert!(!engine.cancel_task(&task.id).await.unwrap());
    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn scheduled_task_executes_when_due() {
    let surface = Arc::new(StaticSurface::new());
    let engine = engine_on(surface.clone()).await;

    let task = engine.run("in 1 seconds take a screenshot").await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let finished = engine
        .list_tasks()
        .await
        .into_iter()
        .find(|t| t.id == task.id)
        .unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    engine.shutdown();
}

#[tokio::test]
async fn critical_workflow_step_aborts_the_rest() {
    // Element queries find nothing, so the click step cannot resolve.
    let surface = Arc::new(StaticSurface::new().with_script_handler(|js| {
        if js.contains("querySelectorAll") {
            return Ok(json!([]));
        }
        if js == "location.host" {
            return Ok(json!("example.org"));
        }
        Ok(json!({ "ok": true }))
    }));
    let engine = engine_on(surface).await;

    let task = engine
        .run("1. open example.org 2. click the missing button 3. take a screenshot")
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    let result = task.result.unwrap();
    assert!(result.message.contains("aborted at step 2"));
    // The screenshot step never ran.
    assert_eq!(result.data.unwrap()["steps"].as_array().unwrap().len(), 2);
    engine.shutdown();
}

#[tokio::test]
async fn interpreted_commands_can_be_scheduled_directly() {
    let surface = Arc::new(StaticSurface::new());
    let engine = engine_on(surface).await;

    let (command, _) = engine.interpret("take a screenshot").await;
    let spec = TimeSpec::scheduled(
        chrono::Local::now() + chrono::Duration::hours(1),
        "in an hour",
    );
    let task = engine.create_task(command.clone(), &spec).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(engine.cancel_task(&task.id).await.unwrap());

    // An immediate spec runs before returning.
    let done = engine
        .create_task(command, &TimeSpec::immediate("now"))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    engine.shutdown();
}

#[tokio::test]
async fn element_resolution_suggests_what_is_on_the_page() {
    let surface = Arc::new(StaticSurface::new().with_script_handler(|js| {
        if js.contains("querySelectorAll") {
            return Ok(json!([{
                "selector": "#login",
                "tag": "button",
                "text": "Login",
                "id": "login",
                "classes": [],
                "visible": true,
                "bounding_box": null,
            }]));
        }
        Ok(json!({ "ok": true }))
    }));
    let engine = engine_on(surface).await;

    let element = engine.resolve_element("the Login button").await.unwrap();
    assert_eq!(element.locator, "#login");

    let err = engine.resolve_element("the checkout button").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("checkout"), "unexpected error: {message}");
    engine.shutdown();
}

#[tokio::test]
async fn unknown_instruction_fails_with_suggestions() {
    let engine = engine_on(Arc::new(StaticSurface::new())).await;

    let task = engine.run("florble the wurble").await.unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    let result = task.result.unwrap();
    assert!(result.error.as_deref().unwrap_or("").contains("[parse]"));
    let suggestions = result.data.unwrap()["suggestions"].as_array().unwrap().len();
    assert!(suggestions > 0);
    engine.shutdown();
}

#[tokio::test]
async fn tasks_survive_an_engine_restart() {
    let store = Arc::new(MemoryStore::new());
    let config = test_config();

    let first = AutomationEngine::new(
        Arc::new(StaticSurface::new()),
        None,
        store.clone(),
        &config,
    )
    .await
    .unwrap();
    let task = first.run("tomorrow 9am search weather").await.unwrap();
    first.shutdown();
    drop(first);

    let second = AutomationEngine::new(
        Arc::new(StaticSurface::new()),
        None,
        store,
        &config,
    )
    .await
    .unwrap();
    let recovered = second
        .list_tasks()
        .await
        .into_iter()
        .find(|t| t.id == task.id)
        .unwrap();
    assert_eq!(recovered.status, TaskStatus::Pending);
    assert!(second.cancel_task(&task.id).await.unwrap());
    second.shutdown();
}
