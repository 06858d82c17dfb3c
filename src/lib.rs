//! WebPilot: natural-language browser automation.
//!
//! The engine turns free-form instructions into structured commands, resolves
//! the elements they mention against the live page, executes them with
//! retries, and schedules them for later when the instruction carries a time
//! phrase. The browser itself, the language model, and the persistence
//! backend are all host-provided through the traits in `webpilot-surface`.

mod engine;
mod engine_config;

pub use engine::AutomationEngine;
pub use engine_config::EngineConfig;

pub use webpilot_core_types::{
    ActionResult, Command, CommandKind, ScheduleMode, Task, TaskId, TaskStatus, TimeSpec,
    WaitCondition, WorkflowStep,
};
pub use webpilot_locator::{ResolvePolicy, ResolvedElement, StrategyKind};
pub use webpilot_scheduler::{TaskEvent, TaskEventKind};
pub use webpilot_surface::{
    BrowserSurface, FileStore, LanguageModelService, MemoryStore, PersistenceStore,
    StaticSurface,
};
