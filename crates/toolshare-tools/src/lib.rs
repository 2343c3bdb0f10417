pub mod calendar;
pub mod context;
pub mod error;
pub mod memo;
pub mod progress_map;
pub mod qr;
pub mod rewrite;
pub mod timer;
pub mod toolbox;

pub use calendar::{CalendarTool, DayCell, MonthView, YearMonth};
pub use context::ToolContext;
pub use error::{Result, ToolError};
pub use memo::MemoTool;
pub use progress_map::{ProgressMapTool, ProgressNode};
pub use qr::QrTool;
pub use rewrite::{RewriteStyle, RewriteTool};
pub use timer::{TimerTool, TimerView};
pub use toolbox::Toolbox;
